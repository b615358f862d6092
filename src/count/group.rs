use super::{Counter, CounterValues};
use crate::config::{Config, PeriodOrFrequency, Precision, SampleConfig};
use crate::definition::CounterConfig;
use crate::error::{Error, Result};
use crate::ffi::bindings as b;
use crate::sample::Values;

/// Maximum number of counters in a group.
pub const MAX_MEMBERS: usize = 12;

/// Counter group.
///
/// An event group is scheduled onto the CPU as a unit: it will be put onto
/// the CPU only if all of the events in the group can be put onto the CPU.
/// The first member is the leader, every other member is opened with the
/// leader's descriptor as `group_fd`.
///
/// Values are read through the leader in one `read(2)` and matched to the
/// members by their kernel ids.
///
/// # Examples
///
/// ```rust,no_run
/// use perf_counters::config::Config;
/// use perf_counters::count::Group;
/// use perf_counters::definition::CounterDefinition;
///
/// let definition = CounterDefinition::new();
/// let mut group = Group::default();
/// for name in ["instructions", "cycles"] {
///     let (_, _, config) = definition.get(None, name).unwrap();
///     group.add(name, config.clone()).unwrap();
/// }
///
/// group.open(&Config::default()).unwrap();
/// group.start().unwrap();
/// // ... measured code ...
/// group.stop().unwrap();
///
/// println!("IPC: {}", group.get(0).unwrap() / group.get(1).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct Group {
    members: Vec<Counter>,
    start: CounterValues,
    end: CounterValues,
    is_running: bool,
}

impl Group {
    /// Appends a counter; the group is left unchanged when it is full.
    pub fn add(&mut self, name: impl Into<String>, config: CounterConfig) -> Result<()> {
        if self.members.len() >= MAX_MEMBERS {
            return Err(Error::MaxCountersReached { max: MAX_MEMBERS });
        }
        self.members.push(Counter::new(name, config));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Counter] {
        &self.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut [Counter] {
        &mut self.members
    }

    /// Whether a member has the same event configuration.
    pub fn contains(&self, config: &CounterConfig) -> bool {
        self.members.iter().any(|it| it.config() == config)
    }

    pub fn is_open(&self) -> bool {
        self.members.first().is_some_and(Counter::is_open)
    }

    pub fn leader(&self) -> Option<&Counter> {
        self.members.first()
    }

    /// Opens every member for counting.
    pub fn open(&mut self, config: &Config) -> Result<()> {
        self.open_each(|member, leader| member.open(config, leader))
    }

    /// Opens every member for sampling.
    ///
    /// `triggers[i]` is the sampling setup of member `i`, `None` for members
    /// that are only read.
    pub fn open_sampling(
        &mut self,
        config: &SampleConfig,
        values: &Values,
        triggers: &[Option<(Precision, PeriodOrFrequency)>],
    ) -> Result<()> {
        let mut triggers = triggers.iter().copied();
        self.open_each(|member, leader| {
            let trigger = triggers.next().flatten();
            member.open_sampling(config, values, trigger, leader)
        })
    }

    fn open_each<F>(&mut self, mut open: F) -> Result<()>
    where
        F: FnMut(&mut Counter, Option<&Counter>) -> Result<()>,
    {
        let Some((leader, members)) = self.members.split_first_mut() else {
            return Ok(());
        };
        let result = open(leader, None).and_then(|()| {
            members
                .iter_mut()
                .try_for_each(|member| open(member, Some(&*leader)))
        });
        if result.is_err() {
            self.close();
        }
        result
    }

    /// Snapshots the values and enables all counters of the group.
    pub fn start(&mut self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::CannotStartEmptyGroup);
        }
        self.start = self.read()?;
        self.enable()?;
        self.is_running = true;
        Ok(())
    }

    /// Disables all counters of the group and snapshots the values.
    ///
    /// Stopping a stopped group keeps the values of the previous stop.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running {
            return Ok(());
        }
        self.disable()?;
        self.is_running = false;
        self.end = self.read()?;
        Ok(())
    }

    pub fn enable(&self) -> Result<()> {
        self.group_ioctl("enable", b::PERF_EVENT_IOC_ENABLE)
    }

    pub fn disable(&self) -> Result<()> {
        self.group_ioctl("disable", b::PERF_EVENT_IOC_DISABLE)
    }

    pub fn reset(&self) -> Result<()> {
        self.group_ioctl("reset", b::PERF_EVENT_IOC_RESET)
    }

    fn group_ioctl(&self, op: &'static str, request: u64) -> Result<()> {
        let leader = self.leader().ok_or(Error::CannotStartEmptyGroup)?;
        leader.ioctl(op, request, b::PERF_IOC_FLAG_GROUP)
    }

    /// Reads the current values of all members.
    pub fn read(&self) -> Result<CounterValues> {
        let leader = self.leader().ok_or(Error::CannotStartEmptyGroup)?;
        leader.read_group(self.len())
    }

    pub fn start_values(&self) -> &CounterValues {
        &self.start
    }

    pub fn end_values(&self) -> &CounterValues {
        &self.end
    }

    /// `time_enabled / time_running` of the measured window, at least 1.
    pub fn multiplexing_factor(&self) -> f64 {
        let enabled = self.end.time_enabled.saturating_sub(self.start.time_enabled);
        let running = self.end.time_running.saturating_sub(self.start.time_running);
        multiplexing_factor(enabled, running)
    }

    /// Measured value of member `index`, scaled for multiplexing and by the
    /// event's scale.
    pub fn get(&self, index: usize) -> Option<f64> {
        let member = self.members.get(index)?;
        let id = member.id()?;
        let end = self.end.value(id)?;
        let start = self.start.value(id).unwrap_or_default();
        let count = end.saturating_sub(start) as f64;
        Some(count * self.multiplexing_factor() * member.config().scale)
    }

    pub fn close(&mut self) {
        // Members before the leader, whose descriptor anchors the group.
        for member in self.members.iter_mut().rev() {
            member.close();
        }
        self.is_running = false;
    }

    /// Unopened copy with the same members.
    pub fn clone_unopened(&self) -> Self {
        Self {
            members: self.members.iter().map(Counter::clone_unopened).collect(),
            ..Default::default()
        }
    }
}

pub(crate) fn multiplexing_factor(enabled: u64, running: u64) -> f64 {
    if running == 0 {
        return 1.0;
    }
    (enabled as f64 / running as f64).max(1.0)
}
