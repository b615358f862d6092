use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, Target};
use crate::count::group::MAX_MEMBERS;
use crate::count::{Counter, Group};
use crate::definition::{split_pmu, CounterConfig, CounterDefinition};
use crate::error::{Error, Result};
use crate::result::CounterResult;

mod graph;
mod multi;
mod requested;

pub use graph::DirectedGraph;
pub use multi::*;
pub use requested::*;

/// How the hardware events of one [`EventCounter::add`] call are placed into
/// groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Schedule {
    /// Into the first extendable group with room and no identical event,
    /// or into a new group.
    #[default]
    Append,

    /// Each event into a dedicated group.
    Separate,

    /// All events of the call into one new group, scheduled together.
    Group,
}

/// Counts events, metrics and time events around a measured region.
///
/// Hardware events are scheduled into groups that the kernel multiplexes;
/// metrics are computed from the measured values after [`stop`][Self::stop].
///
/// # Examples
///
/// ```rust,no_run
/// use perf_counters::config::Config;
/// use perf_counters::definition::CounterDefinition;
/// use perf_counters::event_counter::{EventCounter, Schedule};
///
/// let mut counter = EventCounter::new(CounterDefinition::shared(), Config::default());
/// counter
///     .add_all(["instructions", "cycles", "instructions-per-cycle", "seconds"], Schedule::Append)
///     .unwrap();
///
/// counter.start().unwrap();
/// // ... measured code ...
/// counter.stop().unwrap();
///
/// println!("{}", counter.result(1).to_table());
/// ```
#[derive(Debug)]
pub struct EventCounter {
    definition: Arc<CounterDefinition>,
    config: Config,
    requested: RequestedEventSet,
    groups: Vec<(Group, bool)>,
    live: Vec<LiveCounter>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    is_running: bool,
}

#[derive(Debug)]
struct LiveCounter {
    counter: Counter,
    start: u64,
    end: u64,
}

struct Unfolded {
    pmu: Option<String>,
    name: String,
    kind: EventKind,
    is_shown_in_results: bool,
}

impl EventCounter {
    pub fn new(definition: Arc<CounterDefinition>, config: Config) -> Self {
        Self {
            definition,
            config,
            requested: RequestedEventSet::default(),
            groups: vec![],
            live: vec![],
            start_time: None,
            end_time: None,
            is_running: false,
        }
    }

    pub fn definition(&self) -> &Arc<CounterDefinition> {
        &self.definition
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn requested_events(&self) -> &RequestedEventSet {
        &self.requested
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().map(|(group, _)| group)
    }

    pub fn add(&mut self, name: &str, schedule: Schedule) -> Result<()> {
        self.add_all([name], schedule)
    }

    /// Adds events, metrics or time events.
    ///
    /// Metrics pull in the events they depend on, which are measured but
    /// not shown in the results unless requested themselves. On error
    /// nothing is added.
    pub fn add_all<I, S>(&mut self, names: I, schedule: Schedule) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unfolded = vec![];
        for name in names {
            let name = name.as_ref();
            let mut graph = DirectedGraph::default();
            self.unfold(name, true, &mut unfolded, &mut graph)?;
            if graph.is_cyclic() {
                return Err(Error::MetricDependencyCycle(name.to_string()));
            }
        }

        let mut hardware: Vec<(&Unfolded, CounterConfig)> = vec![];
        for it in unfolded.iter().filter(|it| it.kind == EventKind::HardwareEvent) {
            let pmu = it.pmu.as_deref();
            let is_scheduled = self
                .requested
                .get(pmu, &it.name)
                .is_some_and(|event| event.scheduled_group().is_some());
            let is_planned = hardware
                .iter()
                .any(|(planned, _)| planned.pmu.as_deref() == pmu && planned.name == it.name);
            if is_scheduled || is_planned {
                continue;
            }
            let (_, _, config) = self
                .definition
                .get(pmu, &it.name)
                .ok_or_else(|| Error::CannotFindEvent(it.name.clone()))?;
            hardware.push((it, config.clone()));
        }

        let configs: Vec<_> = hardware.iter().map(|(_, config)| config).collect();
        let placements = self.plan(&configs, schedule)?;

        for ((it, config), &(group, _)) in hardware.iter().zip(&placements) {
            if group == self.groups.len() {
                self.groups.push((Group::default(), schedule == Schedule::Append));
            }
            self.groups[group].0.add(display_name(it), config.clone())?;
        }

        for it in &unfolded {
            let mut event = RequestedEvent::new(
                it.pmu.clone(),
                it.name.clone(),
                it.kind,
                it.is_shown_in_results,
            );
            let placement = hardware
                .iter()
                .position(|(planned, _)| planned.pmu == it.pmu && planned.name == it.name)
                .map(|index| placements[index]);
            if let Some((group, member)) = placement {
                event.schedule(group, member);
            }
            self.requested.add(event);
        }
        Ok(())
    }

    fn unfold(
        &self,
        name: &str,
        is_shown_in_results: bool,
        out: &mut Vec<Unfolded>,
        graph: &mut DirectedGraph<String>,
    ) -> Result<()> {
        let (pmu, event) = split_pmu(name);
        let unfolded = |kind| Unfolded {
            pmu: pmu.map(str::to_string),
            name: event.to_string(),
            kind,
            is_shown_in_results,
        };

        if pmu.is_none() {
            if let Some(required) = self.definition.required_counters(name) {
                graph.insert(name.to_string());
                for dependency in required {
                    if self.definition.is_metric(dependency) {
                        let is_seen = graph.contains(dependency);
                        graph.connect(dependency.clone(), name.to_string());
                        if is_seen {
                            continue;
                        }
                    }
                    self.unfold(dependency, false, out, graph)
                        .map_err(|e| match e {
                            Error::CannotFindEventOrMetric(event) => {
                                Error::CannotFindEventForMetric {
                                    metric: name.to_string(),
                                    event,
                                }
                            }
                            e => e,
                        })?;
                }
                // After its dependencies.
                out.push(unfolded(EventKind::Metric));
                return Ok(());
            }
            if self.definition.is_time_event(name) {
                out.push(unfolded(EventKind::TimeEvent));
                return Ok(());
            }
        }

        if self.definition.get(pmu, event).is_none() {
            return Err(Error::CannotFindEventOrMetric(name.to_string()));
        }
        out.push(unfolded(EventKind::HardwareEvent));
        Ok(())
    }

    /// `(group, member)` of each event, `group == self.groups.len()` and
    /// above naming new groups.
    fn plan(&self, configs: &[&CounterConfig], schedule: Schedule) -> Result<Vec<(usize, usize)>> {
        let capacity = usize::from(self.config.num_events_per_physical_counter).min(MAX_MEMBERS);
        let max_groups = usize::from(self.config.num_physical_counters);

        let mut sizes: Vec<usize> = self.groups().map(Group::len).collect();
        let mut placements: Vec<(usize, usize)> = vec![];
        let new_group = |sizes: &mut Vec<usize>| {
            if sizes.len() >= max_groups {
                return Err(Error::MaxGroupsReached { max: max_groups });
            }
            sizes.push(0);
            Ok(sizes.len() - 1)
        };

        match schedule {
            Schedule::Append => {
                for &config in configs {
                    let fits = |group: usize| {
                        let is_extendable = match self.groups.get(group) {
                            Some((group, is_extendable)) => {
                                *is_extendable && !group.is_open() && !group.contains(config)
                            }
                            // Created by this call.
                            None => true,
                        };
                        let is_duplicate = placements
                            .iter()
                            .zip(configs)
                            .any(|(&(planned, _), &other)| planned == group && other == config);
                        is_extendable && !is_duplicate && sizes[group] < capacity
                    };
                    let group = match (0..sizes.len()).find(|&group| fits(group)) {
                        Some(group) => group,
                        None => new_group(&mut sizes)?,
                    };
                    placements.push((group, sizes[group]));
                    sizes[group] += 1;
                }
            }
            Schedule::Separate => {
                for _ in configs {
                    let group = new_group(&mut sizes)?;
                    placements.push((group, 0));
                    sizes[group] = 1;
                }
            }
            Schedule::Group => {
                if configs.len() > capacity {
                    return Err(Error::CannotAddEventToSingleGroup {
                        requested: configs.len(),
                        capacity,
                    });
                }
                if !configs.is_empty() {
                    let group = new_group(&mut sizes)?;
                    placements.extend((0..configs.len()).map(|member| (group, member)));
                }
            }
        }
        Ok(placements)
    }

    /// Adds hardware events read in-process while the counter runs, see
    /// [`live_result`][Self::live_result].
    pub fn add_live<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counters = vec![];
        for name in names {
            let name = name.as_ref();
            let is_present = self.live.iter().any(|it| it.counter.name() == name)
                || counters.iter().any(|it: &Counter| it.name() == name);
            if is_present {
                continue;
            }
            let (pmu, event) = split_pmu(name);
            let (_, _, config) = self
                .definition
                .get(pmu, event)
                .ok_or_else(|| Error::CannotFindEvent(name.to_string()))?;
            counters.push(Counter::new(name, config.clone()));
        }
        self.live.extend(counters.into_iter().map(|counter| LiveCounter {
            counter,
            start: 0,
            end: 0,
        }));
        Ok(())
    }

    /// Values of the live events since [`start`][Self::start].
    ///
    /// Read from the running counters, or the values at [`stop`][Self::stop].
    pub fn live_result(&self) -> Result<CounterResult> {
        self.live
            .iter()
            .map(|it| {
                let end = if self.is_running {
                    it.counter.read_value()?
                } else {
                    it.end
                };
                let value = end.saturating_sub(it.start) as f64 * it.counter.config().scale;
                Ok((it.counter.name().to_string(), value))
            })
            .collect()
    }

    /// Opens every unopened group and live event.
    pub fn open(&mut self) -> Result<()> {
        self.config.target.validate()?;
        for (group, _) in &mut self.groups {
            if !group.is_open() {
                group.open(&self.config)?;
            }
        }
        for it in &mut self.live {
            if !it.counter.is_open() {
                it.counter.open_live(&self.config)?;
            }
        }
        Ok(())
    }

    /// Opens if needed and starts measuring.
    pub fn start(&mut self) -> Result<()> {
        self.open()?;
        self.start_time = Some(Instant::now());
        self.end_time = None;
        for (group, _) in &mut self.groups {
            group.start()?;
        }
        for it in &mut self.live {
            it.counter.enable()?;
            it.start = it.counter.read_value()?;
        }
        self.is_running = true;
        Ok(())
    }

    /// Stops measuring, a no-op when not running.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_running {
            return Ok(());
        }
        for it in &mut self.live {
            it.end = it.counter.read_value()?;
            it.counter.disable()?;
        }
        for (group, _) in &mut self.groups {
            group.stop()?;
        }
        self.end_time = Some(Instant::now());
        self.is_running = false;
        Ok(())
    }

    pub fn close(&mut self) {
        for (group, _) in &mut self.groups {
            group.close();
        }
        for it in &mut self.live {
            it.counter.close();
        }
        self.is_running = false;
    }

    /// Results of the visible events, in request order.
    ///
    /// Hardware values are divided by `normalization`, e.g. the number of
    /// measured iterations; `0` is treated as `1`. Entries whose value is
    /// unavailable are left out.
    pub fn result(&self, normalization: u64) -> CounterResult {
        self.evaluate(self.raw_result(normalization))
    }

    /// Values of every hardware and time event, visible or not.
    pub(crate) fn raw_result(&self, normalization: u64) -> CounterResult {
        let normalization = normalization.max(1) as f64;
        let mut raw = CounterResult::default();
        for event in &self.requested {
            let value = match event.kind() {
                EventKind::HardwareEvent => event
                    .scheduled_group()
                    .and_then(|(group, member)| self.groups.get(group)?.0.get(member))
                    .map(|value| value / normalization),
                EventKind::TimeEvent => self.start_time.zip(self.end_time).and_then(|(start, end)| {
                    let time_event = self.definition.time_event(event.event_name())?;
                    Some(time_event.calculate(start, end))
                }),
                EventKind::Metric => None,
            };
            if let Some(value) = value {
                raw.push(event.name(), value);
            }
        }
        raw
    }

    /// Adds the metrics to `raw`, dependencies first, and keeps the visible
    /// entries.
    pub(crate) fn evaluate(&self, mut raw: CounterResult) -> CounterResult {
        let mut graph = DirectedGraph::default();
        for event in self.requested.iter().filter(|it| it.kind() == EventKind::Metric) {
            let name = event.event_name().to_string();
            graph.insert(name.clone());
            for dependency in self.definition.required_counters(&name).unwrap_or_default() {
                let is_metric = self
                    .requested
                    .get(None, dependency)
                    .is_some_and(|it| it.kind() == EventKind::Metric);
                if is_metric {
                    graph.connect(dependency.clone(), name.clone());
                }
            }
        }

        while let Some(name) = graph.pop() {
            let value = self.definition.metric(&name).and_then(|it| it.calculate(&raw));
            match value {
                Some(value) => raw.push(name, value),
                None => log::debug!("Metric '{}' is missing a required value", name),
            }
        }

        self.requested
            .iter()
            .filter(|it| it.is_shown_in_results())
            .filter_map(|it| {
                let name = it.name();
                let value = raw.get(&name)?;
                Some((name, value))
            })
            .collect()
    }

    /// Unopened, unstarted copy with the same requested events and groups.
    pub fn copy_from_template(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            config: self.config.clone(),
            requested: self.requested.clone(),
            groups: self
                .groups
                .iter()
                .map(|(group, is_extendable)| (group.clone_unopened(), *is_extendable))
                .collect(),
            live: self
                .live
                .iter()
                .map(|it| LiveCounter {
                    counter: it.counter.clone_unopened(),
                    start: 0,
                    end: 0,
                })
                .collect(),
            start_time: None,
            end_time: None,
            is_running: false,
        }
    }

    pub(crate) fn set_target(&mut self, target: Target) {
        self.config.target = target;
    }
}

fn display_name(it: &Unfolded) -> String {
    match &it.pmu {
        Some(pmu) => format!("{}/{}", pmu, it.name),
        None => it.name.clone(),
    }
}

#[cfg(test)]
mod test;
