//! Sampling of instruction pointers, memory accesses, branches and registers.
//!
//! A [`Sampler`] opens one group per trigger group. Every trigger writes its
//! records into its own ring-buffer, which is drained by an overflow worker
//! while sampling and decoded into [`Sample`]s by [`Sampler::result`].

pub(crate) mod arena;
pub(crate) mod buffer;
mod multi;
pub mod record;
mod values;

use std::sync::Arc;

pub use multi::*;
pub use record::*;
pub use values::*;

use crate::config::{PeriodOrFrequency, Precision, SampleConfig, Target};
use crate::count::Group;
use crate::definition::{split_pmu, CounterConfig, CounterDefinition, INTEL_AUX_EVENT};
use crate::error::{Error, Result};
use crate::hardware::HardwareInfo;
use record::{decode, Layout};

/// An event whose overflow records a sample.
///
/// Precision and period or frequency fall back to the event's definition,
/// then to the [`SampleConfig`] defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    name: String,
    precision: Option<Precision>,
    period_or_frequency: Option<PeriodOrFrequency>,
}

impl Trigger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precision: None,
            period_or_frequency: None,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period_or_frequency = Some(PeriodOrFrequency::Period(period));
        self
    }

    pub fn with_frequency(mut self, frequency: u64) -> Self {
        self.period_or_frequency = Some(PeriodOrFrequency::Frequency(frequency));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precision(&self) -> Option<Precision> {
        self.precision
    }

    pub fn period_or_frequency(&self) -> Option<PeriodOrFrequency> {
        self.period_or_frequency
    }
}

impl From<&str> for Trigger {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Trigger {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Why a counter is part of a sampling group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterRole {
    /// Leader required by the hardware, e.g. [`INTEL_AUX_EVENT`]; records nothing.
    Auxiliary,
    /// Records a sample on overflow.
    Trigger,
    /// Read into every sample, see [`Values::counter`].
    Value,
}

/// The group opened for one trigger group.
#[derive(Debug)]
pub struct SampleCounter {
    group: Group,
    triggers: Vec<Trigger>,
    roles: Vec<CounterRole>,
    has_auxiliary_event: bool,
    layout: Layout,
    data: Vec<Vec<u8>>,
}

impl SampleCounter {
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Role of each group member, in member order.
    pub fn roles(&self) -> &[CounterRole] {
        &self.roles
    }

    pub fn has_auxiliary_event(&self) -> bool {
        self.has_auxiliary_event
    }

    fn open(&mut self, config: &SampleConfig, values: &Values) -> Result<()> {
        let mut triggers = self.triggers.iter();
        let parameters: Vec<_> = self
            .group
            .members()
            .iter()
            .zip(&self.roles)
            .map(|(member, role)| {
                if *role != CounterRole::Trigger {
                    return None;
                }
                let trigger = triggers.next()?;
                let event = member.config();
                let precision = trigger
                    .precision
                    .or(event.precision)
                    .unwrap_or(config.precision);
                let period_or_frequency = trigger
                    .period_or_frequency
                    .or(event.period_or_frequency)
                    .unwrap_or(config.period_or_frequency);
                Some((precision, period_or_frequency))
            })
            .collect();

        self.group.open_sampling(config, values, &parameters)?;
        self.layout = Layout::new(values, &self.group);
        Ok(())
    }

    // Moves the records out of the ring-buffers.
    fn consume(&mut self) {
        for member in self.group.members_mut() {
            if let Some(buffer) = member.buffer_mut() {
                self.data.extend(buffer.consume_data());
            }
        }
    }
}

/// Records samples whenever a trigger event overflows.
///
/// # Examples
///
/// ```rust,no_run
/// use perf_counters::config::SampleConfig;
/// use perf_counters::definition::CounterDefinition;
/// use perf_counters::sample::{Sampler, Trigger};
///
/// let mut sampler = Sampler::new(CounterDefinition::shared(), SampleConfig::default());
/// sampler.trigger(Trigger::new("cycles").with_period(50_000)).unwrap();
/// sampler
///     .values_mut()
///     .timestamp(true)
///     .instruction_pointer(true);
///
/// sampler.start().unwrap();
/// // ... sampled code ...
/// sampler.stop().unwrap();
///
/// for sample in sampler.result(true) {
///     println!("{:?}", sample.instruction_execution.logical_instruction_pointer);
/// }
/// sampler.close();
/// ```
#[derive(Debug)]
pub struct Sampler {
    definition: Arc<CounterDefinition>,
    config: SampleConfig,
    values: Values,
    triggers: Vec<Vec<Trigger>>,
    counters: Vec<SampleCounter>,
    is_opened: bool,
}

impl Sampler {
    pub fn new(definition: Arc<CounterDefinition>, config: SampleConfig) -> Self {
        Self {
            definition,
            config,
            values: Values::default(),
            triggers: vec![],
            counters: vec![],
            is_opened: false,
        }
    }

    pub fn config(&self) -> &SampleConfig {
        &self.config
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }

    pub fn triggers(&self) -> &[Vec<Trigger>] {
        &self.triggers
    }

    pub fn sample_counters(&self) -> &[SampleCounter] {
        &self.counters
    }

    /// Samples on a single event.
    pub fn trigger(&mut self, trigger: impl Into<Trigger>) -> Result<()> {
        self.trigger_groups([[trigger]])
    }

    /// Samples on every event of one group, e.g. memory loads and stores.
    pub fn trigger_group<I, T>(&mut self, triggers: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Trigger>,
    {
        self.trigger_groups([triggers])
    }

    /// Replaces the triggers, each inner list becomes one counter group.
    ///
    /// Triggers must be hardware events. On error the triggers are left
    /// unchanged.
    pub fn trigger_groups<G, I, T>(&mut self, groups: G) -> Result<()>
    where
        G: IntoIterator<Item = I>,
        I: IntoIterator<Item = T>,
        T: Into<Trigger>,
    {
        if self.is_opened {
            return Err(Error::CannotChangeTriggerWhenSamplerOpened);
        }

        let groups: Vec<Vec<Trigger>> = groups
            .into_iter()
            .map(|it| it.into_iter().map(Into::into).collect())
            .collect();
        for trigger in groups.iter().flatten() {
            let (pmu, event) = split_pmu(&trigger.name);
            if self.definition.is_metric(&trigger.name) {
                return Err(Error::MetricNotSupportedAsSamplingTrigger(trigger.name.clone()));
            }
            if self.definition.is_time_event(&trigger.name) {
                return Err(Error::TimeEventNotSupportedForSampling(trigger.name.clone()));
            }
            if self.definition.get(pmu, event).is_none() {
                return Err(Error::CannotFindEvent(trigger.name.clone()));
            }
        }

        self.triggers = groups;
        Ok(())
    }

    /// Opens one group per trigger group, a no-op when already opened.
    pub fn open(&mut self) -> Result<()> {
        if self.is_opened {
            return Ok(());
        }
        self.config.base.target.validate()?;
        if self.triggers.iter().all(Vec::is_empty) {
            return Err(Error::CannotStartEmptySampler);
        }

        let aux_required = HardwareInfo::is_intel_aux_counter_required();
        let mut counters = build_sample_counters(&self.definition, &self.triggers, &self.values, aux_required)?;
        for counter in &mut counters {
            counter.open(&self.config, &self.values)?;
        }
        log::debug!("Opened {} sampling group(s)", counters.len());

        self.counters = counters;
        self.is_opened = true;
        Ok(())
    }

    /// Opens if needed and starts sampling.
    pub fn start(&mut self) -> Result<()> {
        self.open()?;
        self.counters
            .iter_mut()
            .try_for_each(|it| it.group.start())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.counters
            .iter_mut()
            .try_for_each(|it| it.group.stop())
    }

    /// Releases the counters; samples recorded so far stay available.
    pub fn close(&mut self) {
        for counter in &mut self.counters {
            counter.consume();
            counter.group.close();
        }
        self.is_opened = false;
    }

    /// Samples recorded so far.
    ///
    /// Drains the ring-buffers, which ends the background draining, so this
    /// is meant to be called after [`stop`][Self::stop]. With `sort_by_time`
    /// samples are ordered by timestamp, records without one last.
    pub fn result(&mut self, sort_by_time: bool) -> Vec<Sample> {
        let mut samples = vec![];
        for counter in &mut self.counters {
            counter.consume();
            samples.extend(decode(&counter.data, &counter.layout));
        }
        if sort_by_time {
            sort_by_timestamp(&mut samples);
        }
        samples
    }

    /// Unopened copy with the same triggers and values.
    pub fn copy_from_template(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            config: self.config.clone(),
            values: self.values.clone(),
            triggers: self.triggers.clone(),
            counters: vec![],
            is_opened: false,
        }
    }

    pub(crate) fn set_target(&mut self, target: Target) {
        self.config.base.target = target;
    }
}

pub(crate) fn sort_by_timestamp(samples: &mut [Sample]) {
    samples.sort_by_key(|it| (it.metadata.timestamp.is_none(), it.metadata.timestamp));
}

/// Builds the unopened groups of `triggers`.
///
/// With `aux_required`, a group sampling memory loads gets
/// [`INTEL_AUX_EVENT`] as its leader; an explicitly listed auxiliary event
/// is moved to the front. Counters of [`Values::counter`] that are not
/// triggers are appended to each group.
pub(crate) fn build_sample_counters(
    definition: &CounterDefinition,
    triggers: &[Vec<Trigger>],
    values: &Values,
    aux_required: bool,
) -> Result<Vec<SampleCounter>> {
    let lookup = |name: &str| -> Result<CounterConfig> {
        let (pmu, event) = split_pmu(name);
        let (_, _, config) = definition
            .get(pmu, event)
            .ok_or_else(|| Error::CannotFindEvent(name.to_string()))?;
        Ok(config.clone())
    };
    let is_aux = |trigger: &Trigger| split_pmu(&trigger.name).1 == INTEL_AUX_EVENT;

    let mut counters = vec![];
    for group_triggers in triggers.iter().filter(|it| !it.is_empty()) {
        let is_aux_included = group_triggers.iter().any(is_aux);
        let is_aux_needed = aux_required
            && group_triggers
                .iter()
                .any(|it| !is_aux(it) && split_pmu(&it.name).1.contains("mem-loads"));

        let mut group = Group::default();
        let mut roles = vec![];
        let mut added = vec![];
        if is_aux_included || is_aux_needed {
            let name = group_triggers
                .iter()
                .find(|&it| is_aux(it))
                .map_or(INTEL_AUX_EVENT, |it| it.name.as_str());
            group.add(name, lookup(name)?)?;
            roles.push(CounterRole::Auxiliary);
        }
        for trigger in group_triggers.iter().filter(|&it| !is_aux(it)) {
            group.add(trigger.name.as_str(), lookup(&trigger.name)?)?;
            roles.push(CounterRole::Trigger);
            added.push(trigger.clone());
        }
        for name in values.counters() {
            if group.members().iter().any(|it| it.name() == name) {
                continue;
            }
            group.add(name.as_str(), lookup(name)?)?;
            roles.push(CounterRole::Value);
        }

        counters.push(SampleCounter {
            group,
            triggers: added,
            roles,
            has_auxiliary_event: is_aux_included || is_aux_needed,
            layout: Layout::default(),
            data: vec![],
        });
    }
    Ok(counters)
}

#[cfg(test)]
mod test;
