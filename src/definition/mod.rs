mod event;
mod metric;
mod provider;
mod time;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

pub use event::*;
pub use metric::*;
pub use provider::*;
pub use time::*;

use crate::error::Result;

/// PMU preferred when an event name carries no PMU prefix.
pub const DEFAULT_PMU: &str = "cpu";

/// Splits `pmu/event` into its parts, `(None, name)` without a prefix.
pub fn split_pmu(name: &str) -> (Option<&str>, &str) {
    match name.split_once('/') {
        Some((pmu, event)) if !pmu.is_empty() && !event.is_empty() => (Some(pmu), event),
        _ => (None, name),
    }
}

struct RegisteredMetric {
    metric: Box<dyn Metric>,
    required: Vec<String>,
}

/// Registry of named events, metrics and time events.
///
/// A definition may be layered on a parent: lookups that miss in the child
/// fall back to the parent, which is never modified through the child.
///
/// # Examples
///
/// ```rust
/// use perf_counters::definition::{CounterConfig, CounterDefinition};
///
/// let mut definition = CounterDefinition::with_parent(CounterDefinition::shared());
/// definition.add("cpu", "loads", CounterConfig::new(4, 0x81d0));
/// definition.add_formula("loads-per-instruction", "loads / instructions").unwrap();
///
/// assert!(definition.get(None, "loads").is_some());
/// assert!(definition.get(None, "instructions").is_some());
/// assert!(definition.is_metric("loads-per-instruction"));
/// ```
#[derive(Default)]
pub struct CounterDefinition {
    parent: Option<Arc<CounterDefinition>>,
    counters: BTreeMap<String, HashMap<String, CounterConfig>>,
    metrics: HashMap<String, RegisteredMetric>,
    time_events: HashMap<String, Box<dyn TimeEvent>>,
}

impl CounterDefinition {
    /// Definition holding the built-in events, metrics and time events.
    pub fn new() -> Self {
        let mut definition = Self::empty();
        for provider in builtin_providers() {
            // Built-in providers never fail.
            if let Err(e) = definition.add_from_provider(provider.as_ref()) {
                log::error!("Failed to load built-in definitions: {}", e);
            }
        }
        definition
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<CounterDefinition>) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }

    /// Built-in definitions plus the events listed in a CSV file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut definition = Self::new();
        definition.add_from_provider(&CsvFileEvents::new(path.as_ref()))?;
        Ok(definition)
    }

    /// Process-wide read-only instance with the built-in definitions.
    pub fn shared() -> Arc<CounterDefinition> {
        static SHARED: LazyLock<Arc<CounterDefinition>> =
            LazyLock::new(|| Arc::new(CounterDefinition::new()));
        Arc::clone(&SHARED)
    }

    pub fn add(&mut self, pmu: impl Into<String>, name: impl Into<String>, config: CounterConfig) {
        self.counters
            .entry(pmu.into())
            .or_default()
            .insert(name.into(), config);
    }

    pub fn add_metric(&mut self, metric: impl Metric + 'static) {
        let required = metric.required_counter_names();
        self.metrics.insert(
            metric.name().to_string(),
            RegisteredMetric {
                metric: Box::new(metric),
                required,
            },
        );
    }

    pub fn add_formula(&mut self, name: impl Into<String>, formula: &str) -> Result<()> {
        self.add_metric(FormulaMetric::new(name, formula)?);
        Ok(())
    }

    pub fn add_time_event(&mut self, name: impl Into<String>, event: impl TimeEvent + 'static) {
        self.time_events.insert(name.into(), Box::new(event));
    }

    pub fn add_from_provider(&mut self, provider: &dyn EventProvider) -> Result<()> {
        provider.provide(self)
    }

    /// Looks up a hardware event.
    ///
    /// With an explicit PMU the lookup is exact. Otherwise the [`DEFAULT_PMU`]
    /// is preferred over the other PMUs, which are searched in name order.
    pub fn get(&self, pmu: Option<&str>, name: &str) -> Option<(&str, &str, &CounterConfig)> {
        let found = match pmu {
            Some(pmu) => self
                .counters
                .get_key_value(pmu)
                .and_then(|(pmu, events)| Self::entry(pmu, events, name)),
            None => self
                .counters
                .get_key_value(DEFAULT_PMU)
                .and_then(|(pmu, events)| Self::entry(pmu, events, name))
                .or_else(|| {
                    self.counters
                        .iter()
                        .find_map(|(pmu, events)| Self::entry(pmu, events, name))
                }),
        };
        found.or_else(|| self.parent.as_deref()?.get(pmu, name))
    }

    /// Every PMU defining `name`, including the parent's.
    pub fn get_all(&self, name: &str) -> Vec<(&str, &str, &CounterConfig)> {
        let mut all: Vec<_> = self
            .counters
            .iter()
            .filter_map(|(pmu, events)| Self::entry(pmu, events, name))
            .collect();
        if let Some(parent) = &self.parent {
            for entry in parent.get_all(name) {
                if !all.iter().any(|(pmu, _, _)| *pmu == entry.0) {
                    all.push(entry);
                }
            }
        }
        all
    }

    pub fn is_metric(&self, name: &str) -> bool {
        self.metric(name).is_some()
    }

    pub fn metric(&self, name: &str) -> Option<&dyn Metric> {
        self.registered_metric(name).map(|it| it.metric.as_ref())
    }

    /// Names the metric reads, computed once when it was added.
    pub fn required_counters(&self, metric: &str) -> Option<&[String]> {
        self.registered_metric(metric).map(|it| it.required.as_slice())
    }

    pub fn is_time_event(&self, name: &str) -> bool {
        self.time_event(name).is_some()
    }

    pub fn time_event(&self, name: &str) -> Option<&dyn TimeEvent> {
        match self.time_events.get(name) {
            Some(event) => Some(event.as_ref()),
            None => self.parent.as_deref()?.time_event(name),
        }
    }

    fn registered_metric(&self, name: &str) -> Option<&RegisteredMetric> {
        match self.metrics.get(name) {
            Some(metric) => Some(metric),
            None => self.parent.as_deref()?.registered_metric(name),
        }
    }

    fn entry<'a>(
        pmu: &'a str,
        events: &'a HashMap<String, CounterConfig>,
        name: &str,
    ) -> Option<(&'a str, &'a str, &'a CounterConfig)> {
        events
            .get_key_value(name)
            .map(|(name, config)| (pmu, name.as_str(), config))
    }
}

impl fmt::Debug for CounterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterDefinition")
            .field("parent", &self.parent)
            .field("counters", &self.counters)
            .field("metrics", &self.metrics.keys().collect::<Vec<_>>())
            .field("time_events", &self.time_events.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod test;
