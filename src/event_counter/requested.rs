/// What a requested name resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    HardwareEvent,
    Metric,
    TimeEvent,
}

/// An event, metric or time event requested from an
/// [`EventCounter`][super::EventCounter], directly or as a dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestedEvent {
    pmu_name: Option<String>,
    event_name: String,
    is_shown_in_results: bool,
    kind: EventKind,
    scheduled_group: Option<(usize, usize)>,
}

impl RequestedEvent {
    pub fn new(
        pmu_name: Option<String>,
        event_name: impl Into<String>,
        kind: EventKind,
        is_shown_in_results: bool,
    ) -> Self {
        Self {
            pmu_name,
            event_name: event_name.into(),
            is_shown_in_results,
            kind,
            scheduled_group: None,
        }
    }

    pub fn pmu_name(&self) -> Option<&str> {
        self.pmu_name.as_deref()
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Name in results: `pmu/event` when requested with a PMU.
    pub fn name(&self) -> String {
        match &self.pmu_name {
            Some(pmu) => format!("{}/{}", pmu, self.event_name),
            None => self.event_name.clone(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_shown_in_results(&self) -> bool {
        self.is_shown_in_results
    }

    /// `(group, member)` position of a hardware event.
    pub fn scheduled_group(&self) -> Option<(usize, usize)> {
        self.scheduled_group
    }

    pub(super) fn schedule(&mut self, group: usize, member: usize) {
        self.scheduled_group = Some((group, member));
    }

    fn is(&self, pmu_name: Option<&str>, event_name: &str) -> bool {
        self.pmu_name.as_deref() == pmu_name && self.event_name == event_name
    }
}

/// Requested events keyed by `(pmu, event)`, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct RequestedEventSet {
    events: Vec<RequestedEvent>,
}

impl RequestedEventSet {
    /// Inserts the event; a present event only becomes visible if the new
    /// request is.
    ///
    /// Returns `false` if the event was already present.
    pub fn add(&mut self, event: RequestedEvent) -> bool {
        match self.get_mut(event.pmu_name(), event.event_name()) {
            Some(present) => {
                present.is_shown_in_results |= event.is_shown_in_results;
                false
            }
            None => {
                self.events.push(event);
                true
            }
        }
    }

    /// Makes a present event visible, `false` if it is not present.
    pub fn adjust_visibility_if_present(
        &mut self,
        pmu_name: Option<&str>,
        event_name: &str,
        is_shown_in_results: bool,
    ) -> bool {
        match self.get_mut(pmu_name, event_name) {
            Some(present) => {
                present.is_shown_in_results |= is_shown_in_results;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, pmu_name: Option<&str>, event_name: &str) -> Option<&RequestedEvent> {
        self.events.iter().find(|it| it.is(pmu_name, event_name))
    }

    pub(super) fn get_mut(
        &mut self,
        pmu_name: Option<&str>,
        event_name: &str,
    ) -> Option<&mut RequestedEvent> {
        self.events.iter_mut().find(|it| it.is(pmu_name, event_name))
    }

    pub fn contains(&self, pmu_name: Option<&str>, event_name: &str) -> bool {
        self.get(pmu_name, event_name).is_some()
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RequestedEvent> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a RequestedEventSet {
    type Item = &'a RequestedEvent;
    type IntoIter = std::slice::Iter<'a, RequestedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
