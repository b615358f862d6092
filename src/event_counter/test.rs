use std::sync::Arc;

use super::{DirectedGraph, EventCounter, EventKind, RequestedEvent, RequestedEventSet, Schedule};
use crate::config::{Config, Cpu, Proc};
use crate::definition::{CounterConfig, CounterDefinition};
use crate::error::Error;
use crate::ffi::bindings as b;
use crate::result::CounterResult;

fn definition() -> Arc<CounterDefinition> {
    let mut definition = CounterDefinition::with_parent(CounterDefinition::shared());
    for i in 0..8 {
        definition.add("cpu", format!("event-{i}"), CounterConfig::new(b::PERF_TYPE_RAW, i));
    }
    // Same configuration as `event-0` under another name.
    definition.add("cpu", "alias-0", CounterConfig::new(b::PERF_TYPE_RAW, 0));
    definition.add("uncore", "event-0", CounterConfig::new(b::PERF_TYPE_RAW, 0x100));
    Arc::new(definition)
}

fn counter() -> EventCounter {
    EventCounter::new(definition(), Config::default())
}

fn events(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("event-{i}")).collect()
}

fn group_sizes(counter: &EventCounter) -> Vec<usize> {
    counter.groups().map(|it| it.len()).collect()
}

#[test]
fn test_append() {
    let mut counter = counter();
    counter.add_all(events(6), Schedule::Append).unwrap();
    assert_eq!(group_sizes(&counter), [4, 2]);

    let event = counter.requested_events().get(None, "event-5").unwrap();
    assert_eq!(event.scheduled_group(), Some((1, 1)));
    assert_eq!(event.kind(), EventKind::HardwareEvent);
    assert!(event.is_shown_in_results());

    // Requesting a scheduled event again does not schedule it twice.
    counter.add("event-5", Schedule::Append).unwrap();
    assert_eq!(group_sizes(&counter), [4, 2]);
}

#[test]
fn test_append_identical_config() {
    let mut counter = counter();
    counter.add("event-0", Schedule::Append).unwrap();
    counter.add("alias-0", Schedule::Append).unwrap();
    assert_eq!(group_sizes(&counter), [1, 1]);

    counter.add("event-1", Schedule::Append).unwrap();
    assert_eq!(group_sizes(&counter), [2, 1]);
}

#[test]
fn test_separate() {
    let mut counter = counter();
    counter.add_all(events(2), Schedule::Separate).unwrap();
    assert_eq!(group_sizes(&counter), [1, 1]);

    // Separate groups are not extended later on.
    counter.add("event-2", Schedule::Append).unwrap();
    assert_eq!(group_sizes(&counter), [1, 1, 1]);
    counter.add("event-3", Schedule::Append).unwrap();
    assert_eq!(group_sizes(&counter), [1, 1, 2]);
}

#[test]
fn test_group() {
    let mut counter = counter();
    counter.add_all(events(3), Schedule::Group).unwrap();
    assert_eq!(group_sizes(&counter), [3]);

    let e = counter.add_all(&events(8)[3..], Schedule::Group).unwrap_err();
    assert!(matches!(
        e,
        Error::CannotAddEventToSingleGroup { requested: 5, capacity: 4 }
    ));
    assert_eq!(group_sizes(&counter), [3]);
    assert_eq!(counter.requested_events().size(), 3);
    assert!(!counter.requested_events().contains(None, "event-3"));
}

#[test]
fn test_max_groups() {
    let config = Config {
        num_physical_counters: 2,
        ..Default::default()
    };
    let mut counter = EventCounter::new(definition(), config);
    counter.add("event-0", Schedule::Separate).unwrap();

    let e = counter.add_all(["event-1", "event-2"], Schedule::Separate).unwrap_err();
    assert!(matches!(e, Error::MaxGroupsReached { max: 2 }));
    assert_eq!(group_sizes(&counter), [1]);
    assert_eq!(counter.requested_events().size(), 1);

    // The first new group takes four events, the other three need a third.
    counter.add_all(events(8), Schedule::Append).unwrap_err();
    assert_eq!(group_sizes(&counter), [1]);
}

#[test]
fn test_metric_dependencies() {
    let mut counter = counter();
    counter.add("instructions-per-cycle", Schedule::Append).unwrap();

    let requested = counter.requested_events();
    let names: Vec<_> = requested.iter().map(|it| it.name()).collect();
    assert_eq!(names, ["instructions", "cycles", "instructions-per-cycle"]);
    assert!(!requested.get(None, "cycles").unwrap().is_shown_in_results());
    let metric = requested.get(None, "instructions-per-cycle").unwrap();
    assert_eq!(metric.kind(), EventKind::Metric);
    assert_eq!(metric.scheduled_group(), None);
    assert_eq!(group_sizes(&counter), [2]);

    // Requesting a dependency makes it visible.
    counter.add("cycles", Schedule::Append).unwrap();
    assert!(counter
        .requested_events()
        .get(None, "cycles")
        .unwrap()
        .is_shown_in_results());
    assert_eq!(counter.requested_events().size(), 3);
    assert_eq!(group_sizes(&counter), [2]);
}

#[test]
fn test_time_events_and_pmu_prefix() {
    let mut counter = counter();
    counter.add_all(["seconds", "uncore/event-0", "event-0"], Schedule::Append).unwrap();

    let requested = counter.requested_events();
    assert_eq!(requested.get(None, "seconds").unwrap().kind(), EventKind::TimeEvent);
    let prefixed = requested.get(Some("uncore"), "event-0").unwrap();
    assert_eq!(prefixed.name(), "uncore/event-0");
    assert_eq!(group_sizes(&counter), [2]);

    let names: Vec<_> = counter.groups().next().unwrap().members().iter().map(|it| it.name()).collect();
    assert_eq!(names, ["uncore/event-0", "event-0"]);
}

#[test]
fn test_unknown_names() {
    let mut counter = counter();
    let e = counter.add("no-such-event", Schedule::Append).unwrap_err();
    assert!(matches!(e, Error::CannotFindEventOrMetric(name) if name == "no-such-event"));

    let e = counter.add("uncore/seconds", Schedule::Append).unwrap_err();
    assert!(matches!(e, Error::CannotFindEventOrMetric(_)));

    let mut definition = CounterDefinition::with_parent(CounterDefinition::shared());
    definition.add_formula("broken", "cycles / no-such-event").unwrap();
    let mut counter = EventCounter::new(Arc::new(definition), Config::default());
    let e = counter.add("broken", Schedule::Append).unwrap_err();
    assert!(matches!(
        e,
        Error::CannotFindEventForMetric { metric, event } if metric == "broken" && event == "no-such-event"
    ));
    assert!(counter.requested_events().is_empty());
    assert_eq!(counter.groups().count(), 0);
}

#[test]
fn test_metric_cycle() {
    let mut definition = CounterDefinition::with_parent(CounterDefinition::shared());
    definition.add_formula("ping", "pong * cycles").unwrap();
    definition.add_formula("pong", "ping + instructions").unwrap();
    definition.add_formula("self", "self * 2").unwrap();
    let mut counter = EventCounter::new(Arc::new(definition), Config::default());

    let e = counter.add("ping", Schedule::Append).unwrap_err();
    assert!(matches!(e, Error::MetricDependencyCycle(name) if name == "ping"));
    let e = counter.add("self", Schedule::Append).unwrap_err();
    assert!(matches!(e, Error::MetricDependencyCycle(name) if name == "self"));
    assert!(counter.requested_events().is_empty());
}

#[test]
fn test_evaluate() {
    let mut definition = CounterDefinition::with_parent(CounterDefinition::shared());
    definition.add_formula("doubled-ipc", "instructions-per-cycle * 2").unwrap();
    let mut counter = EventCounter::new(Arc::new(definition), Config::default());
    counter.add_all(["doubled-ipc", "instructions", "cache-miss-ratio"], Schedule::Append).unwrap();

    let mut raw = CounterResult::default();
    raw.push("instructions", 3000.0);
    raw.push("cycles", 1000.0);

    // `instructions` was first requested as a dependency, `cache-miss-ratio`
    // lacks its inputs and is left out.
    let result = counter.evaluate(raw);
    assert_eq!(
        result.into_inner(),
        [("instructions".to_string(), 3000.0), ("doubled-ipc".to_string(), 6.0)]
    );
}

#[test]
fn test_result_of_unstarted_counter() {
    let mut counter = counter();
    counter.add_all(["event-0", "seconds"], Schedule::Append).unwrap();
    assert!(counter.result(1).is_empty());
    // Stopping an unstarted counter is a no-op.
    counter.stop().unwrap();
}

#[test]
fn test_open_rejects_any_process_on_any_core() {
    let config = Config {
        target: (Proc::ALL, Cpu::ALL).into(),
        ..Default::default()
    };
    let mut counter = EventCounter::new(definition(), config);
    counter.add("event-0", Schedule::Append).unwrap();
    assert!(matches!(counter.open(), Err(Error::InvalidConfigAnyCpuCoreAndAnyProcess)));
    assert!(matches!(counter.start(), Err(Error::InvalidConfigAnyCpuCoreAndAnyProcess)));
    assert!(!counter.groups().next().unwrap().is_open());
}

#[test]
fn test_copy_from_template() {
    let mut template = counter();
    template.add_all(events(5), Schedule::Append).unwrap();
    template.add_live(["cycles"]).unwrap();

    let copy = template.copy_from_template();
    assert_eq!(group_sizes(&copy), [4, 1]);
    assert_eq!(copy.requested_events().size(), 5);
    assert!(copy.groups().all(|it| !it.is_open()));
    assert!(Arc::ptr_eq(copy.definition(), template.definition()));
}

#[test]
fn test_add_live() {
    let mut counter = counter();
    let e = counter.add_live(["cycles", "no-such-event"]).unwrap_err();
    assert!(matches!(e, Error::CannotFindEvent(name) if name == "no-such-event"));
    assert!(counter.live_result().unwrap().is_empty());

    counter.add_live(["cycles", "cycles", "instructions"]).unwrap();
    let result = counter.live_result().unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result.get("cycles"), Some(0.0));
}

#[test]
fn test_requested_event_set() {
    let mut set = RequestedEventSet::default();
    assert!(set.add(RequestedEvent::new(None, "cycles", EventKind::HardwareEvent, false)));
    assert!(!set.add(RequestedEvent::new(None, "cycles", EventKind::HardwareEvent, true)));
    assert!(!set.add(RequestedEvent::new(None, "cycles", EventKind::HardwareEvent, false)));
    assert_eq!(set.size(), 1);
    assert!(set.get(None, "cycles").unwrap().is_shown_in_results());

    assert!(!set.adjust_visibility_if_present(Some("cpu"), "cycles", true));
    assert!(!set.contains(Some("cpu"), "cycles"));
    assert_eq!(set.size(), 1);

    // A hidden dependency becomes visible when requested directly.
    assert!(set.add(RequestedEvent::new(None, "instructions", EventKind::HardwareEvent, false)));
    assert!(set.adjust_visibility_if_present(None, "instructions", false));
    assert!(!set.get(None, "instructions").unwrap().is_shown_in_results());
    assert!(set.adjust_visibility_if_present(None, "instructions", true));
    assert!(set.get(None, "instructions").unwrap().is_shown_in_results());
    assert_eq!(set.size(), 2);

    // Visibility is never taken back.
    assert!(set.adjust_visibility_if_present(None, "instructions", false));
    assert!(!set.add(RequestedEvent::new(None, "instructions", EventKind::HardwareEvent, false)));
    assert!(set.get(None, "instructions").unwrap().is_shown_in_results());
    assert_eq!(set.size(), 2);

    let names: Vec<_> = set.iter().map(|it| it.name()).collect();
    assert_eq!(names, ["cycles", "instructions"]);
}

#[test]
fn test_directed_graph() {
    let mut graph = DirectedGraph::default();
    graph.connect("cycles-per-instruction", "gigahertz-per-instruction");
    graph.connect("gigahertz", "gigahertz-per-instruction");
    graph.insert("standalone");
    assert!(!graph.is_cyclic());
    assert_eq!(graph.len(), 4);

    let order: Vec<_> = std::iter::from_fn(|| graph.pop()).collect();
    assert_eq!(
        order,
        ["cycles-per-instruction", "gigahertz", "gigahertz-per-instruction", "standalone"]
    );
    assert!(graph.is_empty());

    let mut graph = DirectedGraph::default();
    graph.connect(1, 2);
    graph.connect(2, 3);
    assert!(!graph.is_cyclic());
    graph.connect(3, 1);
    assert!(graph.is_cyclic());
    assert_eq!(graph.pop(), None);
}
