use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::provider::parse_csv;
use super::{split_pmu, CounterConfig, CounterDefinition, Elapsed, TimeEvent};
use crate::error::Error;
use crate::ffi::bindings as b;
use crate::result::CounterResult;

#[test]
fn test_builtin_events() {
    let definition = CounterDefinition::new();

    let (pmu, name, config) = definition.get(None, "instructions").unwrap();
    assert_eq!((pmu, name), ("cpu", "instructions"));
    assert_eq!(config.ty, b::PERF_TYPE_HARDWARE);
    assert_eq!(config.config(), b::PERF_COUNT_HW_INSTRUCTIONS);

    let (_, _, config) = definition.get(None, "L1-dcache-load-misses").unwrap();
    assert_eq!(config.ty, b::PERF_TYPE_HW_CACHE);
    assert_eq!(config.config(), 1 << 16);

    let (_, _, config) = definition.get(Some("cpu"), "dTLB-load-misses").unwrap();
    assert_eq!(config.config(), 3 | (1 << 16));

    assert!(definition.get(None, "no-such-event").is_none());
    assert!(definition.get(Some("uncore"), "instructions").is_none());
}

#[test]
fn test_builtin_metrics_and_time_events() {
    let definition = CounterDefinition::new();

    assert!(definition.is_metric("instructions-per-cycle"));
    assert_eq!(
        definition.required_counters("instructions-per-cycle").unwrap(),
        ["instructions", "cycles"]
    );
    assert_eq!(
        definition.required_counters("gigahertz").unwrap(),
        ["cycles", "nanoseconds"]
    );
    for name in ["seconds", "milliseconds", "microseconds", "nanoseconds"] {
        assert!(definition.is_time_event(name), "{name}");
    }
    assert!(!definition.is_metric("cycles"));

    let mut result = CounterResult::default();
    result.push("cache-references", 100.0);
    result.push("cache-misses", 25.0);
    let hit = definition.metric("cache-hit-ratio").unwrap();
    assert_eq!(hit.calculate(&result), Some(0.75));
    let miss = definition.metric("cache-miss-ratio").unwrap();
    assert_eq!(miss.calculate(&result), Some(0.25));
}

#[test]
fn test_pmu_preference() {
    let mut definition = CounterDefinition::empty();
    definition.add("uncore_b", "loads", CounterConfig::new(20, 2));
    definition.add("uncore_a", "loads", CounterConfig::new(10, 1));

    // Without the default PMU the first PMU in name order wins.
    let (pmu, _, _) = definition.get(None, "loads").unwrap();
    assert_eq!(pmu, "uncore_a");

    definition.add("cpu", "loads", CounterConfig::new(4, 0x81d0));
    let (pmu, _, config) = definition.get(None, "loads").unwrap();
    assert_eq!(pmu, "cpu");
    assert_eq!(config.config(), 0x81d0);

    let (pmu, _, config) = definition.get(Some("uncore_b"), "loads").unwrap();
    assert_eq!((pmu, config.ty), ("uncore_b", 20));

    let all: Vec<_> = definition
        .get_all("loads")
        .into_iter()
        .map(|(pmu, _, _)| pmu)
        .collect();
    assert_eq!(all, ["cpu", "uncore_a", "uncore_b"]);
    assert!(definition.get(Some("uncore_c"), "loads").is_none());
}

#[test]
fn test_layering() {
    let parent = CounterDefinition::shared();
    let mut child = CounterDefinition::with_parent(Arc::clone(&parent));
    child.add("cpu", "cycles", CounterConfig::new(b::PERF_TYPE_RAW, 0x3c));
    child.add_formula("double-ipc", "2 * instructions-per-cycle").unwrap();
    child.add_time_event("minutes", |start: Instant, end: Instant| {
        (end - start).as_secs_f64() / 60.0
    });

    // The child shadows the parent, the parent stays untouched.
    assert_eq!(child.get(None, "cycles").unwrap().2.ty, b::PERF_TYPE_RAW);
    assert_eq!(parent.get(None, "cycles").unwrap().2.ty, b::PERF_TYPE_HARDWARE);
    assert!(child.get(None, "instructions").is_some());
    assert!(child.is_metric("double-ipc"));
    assert!(child.is_metric("instructions-per-cycle"));
    assert!(!parent.is_metric("double-ipc"));
    assert!(child.is_time_event("minutes"));
    assert!(child.is_time_event("seconds"));
    assert!(!parent.is_time_event("minutes"));
}

#[test]
fn test_elapsed() {
    let start = Instant::now();
    let end = start + Duration::from_millis(1500);
    assert_eq!(Elapsed::Seconds.calculate(start, end), 1.5);
    assert_eq!(Elapsed::Milliseconds.calculate(start, end), 1500.0);
    assert_eq!(Elapsed::Microseconds.calculate(start, end), 1_500_000.0);
    assert_eq!(Elapsed::Nanoseconds.calculate(start, end), 1_500_000_000.0);
    assert_eq!(Elapsed::Seconds.calculate(end, start), 0.0);
}

#[test]
fn test_split_pmu() {
    assert_eq!(split_pmu("cycles"), (None, "cycles"));
    assert_eq!(split_pmu("cpu/cycles"), (Some("cpu"), "cycles"));
    assert_eq!(split_pmu("/cycles"), (None, "/cycles"));
}

#[test]
fn test_parse_csv() {
    let content = "\
# pmu,name,type,config[,ext1,ext2][,scale]
cpu,loads,raw,0x81d0

cpu,stores,4,0x82d0,0.5
uncore,reads,,0x10,1,2
uncore,writes,hardware,7,0x1,0x2,64
";
    let mut definition = CounterDefinition::empty();
    parse_csv(content, &mut definition, |pmu| match pmu {
        "uncore" => Ok(42),
        _ => Err(io::Error::from_raw_os_error(libc::ENOENT)),
    })
    .unwrap();

    let (_, _, loads) = definition.get(None, "loads").unwrap();
    assert_eq!((loads.ty, loads.config(), loads.scale), (4, 0x81d0, 1.0));

    let (_, _, stores) = definition.get(None, "stores").unwrap();
    assert_eq!(stores.scale, 0.5);

    let (_, _, reads) = definition.get(Some("uncore"), "reads").unwrap();
    assert_eq!((reads.ty, reads.configs), (42, [0x10, 1, 2]));

    let (_, _, writes) = definition.get(Some("uncore"), "writes").unwrap();
    assert_eq!(writes.ty, b::PERF_TYPE_HARDWARE);
    assert_eq!((writes.configs, writes.scale), ([7, 1, 2], 64.0));
}

#[test]
fn test_parse_csv_errors() {
    let resolve = |_: &str| -> io::Result<u32> { Err(io::Error::from_raw_os_error(libc::ENOENT)) };
    for (content, expected_line) in [
        ("cpu,loads,raw", 1),
        ("cpu,loads,raw,0x1\ncpu,bad,raw,zz", 2),
        ("cpu,loads,unknown_type,1", 1),
        ("\n\ncpu,loads,,1", 3),
        ("cpu,loads,raw,1,2,3,4,5", 1),
        ("cpu,,raw,1", 1),
    ] {
        let mut definition = CounterDefinition::empty();
        match parse_csv(content, &mut definition, resolve) {
            Err(Error::InvalidDefinition { line, .. }) => assert_eq!(line, expected_line, "{content}"),
            r => panic!("{content}: unexpected result {r:?}"),
        }
    }
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cpu,my-loads,raw,0x81d0").unwrap();
    let definition = CounterDefinition::from_file(file.path()).unwrap();
    assert!(definition.get(None, "my-loads").is_some());
    assert!(definition.get(None, "cycles").is_some());

    let e = CounterDefinition::from_file("/nonexistent/events.csv").unwrap_err();
    assert!(matches!(e, Error::CannotOpenFile { .. }));
    assert_eq!(e.raw_os_error(), Some(libc::ENOENT));
}
