use super::group::{multiplexing_factor, MAX_MEMBERS};
use super::{Counter, CounterValues, Group};
use crate::definition::CounterConfig;
use crate::error::Error;
use crate::ffi::bindings as b;
use crate::ffi::cursor::Cursor;

fn config(n: u64) -> CounterConfig {
    CounterConfig::new(b::PERF_TYPE_RAW, n)
}

#[test]
fn test_group_capacity() {
    let mut group = Group::default();
    for i in 0..MAX_MEMBERS {
        group.add(format!("event-{i}"), config(i as _)).unwrap();
    }
    assert_eq!(group.len(), 12);

    let e = group.add("one-too-many", config(100)).unwrap_err();
    assert!(matches!(e, Error::MaxCountersReached { max: 12 }));
    assert_eq!(group.len(), 12);
    assert!(!group.contains(&config(100)));
    assert!(group.contains(&config(3)));
}

#[test]
fn test_empty_group() {
    let mut group = Group::default();
    assert!(matches!(group.start(), Err(Error::CannotStartEmptyGroup)));
    // Opening nothing succeeds, stopping a group that never ran is a no-op.
    group.open(&Default::default()).unwrap();
    group.stop().unwrap();
    assert_eq!(group.get(0), None);
}

#[test]
fn test_multiplexing_factor() {
    assert_eq!(multiplexing_factor(100, 100), 1.0);
    assert_eq!(multiplexing_factor(100, 25), 4.0);
    assert_eq!(multiplexing_factor(0, 0), 1.0);
    assert_eq!(multiplexing_factor(100, 0), 1.0);
    // Rounding in the kernel may report slightly more running than enabled time.
    assert_eq!(multiplexing_factor(99, 100), 1.0);

    let group = Group::default();
    assert_eq!(group.multiplexing_factor(), 1.0);
}

#[test]
fn test_parse_values() {
    let words: [u64; 7] = [2, 1000, 500, 11, 7, 22, 8];
    let buf: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();

    let values = CounterValues::parse(&mut Cursor::new(&buf)).unwrap();
    assert_eq!((values.time_enabled, values.time_running), (1000, 500));
    assert_eq!(values.values.as_slice(), [(11, 7), (22, 8)]);
    assert_eq!(values.value(8), Some(22));
    assert_eq!(values.value(9), None);

    assert!(CounterValues::parse(&mut Cursor::new(&buf[..40])).is_err());
    assert_eq!(CounterValues::read_size(2), buf.len());
}

#[test]
fn test_parse_values_caps_members() {
    let mut words = vec![20u64, 1, 1];
    for i in 0..20 {
        words.extend([i, i + 100]);
    }
    words.push(42);
    let buf: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();
    let mut cursor = Cursor::new(&buf);
    let values = CounterValues::parse(&mut cursor).unwrap();
    assert_eq!(values.values.len(), MAX_MEMBERS);
    assert_eq!(values.values.last(), Some(&(11, 111)));
    // Ignored entries are skipped, not left for the next field.
    assert_eq!(cursor.u64(), Ok(42));
    assert_eq!(cursor.remaining(), 0);
}

#[test]
fn test_unopened_counter() {
    let counter = Counter::new("cycles", config(0x3c));
    assert!(!counter.is_open());
    assert_eq!(counter.id(), None);
    assert_eq!(counter.read_live(), None);

    let e = counter.enable().unwrap_err();
    assert!(matches!(e, Error::Ioctl { op: "enable", .. }));
    assert_eq!(e.raw_os_error(), Some(libc::EBADF));

    let e = counter.read_value().unwrap_err();
    assert!(matches!(e, Error::CannotReadCounter(_)));
}

#[test]
fn test_clone_unopened() {
    let mut group = Group::default();
    group.add("a", config(1).with_scale(2.0)).unwrap();
    group.add("b", config(2)).unwrap();

    let copy = group.clone_unopened();
    assert_eq!(copy.len(), 2);
    assert!(!copy.is_open());
    assert_eq!(copy.members()[0].name(), "a");
    assert_eq!(copy.members()[0].config().scale, 2.0);
}
