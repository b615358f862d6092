use std::hint::black_box;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use super::buffer::{copy_unread, data_pages, wakeup_watermark, MmapBuffer, OverflowWorker};
use super::{
    build_sample_counters, sort_by_timestamp, CounterRole, Sample, Sampler, Trigger, Values, MAX_USER_STACK,
};
use crate::config::attr::sampling;
use crate::config::{Cpu, PeriodOrFrequency, Precision, Proc, SampleConfig};
use crate::definition::{CounterConfig, CounterDefinition};
use crate::error::Error;
use crate::ffi::bindings as b;
use crate::ffi::syscall::{eventfd, ioctl_arg, perf_event_open, write};
use crate::ffi::PAGE_SIZE;

fn definition() -> Arc<CounterDefinition> {
    let mut definition = CounterDefinition::with_parent(CounterDefinition::shared());
    definition.add("cpu", "mem-loads", CounterConfig::new(b::PERF_TYPE_RAW, 0x1cd));
    definition.add("cpu", "mem-stores", CounterConfig::new(b::PERF_TYPE_RAW, 0x2cd));
    Arc::new(definition)
}

fn sampler() -> Sampler {
    Sampler::new(definition(), SampleConfig::default())
}

fn names(counter: &super::SampleCounter) -> Vec<&str> {
    counter.group().members().iter().map(|it| it.name()).collect()
}

#[test]
fn test_trigger_validation() {
    let mut sampler = sampler();
    sampler.trigger("cycles").unwrap();

    let e = sampler.trigger("instructions-per-cycle").unwrap_err();
    assert!(matches!(e, Error::MetricNotSupportedAsSamplingTrigger(name) if name == "instructions-per-cycle"));
    let e = sampler.trigger("seconds").unwrap_err();
    assert!(matches!(e, Error::TimeEventNotSupportedForSampling(_)));
    let e = sampler.trigger_group(["mem-loads", "no-such-event"]).unwrap_err();
    assert!(matches!(e, Error::CannotFindEvent(name) if name == "no-such-event"));

    assert_eq!(sampler.triggers(), [vec![Trigger::new("cycles")]]);

    sampler
        .trigger_groups([
            vec![Trigger::new("cpu/mem-loads").with_period(1000)],
            vec![Trigger::new("mem-stores").with_frequency(10)],
        ])
        .unwrap();
    assert_eq!(sampler.triggers().len(), 2);
    assert_eq!(sampler.triggers()[0][0].name(), "cpu/mem-loads");
}

#[test]
fn test_open_without_trigger() {
    let mut sampler = sampler();
    assert!(matches!(sampler.open(), Err(Error::CannotStartEmptySampler)));
    assert!(matches!(sampler.start(), Err(Error::CannotStartEmptySampler)));
    assert!(sampler.sample_counters().is_empty());
    assert!(sampler.result(true).is_empty());
}

#[test]
fn test_open_rejects_any_process_on_any_core() {
    let mut config = SampleConfig::default();
    config.base.target = (Proc::ALL, Cpu::ALL).into();
    let mut sampler = Sampler::new(definition(), config);
    sampler.trigger("cycles").unwrap();
    assert!(matches!(sampler.open(), Err(Error::InvalidConfigAnyCpuCoreAndAnyProcess)));
}

#[test]
fn test_auxiliary_leader() {
    let definition = definition();
    let triggers = vec![vec![Trigger::new("mem-loads"), Trigger::new("mem-stores")]];
    let values = Values::default();

    let counters = build_sample_counters(&definition, &triggers, &values, true).unwrap();
    assert_eq!(counters.len(), 1);
    assert_eq!(names(&counters[0]), ["mem-loads-aux", "mem-loads", "mem-stores"]);
    assert_eq!(
        counters[0].roles(),
        [CounterRole::Auxiliary, CounterRole::Trigger, CounterRole::Trigger]
    );
    assert!(counters[0].has_auxiliary_event());

    let counters = build_sample_counters(&definition, &triggers, &values, false).unwrap();
    assert_eq!(names(&counters[0]), ["mem-loads", "mem-stores"]);
    assert!(!counters[0].has_auxiliary_event());

    // Only memory loads need the auxiliary event.
    let triggers = vec![vec![Trigger::new("mem-stores")]];
    let counters = build_sample_counters(&definition, &triggers, &values, true).unwrap();
    assert_eq!(names(&counters[0]), ["mem-stores"]);

    // A listed auxiliary event leads regardless of its position.
    let triggers = vec![vec![Trigger::new("mem-loads"), Trigger::new("mem-loads-aux")]];
    let counters = build_sample_counters(&definition, &triggers, &values, false).unwrap();
    assert_eq!(names(&counters[0]), ["mem-loads-aux", "mem-loads"]);
    assert_eq!(counters[0].roles()[0], CounterRole::Auxiliary);
}

#[test]
fn test_value_counters() {
    let definition = definition();
    let triggers = vec![vec![Trigger::new("cycles")], vec![], vec![Trigger::new("mem-stores")]];
    let mut values = Values::default();
    values.counter(["instructions", "cycles"]);

    let counters = build_sample_counters(&definition, &triggers, &values, false).unwrap();
    // Empty trigger groups are skipped.
    assert_eq!(counters.len(), 2);
    assert_eq!(names(&counters[0]), ["cycles", "instructions"]);
    assert_eq!(counters[0].roles(), [CounterRole::Trigger, CounterRole::Value]);
    assert_eq!(names(&counters[1]), ["mem-stores", "instructions", "cycles"]);

    values.counter(["no-such-event"]);
    let e = build_sample_counters(&definition, &triggers, &values, false).unwrap_err();
    assert!(matches!(e, Error::CannotFindEvent(_)));
}

#[test]
fn test_copy_from_template() {
    let mut template = sampler();
    template.trigger("cycles").unwrap();
    template.values_mut().timestamp(true);

    let copy = template.copy_from_template();
    assert_eq!(copy.triggers(), template.triggers());
    assert_eq!(copy.values().sample_type(), b::PERF_SAMPLE_TIME);
    assert!(copy.sample_counters().is_empty());
}

#[test]
fn test_user_stack_size() {
    let mut values = Values::default();
    values.user_stack(13);
    assert_eq!(values.max_user_stack(), 16);
    assert_eq!(values.sample_type(), b::PERF_SAMPLE_STACK_USER);

    values.user_stack(u32::MAX);
    assert_eq!(values.max_user_stack(), MAX_USER_STACK);
    assert_eq!(MAX_USER_STACK % 8, 0);
    assert!(MAX_USER_STACK < u16::MAX as u32);

    values.user_stack(0);
    assert_eq!(values.max_user_stack(), 0);
    assert_eq!(values.sample_type(), 0);
}

#[test]
fn test_sort_by_timestamp() {
    let sample = |timestamp: Option<u64>, loss: u64| {
        let mut sample = Sample {
            loss: Some(loss),
            ..Default::default()
        };
        sample.metadata.timestamp = timestamp;
        sample
    };
    let mut samples = vec![sample(None, 0), sample(Some(30), 1), sample(Some(10), 2), sample(None, 3)];
    sort_by_timestamp(&mut samples);

    let order: Vec<_> = samples.iter().map(|it| it.loss.unwrap()).collect();
    assert_eq!(order, [2, 1, 0, 3]);
}

#[test]
fn test_buffer_size() {
    assert_eq!(data_pages(5), 4);
    assert_eq!(data_pages(4097), 4096);
    assert_eq!(data_pages(7), 8);
    assert_eq!(data_pages(0), 1);
    assert_eq!(data_pages(1), 1);
    assert_eq!(wakeup_watermark(5) as usize, 2 * *PAGE_SIZE);
}

#[test]
fn test_copy_unread() {
    let data: Vec<u8> = (0..8).collect();
    assert_eq!(copy_unread(&data, 2, 5), [2, 3, 4]);
    // Positions keep growing past the buffer size.
    assert_eq!(copy_unread(&data, 14, 19), [6, 7, 0, 1, 2]);
    assert_eq!(copy_unread(&data, 3, 3), []);
    // Never more than the buffer holds.
    assert_eq!(copy_unread(&data, 0, 100).len(), 8);
    assert!(copy_unread(&[], 0, 8).is_empty());
}

#[test]
fn test_overflow_worker() {
    crate::test_utils::init_logging();

    // An eventfd stands in for a counter signalling overflows.
    let counter = Arc::new(eventfd(0, libc::EFD_CLOEXEC).unwrap());
    let (tx, rx) = mpsc::channel();
    let mut worker = OverflowWorker::spawn(Arc::clone(&counter), move || {
        let _ = tx.send(());
    })
    .unwrap();

    assert!(rx.try_recv().is_err());
    write(&counter, &1u64.to_ne_bytes()).unwrap();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    worker.cancel();
    // Cancelling twice is a no-op.
    worker.cancel();
}

fn spin_until(deadline: Instant, mut done: impl FnMut() -> bool) {
    let mut x = 0u64;
    while !done() && Instant::now() < deadline {
        for i in 0..10_000 {
            x = black_box(x.wrapping_add(i));
        }
    }
}

#[test]
fn test_cancel_stops_draining() {
    crate::test_utils::init_logging();

    // `cpu-clock` samples without a PMU.
    let mut config = SampleConfig {
        buffer_pages: 3,
        ..Default::default()
    };
    config.base.include_kernel = false;
    config.base.include_hypervisor = false;
    let mut values = Values::default();
    values.timestamp(true).instruction_pointer(true);

    let event = CounterConfig::new(b::PERF_TYPE_SOFTWARE, b::PERF_COUNT_SW_CPU_CLOCK);
    let trigger = Some((Precision::AllowArbitrarySkid, PeriodOrFrequency::Period(10_000)));
    let attr = sampling(&event, &config, &values, trigger, wakeup_watermark(config.buffer_pages));
    let counter = Arc::new(perf_event_open(&attr, 0, -1, -1, b::PERF_FLAG_FD_CLOEXEC).unwrap());
    let mut buffer = MmapBuffer::new(&counter, config.buffer_pages).unwrap();

    ioctl_arg(&counter, b::PERF_EVENT_IOC_ENABLE, 0).unwrap();
    spin_until(Instant::now() + Duration::from_secs(10), || buffer.chunk_count() > 0);
    assert!(buffer.chunk_count() > 0);

    let start = Instant::now();
    buffer.cancel();
    assert!(start.elapsed() < Duration::from_secs(1), "{:?}", start.elapsed());
    let chunks = buffer.chunk_count();

    // The kernel keeps writing, nobody drains it anymore.
    spin_until(Instant::now() + Duration::from_millis(200), || false);
    assert_eq!(buffer.chunk_count(), chunks);
    ioctl_arg(&counter, b::PERF_EVENT_IOC_DISABLE, 0).unwrap();

    // Records left in the ring are picked up by the final drain.
    let data = buffer.consume_data();
    assert!(data.len() >= chunks);
    assert!(data.iter().all(|it| !it.is_empty()));
    assert!(buffer.consume_data().is_empty());
}
