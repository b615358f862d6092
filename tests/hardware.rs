//! Tests against the real PMU, run with `cargo test -- --ignored` on a host
//! that permits `perf_event_open` (see `/proc/sys/kernel/perf_event_paranoid`).

use std::hint::black_box;

use perf_counters::config::{Config, SampleConfig};
use perf_counters::definition::CounterDefinition;
use perf_counters::event_counter::{EventCounter, MultiThreadEventCounter, Schedule};
use perf_counters::sample::{Sampler, Trigger};

fn fib(n: u64) -> u64 {
    match n {
        0 => 0,
        1 => 1,
        n => fib(n - 1) + fib(n - 2),
    }
}

#[test]
#[ignore]
fn test_instructions_per_cycle() {
    let mut counter = EventCounter::new(CounterDefinition::shared(), Config::default());
    counter
        .add_all(["instructions", "cycles", "instructions-per-cycle", "seconds"], Schedule::Append)
        .unwrap();

    counter.start().unwrap();
    black_box(fib(black_box(25)));
    counter.stop().unwrap();
    let result = counter.result(1);

    let instructions = result.get("instructions").unwrap();
    let cycles = result.get("cycles").unwrap();
    let ipc = result.get("instructions-per-cycle").unwrap();
    assert!(instructions > 0.0 && cycles > 0.0);
    assert!((ipc - instructions / cycles).abs() < 1e-9);
    assert!(result.get("seconds").unwrap() >= 0.0);

    // A second stop keeps the values.
    counter.stop().unwrap();
    assert_eq!(counter.result(1), result);
    counter.close();
}

#[test]
#[ignore]
fn test_multi_thread_sum() {
    let mut template = EventCounter::new(CounterDefinition::shared(), Config::default());
    template.add("instructions", Schedule::Append).unwrap();

    let mut counter = MultiThreadEventCounter::new(template, 2);
    std::thread::scope(|s| {
        for it in counter.counters_mut() {
            s.spawn(move || {
                it.start().unwrap();
                black_box(fib(black_box(20)));
                it.stop().unwrap();
            });
        }
    });

    let total = counter.result(1).get("instructions").unwrap();
    let parts: f64 = counter
        .counters()
        .iter()
        .map(|it| it.result(1).get("instructions").unwrap())
        .sum();
    assert_eq!(total, parts);
    counter.close();
}

#[test]
#[ignore]
fn test_sampling_survives_buffer_overflow() {
    let config = SampleConfig {
        buffer_pages: 5,
        ..Default::default()
    };
    let mut sampler = Sampler::new(CounterDefinition::shared(), config);
    sampler.trigger(Trigger::new("cycles").with_period(10_000)).unwrap();
    sampler.values_mut().timestamp(true).instruction_pointer(true);

    sampler.start().unwrap();
    black_box(fib(black_box(32)));
    sampler.stop().unwrap();

    let samples = sampler.result(true);
    sampler.close();

    // Header and two fields, four data pages.
    let capacity = 4 * 4096 / 24;
    let recorded: Vec<_> = samples.iter().filter(|it| it.loss.is_none()).collect();
    assert!(recorded.len() > capacity, "{} samples", recorded.len());

    let timestamps: Vec<_> = recorded.iter().filter_map(|it| it.metadata.timestamp).collect();
    assert!(timestamps.windows(2).all(|it| it[0] <= it[1]));
    assert!(recorded
        .iter()
        .all(|it| it.instruction_execution.logical_instruction_pointer.is_some()));
}
