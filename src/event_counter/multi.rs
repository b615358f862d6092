use super::{EventCounter, EventKind};
use crate::config::{Cpu, Proc};
use crate::error::{Error, Result};
use crate::result::CounterResult;

/// Copies of one template, measured separately and reported together.
#[derive(Debug)]
struct Instances {
    template: EventCounter,
    counters: Vec<EventCounter>,
}

impl Instances {
    fn new(template: EventCounter, counters: Vec<EventCounter>) -> Self {
        Self { template, counters }
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut EventCounter> {
        let len = self.counters.len();
        self.counters
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    fn start(&mut self) -> Result<()> {
        self.counters.iter_mut().try_for_each(EventCounter::start)
    }

    fn stop(&mut self) -> Result<()> {
        self.counters.iter_mut().try_for_each(EventCounter::stop)
    }

    fn close(&mut self) {
        self.counters.iter_mut().for_each(EventCounter::close);
    }

    /// Sums hardware values, takes the longest time events, then computes the
    /// metrics on the totals.
    fn result(&self, normalization: u64) -> CounterResult {
        let raws: Vec<_> = self
            .counters
            .iter()
            .map(|it| it.raw_result(normalization))
            .collect();

        let mut total = CounterResult::default();
        for event in self.template.requested_events() {
            let name = event.name();
            let values = raws.iter().filter_map(|raw| raw.get(&name));
            let value = match event.kind() {
                EventKind::HardwareEvent => values.reduce(|a, b| a + b),
                EventKind::TimeEvent => values.reduce(f64::max),
                EventKind::Metric => None,
            };
            if let Some(value) = value {
                total.push(name, value);
            }
        }
        self.template.evaluate(total)
    }
}

/// One [`EventCounter`] per thread.
///
/// Each instance counts the thread it is started from, so instance `i` has
/// to be started and stopped by thread `i`, e.g. through
/// [`counters_mut`][Self::counters_mut] and [`std::thread::scope`].
///
/// # Examples
///
/// ```rust,no_run
/// use perf_counters::config::Config;
/// use perf_counters::definition::CounterDefinition;
/// use perf_counters::event_counter::{EventCounter, MultiThreadEventCounter, Schedule};
///
/// let mut template = EventCounter::new(CounterDefinition::shared(), Config::default());
/// template.add_all(["instructions", "cycles"], Schedule::Append).unwrap();
///
/// let mut counter = MultiThreadEventCounter::new(template, 4);
/// std::thread::scope(|s| {
///     for it in counter.counters_mut() {
///         s.spawn(move || {
///             it.start().unwrap();
///             // ... measured code ...
///             it.stop().unwrap();
///         });
///     }
/// });
///
/// println!("{}", counter.result(1));
/// ```
#[derive(Debug)]
pub struct MultiThreadEventCounter {
    instances: Instances,
}

impl MultiThreadEventCounter {
    pub fn new(template: EventCounter, num_threads: usize) -> Self {
        let counters = (0..num_threads)
            .map(|_| template.copy_from_template())
            .collect();
        Self {
            instances: Instances::new(template, counters),
        }
    }

    pub fn counters(&self) -> &[EventCounter] {
        &self.instances.counters
    }

    pub fn counters_mut(&mut self) -> &mut [EventCounter] {
        &mut self.instances.counters
    }

    /// Starts the instance of thread `thread`; call from that thread.
    pub fn start(&mut self, thread: usize) -> Result<()> {
        self.instances.get_mut(thread)?.start()
    }

    pub fn stop(&mut self, thread: usize) -> Result<()> {
        self.instances.get_mut(thread)?.stop()
    }

    pub fn close(&mut self) {
        self.instances.close()
    }

    pub fn result(&self, normalization: u64) -> CounterResult {
        self.instances.result(normalization)
    }
}

/// One [`EventCounter`] per process, on any CPU core.
#[derive(Debug)]
pub struct MultiProcessEventCounter {
    instances: Instances,
}

impl MultiProcessEventCounter {
    pub fn new(template: EventCounter, pids: &[u32]) -> Self {
        let counters = pids
            .iter()
            .map(|&pid| {
                let mut counter = template.copy_from_template();
                counter.set_target((Proc(pid), Cpu::ALL).into());
                counter
            })
            .collect();
        Self {
            instances: Instances::new(template, counters),
        }
    }

    pub fn counters(&self) -> &[EventCounter] {
        &self.instances.counters
    }

    pub fn start(&mut self) -> Result<()> {
        self.instances.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.instances.stop()
    }

    pub fn close(&mut self) {
        self.instances.close()
    }

    pub fn result(&self, normalization: u64) -> CounterResult {
        self.instances.result(normalization)
    }
}

/// One [`EventCounter`] per CPU core, counting every process on it.
#[derive(Debug)]
pub struct MultiCoreEventCounter {
    instances: Instances,
}

impl MultiCoreEventCounter {
    pub fn new(template: EventCounter, cores: &[u32]) -> Self {
        let counters = cores
            .iter()
            .map(|&core| {
                let mut counter = template.copy_from_template();
                counter.set_target((Proc::ALL, Cpu(core)).into());
                counter
            })
            .collect();
        Self {
            instances: Instances::new(template, counters),
        }
    }

    pub fn counters(&self) -> &[EventCounter] {
        &self.instances.counters
    }

    pub fn start(&mut self) -> Result<()> {
        self.instances.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.instances.stop()
    }

    pub fn close(&mut self) {
        self.instances.close()
    }

    pub fn result(&self, normalization: u64) -> CounterResult {
        self.instances.result(normalization)
    }
}
