use super::{sort_by_timestamp, Sample, Sampler};
use crate::config::{Cpu, Proc};
use crate::error::{Error, Result};

fn merge<'a>(samplers: impl Iterator<Item = &'a mut Sampler>, sort_by_time: bool) -> Vec<Sample> {
    let mut samples: Vec<_> = samplers.flat_map(|it| it.result(false)).collect();
    if sort_by_time {
        sort_by_timestamp(&mut samples);
    }
    samples
}

/// One [`Sampler`] per thread.
///
/// Instance `i` samples the thread it is started from, so it has to be
/// started and stopped by thread `i`.
#[derive(Debug)]
pub struct MultiThreadSampler {
    samplers: Vec<Sampler>,
}

impl MultiThreadSampler {
    pub fn new(template: &Sampler, num_threads: usize) -> Self {
        Self {
            samplers: (0..num_threads)
                .map(|_| template.copy_from_template())
                .collect(),
        }
    }

    pub fn samplers_mut(&mut self) -> &mut [Sampler] {
        &mut self.samplers
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Sampler> {
        let len = self.samplers.len();
        self.samplers
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Starts the instance of thread `thread`; call from that thread.
    pub fn start(&mut self, thread: usize) -> Result<()> {
        self.get_mut(thread)?.start()
    }

    pub fn stop(&mut self, thread: usize) -> Result<()> {
        self.get_mut(thread)?.stop()
    }

    pub fn close(&mut self) {
        self.samplers.iter_mut().for_each(Sampler::close);
    }

    /// Samples of every thread.
    pub fn result(&mut self, sort_by_time: bool) -> Vec<Sample> {
        merge(self.samplers.iter_mut(), sort_by_time)
    }
}

/// One [`Sampler`] per CPU core, sampling every process on it.
///
/// # Examples
///
/// ```rust,no_run
/// use perf_counters::config::SampleConfig;
/// use perf_counters::definition::CounterDefinition;
/// use perf_counters::sample::{MultiCoreSampler, Sampler};
///
/// let mut template = Sampler::new(CounterDefinition::shared(), SampleConfig::default());
/// template.trigger("cycles").unwrap();
/// template.values_mut().timestamp(true).cpu_id(true);
///
/// let mut sampler = MultiCoreSampler::new(&template, &[0, 1]);
/// sampler.start().unwrap();
/// // ... sampled code ...
/// sampler.stop().unwrap();
///
/// let samples = sampler.result(true);
/// sampler.close();
/// ```
#[derive(Debug)]
pub struct MultiCoreSampler {
    samplers: Vec<Sampler>,
}

impl MultiCoreSampler {
    pub fn new(template: &Sampler, cores: &[u32]) -> Self {
        let samplers = cores
            .iter()
            .map(|&core| {
                let mut sampler = template.copy_from_template();
                sampler.set_target((Proc::ALL, Cpu(core)).into());
                sampler
            })
            .collect();
        Self { samplers }
    }

    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    pub fn start(&mut self) -> Result<()> {
        self.samplers.iter_mut().try_for_each(Sampler::start)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.samplers.iter_mut().try_for_each(Sampler::stop)
    }

    pub fn close(&mut self) {
        self.samplers.iter_mut().for_each(Sampler::close);
    }

    /// Samples of every core.
    pub fn result(&mut self, sort_by_time: bool) -> Vec<Sample> {
        merge(self.samplers.iter_mut(), sort_by_time)
    }
}
