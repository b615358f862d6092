use crate::config::{PeriodOrFrequency, Precision};
use crate::ffi::bindings as b;

/// Raw configuration of a single hardware event.
///
/// Two configs are the same event if their type and primary config word match;
/// extensions, scale and sampling options do not take part in the comparison.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterConfig {
    pub ty: u32,
    /// `config`, `config1` and `config2` of the event attribute.
    pub configs: [u64; 3],
    /// Factor applied to every value read for this event.
    pub scale: f64,
    pub precision: Option<Precision>,
    pub period_or_frequency: Option<PeriodOrFrequency>,
}

impl CounterConfig {
    pub fn new(ty: u32, config: u64) -> Self {
        Self {
            ty,
            configs: [config, 0, 0],
            scale: 1.0,
            precision: None,
            period_or_frequency: None,
        }
    }

    pub fn with_extensions(mut self, config1: u64, config2: u64) -> Self {
        self.configs[1] = config1;
        self.configs[2] = config2;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_period_or_frequency(mut self, period_or_frequency: PeriodOrFrequency) -> Self {
        self.period_or_frequency = Some(period_or_frequency);
        self
    }

    pub fn config(&self) -> u64 {
        self.configs[0]
    }
}

impl PartialEq for CounterConfig {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.configs[0] == other.configs[0]
    }
}

impl Eq for CounterConfig {}

#[derive(Clone, Copy, Debug)]
pub enum Cache {
    L1d,
    L1i,
    Ll,
    Dtlb,
    Itlb,
    Bpu,
    Node,
}

#[derive(Clone, Copy, Debug)]
pub enum Op {
    Read,
    Write,
    Prefetch,
}

#[derive(Clone, Copy, Debug)]
pub enum OpResult {
    Access,
    Miss,
}

impl CounterConfig {
    /// Config of a generic hardware cache event.
    pub fn hw_cache(cache: Cache, op: Op, result: OpResult) -> Self {
        let id = match cache {
            Cache::L1d => b::PERF_COUNT_HW_CACHE_L1D,
            Cache::L1i => b::PERF_COUNT_HW_CACHE_L1I,
            Cache::Ll => b::PERF_COUNT_HW_CACHE_LL,
            Cache::Dtlb => b::PERF_COUNT_HW_CACHE_DTLB,
            Cache::Itlb => b::PERF_COUNT_HW_CACHE_ITLB,
            Cache::Bpu => b::PERF_COUNT_HW_CACHE_BPU,
            Cache::Node => b::PERF_COUNT_HW_CACHE_NODE,
        };
        let op = match op {
            Op::Read => b::PERF_COUNT_HW_CACHE_OP_READ,
            Op::Write => b::PERF_COUNT_HW_CACHE_OP_WRITE,
            Op::Prefetch => b::PERF_COUNT_HW_CACHE_OP_PREFETCH,
        };
        let result = match result {
            OpResult::Access => b::PERF_COUNT_HW_CACHE_RESULT_ACCESS,
            OpResult::Miss => b::PERF_COUNT_HW_CACHE_RESULT_MISS,
        };
        Self::new(b::PERF_TYPE_HW_CACHE, id | (op << 8) | (result << 16))
    }
}
