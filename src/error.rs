use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by counting and sampling.
///
/// Configuration errors are detected before any system call is made. Errors
/// coming from the kernel keep the underlying [`io::Error`] as their source,
/// see [`Error::raw_os_error`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot monitor any process on any CPU core; specify a process, a core, or both")]
    InvalidConfigAnyCpuCoreAndAnyProcess,

    #[error("cannot find event '{0}'")]
    CannotFindEvent(String),

    #[error("cannot find event or metric '{0}'")]
    CannotFindEventOrMetric(String),

    #[error("cannot find event '{event}' required by metric '{metric}'")]
    CannotFindEventForMetric { metric: String, event: String },

    #[error("metric '{0}' depends on itself")]
    MetricDependencyCycle(String),

    #[error("cannot parse metric expression '{expression}': {reason}")]
    CannotParseMetricExpression { expression: String, reason: String },

    #[error("unknown function '{0}' in metric expression")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    UnexpectedFunctionArguments {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("a group can hold at most {max} counters")]
    MaxCountersReached { max: usize },

    #[error("cannot schedule more than {max} groups (physical counters)")]
    MaxGroupsReached { max: usize },

    #[error("cannot add {requested} events to a single group holding at most {capacity}")]
    CannotAddEventToSingleGroup { requested: usize, capacity: usize },

    #[error("cannot start an empty group")]
    CannotStartEmptyGroup,

    #[error("cannot start a sampler without trigger")]
    CannotStartEmptySampler,

    #[error("cannot change the trigger of an opened sampler")]
    CannotChangeTriggerWhenSamplerOpened,

    #[error("metric '{0}' cannot be used as sampling trigger")]
    MetricNotSupportedAsSamplingTrigger(String),

    #[error("time event '{0}' cannot be used for sampling")]
    TimeEventNotSupportedForSampling(String),

    #[error("cannot open counter '{name}': {source}")]
    CannotOpenCounter {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot {op} counter: {source}")]
    Ioctl {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot read counter values: {0}")]
    CannotReadCounter(#[source] io::Error),

    #[error("cannot map sampling buffer: {0}")]
    Mmap(#[source] io::Error),

    #[error("cannot create overflow notification descriptor: {0}")]
    CannotCreateEventFileDescriptor(#[source] io::Error),

    #[error("cannot open file '{}': {source}", path.display())]
    CannotOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid counter definition at line {line}: {reason}")]
    InvalidDefinition { line: usize, reason: String },

    #[error("index {index} is out of range for {len} instance(s)")]
    IndexOutOfRange { index: usize, len: usize },
}

impl Error {
    /// Returns the raw OS error code for errors caused by a failed system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::CannotOpenCounter { source, .. }
            | Self::Ioctl { source, .. }
            | Self::CannotOpenFile { source, .. } => source.raw_os_error(),
            Self::CannotReadCounter(source)
            | Self::Mmap(source)
            | Self::CannotCreateEventFileDescriptor(source) => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
