pub(crate) mod attr;
mod precision;
mod target;

pub use precision::*;
pub use target::*;

/// Options shared by every counter an [`EventCounter`][crate::event_counter::EventCounter]
/// opens.
#[derive(Clone, Debug)]
pub struct Config {
    /// Count events that happen in kernel space.
    pub include_kernel: bool,

    /// Count events that happen in user space.
    pub include_user: bool,

    /// Count events that happen in the hypervisor.
    pub include_hypervisor: bool,

    /// Count events while the CPU runs the idle task.
    pub include_idle: bool,

    /// Count events that happen in guest mode.
    pub include_guest: bool,

    /// Child threads created after the counter was opened inherit it.
    pub include_child_threads: bool,

    /// Dump the attributes of every opened counter at `info` level.
    pub is_debug: bool,

    /// Maximum number of groups scheduled at the same time.
    pub num_physical_counters: u8,

    /// Maximum number of events a single group may hold.
    pub num_events_per_physical_counter: u8,

    pub target: Target,

    pub precision_downgrade: DowngradePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_kernel: true,
            include_user: true,
            include_hypervisor: true,
            include_idle: true,
            include_guest: true,
            include_child_threads: false,
            is_debug: false,
            num_physical_counters: 5,
            num_events_per_physical_counter: 4,
            target: Target::default(),
            precision_downgrade: DowngradePolicy::default(),
        }
    }
}

/// Controls when a sample is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeriodOrFrequency {
    /// One sample every `n` events.
    Period(u64),

    /// About `n` samples per second, the kernel adjusts the period dynamically.
    Frequency(u64),
}

impl Default for PeriodOrFrequency {
    fn default() -> Self {
        Self::Period(4000)
    }
}

/// Options of a [`Sampler`][crate::sample::Sampler].
#[derive(Clone, Debug)]
pub struct SampleConfig {
    pub base: Config,

    /// Pages of each sampling buffer, including the header page.
    ///
    /// The number of data pages is rounded up to the next power of two.
    pub buffer_pages: u64,

    /// Default precision for triggers that do not specify one.
    pub precision: Precision,

    /// Default period or frequency for triggers that do not specify one.
    pub period_or_frequency: PeriodOrFrequency,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            base: Config::default(),
            buffer_pages: 4096 + 1,
            precision: Precision::default(),
            period_or_frequency: PeriodOrFrequency::default(),
        }
    }
}

#[cfg(test)]
mod test;
