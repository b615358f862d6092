use super::{Config, PeriodOrFrequency, Precision, SampleConfig};
use crate::definition::CounterConfig;
use crate::ffi::{bindings as b, Attr};
use crate::sample::Values;

// struct read_format {
//     u64 nr;
//     u64 time_enabled;
//     u64 time_running;
//     { u64 value; u64 id; } cntr[nr];
// };
pub(crate) const GROUP_READ_FORMAT: u64 = b::PERF_FORMAT_GROUP
    | b::PERF_FORMAT_ID
    | b::PERF_FORMAT_TOTAL_TIME_ENABLED
    | b::PERF_FORMAT_TOTAL_TIME_RUNNING;

fn base(event: &CounterConfig, config: &Config) -> Attr {
    let mut attr = Attr {
        size: b::PERF_ATTR_SIZE_VER8,
        ..Default::default()
    };

    attr.type_ = event.ty;
    attr.config = event.configs[0];
    attr.config1 = event.configs[1];
    attr.config2 = event.configs[2];

    macro_rules! when {
        ($include:ident, $flag:ident) => {
            attr.set_flag(b::$flag, !config.$include);
        };
    }
    when!(include_kernel, ATTR_EXCLUDE_KERNEL);
    when!(include_user, ATTR_EXCLUDE_USER);
    when!(include_hypervisor, ATTR_EXCLUDE_HV);
    when!(include_idle, ATTR_EXCLUDE_IDLE);
    when!(include_guest, ATTR_EXCLUDE_GUEST);

    attr.set_flag(b::ATTR_INHERIT, config.include_child_threads);
    // Counters are enabled explicitly via ioctl.
    attr.set_flag(b::ATTR_DISABLED, true);

    attr
}

/// Attribute of a member of a counting group.
pub(crate) fn counting(event: &CounterConfig, config: &Config) -> Attr {
    let mut attr = base(event, config);
    attr.read_format = GROUP_READ_FORMAT;
    attr
}

/// Attribute of a standalone counter whose value is read in-process.
pub(crate) fn live(event: &CounterConfig, config: &Config) -> Attr {
    // A plain `u64` is read when `rdpmc` is not available.
    base(event, config)
}

/// Attribute of a member of a sampling group.
///
/// `trigger` is `None` for members that are only read, such as the counters
/// requested via [`Values::counter`] or an auxiliary leader.
pub(crate) fn sampling(
    event: &CounterConfig,
    config: &SampleConfig,
    values: &Values,
    trigger: Option<(Precision, PeriodOrFrequency)>,
    wakeup_watermark: u32,
) -> Attr {
    let mut attr = base(event, &config.base);
    attr.read_format = GROUP_READ_FORMAT;

    let Some((precision, period_or_frequency)) = trigger else {
        return attr;
    };

    match period_or_frequency {
        PeriodOrFrequency::Period(period) => {
            attr.sample_period_or_freq = period;
        }
        PeriodOrFrequency::Frequency(freq) => {
            attr.set_flag(b::ATTR_FREQ, true);
            attr.sample_period_or_freq = freq;
        }
    }
    attr.set_precise_ip(precision.as_precise_ip());

    attr.sample_type = values.sample_type();
    // Loss and throttle records carry `sample_id` as well.
    attr.set_flag(b::ATTR_SAMPLE_ID_ALL, true);

    if values.max_call_stack() > 0 {
        attr.sample_max_stack = values.max_call_stack();
    }
    attr.branch_sample_type = values.branch_mask();
    attr.sample_regs_user = values.user_registers_mask();
    attr.sample_regs_intr = values.kernel_registers_mask();
    attr.sample_stack_user = values.max_user_stack();
    attr.set_flag(b::ATTR_CONTEXT_SWITCH, values.is_include_context_switch());

    // Wake the overflow worker once half of the buffer is filled.
    attr.set_flag(b::ATTR_WATERMARK, true);
    attr.wakeup_events_or_watermark = wakeup_watermark;

    attr
}
