use std::io;

use super::attr::{counting, sampling, GROUP_READ_FORMAT};
use super::{
    Config, Cpu, DowngradePolicy, PeriodOrFrequency, Precision, Proc, SampleConfig, Target,
};
use crate::definition::CounterConfig;
use crate::error::Error;
use crate::ffi::bindings as b;
use crate::sample::Values;

#[test]
fn test_precision_ladder() {
    let mut level = Precision::MustHaveZeroSkid;
    let mut seen = vec![level];
    while let Some(next) = level.step_down() {
        assert!(next < level);
        seen.push(next);
        level = next;
    }
    assert_eq!(
        seen,
        [
            Precision::MustHaveZeroSkid,
            Precision::RequestZeroSkid,
            Precision::MustHaveConstantSkid,
            Precision::AllowArbitrarySkid,
        ]
    );
    let ips: Vec<_> = seen.iter().map(Precision::as_precise_ip).collect();
    assert_eq!(ips, [3, 2, 1, 0]);
}

#[test]
fn test_downgrade_policy() {
    let policy = DowngradePolicy::default();
    assert!(policy.should_downgrade(&io::Error::from_raw_os_error(libc::EINVAL)));
    assert!(policy.should_downgrade(&io::Error::from_raw_os_error(libc::EOPNOTSUPP)));
    assert!(!policy.should_downgrade(&io::Error::from_raw_os_error(libc::EACCES)));
    assert!(!policy.should_downgrade(&io::Error::other("no errno")));

    let never = DowngradePolicy::never();
    assert!(!never.should_downgrade(&io::Error::from_raw_os_error(libc::EINVAL)));

    let custom = DowngradePolicy::new([libc::ENOENT]);
    assert!(custom.should_downgrade(&io::Error::from_raw_os_error(libc::ENOENT)));
}

#[test]
fn test_target() {
    let target: Target = (Proc::CURRENT, Cpu::ALL).into();
    assert_eq!(target.pid(), Some(0));
    assert_eq!(target.cpu(), None);
    target.validate().unwrap();

    let target: Target = (Cpu(2), Proc::ALL).into();
    assert_eq!(target.pid(), None);
    assert_eq!(target.cpu(), Some(2));
    target.validate().unwrap();

    let target: Target = (Proc::ALL, Cpu::ALL).into();
    assert!(matches!(
        target.validate(),
        Err(Error::InvalidConfigAnyCpuCoreAndAnyProcess)
    ));
}

#[test]
fn test_counting_attr() {
    let config = Config {
        include_kernel: false,
        include_child_threads: true,
        ..Default::default()
    };
    let event = CounterConfig::new(b::PERF_TYPE_RAW, 0x1cd).with_extensions(3, 4);
    let attr = counting(&event, &config);

    assert_eq!(attr.size, b::PERF_ATTR_SIZE_VER8);
    assert_eq!(attr.type_, b::PERF_TYPE_RAW);
    assert_eq!((attr.config, attr.config1, attr.config2), (0x1cd, 3, 4));
    assert_eq!(attr.read_format, GROUP_READ_FORMAT);
    assert!(attr.flag(b::ATTR_DISABLED));
    assert!(attr.flag(b::ATTR_EXCLUDE_KERNEL));
    assert!(!attr.flag(b::ATTR_EXCLUDE_USER));
    assert!(attr.flag(b::ATTR_INHERIT));
    assert_eq!(attr.sample_type, 0);
}

#[test]
fn test_sampling_attr() {
    let config = SampleConfig::default();
    let mut values = Values::default();
    values.timestamp(true).instruction_pointer(true);
    let event = CounterConfig::new(b::PERF_TYPE_HARDWARE, b::PERF_COUNT_HW_CPU_CYCLES);

    let trigger = Some((
        Precision::RequestZeroSkid,
        PeriodOrFrequency::Frequency(1000),
    ));
    let attr = sampling(&event, &config, &values, trigger, 4096);
    assert!(attr.flag(b::ATTR_FREQ));
    assert_eq!(attr.sample_period_or_freq, 1000);
    assert_eq!(attr.precise_ip(), 2);
    assert_eq!(attr.sample_type, b::PERF_SAMPLE_TIME | b::PERF_SAMPLE_IP);
    assert!(attr.flag(b::ATTR_SAMPLE_ID_ALL));
    assert!(attr.flag(b::ATTR_WATERMARK));
    assert_eq!(attr.wakeup_events_or_watermark, 4096);

    let attr = sampling(&event, &config, &values, None, 4096);
    assert_eq!(attr.sample_type, 0);
    assert_eq!(attr.sample_period_or_freq, 0);
    assert!(!attr.flag(b::ATTR_WATERMARK));
}
