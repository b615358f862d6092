use std::io;

/// Amount of skid allowed between the event and the recorded instruction pointer.
///
/// Variants are ordered from the weakest to the strongest guarantee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Precision {
    AllowArbitrarySkid,
    #[default]
    MustHaveConstantSkid,
    RequestZeroSkid,
    MustHaveZeroSkid,
}

impl Precision {
    pub(crate) fn as_precise_ip(&self) -> u8 {
        match self {
            Self::AllowArbitrarySkid => 0,
            Self::MustHaveConstantSkid => 1,
            Self::RequestZeroSkid => 2,
            Self::MustHaveZeroSkid => 3,
        }
    }

    /// The next weaker level, or `None` at the bottom of the ladder.
    pub fn step_down(&self) -> Option<Self> {
        match self {
            Self::MustHaveZeroSkid => Some(Self::RequestZeroSkid),
            Self::RequestZeroSkid => Some(Self::MustHaveConstantSkid),
            Self::MustHaveConstantSkid => Some(Self::AllowArbitrarySkid),
            Self::AllowArbitrarySkid => None,
        }
    }
}

/// Decides which `perf_event_open` failures are answered by lowering the precision.
///
/// Which error codes a PMU reports for an unsatisfiable skid request depends on
/// the hardware and the kernel version, so the set is configurable. Errors that
/// are not listed are reported as they are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DowngradePolicy {
    errnos: Vec<i32>,
}

impl DowngradePolicy {
    pub fn new(errnos: impl IntoIterator<Item = i32>) -> Self {
        Self {
            errnos: errnos.into_iter().collect(),
        }
    }

    /// Never lower the precision.
    pub fn never() -> Self {
        Self { errnos: vec![] }
    }

    pub fn errnos(&self) -> &[i32] {
        &self.errnos
    }

    pub fn should_downgrade(&self, error: &io::Error) -> bool {
        error
            .raw_os_error()
            .is_some_and(|errno| self.errnos.contains(&errno))
    }
}

impl Default for DowngradePolicy {
    fn default() -> Self {
        Self::new([libc::EINVAL, libc::EOPNOTSUPP])
    }
}
