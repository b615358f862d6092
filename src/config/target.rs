use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct All;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cpu(pub u32);

impl Cpu {
    pub const ALL: All = All;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Proc(pub u32);

impl Proc {
    pub const ALL: All = All;
    pub const CURRENT: Proc = Proc(0);
}

/// Monitoring target: which process and which CPU core to observe.
///
/// `-1` stands for "any" on both axes. Monitoring any process on any core
/// cannot be expressed by the kernel; such a target is rejected by
/// [`Target::validate`] before any counter is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub(crate) pid: i32,
    pub(crate) cpu: i32,
}

impl Target {
    pub fn pid(&self) -> Option<u32> {
        (self.pid >= 0).then_some(self.pid as _)
    }

    pub fn cpu(&self) -> Option<u32> {
        (self.cpu >= 0).then_some(self.cpu as _)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pid == -1 && self.cpu == -1 {
            return Err(Error::InvalidConfigAnyCpuCoreAndAnyProcess);
        }
        Ok(())
    }
}

impl Default for Target {
    fn default() -> Self {
        (Proc::CURRENT, Cpu::ALL).into()
    }
}

macro_rules! into_target {
    ($ty: ty, $destruct: tt, $pid: expr, $cpu: expr) => {
        impl From<$ty> for Target {
            fn from($destruct: $ty) -> Self {
                Target {
                    pid: $pid as _,
                    cpu: $cpu as _,
                }
            }
        }
    };
}

into_target!((Proc, Cpu), (Proc(pid), Cpu(cpu)), pid, cpu);
into_target!((Cpu, Proc), (Cpu(cpu), Proc(pid)), pid, cpu);

into_target!((Proc, All), (Proc(pid), _), pid, -1);
into_target!((All, Proc), (_, Proc(pid)), pid, -1);

into_target!((Cpu, All), (Cpu(cpu), _), -1, cpu);
into_target!((All, Cpu), (_, Cpu(cpu)), -1, cpu);

// Representable so that the mistake surfaces as a configuration error.
into_target!((All, All), _, -1, -1);
