use super::{DataSource, Layout};
use crate::count::CounterValues;
use crate::ffi::bindings as b;
use crate::ffi::cursor::{Cursor, Truncated};
use crate::result::CounterResult;

/// A decoded record of a sampling buffer.
///
/// Besides samples this covers loss, throttle and context switch records,
/// which fill [`loss`][Self::loss], [`throttle`][Self::throttle] and
/// [`context_switch`][Self::context_switch] respectively. Fields not
/// requested via [`Values`][crate::sample::Values] stay `None`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    pub metadata: Metadata,
    pub instruction_execution: InstructionExecution,
    pub data_access: DataAccess,

    /// Values of the counters requested via
    /// [`Values::counter`][crate::sample::Values::counter].
    pub counter: Option<CounterResult>,
    /// Most recent branches first.
    pub branch_stack: Option<Vec<Branch>>,
    pub user_registers: Option<Registers>,
    pub kernel_registers: Option<Registers>,
    pub user_stack: Option<Vec<u8>>,
    pub raw: Option<Vec<u8>>,
    pub cgroup_id: Option<u64>,

    pub context_switch: Option<ContextSwitch>,
    pub throttle: Option<Throttle>,
    /// Number of records the kernel dropped.
    pub loss: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    pub mode: Option<Mode>,
    pub sample_id: Option<u64>,
    pub stream_id: Option<u64>,
    pub timestamp: Option<u64>,
    pub period: Option<u64>,
    pub cpu_id: Option<u32>,
    pub process_id: Option<u32>,
    pub thread_id: Option<u32>,
}

/// CPU mode the record was generated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Unknown,
    Kernel,
    User,
    Hypervisor,
    GuestKernel,
    GuestUser,
}

impl Mode {
    pub(crate) fn from_misc(misc: u16) -> Self {
        match misc & b::PERF_RECORD_MISC_CPUMODE_MASK {
            b::PERF_RECORD_MISC_KERNEL => Self::Kernel,
            b::PERF_RECORD_MISC_USER => Self::User,
            b::PERF_RECORD_MISC_HYPERVISOR => Self::Hypervisor,
            b::PERF_RECORD_MISC_GUEST_KERNEL => Self::GuestKernel,
            b::PERF_RECORD_MISC_GUEST_USER => Self::GuestUser,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionExecution {
    pub logical_instruction_pointer: Option<u64>,
    /// The instruction pointer is the one of the instruction that caused the
    /// event, without skid.
    pub is_instruction_pointer_exact: bool,
    pub callchain: Option<Vec<u64>>,
    pub page_size: Option<u64>,
    pub hardware_transaction_abort: Option<TransactionAbort>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataAccess {
    pub logical_memory_address: Option<u64>,
    pub physical_memory_address: Option<u64>,
    pub page_size: Option<u64>,
    pub source: Option<DataSource>,
    pub weight: Option<Weight>,
}

/// Cost of the sampled access as reported by the hardware.
///
/// With [`weight_struct`][crate::sample::Values::weight_struct] the value
/// is split: `latency` holds the first 32 bits, `var2` and `var3` carry
/// additional latencies whose meaning depends on the CPU (e.g. instruction
/// retirement latency on Intel).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Weight {
    pub latency: u64,
    pub var2: u16,
    pub var3: u16,
}

impl Weight {
    fn full(bits: u64) -> Self {
        Self {
            latency: bits,
            var2: 0,
            var3: 0,
        }
    }

    // Little-endian {u32 var1_dw; u16 var2_w; u16 var3_w;}, big-endian reversed,
    // so the split of the native `u64` is the same on both.
    fn split(bits: u64) -> Self {
        Self {
            latency: bits & 0xffff_ffff,
            var2: (bits >> 32) as u16,
            var3: (bits >> 48) as u16,
        }
    }
}

/// Why a hardware transaction aborted (`PERF_SAMPLE_TRANSACTION`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionAbort(pub u64);

impl TransactionAbort {
    pub fn is_elision_transaction(&self) -> bool {
        self.0 & b::PERF_TXN_ELISION != 0
    }

    pub fn is_generic_transaction(&self) -> bool {
        self.0 & b::PERF_TXN_TRANSACTION != 0
    }

    pub fn is_synchronous_abort(&self) -> bool {
        self.0 & b::PERF_TXN_SYNC != 0
    }

    pub fn is_asynchronous_abort(&self) -> bool {
        self.0 & b::PERF_TXN_ASYNC != 0
    }

    pub fn is_retryable(&self) -> bool {
        self.0 & b::PERF_TXN_RETRY != 0
    }

    pub fn is_due_to_memory_conflict(&self) -> bool {
        self.0 & b::PERF_TXN_CONFLICT != 0
    }

    pub fn is_due_to_write_capacity_conflict(&self) -> bool {
        self.0 & b::PERF_TXN_CAPACITY_WRITE != 0
    }

    pub fn is_due_to_read_capacity_conflict(&self) -> bool {
        self.0 & b::PERF_TXN_CAPACITY_READ != 0
    }

    /// Abort code given by the aborting instruction.
    pub fn user_specified_code(&self) -> u32 {
        ((self.0 & b::PERF_TXN_ABORT_MASK) >> b::PERF_TXN_ABORT_SHIFT) as u32
    }
}

/// A taken branch of the branch stack (LBR).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Branch {
    pub instruction_pointer_from: u64,
    pub instruction_pointer_to: u64,
    pub flags: u64,
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1439
impl Branch {
    pub fn is_mispredicted(&self) -> bool {
        self.flags & 0b1 != 0
    }

    pub fn is_predicted(&self) -> bool {
        self.flags & 0b10 != 0
    }

    pub fn is_in_transaction(&self) -> bool {
        self.flags & 0b100 != 0
    }

    pub fn is_transaction_abort(&self) -> bool {
        self.flags & 0b1000 != 0
    }

    /// Cycles since the previous branch, `0` if not supported.
    pub fn cycles(&self) -> u16 {
        (self.flags >> 4) as u16
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Abi {
    Bits32,
    Bits64,
}

/// Register values in the order of the bits set in the requested mask.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    pub abi: Abi,
    pub values: Vec<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextSwitch {
    /// Switched out of the sampled thread, otherwise into it.
    pub is_out: bool,
    /// Switched out while still runnable.
    pub is_preempt: bool,
    /// Thread switched to or from, only known in CPU-wide mode.
    pub process_id: Option<u32>,
    pub thread_id: Option<u32>,
}

impl ContextSwitch {
    pub fn is_in(&self) -> bool {
        !self.is_out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Throttle {
    /// Throttled, otherwise unthrottled.
    pub is_throttle: bool,
}

impl Throttle {
    pub fn is_unthrottle(&self) -> bool {
        !self.is_throttle
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L957
// struct {
//     struct perf_event_header header;
//     { u64 id;        } && PERF_SAMPLE_IDENTIFIER
//     { u64 ip;        } && PERF_SAMPLE_IP
//     { u32 pid, tid;  } && PERF_SAMPLE_TID
//     { u64 time;      } && PERF_SAMPLE_TIME
//     { u64 addr;      } && PERF_SAMPLE_ADDR
//     { u64 id;        } && PERF_SAMPLE_ID
//     { u64 stream_id; } && PERF_SAMPLE_STREAM_ID
//     { u32 cpu, res;  } && PERF_SAMPLE_CPU
//     { u64 period;    } && PERF_SAMPLE_PERIOD
//     { struct read_format values; } && PERF_SAMPLE_READ
//     { u64 nr, ips[nr]; } && PERF_SAMPLE_CALLCHAIN
//     { u32 size; char data[size]; } && PERF_SAMPLE_RAW
//     { u64 nr; { u64 from, to, flags } lbr[nr]; } && PERF_SAMPLE_BRANCH_STACK
//     { u64 abi; u64 regs[weight(mask)]; } && PERF_SAMPLE_REGS_USER
//     { u64 size; char data[size]; u64 dyn_size; } && PERF_SAMPLE_STACK_USER
//     union perf_sample_weight weight; && PERF_SAMPLE_WEIGHT(_STRUCT)
//     { u64 data_src;    } && PERF_SAMPLE_DATA_SRC
//     { u64 transaction; } && PERF_SAMPLE_TRANSACTION
//     { u64 abi; u64 regs[weight(mask)]; } && PERF_SAMPLE_REGS_INTR
//     { u64 phys_addr; } && PERF_SAMPLE_PHYS_ADDR
//     { u64 cgroup; } && PERF_SAMPLE_CGROUP
//     { u64 data_page_size; } && PERF_SAMPLE_DATA_PAGE_SIZE
//     { u64 code_page_size; } && PERF_SAMPLE_CODE_PAGE_SIZE
// };
pub(super) fn parse(misc: u16, body: &mut Cursor<'_>, layout: &Layout) -> Result<Sample, Truncated> {
    macro_rules! when {
        ($flag:ident, $then:expr) => {
            match layout.sample_type & b::$flag != 0 {
                true => Some($then),
                false => None,
            }
        };
    }

    let mut sample = Sample::default();
    sample.metadata.mode = Some(Mode::from_misc(misc));

    let identifier = when!(PERF_SAMPLE_IDENTIFIER, body.u64()?);
    sample.instruction_execution.logical_instruction_pointer = when!(PERF_SAMPLE_IP, body.u64()?);
    sample.instruction_execution.is_instruction_pointer_exact =
        misc & b::PERF_RECORD_MISC_EXACT_IP != 0;
    if let Some((pid, tid)) = when!(PERF_SAMPLE_TID, (body.u32()?, body.u32()?)) {
        sample.metadata.process_id = Some(pid);
        sample.metadata.thread_id = Some(tid);
    }
    sample.metadata.timestamp = when!(PERF_SAMPLE_TIME, body.u64()?);
    sample.data_access.logical_memory_address = when!(PERF_SAMPLE_ADDR, body.u64()?);
    let id = when!(PERF_SAMPLE_ID, body.u64()?);
    sample.metadata.sample_id = identifier.or(id);
    sample.metadata.stream_id = when!(PERF_SAMPLE_STREAM_ID, body.u64()?);
    sample.metadata.cpu_id = when!(PERF_SAMPLE_CPU, {
        let cpu = body.u32()?;
        body.skip(size_of::<u32>())?;
        cpu
    });
    sample.metadata.period = when!(PERF_SAMPLE_PERIOD, body.u64()?);
    sample.counter = when!(PERF_SAMPLE_READ, {
        let values = CounterValues::parse(body)?;
        layout.counter_result(&values)
    });
    sample.instruction_execution.callchain = when!(PERF_SAMPLE_CALLCHAIN, {
        let len = body.u64()? as usize;
        body.u64s(len)?
    });
    sample.raw = when!(PERF_SAMPLE_RAW, {
        // `size` includes the padding to the next `u64`.
        let len = body.u32()? as usize;
        body.bytes(len)?.to_vec()
    });
    sample.branch_stack = when!(PERF_SAMPLE_BRANCH_STACK, {
        let len = body.u64()? as usize;
        let words = body.u64s(len.saturating_mul(3))?;
        words
            .chunks_exact(3)
            .map(|it| Branch {
                instruction_pointer_from: it[0],
                instruction_pointer_to: it[1],
                flags: it[2],
            })
            .collect()
    });
    sample.user_registers =
        when!(PERF_SAMPLE_REGS_USER, registers(body, layout.user_registers)?).flatten();
    sample.user_stack = when!(PERF_SAMPLE_STACK_USER, {
        let len = body.u64()? as usize;
        if len == 0 {
            vec![]
        } else {
            let data = body.bytes(len)?;
            let dyn_len = (body.u64()? as usize).min(len);
            data[..dyn_len].to_vec()
        }
    });
    sample.data_access.weight = if layout.sample_type & b::PERF_SAMPLE_WEIGHT != 0 {
        Some(Weight::full(body.u64()?))
    } else if layout.sample_type & b::PERF_SAMPLE_WEIGHT_STRUCT != 0 {
        Some(Weight::split(body.u64()?))
    } else {
        None
    };
    sample.data_access.source = when!(PERF_SAMPLE_DATA_SRC, DataSource(body.u64()?));
    sample.instruction_execution.hardware_transaction_abort =
        when!(PERF_SAMPLE_TRANSACTION, TransactionAbort(body.u64()?));
    sample.kernel_registers =
        when!(PERF_SAMPLE_REGS_INTR, registers(body, layout.kernel_registers)?).flatten();
    sample.data_access.physical_memory_address = when!(PERF_SAMPLE_PHYS_ADDR, body.u64()?);
    sample.cgroup_id = when!(PERF_SAMPLE_CGROUP, body.u64()?);
    sample.data_access.page_size = when!(PERF_SAMPLE_DATA_PAGE_SIZE, body.u64()?);
    sample.instruction_execution.page_size = when!(PERF_SAMPLE_CODE_PAGE_SIZE, body.u64()?);

    Ok(sample)
}

// https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7589
// No registers follow when the ABI is `PERF_SAMPLE_REGS_ABI_NONE`, e.g. for
// user registers of a kernel thread.
fn registers(body: &mut Cursor<'_>, len: usize) -> Result<Option<Registers>, Truncated> {
    let abi = match body.u64()? {
        b::PERF_SAMPLE_REGS_ABI_NONE => return Ok(None),
        b::PERF_SAMPLE_REGS_ABI_32 => Abi::Bits32,
        b::PERF_SAMPLE_REGS_ABI_64 => Abi::Bits64,
        other => {
            log::debug!("Unknown register ABI {}, assuming 64 bit", other);
            Abi::Bits64
        }
    };
    Ok(Some(Registers {
        abi,
        values: body.u64s(len)?,
    }))
}
