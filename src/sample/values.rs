use crate::ffi::bindings as b;

/// Branch kinds captured by [`Values::branch_stack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchType {
    User,
    Kernel,
    Hypervisor,
    Any,
    AnyCall,
    AnyReturn,
    IndirectCall,
    DirectCall,
    IndirectJump,
    Conditional,
    CallStack,
    TransactionAbort,
    InTransaction,
    NotInTransaction,
}

impl BranchType {
    pub(crate) fn as_branch_sample_type(&self) -> u64 {
        match self {
            Self::User => b::PERF_SAMPLE_BRANCH_USER,
            Self::Kernel => b::PERF_SAMPLE_BRANCH_KERNEL,
            Self::Hypervisor => b::PERF_SAMPLE_BRANCH_HV,
            Self::Any => b::PERF_SAMPLE_BRANCH_ANY,
            Self::AnyCall => b::PERF_SAMPLE_BRANCH_ANY_CALL,
            Self::AnyReturn => b::PERF_SAMPLE_BRANCH_ANY_RETURN,
            Self::IndirectCall => b::PERF_SAMPLE_BRANCH_IND_CALL,
            Self::DirectCall => b::PERF_SAMPLE_BRANCH_CALL,
            Self::IndirectJump => b::PERF_SAMPLE_BRANCH_IND_JUMP,
            Self::Conditional => b::PERF_SAMPLE_BRANCH_COND,
            Self::CallStack => b::PERF_SAMPLE_BRANCH_CALL_STACK,
            Self::TransactionAbort => b::PERF_SAMPLE_BRANCH_ABORT_TX,
            Self::InTransaction => b::PERF_SAMPLE_BRANCH_IN_TX,
            Self::NotInTransaction => b::PERF_SAMPLE_BRANCH_NO_TX,
        }
    }
}

/// Largest user stack dump the kernel accepts: below `u16::MAX` and a
/// multiple of 8.
pub const MAX_USER_STACK: u32 = u16::MAX as u32 & !7;

/// Fields recorded into every sample.
///
/// # Examples
///
/// ```rust
/// use perf_counters::sample::Values;
///
/// let mut values = Values::default();
/// values
///     .timestamp(true)
///     .instruction_pointer(true)
///     .counter(["instructions", "cycles"]);
///
/// assert_eq!(values.counters(), ["instructions", "cycles"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Values {
    mask: u64,
    counters: Vec<String>,
    max_call_stack: u16,
    branch_mask: u64,
    user_registers: u64,
    kernel_registers: u64,
    max_user_stack: u32,
    context_switch: bool,
    throttle: bool,
}

macro_rules! field {
    ($(#[$doc:meta])* $name:ident, $flag:ident) => {
        $(#[$doc])*
        pub fn $name(&mut self, include: bool) -> &mut Self {
            self.set(b::$flag, include);
            self
        }
    };
}

impl Values {
    field!(
        /// Instruction pointer (`PERF_SAMPLE_IP`).
        instruction_pointer,
        PERF_SAMPLE_IP
    );
    field!(
        /// Process and thread id (`PERF_SAMPLE_TID`).
        thread_id,
        PERF_SAMPLE_TID
    );
    field!(
        /// Timestamp, required to sort samples by time (`PERF_SAMPLE_TIME`).
        timestamp,
        PERF_SAMPLE_TIME
    );
    field!(
        /// Virtual data address (`PERF_SAMPLE_ADDR`).
        logical_memory_address,
        PERF_SAMPLE_ADDR
    );
    field!(stream_id, PERF_SAMPLE_STREAM_ID);
    field!(raw, PERF_SAMPLE_RAW);
    field!(cpu_id, PERF_SAMPLE_CPU);
    field!(period, PERF_SAMPLE_PERIOD);
    field!(weight, PERF_SAMPLE_WEIGHT);
    field!(data_source, PERF_SAMPLE_DATA_SRC);
    field!(hardware_transaction_abort, PERF_SAMPLE_TRANSACTION);
    field!(identifier, PERF_SAMPLE_IDENTIFIER);
    field!(physical_memory_address, PERF_SAMPLE_PHYS_ADDR);
    field!(cgroup, PERF_SAMPLE_CGROUP);
    field!(data_page_size, PERF_SAMPLE_DATA_PAGE_SIZE);
    field!(code_page_size, PERF_SAMPLE_CODE_PAGE_SIZE);

    /// Weight split into its latency components (`PERF_SAMPLE_WEIGHT_STRUCT`).
    ///
    /// Replaces [`weight`][Self::weight], the kernel accepts only one of them.
    pub fn weight_struct(&mut self, include: bool) -> &mut Self {
        self.set(b::PERF_SAMPLE_WEIGHT_STRUCT, include);
        if include {
            self.set(b::PERF_SAMPLE_WEIGHT, false);
        }
        self
    }

    /// Read the values of these counters in every sample.
    pub fn counter<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.counters = names.into_iter().map(Into::into).collect();
        self.set(b::PERF_SAMPLE_READ, !self.counters.is_empty());
        self
    }

    pub fn callchain(&mut self, include: bool) -> &mut Self {
        self.max_call_stack = 0;
        self.set(b::PERF_SAMPLE_CALLCHAIN, include);
        self
    }

    /// Record call chains of at most `max_call_stack` frames.
    pub fn callchain_with_max(&mut self, max_call_stack: u16) -> &mut Self {
        self.max_call_stack = max_call_stack;
        self.set(b::PERF_SAMPLE_CALLCHAIN, true);
        self
    }

    /// Record the last branches (LBR) of the given kinds.
    pub fn branch_stack(&mut self, types: &[BranchType]) -> &mut Self {
        self.branch_mask = types
            .iter()
            .fold(0, |mask, ty| mask | ty.as_branch_sample_type());
        self.set(b::PERF_SAMPLE_BRANCH_STACK, self.branch_mask != 0);
        self
    }

    /// User-level registers, `mask` follows the architecture's `perf_regs.h`.
    pub fn user_registers(&mut self, mask: u64) -> &mut Self {
        self.user_registers = mask;
        self.set(b::PERF_SAMPLE_REGS_USER, mask != 0);
        self
    }

    /// Registers at the moment of the interrupt, `mask` follows `perf_regs.h`.
    pub fn kernel_registers(&mut self, mask: u64) -> &mut Self {
        self.kernel_registers = mask;
        self.set(b::PERF_SAMPLE_REGS_INTR, mask != 0);
        self
    }

    /// Dump up to `max_size` bytes of the user stack.
    ///
    /// The size is rounded up to a multiple of 8 and capped at [`MAX_USER_STACK`].
    pub fn user_stack(&mut self, max_size: u32) -> &mut Self {
        self.max_user_stack = max_size.min(MAX_USER_STACK).next_multiple_of(8);
        self.set(b::PERF_SAMPLE_STACK_USER, max_size > 0);
        self
    }

    /// Emit context switch records.
    pub fn context_switch(&mut self, include: bool) -> &mut Self {
        self.context_switch = include;
        self
    }

    /// Keep throttle and unthrottle records in the result.
    pub fn throttle(&mut self, include: bool) -> &mut Self {
        self.throttle = include;
        self
    }

    /// `perf_event_attr::sample_type` of these values.
    pub fn sample_type(&self) -> u64 {
        self.mask
    }

    pub fn counters(&self) -> &[String] {
        &self.counters
    }

    pub fn max_call_stack(&self) -> u16 {
        self.max_call_stack
    }

    pub fn branch_mask(&self) -> u64 {
        self.branch_mask
    }

    pub fn user_registers_mask(&self) -> u64 {
        self.user_registers
    }

    pub fn kernel_registers_mask(&self) -> u64 {
        self.kernel_registers
    }

    pub fn max_user_stack(&self) -> u32 {
        self.max_user_stack
    }

    pub fn is_include_context_switch(&self) -> bool {
        self.context_switch
    }

    pub fn is_include_throttle(&self) -> bool {
        self.throttle
    }

    fn set(&mut self, flag: u64, include: bool) {
        if include {
            self.mask |= flag;
        } else {
            self.mask &= !flag;
        }
    }
}
