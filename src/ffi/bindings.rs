#![allow(non_camel_case_types, dead_code)]

// Hand-written subset of <linux/perf_event.h>.
// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h

// enum perf_type_id
pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_TYPE_SOFTWARE: u32 = 1;
pub const PERF_TYPE_TRACEPOINT: u32 = 2;
pub const PERF_TYPE_HW_CACHE: u32 = 3;
pub const PERF_TYPE_RAW: u32 = 4;
pub const PERF_TYPE_BREAKPOINT: u32 = 5;

// enum perf_hw_id
pub const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;
pub const PERF_COUNT_HW_INSTRUCTIONS: u64 = 1;
pub const PERF_COUNT_HW_CACHE_REFERENCES: u64 = 2;
pub const PERF_COUNT_HW_CACHE_MISSES: u64 = 3;
pub const PERF_COUNT_HW_BRANCH_INSTRUCTIONS: u64 = 4;
pub const PERF_COUNT_HW_BRANCH_MISSES: u64 = 5;
pub const PERF_COUNT_HW_BUS_CYCLES: u64 = 6;
pub const PERF_COUNT_HW_STALLED_CYCLES_FRONTEND: u64 = 7;
pub const PERF_COUNT_HW_STALLED_CYCLES_BACKEND: u64 = 8;
pub const PERF_COUNT_HW_REF_CPU_CYCLES: u64 = 9;

// enum perf_hw_cache_id
pub const PERF_COUNT_HW_CACHE_L1D: u64 = 0;
pub const PERF_COUNT_HW_CACHE_L1I: u64 = 1;
pub const PERF_COUNT_HW_CACHE_LL: u64 = 2;
pub const PERF_COUNT_HW_CACHE_DTLB: u64 = 3;
pub const PERF_COUNT_HW_CACHE_ITLB: u64 = 4;
pub const PERF_COUNT_HW_CACHE_BPU: u64 = 5;
pub const PERF_COUNT_HW_CACHE_NODE: u64 = 6;

// enum perf_hw_cache_op_id
pub const PERF_COUNT_HW_CACHE_OP_READ: u64 = 0;
pub const PERF_COUNT_HW_CACHE_OP_WRITE: u64 = 1;
pub const PERF_COUNT_HW_CACHE_OP_PREFETCH: u64 = 2;

// enum perf_hw_cache_op_result_id
pub const PERF_COUNT_HW_CACHE_RESULT_ACCESS: u64 = 0;
pub const PERF_COUNT_HW_CACHE_RESULT_MISS: u64 = 1;

// enum perf_sw_ids
pub const PERF_COUNT_SW_CPU_CLOCK: u64 = 0;
pub const PERF_COUNT_SW_TASK_CLOCK: u64 = 1;
pub const PERF_COUNT_SW_PAGE_FAULTS: u64 = 2;
pub const PERF_COUNT_SW_CONTEXT_SWITCHES: u64 = 3;
pub const PERF_COUNT_SW_CPU_MIGRATIONS: u64 = 4;
pub const PERF_COUNT_SW_PAGE_FAULTS_MIN: u64 = 5;
pub const PERF_COUNT_SW_PAGE_FAULTS_MAJ: u64 = 6;
pub const PERF_COUNT_SW_ALIGNMENT_FAULTS: u64 = 7;
pub const PERF_COUNT_SW_EMULATION_FAULTS: u64 = 8;
pub const PERF_COUNT_SW_DUMMY: u64 = 9;
pub const PERF_COUNT_SW_BPF_OUTPUT: u64 = 10;
pub const PERF_COUNT_SW_CGROUP_SWITCHES: u64 = 11;

// enum perf_event_sample_format
pub const PERF_SAMPLE_IP: u64 = 1 << 0;
pub const PERF_SAMPLE_TID: u64 = 1 << 1;
pub const PERF_SAMPLE_TIME: u64 = 1 << 2;
pub const PERF_SAMPLE_ADDR: u64 = 1 << 3;
pub const PERF_SAMPLE_READ: u64 = 1 << 4;
pub const PERF_SAMPLE_CALLCHAIN: u64 = 1 << 5;
pub const PERF_SAMPLE_ID: u64 = 1 << 6;
pub const PERF_SAMPLE_CPU: u64 = 1 << 7;
pub const PERF_SAMPLE_PERIOD: u64 = 1 << 8;
pub const PERF_SAMPLE_STREAM_ID: u64 = 1 << 9;
pub const PERF_SAMPLE_RAW: u64 = 1 << 10;
pub const PERF_SAMPLE_BRANCH_STACK: u64 = 1 << 11;
pub const PERF_SAMPLE_REGS_USER: u64 = 1 << 12;
pub const PERF_SAMPLE_STACK_USER: u64 = 1 << 13;
pub const PERF_SAMPLE_WEIGHT: u64 = 1 << 14;
pub const PERF_SAMPLE_DATA_SRC: u64 = 1 << 15;
pub const PERF_SAMPLE_IDENTIFIER: u64 = 1 << 16;
pub const PERF_SAMPLE_TRANSACTION: u64 = 1 << 17;
pub const PERF_SAMPLE_REGS_INTR: u64 = 1 << 18;
pub const PERF_SAMPLE_PHYS_ADDR: u64 = 1 << 19;
pub const PERF_SAMPLE_AUX: u64 = 1 << 20;
pub const PERF_SAMPLE_CGROUP: u64 = 1 << 21;
pub const PERF_SAMPLE_DATA_PAGE_SIZE: u64 = 1 << 22;
pub const PERF_SAMPLE_CODE_PAGE_SIZE: u64 = 1 << 23;
pub const PERF_SAMPLE_WEIGHT_STRUCT: u64 = 1 << 24;

// enum perf_branch_sample_type
pub const PERF_SAMPLE_BRANCH_USER: u64 = 1 << 0;
pub const PERF_SAMPLE_BRANCH_KERNEL: u64 = 1 << 1;
pub const PERF_SAMPLE_BRANCH_HV: u64 = 1 << 2;
pub const PERF_SAMPLE_BRANCH_ANY: u64 = 1 << 3;
pub const PERF_SAMPLE_BRANCH_ANY_CALL: u64 = 1 << 4;
pub const PERF_SAMPLE_BRANCH_ANY_RETURN: u64 = 1 << 5;
pub const PERF_SAMPLE_BRANCH_IND_CALL: u64 = 1 << 6;
pub const PERF_SAMPLE_BRANCH_ABORT_TX: u64 = 1 << 7;
pub const PERF_SAMPLE_BRANCH_IN_TX: u64 = 1 << 8;
pub const PERF_SAMPLE_BRANCH_NO_TX: u64 = 1 << 9;
pub const PERF_SAMPLE_BRANCH_COND: u64 = 1 << 10;
pub const PERF_SAMPLE_BRANCH_CALL_STACK: u64 = 1 << 11;
pub const PERF_SAMPLE_BRANCH_IND_JUMP: u64 = 1 << 12;
pub const PERF_SAMPLE_BRANCH_CALL: u64 = 1 << 13;
pub const PERF_SAMPLE_BRANCH_HW_INDEX: u64 = 1 << 17;

// enum perf_event_read_format
pub const PERF_FORMAT_TOTAL_TIME_ENABLED: u64 = 1 << 0;
pub const PERF_FORMAT_TOTAL_TIME_RUNNING: u64 = 1 << 1;
pub const PERF_FORMAT_ID: u64 = 1 << 2;
pub const PERF_FORMAT_GROUP: u64 = 1 << 3;
pub const PERF_FORMAT_LOST: u64 = 1 << 4;

// enum perf_event_type
pub const PERF_RECORD_MMAP: u32 = 1;
pub const PERF_RECORD_LOST: u32 = 2;
pub const PERF_RECORD_COMM: u32 = 3;
pub const PERF_RECORD_EXIT: u32 = 4;
pub const PERF_RECORD_THROTTLE: u32 = 5;
pub const PERF_RECORD_UNTHROTTLE: u32 = 6;
pub const PERF_RECORD_FORK: u32 = 7;
pub const PERF_RECORD_READ: u32 = 8;
pub const PERF_RECORD_SAMPLE: u32 = 9;
pub const PERF_RECORD_MMAP2: u32 = 10;
pub const PERF_RECORD_LOST_SAMPLES: u32 = 13;
pub const PERF_RECORD_SWITCH: u32 = 14;
pub const PERF_RECORD_SWITCH_CPU_WIDE: u32 = 15;

// perf_event_header::misc
pub const PERF_RECORD_MISC_CPUMODE_MASK: u16 = 7;
pub const PERF_RECORD_MISC_KERNEL: u16 = 1;
pub const PERF_RECORD_MISC_USER: u16 = 2;
pub const PERF_RECORD_MISC_HYPERVISOR: u16 = 3;
pub const PERF_RECORD_MISC_GUEST_KERNEL: u16 = 4;
pub const PERF_RECORD_MISC_GUEST_USER: u16 = 5;
pub const PERF_RECORD_MISC_SWITCH_OUT: u16 = 1 << 13;
pub const PERF_RECORD_MISC_EXACT_IP: u16 = 1 << 14;
pub const PERF_RECORD_MISC_SWITCH_OUT_PREEMPT: u16 = 1 << 14;

// enum perf_sample_regs_abi
pub const PERF_SAMPLE_REGS_ABI_NONE: u64 = 0;
pub const PERF_SAMPLE_REGS_ABI_32: u64 = 1;
pub const PERF_SAMPLE_REGS_ABI_64: u64 = 2;

// union perf_mem_data_src, fields as shifts of the `u64`
pub const PERF_MEM_OP_SHIFT: u32 = 0;
pub const PERF_MEM_OP_LOAD: u64 = 0x02;
pub const PERF_MEM_OP_STORE: u64 = 0x04;
pub const PERF_MEM_OP_PFETCH: u64 = 0x08;
pub const PERF_MEM_OP_EXEC: u64 = 0x10;

pub const PERF_MEM_LVL_SHIFT: u32 = 5;
pub const PERF_MEM_LVL_HIT: u64 = 0x02;
pub const PERF_MEM_LVL_MISS: u64 = 0x04;
pub const PERF_MEM_LVL_L1: u64 = 0x08;
pub const PERF_MEM_LVL_LFB: u64 = 0x10;
pub const PERF_MEM_LVL_L2: u64 = 0x20;
pub const PERF_MEM_LVL_L3: u64 = 0x40;
pub const PERF_MEM_LVL_LOC_RAM: u64 = 0x80;
pub const PERF_MEM_LVL_REM_RAM1: u64 = 0x100;
pub const PERF_MEM_LVL_REM_RAM2: u64 = 0x200;
pub const PERF_MEM_LVL_REM_CCE1: u64 = 0x400;
pub const PERF_MEM_LVL_REM_CCE2: u64 = 0x800;
pub const PERF_MEM_LVL_UNC: u64 = 0x2000;

pub const PERF_MEM_SNOOP_SHIFT: u32 = 19;
pub const PERF_MEM_SNOOP_NONE: u64 = 0x02;
pub const PERF_MEM_SNOOP_HIT: u64 = 0x04;
pub const PERF_MEM_SNOOP_MISS: u64 = 0x08;
pub const PERF_MEM_SNOOP_HITM: u64 = 0x10;

pub const PERF_MEM_LOCK_SHIFT: u32 = 24;
pub const PERF_MEM_LOCK_LOCKED: u64 = 0x02;

pub const PERF_MEM_TLB_SHIFT: u32 = 26;
pub const PERF_MEM_TLB_HIT: u64 = 0x02;
pub const PERF_MEM_TLB_MISS: u64 = 0x04;
pub const PERF_MEM_TLB_L1: u64 = 0x08;
pub const PERF_MEM_TLB_L2: u64 = 0x10;

pub const PERF_MEM_LVLNUM_SHIFT: u32 = 33;
pub const PERF_MEM_LVLNUM_L1: u64 = 0x01;
pub const PERF_MEM_LVLNUM_L2: u64 = 0x02;
pub const PERF_MEM_LVLNUM_L3: u64 = 0x03;
pub const PERF_MEM_LVLNUM_L4: u64 = 0x04;
pub const PERF_MEM_LVLNUM_LFB: u64 = 0x0c;
pub const PERF_MEM_LVLNUM_RAM: u64 = 0x0d;

pub const PERF_MEM_REMOTE_SHIFT: u32 = 37;

// perf_sample_transaction bits
pub const PERF_TXN_ELISION: u64 = 1 << 0;
pub const PERF_TXN_TRANSACTION: u64 = 1 << 1;
pub const PERF_TXN_SYNC: u64 = 1 << 2;
pub const PERF_TXN_ASYNC: u64 = 1 << 3;
pub const PERF_TXN_RETRY: u64 = 1 << 4;
pub const PERF_TXN_CONFLICT: u64 = 1 << 5;
pub const PERF_TXN_CAPACITY_WRITE: u64 = 1 << 6;
pub const PERF_TXN_CAPACITY_READ: u64 = 1 << 7;
pub const PERF_TXN_ABORT_MASK: u64 = 0xffff_ffff << 32;
pub const PERF_TXN_ABORT_SHIFT: u32 = 32;

// _IO('$', n), _IOW('$', n, u64), _IOR('$', n, u64 *)
pub const PERF_EVENT_IOC_ENABLE: u64 = 0x2400;
pub const PERF_EVENT_IOC_DISABLE: u64 = 0x2401;
pub const PERF_EVENT_IOC_RESET: u64 = 0x2403;
pub const PERF_EVENT_IOC_ID: u64 = 0x8008_2407;

pub const PERF_IOC_FLAG_GROUP: u64 = 1;

pub const PERF_FLAG_FD_CLOEXEC: u64 = 1 << 3;

pub const PERF_ATTR_SIZE_VER8: u32 = 136;

// Bit positions inside the `perf_event_attr` flag word.
pub const ATTR_DISABLED: u32 = 0;
pub const ATTR_INHERIT: u32 = 1;
pub const ATTR_PINNED: u32 = 2;
pub const ATTR_EXCLUSIVE: u32 = 3;
pub const ATTR_EXCLUDE_USER: u32 = 4;
pub const ATTR_EXCLUDE_KERNEL: u32 = 5;
pub const ATTR_EXCLUDE_HV: u32 = 6;
pub const ATTR_EXCLUDE_IDLE: u32 = 7;
pub const ATTR_MMAP: u32 = 8;
pub const ATTR_COMM: u32 = 9;
pub const ATTR_FREQ: u32 = 10;
pub const ATTR_INHERIT_STAT: u32 = 11;
pub const ATTR_ENABLE_ON_EXEC: u32 = 12;
pub const ATTR_TASK: u32 = 13;
pub const ATTR_WATERMARK: u32 = 14;
const ATTR_PRECISE_IP: u32 = 15; // 2 bits
pub const ATTR_MMAP_DATA: u32 = 17;
pub const ATTR_SAMPLE_ID_ALL: u32 = 18;
pub const ATTR_EXCLUDE_HOST: u32 = 19;
pub const ATTR_EXCLUDE_GUEST: u32 = 20;
pub const ATTR_EXCLUDE_CALLCHAIN_KERNEL: u32 = 21;
pub const ATTR_EXCLUDE_CALLCHAIN_USER: u32 = 22;
pub const ATTR_MMAP2: u32 = 23;
pub const ATTR_COMM_EXEC: u32 = 24;
pub const ATTR_USE_CLOCKID: u32 = 25;
pub const ATTR_CONTEXT_SWITCH: u32 = 26;

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L389
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct perf_event_attr {
    pub type_: u32,
    pub size: u32,
    pub config: u64,
    // union { sample_period; sample_freq; }
    pub sample_period_or_freq: u64,
    pub sample_type: u64,
    pub read_format: u64,
    pub flags: u64,
    // union { wakeup_events; wakeup_watermark; }
    pub wakeup_events_or_watermark: u32,
    pub bp_type: u32,
    // union { bp_addr; kprobe_func; uprobe_path; config1; }
    pub config1: u64,
    // union { bp_len; kprobe_addr; probe_offset; config2; }
    pub config2: u64,
    pub branch_sample_type: u64,
    pub sample_regs_user: u64,
    pub sample_stack_user: u32,
    pub clockid: i32,
    pub sample_regs_intr: u64,
    pub aux_watermark: u32,
    pub sample_max_stack: u16,
    pub __reserved_2: u16,
    pub aux_sample_size: u32,
    pub aux_action: u32,
    pub sig_data: u64,
    pub config3: u64,
}

impl perf_event_attr {
    pub fn set_flag(&mut self, bit: u32, on: bool) {
        if on {
            self.flags |= 1 << bit;
        } else {
            self.flags &= !(1 << bit);
        }
    }

    pub fn flag(&self, bit: u32) -> bool {
        self.flags & (1 << bit) != 0
    }

    pub fn set_precise_ip(&mut self, level: u8) {
        self.flags &= !(0b11 << ATTR_PRECISE_IP);
        self.flags |= ((level & 0b11) as u64) << ATTR_PRECISE_IP;
    }

    pub fn precise_ip(&self) -> u8 {
        ((self.flags >> ATTR_PRECISE_IP) & 0b11) as u8
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L580
#[repr(C)]
pub struct perf_event_mmap_page {
    pub version: u32,
    pub compat_version: u32,
    pub lock: u32,
    pub index: u32,
    pub offset: i64,
    pub time_enabled: u64,
    pub time_running: u64,
    // bit 2: cap_user_rdpmc
    pub capabilities: u64,
    pub pmc_width: u16,
    pub time_shift: u16,
    pub time_mult: u32,
    pub time_offset: u64,
    pub time_zero: u64,
    pub size: u32,
    pub __reserved_1: u32,
    pub time_cycles: u64,
    pub time_mask: u64,
    pub __reserved: [u8; 116 * 8],
    pub data_head: u64,
    pub data_tail: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub aux_head: u64,
    pub aux_tail: u64,
    pub aux_offset: u64,
    pub aux_size: u64,
}

pub const CAP_USER_RDPMC: u64 = 1 << 2;

const _: () = assert!(size_of::<perf_event_attr>() == PERF_ATTR_SIZE_VER8 as usize);
const _: () = assert!(std::mem::offset_of!(perf_event_mmap_page, data_head) == 1024);
