use crate::ffi::bindings as b;

/// Where a sampled memory access was served from (`PERF_SAMPLE_DATA_SRC`).
///
/// Wraps `union perf_mem_data_src`. Newer kernels report the cache level as
/// a number, older ones as bits; both encodings are checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSource(pub u64);

// u64 (little-endian):
// mem_op        0-4  5 bits, type of opcode
// mem_lvl      5-18 14 bits, memory hierarchy level
// mem_snoop   19-23  5 bits, snoop mode
// mem_lock    24-25  2 bits, lock instr
// mem_dtlb    26-32  7 bits, tlb access
// mem_lvl_num 33-36  4 bits, memory hierarchy level number
// mem_remote     37  1 bit,  remote
macro_rules! field {
    ($name:ident, $shift:ident, $bits:literal) => {
        fn $name(&self) -> u64 {
            (self.0 >> b::$shift) & ((1 << $bits) - 1)
        }
    };
}

impl DataSource {
    field!(op, PERF_MEM_OP_SHIFT, 5);
    field!(level, PERF_MEM_LVL_SHIFT, 14);
    field!(snoop, PERF_MEM_SNOOP_SHIFT, 5);
    field!(lock, PERF_MEM_LOCK_SHIFT, 2);
    field!(tlb, PERF_MEM_TLB_SHIFT, 7);
    field!(level_number, PERF_MEM_LVLNUM_SHIFT, 4);
    field!(remote, PERF_MEM_REMOTE_SHIFT, 1);

    pub fn is_load(&self) -> bool {
        self.op() & b::PERF_MEM_OP_LOAD != 0
    }

    pub fn is_store(&self) -> bool {
        self.op() & b::PERF_MEM_OP_STORE != 0
    }

    pub fn is_prefetch(&self) -> bool {
        self.op() & b::PERF_MEM_OP_PFETCH != 0
    }

    pub fn is_exec(&self) -> bool {
        self.op() & b::PERF_MEM_OP_EXEC != 0
    }

    pub fn is_hit(&self) -> bool {
        self.level() & b::PERF_MEM_LVL_HIT != 0
    }

    pub fn is_miss(&self) -> bool {
        self.level() & b::PERF_MEM_LVL_MISS != 0
    }

    fn is_hit_at(&self, level: u64, level_number: u64) -> bool {
        self.is_hit() && (self.level() & level != 0 || self.level_number() == level_number)
    }

    pub fn is_l1_hit(&self) -> bool {
        self.is_hit_at(b::PERF_MEM_LVL_L1, b::PERF_MEM_LVLNUM_L1)
    }

    /// Hit in the line fill buffer (miss handling buffer).
    pub fn is_mhb_hit(&self) -> bool {
        self.is_hit_at(b::PERF_MEM_LVL_LFB, b::PERF_MEM_LVLNUM_LFB)
    }

    pub fn is_l2_hit(&self) -> bool {
        self.is_hit_at(b::PERF_MEM_LVL_L2, b::PERF_MEM_LVLNUM_L2)
    }

    pub fn is_l3_hit(&self) -> bool {
        self.is_hit_at(b::PERF_MEM_LVL_L3, b::PERF_MEM_LVLNUM_L3)
    }

    pub fn is_l4_hit(&self) -> bool {
        self.is_hit() && self.level_number() == b::PERF_MEM_LVLNUM_L4
    }

    pub fn is_memory_hit(&self) -> bool {
        let ram = b::PERF_MEM_LVL_LOC_RAM | b::PERF_MEM_LVL_REM_RAM1 | b::PERF_MEM_LVL_REM_RAM2;
        self.is_hit_at(ram, b::PERF_MEM_LVLNUM_RAM)
    }

    pub fn is_remote(&self) -> bool {
        let remote = b::PERF_MEM_LVL_REM_RAM1
            | b::PERF_MEM_LVL_REM_RAM2
            | b::PERF_MEM_LVL_REM_CCE1
            | b::PERF_MEM_LVL_REM_CCE2;
        self.remote() != 0 || self.level() & remote != 0
    }

    pub fn is_uncachable(&self) -> bool {
        self.level() & b::PERF_MEM_LVL_UNC != 0
    }

    pub fn is_snoop_none(&self) -> bool {
        self.snoop() & b::PERF_MEM_SNOOP_NONE != 0
    }

    pub fn is_snoop_hit(&self) -> bool {
        self.snoop() & b::PERF_MEM_SNOOP_HIT != 0
    }

    pub fn is_snoop_miss(&self) -> bool {
        self.snoop() & b::PERF_MEM_SNOOP_MISS != 0
    }

    /// Snoop hit a modified line.
    pub fn is_snoop_hit_modified(&self) -> bool {
        self.snoop() & b::PERF_MEM_SNOOP_HITM != 0
    }

    pub fn is_locked(&self) -> bool {
        self.lock() & b::PERF_MEM_LOCK_LOCKED != 0
    }

    pub fn is_tlb_hit(&self) -> bool {
        self.tlb() & b::PERF_MEM_TLB_HIT != 0
    }

    pub fn is_tlb_miss(&self) -> bool {
        self.tlb() & b::PERF_MEM_TLB_MISS != 0
    }

    /// The access was looked up in the first-level data TLB.
    pub fn is_dtlb(&self) -> bool {
        self.tlb() & b::PERF_MEM_TLB_L1 != 0
    }

    /// The access was looked up in the second-level TLB.
    pub fn is_stlb(&self) -> bool {
        self.tlb() & b::PERF_MEM_TLB_L2 != 0
    }
}
