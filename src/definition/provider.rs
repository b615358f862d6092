use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::metric::BUILTIN_METRICS;
use super::time::Elapsed;
use super::{Cache, CounterConfig, CounterDefinition, Op, OpResult, DEFAULT_PMU};
use crate::error::{Error, Result};
use crate::ffi::bindings as b;

/// Source of definitions that populates a [`CounterDefinition`].
pub trait EventProvider {
    fn provide(&self, definition: &mut CounterDefinition) -> Result<()>;
}

pub(super) fn builtin_providers() -> [Box<dyn EventProvider>; 3] {
    [
        Box::new(PerfSubsystemEvents),
        Box::new(BuiltinMetrics),
        Box::new(BuiltinTimeEvents),
    ]
}

/// Generic hardware, software and hardware-cache events of the perf subsystem.
///
/// All of them are registered for the `cpu` PMU.
pub struct PerfSubsystemEvents;

const HARDWARE: &[(&str, u64)] = &[
    ("instructions", b::PERF_COUNT_HW_INSTRUCTIONS),
    ("cycles", b::PERF_COUNT_HW_CPU_CYCLES),
    ("cpu-cycles", b::PERF_COUNT_HW_CPU_CYCLES),
    ("bus-cycles", b::PERF_COUNT_HW_BUS_CYCLES),
    ("ref-cycles", b::PERF_COUNT_HW_REF_CPU_CYCLES),
    ("cache-misses", b::PERF_COUNT_HW_CACHE_MISSES),
    ("cache-references", b::PERF_COUNT_HW_CACHE_REFERENCES),
    ("branches", b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS),
    ("branch-instructions", b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS),
    ("branch-misses", b::PERF_COUNT_HW_BRANCH_MISSES),
    (
        "stalled-cycles-frontend",
        b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND,
    ),
    ("idle-cycles-frontend", b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND),
    (
        "stalled-cycles-backend",
        b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND,
    ),
    ("idle-cycles-backend", b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND),
];

const SOFTWARE: &[(&str, u64)] = &[
    ("cpu-clock", b::PERF_COUNT_SW_CPU_CLOCK),
    ("task-clock", b::PERF_COUNT_SW_TASK_CLOCK),
    ("page-faults", b::PERF_COUNT_SW_PAGE_FAULTS),
    ("faults", b::PERF_COUNT_SW_PAGE_FAULTS),
    ("major-faults", b::PERF_COUNT_SW_PAGE_FAULTS_MAJ),
    ("minor-faults", b::PERF_COUNT_SW_PAGE_FAULTS_MIN),
    ("alignment-faults", b::PERF_COUNT_SW_ALIGNMENT_FAULTS),
    ("emulation-faults", b::PERF_COUNT_SW_EMULATION_FAULTS),
    ("context-switches", b::PERF_COUNT_SW_CONTEXT_SWITCHES),
    ("cs", b::PERF_COUNT_SW_CONTEXT_SWITCHES),
    ("cpu-migrations", b::PERF_COUNT_SW_CPU_MIGRATIONS),
    ("migrations", b::PERF_COUNT_SW_CPU_MIGRATIONS),
    ("bpf-output", b::PERF_COUNT_SW_BPF_OUTPUT),
    ("cgroup-switches", b::PERF_COUNT_SW_CGROUP_SWITCHES),
];

const HW_CACHE: &[(&str, Cache, Op, OpResult)] = &[
    ("L1-dcache-loads", Cache::L1d, Op::Read, OpResult::Access),
    ("L1-dcache-load-misses", Cache::L1d, Op::Read, OpResult::Miss),
    ("L1-dcache-stores", Cache::L1d, Op::Write, OpResult::Access),
    ("L1-dcache-store-misses", Cache::L1d, Op::Write, OpResult::Miss),
    ("L1-dcache-prefetches", Cache::L1d, Op::Prefetch, OpResult::Access),
    (
        "L1-dcache-prefetch-misses",
        Cache::L1d,
        Op::Prefetch,
        OpResult::Miss,
    ),
    ("L1-icache-loads", Cache::L1i, Op::Read, OpResult::Access),
    ("L1-icache-load-misses", Cache::L1i, Op::Read, OpResult::Miss),
    ("L1-icache-prefetches", Cache::L1i, Op::Prefetch, OpResult::Access),
    (
        "L1-icache-prefetch-misses",
        Cache::L1i,
        Op::Prefetch,
        OpResult::Miss,
    ),
    ("LLC-loads", Cache::Ll, Op::Read, OpResult::Access),
    ("LLC-load-misses", Cache::Ll, Op::Read, OpResult::Miss),
    ("LLC-stores", Cache::Ll, Op::Write, OpResult::Access),
    ("LLC-store-misses", Cache::Ll, Op::Write, OpResult::Miss),
    ("LLC-prefetches", Cache::Ll, Op::Prefetch, OpResult::Access),
    ("LLC-prefetch-misses", Cache::Ll, Op::Prefetch, OpResult::Miss),
    ("dTLB-loads", Cache::Dtlb, Op::Read, OpResult::Access),
    ("dTLB-load-misses", Cache::Dtlb, Op::Read, OpResult::Miss),
    ("dTLB-stores", Cache::Dtlb, Op::Write, OpResult::Access),
    ("dTLB-store-misses", Cache::Dtlb, Op::Write, OpResult::Miss),
    ("iTLB-loads", Cache::Itlb, Op::Read, OpResult::Access),
    ("iTLB-load-misses", Cache::Itlb, Op::Read, OpResult::Miss),
    ("branch-loads", Cache::Bpu, Op::Read, OpResult::Access),
    ("branch-load-misses", Cache::Bpu, Op::Read, OpResult::Miss),
    ("node-loads", Cache::Node, Op::Read, OpResult::Access),
    ("node-load-misses", Cache::Node, Op::Read, OpResult::Miss),
    ("node-stores", Cache::Node, Op::Write, OpResult::Access),
    ("node-store-misses", Cache::Node, Op::Write, OpResult::Miss),
];

/// Name of the Intel auxiliary event that must lead memory-load sampling groups.
pub const INTEL_AUX_EVENT: &str = "mem-loads-aux";

impl EventProvider for PerfSubsystemEvents {
    fn provide(&self, definition: &mut CounterDefinition) -> Result<()> {
        for &(name, config) in HARDWARE {
            let config = CounterConfig::new(b::PERF_TYPE_HARDWARE, config);
            definition.add(DEFAULT_PMU, name, config);
        }
        for &(name, config) in SOFTWARE {
            let config = CounterConfig::new(b::PERF_TYPE_SOFTWARE, config);
            definition.add(DEFAULT_PMU, name, config);
        }
        for &(name, cache, op, result) in HW_CACHE {
            definition.add(DEFAULT_PMU, name, CounterConfig::hw_cache(cache, op, result));
        }
        definition.add(
            DEFAULT_PMU,
            INTEL_AUX_EVENT,
            CounterConfig::new(b::PERF_TYPE_RAW, 0x8203),
        );
        Ok(())
    }
}

/// Commonly used metrics such as `instructions-per-cycle`.
pub struct BuiltinMetrics;

impl EventProvider for BuiltinMetrics {
    fn provide(&self, definition: &mut CounterDefinition) -> Result<()> {
        for &(name, formula) in BUILTIN_METRICS {
            definition.add_formula(name, formula)?;
        }
        Ok(())
    }
}

/// `seconds`, `milliseconds`, `microseconds` and `nanoseconds`.
pub struct BuiltinTimeEvents;

impl EventProvider for BuiltinTimeEvents {
    fn provide(&self, definition: &mut CounterDefinition) -> Result<()> {
        for unit in Elapsed::ALL {
            definition.add_time_event(unit.name(), unit);
        }
        Ok(())
    }
}

/// Events listed in a CSV file.
///
/// Each line reads `pmu,event_name,type,config[,ext1,ext2][,scale]`:
///
/// - `type` is a number, one of `hardware`, `software`, `tracepoint`,
///   `hw_cache`, `raw` and `breakpoint`, or empty to read the type of the PMU
///   from `/sys/bus/event_source/devices/<pmu>/type`.
/// - numbers are decimal or `0x`-prefixed hexadecimal.
/// - lines starting with `#` and blank lines are skipped.
pub struct CsvFileEvents {
    path: PathBuf,
}

impl CsvFileEvents {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|source| Error::CannotOpenFile {
            path: self.path.clone(),
            source,
        })
    }
}

impl EventProvider for CsvFileEvents {
    fn provide(&self, definition: &mut CounterDefinition) -> Result<()> {
        let content = self.read()?;
        parse_csv(&content, definition, pmu_type)
    }
}

pub(super) fn parse_csv(
    content: &str,
    definition: &mut CounterDefinition,
    resolve_pmu_type: impl Fn(&str) -> io::Result<u32>,
) -> Result<()> {
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invalid = |reason: String| Error::InvalidDefinition { line: i + 1, reason };
        let columns: Vec<_> = line.split(',').map(str::trim).collect();

        let columns_error = || invalid(format!("expected 4 to 7 columns, found {}", columns.len()));
        let (pmu, name, ty, config) = match columns[..] {
            [pmu, name, ty, config, ..] => (pmu, name, ty, config),
            _ => return Err(columns_error()),
        };
        if name.is_empty() {
            return Err(invalid("empty event name".to_string()));
        }
        let pmu = if pmu.is_empty() { DEFAULT_PMU } else { pmu };

        let ty = match ty {
            "" => resolve_pmu_type(pmu)
                .map_err(|e| invalid(format!("cannot read type of PMU '{pmu}': {e}")))?,
            "hardware" => b::PERF_TYPE_HARDWARE,
            "software" => b::PERF_TYPE_SOFTWARE,
            "tracepoint" => b::PERF_TYPE_TRACEPOINT,
            "hw_cache" => b::PERF_TYPE_HW_CACHE,
            "raw" => b::PERF_TYPE_RAW,
            "breakpoint" => b::PERF_TYPE_BREAKPOINT,
            ty => parse_number(ty)
                .and_then(|ty| u32::try_from(ty).ok())
                .ok_or_else(|| invalid(format!("invalid type '{ty}'")))?,
        };

        let number = |s: &str| parse_number(s).ok_or_else(|| invalid(format!("invalid number '{s}'")));
        let scale = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| invalid(format!("invalid scale '{s}'")))
        };

        let mut counter = CounterConfig::new(ty, number(config)?);
        match columns[4..] {
            [] => (),
            [s] => counter = counter.with_scale(scale(s)?),
            [ext1, ext2] => counter = counter.with_extensions(number(ext1)?, number(ext2)?),
            [ext1, ext2, s] => {
                counter = counter
                    .with_extensions(number(ext1)?, number(ext2)?)
                    .with_scale(scale(s)?)
            }
            _ => return Err(columns_error()),
        }

        definition.add(pmu, name, counter);
    }
    Ok(())
}

fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

// The type of a dynamic PMU is exposed in sysfs:
// https://man7.org/linux/man-pages/man2/perf_event_open.2.html
fn pmu_type(pmu: &str) -> io::Result<u32> {
    let path = Path::new("/sys/bus/event_source/devices").join(pmu).join("type");
    let content = fs::read_to_string(path)?;
    content.trim().parse::<u32>().map_err(io::Error::other)
}
