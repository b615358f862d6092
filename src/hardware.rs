use std::path::Path;

use crate::definition::INTEL_AUX_EVENT;
use crate::ffi::PAGE_SIZE;

/// Probes of the CPU the process runs on.
pub struct HardwareInfo;

impl HardwareInfo {
    pub fn is_intel() -> bool {
        vendor().as_deref() == Some("GenuineIntel")
    }

    pub fn is_amd() -> bool {
        vendor().as_deref() == Some("AuthenticAMD")
    }

    /// Whether memory-load sampling needs the auxiliary event as group leader,
    /// as on Sapphire Rapids and later.
    pub fn is_intel_aux_counter_required() -> bool {
        Self::is_intel()
            && Path::new("/sys/bus/event_source/devices/cpu/events")
                .join(INTEL_AUX_EVENT)
                .exists()
    }

    pub fn memory_page_size() -> usize {
        *PAGE_SIZE
    }

    /// General-purpose counters per logical core, if the CPU reports it.
    pub fn physical_performance_counters_per_logical_core() -> Option<u32> {
        if !Self::is_intel() {
            return None;
        }
        let (max_leaf, _) = cpuid(0)?;
        if max_leaf < 0xA {
            return None;
        }
        // Architectural performance monitoring leaf, EAX[15:8].
        let (eax, _) = cpuid(0xA)?;
        let counters = (eax >> 8) & 0xff;
        (counters > 0).then_some(counters)
    }
}

fn vendor() -> Option<String> {
    let (_, vendor) = cpuid(0)?;
    String::from_utf8(vendor.to_vec()).ok()
}

/// `(eax, ebx:edx:ecx)` of a CPUID leaf.
#[cfg(target_arch = "x86_64")]
fn cpuid(leaf: u32) -> Option<(u32, [u8; 12])> {
    // SAFETY: CPUID is available on every x86-64 CPU.
    #[allow(unused_unsafe)]
    let regs = unsafe { std::arch::x86_64::__cpuid(leaf) };
    let mut vendor = [0; 12];
    vendor[0..4].copy_from_slice(&regs.ebx.to_le_bytes());
    vendor[4..8].copy_from_slice(&regs.edx.to_le_bytes());
    vendor[8..12].copy_from_slice(&regs.ecx.to_le_bytes());
    Some((regs.eax, vendor))
}

#[cfg(not(target_arch = "x86_64"))]
fn cpuid(_: u32) -> Option<(u32, [u8; 12])> {
    None
}

#[cfg(test)]
mod test {
    use super::HardwareInfo;

    #[test]
    fn test_probes() {
        assert!(!(HardwareInfo::is_intel() && HardwareInfo::is_amd()));
        assert_eq!(HardwareInfo::memory_page_size() % 4096, 0);

        // Only Intel reports the architectural counter count.
        if let Some(counters) = HardwareInfo::physical_performance_counters_per_logical_core() {
            assert!(HardwareInfo::is_intel());
            assert!(counters > 0);
        }
        if HardwareInfo::is_intel_aux_counter_required() {
            assert!(HardwareInfo::is_intel());
        }
    }
}
