use crate::sample::arena::Arena;

/// Reads the hardware counter of a live mapping in user space.
///
/// Follows the seqlock protocol of `perf_event_mmap_page`:
/// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L597
#[cfg(target_arch = "x86_64")]
pub(super) fn read(arena: &Arena) -> Option<u64> {
    use std::ptr::{addr_of, read_volatile};
    use std::sync::atomic::{compiler_fence, Ordering};

    use crate::ffi::bindings::CAP_USER_RDPMC;

    let metadata = arena.metadata();
    loop {
        let (seq, index, offset, width, capabilities) = unsafe {
            let seq = read_volatile(addr_of!((*metadata).lock));
            compiler_fence(Ordering::SeqCst);
            (
                seq,
                read_volatile(addr_of!((*metadata).index)),
                read_volatile(addr_of!((*metadata).offset)),
                read_volatile(addr_of!((*metadata).pmc_width)),
                read_volatile(addr_of!((*metadata).capabilities)),
            )
        };

        // `index` is 0 while the counter is not scheduled on a PMC.
        if capabilities & CAP_USER_RDPMC == 0 || index == 0 {
            return None;
        }

        let mut count = unsafe { rdpmc(index - 1) } as i64;
        if (1..64).contains(&width) {
            let shift = 64 - width as u32;
            count = (count << shift) >> shift;
        }
        let value = offset.wrapping_add(count);

        compiler_fence(Ordering::SeqCst);
        if unsafe { read_volatile(addr_of!((*metadata).lock)) } == seq {
            return Some(value as u64);
        }
    }
}

#[cfg(target_arch = "x86_64")]
unsafe fn rdpmc(counter: u32) -> u64 {
    let (lo, hi): (u32, u32);
    std::arch::asm!(
        "rdpmc",
        in("ecx") counter,
        out("eax") lo,
        out("edx") hi,
        options(nostack, nomem, preserves_flags),
    );
    ((hi as u64) << 32) | lo as u64
}

#[cfg(not(target_arch = "x86_64"))]
pub(super) fn read(_: &Arena) -> Option<u64> {
    None
}
