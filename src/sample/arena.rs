use std::fs::File;
use std::io;
use std::ptr::{addr_of_mut, NonNull};
use std::slice;
use std::sync::atomic::AtomicU64;

use crate::ffi::syscall::{mmap, munmap};
use crate::ffi::{Metadata, PAGE_SIZE};

/// Shared mapping of a counter's file descriptor.
///
/// The first page is the `perf_event_mmap_page`, the remaining pages (if any)
/// form the ring-buffer written by the kernel.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is plain memory; concurrent access is synchronized through
// `data_head`/`data_tail` and the seqlock of the metadata page.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    pub fn new(file: &File, pages: usize) -> io::Result<Self> {
        let len = pages
            .checked_mul(*PAGE_SIZE)
            .ok_or_else(|| io::Error::other("mapping size overflow"))?;
        let prot = libc::PROT_READ | libc::PROT_WRITE;
        // Writable so that `data_tail` can be updated:
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L6582
        let flags = libc::MAP_SHARED;
        let ptr = unsafe { mmap::<u8>(len, prot, flags, file, 0) }?;
        let ptr = NonNull::new(ptr).ok_or_else(|| io::Error::other("null mapping"))?;
        Ok(Self { ptr, len })
    }

    pub fn metadata(&self) -> *mut Metadata {
        self.ptr.as_ptr().cast()
    }

    pub fn data_head(&self) -> &AtomicU64 {
        let metadata = self.metadata();
        unsafe { AtomicU64::from_ptr(addr_of_mut!((*metadata).data_head)) }
    }

    pub fn data_tail(&self) -> &AtomicU64 {
        let metadata = self.metadata();
        unsafe { AtomicU64::from_ptr(addr_of_mut!((*metadata).data_tail)) }
    }

    /// The ring-buffer pages following the metadata page.
    pub fn data(&self) -> &[u8] {
        let page = *PAGE_SIZE;
        if self.len <= page {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.ptr.as_ptr().add(page), self.len - page) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr(), self.len) } {
            log::error!("Failed to unmap counter buffer: {}", e);
        }
    }
}
