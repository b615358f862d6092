use std::fs::File;
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::arena::Arena;
use crate::error::{Error, Result};
use crate::ffi::syscall::{epoll_create1, epoll_ctl, epoll_wait, eventfd, write};
use crate::ffi::PAGE_SIZE;

/// Number of data pages for a buffer of `buffer_pages` pages (header included).
///
/// The kernel requires a power of two.
pub(crate) fn data_pages(buffer_pages: u64) -> u64 {
    buffer_pages.saturating_sub(1).max(1).next_power_of_two()
}

/// Fill level in bytes at which the kernel wakes the overflow worker.
pub(crate) fn wakeup_watermark(buffer_pages: u64) -> u32 {
    let bytes = data_pages(buffer_pages).saturating_mul(*PAGE_SIZE as u64) / 2;
    bytes.min(u32::MAX as u64) as u32
}

type Chunks = Arc<Mutex<Vec<Vec<u8>>>>;

/// Ring-buffer of a sampling counter.
///
/// Records are copied out of the mapping into chunks before the kernel could
/// overwrite them, either by the overflow worker while sampling or by
/// [`MmapBuffer::consume_data`] afterwards.
pub(crate) struct MmapBuffer {
    arena: Arc<Arena>,
    chunks: Chunks,
    worker: Option<OverflowWorker>,
}

impl MmapBuffer {
    pub fn new(counter: &Arc<File>, buffer_pages: u64) -> Result<Self> {
        let pages = 1 + data_pages(buffer_pages) as usize;
        let arena = Arena::new(counter, pages).map_err(Error::Mmap)?;
        let arena = Arc::new(arena);
        let chunks = Chunks::default();

        let worker = {
            let arena = Arc::clone(&arena);
            let chunks = Arc::clone(&chunks);
            OverflowWorker::spawn(Arc::clone(counter), move || {
                if let Some(chunk) = drain(&arena) {
                    let mut chunks = chunks.lock().unwrap_or_else(PoisonError::into_inner);
                    chunks.push(chunk);
                }
            })?
        };

        Ok(Self {
            arena,
            chunks,
            worker: Some(worker),
        })
    }

    /// Stops the overflow worker, blocking until it exited.
    pub fn cancel(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.cancel();
        }
    }

    #[cfg(test)]
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Takes every record written so far.
    ///
    /// Cancels the overflow worker first, a second call returns nothing new.
    pub fn consume_data(&mut self) -> Vec<Vec<u8>> {
        self.cancel();
        let mut chunks = {
            let mut chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);
            mem::take(&mut *chunks)
        };
        chunks.extend(drain(&self.arena));
        chunks
    }
}

impl Drop for MmapBuffer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// Copies the unread region and hands it back to the kernel.
fn drain(arena: &Arena) -> Option<Vec<u8>> {
    let data = arena.data();
    if data.is_empty() {
        return None;
    }
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L720
    let head = arena.data_head().load(Ordering::Acquire);
    let tail = arena.data_tail().load(Ordering::Relaxed);
    if head == tail {
        return None;
    }
    let chunk = copy_unread(data, tail, head);
    arena.data_tail().store(head, Ordering::Release);
    Some(chunk)
}

/// Copies `[tail, head)` out of the ring, following a wrap-around.
///
/// `tail` and `head` are the monotonically increasing positions the kernel
/// maintains, not offsets into `data`.
pub(crate) fn copy_unread(data: &[u8], tail: u64, head: u64) -> Vec<u8> {
    let size = data.len();
    if size == 0 {
        return vec![];
    }
    let len = (head.wrapping_sub(tail) as usize).min(size);
    let start = (tail % size as u64) as usize;

    let mut chunk = Vec::with_capacity(len);
    if start + len <= size {
        chunk.extend_from_slice(&data[start..start + len]);
    } else {
        chunk.extend_from_slice(&data[start..]);
        chunk.extend_from_slice(&data[..start + len - size]);
    }
    chunk
}

const COUNTER_TOKEN: u64 = 0;
const CANCEL_TOKEN: u64 = 1;

/// Background thread draining a ring-buffer whenever the kernel signals it.
///
/// The thread blocks in `epoll_wait` on the counter and a private `eventfd`.
/// Writing to the `eventfd` makes it exit, see [`OverflowWorker::cancel`].
pub(crate) struct OverflowWorker {
    cancel: File,
    handle: Option<JoinHandle<()>>,
}

impl OverflowWorker {
    pub fn spawn<F>(counter: Arc<File>, mut on_wakeup: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = eventfd(0, libc::EFD_CLOEXEC).map_err(Error::CannotCreateEventFileDescriptor)?;
        let epoll = epoll_create1(libc::EPOLL_CLOEXEC).map_err(Error::CannotCreateEventFileDescriptor)?;

        let mut event = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLHUP) as _,
            u64: COUNTER_TOKEN,
        };
        epoll_ctl(&epoll, libc::EPOLL_CTL_ADD, &counter, &mut event)
            .map_err(Error::CannotCreateEventFileDescriptor)?;
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as _,
            u64: CANCEL_TOKEN,
        };
        epoll_ctl(&epoll, libc::EPOLL_CTL_ADD, &cancel, &mut event)
            .map_err(Error::CannotCreateEventFileDescriptor)?;

        let handle = thread::spawn(move || {
            // Keeps the counter registered for as long as the thread runs.
            let _counter = counter;
            let mut events = [libc::epoll_event { events: 0, u64: 0 }; 2];
            loop {
                let ready = match epoll_wait(&epoll, &mut events, -1) {
                    Ok(ready) => ready,
                    Err(e) if e.raw_os_error() == Some(libc::EINTR) => continue,
                    Err(e) => {
                        log::error!("Overflow worker stopped: {}", e);
                        return;
                    }
                };

                let mut hang_up = false;
                let mut wakeup = false;
                for event in ready {
                    let (token, flags) = (event.u64, event.events);
                    if token == CANCEL_TOKEN {
                        log::trace!("Overflow worker cancelled");
                        return;
                    }
                    wakeup |= flags & libc::EPOLLIN as u32 != 0;
                    hang_up |= flags & libc::EPOLLHUP as u32 != 0;
                }

                if wakeup || hang_up {
                    log::trace!("Overflow worker woke up");
                    on_wakeup();
                }
                // The monitored task exited, nothing more will be written.
                if hang_up {
                    return;
                }
            }
        });

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    /// Signals the thread and waits for it to exit.
    pub fn cancel(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(e) = write(&self.cancel, &1u64.to_ne_bytes()) {
            // Without the signal the join below would block forever.
            log::error!("Failed to cancel overflow worker: {}", e);
            return;
        }
        if handle.join().is_err() {
            log::error!("Overflow worker panicked");
        }
    }
}

impl Drop for OverflowWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}
