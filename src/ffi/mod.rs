use std::sync::LazyLock;

pub mod bindings;
pub mod cursor;
pub mod syscall;

pub static PAGE_SIZE: LazyLock<usize> = LazyLock::new(|| {
    let name = libc::_SC_PAGE_SIZE;
    let size = unsafe { libc::sysconf(name) };
    // `sysconf` only fails for unknown names.
    if size > 0 {
        size as _
    } else {
        4096
    }
});

pub type Attr = bindings::perf_event_attr;
pub type Metadata = bindings::perf_event_mmap_page;
