use std::fs::File;
use std::io::{Error, Result};
use std::os::fd::{AsRawFd, FromRawFd};

use libc::epoll_event;

use super::Attr;

// Turns the `-1` convention of libc into `last_os_error`.
fn check<T: PartialEq + From<i8>>(ret: T) -> Result<T> {
    if ret == T::from(-1) {
        Err(Error::last_os_error())
    } else {
        Ok(ret)
    }
}

// SAFETY: `fd` must be a freshly returned descriptor not owned elsewhere.
unsafe fn own(fd: i32) -> File {
    File::from_raw_fd(fd)
}

pub fn perf_event_open(attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64) -> Result<File> {
    let num = libc::SYS_perf_event_open;
    let fd = check(unsafe { libc::syscall(num, attr as *const Attr, pid, cpu, group_fd, flags) })?;
    Ok(unsafe { own(fd as _) })
}

pub fn ioctl_arg(file: &File, op: u64, arg: u64) -> Result<i32> {
    check(unsafe { libc::ioctl(file.as_raw_fd(), op as _, arg) })
}

pub fn ioctl_argp<T: ?Sized>(file: &File, op: u64, argp: &mut T) -> Result<i32> {
    let argp = argp as *mut T as *mut libc::c_void;
    check(unsafe { libc::ioctl(file.as_raw_fd(), op as _, argp) })
}

pub fn read(file: &File, buf: &mut [u8]) -> Result<usize> {
    let bytes = check(unsafe { libc::read(file.as_raw_fd(), buf.as_mut_ptr() as _, buf.len()) })?;
    Ok(bytes as _)
}

pub fn write(file: &File, buf: &[u8]) -> Result<usize> {
    let bytes = check(unsafe { libc::write(file.as_raw_fd(), buf.as_ptr() as _, buf.len()) })?;
    Ok(bytes as _)
}

/// # Safety
///
/// Same as `mmap(2)`; the returned region must be released with [`munmap`].
pub unsafe fn mmap<T>(len: usize, prot: i32, flags: i32, file: &File, offset: i64) -> Result<*mut T> {
    let ptr = libc::mmap(std::ptr::null_mut(), len, prot, flags, file.as_raw_fd(), offset);
    if ptr == libc::MAP_FAILED {
        return Err(Error::last_os_error());
    }
    Ok(ptr.cast())
}

/// # Safety
///
/// `ptr` and `len` must describe a mapping returned by [`mmap`] that is not
/// referenced anymore.
pub unsafe fn munmap<T>(ptr: *mut T, len: usize) -> Result<()> {
    check(libc::munmap(ptr.cast(), len)).map(|_| ())
}

pub fn eventfd(init: u32, flags: i32) -> Result<File> {
    let fd = check(unsafe { libc::eventfd(init, flags) })?;
    Ok(unsafe { own(fd) })
}

pub fn epoll_create1(flags: i32) -> Result<File> {
    let fd = check(unsafe { libc::epoll_create1(flags) })?;
    Ok(unsafe { own(fd) })
}

pub fn epoll_ctl(epoll: &File, op: i32, file: &File, event: &mut epoll_event) -> Result<()> {
    check(unsafe { libc::epoll_ctl(epoll.as_raw_fd(), op, file.as_raw_fd(), event) }).map(|_| ())
}

/// Waits for readiness, `timeout` in milliseconds or `-1` for none.
pub fn epoll_wait<'a>(epoll: &File, events: &'a mut [epoll_event], timeout: i32) -> Result<&'a [epoll_event]> {
    let max = events.len() as i32;
    let len = check(unsafe { libc::epoll_wait(epoll.as_raw_fd(), events.as_mut_ptr(), max, timeout) })?;
    Ok(&events[..len as usize])
}
