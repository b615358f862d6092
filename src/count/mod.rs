use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use crate::config::attr::{counting, live, sampling};
use crate::config::{Config, PeriodOrFrequency, Precision, SampleConfig, Target};
use crate::definition::CounterConfig;
use crate::error::{Error, Result};
use crate::ffi::cursor::Cursor;
use crate::ffi::syscall::{ioctl_arg, ioctl_argp, perf_event_open, read};
use crate::ffi::{bindings as b, Attr};
use crate::sample::arena::Arena;
use crate::sample::buffer::{wakeup_watermark, MmapBuffer};
use crate::sample::Values;

pub mod group;
mod live;
mod values;

pub use group::Group;
pub use values::*;

/// A single perf event.
///
/// Created unopened from a [`CounterConfig`]; `open*` creates the kernel
/// counter and [`close`][Self::close] (or drop) releases it. Reopening always
/// creates a new file descriptor.
pub struct Counter {
    name: String,
    config: CounterConfig,
    file: Option<Arc<File>>,
    id: Option<u64>,
    attr: Option<Attr>,
    precision: Option<Precision>,
    buffer: Option<MmapBuffer>,
    mapping: Option<Arena>,
}

impl Counter {
    pub fn new(name: impl Into<String>, config: CounterConfig) -> Self {
        Self {
            name: name.into(),
            config,
            file: None,
            id: None,
            attr: None,
            precision: None,
            buffer: None,
            mapping: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Kernel-assigned id, `None` until opened.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Attribute the counter was opened with.
    pub fn attr(&self) -> Option<&Attr> {
        self.attr.as_ref()
    }

    /// Precision the counter was opened with, after any downgrade.
    pub fn precision(&self) -> Option<Precision> {
        self.precision
    }

    /// Opens a counting event, as a member of `leader`'s group if given.
    pub fn open(&mut self, config: &Config, leader: Option<&Counter>) -> Result<()> {
        let attr = counting(&self.config, config);
        self.open_with(attr, config, leader)
    }

    /// Opens a standalone counting event whose value is read in-process.
    pub fn open_live(&mut self, config: &Config) -> Result<()> {
        let attr = live(&self.config, config);
        self.open_with(attr, config, None)?;
        let file = self.file().map_err(|e| self.open_error(e))?;
        // Only the metadata page is needed for `rdpmc`.
        match Arena::new(file, 1) {
            Ok(mapping) => self.mapping = Some(mapping),
            Err(e) => log::debug!("Reading '{}' via read(2) only: {}", self.name, e),
        }
        Ok(())
    }

    /// Opens a member of a sampling group.
    ///
    /// A trigger samples with its precision and period or frequency; the
    /// precision is lowered as long as `precision_downgrade` accepts the
    /// error. Other members (`trigger = None`) are only read.
    pub fn open_sampling(
        &mut self,
        config: &SampleConfig,
        values: &Values,
        trigger: Option<(Precision, PeriodOrFrequency)>,
        leader: Option<&Counter>,
    ) -> Result<()> {
        let watermark = wakeup_watermark(config.buffer_pages);

        let Some((mut precision, period_or_frequency)) = trigger else {
            let attr = sampling(&self.config, config, values, None, watermark);
            return self.open_with(attr, &config.base, leader);
        };

        loop {
            let trigger = Some((precision, period_or_frequency));
            let attr = sampling(&self.config, config, values, trigger, watermark);
            match self.try_open(&attr, &config.base, leader) {
                Ok(file) => {
                    self.precision = Some(precision);
                    self.opened(file, attr, &config.base)?;
                    break;
                }
                Err(e) if config.base.precision_downgrade.should_downgrade(&e) => {
                    match precision.step_down() {
                        Some(lower) => {
                            log::warn!(
                                "Cannot open '{}' with precision {:?} ({}), retrying with {:?}",
                                self.name,
                                precision,
                                e,
                                lower
                            );
                            precision = lower;
                        }
                        None => return Err(self.open_error(e)),
                    }
                }
                Err(e) => return Err(self.open_error(e)),
            }
        }

        let file = self.file.clone().ok_or_else(|| self.open_error(bad_fd()))?;
        self.buffer = Some(MmapBuffer::new(&file, config.buffer_pages)?);
        Ok(())
    }

    fn open_with(&mut self, attr: Attr, config: &Config, leader: Option<&Counter>) -> Result<()> {
        let file = self
            .try_open(&attr, config, leader)
            .map_err(|e| self.open_error(e))?;
        self.opened(file, attr, config)
    }

    fn try_open(&self, attr: &Attr, config: &Config, leader: Option<&Counter>) -> io::Result<File> {
        let Target { pid, cpu } = config.target;
        let group_fd = match leader {
            Some(leader) => leader.file()?.as_raw_fd(),
            None => -1,
        };
        perf_event_open(attr, pid, cpu, group_fd, b::PERF_FLAG_FD_CLOEXEC)
    }

    fn opened(&mut self, file: File, attr: Attr, config: &Config) -> Result<()> {
        let level = if config.is_debug {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        log::log!(level, "Opened counter '{}' (fd {}): {:?}", self.name, file.as_raw_fd(), attr);

        let mut id = 0u64;
        ioctl_argp(&file, b::PERF_EVENT_IOC_ID, &mut id).map_err(|source| Error::Ioctl {
            op: "query id of",
            source,
        })?;

        self.file = Some(Arc::new(file));
        self.id = Some(id);
        self.attr = Some(attr);
        Ok(())
    }

    fn open_error(&self, source: io::Error) -> Error {
        Error::CannotOpenCounter {
            name: self.name.clone(),
            source,
        }
    }

    pub(crate) fn file(&self) -> io::Result<&Arc<File>> {
        self.file.as_ref().ok_or_else(bad_fd)
    }

    pub(crate) fn buffer_mut(&mut self) -> Option<&mut MmapBuffer> {
        self.buffer.as_mut()
    }

    pub fn enable(&self) -> Result<()> {
        self.ioctl("enable", b::PERF_EVENT_IOC_ENABLE, 0)
    }

    pub fn disable(&self) -> Result<()> {
        self.ioctl("disable", b::PERF_EVENT_IOC_DISABLE, 0)
    }

    pub fn reset(&self) -> Result<()> {
        self.ioctl("reset", b::PERF_EVENT_IOC_RESET, 0)
    }

    pub(crate) fn ioctl(&self, op: &'static str, request: u64, arg: u64) -> Result<()> {
        self.file()
            .and_then(|file| ioctl_arg(file, request, arg))
            .map(|_| ())
            .map_err(|source| Error::Ioctl { op, source })
    }

    /// Reads the group values of a counter opened with [`open`][Self::open]
    /// or [`open_sampling`][Self::open_sampling], `members` being the group size.
    pub(crate) fn read_group(&self, members: usize) -> Result<CounterValues> {
        let mut buf = vec![0; CounterValues::read_size(members)];
        let len = self
            .file()
            .and_then(|file| read(file, &mut buf))
            .map_err(Error::CannotReadCounter)?;
        CounterValues::parse(&mut Cursor::new(&buf[..len]))
            .map_err(|e| Error::CannotReadCounter(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Current value of a counter opened with [`open_live`][Self::open_live].
    ///
    /// Uses `rdpmc` when the kernel allows it, `read(2)` otherwise.
    pub fn read_value(&self) -> Result<u64> {
        if let Some(value) = self.read_live() {
            return Ok(value);
        }
        let mut buf = [0; size_of::<u64>()];
        self.file()
            .and_then(|file| read(file, &mut buf))
            .map_err(Error::CannotReadCounter)?;
        Ok(u64::from_ne_bytes(buf))
    }

    /// Reads the hardware counter directly via `rdpmc`.
    ///
    /// `None` if the counter is not opened live, not scheduled, or the
    /// platform does not support user-space reads.
    pub fn read_live(&self) -> Option<u64> {
        live::read(self.mapping.as_ref()?)
    }

    /// Releases the file descriptor, the mappings and the overflow worker.
    pub fn close(&mut self) {
        // Unmap before the descriptor is closed.
        self.buffer = None;
        self.mapping = None;
        self.file = None;
        self.id = None;
        self.attr = None;
        self.precision = None;
    }

    /// Unopened copy sharing only the configuration.
    pub fn clone_unopened(&self) -> Self {
        Self::new(self.name.clone(), self.config.clone())
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("id", &self.id)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

fn bad_fd() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

#[cfg(test)]
mod test;
