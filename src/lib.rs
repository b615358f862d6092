//! Hardware performance counters and sampling on top of the `perf_event_open`
//! system call.
//!
//! ## Example
//!
//! Count the instructions and cycles of a calculation and derive its IPC.
//! Metrics such as `instructions-per-cycle` pull in the events they need.
//!
//! ```rust,no_run
//! use perf_counters::config::Config;
//! use perf_counters::definition::CounterDefinition;
//! use perf_counters::event_counter::{EventCounter, Schedule};
//!
//! let mut counter = EventCounter::new(CounterDefinition::shared(), Config::default());
//! counter
//!     .add_all(["instructions", "cycles", "instructions-per-cycle"], Schedule::Append)
//!     .unwrap();
//!
//! counter.start().unwrap();
//! fn fib(n: usize) -> usize {
//!     match n {
//!         0 => 0,
//!         1 => 1,
//!         n => fib(n - 1) + fib(n - 2),
//!     }
//! }
//! std::hint::black_box(fib(30));
//! counter.stop().unwrap();
//!
//! println!("{}", counter.result(1));
//! ```
//!
//! Events are scheduled into groups of at most
//! [`num_events_per_physical_counter`][config::Config::num_events_per_physical_counter]
//! members; the kernel multiplexes groups when there are more groups than
//! physical counters and the results are scaled accordingly.
//!
//! For sampling, see [`sample::Sampler`].
//!
//! ## Kernel compatibility
//!
//! Any Linux kernel since 4.0 is supported. Some sample fields, e.g.
//! [`sample::Values::weight_struct`] or [`sample::Values::data_page_size`],
//! need newer kernels; opening fails with the kernel's error otherwise.

pub mod config;
pub mod count;
pub mod definition;
pub mod error;
pub mod event_counter;
mod ffi;
pub mod hardware;
pub mod result;
pub mod sample;

pub use error::{Error, Result};

#[cfg(test)]
mod test_utils {
    use std::sync::Once;

    pub fn init_logging() {
        static INIT: Once = Once::new();
        INIT.call_once(pretty_env_logger::init);
    }
}
