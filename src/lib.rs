//! A deterministic, single-threaded cooperative task dispatcher.
//!
//! This crate simulates a small operating-system kernel: six tasks with fixed
//! priorities exchange [packets] through bounded queues, and a [`Scheduler`]
//! repeatedly selects the current task and either runs it or skips past it
//! if it is blocked. The simulation is closed and self-verifying: running it
//! to completion yields two counters, the number of packets enqueued and the
//! number of times a task held itself, and for the reference workload those
//! counters have known values.
//!
//! ```
//! let report = richards::bench::run(&richards::Config::default())?;
//! assert!(report.is_correct());
//! # Ok::<(), richards::Error>(())
//! ```
//!
//! [packets]: crate::packet::Packet
#![warn(missing_debug_implementations)]

#[macro_use]
mod util;

pub mod behavior;
pub mod bench;
pub mod error;
pub mod packet;
pub mod register;
pub mod scheduler;
pub mod task;
pub mod trace;

#[doc(inline)]
pub use self::{
    bench::{Config, Report, Verdict},
    error::Error,
    packet::{Kind, Packet, PacketRef},
    register::Register,
    scheduler::{Counts, Scheduler},
    task::{Behavior, Task, TaskId},
};

/// The number of bytes in a packet's data buffer, minus one.
///
/// Each packet carries `BUFSIZE + 1` character codes.
pub const BUFSIZE: usize = 3;
