//! The standard six-task pipeline, and the harness that runs it.
//!
//! [`pipeline`] builds a [`Scheduler`] containing the idle task, the work task,
//! two handlers and two devices, with their initial packet queues. [`run`]
//! drives one such scheduler to completion, and [`run_many`] repeats that from
//! scratch any number of times.
use crate::{
    error::Error,
    packet::Kind,
    register::Register,
    scheduler::{Counts, Scheduler},
    task::{Behavior, State, Task, TaskId},
    trace::Trace,
};

/// Configures a run of the pipeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The number of times the idle task runs before holding itself for
    /// good.
    pub count: u32,

    /// Whether to record an activation [`Trace`].
    pub trace: bool,
}

/// The outcome of a single run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report {
    pub count: u32,
    pub counts: Counts,
    pub trace: Option<Trace>,
}

/// Whether a run's counters match a known reference.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Correct,
    Incorrect,
    /// There are no reference counters for this run's count.
    Unchecked,
}

// === impl Config ===

impl Config {
    /// The count whose results are known: see [`Counts::REFERENCE`].
    pub const REFERENCE_COUNT: u32 = 10_000;

    #[must_use]
    pub const fn with_count(count: u32) -> Self {
        Self {
            count,
            trace: false,
        }
    }

    #[must_use]
    pub const fn traced(self) -> Self {
        Self {
            trace: true,
            ..self
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_count(Self::REFERENCE_COUNT)
    }
}

// === impl Report ===

impl Report {
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.count != Config::REFERENCE_COUNT {
            return Verdict::Unchecked;
        }
        if self.counts.is_reference() {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        }
    }

    /// Returns `true` if this run used the reference count and produced the
    /// reference counters.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.verdict() == Verdict::Correct
    }
}

/// Builds the standard pipeline, ready to [`run`](Scheduler::run).
///
/// The idle task's countdown starts at `config.count`.
pub fn pipeline(config: &Config) -> Result<Scheduler, Error> {
    if config.count == 0 {
        return Err(Error::ZeroCount);
    }

    let mut sched = Scheduler::new();
    if config.trace {
        sched.enable_trace();
    }

    sched.spawn(Task::new(
        TaskId::IDLE,
        0,
        None,
        State::RUNNING,
        Behavior::Idle,
        Register::Value(1),
        Register::Value(i64::from(config.count)),
    ))?;

    let pool = sched.packets_mut();
    let wkq = pool.alloc(None, TaskId::UNSET, Kind::Work);
    let wkq = pool.alloc(Some(wkq), TaskId::UNSET, Kind::Work);
    sched.spawn(Task::new(
        TaskId::WORK,
        1000,
        Some(wkq),
        State::WAITING_PACKET,
        Behavior::Work,
        Register::from(i64::from(TaskId::HANDLER_A)),
        Register::EMPTY,
    ))?;

    for (handler, device, pri) in [
        (TaskId::HANDLER_A, TaskId::DEVICE_A, 2000),
        (TaskId::HANDLER_B, TaskId::DEVICE_B, 3000),
    ] {
        let pool = sched.packets_mut();
        let mut wkq = None;
        for _ in 0..3 {
            wkq = Some(pool.alloc(wkq, device, Kind::Device));
        }
        sched.spawn(Task::new(
            handler,
            pri,
            wkq,
            State::WAITING_PACKET,
            Behavior::Handler,
            Register::EMPTY,
            Register::EMPTY,
        ))?;
    }

    for (device, pri) in [(TaskId::DEVICE_A, 4000), (TaskId::DEVICE_B, 5000)] {
        sched.spawn(Task::new(
            device,
            pri,
            None,
            State::WAITING_ONLY,
            Behavior::Device,
            Register::EMPTY,
            Register::EMPTY,
        ))?;
    }

    Ok(sched)
}

/// Builds the standard pipeline and runs it to completion.
pub fn run(config: &Config) -> Result<Report, Error> {
    let _span = tracing::debug_span!("run", count = config.count).entered();
    let mut sched = pipeline(config)?;
    let counts = sched.run();
    tracing::info!(qpkt = counts.qpkt, hold = counts.hold, "finished run");
    Ok(Report {
        count: config.count,
        counts,
        trace: sched.take_trace(),
    })
}

/// Runs the pipeline `iterations` times, each from a fresh setup.
pub fn run_many(config: &Config, iterations: usize) -> Result<Vec<Report>, Error> {
    (0..iterations)
        .map(|iteration| {
            let _span = tracing::debug_span!("iteration", iteration).entered();
            run(config)
        })
        .collect()
}
