//! Tasks: the units of scheduling.
//!
//! A [`Task`] bundles an identity, a priority, a queue of pending packets, a
//! composite run [`State`], the [`Behavior`] it runs when dispatched, and two
//! persistent [`Register`]s.
use crate::{packet::PacketRef, register::Register};
use core::fmt;

mod state;


pub use self::state::State;
pub(crate) use self::state::Action;

/// Identifies a [`Task`].
///
/// Task IDs are small integers, and are used directly as indices into the
/// scheduler's task table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TaskId(u8);

/// A task's priority. Higher values take precedence.
pub type Priority = u32;

/// The step function a task runs when it is dispatched.
///
/// The set of behaviors is closed: the pipeline always consists of one idle
/// task, one work task, two handlers and two devices.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Behavior {
    /// Counts down, releasing the device tasks in a pseudo-random order, and
    /// holds itself when the count reaches zero.
    Idle,
    /// Fills work packets with characters and sends them to alternating
    /// handlers.
    Work,
    /// Drains the characters from work packets into device packets.
    Handler,
    /// Holds one device packet at a time until released.
    Device,
}

/// A scheduling unit.
#[derive(Clone, Debug)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) pri: Priority,
    /// Packets pending delivery to this task.
    pub(crate) wkq: Option<PacketRef>,
    pub(crate) state: State,
    pub(crate) behavior: Behavior,
    pub(crate) v1: Register,
    pub(crate) v2: Register,
    /// The task constructed before this one.
    pub(crate) link: Option<TaskId>,
}

// === impl TaskId ===

impl TaskId {
    /// The ID carried by a packet that has not yet been addressed to a task.
    pub const UNSET: Self = Self(0);
    pub const IDLE: Self = Self(1);
    pub const WORK: Self = Self(2);
    pub const HANDLER_A: Self = Self(3);
    pub const HANDLER_B: Self = Self(4);
    pub const DEVICE_A: Self = Self(5);
    pub const DEVICE_B: Self = Self(6);

    #[inline]
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskId(")?;
        fmt::Debug::fmt(&self.0, f)?;
        f.write_str(")")
    }
}

impl fmt::Display for TaskId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<TaskId> for i64 {
    #[inline]
    fn from(id: TaskId) -> Self {
        id.0 as i64
    }
}

// === impl Task ===

impl Task {
    /// Returns a new task that is not yet linked into a task list.
    #[must_use]
    pub fn new(
        id: TaskId,
        pri: Priority,
        wkq: Option<PacketRef>,
        state: State,
        behavior: Behavior,
        v1: Register,
        v2: Register,
    ) -> Self {
        Self {
            id,
            pri,
            wkq,
            state,
            behavior,
            v1,
            v2,
            link: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.pri
    }

    /// Returns the head of this task's queue of pending packets.
    #[inline]
    #[must_use]
    pub fn queue(&self) -> Option<PacketRef> {
        self.wkq
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    #[inline]
    #[must_use]
    pub fn registers(&self) -> (Register, Register) {
        (self.v1, self.v2)
    }

    /// Returns the next task in the task list.
    #[inline]
    #[must_use]
    pub fn link(&self) -> Option<TaskId> {
        self.link
    }
}
