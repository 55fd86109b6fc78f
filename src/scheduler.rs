//! The dispatch loop, and the primitive operations tasks use to hand off
//! control.
//!
//! The [`Scheduler`] holds a single "current" task. Each iteration of the
//! dispatch loop inspects that task's [`State`]: a runnable task has its
//! behavior invoked, and the behavior returns the task to dispatch next; a
//! blocked task is skipped in favor of the next task in the task list. The
//! loop ends when there is no current task.
//!
//! Behaviors never touch a task's registers directly. Before a behavior runs,
//! the dispatching task's registers are staged into the scheduler, and after
//! it returns, the (possibly modified) staged registers are written back.
//!
//! [`State`]: crate::task::State
use crate::{
    error::Error,
    packet::{Packet, PacketRef, Pool},
    register::Register,
    task::{Action, Priority, State, Task, TaskId},
    trace::Trace,
};


/// The two counters accumulated over a run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Counts {
    /// The number of packets successfully enqueued to a task.
    pub qpkt: u64,
    /// The number of times a task held itself.
    pub hold: u64,
}

/// Drives a set of tasks to completion.
#[derive(Debug)]
pub struct Scheduler {
    /// Indexed by task ID. Slot 0 is never populated.
    tasks: Vec<Option<Task>>,
    packets: Pool,

    /// The most recently spawned task; the head of the task list.
    list: Option<TaskId>,
    current: Option<TaskId>,

    /// The task whose behavior is currently running.
    active: TaskId,

    /// Staged copies of the active task's registers.
    pub(crate) v1: Register,
    pub(crate) v2: Register,

    counts: Counts,
    trace: Option<Trace>,
}

// === impl Counts ===

impl Counts {
    /// The counts produced by the reference workload, a run whose idle task
    /// counts down from [`Config::REFERENCE_COUNT`].
    ///
    /// [`Config::REFERENCE_COUNT`]: crate::Config::REFERENCE_COUNT
    pub const REFERENCE: Self = Self {
        qpkt: 23246,
        hold: 9297,
    };

    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        *self == Self::REFERENCE
    }
}

// === impl Scheduler ===

impl Scheduler {
    /// The largest task ID the task table can hold, unless overridden with
    /// [`Scheduler::with_capacity`].
    pub const DEFAULT_CAPACITY: u8 = 10;

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Returns a new scheduler whose task table accepts IDs in
    /// `1..=capacity`.
    #[must_use]
    pub fn with_capacity(capacity: u8) -> Self {
        Self {
            tasks: vec![None; capacity as usize + 1],
            packets: Pool::new(),
            list: None,
            current: None,
            active: TaskId::UNSET,
            v1: Register::EMPTY,
            v2: Register::EMPTY,
            counts: Counts::default(),
            trace: None,
        }
    }

    /// Enables the activation trace. See [`Trace`] for details.
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Trace::new);
    }

    /// Takes the activation trace recorded so far, if tracing is enabled.
    pub fn take_trace(&mut self) -> Option<Trace> {
        self.trace.take()
    }

    /// Returns the packet pool, for creating the initial packet queues.
    pub fn packets_mut(&mut self) -> &mut Pool {
        &mut self.packets
    }

    #[must_use]
    pub fn packets(&self) -> &Pool {
        &self.packets
    }

    /// Adds `task` to the task table, and pushes it onto the front of the
    /// task list.
    ///
    /// Tasks are linked in reverse order of construction: the task list
    /// starts at the last task spawned.
    pub fn spawn(&mut self, mut task: Task) -> Result<TaskId, Error> {
        let id = task.id;
        let slot = self
            .tasks
            .get_mut(id.index())
            .filter(|_| id != TaskId::UNSET)
            .ok_or(Error::UnknownTask { id })?;
        if slot.is_some() {
            return Err(Error::DuplicateTask { id });
        }

        tracing::debug!(
            task.id = %id,
            task.pri = task.pri,
            task.state = task.state.as_str(),
            task.behavior = ?task.behavior,
            "spawn",
        );
        task.link = self.list.replace(id);
        *slot = Some(task);
        Ok(id)
    }

    /// Runs the dispatch loop until no task can make progress, starting from
    /// the head of the task list.
    pub fn run(&mut self) -> Counts {
        self.start();
        while self.step() {}
        tracing::debug!(qpkt = self.counts.qpkt, hold = self.counts.hold, "halted");
        self.counts
    }

    /// Resets the counters and makes the head of the task list the current
    /// task.
    pub fn start(&mut self) {
        self.counts = Counts::default();
        self.current = self.list;
    }

    /// Performs a single iteration of the dispatch loop.
    ///
    /// Returns `false` without doing anything if the scheduler has halted.
    pub fn step(&mut self) -> bool {
        let Some(id) = self.current else {
            return false;
        };

        let task = tcb(&mut self.tasks, id);
        let state = task.state;
        match state.action() {
            Action::Deliver => {
                let pkt = self.packets.pop(&mut task.wkq);
                task.state = if task.wkq.is_none() {
                    State::RUNNING
                } else {
                    State::RUNNING_PACKET
                };
                self.dispatch(id, pkt);
            }
            Action::Run => self.dispatch(id, None),
            Action::Skip => {
                tracing::trace!(task.id = %id, task.state = state.as_str(), "skip");
                self.current = task.link;
            }
            Action::Halt => {
                tracing::warn!(task.id = %id, task.state = ?state, "no transition for task state");
                self.current = None;
            }
        }

        true
    }

    fn dispatch(&mut self, id: TaskId, pkt: Option<PacketRef>) {
        let task = tcb(&mut self.tasks, id);
        tracing::trace!(
            task.id = %id,
            task.pri = task.pri,
            task.state = task.state.as_str(),
            ?pkt,
            "dispatch",
        );
        let behavior = task.behavior;
        self.active = id;
        self.v1 = task.v1;
        self.v2 = task.v2;
        if let Some(trace) = self.trace.as_mut() {
            trace.record(b'0' + id.as_u8());
        }

        let next = behavior.step(self, pkt);

        let task = tcb(&mut self.tasks, id);
        task.v1 = self.v1;
        task.v2 = self.v2;
        self.current = next;
    }

    #[must_use]
    pub fn counts(&self) -> Counts {
        self.counts
    }

    /// Returns the task that will be dispatched next, or `None` if the
    /// scheduler has halted.
    #[must_use]
    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.index())?.as_ref()
    }

    /// Returns an iterator over the task list, starting at its head.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        let mut next = self.list;
        core::iter::from_fn(move || {
            let task = self.task(next?)?;
            next = task.link;
            Some(task)
        })
    }

    /// Checks that every packet queue is acyclic, and that no packet is
    /// reachable from more than one queue.
    ///
    /// This considers both the tasks' pending queues and any queues held in
    /// their registers. Registers are only audited between dispatches, while
    /// they are not staged.
    pub fn audit_queues(&self) -> Result<(), Error> {
        // For each packet, the walk that first reached it.
        let mut owners: Vec<Option<(usize, TaskId)>> = vec![None; self.packets.len()];
        let mut walk = 0;
        for task in self.tasks.iter().flatten() {
            let heads = [
                task.wkq,
                register_queue(task.v1),
                register_queue(task.v2),
            ];
            for head in heads {
                walk += 1;
                let mut next = head;
                while let Some(pkt) = next {
                    let owner = owners
                        .get_mut(pkt.index())
                        .ok_or(Error::PacketAliased { packet: pkt, task: task.id })?;
                    match *owner {
                        Some((w, _)) if w == walk => return Err(Error::QueueCycle { task: task.id }),
                        Some(_) => return Err(Error::PacketAliased { packet: pkt, task: task.id }),
                        None => *owner = Some((walk, task.id)),
                    }
                    next = self.packets[pkt].link;
                }
            }
        }

        Ok(())
    }

    // === primitives ===

    /// Marks the active task as waiting for a packet, and keeps running it.
    pub(crate) fn wait(&mut self) -> Option<TaskId> {
        let id = self.active;
        tcb(&mut self.tasks, id)
            .state
            .set(State::WAITING, true);
        Some(id)
    }

    /// Marks the active task as holding, and yields to the next task in the
    /// task list.
    pub(crate) fn hold_self(&mut self) -> Option<TaskId> {
        self.counts.hold += 1;
        let task = tcb(&mut self.tasks, self.active);
        task.state.set(State::HOLDING, true);
        tracing::debug!(task.id = %task.id, hold = self.counts.hold, "hold");
        task.link
    }

    /// Resolves a task ID against the task table.
    pub fn find(&self, id: TaskId) -> Result<TaskId, Error> {
        if id == TaskId::UNSET {
            return Err(Error::UnknownTask { id });
        }
        self.task(id).map(Task::id).ok_or(Error::UnknownTask { id })
    }

    /// Clears the holding flag on the task `id`.
    ///
    /// If the released task has a higher priority than the active task, it is
    /// dispatched next; otherwise, the active task keeps running.
    pub(crate) fn release(&mut self, id: TaskId) -> Option<TaskId> {
        let id = match self.find(id) {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(%error, "cannot release task");
                return Some(self.active);
            }
        };

        let task = tcb(&mut self.tasks, id);
        task.state.set(State::HOLDING, false);
        let pri = task.pri;
        tracing::debug!(task.id = %id, by = %self.active, "release");
        self.preempt(id, pri)
    }

    /// Delivers `pkt` to the task named by its `id` field.
    ///
    /// The packet is stamped with the ID of the active task, so that the
    /// receiver can tell who sent it. If the receiving task had no pending
    /// packets and has a higher priority than the active task, it is
    /// dispatched next.
    pub(crate) fn qpkt(&mut self, pkt: PacketRef) -> Option<TaskId> {
        let dest = match self.find(self.packets[pkt].id) {
            Ok(dest) => dest,
            Err(error) => {
                tracing::warn!(%error, ?pkt, "cannot enqueue packet");
                return Some(self.active);
            }
        };

        self.counts.qpkt += 1;
        let packet = &mut self.packets[pkt];
        packet.link = None;
        packet.id = self.active;
        tracing::debug!(?pkt, from = %self.active, to = %dest, qpkt = self.counts.qpkt, "enqueue");

        let task = tcb(&mut self.tasks, dest);
        match task.wkq {
            None => {
                task.wkq = Some(pkt);
                task.state.set(State::PACKET_PENDING, true);
                let pri = task.pri;
                self.preempt(dest, pri)
            }
            Some(head) => {
                self.packets.append(pkt, head);
                Some(self.active)
            }
        }
    }

    fn preempt(&self, id: TaskId, pri: Priority) -> Option<TaskId> {
        let active = self.active;
        let active_pri = self.task(active).map_or(0, Task::priority);
        if test_dbg!(pri > active_pri) {
            Some(id)
        } else {
            Some(active)
        }
    }

    /// Records a character delivered to a device, if tracing is enabled.
    pub(crate) fn trace_delivery(&mut self, ch: u8) {
        if let Some(trace) = self.trace.as_mut() {
            trace.record(ch);
        }
    }

    #[inline]
    pub(crate) fn packet(&self, pkt: PacketRef) -> &Packet {
        &self.packets[pkt]
    }

    #[inline]
    pub(crate) fn packet_mut(&mut self, pkt: PacketRef) -> &mut Packet {
        &mut self.packets[pkt]
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Looks up a task that is known to be in the table: the current task, the
/// active task, or one just returned by [`Scheduler::find`].
#[inline]
#[track_caller]
fn tcb(tasks: &mut [Option<Task>], id: TaskId) -> &mut Task {
    tasks
        .get_mut(id.index())
        .and_then(Option::as_mut)
        .unwrap_or_else(|| panic!("task {id} is not in the task table"))
}

fn register_queue(reg: Register) -> Option<PacketRef> {
    match reg {
        Register::Packet(head) => Some(head),
        Register::Value(_) => None,
    }
}
