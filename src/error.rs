use crate::{packet::PacketRef, task::TaskId};

/// Errors returned by the dispatcher.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A release or enqueue named a task that is not in the task table.
    #[error("bad task id {id}")]
    UnknownTask {
        /// The unresolvable task ID.
        id: TaskId,
    },

    /// A task was spawned with an ID that is already in the task table.
    #[error("task {id} already exists")]
    DuplicateTask {
        /// The ID of the existing task.
        id: TaskId,
    },

    /// A run was configured with a count of zero.
    ///
    /// The idle task decrements its countdown *before* checking it, so a
    /// countdown that starts at zero never reaches zero again.
    #[error("the idle countdown must be at least 1")]
    ZeroCount,

    /// A packet queue links back into itself.
    #[error("packet queue owned by task {task} contains a cycle")]
    QueueCycle {
        /// The task whose queue (or register) contains the cycle.
        task: TaskId,
    },

    /// A packet is reachable from more than one queue.
    #[error("{packet:?} is reachable from more than one queue (second owner: task {task})")]
    PacketAliased {
        /// The packet that was seen twice.
        packet: PacketRef,
        /// The task whose queue reached the packet the second time.
        task: TaskId,
    },
}
