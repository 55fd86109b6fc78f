mycelium_bitfield::bitfield! {
    /// A snapshot of a task's composite run state.
    ///
    /// A task with no bits set is *running*: it is eligible to be dispatched.
    #[derive(PartialEq, Eq)]
    pub struct State<u8> {
        /// If set, this task has packets queued for delivery.
        pub const PACKET_PENDING: bool;

        /// If set, this task has nothing to do until a packet arrives.
        pub const WAITING: bool;

        /// If set, this task must not be dispatched until it is released by
        /// another task.
        pub const HOLDING: bool;
    }
}

/// What the dispatch loop should do with a task in a given [`State`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// The task was waiting for a packet, and one has arrived. Dequeue it and
    /// run the task with it.
    Deliver,

    /// Run the task without a packet.
    Run,

    /// The task is blocked. Move on to the next task in the task list.
    Skip,

    /// There is no transition for this state. Stop dispatching.
    Halt,
}

impl State {
    pub const RUNNING: Self = Self::from_bits(0b000);
    pub const RUNNING_PACKET: Self = Self::from_bits(0b001);
    pub const WAITING_ONLY: Self = Self::from_bits(0b010);
    pub const WAITING_PACKET: Self = Self::from_bits(0b011);

    const KNOWN: u8 = Self::PACKET_PENDING.raw_mask()
        | Self::WAITING.raw_mask()
        | Self::HOLDING.raw_mask();

    /// Classifies this state for the dispatch loop.
    pub(crate) fn action(self) -> Action {
        if self.0 & !Self::KNOWN != 0 {
            return Action::Halt;
        }

        match (
            self.get(Self::HOLDING),
            self.get(Self::WAITING),
            self.get(Self::PACKET_PENDING),
        ) {
            (false, true, true) => Action::Deliver,
            (false, false, _) => Action::Run,
            (false, true, false) | (true, _, _) => Action::Skip,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_holding(self) -> bool {
        self.get(Self::HOLDING)
    }

    #[inline]
    #[must_use]
    pub fn is_waiting(self) -> bool {
        self.get(Self::WAITING)
    }

    #[inline]
    #[must_use]
    pub fn has_packets(self) -> bool {
        self.get(Self::PACKET_PENDING)
    }

    /// Returns the names of the set flags, as in `"HOLD|WAIT|PKT"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self.0 {
            0b000 => "RUN",
            0b001 => "RUN|PKT",
            0b010 => "WAIT",
            0b011 => "WAIT|PKT",
            0b100 => "HOLD",
            0b101 => "HOLD|PKT",
            0b110 => "HOLD|WAIT",
            0b111 => "HOLD|WAIT|PKT",
            _ => "INVALID",
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::RUNNING
    }
}
