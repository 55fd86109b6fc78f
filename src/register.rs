use crate::packet::PacketRef;
use core::fmt;

/// A task's persistent local state.
///
/// Each task owns two registers, `v1` and `v2`. Depending on the task's
/// behavior, a register holds either a scalar (a counter, a task ID, or a bit
/// pattern) or the head of a queue of packets. The empty queue is represented
/// by the scalar `0`, so [`Register::EMPTY`] is both "zero" and "no packets".
///
/// Reading a register as the wrong variant is a bug in the reader, and the
/// accessors panic rather than reinterpret the contents.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Register {
    /// A scalar value.
    Value(i64),
    /// The head of a queue of packets.
    Packet(PacketRef),
}

impl Register {
    /// The empty register: the scalar zero, which doubles as the empty queue.
    pub const EMPTY: Self = Self::Value(0);

    #[inline]
    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    #[inline]
    #[must_use]
    pub fn is_packet(&self) -> bool {
        matches!(self, Self::Packet(_))
    }

    /// Returns the scalar held in this register.
    ///
    /// # Panics
    ///
    /// If the register holds a packet.
    #[inline]
    #[track_caller]
    #[must_use]
    pub fn value(&self) -> i64 {
        match *self {
            Self::Value(value) => value,
            Self::Packet(pkt) => panic!("expected a value register, but it holds {pkt:?}"),
        }
    }

    /// Returns the head of the packet queue held in this register, or `None`
    /// if the register is [empty](Self::EMPTY).
    ///
    /// # Panics
    ///
    /// If the register holds a non-zero scalar.
    #[inline]
    #[track_caller]
    #[must_use]
    pub fn packet(&self) -> Option<PacketRef> {
        match *self {
            Self::Packet(pkt) => Some(pkt),
            Self::Value(0) => None,
            Self::Value(value) => {
                panic!("expected a packet register, but it holds the value {value}")
            }
        }
    }
}

impl Default for Register {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<i64> for Register {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Value(value)
    }
}

impl From<Option<PacketRef>> for Register {
    #[inline]
    fn from(pkt: Option<PacketRef>) -> Self {
        match pkt {
            Some(pkt) => Self::Packet(pkt),
            None => Self::EMPTY,
        }
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "Value({value:#x})"),
            Self::Packet(pkt) => write!(f, "Packet({pkt})"),
        }
    }
}
