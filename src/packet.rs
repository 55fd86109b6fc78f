//! Packets, and the arena that owns them.
//!
//! Packets form intrusive singly-linked queues: each [`Packet`] carries a
//! `link` to the next packet in whichever queue currently owns it. Rather
//! than linking packets by pointer, every packet lives in a [`Pool`] for the
//! lifetime of a run, and links are [`PacketRef`] handles into that pool.
//! A packet is only ever relinked from one queue into another, so a handle is
//! reachable from exactly one queue (or register) at a time.
use crate::{task::TaskId, BUFSIZE};
use core::{fmt, ops};

/// A handle referencing a [`Packet`] stored in a [`Pool`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PacketRef(u16);

/// Determines how a handler task routes a [`Packet`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum Kind {
    /// A packet carrying one character to a device task.
    Device = 1000,
    /// A packet carrying a buffer of characters produced by the work task.
    Work = 1001,
}

/// A message routed between tasks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    /// The next packet in the queue that currently owns this packet.
    pub(crate) link: Option<PacketRef>,

    /// While queued for delivery, the destination task. Once delivered, the
    /// task that sent it.
    pub(crate) id: TaskId,

    pub(crate) kind: Kind,

    /// In a work packet, the index of the next byte a handler will deliver.
    /// In a device packet, the delivered byte itself.
    pub(crate) cursor: usize,

    pub(crate) buf: [u8; BUFSIZE + 1],
}

/// Owns every [`Packet`] created for a run.
///
/// Packets are allocated during setup and are never freed; the whole pool is
/// dropped at the end of the run.
#[derive(Clone, Debug, Default)]
pub struct Pool {
    packets: Vec<Packet>,
}

/// An iterator over the packets in a queue.
///
/// This is returned by [`Pool::queue`].
#[derive(Debug)]
pub struct Queue<'pool> {
    pool: &'pool Pool,
    next: Option<PacketRef>,
    remaining: usize,
}

// === impl PacketRef ===

impl PacketRef {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PacketRef {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PacketRef(")?;
        fmt::Debug::fmt(&self.0, f)?;
        f.write_str(")")
    }
}

impl fmt::Display for PacketRef {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// === impl Packet ===

impl Packet {
    #[must_use]
    pub fn new(link: Option<PacketRef>, id: TaskId, kind: Kind) -> Self {
        Self {
            link,
            id,
            kind,
            cursor: 0,
            buf: [0; BUFSIZE + 1],
        }
    }

    #[inline]
    #[must_use]
    pub fn link(&self) -> Option<PacketRef> {
        self.link
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub fn buf(&self) -> &[u8; BUFSIZE + 1] {
        &self.buf
    }
}

// === impl Pool ===

impl Pool {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            packets: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Allocates a new packet whose `link` is `link`, returning a handle to
    /// it.
    ///
    /// Building a queue back to front is a matter of passing each returned
    /// handle as the `link` of the next allocation.
    ///
    /// # Panics
    ///
    /// If more than `u16::MAX` packets are allocated.
    #[track_caller]
    pub fn alloc(&mut self, link: Option<PacketRef>, id: TaskId, kind: Kind) -> PacketRef {
        let idx = u16::try_from(self.packets.len()).expect("packet pool exhausted");
        self.packets.push(Packet::new(link, id, kind));
        PacketRef(idx)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, pkt: PacketRef) -> Option<&Packet> {
        self.packets.get(pkt.index())
    }

    /// Links `pkt` onto the tail of the queue starting at `head`.
    ///
    /// This walks the whole queue, which is fine: queues never hold more than
    /// a handful of packets.
    pub fn append(&mut self, pkt: PacketRef, head: PacketRef) {
        debug_assert!(
            self.queue(Some(head)).all(|queued| queued != pkt),
            "{pkt:?} is already linked into the queue at {head:?}; appending it again would form a cycle",
        );

        self[pkt].link = None;
        let mut tail = head;
        while let Some(next) = self[tail].link {
            tail = next;
        }
        self[tail].link = Some(pkt);
    }

    /// Appends `pkt` to the queue whose head is `head`, or makes it the head
    /// if the queue is empty.
    pub fn push(&mut self, pkt: PacketRef, head: &mut Option<PacketRef>) {
        match *head {
            Some(queue) => self.append(pkt, queue),
            None => {
                self[pkt].link = None;
                *head = Some(pkt);
            }
        }
    }

    /// Unlinks the first packet from the queue whose head is `head`.
    ///
    /// The returned packet is detached: its `link` is cleared so that it is no
    /// longer reachable through the remainder of the queue.
    pub fn pop(&mut self, head: &mut Option<PacketRef>) -> Option<PacketRef> {
        let pkt = (*head)?;
        *head = self[pkt].link.take();
        Some(pkt)
    }

    /// Returns an iterator over the queue starting at `head`.
    ///
    /// The iterator yields at most [`Pool::len`] packets, so it terminates
    /// even if a queue has been corrupted into a cycle.
    #[must_use]
    pub fn queue(&self, head: Option<PacketRef>) -> Queue<'_> {
        Queue {
            pool: self,
            next: head,
            remaining: self.len(),
        }
    }
}

impl ops::Index<PacketRef> for Pool {
    type Output = Packet;

    #[inline]
    #[track_caller]
    fn index(&self, pkt: PacketRef) -> &Self::Output {
        &self.packets[pkt.index()]
    }
}

impl ops::IndexMut<PacketRef> for Pool {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, pkt: PacketRef) -> &mut Self::Output {
        &mut self.packets[pkt.index()]
    }
}

// === impl Queue ===

impl Iterator for Queue<'_> {
    type Item = PacketRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pkt = self.next?;
        self.remaining -= 1;
        self.next = self.pool.get(pkt)?.link;
        Some(pkt)
    }
}
