//! The step functions run by each kind of task.
//!
//! Every behavior takes the scheduler, with the dispatched task's registers
//! staged in its `v1` and `v2` slots, and the packet being delivered, if any.
//! It returns the task to dispatch next.
use crate::{
    packet::{Kind, PacketRef},
    register::Register,
    scheduler::Scheduler,
    task::{Behavior, TaskId},
    BUFSIZE,
};

/// Mask applied to the idle task's shift register after each shift.
pub const MAXINT: i64 = 0x7FFF;

/// Folded into the idle task's shift register when its low bit is set.
pub const IDLE_XOR: i64 = 0xD008;

/// The characters the work task writes into packets, indexed by the work
/// task's cursor. Index 0 is never written.
pub const ALPHABET: &[u8; 27] = b"0ABCDEFGHIJKLMNOPQRSTUVWXYZ";

impl Behavior {
    pub(crate) fn step(self, sched: &mut Scheduler, pkt: Option<PacketRef>) -> Option<TaskId> {
        match self {
            Behavior::Idle => idle(sched),
            Behavior::Work => work(sched, pkt),
            Behavior::Handler => handler(sched, pkt),
            Behavior::Device => device(sched, pkt),
        }
    }
}

/// `v1` is a 15-bit shift register choosing which device to release; `v2`
/// counts down the remaining releases.
fn idle(sched: &mut Scheduler) -> Option<TaskId> {
    let countdown = sched.v2.value() - 1;
    sched.v2 = Register::from(countdown);
    if countdown == 0 {
        return sched.hold_self();
    }

    let seed = sched.v1.value();
    let shifted = (seed >> 1) & MAXINT;
    if seed & 1 == 0 {
        sched.v1 = Register::from(shifted);
        sched.release(TaskId::DEVICE_A)
    } else {
        sched.v1 = Register::from(shifted ^ IDLE_XOR);
        sched.release(TaskId::DEVICE_B)
    }
}

/// `v1` is the handler the last packet went to; `v2` is the position in
/// [`ALPHABET`] of the last character written.
fn work(sched: &mut Scheduler, pkt: Option<PacketRef>) -> Option<TaskId> {
    let Some(pkt) = pkt else {
        return sched.wait();
    };

    let handler = i64::from(TaskId::HANDLER_A) + i64::from(TaskId::HANDLER_B) - sched.v1.value();
    sched.v1 = Register::from(handler);

    let mut next = sched.v2.value();
    let packet = sched.packet_mut(pkt);
    packet.id = u8::try_from(handler).map_or(TaskId::UNSET, TaskId::new);
    packet.cursor = 0;
    for byte in packet.buf.iter_mut() {
        next += 1;
        if next > 26 {
            next = 1;
        }
        *byte = ALPHABET[next as usize];
    }
    sched.v2 = Register::from(next);

    sched.qpkt(pkt)
}

/// `v1` queues work packets; `v2` queues device packets.
fn handler(sched: &mut Scheduler, pkt: Option<PacketRef>) -> Option<TaskId> {
    if let Some(pkt) = pkt {
        match sched.packet(pkt).kind {
            Kind::Work => {
                let mut queue = sched.v1.packet();
                sched.packets_mut().push(pkt, &mut queue);
                sched.v1 = Register::from(queue);
            }
            Kind::Device => {
                let mut queue = sched.v2.packet();
                sched.packets_mut().push(pkt, &mut queue);
                sched.v2 = Register::from(queue);
            }
        }
    }

    if let Some(work) = sched.v1.packet() {
        let count = sched.packet(work).cursor;

        // The whole buffer has been delivered, so send the work packet back.
        if count > BUFSIZE {
            let mut queue = Some(work);
            sched.packets_mut().pop(&mut queue);
            sched.v1 = Register::from(queue);
            return sched.qpkt(work);
        }

        let mut devices = sched.v2.packet();
        if let Some(dev) = sched.packets_mut().pop(&mut devices) {
            sched.v2 = Register::from(devices);
            let byte = sched.packet(work).buf[count];
            sched.packet_mut(dev).cursor = usize::from(byte);
            sched.packet_mut(work).cursor = count + 1;
            return sched.qpkt(dev);
        }
    }

    sched.wait()
}

/// `v1` holds the packet the device is busy with, if any.
fn device(sched: &mut Scheduler, pkt: Option<PacketRef>) -> Option<TaskId> {
    match pkt {
        None => match sched.v1.packet() {
            None => sched.wait(),
            Some(held) => {
                sched.v1 = Register::EMPTY;
                sched.qpkt(held)
            }
        },
        Some(pkt) => {
            sched.v1 = Register::Packet(pkt);
            let ch = sched.packet(pkt).cursor;
            sched.trace_delivery(u8::try_from(ch).unwrap_or(b'?'));
            sched.hold_self()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{State, Task};

    fn spawn(
        sched: &mut Scheduler,
        id: TaskId,
        pri: u32,
        wkq: Option<PacketRef>,
        state: State,
        behavior: Behavior,
        v1: Register,
    ) {
        let task = Task::new(id, pri, wkq, state, behavior, v1, Register::EMPTY);
        sched.spawn(task).unwrap();
    }

    fn holding_device(sched: &mut Scheduler, id: TaskId, pri: u32) {
        let state = State::new().with(State::HOLDING, true);
        spawn(sched, id, pri, None, state, Behavior::Device, Register::EMPTY);
    }

    #[test]
    fn idle_releases_device_a_on_even_seed() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        holding_device(&mut sched, TaskId::DEVICE_A, 4000);
        holding_device(&mut sched, TaskId::DEVICE_B, 5000);
        let idle = Task::new(
            TaskId::IDLE,
            0,
            None,
            State::RUNNING,
            Behavior::Idle,
            Register::Value(0b100),
            Register::Value(5),
        );
        sched.spawn(idle).unwrap();
        sched.start();

        assert!(sched.step());
        let idle = sched.task(TaskId::IDLE).unwrap();
        assert_eq!(idle.registers(), (Register::Value(0b10), Register::Value(4)));
        assert!(!sched.task(TaskId::DEVICE_A).unwrap().state().is_holding());
        assert!(sched.task(TaskId::DEVICE_B).unwrap().state().is_holding());
        assert_eq!(sched.current(), Some(TaskId::DEVICE_A));
    }

    #[test]
    fn idle_releases_device_b_on_odd_seed() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        holding_device(&mut sched, TaskId::DEVICE_A, 4000);
        holding_device(&mut sched, TaskId::DEVICE_B, 5000);
        let idle = Task::new(
            TaskId::IDLE,
            0,
            None,
            State::RUNNING,
            Behavior::Idle,
            Register::Value(1),
            Register::Value(5),
        );
        sched.spawn(idle).unwrap();
        sched.start();

        assert!(sched.step());
        let idle = sched.task(TaskId::IDLE).unwrap();
        assert_eq!(idle.registers().0, Register::Value(IDLE_XOR));
        assert!(sched.task(TaskId::DEVICE_A).unwrap().state().is_holding());
        assert!(!sched.task(TaskId::DEVICE_B).unwrap().state().is_holding());
        assert_eq!(sched.current(), Some(TaskId::DEVICE_B));
    }

    #[test]
    fn idle_holds_when_countdown_expires() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        let idle = Task::new(
            TaskId::IDLE,
            0,
            None,
            State::RUNNING,
            Behavior::Idle,
            Register::Value(1),
            Register::Value(1),
        );
        sched.spawn(idle).unwrap();

        let counts = sched.run();
        assert_eq!(counts.hold, 1);
        assert_eq!(counts.qpkt, 0);
        assert!(sched.task(TaskId::IDLE).unwrap().state().is_holding());
        assert_eq!(sched.current(), None);
    }

    #[test]
    fn work_fills_packet_and_alternates_handlers() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        let wkq = sched.packets_mut().alloc(None, TaskId::UNSET, Kind::Work);
        spawn(
            &mut sched,
            TaskId::HANDLER_A,
            2000,
            None,
            State::WAITING_ONLY,
            Behavior::Handler,
            Register::EMPTY,
        );
        let work = Task::new(
            TaskId::WORK,
            1000,
            Some(wkq),
            State::WAITING_PACKET,
            Behavior::Work,
            Register::from(i64::from(TaskId::HANDLER_B)),
            Register::Value(23),
        );
        sched.spawn(work).unwrap();
        sched.start();

        assert!(sched.step());

        let packet = sched.packets()[wkq].clone();
        assert_eq!(packet.id(), TaskId::WORK, "delivered packets carry the sender");
        assert_eq!(packet.cursor(), 0);
        assert_eq!(packet.buf(), b"XYZA");

        let work = sched.task(TaskId::WORK).unwrap();
        assert_eq!(
            work.registers(),
            (Register::from(i64::from(TaskId::HANDLER_A)), Register::Value(1))
        );
        assert_eq!(work.state(), State::RUNNING);

        let handler = sched.task(TaskId::HANDLER_A).unwrap();
        assert_eq!(handler.queue(), Some(wkq));
        assert!(handler.state().has_packets());
        assert_eq!(sched.current(), Some(TaskId::HANDLER_A), "handler preempts work");
        assert_eq!(sched.counts().qpkt, 1);
    }

    #[test]
    fn work_without_packet_waits() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        let work = Task::new(
            TaskId::WORK,
            1000,
            None,
            State::RUNNING,
            Behavior::Work,
            Register::from(i64::from(TaskId::HANDLER_A)),
            Register::EMPTY,
        );
        sched.spawn(work).unwrap();
        sched.start();

        assert!(sched.step());
        let work = sched.task(TaskId::WORK).unwrap();
        assert!(work.state().is_waiting());
        assert_eq!(sched.current(), Some(TaskId::WORK));

        // A waiting task with no packets is skipped, and it is the only task.
        assert!(sched.step());
        assert_eq!(sched.current(), None);
        assert!(!sched.step());
    }

    #[test]
    fn handler_moves_one_byte_per_delivery() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        let pool = sched.packets_mut();
        let work_pkt = pool.alloc(None, TaskId::UNSET, Kind::Work);
        pool[work_pkt].buf = *b"ABCD";
        let dev2 = pool.alloc(None, TaskId::DEVICE_A, Kind::Device);
        let dev1 = pool.alloc(Some(dev2), TaskId::DEVICE_A, Kind::Device);

        let handler = Task::new(
            TaskId::HANDLER_A,
            2000,
            Some(dev1),
            State::WAITING_PACKET,
            Behavior::Handler,
            Register::Packet(work_pkt),
            Register::EMPTY,
        );
        sched.spawn(handler).unwrap();
        holding_device(&mut sched, TaskId::DEVICE_A, 4000);
        sched.start();

        // The device is at the head of the list, but it is holding.
        assert!(sched.step());
        assert_eq!(sched.current(), Some(TaskId::HANDLER_A));

        // Absorb `dev1`, then send it to the device carrying 'A'. The device
        // has a higher priority, so it preempts the handler.
        assert!(sched.step());
        assert_eq!(sched.packets()[dev1].cursor(), usize::from(b'A'));
        assert_eq!(sched.packets()[work_pkt].cursor(), 1);
        assert_eq!(sched.task(TaskId::DEVICE_A).unwrap().queue(), Some(dev1));
        assert_eq!(sched.current(), Some(TaskId::DEVICE_A));

        // ...but it's still holding, so it's skipped.
        assert!(sched.step());
        assert_eq!(sched.current(), Some(TaskId::HANDLER_A));

        // `dev2` is pending but the handler is not waiting, so it runs without
        // a packet, finds no device packet to fill, and waits.
        assert!(sched.step());
        assert_eq!(
            sched.task(TaskId::HANDLER_A).unwrap().state(),
            State::WAITING_PACKET
        );

        // Now `dev2` is delivered and filled with 'B'. It is appended to the
        // device's queue, which does not preempt.
        assert!(sched.step());
        assert_eq!(sched.packets()[dev2].cursor(), usize::from(b'B'));
        assert_eq!(sched.packets()[work_pkt].cursor(), 2);
        let queued = sched
            .packets()
            .queue(sched.task(TaskId::DEVICE_A).unwrap().queue())
            .collect::<Vec<_>>();
        assert_eq!(queued, vec![dev1, dev2]);
        assert_eq!(sched.current(), Some(TaskId::HANDLER_A));

        // Out of device packets again.
        assert!(sched.step());
        let handler = sched.task(TaskId::HANDLER_A).unwrap();
        assert_eq!(handler.state(), State::WAITING_ONLY);
        assert_eq!(
            handler.registers(),
            (Register::Packet(work_pkt), Register::EMPTY)
        );
        assert_eq!(sched.counts().qpkt, 2);
        sched.audit_queues().unwrap();
    }

    #[test]
    fn handler_returns_drained_work_packet() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        let pool = sched.packets_mut();
        let work_pkt = pool.alloc(None, TaskId::WORK, Kind::Work);
        pool[work_pkt].cursor = BUFSIZE + 1;

        let work = Task::new(
            TaskId::WORK,
            1000,
            None,
            State::WAITING_ONLY,
            Behavior::Work,
            Register::from(i64::from(TaskId::HANDLER_A)),
            Register::EMPTY,
        );
        sched.spawn(work).unwrap();
        spawn(
            &mut sched,
            TaskId::HANDLER_A,
            2000,
            None,
            State::RUNNING,
            Behavior::Handler,
            Register::Packet(work_pkt),
        );
        sched.start();

        assert!(sched.step());
        let handler = sched.task(TaskId::HANDLER_A).unwrap();
        assert_eq!(handler.registers().0, Register::EMPTY);
        let work = sched.task(TaskId::WORK).unwrap();
        assert_eq!(work.queue(), Some(work_pkt));
        assert_eq!(work.state(), State::WAITING_PACKET);
        // Work has a lower priority than the handler, so no preemption.
        assert_eq!(sched.current(), Some(TaskId::HANDLER_A));
        assert_eq!(sched.packets()[work_pkt].id(), TaskId::HANDLER_A);
    }

    #[test]
    fn device_holds_packet_until_released() {
        crate::util::trace_init();
        let mut sched = Scheduler::new();
        let pkt = sched
            .packets_mut()
            .alloc(None, TaskId::DEVICE_A, Kind::Device);
        sched.packets_mut()[pkt].cursor = usize::from(b'Q');

        spawn(
            &mut sched,
            TaskId::HANDLER_A,
            2000,
            None,
            State::WAITING_ONLY,
            Behavior::Handler,
            Register::EMPTY,
        );
        spawn(
            &mut sched,
            TaskId::DEVICE_A,
            4000,
            Some(pkt),
            State::WAITING_PACKET,
            Behavior::Device,
            Register::EMPTY,
        );
        sched.enable_trace();
        sched.start();

        assert!(sched.step());
        let device = sched.task(TaskId::DEVICE_A).unwrap();
        assert!(device.state().is_holding());
        assert_eq!(device.registers().0, Register::Packet(pkt));
        assert_eq!(sched.counts().hold, 1);
        // Holding yields to the next task in the list.
        assert_eq!(sched.current(), Some(TaskId::HANDLER_A));
        assert_eq!(sched.take_trace().unwrap().activations().collect::<String>(), "5Q");
    }
}
