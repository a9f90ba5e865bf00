//! Per-rack virtual output queues
//!
//! Each rack keeps two sets of per-destination FIFOs. The *local* side holds
//! packets injected at this rack waiting for their first hop; the *nonlocal*
//! side holds transit packets that already paid one hop and must now reach
//! their final destination. Splitting the two is what lets the transmitter
//! drain transit traffic first.

use crate::{PacketId, RackId};
use std::collections::VecDeque;

/// Which side of a rack's queues a packet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoqKind {
    /// Injected here, first hop pending
    Local,
    /// Arrived here in transit, second hop pending
    Nonlocal,
}

/// Bounded per-destination FIFOs for one rack
#[derive(Debug)]
pub struct VirtualOutputQueues {
    rack: RackId,
    capacity: usize,
    local: Vec<VecDeque<PacketId>>,
    nonlocal: Vec<VecDeque<PacketId>>,
    total: usize,
}

impl VirtualOutputQueues {
    /// Empty queues for `rack`, one FIFO pair per possible destination
    pub fn new(rack: RackId, num_racks: usize, capacity: usize) -> VirtualOutputQueues {
        VirtualOutputQueues {
            rack,
            capacity,
            local: (0..num_racks).map(|_| VecDeque::new()).collect(),
            nonlocal: (0..num_racks).map(|_| VecDeque::new()).collect(),
            total: 0,
        }
    }

    /// The rack these queues belong to
    pub fn rack(&self) -> RackId {
        self.rack
    }

    fn queues(&mut self, kind: VoqKind) -> &mut Vec<VecDeque<PacketId>> {
        match kind {
            VoqKind::Local => &mut self.local,
            VoqKind::Nonlocal => &mut self.nonlocal,
        }
    }

    /// Appends `pkt` to the `kind` FIFO toward `dst`
    ///
    /// Returns false, leaving the queues untouched, if the FIFO is at
    /// capacity or `dst` is this very rack.
    pub fn enqueue(&mut self, pkt: PacketId, dst: RackId, kind: VoqKind) -> bool {
        if dst == self.rack || dst >= self.local.len() {
            debug_assert!(dst != self.rack, "rack {} queued a packet to itself", self.rack);
            debug_assert!(dst < self.local.len(), "destination {} out of range", dst);
            return false;
        }

        let capacity = self.capacity;
        let queue = &mut self.queues(kind)[dst];
        if queue.len() >= capacity {
            return false;
        }

        queue.push_back(pkt);
        self.total += 1;
        true
    }

    /// Removes and returns the head of the `kind` FIFO toward `dst`
    pub fn dequeue(&mut self, dst: RackId, kind: VoqKind) -> Option<PacketId> {
        if dst >= self.local.len() {
            return None;
        }
        let popped = self.queues(kind)[dst].pop_front();
        if popped.is_some() {
            self.total -= 1;
        }
        popped
    }

    /// Occupancy of the local FIFO toward `dst`
    pub fn local_size(&self, dst: RackId) -> usize {
        self.local.get(dst).map_or(0, |q| q.len())
    }

    /// Occupancy of the nonlocal FIFO toward `dst`
    pub fn nonlocal_size(&self, dst: RackId) -> usize {
        self.nonlocal.get(dst).map_or(0, |q| q.len())
    }

    /// Destinations with local packets waiting, ascending rack id
    pub fn nonempty_local_dests(&self) -> Vec<RackId> {
        nonempty(&self.local)
    }

    /// Destinations with nonlocal packets waiting, ascending rack id
    pub fn nonempty_nonlocal_dests(&self) -> Vec<RackId> {
        nonempty(&self.nonlocal)
    }

    /// Total packets sitting in all FIFOs of this rack
    pub fn total_packets(&self) -> usize {
        self.total
    }
}

fn nonempty(queues: &[VecDeque<PacketId>]) -> Vec<RackId> {
    queues
        .iter()
        .enumerate()
        .filter(|(_, q)| !q.is_empty())
        .map(|(dst, _)| dst)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_per_destination() {
        let mut voqs = VirtualOutputQueues::new(0, 4, 10);
        assert!(voqs.enqueue(10, 1, VoqKind::Local));
        assert!(voqs.enqueue(11, 1, VoqKind::Local));
        assert!(voqs.enqueue(12, 2, VoqKind::Local));

        assert_eq!(voqs.dequeue(1, VoqKind::Local), Some(10));
        assert_eq!(voqs.dequeue(1, VoqKind::Local), Some(11));
        assert_eq!(voqs.dequeue(1, VoqKind::Local), None);
        assert_eq!(voqs.dequeue(2, VoqKind::Local), Some(12));
        assert_eq!(voqs.total_packets(), 0);
    }

    #[test]
    fn local_and_nonlocal_are_separate() {
        let mut voqs = VirtualOutputQueues::new(0, 4, 10);
        assert!(voqs.enqueue(1, 3, VoqKind::Local));
        assert!(voqs.enqueue(2, 3, VoqKind::Nonlocal));

        assert_eq!(voqs.local_size(3), 1);
        assert_eq!(voqs.nonlocal_size(3), 1);
        assert_eq!(voqs.dequeue(3, VoqKind::Nonlocal), Some(2));
        assert_eq!(voqs.local_size(3), 1);
    }

    #[test]
    fn capacity_is_per_queue() {
        let mut voqs = VirtualOutputQueues::new(0, 4, 2);
        assert!(voqs.enqueue(1, 1, VoqKind::Local));
        assert!(voqs.enqueue(2, 1, VoqKind::Local));
        assert!(!voqs.enqueue(3, 1, VoqKind::Local));
        // a different destination still has room
        assert!(voqs.enqueue(4, 2, VoqKind::Local));
        // so does the nonlocal side of the full destination
        assert!(voqs.enqueue(5, 1, VoqKind::Nonlocal));
        assert_eq!(voqs.total_packets(), 4);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn own_rack_is_refused() {
        let mut voqs = VirtualOutputQueues::new(2, 4, 10);
        assert!(!voqs.enqueue(1, 2, VoqKind::Local));
    }

    #[test]
    fn nonempty_destinations_are_ascending() {
        let mut voqs = VirtualOutputQueues::new(0, 6, 10);
        for &dst in &[5, 1, 3] {
            assert!(voqs.enqueue(dst as PacketId, dst, VoqKind::Local));
        }
        assert_eq!(voqs.nonempty_local_dests(), vec![1, 3, 5]);
        assert!(voqs.nonempty_nonlocal_dests().is_empty());
    }
}
