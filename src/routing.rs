//! Admission and service policies
//!
//! The two knobs anyone studying this fabric ends up turning are (a) when a
//! fresh packet should wait for its direct slot versus detour through an
//! intermediate rack, and (b) which queue a free transmitter serves next.
//! Both live behind [`RoutingPolicy`] so they can be swapped without
//! touching the event loop.

use crate::topology::RotorSchedule;
use crate::voq::{VirtualOutputQueues, VoqKind};
use crate::{RackId, Time};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Decides first-hop targets and transmitter service order
pub trait RoutingPolicy {
    /// First-hop target for a packet injected at `src`
    ///
    /// Returns `final_dst` to ride the direct slot, or some other rack to
    /// detour through it.
    fn first_hop(
        &mut self,
        src: RackId,
        final_dst: RackId,
        now: Time,
        voqs: &VirtualOutputQueues,
        schedule: &RotorSchedule,
    ) -> RackId;

    /// The (destination, queue) pair the rack's transmitter serves next,
    /// or None when nothing queued has an open path right now
    fn next_service(
        &mut self,
        voqs: &VirtualOutputQueues,
        schedule: &RotorSchedule,
        now: Time,
    ) -> Option<(RackId, VoqKind)>;
}

/// Wait-for-direct admission with two-hop spillover under congestion
///
/// A direct slot comes around once per cycle, so if the next one is less
/// than a slot away it is always cheaper to wait for it than to pay two
/// hops. Only when the wait is long *and* the direct queue has backed up
/// past the threshold does a packet detour through a uniformly random
/// intermediate rack.
///
/// The transmitter serves transit traffic before locally injected traffic:
/// transit packets already paid a hop, and letting them pile up at
/// intermediates is how two-hop routing falls over. Within a tier the
/// lowest destination rack id wins.
#[derive(Debug)]
pub struct TwoHopVlb {
    num_racks: usize,
    threshold: usize,
    rack_dist: Uniform<RackId>,
    rng: StdRng,
}

impl TwoHopVlb {
    /// A policy for `num_racks` racks spilling over at queue depth
    /// `threshold`, with its own seeded RNG for intermediate picks
    pub fn new(num_racks: usize, threshold: usize, seed: u64) -> TwoHopVlb {
        TwoHopVlb {
            num_racks,
            threshold,
            rack_dist: Uniform::from(0..num_racks),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick_intermediate(&mut self, src: RackId, dst: RackId) -> RackId {
        loop {
            let rack = self.rack_dist.sample(&mut self.rng);
            if rack != src && rack != dst {
                return rack;
            }
        }
    }
}

impl RoutingPolicy for TwoHopVlb {
    fn first_hop(
        &mut self,
        src: RackId,
        final_dst: RackId,
        now: Time,
        voqs: &VirtualOutputQueues,
        schedule: &RotorSchedule,
    ) -> RackId {
        let wait = schedule.next_direct_time(src, final_dst, now) - now;
        if wait < schedule.slot_time() {
            return final_dst;
        }

        // with 2 racks there is no third to detour through
        if voqs.local_size(final_dst) > self.threshold && self.num_racks > 2 {
            return self.pick_intermediate(src, final_dst);
        }

        final_dst
    }

    fn next_service(
        &mut self,
        voqs: &VirtualOutputQueues,
        schedule: &RotorSchedule,
        now: Time,
    ) -> Option<(RackId, VoqKind)> {
        let rack = voqs.rack();

        for dst in voqs.nonempty_nonlocal_dests() {
            if schedule.has_direct_path(rack, dst, now) {
                return Some((dst, VoqKind::Nonlocal));
            }
        }

        for dst in voqs.nonempty_local_dests() {
            if schedule.has_direct_path(rack, dst, now) {
                return Some((dst, VoqKind::Local));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    // 4 racks on one switch: slots of 200us, cycle 600us
    fn schedule() -> RotorSchedule {
        let mut config = SimConfig::default();
        config.num_racks = 4;
        config.num_switches = 1;
        RotorSchedule::new(&config).unwrap()
    }

    fn slot_partner(schedule: &RotorSchedule, src: RackId, slot: usize) -> RackId {
        schedule
            .connected(src, 0, slot as Time * schedule.slot_time() + 20_000)
            .unwrap()
    }

    #[test]
    fn imminent_slot_means_direct() {
        let schedule = schedule();
        let voqs = VirtualOutputQueues::new(0, 4, 100);
        let mut policy = TwoHopVlb::new(4, 0, 1);

        // this destination's slot opens 20us from now, well under a slot
        let dst = slot_partner(&schedule, 0, 0);
        assert_eq!(policy.first_hop(0, dst, 0, &voqs, &schedule), dst);
    }

    #[test]
    fn short_queue_means_direct_even_with_a_long_wait() {
        let schedule = schedule();
        let voqs = VirtualOutputQueues::new(0, 4, 100);
        let mut policy = TwoHopVlb::new(4, 3, 1);

        // last slot of the cycle: two full slots away
        let dst = slot_partner(&schedule, 0, 2);
        assert_eq!(policy.first_hop(0, dst, 0, &voqs, &schedule), dst);
    }

    #[test]
    fn congested_queue_and_long_wait_detours() {
        let schedule = schedule();
        let mut voqs = VirtualOutputQueues::new(0, 4, 100);
        let mut policy = TwoHopVlb::new(4, 0, 1);

        let dst = slot_partner(&schedule, 0, 2);
        assert!(voqs.enqueue(99, dst, VoqKind::Local));

        for _ in 0..32 {
            let hop = policy.first_hop(0, dst, 0, &voqs, &schedule);
            assert_ne!(hop, 0);
            assert_ne!(hop, dst);
        }
    }

    #[test]
    fn transit_outranks_local() {
        let schedule = schedule();
        let mut voqs = VirtualOutputQueues::new(0, 4, 100);
        let mut policy = TwoHopVlb::new(4, 3, 1);

        let dst = slot_partner(&schedule, 0, 0);
        assert!(voqs.enqueue(1, dst, VoqKind::Local));
        assert!(voqs.enqueue(2, dst, VoqKind::Nonlocal));

        let open = 20_000;
        assert_eq!(policy.next_service(&voqs, &schedule, open), Some((dst, VoqKind::Nonlocal)));
    }

    #[test]
    fn closed_paths_are_not_served() {
        let schedule = schedule();
        let mut voqs = VirtualOutputQueues::new(0, 4, 100);
        let mut policy = TwoHopVlb::new(4, 3, 1);

        let dst = slot_partner(&schedule, 0, 1);
        assert!(voqs.enqueue(1, dst, VoqKind::Local));

        // dst's slot is the second one; during slot 0 there is nothing to do
        assert_eq!(policy.next_service(&voqs, &schedule, 20_000), None);
        // once its slot opens, it is served
        let open = schedule.slot_time() + 20_000;
        assert_eq!(policy.next_service(&voqs, &schedule, open), Some((dst, VoqKind::Local)));
    }

    #[test]
    fn same_seed_same_detours() {
        let schedule = schedule();
        let mut voqs = VirtualOutputQueues::new(0, 4, 100);
        let dst = slot_partner(&schedule, 0, 2);
        assert!(voqs.enqueue(99, dst, VoqKind::Local));

        let mut a = TwoHopVlb::new(4, 0, 7);
        let mut b = TwoHopVlb::new(4, 0, 7);
        for _ in 0..100 {
            assert_eq!(
                a.first_hop(0, dst, 0, &voqs, &schedule),
                b.first_hop(0, dst, 0, &voqs, &schedule)
            );
        }
    }
}
