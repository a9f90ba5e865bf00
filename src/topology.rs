//! The rotor switch schedule
//!
//! Every switch steps through a fixed list of perfect matchings, one per
//! slot, all switches in lockstep. The `num_racks - 1` matchings of the
//! round-robin tournament construction are dealt out to the switches in
//! turn, so within one cycle every rack pair is directly connected exactly
//! once. The first `reconfig_delay` of every slot the links are down while
//! the rotors retune.

use crate::config::SimConfig;
use crate::{RackId, Time};
use std::cmp;
use std::error::Error;

/// Precomputed matching schedule for the whole fabric
#[derive(Debug)]
pub struct RotorSchedule {
    num_racks: usize,
    num_switches: usize,
    /// Slots per cycle; also the longest per-switch matching list
    num_matchings: usize,
    slot_time: Time,
    reconfig_delay: Time,
    cycle_time: Time,
    /// `matchings[switch][slot][src] = dst`
    matchings: Vec<Vec<Vec<RackId>>>,
}

impl RotorSchedule {
    /// Builds and verifies the schedule for `config`
    ///
    /// Fails when the tournament construction cannot cover every rack pair
    /// exactly once, which is the case for any odd `num_racks`.
    pub fn new(config: &SimConfig) -> Result<RotorSchedule, Box<dyn Error>> {
        config.validate()?;

        let n = config.num_racks;
        if n % 2 != 0 {
            return Err(format!(
                "rotor schedule needs an even number of racks to pair them all, got {}",
                n
            )
            .into());
        }

        let all = round_robin_matchings(n);
        verify_pair_coverage(&all, n)?;

        // Deal the matchings out to the switches: switch s gets s, s+S, ...
        let mut matchings = vec![Vec::new(); config.num_switches];
        for (m, matching) in all.into_iter().enumerate() {
            matchings[m % config.num_switches].push(matching);
        }

        Ok(RotorSchedule {
            num_racks: n,
            num_switches: config.num_switches,
            num_matchings: config.num_matchings(),
            slot_time: config.slot_time(),
            reconfig_delay: config.reconfig_delay(),
            cycle_time: config.cycle_time(),
            matchings,
        })
    }

    /// Slot duration
    pub fn slot_time(&self) -> Time {
        self.slot_time
    }

    /// One full rotation through all matchings
    pub fn cycle_time(&self) -> Time {
        self.cycle_time
    }

    /// Slots per cycle
    pub fn num_matchings(&self) -> usize {
        self.num_matchings
    }

    /// The rack `switch` connects `src` to at time `t`
    ///
    /// None while the switch is reconfiguring, and on switches whose
    /// matching list is shorter than the current slot index.
    pub fn connected(&self, src: RackId, switch: usize, t: Time) -> Option<RackId> {
        let time_in_cycle = t % self.cycle_time;
        if time_in_cycle % self.slot_time < self.reconfig_delay {
            return None;
        }

        let slot_idx = (time_in_cycle / self.slot_time) as usize % self.num_matchings;
        let matching = self.matchings.get(switch)?.get(slot_idx)?;
        matching.get(src).copied()
    }

    /// True when some switch connects `src` directly to `dst` at time `t`
    pub fn has_direct_path(&self, src: RackId, dst: RackId, t: Time) -> bool {
        (0..self.num_switches).any(|s| self.connected(src, s, t) == Some(dst))
    }

    /// Earliest `t >= now` with a direct path `src -> dst`
    ///
    /// Looks the pair's slot up in the schedule, one slot at a time over the
    /// coming cycle, and accounts for the reconfiguration dead time at the
    /// head of the slot. `now + cycle_time` when the pair never connects.
    pub fn next_direct_time(&self, src: RackId, dst: RackId, now: Time) -> Time {
        let slot_base = now - now % self.slot_time;
        for k in 0..self.num_matchings as Time {
            let slot_start = slot_base + k * self.slot_time;
            let open = cmp::max(now, slot_start + self.reconfig_delay);
            if self.has_direct_path(src, dst, open) {
                return open;
            }
        }
        now + self.cycle_time
    }
}

/// The `n - 1` edge-disjoint perfect matchings of the complete graph on `n`
/// racks, by the circle method
///
/// Rack 0 is the pivot; racks `1..n` live on a circle of `n - 1` labels
/// (rack `n - 1` takes label 0). In matching `m`, rack `i` pairs with label
/// `(n - i + m) mod (n - 1)`; the one rack whose partner label collides with
/// its own swings out to pair with the pivot instead.
fn round_robin_matchings(n: usize) -> Vec<Vec<RackId>> {
    let mut rounds = Vec::with_capacity(n - 1);

    for m in 0..n - 1 {
        let mut matching = vec![0; n];
        for i in 1..n {
            let label = i % (n - 1);
            let partner = (n - i + m) % (n - 1);
            if partner == label {
                matching[i] = 0;
                matching[0] = i;
            } else if partner == 0 {
                matching[i] = n - 1;
            } else {
                matching[i] = partner;
            }
        }
        rounds.push(matching);
    }

    rounds
}

/// Checks that the matchings are fixed-point-free involutions covering every
/// unordered rack pair exactly once
fn verify_pair_coverage(matchings: &[Vec<RackId>], n: usize) -> Result<(), Box<dyn Error>> {
    let mut times_paired = vec![vec![0u32; n]; n];

    for (m, matching) in matchings.iter().enumerate() {
        for src in 0..n {
            let dst = matching[src];
            if dst >= n || dst == src || matching[dst] != src {
                return Err(format!(
                    "matching {} is not a pairing: rack {} maps to {}",
                    m, src, dst
                )
                .into());
            }
            if src < dst {
                times_paired[src][dst] += 1;
            }
        }
    }

    for i in 0..n {
        for j in i + 1..n {
            if times_paired[i][j] != 1 {
                return Err(format!(
                    "racks {} and {} are paired {} times across the schedule, expected once",
                    i, j, times_paired[i][j]
                )
                .into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(num_racks: usize, num_switches: usize) -> SimConfig {
        let mut config = SimConfig::default();
        config.num_racks = num_racks;
        config.num_switches = num_switches;
        // 20us reconfig at 0.9 duty: 200us slots
        config.reconfig_delay_us = 20.0;
        config.duty_cycle = 0.9;
        config
    }

    #[test]
    fn construction_covers_every_pair_once() {
        for &n in &[2, 4, 6, 8, 16, 32] {
            let rounds = round_robin_matchings(n);
            assert_eq!(rounds.len(), n - 1);
            verify_pair_coverage(&rounds, n).unwrap();
        }
    }

    #[test]
    fn odd_rack_counts_are_rejected() {
        for &n in &[3, 5, 7, 15] {
            assert!(RotorSchedule::new(&config(n, 1)).is_err());
        }
    }

    #[test]
    fn links_are_down_during_reconfiguration() {
        let schedule = RotorSchedule::new(&config(4, 1)).unwrap();
        let reconfig = 20_000;

        for src in 0..4 {
            // anywhere strictly inside the dead time: no link
            assert_eq!(schedule.connected(src, 0, 0), None);
            assert_eq!(schedule.connected(src, 0, reconfig - 1), None);
            // from the reconfiguration boundary on: the scheduled partner
            let partner = schedule.connected(src, 0, reconfig).unwrap();
            assert_ne!(partner, src);
            assert_eq!(schedule.connected(partner, 0, reconfig), Some(src));
        }
    }

    #[test]
    fn every_pair_connects_within_a_cycle() {
        for &(n, s) in &[(4, 1), (8, 2), (16, 4), (16, 3)] {
            let schedule = RotorSchedule::new(&config(n, s)).unwrap();
            for src in 0..n {
                for dst in 0..n {
                    if src == dst {
                        continue;
                    }
                    let t = schedule.next_direct_time(src, dst, 0);
                    assert!(
                        t < schedule.cycle_time(),
                        "{} -> {} not connected within a cycle ({} racks, {} switches)",
                        src,
                        dst,
                        n,
                        s
                    );
                    assert!(schedule.has_direct_path(src, dst, t));
                }
            }
        }
    }

    #[test]
    fn next_direct_time_is_the_earliest_opening() {
        let schedule = RotorSchedule::new(&config(8, 2)).unwrap();
        let step = 10_000; // half the reconfiguration delay

        for src in 0..8 {
            for dst in 0..8 {
                if src == dst {
                    continue;
                }
                for &now in &[0, 35_000, 199_999, 200_000, 410_000] {
                    let t = schedule.next_direct_time(src, dst, now);
                    assert!(t >= now);
                    assert!(schedule.has_direct_path(src, dst, t));
                    let mut probe = now;
                    while probe < t {
                        assert!(
                            !schedule.has_direct_path(src, dst, probe),
                            "{} -> {}: open at {} but next_direct_time said {}",
                            src,
                            dst,
                            probe,
                            t
                        );
                        probe += step;
                    }
                }
            }
        }
    }

    #[test]
    fn queries_wrap_around_the_cycle() {
        let schedule = RotorSchedule::new(&config(4, 1)).unwrap();
        let cycle = schedule.cycle_time();

        for src in 0..4 {
            for t in &[20_000, 220_000, 420_000] {
                assert_eq!(
                    schedule.connected(src, 0, *t),
                    schedule.connected(src, 0, *t + 3 * cycle)
                );
            }
        }
    }

    #[test]
    fn uneven_switch_loads_leave_trailing_slots_dark() {
        // 15 matchings over 4 switches: switches 0..3 hold 4, 4, 4, 3
        let schedule = RotorSchedule::new(&config(16, 4)).unwrap();
        let last_slot_open = 3 * schedule.slot_time() + 20_000;
        assert_eq!(schedule.connected(0, 3, last_slot_open), None);
        assert!(schedule.connected(0, 2, last_slot_open).is_some());
    }
}
