//! The event-driven core
//!
//! One virtual-time loop over a single min-heap. Flows fragment into
//! packets on arrival, packets sit in per-rack virtual output queues, and
//! each rack is a non-preemptive transmitter that serves whatever queue the
//! policy picks whenever the schedule gives it an open path. A rack that
//! has traffic but no open path schedules its own wakeup for the next slot
//! that helps, so a lone packet on an otherwise idle fabric still leaves in
//! the first slot it can.

use crate::config::SimConfig;
use crate::events::{EventKind, EventQueue};
use crate::flow::{Flow, Packet};
use crate::routing::{RoutingPolicy, TwoHopVlb};
use crate::stats::Statistics;
use crate::topology::RotorSchedule;
use crate::voq::{VirtualOutputQueues, VoqKind};
use crate::{FlowId, PacketId, RackId, Time};
use slog::{debug, info, Logger};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;

/// Transmitter state for one rack
#[derive(Debug)]
struct RackState {
    voqs: VirtualOutputQueues,
    /// A transmission is in flight
    busy: bool,
    /// When the in-flight transmission ends
    next_free: Time,
    /// Earliest self-scheduled retry, if one is pending
    pending_wakeup: Option<Time>,
}

/// The simulation: entity registries, rack state, and the event loop
pub struct Simulator<'a> {
    config: &'a SimConfig,
    schedule: RotorSchedule,
    policy: Box<dyn RoutingPolicy>,
    queue: EventQueue,

    flows: BTreeMap<FlowId, Flow>,
    packets: HashMap<PacketId, Packet>,
    racks: Vec<RackState>,

    now: Time,
    sim_end: Time,
    next_packet_id: PacketId,
    delivered_bytes: u64,
    dropped_packets: u64,

    log: Logger,
}

impl<'a> Simulator<'a> {
    /// A simulator over `config`'s fabric with the default two-hop policy
    ///
    /// The policy RNG is seeded apart from the workload RNG so that the two
    /// streams never entangle.
    pub fn new(config: &'a SimConfig, log: Logger) -> Result<Simulator<'a>, Box<dyn Error>> {
        let schedule = RotorSchedule::new(config)?;
        let policy = TwoHopVlb::new(
            config.num_racks,
            config.queue_threshold,
            config.random_seed.wrapping_add(1000),
        );

        let racks = (0..config.num_racks)
            .map(|rack| RackState {
                voqs: VirtualOutputQueues::new(rack, config.num_racks, config.queue_size_pkts),
                busy: false,
                next_free: 0,
                pending_wakeup: None,
            })
            .collect();

        Ok(Simulator {
            config,
            schedule,
            policy: Box::new(policy),
            queue: EventQueue::new(),
            flows: BTreeMap::new(),
            packets: HashMap::new(),
            racks,
            now: 0,
            sim_end: config.sim_end(),
            next_packet_id: 0,
            delivered_bytes: 0,
            dropped_packets: 0,
            log,
        })
    }

    /// Swaps in a different routing policy before running
    pub fn with_policy(mut self, policy: Box<dyn RoutingPolicy>) -> Simulator<'a> {
        self.policy = policy;
        self
    }

    /// The matching schedule driving this run
    pub fn schedule(&self) -> &RotorSchedule {
        &self.schedule
    }

    /// Runs `flows` until the queue drains or the horizon passes
    pub fn run(&mut self, flows: Vec<Flow>) {
        for flow in flows {
            self.queue.schedule(flow.start_time, EventKind::FlowArrival(flow.id));
            self.flows.insert(flow.id, flow);
        }

        info!(
            self.log,
            "running {} flows to t = {} ms",
            self.flows.len(),
            self.config.sim_time_ms
        );

        loop {
            let head = match self.queue.next_time() {
                Some(t) => t,
                None => break,
            };
            if head > self.sim_end {
                debug!(
                    self.log,
                    "next event at {} ns is past the horizon at {} ns, stopping", head, self.sim_end
                );
                break;
            }
            let event = match self.queue.pop() {
                Some(e) => e,
                None => break,
            };
            self.now = event.time;

            match event.kind {
                EventKind::FlowArrival(id) => self.handle_flow_arrival(id),
                EventKind::PacketArrival(id) => self.handle_packet_arrival(id),
                EventKind::TxComplete(id) => self.handle_tx_complete(id),
                EventKind::RackWakeup(rack) => self.handle_rack_wakeup(rack),
            }
        }

        info!(
            self.log,
            "done: {} delivered bytes, {} dropped packets",
            self.delivered_bytes,
            self.dropped_packets
        );
    }

    /// Aggregates the run into reportable statistics
    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics::new();
        for flow in self.flows.values() {
            stats.add_flow(flow);
        }
        stats.set_dropped_packets(self.dropped_packets);

        let sim_time_s = self.config.sim_time_ms / 1000.0;
        let throughput = if sim_time_s > 0.0 {
            self.delivered_bytes as f64 * 8.0 / (sim_time_s * 1e9)
        } else {
            0.0
        };
        stats.set_throughput(throughput);
        stats.set_sim_time(self.config.sim_time_ms);
        stats
    }

    /// All flows, ascending id
    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }

    /// All packets, in registry order
    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.packets.values()
    }

    /// Bytes that reached their destination rack
    pub fn delivered_bytes(&self) -> u64 {
        self.delivered_bytes
    }

    /// Packets refused a queue slot
    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets
    }

    /// Packets currently sitting in some queue, fabric-wide
    pub fn queued_packets(&self) -> usize {
        self.racks.iter().map(|r| r.voqs.total_packets()).sum()
    }

    // ---------------------------------------------------------- handlers

    /// Fragments the flow and admits every packet at its source rack
    fn handle_flow_arrival(&mut self, flow_id: FlowId) {
        let (src_rack, final_dst, kind, sizes) = match self.flows.get(&flow_id) {
            Some(flow) => (
                flow.src_rack,
                flow.dst_rack,
                flow.kind,
                packet_sizes(flow.size_bytes, self.config.mtu_bytes),
            ),
            None => return,
        };

        for size in sizes {
            let id = self.next_packet_id;
            self.next_packet_id += 1;

            let pkt = Packet::new(id, flow_id, src_rack, final_dst, size, kind, self.now);
            self.packets.insert(id, pkt);
            if let Some(flow) = self.flows.get_mut(&flow_id) {
                flow.packet_ids.push(id);
            }

            self.admit_at_source(id, src_rack, final_dst);
        }
    }

    /// First-hop admission: the policy picks direct or detour, the local
    /// queue takes the packet or drops it
    fn admit_at_source(&mut self, packet_id: PacketId, rack: RackId, final_dst: RackId) {
        let target = self.policy.first_hop(
            rack,
            final_dst,
            self.now,
            &self.racks[rack].voqs,
            &self.schedule,
        );

        if let Some(pkt) = self.packets.get_mut(&packet_id) {
            pkt.current_dst = target;
        }

        if !self.racks[rack].voqs.enqueue(packet_id, target, VoqKind::Local) {
            self.drop_packet(packet_id);
            return;
        }

        if !self.racks[rack].busy {
            self.try_transmit(rack);
        }
    }

    /// A transmission finished: deliver or forward, then serve the rack again
    fn handle_tx_complete(&mut self, packet_id: PacketId) {
        let arrival = self.now + self.config.propagation_delay();

        let mut from_rack = None;
        let mut delivered: Option<(FlowId, u64)> = None;
        let mut forwarded = false;

        if let Some(pkt) = self.packets.get_mut(&packet_id) {
            from_rack = Some(pkt.current_rack);

            if pkt.hops >= 2 {
                // two hops is the ceiling in this fabric
                debug_assert!(false, "packet {} transmitted past its second hop", packet_id);
                pkt.dropped = true;
                self.dropped_packets += 1;
            } else {
                pkt.hops += 1;

                if pkt.current_dst == pkt.final_dst() {
                    pkt.arrival_time = arrival;
                    pkt.current_rack = pkt.final_dst();
                    delivered = Some((pkt.flow_id, pkt.size_bytes));
                } else {
                    // detour landing: from here the only way out is direct
                    pkt.current_rack = pkt.current_dst;
                    pkt.current_dst = pkt.final_dst();
                    forwarded = true;
                }
            }
        }

        if let Some((flow_id, size_bytes)) = delivered {
            self.delivered_bytes += size_bytes;
            if let Some(flow) = self.flows.get_mut(&flow_id) {
                flow.packets_received += 1;
                if flow.packets_received == flow.packet_ids.len() {
                    flow.completed = true;
                    flow.completion_time = arrival;
                }
            }
        }

        if forwarded {
            if arrival <= self.sim_end {
                self.queue.schedule(arrival, EventKind::PacketArrival(packet_id));
            } else {
                debug!(
                    self.log,
                    "packet {} would land at {} ns, past the horizon; arrival not queued",
                    packet_id,
                    arrival
                );
            }
        }

        if let Some(rack) = from_rack {
            self.racks[rack].busy = false;
            self.racks[rack].next_free = self.now;
            self.try_transmit(rack);
        }
    }

    /// A packet landed at its detour intermediate: queue it for the second hop
    fn handle_packet_arrival(&mut self, packet_id: PacketId) {
        let (rack, final_dst, in_transit) = match self.packets.get(&packet_id) {
            Some(pkt) => (
                pkt.current_rack,
                pkt.final_dst(),
                pkt.hops == 1 && pkt.current_rack != pkt.final_dst(),
            ),
            None => return,
        };

        if in_transit {
            if !self.racks[rack].voqs.enqueue(packet_id, final_dst, VoqKind::Nonlocal) {
                self.drop_packet(packet_id);
                return;
            }
        }

        if !self.racks[rack].busy {
            self.try_transmit(rack);
        }
    }

    /// A self-scheduled retry fired
    fn handle_rack_wakeup(&mut self, rack: RackId) {
        if let Some(at) = self.racks[rack].pending_wakeup {
            if at <= self.now {
                self.racks[rack].pending_wakeup = None;
            }
        }
        if !self.racks[rack].busy {
            self.try_transmit(rack);
        }
    }

    // ------------------------------------------------------- transmitter

    /// Serves the rack if the policy finds an open path, otherwise goes
    /// idle with a wakeup at the next slot that could help
    fn try_transmit(&mut self, rack: RackId) {
        let service = self
            .policy
            .next_service(&self.racks[rack].voqs, &self.schedule, self.now);

        let (dst, kind) = match service {
            Some(s) => s,
            None => {
                self.racks[rack].busy = false;
                self.schedule_wakeup(rack);
                return;
            }
        };

        let packet_id = match self.racks[rack].voqs.dequeue(dst, kind) {
            Some(id) => id,
            None => {
                // the policy answered with an empty queue
                debug_assert!(false, "policy served empty queue {:?} -> {} at rack {}", kind, dst, rack);
                self.racks[rack].busy = false;
                return;
            }
        };

        let (tx_time, flow_id, first_hop) = match self.packets.get_mut(&packet_id) {
            Some(pkt) => {
                pkt.sent_time = self.now;
                (
                    self.config.tx_time(pkt.size_bytes),
                    pkt.flow_id,
                    pkt.hops == 0,
                )
            }
            None => {
                self.racks[rack].busy = false;
                return;
            }
        };

        if first_hop {
            if let Some(flow) = self.flows.get_mut(&flow_id) {
                flow.packets_sent += 1;
            }
        }

        self.racks[rack].busy = true;
        self.racks[rack].next_free = self.now + tx_time;
        self.queue.schedule(self.now + tx_time, EventKind::TxComplete(packet_id));
    }

    /// Schedules one retry for the rack at the earliest time a queued
    /// destination gets a direct path; keeps at most one pending per rack
    fn schedule_wakeup(&mut self, rack: RackId) {
        let earliest = {
            let voqs = &self.racks[rack].voqs;
            let mut earliest: Option<Time> = None;
            for dst in voqs
                .nonempty_nonlocal_dests()
                .into_iter()
                .chain(voqs.nonempty_local_dests())
            {
                let t = self.schedule.next_direct_time(rack, dst, self.now);
                earliest = Some(match earliest {
                    Some(cur) if cur <= t => cur,
                    _ => t,
                });
            }
            earliest
        };

        let at = match earliest {
            Some(t) => t,
            None => return, // nothing queued, arrivals will kick us
        };
        if at > self.sim_end {
            return;
        }

        match self.racks[rack].pending_wakeup {
            Some(pending) if pending <= at => {}
            _ => {
                self.racks[rack].pending_wakeup = Some(at);
                self.queue.schedule(at, EventKind::RackWakeup(rack));
            }
        }
    }

    fn drop_packet(&mut self, packet_id: PacketId) {
        if let Some(pkt) = self.packets.get_mut(&packet_id) {
            pkt.dropped = true;
            self.dropped_packets += 1;
            debug!(
                self.log,
                "packet {} dropped at rack {}: queue full", packet_id, pkt.current_rack
            );
        }
    }
}

/// Splits a flow into mtu-sized fragments, the remainder last
pub(crate) fn packet_sizes(size_bytes: u64, mtu_bytes: u64) -> Vec<u64> {
    if size_bytes == 0 {
        return Vec::new();
    }
    let mut sizes = Vec::new();
    let mut remaining = size_bytes;
    while remaining > mtu_bytes {
        sizes.push(mtu_bytes);
        remaining -= mtu_bytes;
    }
    sizes.push(remaining);
    sizes
}
