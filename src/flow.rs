//! Flow and packet records
//!
//! Flows and packets live in the simulator's registries and refer to each
//! other by id; queues only ever hold packet ids. This keeps ownership flat:
//! nothing points at anything else.

use crate::{FlowId, PacketId, RackId, Time};

/// Traffic class carried in flow files
///
/// The circuit fabric only ever carries bulk traffic; low-latency flows in
/// an input file are simulated as if they were bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Large transfer, rides the rotor fabric
    Bulk,
    /// Latency-sensitive, would ride a packet switch in a real deployment
    LowLatency,
}

impl FlowKind {
    /// The label used in flow CSVs
    pub fn name(self) -> &'static str {
        match self {
            FlowKind::Bulk => "bulk",
            FlowKind::LowLatency => "low_latency",
        }
    }

    /// Inverse of [`name`](FlowKind::name)
    pub fn parse(s: &str) -> Option<FlowKind> {
        match s {
            "bulk" => Some(FlowKind::Bulk),
            "low_latency" => Some(FlowKind::LowLatency),
            _ => None,
        }
    }
}

/// One application-level transfer between two hosts
#[derive(Debug, Clone)]
pub struct Flow {
    /// Unique id
    pub id: FlowId,
    /// Rack the flow starts from
    pub src_rack: RackId,
    /// Rack the flow must reach
    pub dst_rack: RackId,
    /// Host index within the source rack
    pub src_host: usize,
    /// Host index within the destination rack
    pub dst_host: usize,
    /// Total bytes to move
    pub size_bytes: u64,
    /// Arrival time
    pub start_time: Time,
    /// Traffic class
    pub kind: FlowKind,
    /// Ids of the packets the flow was fragmented into, in order
    pub packet_ids: Vec<PacketId>,
    /// Packets handed to the fabric so far
    pub packets_sent: usize,
    /// Packets that reached the destination rack so far
    pub packets_received: usize,
    /// True once every packet has arrived
    pub completed: bool,
    /// Arrival time of the last packet; meaningless until `completed`
    pub completion_time: Time,
}

impl Flow {
    /// A fresh flow, not yet fragmented
    pub fn new(
        id: FlowId,
        src_rack: RackId,
        dst_rack: RackId,
        src_host: usize,
        dst_host: usize,
        size_bytes: u64,
        start_time: Time,
        kind: FlowKind,
    ) -> Flow {
        Flow {
            id,
            src_rack,
            dst_rack,
            src_host,
            dst_host,
            size_bytes,
            start_time,
            kind,
            packet_ids: Vec::new(),
            packets_sent: 0,
            packets_received: 0,
            completed: false,
            completion_time: 0,
        }
    }

    /// How many packets the flow fragments into at the given mtu
    pub fn num_packets(&self, mtu_bytes: u64) -> usize {
        ((self.size_bytes + mtu_bytes - 1) / mtu_bytes) as usize
    }

    /// Flow completion time, defined only once the flow completed
    pub fn fct(&self) -> Option<Time> {
        if self.completed {
            Some(self.completion_time - self.start_time)
        } else {
            None
        }
    }
}

/// One mtu-or-smaller fragment of a flow
#[derive(Debug, Clone)]
pub struct Packet {
    /// Unique id
    pub id: PacketId,
    /// Owning flow
    pub flow_id: FlowId,
    /// Rack the packet was injected at
    pub src_rack: RackId,
    /// Where the packet sits (or is being transmitted from) right now
    pub current_rack: RackId,
    /// Next-hop target: the final destination, or a detour intermediate
    pub current_dst: RackId,
    /// Completed transmissions: 0 = unsent, 1 = one hop done, 2 = delivered
    pub hops: u8,
    /// Payload size in bytes, at most the mtu
    pub size_bytes: u64,
    /// When the packet was created
    pub creation_time: Time,
    /// When its latest transmission started
    pub sent_time: Time,
    /// When it reached the destination rack; meaningless until delivered
    pub arrival_time: Time,
    /// Traffic class, inherited from the flow
    pub kind: FlowKind,
    /// True if the packet was refused a queue slot somewhere
    pub dropped: bool,

    final_dst: RackId,
}

impl Packet {
    /// A fresh packet sitting unsent at its source rack
    pub fn new(
        id: PacketId,
        flow_id: FlowId,
        src_rack: RackId,
        final_dst: RackId,
        size_bytes: u64,
        kind: FlowKind,
        creation_time: Time,
    ) -> Packet {
        Packet {
            id,
            flow_id,
            src_rack,
            current_rack: src_rack,
            current_dst: final_dst,
            hops: 0,
            size_bytes,
            creation_time,
            sent_time: 0,
            arrival_time: 0,
            kind,
            dropped: false,
            final_dst,
        }
    }

    /// The rack this packet must ultimately reach; fixed at creation
    pub fn final_dst(&self) -> RackId {
        self.final_dst
    }
}
