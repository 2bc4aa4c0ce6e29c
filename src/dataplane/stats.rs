//! Outcome counters
//!
//! One shard per worker so that concurrent packet tasks never write the same
//! cache line. Readers sum all shards; nothing here is ever reset.

use super::fib::FibCode;
use std::sync::atomic::{AtomicU64, Ordering};

/// Closed set of forwarding outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Outcome {
    Route = 0,
    RouteNoNeighbor = 1,
    HeaderParseError = 2,
    NotForwarded = 3,
    StoreMacError = 4,
    SizeExceeded = 5,
    LastExit = 6,
}

impl Outcome {
    pub const COUNT: usize = 7;

    pub const ALL: [Outcome; Outcome::COUNT] = [
        Outcome::Route,
        Outcome::RouteNoNeighbor,
        Outcome::HeaderParseError,
        Outcome::NotForwarded,
        Outcome::StoreMacError,
        Outcome::SizeExceeded,
        Outcome::LastExit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Outcome::Route => "route",
            Outcome::RouteNoNeighbor => "route_noneigh",
            Outcome::HeaderParseError => "err_parse_headers",
            Outcome::NotForwarded => "not_fwd",
            Outcome::StoreMacError => "err_store_mac",
            Outcome::SizeExceeded => "err_buffer_size",
            Outcome::LastExit => "err_fallthrough",
        }
    }
}

#[derive(Debug, Default)]
struct PacketBytes {
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl PacketBytes {
    #[inline]
    fn add(&self, bytes: u64) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn load(&self) -> Count {
        Count {
            packets: self.packets.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
#[repr(align(64))]
struct Shard {
    outcomes: [PacketBytes; Outcome::COUNT],
    fib: [PacketBytes; FibCode::COUNT],
}

/// Packet and byte totals for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Count {
    pub packets: u64,
    pub bytes: u64,
}

impl Count {
    fn merge(&mut self, other: Count) {
        self.packets += other.packets;
        self.bytes += other.bytes;
    }
}

/// Sharded per-outcome and per-FIB-code accumulators.
#[derive(Debug)]
pub struct OutcomeCounters {
    shards: Box<[Shard]>,
}

impl OutcomeCounters {
    /// Creates `shards` independent counter sets (at least one).
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1)).map(|_| Shard::default()).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard(&self, shard: usize) -> &Shard {
        &self.shards[shard % self.shards.len()]
    }

    #[inline]
    pub fn record_outcome(&self, shard: usize, outcome: Outcome, bytes: u64) {
        self.shard(shard).outcomes[outcome as usize].add(bytes);
    }

    /// Counts a raw FIB result code. Codes outside the known range are not
    /// counted.
    #[inline]
    pub fn record_fib(&self, shard: usize, code: i32, bytes: u64) {
        if let Some(slot) = usize::try_from(code)
            .ok()
            .and_then(|idx| self.shard(shard).fib.get(idx))
        {
            slot.add(bytes);
        }
    }

    /// Sums every shard.
    pub fn snapshot(&self) -> CounterSnapshot {
        let mut snap = CounterSnapshot::default();
        for shard in self.shards.iter() {
            for (total, slot) in snap.outcomes.iter_mut().zip(shard.outcomes.iter()) {
                total.merge(slot.load());
            }
            for (total, slot) in snap.fib.iter_mut().zip(shard.fib.iter()) {
                total.merge(slot.load());
            }
        }
        snap
    }
}

impl Default for OutcomeCounters {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Point-in-time sum of all shards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    outcomes: [Count; Outcome::COUNT],
    fib: [Count; FibCode::COUNT],
}

impl CounterSnapshot {
    pub fn outcome(&self, outcome: Outcome) -> Count {
        self.outcomes[outcome as usize]
    }

    pub fn fib(&self, code: FibCode) -> Count {
        self.fib[code as usize]
    }

    /// Flattens the snapshot into named values for the metrics log.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = Vec::with_capacity(2 * (Outcome::COUNT + FibCode::COUNT));
        for outcome in Outcome::ALL {
            let count = self.outcome(outcome);
            result.push((
                format!("return_reasons_packets{{key={}}}", outcome.name()),
                count.packets,
            ));
            result.push((
                format!("return_reasons_bytes{{key={}}}", outcome.name()),
                count.bytes,
            ));
        }
        for code in FibCode::ALL {
            let count = self.fib(code);
            result.push((
                format!("fib_lookup_packets{{key={}}}", code.name()),
                count.packets,
            ));
            result.push((
                format!("fib_lookup_bytes{{key={}}}", code.name()),
                count.bytes,
            ));
        }
        result
    }
}
