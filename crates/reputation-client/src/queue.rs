//! Pending events, coalesced per address and event type.

use reputation_core::subreport::{
    group_events, IPV4_EVENT_LEN, IPV6_EVENT_LEN, REPEATED_IPV4_EVENT_LEN,
    REPEATED_IPV6_EVENT_LEN,
};
use reputation_core::{check_reportable, EventType, IpEvent, RepeatedIpEvent, Result, SubReport};
use std::collections::HashMap;
use std::net::IpAddr;
use std::ops::Range;

/// Largest repeat count a single wire entry can carry.
const MAX_REPEAT: u32 = u8::MAX as u32;

/// Occurrences held by one pending entry. Further occurrences of the same
/// (address, event) open another entry, so a single entry always fits in
/// one datagram.
pub const MAX_OCCURRENCES: u32 = MAX_REPEAT * 64;

/// All occurrences of one event type for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    pub address: IpAddr,
    pub event: EventType,
    pub count: u32,
}

impl PendingEvent {
    /// Split the count into wire entries of at most 255 occurrences.
    fn entries(&self, single: &mut Vec<IpEvent>, repeated: &mut Vec<RepeatedIpEvent>) -> Result<()> {
        let mut remaining = self.count;
        while remaining > 0 {
            let take = remaining.min(MAX_REPEAT);
            if take == 1 {
                single.push(IpEvent::new(self.address, self.event)?);
            } else {
                repeated.push(RepeatedIpEvent::new(self.address, self.event, take as u8)?);
            }
            remaining -= take;
        }
        Ok(())
    }

    /// Bytes of subreport content these occurrences encode to.
    fn encoded_len(&self) -> usize {
        let full = (self.count / MAX_REPEAT) as usize;
        let rest = self.count % MAX_REPEAT;
        let (single_len, repeated_len) = if self.address.is_ipv4() {
            (IPV4_EVENT_LEN, REPEATED_IPV4_EVENT_LEN)
        } else {
            (IPV6_EVENT_LEN, REPEATED_IPV6_EVENT_LEN)
        };
        full * repeated_len
            + match rest {
                0 => 0,
                1 => single_len,
                _ => repeated_len,
            }
    }
}

/// Queue of events awaiting submission, in first-seen order.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Vec<PendingEvent>,
    /// Slot of the newest entry for each (address, event).
    index: HashMap<(IpAddr, EventType), usize>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one occurrence.
    pub fn record(&mut self, address: IpAddr, event: EventType) -> Result<()> {
        self.record_many(address, event, 1)
    }

    /// Queue `count` occurrences.
    pub fn record_many(&mut self, address: IpAddr, event: EventType, count: u32) -> Result<()> {
        check_reportable(address)?;
        let mut remaining = count;
        while remaining > 0 {
            let slot = match self.index.get(&(address, event)) {
                Some(&slot) if self.pending[slot].count < MAX_OCCURRENCES => slot,
                _ => {
                    self.pending.push(PendingEvent {
                        address,
                        event,
                        count: 0,
                    });
                    self.index.insert((address, event), self.pending.len() - 1);
                    self.pending.len() - 1
                }
            };
            let entry = &mut self.pending[slot];
            let take = remaining.min(MAX_OCCURRENCES - entry.count);
            entry.count += take;
            remaining -= take;
        }
        Ok(())
    }

    /// Total queued occurrences.
    pub fn len(&self) -> usize {
        self.pending.iter().map(|p| p.count as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[PendingEvent] {
        &self.pending
    }

    /// Partition the queue into consecutive ranges whose encoded events
    /// fit in `budget` bytes each.
    pub fn batches(&self, budget: usize) -> Vec<Range<usize>> {
        let mut batches = Vec::new();
        let mut start = 0;
        let mut used = 0;
        for (i, pending) in self.pending.iter().enumerate() {
            let len = pending.encoded_len();
            if used + len > budget && i > start {
                batches.push(start..i);
                start = i;
                used = 0;
            }
            used += len;
        }
        if start < self.pending.len() {
            batches.push(start..self.pending.len());
        }
        batches
    }

    /// Event subreports for a range of the queue.
    pub fn subreports(&self, range: Range<usize>) -> Result<Vec<SubReport>> {
        let mut single = Vec::new();
        let mut repeated = Vec::new();
        for pending in &self.pending[range] {
            pending.entries(&mut single, &mut repeated)?;
        }
        Ok(group_events(&single, &repeated))
    }

    /// Remove the first `n` pending entries.
    pub fn drain_front(&mut self, n: usize) {
        self.pending.drain(..n.min(self.pending.len()));
        self.index = self
            .pending
            .iter()
            .enumerate()
            .map(|(i, p)| ((p.address, p.event), i))
            .collect();
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.index.clear();
    }
}
