//! Outgoing packet queue: silence gating, retries, acks and timeouts

use crate::link::ByteTransport;
use crate::stream::hex;
use std::collections::VecDeque;

/// Link-level timing and retry tunables, all durations in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// A packet older than this is eligible for abandonment
    pub send_timeout_ms: u32,
    /// A timed-out packet is never abandoned before this many retries
    pub min_retries: u8,
    /// Minimum bus idle time before a new transmission
    pub silence_interval_ms: u32,
    /// Delay before an unacknowledged packet is sent again
    pub retry_interval_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            send_timeout_ms: 2000,
            min_retries: 2,
            silence_interval_ms: 100,
            retry_interval_ms: 500,
        }
    }
}

/// Per-packet delivery notification
///
/// For every enqueued packet exactly one of the two methods fires, exactly
/// once: `delivered` on a matching ack (or right after the single send of a
/// fire-and-forget packet), `timed_out` when the packet is abandoned.
pub trait DeliveryCallback {
    /// The packet was delivered (acknowledged, or sent without ack demand)
    fn delivered(&mut self, id: u8);

    /// The packet was abandoned after exhausting its timeout and retries
    fn timed_out(&mut self, id: u8);
}

/// One command awaiting transmission or acknowledgment
pub struct OutgoingPacket {
    payload: Vec<u8>,
    id: u8,
    enqueued_at: u32,
    next_retry: u32,
    timeout: u32,
    retries: u8,
    callback: Box<dyn DeliveryCallback>,
}

impl OutgoingPacket {
    /// Identifier acks are matched against; 0 means fire-and-forget
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Number of retransmissions so far
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// The raw frame bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Decision for one tick, computed from the head packet before any mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickAction {
    /// Nothing to do: queue empty, silence gate closed or retry not due
    Wait,
    /// Head packet exceeded its timeout after enough retries
    Abandon,
    /// Transmit the head packet; `retry` when it was sent before
    Send { retry: bool },
}

/// Strictly ordered queue of pending outgoing packets
///
/// At most one packet is in flight: an identifier-bearing packet returns to
/// the queue front after each unacknowledged send, so acks are only ever
/// matched against the head and a later enqueue can never overtake it.
pub struct OutgoingQueue {
    config: LinkConfig,
    queue: VecDeque<OutgoingPacket>,
}

impl OutgoingQueue {
    /// Create an empty queue with the given tunables
    pub fn new(config: LinkConfig) -> Self {
        OutgoingQueue {
            config,
            queue: VecDeque::new(),
        }
    }

    /// The configured tunables
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Number of pending packets
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check whether no packet is pending
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The head-of-queue packet, if any
    pub fn head(&self) -> Option<&OutgoingPacket> {
        self.queue.front()
    }

    /// Append a new packet; does not block and does not transmit
    pub fn enqueue(&mut self, payload: Vec<u8>, id: u8, now: u32, callback: Box<dyn DeliveryCallback>) {
        self.queue.push_back(OutgoingPacket {
            payload,
            id,
            enqueued_at: now,
            next_retry: 0,
            timeout: now.wrapping_add(self.config.send_timeout_ms),
            retries: 0,
            callback,
        });
    }

    /// Resolve an acknowledgment received from the bus
    ///
    /// Only the in-flight head can match; acks for any other identifier, or
    /// while the queue is empty, are ignored without error.
    pub fn acknowledge(&mut self, id: u8) {
        let head_matches = self.queue.front().map_or(false, |packet| packet.id == id);
        if !head_matches {
            log::debug!("unmatched ack {} ignored", id);
            return;
        }
        if let Some(mut packet) = self.queue.pop_front() {
            log::debug!("packet {} acknowledged after {} retries", id, packet.retries);
            packet.callback.delivered(id);
        }
    }

    /// Decide what this tick should do, without mutating anything
    fn plan(&self, now: u32, last_transmission: u32) -> TickAction {
        let head = match self.queue.front() {
            Some(head) => head,
            None => return TickAction::Wait,
        };

        // Abandonment wins over sending
        if head.timeout <= now && head.retries >= self.config.min_retries {
            return TickAction::Abandon;
        }

        let silent = now.wrapping_sub(last_transmission) > self.config.silence_interval_ms;
        if silent && head.next_retry < now {
            return TickAction::Send {
                retry: head.next_retry > 0,
            };
        }

        TickAction::Wait
    }

    /// Evaluate the head packet once per link-idle opportunity
    ///
    /// Returns the new last-transmission time when bytes were written.
    pub fn tick(
        &mut self,
        now: u32,
        last_transmission: u32,
        transport: &mut dyn ByteTransport,
    ) -> Option<u32> {
        match self.plan(now, last_transmission) {
            TickAction::Wait => None,
            TickAction::Abandon => {
                if let Some(mut packet) = self.queue.pop_front() {
                    log::error!(
                        "send timeout for packet {} after {} retries ({}ms queued)",
                        packet.id,
                        packet.retries,
                        now.wrapping_sub(packet.enqueued_at)
                    );
                    packet.callback.timed_out(packet.id);
                }
                None
            }
            TickAction::Send { retry } => {
                if let Some(mut packet) = self.queue.pop_front() {
                    if retry {
                        packet.retries += 1;
                        log::warn!("retry {} for packet {}", packet.retries, packet.id);
                    }
                    log::debug!(
                        "<< [+{}ms] {}",
                        now.wrapping_sub(last_transmission),
                        hex(&packet.payload)
                    );

                    transport.write_bytes(&packet.payload);
                    transport.flush();
                    packet.next_retry = now.wrapping_add(self.config.retry_interval_ms);

                    if packet.id > 0 {
                        // Stays in flight at the head awaiting ack or retry
                        self.queue.push_front(packet);
                    } else {
                        packet.callback.delivered(0);
                    }
                    Some(now)
                } else {
                    None
                }
            }
        }
    }
}
