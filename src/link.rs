//! Half-duplex link orchestration over a raw byte transport
//!
//! [`BusLink`] ties the pieces together: it drains the transport into the
//! stream assembler, decodes to quiescence, and only then gives the
//! outgoing queue a chance to transmit. A `Fill` outcome therefore blocks
//! all transmission until the frame boundary resolves, which is what keeps
//! the half-duplex bus collision free.

use crate::core::{classify_address_type, AddressType, AltMode, DecodeOutcome, FanMode, Mode};
use crate::error::Result;
use crate::protocol::ProtocolKind;
use crate::queue::{DeliveryCallback, LinkConfig, OutgoingQueue};
use crate::stream::StreamAssembler;
use crate::target::{MessageTarget, ProtocolRequest};
use std::collections::BTreeSet;

/// Raw byte pipe to the bus; no framing is assumed at this layer
pub trait ByteTransport {
    /// Number of bytes ready to read without blocking
    fn bytes_available(&self) -> usize;

    /// Read one byte, if any is ready
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission
    fn write_bytes(&mut self, data: &[u8]);

    /// Push queued bytes onto the wire
    fn flush(&mut self);
}

/// Monotonic millisecond time source
///
/// 32-bit wraparound is inherited by the timeout arithmetic, not corrected.
pub trait Clock {
    /// Current time in milliseconds
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Delivery callback for frames originated by the decoders themselves
struct UnattendedDelivery;

impl DeliveryCallback for UnattendedDelivery {
    fn delivered(&mut self, id: u8) {
        log::debug!("reply packet {} delivered", id);
    }

    fn timed_out(&mut self, id: u8) {
        log::warn!("reply packet {} timed out", id);
    }
}

/// Message target adapter wired in during [`BusLink::poll`]
///
/// Routes `publish_data` into the outgoing queue and `ack_data` into queue
/// acknowledgment, guards against duplicate address registrations, and
/// forwards field updates to the outer device-model target.
struct LinkTarget<'a> {
    inner: &'a mut dyn MessageTarget,
    queue: &'a mut OutgoingQueue,
    known_addresses: &'a mut BTreeSet<String>,
    now: u32,
}

impl MessageTarget for LinkTarget<'_> {
    fn get_milliseconds(&self) -> u32 {
        self.now
    }

    fn publish_data(&mut self, data: Vec<u8>, id: u8) {
        self.queue
            .enqueue(data, id, self.now, Box::new(UnattendedDelivery));
    }

    fn ack_data(&mut self, id: u8) {
        self.queue.acknowledge(id);
    }

    fn register_address(&mut self, address: &str) {
        if !self.known_addresses.insert(address.to_string()) {
            log::warn!("address {} is already registered", address);
            return;
        }
        self.inner.register_address(address);
    }

    fn set_power(&mut self, address: &str, value: bool) {
        self.inner.set_power(address, value);
    }

    fn set_room_temperature(&mut self, address: &str, value: f32) {
        self.inner.set_room_temperature(address, value);
    }

    fn set_room_humidity(&mut self, address: &str, value: f32) {
        self.inner.set_room_humidity(address, value);
    }

    fn set_target_temperature(&mut self, address: &str, value: f32) {
        self.inner.set_target_temperature(address, value);
    }

    fn set_mode(&mut self, address: &str, mode: Mode) {
        self.inner.set_mode(address, mode);
    }

    fn set_fanmode(&mut self, address: &str, fanmode: FanMode) {
        self.inner.set_fanmode(address, fanmode);
    }

    fn set_altmode(&mut self, address: &str, altmode: AltMode) {
        self.inner.set_altmode(address, altmode);
    }

    fn set_swing_vertical(&mut self, address: &str, value: bool) {
        self.inner.set_swing_vertical(address, value);
    }

    fn set_swing_horizontal(&mut self, address: &str, value: bool) {
        self.inner.set_swing_horizontal(address, value);
    }
}

/// Single-threaded driver of one serial bus link
///
/// All work happens inside [`poll`](BusLink::poll), which the host calls
/// periodically; there are no internal threads and no re-entrancy.
pub struct BusLink<T: ByteTransport, C: Clock> {
    transport: T,
    clock: C,
    assembler: StreamAssembler,
    queue: OutgoingQueue,
    last_transmission: u32,
    nasa_packet_counter: u8,
    known_addresses: BTreeSet<String>,
}

impl<T: ByteTransport, C: Clock> BusLink<T, C> {
    /// Create a link over a transport and clock
    pub fn new(transport: T, clock: C, config: LinkConfig) -> Self {
        BusLink {
            transport,
            clock,
            assembler: StreamAssembler::new(),
            queue: OutgoingQueue::new(config),
            last_transmission: 0,
            nasa_packet_counter: 0,
            known_addresses: BTreeSet::new(),
        }
    }

    /// The underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Number of packets awaiting transmission or acknowledgment
    pub fn pending_packets(&self) -> usize {
        self.queue.len()
    }

    /// Every device address seen on the bus so far
    pub fn known_addresses(&self) -> impl Iterator<Item = &str> {
        self.known_addresses.iter().map(String::as_str)
    }

    /// Drive one invocation: receive to quiescence, then maybe transmit
    ///
    /// The receive phase always runs first and to completion; transmission
    /// is attempted only when the receive buffer is fully drained, so a
    /// partially arrived frame (`Fill`) holds all outgoing traffic.
    pub fn poll(&mut self, target: &mut dyn MessageTarget) {
        if !self.read_incoming(target) {
            return;
        }
        self.write_outgoing();
    }

    /// Queue a typed control request for a device
    ///
    /// The wire format is selected by the address shape. NASA requests get
    /// a fresh non-zero packet number and are retried until acknowledged;
    /// legacy requests are fire-and-forget.
    pub fn send_request(
        &mut self,
        address: &str,
        request: &ProtocolRequest,
        callback: Box<dyn DeliveryCallback>,
    ) -> Result<()> {
        let kind = ProtocolKind::for_address(address);
        let packet_number = match kind {
            ProtocolKind::Nasa => self.next_packet_number(),
            ProtocolKind::NonNasa => 0,
        };
        let (frame, id) = kind.encode_request(address, request, packet_number)?;

        log::debug!("queueing {} request for {} (id {})", kind, address, id);
        let now = self.clock.now_ms();
        self.queue.enqueue(frame, id, now, callback);
        Ok(())
    }

    /// Queue a pre-encoded frame
    pub fn publish_data(&mut self, data: Vec<u8>, id: u8, callback: Box<dyn DeliveryCallback>) {
        let now = self.clock.now_ms();
        self.queue.enqueue(data, id, now, callback);
    }

    /// Log every discovered address, grouped by role
    pub fn log_discovered(&self) {
        let group = |wanted: AddressType| {
            self.known_addresses
                .iter()
                .filter(|address| classify_address_type(address) == wanted)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        log::info!("discovered devices:");
        log::info!("  outdoor: {}", group(AddressType::Outdoor));
        log::info!("  indoor:  {}", group(AddressType::Indoor));
        log::info!("  other:   {}", group(AddressType::Other));
    }

    /// Drain the transport and decode until the buffer is empty or stalls
    ///
    /// Returns whether the link is quiescent, i.e. transmission is allowed.
    fn read_incoming(&mut self, target: &mut dyn MessageTarget) -> bool {
        while self.transport.bytes_available() > 0 {
            match self.transport.read_byte() {
                Some(byte) => self.assembler.push_byte(byte),
                None => break,
            }
        }

        if self.assembler.is_empty() {
            return true;
        }

        loop {
            let now = self.clock.now_ms();
            let elapsed = now.wrapping_sub(self.last_transmission);
            let mut adapter = LinkTarget {
                inner: target,
                queue: &mut self.queue,
                known_addresses: &mut self.known_addresses,
                now,
            };

            match self.assembler.advance(&mut adapter, elapsed) {
                DecodeOutcome::Fill => return self.assembler.is_empty(),
                _ => {
                    self.last_transmission = now;
                    if self.assembler.is_empty() {
                        return true;
                    }
                }
            }
        }
    }

    fn write_outgoing(&mut self) {
        let now = self.clock.now_ms();
        if let Some(transmitted_at) = self.queue.tick(now, self.last_transmission, &mut self.transport) {
            self.last_transmission = transmitted_at;
        }
    }

    /// Next NASA packet number; wraps within 1..=255 so the identifier
    /// always marks the packet as ack-eligible
    fn next_packet_number(&mut self) -> u8 {
        self.nasa_packet_counter = self.nasa_packet_counter.wrapping_add(1);
        if self.nasa_packet_counter == 0 {
            self.nasa_packet_counter = 1;
        }
        self.nasa_packet_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nasa;
    use crate::non_nasa;
    use crate::test_support::{callback_record, MockClock, MockTransport, RecordingTarget};

    fn link(clock: &MockClock) -> BusLink<MockTransport, &MockClock> {
        BusLink::new(
            MockTransport::default(),
            clock,
            LinkConfig {
                send_timeout_ms: 1000,
                min_retries: 2,
                silence_interval_ms: 100,
                retry_interval_ms: 100,
            },
        )
    }

    fn legacy_frame() -> Vec<u8> {
        non_nasa::Packet {
            src: 0x00,
            dst: 0xd0,
            command: non_nasa::CMD_STATE,
            payload: [77, 75, 0, 0x81, 0x00, 0, 0, 0],
        }
        .encode()
    }

    fn nasa_ack_frame(packet_number: u8) -> Vec<u8> {
        nasa::Packet {
            sa: nasa::Address {
                class: 0x20,
                channel: 0x00,
                address: 0x01,
            },
            da: nasa::Address::controller(),
            command: nasa::Command {
                data_type: nasa::DataType::Ack,
                ..nasa::Command::request(packet_number)
            },
            messages: vec![],
        }
        .encode()
    }

    #[test]
    fn test_receive_flow_delivers_updates() {
        let clock = MockClock::new(1000);
        let mut link = link(&clock);
        let mut target = RecordingTarget::default();

        link.transport_mut().feed(&legacy_frame());
        link.poll(&mut target);

        assert_eq!(target.registered, vec!["00".to_string()]);
        assert!(!target.updates.is_empty());
        assert_eq!(link.known_addresses().collect::<Vec<_>>(), vec!["00"]);
    }

    #[test]
    fn test_duplicate_registration_is_forwarded_once() {
        let clock = MockClock::new(1000);
        let mut link = link(&clock);
        let mut target = RecordingTarget::default();

        link.transport_mut().feed(&legacy_frame());
        link.poll(&mut target);
        clock.advance(200);
        link.transport_mut().feed(&legacy_frame());
        link.poll(&mut target);

        assert_eq!(target.registered, vec!["00".to_string()]);
        assert_eq!(target.updates.len(), 14);
    }

    #[test]
    fn test_partial_frame_blocks_transmission() {
        let clock = MockClock::new(1000);
        let mut link = link(&clock);
        let mut target = RecordingTarget::default();
        let (_, callback) = callback_record();

        let mut request = ProtocolRequest::new();
        request.power = Some(true);
        link.send_request("20.00.01", &request, callback).unwrap();

        let frame = legacy_frame();
        link.transport_mut().feed(&frame[..6]);
        link.poll(&mut target);
        assert!(link.transport_mut().written.is_empty());

        // The rest of the frame resolves the Fill; the silence gate still
        // holds because decoding counts as bus activity.
        link.transport_mut().feed(&frame[6..]);
        link.poll(&mut target);
        assert!(link.transport_mut().written.is_empty());

        clock.advance(150);
        link.poll(&mut target);
        assert_eq!(link.transport_mut().written.len(), 1);
    }

    #[test]
    fn test_request_retry_then_ack_over_the_wire() {
        let clock = MockClock::new(1000);
        let mut link = link(&clock);
        let mut target = RecordingTarget::default();
        let (record, callback) = callback_record();

        let mut request = ProtocolRequest::new();
        request.mode = Some(Mode::Heat);
        link.send_request("20.00.01", &request, callback).unwrap();
        assert_eq!(link.pending_packets(), 1);

        clock.advance(200);
        link.poll(&mut target);
        assert_eq!(link.transport_mut().written.len(), 1);

        // No ack arrives: the next opportunity retries the same frame
        clock.advance(200);
        link.poll(&mut target);
        let written = &link.transport_mut().written;
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], written[1]);

        // The unit acknowledges packet number 1
        let ack = nasa_ack_frame(1);
        link.transport_mut().feed(&ack);
        clock.advance(50);
        link.poll(&mut target);

        assert_eq!(link.pending_packets(), 0);
        assert_eq!(record.borrow().delivered, vec![1]);
        assert!(record.borrow().timed_out.is_empty());
    }

    #[test]
    fn test_request_timeout_reports_once() {
        let clock = MockClock::new(1000);
        let mut link = link(&clock);
        let mut target = RecordingTarget::default();
        let (record, callback) = callback_record();

        let mut request = ProtocolRequest::new();
        request.power = Some(false);
        link.send_request("20.00.01", &request, callback).unwrap();

        // Send plus retries until both the deadline and the retry floor pass
        for _ in 0..10 {
            clock.advance(200);
            link.poll(&mut target);
        }

        assert_eq!(link.pending_packets(), 0);
        assert_eq!(record.borrow().timed_out.len(), 1);
        assert!(record.borrow().delivered.is_empty());
    }

    #[test]
    fn test_legacy_request_is_fire_and_forget() {
        let clock = MockClock::new(1000);
        let mut link = link(&clock);
        let mut target = RecordingTarget::default();
        let (record, callback) = callback_record();

        let mut request = ProtocolRequest::new();
        request.power = Some(true);
        link.send_request("00", &request, callback).unwrap();

        clock.advance(200);
        link.poll(&mut target);

        assert_eq!(link.pending_packets(), 0);
        assert_eq!(record.borrow().delivered, vec![0]);
        assert_eq!(link.transport_mut().written.len(), 1);
    }

    #[test]
    fn test_send_request_rejects_bad_address() {
        let clock = MockClock::new(0);
        let mut link = link(&clock);
        let (_, callback) = callback_record();

        let mut request = ProtocolRequest::new();
        request.power = Some(true);
        assert!(link.send_request("20.zz.01", &request, callback).is_err());
        assert_eq!(link.pending_packets(), 0);
    }

    #[test]
    fn test_packet_numbers_skip_zero() {
        let clock = MockClock::new(0);
        let mut link = link(&clock);

        link.nasa_packet_counter = 254;
        assert_eq!(link.next_packet_number(), 255);
        assert_eq!(link.next_packet_number(), 1);
        assert_eq!(link.next_packet_number(), 2);
    }
}
