//! Flash Programming Service (FPS, service code 6): a single outstanding master-side
//! request to tell one node to enter (or leave) its bootloader.
//!
//! Grounded on `std_flashprog.c`. Unlike [`super::ids`], a request here only ever targets
//! one node, so the client side needs no more than the one pending slot the original
//! carries inline in `CanasSrvFpsState`.

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::message::{Message, Value};
use crate::time::Timestamp;
use crate::types::BROADCAST_NODE_ID;

use super::{ServiceRequestArgs, ServiceResponseArgs, ServiceTx};

pub const SERVICE_CODE_FPS: u8 = 6;

/// The responder's verdict on an inbound flash-programming request, carried back as the
/// response's `message_code`.
///
/// Grounded on `CanasSrvFpsResult` (`std_flashprog.h`): all three values fit in an `i8`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FpsResult {
    Ok,
    Abort,
    InvalidSecurityCode,
}

impl FpsResult {
    fn to_message_code(self) -> u8 {
        match self {
            FpsResult::Ok => 0,
            FpsResult::Abort => 0xFFu8,          // -1 as i8
            FpsResult::InvalidSecurityCode => 0xFDu8, // -3 as i8
        }
    }

    fn from_message_code(code: u8) -> FpsResult {
        match code as i8 {
            0 => FpsResult::Ok,
            -3 => FpsResult::InvalidSecurityCode,
            _ => FpsResult::Abort,
        }
    }
}

/// Decides what to do with an inbound flash-programming request addressed to the local node.
pub trait FpsResponder {
    fn on_request(&mut self, security_code: u8) -> FpsResult;
}

/// Outcome of a master-side request, delivered from [`FpsClient::on_response`] or
/// [`FpsClient::on_poll`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FpsEvent {
    Answered { node_id: u8, result: FpsResult },
    TimedOut { node_id: u8 },
}

#[derive(Copy, Clone)]
struct PendingRequest {
    node_id: u8,
    deadline: Timestamp,
}

/// The single outstanding flash-programming request this node is waiting on a response to.
///
/// Grounded on `CanasSrvFpsPendingRequest`: the original keeps exactly one slot per
/// instance and rejects a second request with `QUOTA_EXCEEDED` while one is outstanding.
#[derive(Default)]
pub struct FpsClient {
    pending: Option<PendingRequest>,
}

impl FpsClient {
    pub fn new() -> Self {
        FpsClient { pending: None }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ask `node_id` to enter (or leave) bootloader mode, gated by `security_code`.
    /// Broadcast is never allowed: `std_flashprog.c` rejects it outright since exactly one
    /// node must own the bootloader session.
    pub fn request<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, node_id: u8, security_code: u8) -> Result<()> {
        if node_id == BROADCAST_NODE_ID {
            return Err(Error::BadNodeId);
        }
        if self.pending.is_some() {
            return Err(Error::QuotaExceeded);
        }
        let msg = Message::new(node_id, SERVICE_CODE_FPS, security_code, Value::NoData);
        tx.send_request(&msg)?;
        self.pending = Some(PendingRequest { node_id, deadline: now.saturating_add(tx.request_timeout_usec()) });
        Ok(())
    }

    /// Feed an FPS response. Clears the pending slot only if the response is from the node
    /// a request is actually outstanding for; a stray response from anyone else is ignored.
    pub fn on_response(&mut self, args: &ServiceResponseArgs) -> Option<FpsEvent> {
        if !matches!(args.message.data, Value::NoData) {
            log::trace!("canaerospace: fps resp wrong data type from node={}", args.message.node_id);
            return None;
        }
        let pending = self.pending?;
        if args.message.node_id != pending.node_id {
            log::trace!("canaerospace: fps resp unexpected from node={}", args.message.node_id);
            return None;
        }
        self.pending = None;
        Some(FpsEvent::Answered { node_id: pending.node_id, result: FpsResult::from_message_code(args.message.message_code) })
    }

    /// Expire the pending request if its deadline has passed. Call once per poll tick.
    pub fn on_poll(&mut self, now: Timestamp) -> Option<FpsEvent> {
        let pending = self.pending?;
        if now <= pending.deadline {
            return None;
        }
        self.pending = None;
        Some(FpsEvent::TimedOut { node_id: pending.node_id })
    }
}

/// Answer an inbound FPS request addressed to the local node. A non-`NoData` payload is
/// always aborted without consulting `responder`, matching the payload-type check `_request`
/// runs before it ever reaches the callback.
pub fn on_request<D: Driver, R: FpsResponder>(tx: &mut ServiceTx<D>, args: &ServiceRequestArgs, responder: &mut R) {
    let result = if !matches!(args.message.data, Value::NoData) {
        log::trace!("canaerospace: fps req wrong data type, abort");
        FpsResult::Abort
    } else {
        responder.on_request(args.message.message_code)
    };
    let msg = Message::new(BROADCAST_NODE_ID, SERVICE_CODE_FPS, result.to_message_code(), Value::NoData);
    let _ = tx.send_response(args.service_channel, &msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec as HVec;

    use crate::instance::Config;

    struct Bus {
        frames: HVec<(u16, Message), 16>,
    }

    struct BusDriver<'a> {
        bus: &'a mut Bus,
    }

    impl<'a> Driver for BusDriver<'a> {
        fn send(&mut self, _iface: u8, frame: &crate::frame::CanFrame) -> core::result::Result<bool, ()> {
            let (msg_id, msg, _) = crate::frame::parse(frame).unwrap();
            let _ = self.bus.frames.push((msg_id, msg));
            Ok(true)
        }
        fn timestamp(&mut self) -> Timestamp {
            Timestamp::ZERO
        }
    }

    fn config(node_id: u8) -> Config {
        Config {
            iface_count: 1,
            node_id,
            service_channel: 0,
            redund_channel_id: 0,
            service_request_timeout_usec: 50_000,
            service_poll_interval_usec: 10_000,
            repeat_timeout_usec: 30_000_000,
        }
    }

    struct FixedResponder(FpsResult);
    impl FpsResponder for FixedResponder {
        fn on_request(&mut self, _security_code: u8) -> FpsResult {
            self.0
        }
    }

    #[test]
    fn request_response_round_trip_carries_result() {
        let mcfg = config(1);
        let scfg = config(2);
        let mut bus = Bus { frames: HVec::new() };
        let mut client = FpsClient::new();

        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
            client.request(&mut tx, Timestamp(0), 2, 0xAA).unwrap();
        }
        let (msg_id, msg) = bus.frames[0];
        assert_eq!(msg.message_code, 0xAA);
        let (service_channel, _) = super::super::transport::message_id_to_channel(msg_id).unwrap();

        let req_args = ServiceRequestArgs { message: msg, service_channel, iface: 0, timestamp: Timestamp(1) };
        let mut responder = FixedResponder(FpsResult::InvalidSecurityCode);
        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &scfg };
            on_request(&mut tx, &req_args, &mut responder);
        }

        let (msg_id, msg) = bus.frames[1];
        let (service_channel, _) = super::super::transport::message_id_to_channel(msg_id).unwrap();
        let resp_args = ServiceResponseArgs { message: msg, service_channel, iface: 0, timestamp: Timestamp(2) };
        let event = client.on_response(&resp_args).unwrap();
        assert_eq!(event, FpsEvent::Answered { node_id: 2, result: FpsResult::InvalidSecurityCode });
        assert!(!client.has_pending());
    }

    #[test]
    fn second_request_while_one_pending_is_rejected() {
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut client = FpsClient::new();
        let mut driver = BusDriver { bus: &mut bus };
        let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
        client.request(&mut tx, Timestamp(0), 2, 0).unwrap();
        assert_eq!(client.request(&mut tx, Timestamp(0), 3, 0), Err(Error::QuotaExceeded));
    }

    #[test]
    fn broadcast_request_is_rejected() {
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut client = FpsClient::new();
        let mut driver = BusDriver { bus: &mut bus };
        let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
        assert_eq!(client.request(&mut tx, Timestamp(0), BROADCAST_NODE_ID, 0), Err(Error::BadNodeId));
    }

    #[test]
    fn unanswered_request_times_out_on_poll() {
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut client = FpsClient::new();
        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
            client.request(&mut tx, Timestamp(0), 2, 0).unwrap();
        }
        assert_eq!(client.on_poll(Timestamp(49_999)), None);
        assert_eq!(client.on_poll(Timestamp(50_001)), Some(FpsEvent::TimedOut { node_id: 2 }));
        assert!(!client.has_pending());
    }

    #[test]
    fn response_from_unexpected_node_is_ignored() {
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut client = FpsClient::new();
        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
            client.request(&mut tx, Timestamp(0), 2, 0).unwrap();
        }
        let stray = Message::new(9, SERVICE_CODE_FPS, 0, Value::NoData);
        let args = ServiceResponseArgs { message: stray, service_channel: 0, iface: 0, timestamp: Timestamp(1) };
        assert_eq!(client.on_response(&args), None);
        assert!(client.has_pending());
    }

    #[test]
    fn malformed_request_payload_is_aborted_without_consulting_responder() {
        let scfg = config(2);
        let mut bus = Bus { frames: HVec::new() };
        let msg = Message::new(2, SERVICE_CODE_FPS, 7, Value::UChar(1));
        let args = ServiceRequestArgs { message: msg, service_channel: 0, iface: 0, timestamp: Timestamp(1) };
        struct PanicResponder;
        impl FpsResponder for PanicResponder {
            fn on_request(&mut self, _security_code: u8) -> FpsResult {
                panic!("should not be consulted");
            }
        }
        let mut responder = PanicResponder;
        let mut driver = BusDriver { bus: &mut bus };
        let mut tx = ServiceTx { driver: &mut driver, config: &scfg };
        on_request(&mut tx, &args, &mut responder);
        let (_, msg) = bus.frames[0];
        assert_eq!(msg.message_code, FpsResult::Abort.to_message_code());
    }
}
