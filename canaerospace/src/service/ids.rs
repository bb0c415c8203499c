//! Identification Service (IDS, service code 0): ask a node (or the whole bus) who it is.
//!
//! Grounded on `std_identification.c`. Unlike [`super::fps`] and [`super::nss`], the server
//! side here carries no per-query logic at all: every request gets the same 4-byte identity
//! payload back, regardless of what the requester put in `message_code`.

use heapless::Vec as HVec;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::message::{Message, Value};
use crate::time::Timestamp;
use crate::types::{BROADCAST_NODE_ID, MAX_NODES};

use super::{ServiceRequestArgs, ServiceResponseArgs, ServiceTx};

pub const SERVICE_CODE_IDS: u8 = 0;

/// Every node but the querying one could in principle answer a broadcast query.
///
/// Grounded on `std_identification.c`'s `MAX_FOREIGN_NODES` (`CANAS_MAX_NODES - 1`).
/// The reference implementation guards a broadcast with two inconsistent conditions
/// depending on code path (`pending_requests_len < MAX_FOREIGN_NODES` in one, an
/// equal-or-greater free-slot count in another); this crate takes the stricter rule: a
/// broadcast needs this many slots actually free before it will send anything.
pub const MAX_FOREIGN_NODES: usize = MAX_NODES as usize - 1;

/// A node's answer to `canasSrvIdsRequest`, carried back from `_request`'s `UCHAR4` payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IdsPayload {
    pub hardware_revision: u8,
    pub software_revision: u8,
    pub id_distribution: u8,
    pub header_type: u8,
}

impl IdsPayload {
    fn to_value(self) -> Value {
        Value::UChar4([self.hardware_revision, self.software_revision, self.id_distribution, self.header_type])
    }
}

/// Answers a yet-outstanding client query, or reports that one timed out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdsEvent {
    Answered { node_id: u8, payload: IdsPayload },
    TimedOut { node_id: u8 },
}

/// The local node's fixed identity, handed back to any requester.
pub trait IdsResponder {
    fn identity(&mut self) -> IdsPayload;
}

#[derive(Copy, Clone)]
struct PendingQuery {
    node_id: u8,
    deadline: Timestamp,
}

/// Table of outstanding master-side IDS queries, one slot per node a response is still
/// awaited from.
///
/// Grounded on `CanasSrvIdsData`'s flexible `pending_requests[]` array, sized here by the
/// `N` const generic instead of a runtime allocation. A broadcast query needs
/// `N >= MAX_FOREIGN_NODES` free slots to ever succeed; a unicast query needs only one.
pub struct IdsClient<const N: usize = MAX_FOREIGN_NODES> {
    pending: [Option<PendingQuery>; N],
}

impl<const N: usize> IdsClient<N> {
    pub fn new() -> Self {
        IdsClient { pending: [None; N] }
    }

    fn free_slots(&self) -> usize {
        self.pending.iter().filter(|s| s.is_none()).count()
    }

    /// Ask a single node. Use [`IdsClient::request_broadcast`] to query every node at once.
    pub fn request<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, node_id: u8) -> Result<()> {
        if node_id == BROADCAST_NODE_ID {
            return Err(Error::BadNodeId);
        }
        let idx = self.pending.iter().position(Option::is_none).ok_or(Error::QuotaExceeded)?;
        let msg = Message::new(node_id, SERVICE_CODE_IDS, 0, Value::NoData);
        tx.send_request(&msg)?;
        self.pending[idx] = Some(PendingQuery { node_id, deadline: now.saturating_add(tx.request_timeout_usec()) });
        Ok(())
    }

    /// Ask every node on the bus, pre-allocating one pending-response slot per non-self
    /// node id. Fails with [`Error::QuotaExceeded`] unless at least [`MAX_FOREIGN_NODES`]
    /// slots are currently free.
    pub fn request_broadcast<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp) -> Result<()> {
        if self.free_slots() < MAX_FOREIGN_NODES {
            return Err(Error::QuotaExceeded);
        }
        let msg = Message::new(BROADCAST_NODE_ID, SERVICE_CODE_IDS, 0, Value::NoData);
        tx.send_request(&msg)?;

        let deadline = now.saturating_add(tx.request_timeout_usec());
        let local = tx.local_node_id();
        let mut next_node_id: u16 = 1; // lowest node id is 1
        let mut allocated = 0usize;
        for slot in self.pending.iter_mut() {
            if allocated >= MAX_FOREIGN_NODES {
                break;
            }
            if slot.is_some() {
                continue;
            }
            if next_node_id == local as u16 {
                next_node_id += 1; // self-addressed queries are pointless
            }
            *slot = Some(PendingQuery { node_id: next_node_id as u8, deadline });
            allocated += 1;
            next_node_id += 1;
        }
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    /// Feed an IDS response. Matches and clears the first pending slot for the responding
    /// node, mirroring `_response`'s "stop at the first match" rule: concurrent queries to
    /// the same node may otherwise swap each other's answers.
    pub fn on_response(&mut self, args: &ServiceResponseArgs) -> Option<IdsEvent> {
        let Value::UChar4(bytes) = args.message.data else {
            log::trace!("canaerospace: ids resp wrong data type from node={}", args.message.node_id);
            return None;
        };
        for slot in self.pending.iter_mut() {
            if matches!(slot, Some(p) if p.node_id == args.message.node_id) {
                *slot = None;
                let payload = IdsPayload {
                    hardware_revision: bytes[0],
                    software_revision: bytes[1],
                    id_distribution: bytes[2],
                    header_type: bytes[3],
                };
                return Some(IdsEvent::Answered { node_id: args.message.node_id, payload });
            }
        }
        None
    }

    /// Expire every pending slot whose deadline has passed, reporting each as
    /// [`IdsEvent::TimedOut`]. Call once per poll tick.
    pub fn on_poll(&mut self, now: Timestamp, outcomes: &mut HVec<IdsEvent, N>) {
        for slot in self.pending.iter_mut() {
            if let Some(p) = slot {
                if now > p.deadline {
                    let _ = outcomes.push(IdsEvent::TimedOut { node_id: p.node_id });
                    *slot = None;
                }
            }
        }
    }
}

impl<const N: usize> Default for IdsClient<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Answer an inbound IDS request addressed to the local node (or broadcast). Every request
/// gets the same identity payload back; `message_code` is echoed unchanged.
pub fn on_request<D: Driver, R: IdsResponder>(tx: &mut ServiceTx<D>, args: &ServiceRequestArgs, responder: &mut R) {
    let payload = responder.identity();
    let msg = Message::new(BROADCAST_NODE_ID, SERVICE_CODE_IDS, args.message.message_code, payload.to_value());
    let _ = tx.send_response(args.service_channel, &msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Config;

    struct Bus {
        frames: HVec<(u16, Message), 512>,
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
            service_request_timeout_usec: 100_000,
            service_poll_interval_usec: 10_000,
            repeat_timeout_usec: 30_000_000,
        }
    }

    struct FixedResponder(IdsPayload);
    impl IdsResponder for FixedResponder {
        fn identity(&mut self) -> IdsPayload {
            self.0
        }
    }

    fn answer() -> IdsPayload {
        IdsPayload { hardware_revision: 1, software_revision: 2, id_distribution: 3, header_type: 4 }
    }

    #[test]
    fn unicast_request_answer_round_trip() {
        let mut bus = Bus { frames: HVec::new() };
        let mcfg = config(1);
        let scfg = config(2);
        let mut client: IdsClient = IdsClient::new();

        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
            client.request(&mut tx, Timestamp(0), 2).unwrap();
        }
        assert_eq!(bus.frames.len(), 1);

        let (msg_id, msg) = bus.frames[0];
        let (service_channel, is_request) = super::super::transport::message_id_to_channel(msg_id).unwrap();
        assert!(is_request);
        let req_args = ServiceRequestArgs { message: msg, service_channel, iface: 0, timestamp: Timestamp(1) };
        let mut responder = FixedResponder(answer());
        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &scfg };
            on_request(&mut tx, &req_args, &mut responder);
        }
        assert_eq!(bus.frames.len(), 2);

        let (msg_id, msg) = bus.frames[1];
        let (service_channel, _) = super::super::transport::message_id_to_channel(msg_id).unwrap();
        let resp_args = ServiceResponseArgs { message: msg, service_channel, iface: 0, timestamp: Timestamp(2) };
        let event = client.on_response(&resp_args).unwrap();
        assert_eq!(event, IdsEvent::Answered { node_id: 2, payload: answer() });
        assert!(!client.has_pending());
    }

    /// A full-bus broadcast: every node in `1..=255` except the local one
    /// answers exactly once, by node id.
    #[test]
    fn broadcast_matches_every_node_exactly_once() {
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut client: IdsClient = IdsClient::new();
        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
            client.request_broadcast(&mut tx, Timestamp(0)).unwrap();
        }

        let mut answered = HVec::<u8, 254>::new();
        for node_id in 2u16..=255 {
            let node_id = node_id as u8;
            let msg = Message::new(node_id, SERVICE_CODE_IDS, 0, answer().to_value());
            let args = ServiceResponseArgs { message: msg, service_channel: 0, iface: 0, timestamp: Timestamp(5) };
            let event = client.on_response(&args).unwrap();
            assert_eq!(event, IdsEvent::Answered { node_id, payload: answer() });
            answered.push(node_id).unwrap();
        }
        assert_eq!(answered.len(), 254);
        assert!(!client.has_pending());
    }

    #[test]
    fn broadcast_requires_254_free_slots() {
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut client: IdsClient<253> = IdsClient::new();
        let mut driver = BusDriver { bus: &mut bus };
        let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
        assert_eq!(client.request_broadcast(&mut tx, Timestamp(0)), Err(Error::QuotaExceeded));
    }

    #[test]
    fn pending_query_expires_after_timeout() {
        let mut client: IdsClient = IdsClient::new();
        let mcfg = Config { service_request_timeout_usec: 100_000, ..config(1) };
        let mut bus = Bus { frames: HVec::new() };
        {
            let mut driver = BusDriver { bus: &mut bus };
            let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
            client.request(&mut tx, Timestamp(0), 2).unwrap();
        }
        let mut outcomes = HVec::new();
        client.on_poll(Timestamp(200_000), &mut outcomes);
        assert_eq!(outcomes.as_slice(), &[IdsEvent::TimedOut { node_id: 2 }]);
        assert!(!client.has_pending());
    }

    #[test]
    fn request_rejects_broadcast_node_id() {
        let mut client: IdsClient = IdsClient::new();
        let mcfg = config(1);
        let mut bus = Bus { frames: HVec::new() };
        let mut driver = BusDriver { bus: &mut bus };
        let mut tx = ServiceTx { driver: &mut driver, config: &mcfg };
        assert_eq!(client.request(&mut tx, Timestamp(0), BROADCAST_NODE_ID), Err(Error::BadNodeId));
    }
}
