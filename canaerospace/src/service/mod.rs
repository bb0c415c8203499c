//! Service registry: per-service-code subscriptions, duplicate suppression across
//! redundant interfaces, and periodic poll dispatch.
//!
//! The session-carrying services (block transfer, identification, flash programming)
//! build on top of this module but are not wired into it directly, see
//! [`block_transfer`], [`ids`], [`fps`], and [`nss`]. Those session tables are owned by the
//! embedding application, not by [`ServiceRegistry`] itself, mirroring how the reference
//! implementation leaves `pstate` opaque to the core.

pub mod block_transfer;
pub mod fps;
pub mod ids;
pub mod nss;
pub mod transport;

use heapless::Vec as HVec;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::instance::Config;
use crate::message::Message;
use crate::time::Timestamp;
use crate::types::BROADCAST_NODE_ID;

/// Sending half of the service pipeline: builds and transmits request/response frames
/// through [`transport`], using the instance's configuration and driver.
///
/// Grounded on `core.c`'s `canasServiceSendRequest`/`canasServiceSendResponse`. A request's
/// `node_id` field addresses the target node (or [`BROADCAST_NODE_ID`]); a response's
/// `node_id` field identifies the responder and is filled in automatically when left at
/// [`BROADCAST_NODE_ID`].
pub struct ServiceTx<'a, D: Driver> {
    pub(crate) driver: &'a mut D,
    pub(crate) config: &'a Config,
}

impl<'a, D: Driver> ServiceTx<'a, D> {
    /// Send `msg` as a request on the local service channel. Rejects addressing the local
    /// node itself.
    pub fn send_request(&mut self, msg: &Message) -> Result<()> {
        if msg.node_id == self.config.node_id {
            return Err(Error::BadNodeId);
        }
        let msg_id = transport::channel_to_message_id(self.config.service_channel, true)?;
        crate::instance::send_on_all_ifaces(self.driver, self.config.iface_count, msg_id, msg)
    }

    /// Send `msg` as a response on `service_channel` (the channel the originating request
    /// arrived on, not necessarily the local channel). `msg.node_id` left at
    /// [`BROADCAST_NODE_ID`] is rewritten to the local node id; any other foreign id is
    /// rejected, since a response always speaks for the local node.
    pub fn send_response(&mut self, service_channel: u8, msg: &Message) -> Result<()> {
        let mut out = *msg;
        if out.node_id == BROADCAST_NODE_ID {
            out.node_id = self.config.node_id;
        } else if out.node_id != self.config.node_id {
            return Err(Error::BadNodeId);
        }
        let msg_id = transport::channel_to_message_id(service_channel, false)?;
        crate::instance::send_on_all_ifaces(self.driver, self.config.iface_count, msg_id, &out)
    }

    pub fn local_node_id(&self) -> u8 {
        self.config.node_id
    }

    pub fn iface_count(&self) -> u8 {
        self.config.iface_count
    }

    /// How long a master-side request should wait for a response before the caller treats
    /// it as timed out. Shared by [`ids`] and [`fps`] so neither has to thread its own copy
    /// of the config through.
    pub fn request_timeout_usec(&self) -> u64 {
        self.config.service_request_timeout_usec
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct HistoryEntry {
    fingerprint: [u8; 4],
    ifaces_mask: u8,
    timestamp: Timestamp,
}

struct ServiceSubscription<const HIST_LEN: usize> {
    service_code: u8,
    history: [HistoryEntry; HIST_LEN],
    next_slot: usize,
}

/// Arguments delivered to [`ServiceHandler::on_request`].
#[derive(Copy, Clone, Debug)]
pub struct ServiceRequestArgs {
    pub message: Message,
    pub service_channel: u8,
    pub iface: u8,
    pub timestamp: Timestamp,
}

/// Arguments delivered to [`ServiceHandler::on_response`].
#[derive(Copy, Clone, Debug)]
pub struct ServiceResponseArgs {
    pub message: Message,
    pub service_channel: u8,
    pub iface: u8,
    pub timestamp: Timestamp,
}

/// Receives request/response delivery and periodic polling for every registered service
/// code. One application type typically implements this once and dispatches internally
/// on `service_code`, keeping per-service state in its own fields rather than behind a
/// stored function pointer and opaque argument the way the C callback table does.
pub trait ServiceHandler<D: Driver> {
    fn on_request(&mut self, tx: &mut ServiceTx<D>, service_code: u8, args: &ServiceRequestArgs);
    fn on_response(&mut self, tx: &mut ServiceTx<D>, service_code: u8, args: &ServiceResponseArgs);

    /// Invoked for every registered service code once per poll interval. Default: no-op,
    /// for handlers whose services are all driven purely by request/response.
    fn on_poll(&mut self, tx: &mut ServiceTx<D>, service_code: u8, timestamp: Timestamp) {
        let _ = (tx, service_code, timestamp);
    }
}

/// Per-service-code subscription table plus the duplicate-suppression history ring each
/// subscription carries.
///
/// Grounded on `service.c`'s `CanasServiceSubscription` and its registration API; the
/// original's separate malloc'd history array becomes an inline fixed-size array sized by
/// the `HIST_LEN` const generic.
pub struct ServiceRegistry<const SERVICE_SUBS: usize, const HIST_LEN: usize> {
    subs: HVec<ServiceSubscription<HIST_LEN>, SERVICE_SUBS>,
}

impl<const SERVICE_SUBS: usize, const HIST_LEN: usize> ServiceRegistry<SERVICE_SUBS, HIST_LEN> {
    pub fn new() -> Self {
        ServiceRegistry { subs: HVec::new() }
    }

    pub fn register(&mut self, service_code: u8) -> Result<()> {
        if self.subs.iter().any(|s| s.service_code == service_code) {
            return Err(Error::EntryExists);
        }
        self.subs
            .push(ServiceSubscription { service_code, history: [HistoryEntry::default(); HIST_LEN], next_slot: 0 })
            .map_err(|_| Error::NotEnoughMemory)
    }

    pub fn unregister(&mut self, service_code: u8) -> Result<()> {
        let pos = self.subs.iter().position(|s| s.service_code == service_code).ok_or(Error::NoSuchEntry)?;
        self.subs.swap_remove(pos);
        Ok(())
    }

    pub fn is_registered(&self, service_code: u8) -> bool {
        self.subs.iter().any(|s| s.service_code == service_code)
    }

    /// Dispatch a just-parsed service-group message: apply the addressing filter, then
    /// duplicate suppression, then invoke `handler`.
    ///
    /// Grounded on `service.c`'s `canasHandleReceivedService`/`_applyFilters`. `raw` is the
    /// message's first four wire bytes (node id, data type, service code, message code),
    /// used as an opaque fingerprint for the duplicate check.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_received<D: Driver, H: ServiceHandler<D>>(
        &mut self,
        tx: &mut ServiceTx<D>,
        msg_id: u16,
        msg: &Message,
        iface: u8,
        raw: &[u8; 4],
        timestamp: Timestamp,
        repeat_timeout_usec: u64,
        handler: &mut H,
    ) -> Result<()> {
        let (service_channel, is_request) = transport::message_id_to_channel(msg_id)?;

        if is_request {
            if msg.node_id != tx.config.node_id && msg.node_id != BROADCAST_NODE_ID {
                log::trace!("canaerospace: foreign service request, addressed node_id={}", msg.node_id);
                return Ok(());
            }
        } else if service_channel != tx.config.service_channel || msg.node_id == tx.config.node_id {
            log::trace!("canaerospace: service response on foreign channel={service_channel}");
            return Ok(());
        }

        let Some(sub) = self.subs.iter_mut().find(|s| s.service_code == msg.service_code) else {
            log::trace!("canaerospace: no subscription for service_code={}", msg.service_code);
            return Ok(());
        };

        if Self::suppress_or_record(sub, raw, iface, timestamp, repeat_timeout_usec) {
            return Ok(());
        }

        if is_request {
            handler.on_request(tx, msg.service_code, &ServiceRequestArgs { message: *msg, service_channel, iface, timestamp });
        } else {
            handler.on_response(tx, msg.service_code, &ServiceResponseArgs { message: *msg, service_channel, iface, timestamp });
        }
        Ok(())
    }

    /// `true` if this message is a duplicate already delivered and should be dropped.
    ///
    /// A fingerprint match whose interface bit is already set (a genuine repeat on the
    /// same link, not a second interface of the same redundant frame) falls through to the
    /// ring-buffer insert below and is delivered again; only a *new* interface seeing an
    /// already-known fingerprint within the window is suppressed.
    fn suppress_or_record(
        sub: &mut ServiceSubscription<HIST_LEN>,
        raw: &[u8; 4],
        iface: u8,
        timestamp: Timestamp,
        repeat_timeout_usec: u64,
    ) -> bool {
        let iface_bit = 1u8 << iface;
        for entry in sub.history.iter_mut() {
            if entry.fingerprint == *raw && timestamp.saturating_since(entry.timestamp) < repeat_timeout_usec {
                if entry.ifaces_mask & iface_bit == 0 {
                    entry.ifaces_mask |= iface_bit;
                    return true;
                }
                break;
            }
        }
        sub.history[sub.next_slot] = HistoryEntry { fingerprint: *raw, ifaces_mask: iface_bit, timestamp };
        sub.next_slot = (sub.next_slot + 1) % HIST_LEN;
        false
    }

    /// Invoke every registered service code's poll callback. Grounded on `canasPollServices`.
    pub fn poll<D: Driver, H: ServiceHandler<D>>(&mut self, tx: &mut ServiceTx<D>, timestamp: Timestamp, handler: &mut H) {
        for sub in self.subs.iter() {
            handler.on_poll(tx, sub.service_code, timestamp);
        }
    }
}

impl<const SERVICE_SUBS: usize, const HIST_LEN: usize> Default for ServiceRegistry<SERVICE_SUBS, HIST_LEN> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;

    struct FakeDriver {
        sent: HVec<(u8, crate::frame::CanFrame), 16>,
    }

    impl Driver for FakeDriver {
        fn send(&mut self, iface: u8, frame: &crate::frame::CanFrame) -> core::result::Result<bool, ()> {
            let _ = self.sent.push((iface, *frame));
            Ok(true)
        }
        fn timestamp(&mut self) -> Timestamp {
            Timestamp::ZERO
        }
    }

    fn config() -> Config {
        Config {
            iface_count: 2,
            node_id: 5,
            service_channel: 1,
            redund_channel_id: 0,
            service_request_timeout_usec: 100_000,
            service_poll_interval_usec: 10_000,
            repeat_timeout_usec: 30_000_000,
        }
    }

    struct RecordingHandler {
        requests: u32,
        hook_calls: u32,
    }

    impl<D: Driver> ServiceHandler<D> for RecordingHandler {
        fn on_request(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _args: &ServiceRequestArgs) {
            self.requests += 1;
        }
        fn on_response(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _args: &ServiceResponseArgs) {}
    }

    #[test]
    fn duplicate_on_second_interface_is_suppressed_once() {
        let mut reg: ServiceRegistry<4, 8> = ServiceRegistry::new();
        reg.register(8).unwrap();
        let cfg = config();
        let mut driver = FakeDriver { sent: HVec::new() };
        let mut tx = ServiceTx { driver: &mut driver, config: &cfg };
        let mut handler = RecordingHandler { requests: 0, hook_calls: 0 };

        let msg = Message::new(5, 8, 1, Value::BLong(0xdeadface));
        let raw = [5u8, crate::types::DataType::BLong as u8, 8, 1];

        reg.handle_received(&mut tx, 2000, &msg, 0, &raw, Timestamp(1), 30_000_000, &mut handler).unwrap();
        reg.handle_received(&mut tx, 2000, &msg, 1, &raw, Timestamp(1), 30_000_000, &mut handler).unwrap();
        assert_eq!(handler.requests, 1);

        reg.handle_received(&mut tx, 2000, &msg, 0, &raw, Timestamp(60_000_000), 30_000_000, &mut handler).unwrap();
        assert_eq!(handler.requests, 2);
        let _ = handler.hook_calls;
    }

    #[test]
    fn request_addressed_to_foreign_node_is_dropped() {
        let mut reg: ServiceRegistry<4, 8> = ServiceRegistry::new();
        reg.register(8).unwrap();
        let cfg = config();
        let mut driver = FakeDriver { sent: HVec::new() };
        let mut tx = ServiceTx { driver: &mut driver, config: &cfg };
        let mut handler = RecordingHandler { requests: 0, hook_calls: 0 };

        let msg = Message::new(9, 8, 1, Value::NoData);
        let raw = [9u8, 0, 8, 1];
        reg.handle_received(&mut tx, 2000, &msg, 0, &raw, Timestamp(1), 30_000_000, &mut handler).unwrap();
        assert_eq!(handler.requests, 0);
    }

    #[test]
    fn response_on_foreign_channel_is_dropped() {
        let mut reg: ServiceRegistry<4, 8> = ServiceRegistry::new();
        reg.register(8).unwrap();
        let cfg = config();
        let mut driver = FakeDriver { sent: HVec::new() };
        let mut tx = ServiceTx { driver: &mut driver, config: &cfg };
        let mut handler = RecordingHandler { requests: 0, hook_calls: 0 };

        // service_channel 2 != config().service_channel (1)
        let msg = Message::new(9, 8, 0, Value::NoData);
        let raw = [9u8, 0, 8, 0];
        reg.handle_received(&mut tx, 133, &msg, 0, &raw, Timestamp(1), 30_000_000, &mut handler).unwrap();
        assert_eq!(handler.requests, 0);
    }

    #[test]
    fn unregistered_service_code_is_ignored() {
        let mut reg: ServiceRegistry<4, 8> = ServiceRegistry::new();
        let cfg = config();
        let mut driver = FakeDriver { sent: HVec::new() };
        let mut tx = ServiceTx { driver: &mut driver, config: &cfg };
        let mut handler = RecordingHandler { requests: 0, hook_calls: 0 };

        let msg = Message::new(5, 8, 0, Value::NoData);
        let raw = [5u8, 0, 8, 0];
        assert!(reg.handle_received(&mut tx, 2000, &msg, 0, &raw, Timestamp(1), 30_000_000, &mut handler).is_ok());
        assert_eq!(handler.requests, 0);
    }
}
