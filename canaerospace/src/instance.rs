//! Core orchestrator: owns the parameter and service registries, and drives the receive
//! and publish/poll paths described in `core.c`'s `canasUpdate`.

use crate::driver::{Driver, HookArgs};
use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::message::{Message, Value};
use crate::param::{ParamCallbackArgs, ParamHandler, ParamRegistry, PublishFrame};
use crate::router;
use crate::service::{ServiceHandler, ServiceRegistry, ServiceTx};
use crate::time::Timestamp;
use crate::types::RoutingGroup;

/// Runtime configuration for one [`Instance`]. Grounded on `CanasConfig` in `canaerospace.h`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    /// Number of redundant physical interfaces to send on and accept frames from, `1..=8`.
    pub iface_count: u8,
    /// This node's own id, `1..=255`. Never [`crate::types::BROADCAST_NODE_ID`].
    pub node_id: u8,
    /// Local service channel this node answers requests on and expects responses on.
    pub service_channel: u8,
    /// Redundancy channel tag this node stamps on every frame it sends.
    pub redund_channel_id: u8,
    /// How long a master-side block-transfer or simple-service request waits for a
    /// response before timing out.
    pub service_request_timeout_usec: u64,
    /// Interval between successive [`ServiceHandler::on_poll`]/[`BlockTransferSessions::on_poll`]
    /// sweeps. [`Instance::update`] gates on this automatically; it only matters directly to
    /// callers driving [`Instance::poll_services`] on their own schedule.
    ///
    /// [`BlockTransferSessions::on_poll`]: crate::service::block_transfer::BlockTransferSessions::on_poll
    pub service_poll_interval_usec: u64,
    /// Window within which a repeated message code on the same channel is suppressed as a
    /// retransmission rather than delivered again.
    pub repeat_timeout_usec: u64,
}

impl Config {
    /// Grounded on `_isConfigOk`.
    pub fn validate(&self) -> Result<()> {
        if self.iface_count < 1 || self.iface_count > crate::types::IFACE_COUNT_MAX {
            return Err(Error::Argument);
        }
        if self.node_id == crate::types::BROADCAST_NODE_ID {
            return Err(Error::BadNodeId);
        }
        if !crate::service::transport::is_valid_service_channel(self.service_channel) {
            return Err(Error::BadServiceChan);
        }
        if self.service_request_timeout_usec == 0 || self.service_poll_interval_usec == 0 {
            return Err(Error::Argument);
        }
        Ok(())
    }
}

/// Send `msg` on every interface `0..iface_count`, folding per-interface failures into a
/// single [`crate::error::Error::Driver`] only once all of them have failed.
///
/// Grounded on `core.c`'s `_sendOnAllInterfaces`: a soft failure (`Ok(false)`) or hard
/// failure (`Err(())`) on one interface does not stop delivery attempts on the others.
pub(crate) fn send_on_all_ifaces<D: Driver>(driver: &mut D, iface_count: u8, msg_id: u16, msg: &Message) -> Result<()> {
    let frame = crate::frame::make(msg_id, msg, 0)?;
    let mut any_ok = false;
    for iface in 0..iface_count {
        match driver.send(iface, &frame) {
            Ok(true) => any_ok = true,
            Ok(false) => log::trace!("canaerospace: iface {iface} dropped msgid={msg_id:03x}"),
            Err(()) => log::warn!("canaerospace: iface {iface} hard failure on msgid={msg_id:03x}"),
        }
    }
    if any_ok {
        Ok(())
    } else {
        Err(Error::Driver)
    }
}

/// One CANaerospace node: the parameter registry, the service registry, and the
/// configuration both are driven by.
///
/// Grounded on `core.c`'s `CanasInstance`. The const generics replace the original's
/// allocator-sized tables with compile-time capacity:
/// `PARAM_SUBS`/`PARAM_ADVS`/`REDUND_CHANNELS` size the parameter registry,
/// `SERVICE_SUBS`/`HIST_LEN` size the service registry's subscriptions and their
/// duplicate-suppression history rings.
pub struct Instance<
    const PARAM_SUBS: usize,
    const PARAM_ADVS: usize,
    const REDUND_CHANNELS: usize,
    const SERVICE_SUBS: usize,
    const HIST_LEN: usize,
> {
    config: Config,
    params: ParamRegistry<PARAM_SUBS, PARAM_ADVS, REDUND_CHANNELS>,
    services: ServiceRegistry<SERVICE_SUBS, HIST_LEN>,
    last_service_poll: Timestamp,
}

impl<
        const PARAM_SUBS: usize,
        const PARAM_ADVS: usize,
        const REDUND_CHANNELS: usize,
        const SERVICE_SUBS: usize,
        const HIST_LEN: usize,
    > Instance<PARAM_SUBS, PARAM_ADVS, REDUND_CHANNELS, SERVICE_SUBS, HIST_LEN>
{
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Instance {
            config,
            params: ParamRegistry::new(),
            services: ServiceRegistry::new(),
            last_service_poll: Timestamp::ZERO,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn param_subscribe(&mut self, msg_id: u16, redund_count: u8) -> Result<()> {
        self.params.subscribe(msg_id, redund_count)
    }

    pub fn param_unsubscribe(&mut self, msg_id: u16) -> Result<()> {
        self.params.unsubscribe(msg_id)
    }

    pub fn param_read(&self, msg_id: u16, redund_chan: u8) -> Result<ParamCallbackArgs> {
        self.params.read(msg_id, redund_chan)
    }

    pub fn param_advertise(&mut self, msg_id: u16, interlaced: bool) -> Result<()> {
        self.params.advertise(msg_id, interlaced, self.config.iface_count)
    }

    pub fn param_unadvertise(&mut self, msg_id: u16) -> Result<()> {
        self.params.unadvertise(msg_id)
    }

    /// Build and send the next frame for an advertised parameter.
    ///
    /// Grounded on `canasParamPublish`: the message is built by [`ParamRegistry`], then
    /// sent either on every interface or on the single interface an interlaced
    /// advertisement's round-robin cursor selected.
    pub fn param_publish<D: Driver>(&mut self, driver: &mut D, msg_id: u16, data: Value) -> Result<()> {
        let PublishFrame { iface, message } = self.params.prepare_publish(
            msg_id,
            self.config.node_id,
            data,
            0,
            self.config.iface_count,
        )?;
        match iface {
            Some(iface) => {
                let frame = crate::frame::make(msg_id, &message, self.config.redund_channel_id)?;
                driver.send(iface, &frame).map(|_| ()).map_err(|()| Error::Driver)
            }
            None => send_on_all_ifaces(driver, self.config.iface_count, msg_id, &message),
        }
    }

    pub fn service_register(&mut self, service_code: u8) -> Result<()> {
        self.services.register(service_code)
    }

    pub fn service_unregister(&mut self, service_code: u8) -> Result<()> {
        self.services.unregister(service_code)
    }

    pub fn service_is_registered(&self, service_code: u8) -> bool {
        self.services.is_registered(service_code)
    }

    fn tx<'a, D: Driver>(&'a self, driver: &'a mut D) -> ServiceTx<'a, D> {
        ServiceTx { driver, config: &self.config }
    }

    pub fn service_send_request<D: Driver>(&mut self, driver: &mut D, msg: &Message) -> Result<()> {
        self.tx(driver).send_request(msg)
    }

    pub fn service_send_response<D: Driver>(&mut self, driver: &mut D, service_channel: u8, msg: &Message) -> Result<()> {
        self.tx(driver).send_response(service_channel, msg)
    }

    /// Parse one just-received CAN frame and dispatch it, using `now` as the single instant
    /// the hook, the subscription callback, and the repeat-filter cache all observe.
    fn receive_at<D: Driver, P: ParamHandler, S: ServiceHandler<D>>(
        &mut self,
        driver: &mut D,
        frame: &CanFrame,
        iface: u8,
        timestamp: Timestamp,
        param_handler: &mut P,
        service_handler: &mut S,
    ) -> Result<()> {
        let (msg_id, msg, redund_chan) = crate::frame::parse(frame)?;

        let group = router::classify(msg_id).ok_or(Error::BadMessageId)?;

        driver.hook(&HookArgs { timestamp, message: msg, message_id: msg_id, redund_channel_id: redund_chan, iface });

        match group {
            RoutingGroup::Parameter => {
                self.params.handle_received(msg_id, &msg, redund_chan, timestamp, self.config.repeat_timeout_usec, param_handler);
                Ok(())
            }
            RoutingGroup::Service => {
                let raw = [msg.node_id, msg.data.tag(), msg.service_code, msg.message_code];
                let mut tx = ServiceTx { driver, config: &self.config };
                self.services.handle_received(&mut tx, msg_id, &msg, iface, &raw, timestamp, self.config.repeat_timeout_usec, service_handler)
            }
        }
    }

    /// Parse one just-received CAN frame and dispatch it, reading the current timestamp
    /// from `driver`.
    ///
    /// Grounded on `canasUpdate`'s per-frame path: parse, classify, hook (unconditionally,
    /// before any subscription filtering), then route to the parameter or service
    /// registry. An unclassifiable message id is reported to the caller rather than
    /// silently dropped, since it usually means a misconfigured bus rather than expected
    /// traffic this node doesn't subscribe to.
    ///
    /// Most embedders should prefer [`Instance::update`], which also clocks the periodic
    /// service poll; this is exposed separately for callers that want to drive the receive
    /// path and the poll path on their own schedule.
    pub fn receive<D: Driver, P: ParamHandler, S: ServiceHandler<D>>(
        &mut self,
        driver: &mut D,
        frame: &CanFrame,
        iface: u8,
        param_handler: &mut P,
        service_handler: &mut S,
    ) -> Result<()> {
        let timestamp = driver.timestamp();
        self.receive_at(driver, frame, iface, timestamp, param_handler, service_handler)
    }

    /// Run every registered service code's poll callback, reading the current timestamp
    /// from `driver`. Most embedders should prefer [`Instance::update`], which calls this
    /// automatically once `config.service_poll_interval_usec` has elapsed; this is exposed
    /// separately for callers driving the poll path on their own schedule.
    pub fn poll_services<D: Driver, S: ServiceHandler<D>>(&mut self, driver: &mut D, service_handler: &mut S) {
        let timestamp = driver.timestamp();
        self.last_service_poll = timestamp;
        let mut tx = ServiceTx { driver, config: &self.config };
        self.services.poll(&mut tx, timestamp, service_handler);
    }

    /// The single entry point a cooperative embedder drives the instance from: dispatch
    /// `frame` (if one arrived) through [`Instance::receive`], then run the service poll if
    /// `config.service_poll_interval_usec` has elapsed since the last one.
    ///
    /// Grounded on `core.c`'s `canasUpdate`, which is called identically whether or not a
    /// frame is available on a given tick: a driver with no frame ready still calls it with
    /// a null frame pointer purely to clock the poll. Both the per-frame timestamp and the
    /// poll gating read a single `driver.timestamp()` obtained at the start of this call, so
    /// the hook, the subscription callback, the repeat-filter cache, and the poll decision
    /// all observe the same instant.
    pub fn update<D: Driver, P: ParamHandler, S: ServiceHandler<D>>(
        &mut self,
        driver: &mut D,
        frame: Option<(&CanFrame, u8)>,
        param_handler: &mut P,
        service_handler: &mut S,
    ) -> Result<()> {
        let now = driver.timestamp();

        let result = match frame {
            Some((frame, iface)) => self.receive_at(driver, frame, iface, now, param_handler, service_handler),
            None => Ok(()),
        };

        if now.saturating_since(self.last_service_poll) >= self.config.service_poll_interval_usec {
            self.last_service_poll = now;
            let mut tx = ServiceTx { driver, config: &self.config };
            self.services.poll(&mut tx, now, service_handler);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec as HVec;

    struct RecordingDriver {
        sent: HVec<(u8, CanFrame), 32>,
        now: Timestamp,
        hooks: u32,
    }

    impl Driver for RecordingDriver {
        fn send(&mut self, iface: u8, frame: &CanFrame) -> core::result::Result<bool, ()> {
            let _ = self.sent.push((iface, *frame));
            Ok(true)
        }
        fn timestamp(&mut self) -> Timestamp {
            self.now
        }
        fn hook(&mut self, _args: &HookArgs) {
            self.hooks += 1;
        }
    }

    struct NoopParams;
    impl ParamHandler for NoopParams {
        fn on_param(&mut self, _args: &ParamCallbackArgs) {}
    }

    struct NoopServices;
    impl<D: Driver> ServiceHandler<D> for NoopServices {
        fn on_request(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _args: &crate::service::ServiceRequestArgs) {}
        fn on_response(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _args: &crate::service::ServiceResponseArgs) {}
    }

    fn config() -> Config {
        Config {
            iface_count: 1,
            node_id: 5,
            service_channel: 1,
            redund_channel_id: 0,
            service_request_timeout_usec: 100_000,
            service_poll_interval_usec: 10_000,
            repeat_timeout_usec: 30_000_000,
        }
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let mut bad = config();
        bad.node_id = 0;
        let inst = Instance::<2, 2, 2, 2, 4>::new(bad);
        assert_eq!(inst.err(), Some(Error::BadNodeId));
    }

    #[test]
    fn publishing_an_unadvertised_parameter_is_an_error() {
        let mut inst = Instance::<2, 2, 2, 2, 4>::new(config()).unwrap();
        let mut driver = RecordingDriver { sent: HVec::new(), now: Timestamp(1), hooks: 0 };
        assert_eq!(inst.param_publish(&mut driver, 1800, Value::UShort(1)), Err(Error::NoSuchEntry));
    }

    #[test]
    fn publish_then_receive_round_trips_through_the_registry() {
        let mut publisher = Instance::<2, 2, 2, 2, 4>::new(config()).unwrap();
        publisher.param_advertise(1800, false).unwrap();
        let mut driver = RecordingDriver { sent: HVec::new(), now: Timestamp(1), hooks: 0 };
        publisher.param_publish(&mut driver, 1800, Value::UShort(42)).unwrap();
        assert_eq!(driver.sent.len(), 1);

        let mut receiver_cfg = config();
        receiver_cfg.node_id = 9;
        let mut receiver = Instance::<2, 2, 2, 2, 4>::new(receiver_cfg).unwrap();
        receiver.param_subscribe(1800, 1).unwrap();

        let (_, frame) = driver.sent[0];
        let mut recv_driver = RecordingDriver { sent: HVec::new(), now: Timestamp(2), hooks: 0 };
        let mut params = NoopParams;
        let mut services = NoopServices;
        receiver.receive(&mut recv_driver, &frame, 0, &mut params, &mut services).unwrap();
        assert_eq!(recv_driver.hooks, 1);
        assert_eq!(receiver.param_read(1800, 0).unwrap().message.data, Value::UShort(42));
    }

    #[test]
    fn hook_runs_even_when_no_subscription_accepts_the_message() {
        let mut publisher = Instance::<2, 2, 2, 2, 4>::new(config()).unwrap();
        publisher.param_advertise(1800, false).unwrap();
        let mut driver = RecordingDriver { sent: HVec::new(), now: Timestamp(1), hooks: 0 };
        publisher.param_publish(&mut driver, 1800, Value::UShort(42)).unwrap();

        let mut receiver_cfg = config();
        receiver_cfg.node_id = 9;
        let mut receiver = Instance::<2, 2, 2, 2, 4>::new(receiver_cfg).unwrap();
        // No subscription registered at all.

        let (_, frame) = driver.sent[0];
        let mut recv_driver = RecordingDriver { sent: HVec::new(), now: Timestamp(2), hooks: 0 };
        let mut params = NoopParams;
        let mut services = NoopServices;
        receiver.receive(&mut recv_driver, &frame, 0, &mut params, &mut services).unwrap();
        assert_eq!(recv_driver.hooks, 1);
    }

    struct CountingPoll {
        polls: u32,
    }
    impl<D: Driver> ServiceHandler<D> for CountingPoll {
        fn on_request(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _args: &crate::service::ServiceRequestArgs) {}
        fn on_response(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _args: &crate::service::ServiceResponseArgs) {}
        fn on_poll(&mut self, _tx: &mut ServiceTx<D>, _service_code: u8, _timestamp: Timestamp) {
            self.polls += 1;
        }
    }

    #[test]
    fn update_runs_poll_only_once_the_interval_has_elapsed() {
        let mut inst = Instance::<2, 2, 2, 2, 4>::new(config()).unwrap();
        inst.service_register(8).unwrap();
        let mut params = NoopParams;
        let mut services = CountingPoll { polls: 0 };

        let mut driver = RecordingDriver { sent: HVec::new(), now: Timestamp(5_000), hooks: 0 };
        inst.update(&mut driver, None, &mut params, &mut services).unwrap();
        assert_eq!(services.polls, 0, "interval of 10_000us has not elapsed yet");

        driver.now = Timestamp(10_000);
        inst.update(&mut driver, None, &mut params, &mut services).unwrap();
        assert_eq!(services.polls, 1);

        // Immediately again: no time has passed since the last poll, so it doesn't re-fire.
        inst.update(&mut driver, None, &mut params, &mut services).unwrap();
        assert_eq!(services.polls, 1);

        driver.now = Timestamp(20_001);
        inst.update(&mut driver, None, &mut params, &mut services).unwrap();
        assert_eq!(services.polls, 2);
    }

    #[test]
    fn update_dispatches_a_frame_and_still_clocks_the_poll() {
        let mut publisher = Instance::<2, 2, 2, 2, 4>::new(config()).unwrap();
        publisher.param_advertise(1800, false).unwrap();
        let mut pub_driver = RecordingDriver { sent: HVec::new(), now: Timestamp(1), hooks: 0 };
        publisher.param_publish(&mut pub_driver, 1800, Value::UShort(7)).unwrap();
        let (_, frame) = pub_driver.sent[0];

        let mut receiver_cfg = config();
        receiver_cfg.node_id = 9;
        let mut receiver = Instance::<2, 2, 2, 2, 4>::new(receiver_cfg).unwrap();
        receiver.param_subscribe(1800, 1).unwrap();
        receiver.service_register(8).unwrap();

        let mut params = NoopParams;
        let mut services = CountingPoll { polls: 0 };
        let mut recv_driver = RecordingDriver { sent: HVec::new(), now: Timestamp(10_000), hooks: 0 };
        receiver.update(&mut recv_driver, Some((&frame, 0)), &mut params, &mut services).unwrap();

        assert_eq!(recv_driver.hooks, 1);
        assert_eq!(receiver.param_read(1800, 0).unwrap().message.data, Value::UShort(7));
        assert_eq!(services.polls, 1);
    }
}
