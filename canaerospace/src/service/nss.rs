//! Node Synchronization Service (NSS, service code 1): broadcast a `ULong` timestamp so
//! every node's idea of network time stays aligned.
//!
//! Grounded on `std_nodesync.c`. There is no response side and no pending-request
//! tracking at all: `publish` fires a broadcast request and forgets it, `on_request`
//! hands the timestamp straight to the embedder.

use crate::driver::Driver;
use crate::error::Result;
use crate::message::{Message, Value};
use crate::types::BROADCAST_NODE_ID;

use super::{ServiceRequestArgs, ServiceTx};

pub const SERVICE_CODE_NSS: u8 = 1;

/// Receives a synchronization broadcast's carried timestamp.
pub trait NssHandler {
    fn on_sync(&mut self, timestamp: u32);
}

/// Broadcast `timestamp` as a node-sync request. Grounded on `canasSrvNssPublish`: always
/// addressed to [`BROADCAST_NODE_ID`], `message_code` 0, data type `ULong`.
pub fn publish<D: Driver>(tx: &mut ServiceTx<D>, timestamp: u32) -> Result<()> {
    let msg = Message::new(BROADCAST_NODE_ID, SERVICE_CODE_NSS, 0, Value::ULong(timestamp));
    tx.send_request(&msg)
}

/// Dispatch an inbound NSS request. Grounded on `_request`: a wrong data type or nonzero
/// `message_code` is silently dropped rather than reported as an error, since an NSS
/// broadcast from a node running an incompatible dialect is expected traffic, not a fault.
pub fn on_request<H: NssHandler>(args: &ServiceRequestArgs, handler: &mut H) {
    let Value::ULong(timestamp) = args.message.data else {
        log::trace!("canaerospace: nss req wrong data type from node={}", args.message.node_id);
        return;
    };
    if args.message.message_code != 0 {
        log::trace!("canaerospace: nss req wrong message_code={}", args.message.message_code);
        return;
    }
    handler.on_sync(timestamp);
}
