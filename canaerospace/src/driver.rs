//! The embedder-supplied collaborator this crate drives: frame I/O, acceptance
//! filtering, the clock, and the passive diagnostic hook.
//!
//! There is no allocator here. The original driver contract pairs `malloc`/`free`
//! function pointers through every registry; this crate replaces that whole half of
//! the contract with compile-time capacity on [`crate::instance::Instance`], so nothing
//! is left for an allocator callback to do.

use crate::frame::CanFrame;
use crate::message::Message;
use crate::time::Timestamp;

/// A single hardware acceptance-filter rule, mirroring `CanasCanFilterConfig`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterConfig {
    pub id: u32,
    pub mask: u32,
}

/// Arguments passed to [`Driver::hook`] for every successfully parsed frame, regardless
/// of whether any subscription ultimately accepts it.
#[derive(Copy, Clone, Debug)]
pub struct HookArgs {
    pub timestamp: Timestamp,
    pub message: Message,
    pub message_id: u16,
    pub redund_channel_id: u8,
    pub iface: u8,
}

/// The CAN transceiver, clock, and diagnostic hook this crate drives through `update`.
///
/// `send`/`filter` return `Ok(false)` for a driver-level soft failure (dropped frame,
/// hardware queue full) and `Err(())` for a hard failure; [`crate::instance::Instance`]
/// folds both into [`crate::error::Error::Driver`] once every configured interface has
/// been tried.
pub trait Driver {
    /// Transmit `frame` on interface `iface`. `Ok(true)` means the frame was handed to
    /// the bus; `Ok(false)` means it was silently dropped; `Err` is a hard failure.
    fn send(&mut self, iface: u8, frame: &CanFrame) -> Result<bool, ()>;

    /// Program a hardware acceptance filter for `iface`. Drivers without acceptance
    /// filtering hardware can leave the default, which accepts every non-RTR frame.
    fn filter(&mut self, _iface: u8, _filters: &[FilterConfig]) -> Result<(), ()> {
        Ok(())
    }

    /// Current monotonic timestamp. Any epoch is fine as long as it never goes backwards
    /// within the lifetime of an [`crate::instance::Instance`].
    fn timestamp(&mut self) -> Timestamp;

    /// Passive observer called once per successfully parsed inbound frame, before
    /// dispatch to the parameter or service pipeline. Default: does nothing.
    fn hook(&mut self, _args: &HookArgs) {}
}
