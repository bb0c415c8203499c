//! Parameter pub/sub registry: subscriptions with a per-redundancy-channel cache,
//! advertisements with interlacing, and the repeat-suppression rule applied to every
//! inbound parameter message.

use heapless::Vec as HVec;

use crate::error::{Error, Result};
use crate::message::{Message, Value};
use crate::router;
use crate::time::Timestamp;
use crate::types::RoutingGroup;

/// Signed mod-256 delta between two message codes: positive means `a` is newer than `b`.
///
/// Grounded on `core.c`'s `_diffU8`, which treats the 8-bit message code as a wrapping
/// counter so a receiver can tell a genuinely new message apart from a retransmission
/// even after the counter has wrapped around.
pub(crate) fn diff_u8(a: u8, b: u8) -> i32 {
    let d = a as i32 - b as i32;
    if d <= -128 {
        256 + d
    } else if d >= 127 {
        d - 256
    } else {
        d
    }
}

/// A subscription's cached view of one redundancy channel.
#[derive(Copy, Clone, Debug, Default)]
struct RedundancyCacheEntry {
    message: Message,
    timestamp: Timestamp,
}

struct ParamSubscription<const REDUND_CHANNELS: usize> {
    message_id: u16,
    redund_count: u8,
    cache: [RedundancyCacheEntry; REDUND_CHANNELS],
}

struct ParamAdvertisement {
    message_id: u16,
    message_code: u8,
    /// `None` sends on every interface; `Some(next)` cycles through interfaces in turn.
    interlacing_next_iface: Option<u8>,
}

/// Arguments delivered to a [`ParamHandler`] and returned by [`ParamRegistry::read`].
#[derive(Copy, Clone, Debug)]
pub struct ParamCallbackArgs {
    pub message: Message,
    pub message_id: u16,
    pub redund_channel_id: u8,
    pub timestamp: Timestamp,
}

/// A frame ready to be marshalled and sent for a just-published parameter.
#[derive(Copy, Clone, Debug)]
pub struct PublishFrame {
    /// `None` means send on every configured interface.
    pub iface: Option<u8>,
    pub message: Message,
}

/// Receives every non-repeated parameter update accepted by a subscription.
pub trait ParamHandler {
    fn on_param(&mut self, args: &ParamCallbackArgs);
}

/// The parameter pub/sub table, sized at compile time by the embedding [`crate::instance::Instance`].
///
/// Grounded on `core.c`'s `canasParamSubscribe`/`canasParamAdvertise` family and the
/// `CanasParamSubscription`/`CanasParamAdvertisement` structs in `canaerospace.h`. The
/// original's flexible array member sized per-subscription by `redund_chan_count` becomes
/// a fixed `[RedundancyCacheEntry; REDUND_CHANNELS]`, trading the original's per-instance
/// allocator for compile-time capacity.
pub struct ParamRegistry<const PARAM_SUBS: usize, const PARAM_ADVS: usize, const REDUND_CHANNELS: usize> {
    subs: HVec<ParamSubscription<REDUND_CHANNELS>, PARAM_SUBS>,
    advs: HVec<ParamAdvertisement, PARAM_ADVS>,
}

impl<const PARAM_SUBS: usize, const PARAM_ADVS: usize, const REDUND_CHANNELS: usize>
    ParamRegistry<PARAM_SUBS, PARAM_ADVS, REDUND_CHANNELS>
{
    pub fn new() -> Self {
        ParamRegistry { subs: HVec::new(), advs: HVec::new() }
    }

    pub fn subscribe(&mut self, msg_id: u16, redund_count: u8) -> Result<()> {
        if router::classify(msg_id) != Some(RoutingGroup::Parameter) {
            return Err(Error::BadMessageId);
        }
        if redund_count < 1 {
            return Err(Error::BadRedundChan);
        }
        if redund_count as usize > REDUND_CHANNELS {
            return Err(Error::NotEnoughMemory);
        }
        if self.subs.iter().any(|s| s.message_id == msg_id) {
            return Err(Error::EntryExists);
        }
        self.subs
            .push(ParamSubscription {
                message_id: msg_id,
                redund_count,
                cache: [RedundancyCacheEntry::default(); REDUND_CHANNELS],
            })
            .map_err(|_| Error::NotEnoughMemory)
    }

    pub fn unsubscribe(&mut self, msg_id: u16) -> Result<()> {
        let pos = self.subs.iter().position(|s| s.message_id == msg_id).ok_or(Error::NoSuchEntry)?;
        self.subs.swap_remove(pos);
        Ok(())
    }

    /// Last cached value for `msg_id` on `redund_chan`, or a zeroed entry if nothing has
    /// been received yet on that channel. Mirrors `canasParamRead`: a subscription with no
    /// traffic yet is not an error, only an empty cache.
    pub fn read(&self, msg_id: u16, redund_chan: u8) -> Result<ParamCallbackArgs> {
        let sub = self.subs.iter().find(|s| s.message_id == msg_id).ok_or(Error::NoSuchEntry)?;
        if redund_chan as usize >= sub.redund_count as usize {
            return Err(Error::BadRedundChan);
        }
        let entry = sub.cache[redund_chan as usize];
        Ok(ParamCallbackArgs {
            message: entry.message,
            message_id: msg_id,
            redund_channel_id: redund_chan,
            timestamp: entry.timestamp,
        })
    }

    pub fn advertise(&mut self, msg_id: u16, interlaced: bool, iface_count: u8) -> Result<()> {
        if router::classify(msg_id) != Some(RoutingGroup::Parameter) {
            return Err(Error::BadMessageId);
        }
        if self.advs.iter().any(|a| a.message_id == msg_id) {
            return Err(Error::EntryExists);
        }
        // Interlacing across interfaces is meaningless with fewer than two of them.
        let interlaced = interlaced && iface_count >= 2;
        self.advs
            .push(ParamAdvertisement {
                message_id: msg_id,
                message_code: 0,
                interlacing_next_iface: if interlaced { Some(0) } else { None },
            })
            .map_err(|_| Error::NotEnoughMemory)
    }

    pub fn unadvertise(&mut self, msg_id: u16) -> Result<()> {
        let pos = self.advs.iter().position(|a| a.message_id == msg_id).ok_or(Error::NoSuchEntry)?;
        self.advs.swap_remove(pos);
        Ok(())
    }

    /// Build the next outgoing frame for an advertised parameter, advancing its message
    /// code and, if interlaced, its round-robin interface cursor.
    pub fn prepare_publish(
        &mut self,
        msg_id: u16,
        node_id: u8,
        data: Value,
        service_code: u8,
        iface_count: u8,
    ) -> Result<PublishFrame> {
        if router::classify(msg_id) != Some(RoutingGroup::Parameter) {
            return Err(Error::BadMessageId);
        }
        let adv = self.advs.iter_mut().find(|a| a.message_id == msg_id).ok_or(Error::NoSuchEntry)?;

        let iface = adv.interlacing_next_iface.map(|next| {
            let advanced = next + 1;
            adv.interlacing_next_iface = Some(if advanced >= iface_count { 0 } else { advanced });
            next
        });

        let message_code = adv.message_code;
        adv.message_code = adv.message_code.wrapping_add(1);

        Ok(PublishFrame { iface, message: Message::new(node_id, service_code, message_code, data) })
    }

    /// Dispatch a just-parsed parameter message to its subscription, applying the
    /// repeat-suppression rule before invoking `handler`.
    ///
    /// Grounded on `core.c`'s `_handleReceivedParam`. A redundancy channel outside the
    /// subscription's declared count is silently dropped; a message arriving within
    /// `repeat_timeout_usec` of the last one on the same channel, with a non-advancing
    /// message code, is treated as a retransmission and suppressed.
    pub fn handle_received(
        &mut self,
        msg_id: u16,
        msg: &Message,
        redund_ch: u8,
        timestamp: Timestamp,
        repeat_timeout_usec: u64,
        handler: &mut impl ParamHandler,
    ) {
        let Some(sub) = self.subs.iter_mut().find(|s| s.message_id == msg_id) else {
            log::trace!("canaerospace: foreign param msgid={msg_id:03x}");
            return;
        };
        if redund_ch as usize >= sub.redund_count as usize {
            return;
        }
        let idx = redund_ch as usize;
        let prev = sub.cache[idx];
        if prev.timestamp != Timestamp::ZERO {
            let elapsed = timestamp.saturating_since(prev.timestamp);
            if elapsed < repeat_timeout_usec && diff_u8(msg.message_code, prev.message.message_code) <= 0 {
                log::trace!(
                    "canaerospace: param rep msgid={msg_id:03x} redund={redund_ch} msgcode={}",
                    msg.message_code
                );
                return;
            }
        }
        sub.cache[idx] = RedundancyCacheEntry { message: *msg, timestamp };
        handler.on_param(&ParamCallbackArgs {
            message: *msg,
            message_id: msg_id,
            redund_channel_id: redund_ch,
            timestamp,
        });
    }
}

impl<const PARAM_SUBS: usize, const PARAM_ADVS: usize, const REDUND_CHANNELS: usize> Default
    for ParamRegistry<PARAM_SUBS, PARAM_ADVS, REDUND_CHANNELS>
{
    fn default() -> Self {
        Self::new()
    }
}
