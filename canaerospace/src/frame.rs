//! CAN frame representation and the codec between it and a logical [`Message`].

use core::fmt;

use embedded_can::{ExtendedId, Frame as _, Id, StandardId};

use crate::error::{Error, Result};
use crate::message::{self, Message};

const REDUND_CHANNEL_SHIFT: u32 = 16;
const STDID_MASK: u32 = 0x7FF;

/// A CAN data or remote frame, carrying up to 8 payload bytes.
///
/// Implements [`embedded_can::Frame`] so it interoperates with any controller driver
/// built against that trait, following the same shape as the `mcp2517` driver's own
/// frame type: a fixed `[u8; 8]` backing array plus a separate length field rather than
/// a heap-allocated buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanFrame {
    id: Id,
    remote: bool,
    dlc: usize,
    data: [u8; 8],
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(CanFrame { id: id.into(), remote: false, dlc: data.len(), data: buf })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(CanFrame { id: id.into(), remote: true, dlc, data: [0u8; 8] })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc]
    }
}

impl fmt::Display for CanFrame {
    /// Bounded textual dump for diagnostics, grounded on `canasDumpCanFrame`: the
    /// identifier, extended/RTR flags, and payload bytes in hex, with no caller-owned
    /// buffer: the value itself is the `Display` implementation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Id::Standard(id) => write!(f, "id={:03x}", id.as_raw())?,
            Id::Extended(id) => write!(f, "id={:08x} ext", id.as_raw())?,
        }
        if self.remote {
            write!(f, " rtr")?;
        }
        write!(f, " dlc={} data=[", self.dlc)?;
        for (i, byte) in self.data().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        write!(f, "]")
    }
}

/// Parse a received [`CanFrame`] into `(message id, logical message, redundancy channel)`.
///
/// Grounded on `core.c`'s `_parseFrame`. Rejects a data length code outside `4..=8` and
/// any remote-transmission-request frame. The redundancy channel id is only present on
/// extended frames (bits 16..23 of the 29-bit identifier); channel 0 is always carried by
/// a standard (11-bit) identifier.
pub fn parse(frame: &CanFrame) -> Result<(u16, Message, u8)> {
    if !(4..=8).contains(&frame.dlc) {
        log::warn!("canaerospace: rejecting frame with dlc={}", frame.dlc);
        return Err(Error::BadCanFrame);
    }
    if frame.remote {
        log::warn!("canaerospace: rejecting RTR frame");
        return Err(Error::BadCanFrame);
    }

    let (msg_id, redund_chan) = match frame.id {
        Id::Standard(id) => (id.as_raw(), 0u8),
        Id::Extended(id) => {
            let raw = id.as_raw();
            let redund_raw = raw >> REDUND_CHANNEL_SHIFT;
            if redund_raw > 0xFF {
                log::warn!("canaerospace: rejecting frame with redund_chan={redund_raw}");
                return Err(Error::BadRedundChan);
            }
            ((raw & STDID_MASK) as u16, redund_raw as u8)
        }
    };

    let data = frame.data();
    let node_id = data[0];
    let datatype = data[1];
    let service_code = data[2];
    let message_code = data[3];
    let value = message::network_to_host(datatype, &data[4..frame.dlc]).map_err(|e| {
        log::warn!("canaerospace: rejecting frame with bad data type={datatype}");
        e
    })?;

    Ok((msg_id, Message { data: value, node_id, service_code, message_code }, redund_chan))
}

/// Serialize `msg` addressed at `msg_id` on redundancy channel `redund_chan` into a wire frame.
///
/// Grounded on `core.c`'s `_makeFrame`. Redundancy channel 0 always uses the standard
/// 11-bit identifier form; any other channel sets the extended-id flag and packs the
/// channel into bits 16..23.
pub fn make(msg_id: u16, msg: &Message, redund_chan: u8) -> Result<CanFrame> {
    let (payload, len) = message::host_to_network(&msg.data)?;

    let mut data = [0u8; 8];
    data[0] = msg.node_id;
    data[1] = msg.data.tag();
    data[2] = msg.service_code;
    data[3] = msg.message_code;
    data[4..4 + len as usize].copy_from_slice(&payload[..len as usize]);

    let id = if redund_chan != 0 {
        let raw = (msg_id as u32 & STDID_MASK) | ((redund_chan as u32) << REDUND_CHANNEL_SHIFT);
        Id::Extended(ExtendedId::new(raw).ok_or(Error::BadMessageId)?)
    } else {
        Id::Standard(StandardId::new(msg_id).ok_or(Error::BadMessageId)?)
    };

    embedded_can::Frame::new(id, &data[..4 + len as usize]).ok_or(Error::BadCanFrame)
}
