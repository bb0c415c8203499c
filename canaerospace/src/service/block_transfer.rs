//! Block Data Transfer: Download (DDS, master to slave) and Upload (DUS, slave to master)
//! session state machines, chunked four bytes per message.
//!
//! Grounded on `std_data_upload_download.c`. The session table is owned by the embedding
//! application rather than the core registries: an application holds a
//! [`BlockTransferSessions`] and drives it from its own [`ServiceHandler`] impl for service
//! codes [`SERVICE_CODE_DDS`] and [`SERVICE_CODE_DUS`].
//!
//! [`ServiceHandler`]: super::ServiceHandler

use heapless::Vec as HVec;

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::message::{Message, Value};
use crate::time::Timestamp;

use super::{ServiceRequestArgs, ServiceResponseArgs, ServiceTx};

pub const SERVICE_CODE_DDS: u8 = 2;
pub const SERVICE_CODE_DUS: u8 = 3;

/// Largest payload this implementation moves in one session (255 chunks of 4 bytes).
pub const MAX_PAYLOAD_LEN: usize = 1020;

const CHUNK_LEN: usize = 4;
const DEFAULT_TX_INTERVAL_USEC: u64 = 10_000;
const DEFAULT_SESSION_TIMEOUT_USEC: u64 = 10_000_000;
const SDRM_SURM_TIMEOUT_USEC: u64 = 100_000;
const DUS_SLAVE_INITIAL_DELAY_USEC: u64 = 10_000;

const XOFF: u32 = 0;
const XON: u32 = 1;
const DUS_OK: u32 = 0;
const ABORT_CODE: u32 = u32::MAX;

/// Outcome of a master-side session, delivered through [`Outcome`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Ok,
    Timeout,
    RemoteError(u32),
    ChecksumError,
    UnexpectedResponse,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SessionState {
    DdsMasterSdrmPending,
    DdsMasterTransmission,
    DdsMasterChecksum,
    DdsMasterXoff,
    DdsSlaveActive,
    DusMasterSurmPending,
    DusMasterReception,
    DusSlaveInitialDelay,
    DusSlaveTransmission,
    DusSlaveChecksum,
}

/// `peer` means the target node id for a master session, and the service channel the
/// original request arrived on for a slave session.
#[derive(Copy, Clone)]
struct Session<Tag: Copy> {
    state: SessionState,
    peer: u8,
    memid: u32,
    update_timestamp: Timestamp,
    next_chunk: u8,
    total_chunks: u8,
    datalen: u16,
    buffer: [u8; MAX_PAYLOAD_LEN],
    tag: Tag,
}

/// A just-completed master session, handed back from [`BlockTransferSessions::on_poll`]/
/// `on_response` for the application to dispatch to its own bookkeeping keyed by `tag`.
pub enum Outcome<Tag> {
    Dds { tag: Tag, node_id: u8, memid: u32, status: SessionStatus },
    Dus { tag: Tag, node_id: u8, memid: u32, status: SessionStatus, buffer: [u8; MAX_PAYLOAD_LEN], len: u16 },
}

/// What the application wants done with an inbound DDS download request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DdsSlaveDecision {
    Xon,
    Xoff,
    Abort,
}

/// What the application wants done with an inbound DUS upload request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DusSlaveDecision {
    Ok,
    Abort,
}

/// Slave-side application hooks. Defaults abort every request, so an application that only
/// runs as a master need not implement either method.
pub trait BlockTransferHandler {
    fn on_dds_download_request(&mut self, node_id: u8, memid: u32, datalen: u16) -> DdsSlaveDecision {
        let _ = (node_id, memid, datalen);
        DdsSlaveDecision::Abort
    }

    fn on_dds_download_done(&mut self, node_id: u8, memid: u32, data: &[u8]) {
        let _ = (node_id, memid, data);
    }

    fn on_dus_upload_request(&mut self, node_id: u8, memid: u32, expected_len: u16, buffer: &mut [u8; MAX_PAYLOAD_LEN]) -> (DusSlaveDecision, u16) {
        let _ = (node_id, memid, expected_len, buffer);
        (DusSlaveDecision::Abort, 0)
    }
}

/// Ceil(len/4), the number of 4-byte chunks covering `len` bytes.
///
/// Grounded on `_msgcountByDatalen`.
fn msgcount_by_datalen(len: usize) -> u8 {
    (len.div_ceil(CHUNK_LEN)) as u8
}

fn checksum_of(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

fn uchar_value_for_len(len: usize, bytes: [u8; 4]) -> Value {
    match len {
        1 => Value::UChar(bytes[0]),
        2 => Value::UChar2([bytes[0], bytes[1]]),
        3 => Value::UChar3([bytes[0], bytes[1], bytes[2]]),
        _ => Value::UChar4(bytes),
    }
}

/// Fixed-capacity table of in-flight block transfer sessions, both roles, both services.
///
/// `N` bounds the number of simultaneous sessions (master and slave share the table, as in
/// `std_data_upload_download.c`'s single session array). `Tag` is an opaque value the
/// application attaches to a master session at creation and gets back in its [`Outcome`],
/// the Rust substitute for the original's `callback` + `callback_arg` pair.
pub struct BlockTransferSessions<const N: usize, Tag: Copy + Default = u32> {
    slots: [Option<Session<Tag>>; N],
    tx_interval_usec: u64,
    session_timeout_usec: u64,
}

impl<const N: usize, Tag: Copy + Default> BlockTransferSessions<N, Tag> {
    pub fn new() -> Self {
        Self::with_timing(DEFAULT_TX_INTERVAL_USEC, DEFAULT_SESSION_TIMEOUT_USEC)
    }

    pub fn with_timing(tx_interval_usec: u64, session_timeout_usec: u64) -> Self {
        BlockTransferSessions { slots: [None; N], tx_interval_usec, session_timeout_usec }
    }

    fn allocate(&mut self) -> Result<usize> {
        self.slots.iter().position(Option::is_none).ok_or(Error::QuotaExceeded)
    }

    fn find_master(&self, dds: bool, node_id: u8) -> Option<usize> {
        self.slots.iter().position(|s| match s {
            Some(sess) if sess.peer == node_id => matches!(
                (dds, sess.state),
                (true, SessionState::DdsMasterSdrmPending)
                    | (true, SessionState::DdsMasterTransmission)
                    | (true, SessionState::DdsMasterChecksum)
                    | (true, SessionState::DdsMasterXoff)
                    | (false, SessionState::DusMasterSurmPending)
                    | (false, SessionState::DusMasterReception)
            ),
            _ => false,
        })
    }

    fn find_slave(&self, dds: bool, service_channel: u8) -> Option<usize> {
        self.slots.iter().position(|s| match s {
            Some(sess) if sess.peer == service_channel => matches!(
                (dds, sess.state),
                (true, SessionState::DdsSlaveActive)
                    | (false, SessionState::DusSlaveInitialDelay)
                    | (false, SessionState::DusSlaveTransmission)
                    | (false, SessionState::DusSlaveChecksum)
            ),
            _ => false,
        })
    }

    /// Start a download (master to `node_id`), sending the SDRM request immediately.
    pub fn dds_download_to<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, node_id: u8, memid: u32, data: &[u8], tag: Tag) -> Result<()> {
        if data.is_empty() || data.len() > MAX_PAYLOAD_LEN {
            return Err(Error::Argument);
        }
        if self.find_master(true, node_id).is_some() {
            return Err(Error::EntryExists);
        }
        let idx = self.allocate()?;
        let total_chunks = msgcount_by_datalen(data.len());
        let mut buffer = [0u8; MAX_PAYLOAD_LEN];
        buffer[..data.len()].copy_from_slice(data);
        self.slots[idx] = Some(Session {
            state: SessionState::DdsMasterSdrmPending,
            peer: node_id,
            memid,
            update_timestamp: now,
            next_chunk: 0,
            total_chunks,
            datalen: data.len() as u16,
            buffer,
            tag,
        });
        let msg = Message::new(node_id, SERVICE_CODE_DDS, total_chunks, Value::MemId(memid));
        if let Err(e) = tx.send_request(&msg) {
            self.slots[idx] = None;
            return Err(e);
        }
        Ok(())
    }

    /// Start an upload (from `node_id` to the master), sending the SURM request immediately.
    pub fn dus_upload_from<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, node_id: u8, memid: u32, expected_datalen: u16, tag: Tag) -> Result<()> {
        if expected_datalen == 0 || expected_datalen as usize > MAX_PAYLOAD_LEN {
            return Err(Error::Argument);
        }
        if self.find_master(false, node_id).is_some() {
            return Err(Error::EntryExists);
        }
        let idx = self.allocate()?;
        let total_chunks = msgcount_by_datalen(expected_datalen as usize);
        self.slots[idx] = Some(Session {
            state: SessionState::DusMasterSurmPending,
            peer: node_id,
            memid,
            update_timestamp: now,
            next_chunk: 0,
            total_chunks,
            datalen: 0,
            buffer: [0u8; MAX_PAYLOAD_LEN],
            tag,
        });
        let msg = Message::new(node_id, SERVICE_CODE_DUS, total_chunks, Value::MemId(memid));
        if let Err(e) = tx.send_request(&msg) {
            self.slots[idx] = None;
            return Err(e);
        }
        Ok(())
    }

    /// Feed a service response addressed to either DDS or DUS into the relevant session.
    pub fn on_response<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, args: &ServiceResponseArgs, outcomes: &mut HVec<Outcome<Tag>, N>) {
        match args.message.service_code {
            SERVICE_CODE_DDS => self.on_dds_response(tx, now, args, outcomes),
            SERVICE_CODE_DUS => self.on_dus_response(now, args, outcomes),
            _ => {}
        }
    }

    fn complete_dds(&mut self, idx: usize, status: SessionStatus, outcomes: &mut HVec<Outcome<Tag>, N>) {
        if let Some(session) = self.slots[idx].take() {
            log::debug!("canaerospace: dds session memid={:08x} done status={status:?}", session.memid);
            let _ = outcomes.push(Outcome::Dds { tag: session.tag, node_id: session.peer, memid: session.memid, status });
        }
    }

    fn complete_dus(&mut self, idx: usize, status: SessionStatus, outcomes: &mut HVec<Outcome<Tag>, N>) {
        if let Some(session) = self.slots[idx].take() {
            log::debug!("canaerospace: dus session memid={:08x} done status={status:?}", session.memid);
            let _ = outcomes.push(Outcome::Dus {
                tag: session.tag,
                node_id: session.peer,
                memid: session.memid,
                status,
                buffer: session.buffer,
                len: session.datalen,
            });
        }
    }

    fn on_dds_response<D: Driver>(&mut self, _tx: &mut ServiceTx<D>, now: Timestamp, args: &ServiceResponseArgs, outcomes: &mut HVec<Outcome<Tag>, N>) {
        let Some(idx) = self.find_master(true, args.message.node_id) else { return };
        let state = self.slots[idx].as_ref().unwrap().state;
        match state {
            SessionState::DdsMasterSdrmPending | SessionState::DdsMasterXoff => {
                let Value::ULong(code) = args.message.data else {
                    self.complete_dds(idx, SessionStatus::UnexpectedResponse, outcomes);
                    return;
                };
                if code == XON {
                    let session = self.slots[idx].as_mut().unwrap();
                    session.state = SessionState::DdsMasterTransmission;
                    session.update_timestamp = now;
                } else if code == XOFF {
                    let session = self.slots[idx].as_mut().unwrap();
                    session.state = SessionState::DdsMasterXoff;
                    session.update_timestamp = now;
                } else if state == SessionState::DdsMasterSdrmPending {
                    self.complete_dds(idx, SessionStatus::RemoteError(code), outcomes);
                }
                // XOFF resent while already in xoff, or any unrecognized code while in
                // xoff: stay put, bounded by the session timeout in `on_poll`.
            }
            SessionState::DdsMasterChecksum => {
                let Value::Chksum(received) = args.message.data else {
                    self.complete_dds(idx, SessionStatus::UnexpectedResponse, outcomes);
                    return;
                };
                let session = self.slots[idx].as_ref().unwrap();
                let expected = checksum_of(&session.buffer[..session.datalen as usize]);
                let status = if received == expected { SessionStatus::Ok } else { SessionStatus::ChecksumError };
                self.complete_dds(idx, status, outcomes);
            }
            _ => {}
        }
    }

    fn on_dus_response(&mut self, now: Timestamp, args: &ServiceResponseArgs, outcomes: &mut HVec<Outcome<Tag>, N>) {
        let Some(idx) = self.find_master(false, args.message.node_id) else { return };
        let state = self.slots[idx].as_ref().unwrap().state;
        match state {
            SessionState::DusMasterSurmPending => {
                let Value::ULong(code) = args.message.data else {
                    self.complete_dus(idx, SessionStatus::UnexpectedResponse, outcomes);
                    return;
                };
                if code == DUS_OK {
                    let session = self.slots[idx].as_mut().unwrap();
                    session.state = SessionState::DusMasterReception;
                    session.update_timestamp = now;
                } else {
                    self.complete_dus(idx, SessionStatus::RemoteError(code), outcomes);
                }
            }
            SessionState::DusMasterReception => {
                if let Value::Chksum(received) = args.message.data {
                    let session = self.slots[idx].as_ref().unwrap();
                    if args.message.message_code != session.next_chunk.wrapping_sub(1) {
                        self.complete_dus(idx, SessionStatus::UnexpectedResponse, outcomes);
                        return;
                    }
                    let expected = checksum_of(&session.buffer[..session.datalen as usize]);
                    let status = if received == expected { SessionStatus::Ok } else { SessionStatus::ChecksumError };
                    self.complete_dus(idx, status, outcomes);
                    return;
                }
                let len = args.message.data.len() as usize;
                let session = self.slots[idx].as_ref().unwrap();
                if args.message.message_code != session.next_chunk || !(1..=4).contains(&len) {
                    self.complete_dus(idx, SessionStatus::UnexpectedResponse, outcomes);
                    return;
                }
                let start = session.next_chunk as usize * CHUNK_LEN;
                if start + len > MAX_PAYLOAD_LEN {
                    self.complete_dus(idx, SessionStatus::UnexpectedResponse, outcomes);
                    return;
                }
                let (bytes, _) = crate::message::host_to_network(&args.message.data).unwrap_or(([0u8; 4], 0));
                let session = self.slots[idx].as_mut().unwrap();
                session.buffer[start..start + len].copy_from_slice(&bytes[..len]);
                session.datalen = (start + len) as u16;
                session.next_chunk += 1;
                session.update_timestamp = now;
            }
            _ => {}
        }
    }

    /// Feed a service request addressed to either DDS or DUS into the relevant session.
    pub fn on_request<D: Driver, H: BlockTransferHandler>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, args: &ServiceRequestArgs, handler: &mut H) {
        match args.message.service_code {
            SERVICE_CODE_DDS => self.on_dds_request(tx, now, args, handler),
            SERVICE_CODE_DUS => self.on_dus_request(tx, now, args, handler),
            _ => {}
        }
    }

    fn on_dds_request<D: Driver, H: BlockTransferHandler>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, args: &ServiceRequestArgs, handler: &mut H) {
        let msg = &args.message;
        if let Value::MemId(memid) = msg.data {
            if self.find_slave(true, args.service_channel).is_some() {
                let _ = tx.send_response(args.service_channel, &abort_msg(SERVICE_CODE_DDS));
                return;
            }
            let datalen = msg.message_code as u16 * CHUNK_LEN as u16;
            let decision = handler.on_dds_download_request(msg.node_id, memid, datalen);
            // XOFF from the application is silently promoted to XON: flow control here is
            // transport-level, not application-level.
            let decision = if decision == DdsSlaveDecision::Xoff { DdsSlaveDecision::Xon } else { decision };
            if decision == DdsSlaveDecision::Abort {
                let _ = tx.send_response(args.service_channel, &abort_msg(SERVICE_CODE_DDS));
                return;
            }
            let Ok(idx) = self.allocate() else {
                let _ = tx.send_response(args.service_channel, &abort_msg(SERVICE_CODE_DDS));
                return;
            };
            self.slots[idx] = Some(Session {
                state: SessionState::DdsSlaveActive,
                peer: args.service_channel,
                memid,
                update_timestamp: now,
                next_chunk: 0,
                total_chunks: msg.message_code,
                datalen: 0,
                buffer: [0u8; MAX_PAYLOAD_LEN],
                tag: Tag::default(),
            });
            let _ = tx.send_response(args.service_channel, &crate::message::Message::new(crate::types::BROADCAST_NODE_ID, SERVICE_CODE_DDS, 0, Value::ULong(XON)));
            return;
        }

        let Some(idx) = self.find_slave(true, args.service_channel) else { return };
        let session = self.slots[idx].as_ref().unwrap();
        let len = msg.data.len() as usize;
        if msg.message_code != session.next_chunk || !(1..=4).contains(&len) {
            log::debug!("canaerospace: dds slave dropping out-of-order chunk code={}", msg.message_code);
            return;
        }
        let (bytes, _) = crate::message::host_to_network(&msg.data).unwrap_or(([0u8; 4], 0));
        let session = self.slots[idx].as_mut().unwrap();
        let start = session.next_chunk as usize * CHUNK_LEN;
        session.buffer[start..start + len].copy_from_slice(&bytes[..len]);
        session.datalen = (start + len) as u16;
        session.next_chunk += 1;
        session.update_timestamp = now;

        if session.next_chunk >= session.total_chunks {
            let checksum = checksum_of(&session.buffer[..session.datalen as usize]);
            let (node_id, memid, datalen, buffer) = (msg.node_id, session.memid, session.datalen, session.buffer);
            self.slots[idx] = None;
            let _ = tx.send_response(args.service_channel, &crate::message::Message::new(crate::types::BROADCAST_NODE_ID, SERVICE_CODE_DDS, 0, Value::Chksum(checksum)));
            handler.on_dds_download_done(node_id, memid, &buffer[..datalen as usize]);
        }
    }

    fn on_dus_request<D: Driver, H: BlockTransferHandler>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, args: &ServiceRequestArgs, handler: &mut H) {
        let msg = &args.message;
        let Value::MemId(memid) = msg.data else { return };
        if self.find_slave(false, args.service_channel).is_some() {
            let _ = tx.send_response(args.service_channel, &abort_msg(SERVICE_CODE_DUS));
            return;
        }
        let expected_len = msg.message_code as u16 * CHUNK_LEN as u16;
        let mut buffer = [0u8; MAX_PAYLOAD_LEN];
        let (decision, actual_len) = handler.on_dus_upload_request(msg.node_id, memid, expected_len, &mut buffer);
        if decision == DusSlaveDecision::Abort {
            let _ = tx.send_response(args.service_channel, &abort_msg(SERVICE_CODE_DUS));
            return;
        }
        let Ok(idx) = self.allocate() else {
            let _ = tx.send_response(args.service_channel, &abort_msg(SERVICE_CODE_DUS));
            return;
        };
        let actual_len = (actual_len as usize).min(MAX_PAYLOAD_LEN) as u16;
        self.slots[idx] = Some(Session {
            state: SessionState::DusSlaveInitialDelay,
            peer: args.service_channel,
            memid,
            update_timestamp: now,
            next_chunk: 0,
            total_chunks: msgcount_by_datalen(actual_len as usize),
            datalen: actual_len,
            buffer,
            tag: Tag::default(),
        });
        let _ = tx.send_response(args.service_channel, &crate::message::Message::new(crate::types::BROADCAST_NODE_ID, SERVICE_CODE_DUS, 0, Value::ULong(DUS_OK)));
    }

    /// Advance timeouts and paced transmission for every session. Must be called once per
    /// orchestrator update (typically from a [`ServiceHandler::on_poll`] implementation
    /// dispatching on `service_code`).
    pub fn on_poll<D: Driver>(&mut self, tx: &mut ServiceTx<D>, now: Timestamp, outcomes: &mut HVec<Outcome<Tag>, N>) {
        for idx in 0..N {
            let Some(session) = self.slots[idx] else { continue };
            match session.state {
                SessionState::DdsMasterSdrmPending | SessionState::DusMasterSurmPending => {
                    if now.saturating_since(session.update_timestamp) > SDRM_SURM_TIMEOUT_USEC {
                        if session.state == SessionState::DdsMasterSdrmPending {
                            self.complete_dds(idx, SessionStatus::Timeout, outcomes);
                        } else {
                            self.complete_dus(idx, SessionStatus::Timeout, outcomes);
                        }
                    }
                }
                SessionState::DdsMasterXoff | SessionState::DdsMasterChecksum => {
                    if now.saturating_since(session.update_timestamp) > self.session_timeout_usec {
                        self.complete_dds(idx, SessionStatus::Timeout, outcomes);
                    }
                }
                SessionState::DusMasterReception => {
                    if now.saturating_since(session.update_timestamp) > self.session_timeout_usec {
                        self.complete_dus(idx, SessionStatus::Timeout, outcomes);
                    }
                }
                SessionState::DdsMasterTransmission => {
                    if now.saturating_since(session.update_timestamp) >= self.tx_interval_usec {
                        self.send_next_dds_chunk(tx, idx, now);
                    }
                }
                SessionState::DdsSlaveActive => {
                    if now.saturating_since(session.update_timestamp) > self.session_timeout_usec {
                        log::debug!("canaerospace: dds slave session timed out silently");
                        self.slots[idx] = None;
                    }
                }
                SessionState::DusSlaveInitialDelay => {
                    if now.saturating_since(session.update_timestamp) >= DUS_SLAVE_INITIAL_DELAY_USEC {
                        let s = self.slots[idx].as_mut().unwrap();
                        s.state = SessionState::DusSlaveTransmission;
                        s.update_timestamp = now;
                    }
                }
                SessionState::DusSlaveTransmission => {
                    if now.saturating_since(session.update_timestamp) >= self.tx_interval_usec {
                        self.send_next_dus_chunk(tx, idx, now);
                    }
                }
                SessionState::DusSlaveChecksum => {
                    if now.saturating_since(session.update_timestamp) > self.session_timeout_usec {
                        self.slots[idx] = None;
                    }
                }
            }
        }
    }

    fn send_next_dds_chunk<D: Driver>(&mut self, tx: &mut ServiceTx<D>, idx: usize, now: Timestamp) {
        let session = self.slots[idx].as_mut().unwrap();
        let chunk = session.next_chunk;
        let start = chunk as usize * CHUNK_LEN;
        let len = (session.datalen as usize - start).min(CHUNK_LEN);
        let mut bytes = [0u8; 4];
        bytes[..len].copy_from_slice(&session.buffer[start..start + len]);
        let value = uchar_value_for_len(len, bytes);
        let peer = session.peer;
        session.next_chunk += 1;
        session.update_timestamp = now;
        let is_last = session.next_chunk >= session.total_chunks;
        if is_last {
            session.state = SessionState::DdsMasterChecksum;
        }
        let msg = Message::new(peer, SERVICE_CODE_DDS, chunk, value);
        let _ = tx.send_request(&msg);
    }

    fn send_next_dus_chunk<D: Driver>(&mut self, tx: &mut ServiceTx<D>, idx: usize, now: Timestamp) {
        let session = self.slots[idx].as_mut().unwrap();
        let service_channel = session.peer;
        let chunk = session.next_chunk;
        let start = chunk as usize * CHUNK_LEN;
        let len = (session.datalen as usize - start).min(CHUNK_LEN);
        let mut bytes = [0u8; 4];
        bytes[..len].copy_from_slice(&session.buffer[start..start + len]);
        let value = uchar_value_for_len(len, bytes);
        session.next_chunk += 1;
        session.update_timestamp = now;
        let is_last = session.next_chunk >= session.total_chunks;

        let chunk_msg = Message::new(crate::types::BROADCAST_NODE_ID, SERVICE_CODE_DUS, chunk, value);
        let _ = tx.send_response(service_channel, &chunk_msg);

        if is_last {
            let checksum = checksum_of(&self.slots[idx].unwrap().buffer[..self.slots[idx].unwrap().datalen as usize]);
            let checksum_msg = Message::new(crate::types::BROADCAST_NODE_ID, SERVICE_CODE_DUS, chunk, Value::Chksum(checksum));
            let _ = tx.send_response(service_channel, &checksum_msg);
            self.slots[idx] = None;
        }
    }
}

impl<const N: usize, Tag: Copy + Default> Default for BlockTransferSessions<N, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

fn abort_msg(service_code: u8) -> Message {
    Message::new(crate::types::BROADCAST_NODE_ID, service_code, 0, Value::ULong(ABORT_CODE))
}
