//! Error taxonomy shared by every public operation in the crate.
//!
//! Mirrors `CanasErrorCode` from the reference implementation one-to-one; unlike the
//! C enum this carries no `CANAS_ERR_OK` member because fallible operations return
//! `Result<T, Error>` instead of an in-band success code.

/// Semantic error taxonomy. Not every operation can return every variant; see the
/// module that returns it for the precise subset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A public-API argument violated its documented domain.
    Argument,
    /// A fixed-capacity collection is already full.
    NotEnoughMemory,
    /// The driver reported a hard failure (send returned < 0, or all interfaces failed).
    Driver,
    /// Lookup by key (message id, service code, node id) found nothing.
    NoSuchEntry,
    /// Attempted to create an entry that already exists (duplicate subscription/advertisement).
    EntryExists,
    /// Data type tag is reserved, or its length doesn't match what arrived on the wire.
    BadDataType,
    /// Message id does not fall into any routing group.
    BadMessageId,
    /// Node id is out of range, is the broadcast id where a unicast id was required, or is the
    /// local node id where a foreign id was required.
    BadNodeId,
    /// Redundancy channel id is out of range for the subscription/config it was checked against.
    BadRedundChan,
    /// Service channel id is out of range (neither the high nor the low range).
    BadServiceChan,
    /// CAN frame failed structural validation (DLC bounds, remote-request flag).
    BadCanFrame,
    /// A bounded resource (pending slots, sessions, broadcast quota) is exhausted.
    QuotaExceeded,
    /// Internal consistency fault; should not be reachable from valid inputs.
    Logic,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
