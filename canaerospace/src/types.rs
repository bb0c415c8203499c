//! Wire-level constants and the standard data-type tag set.

use num_derive::FromPrimitive;

/// Node id reserved to mean "every node on the bus".
pub const BROADCAST_NODE_ID: u8 = 0;

/// Largest number of distinct node ids a single network may have.
pub const MAX_NODES: u16 = 255;

/// Upper bound on the number of redundant physical interfaces this crate tracks per send.
pub const IFACE_COUNT_MAX: u8 = 8;

/// Message id routing group, derived purely from the 11-bit message id.
///
/// Node-service ranges route to the service pipeline; every other range routes to the
/// parameter pipeline. `Unknown` ids are rejected by the router with [`crate::Error::BadMessageId`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RoutingGroup {
    Parameter,
    Service,
}

pub mod message_id_range {
    pub const EMERGENCY_EVENT: core::ops::RangeInclusive<u16> = 0..=127;
    pub const NODE_SERVICE_HIGH: core::ops::RangeInclusive<u16> = 128..=199;
    pub const USER_DEFINED_HIGH: core::ops::RangeInclusive<u16> = 200..=299;
    pub const NORMAL_OPERATION: core::ops::RangeInclusive<u16> = 300..=1799;
    pub const USER_DEFINED_LOW: core::ops::RangeInclusive<u16> = 1800..=1899;
    pub const DEBUG_SERVICE: core::ops::RangeInclusive<u16> = 1900..=1999;
    pub const NODE_SERVICE_LOW: core::ops::RangeInclusive<u16> = 2000..=2031;
}

pub mod service_channel_range {
    pub const HIGH: core::ops::RangeInclusive<u8> = 0..=35;
    pub const LOW: core::ops::RangeInclusive<u8> = 100..=115;
}

/// Standard data-type tags, in the declaration order of the original `CanasStandardDataTypeID`.
///
/// Discriminants below 32 are the standard set; `32..=99` is reserved (never valid on the
/// wire); `100..=255` is the user-defined range, carried with an explicit 0..=4 byte length.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum DataType {
    NoData = 0,
    Error,
    Float,
    Long,
    ULong,
    BLong,
    Short,
    UShort,
    BShort,
    Char,
    UChar,
    BChar,
    Short2,
    UShort2,
    BShort2,
    Char4,
    UChar4,
    BChar4,
    Char2,
    UChar2,
    BChar2,
    MemId,
    Chksum,
    AChar,
    AChar2,
    AChar4,
    Char3,
    UChar3,
    BChar3,
    AChar3,
    DoubleH,
    DoubleL,
}

impl DataType {
    /// Fixed wire length of a standard tag, in bytes.
    pub fn standard_len(self) -> u8 {
        match self {
            DataType::NoData => 0,
            DataType::Error | DataType::Float | DataType::Long | DataType::ULong | DataType::BLong => 4,
            DataType::Short | DataType::UShort | DataType::BShort => 2,
            DataType::Char | DataType::UChar | DataType::BChar => 1,
            DataType::Short2 | DataType::UShort2 | DataType::BShort2 => 4,
            DataType::Char4 | DataType::UChar4 | DataType::BChar4 => 4,
            DataType::Char2 | DataType::UChar2 | DataType::BChar2 => 2,
            DataType::MemId | DataType::Chksum => 4,
            DataType::AChar => 1,
            DataType::AChar2 => 2,
            DataType::AChar4 => 4,
            DataType::Char3 | DataType::UChar3 | DataType::BChar3 | DataType::AChar3 => 3,
            DataType::DoubleH | DataType::DoubleL => 4,
        }
    }
}

/// Lowest raw tag value reserved by the specification (`32..=99`), never valid on the wire.
pub const RESERVED_TAG_RANGE: core::ops::RangeInclusive<u8> = 32..=99;

/// Raw tag range the application may use for its own payload layouts.
pub const USER_DEFINED_TAG_RANGE: core::ops::RangeInclusive<u8> = 100..=255;
