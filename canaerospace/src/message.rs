//! Logical message payload and its host/network marshalling.

use core::fmt;

use crate::error::{Error, Result};
use crate::types::DataType;

/// The decoded content of a message's typed payload.
///
/// One variant per standard tag, carrying the payload already converted to host byte
/// order, plus `UserDefined` for the `100..=255` application-defined range (raw bytes,
/// explicit length, byte order left to the application). This stands in for the C union
/// `CanasDataContainer` plus its `{type, length}` header: the tag and the value are a
/// single sum type here instead of a tag byte paired with an untyped union.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    NoData,
    Error(u32),
    Float(f32),
    Long(i32),
    ULong(u32),
    BLong(u32),
    Short(i16),
    UShort(u16),
    BShort(u16),
    Char(i8),
    UChar(u8),
    BChar(u8),
    Short2([i16; 2]),
    UShort2([u16; 2]),
    BShort2([u16; 2]),
    Char4([i8; 4]),
    UChar4([u8; 4]),
    BChar4([u8; 4]),
    Char2([i8; 2]),
    UChar2([u8; 2]),
    BChar2([u8; 2]),
    MemId(u32),
    Chksum(u32),
    AChar(u8),
    AChar2([u8; 2]),
    AChar4([u8; 4]),
    Char3([i8; 3]),
    UChar3([u8; 3]),
    BChar3([u8; 3]),
    AChar3([u8; 3]),
    DoubleH(u32),
    DoubleL(u32),
    /// Raw application tag in `100..=255`, with its declared length (0..=4).
    UserDefined { tag: u8, len: u8, bytes: [u8; 4] },
}

impl Value {
    /// The wire tag byte for this value.
    pub fn tag(&self) -> u8 {
        match self {
            Value::NoData => DataType::NoData as u8,
            Value::Error(_) => DataType::Error as u8,
            Value::Float(_) => DataType::Float as u8,
            Value::Long(_) => DataType::Long as u8,
            Value::ULong(_) => DataType::ULong as u8,
            Value::BLong(_) => DataType::BLong as u8,
            Value::Short(_) => DataType::Short as u8,
            Value::UShort(_) => DataType::UShort as u8,
            Value::BShort(_) => DataType::BShort as u8,
            Value::Char(_) => DataType::Char as u8,
            Value::UChar(_) => DataType::UChar as u8,
            Value::BChar(_) => DataType::BChar as u8,
            Value::Short2(_) => DataType::Short2 as u8,
            Value::UShort2(_) => DataType::UShort2 as u8,
            Value::BShort2(_) => DataType::BShort2 as u8,
            Value::Char4(_) => DataType::Char4 as u8,
            Value::UChar4(_) => DataType::UChar4 as u8,
            Value::BChar4(_) => DataType::BChar4 as u8,
            Value::Char2(_) => DataType::Char2 as u8,
            Value::UChar2(_) => DataType::UChar2 as u8,
            Value::BChar2(_) => DataType::BChar2 as u8,
            Value::MemId(_) => DataType::MemId as u8,
            Value::Chksum(_) => DataType::Chksum as u8,
            Value::AChar(_) => DataType::AChar as u8,
            Value::AChar2(_) => DataType::AChar2 as u8,
            Value::AChar4(_) => DataType::AChar4 as u8,
            Value::Char3(_) => DataType::Char3 as u8,
            Value::UChar3(_) => DataType::UChar3 as u8,
            Value::BChar3(_) => DataType::BChar3 as u8,
            Value::AChar3(_) => DataType::AChar3 as u8,
            Value::DoubleH(_) => DataType::DoubleH as u8,
            Value::DoubleL(_) => DataType::DoubleL as u8,
            Value::UserDefined { tag, .. } => *tag,
        }
    }

    /// Declared payload length in bytes (0..=4).
    pub fn len(&self) -> u8 {
        match self {
            Value::UserDefined { len, .. } => *len,
            other => other_standard_len(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn other_standard_len(v: &Value) -> u8 {
    match v {
        Value::NoData => 0,
        Value::Char(_) | Value::UChar(_) | Value::BChar(_) | Value::AChar(_) => 1,
        Value::Short(_)
        | Value::UShort(_)
        | Value::BShort(_)
        | Value::Char2(_)
        | Value::UChar2(_)
        | Value::BChar2(_)
        | Value::AChar2(_) => 2,
        Value::Char3(_) | Value::UChar3(_) | Value::BChar3(_) | Value::AChar3(_) => 3,
        Value::UserDefined { .. } => unreachable!(),
        _ => 4,
    }
}

/// A parsed CANaerospace message: a 4-byte header plus the typed payload.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Message {
    pub data: Value,
    pub node_id: u8,
    pub service_code: u8,
    pub message_code: u8,
}

impl Message {
    pub fn new(node_id: u8, service_code: u8, message_code: u8, data: Value) -> Self {
        Message { data, node_id, service_code, message_code }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NoData
    }
}

impl Default for Message {
    fn default() -> Self {
        Message { data: Value::NoData, node_id: 0, service_code: 0, message_code: 0 }
    }
}

impl fmt::Display for Message {
    /// Bounded textual dump for diagnostics, grounded on `canasDumpMessage`: header fields
    /// followed by the payload's tag and value, with no caller-owned buffer: the value
    /// itself is the `Display` implementation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node={:02x} srv={:02x} code={:02x} type={:02x} data={:?}",
            self.node_id,
            self.service_code,
            self.message_code,
            self.data.tag(),
            self.data
        )
    }
}

/// Marshal `value` into up to 4 big-endian wire bytes.
///
/// Grounded on `marshal.c`'s `canasHostToNetwork`/`_marshal`: 16- and 32-bit scalar fields
/// are byte-swapped from host order; byte arrays (the `*2`/`*3`/`*4` families and the ASCII
/// fragments) pass through unswapped since they already have no intrinsic endianness.
pub fn host_to_network(value: &Value) -> Result<([u8; 4], u8)> {
    let mut out = [0u8; 4];
    let len = match *value {
        Value::NoData => 0,
        Value::Error(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::Float(v) => { out[..4].copy_from_slice(&v.to_bits().to_be_bytes()); 4 }
        Value::Long(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::ULong(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::BLong(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::Short(v) => { out[..2].copy_from_slice(&v.to_be_bytes()); 2 }
        Value::UShort(v) => { out[..2].copy_from_slice(&v.to_be_bytes()); 2 }
        Value::BShort(v) => { out[..2].copy_from_slice(&v.to_be_bytes()); 2 }
        Value::Char(v) => { out[0] = v as u8; 1 }
        Value::UChar(v) => { out[0] = v; 1 }
        Value::BChar(v) => { out[0] = v; 1 }
        Value::Short2(v) => {
            out[..2].copy_from_slice(&v[0].to_be_bytes());
            out[2..4].copy_from_slice(&v[1].to_be_bytes());
            4
        }
        Value::UShort2(v) => {
            out[..2].copy_from_slice(&v[0].to_be_bytes());
            out[2..4].copy_from_slice(&v[1].to_be_bytes());
            4
        }
        Value::BShort2(v) => {
            out[..2].copy_from_slice(&v[0].to_be_bytes());
            out[2..4].copy_from_slice(&v[1].to_be_bytes());
            4
        }
        Value::Char4(v) => { for i in 0..4 { out[i] = v[i] as u8; } 4 }
        Value::UChar4(v) => { out.copy_from_slice(&v); 4 }
        Value::BChar4(v) => { out.copy_from_slice(&v); 4 }
        Value::Char2(v) => { out[0] = v[0] as u8; out[1] = v[1] as u8; 2 }
        Value::UChar2(v) => { out[..2].copy_from_slice(&v); 2 }
        Value::BChar2(v) => { out[..2].copy_from_slice(&v); 2 }
        Value::MemId(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::Chksum(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::AChar(v) => { out[0] = v; 1 }
        Value::AChar2(v) => { out[..2].copy_from_slice(&v); 2 }
        Value::AChar4(v) => { out.copy_from_slice(&v); 4 }
        Value::Char3(v) => { for i in 0..3 { out[i] = v[i] as u8; } 3 }
        Value::UChar3(v) => { out[..3].copy_from_slice(&v); 3 }
        Value::BChar3(v) => { out[..3].copy_from_slice(&v); 3 }
        Value::AChar3(v) => { out[..3].copy_from_slice(&v); 3 }
        Value::DoubleH(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::DoubleL(v) => { out[..4].copy_from_slice(&v.to_be_bytes()); 4 }
        Value::UserDefined { len, bytes, .. } => {
            if len > 4 {
                return Err(Error::BadDataType);
            }
            out[..len as usize].copy_from_slice(&bytes[..len as usize]);
            len
        }
    };
    Ok((out, len))
}

/// Decode `datalen` wire bytes tagged `datatype` into a [`Value`].
///
/// Grounded on `marshal.c`'s `canasNetworkToHost`: for standard tags the declared length
/// must equal the tag's fixed length or the frame is rejected with `BadDataType`; the
/// reserved range `32..=99` is always rejected; user-defined tags (`100..=255`) accept any
/// length `0..=4` and carry it through untouched.
pub fn network_to_host(datatype: u8, data: &[u8]) -> Result<Value> {
    let datalen = data.len();
    if datalen > 4 {
        return Err(Error::BadDataType);
    }
    let mut buf = [0u8; 4];
    buf[..datalen].copy_from_slice(data);

    use num_traits::FromPrimitive;
    let Some(tag) = DataType::from_u8(datatype) else {
        if crate::types::USER_DEFINED_TAG_RANGE.contains(&datatype) {
            let mut bytes = [0u8; 4];
            bytes[..datalen].copy_from_slice(data);
            return Ok(Value::UserDefined { tag: datatype, len: datalen as u8, bytes });
        }
        return Err(Error::BadDataType);
    };

    if datalen != tag.standard_len() as usize {
        return Err(Error::BadDataType);
    }

    Ok(match tag {
        DataType::NoData => Value::NoData,
        DataType::Error => Value::Error(u32::from_be_bytes(buf)),
        DataType::Float => Value::Float(f32::from_bits(u32::from_be_bytes(buf))),
        DataType::Long => Value::Long(i32::from_be_bytes(buf)),
        DataType::ULong => Value::ULong(u32::from_be_bytes(buf)),
        DataType::BLong => Value::BLong(u32::from_be_bytes(buf)),
        DataType::Short => Value::Short(i16::from_be_bytes([buf[0], buf[1]])),
        DataType::UShort => Value::UShort(u16::from_be_bytes([buf[0], buf[1]])),
        DataType::BShort => Value::BShort(u16::from_be_bytes([buf[0], buf[1]])),
        DataType::Char => Value::Char(buf[0] as i8),
        DataType::UChar => Value::UChar(buf[0]),
        DataType::BChar => Value::BChar(buf[0]),
        DataType::Short2 => Value::Short2([
            i16::from_be_bytes([buf[0], buf[1]]),
            i16::from_be_bytes([buf[2], buf[3]]),
        ]),
        DataType::UShort2 => Value::UShort2([
            u16::from_be_bytes([buf[0], buf[1]]),
            u16::from_be_bytes([buf[2], buf[3]]),
        ]),
        DataType::BShort2 => Value::BShort2([
            u16::from_be_bytes([buf[0], buf[1]]),
            u16::from_be_bytes([buf[2], buf[3]]),
        ]),
        DataType::Char4 => Value::Char4([buf[0] as i8, buf[1] as i8, buf[2] as i8, buf[3] as i8]),
        DataType::UChar4 => Value::UChar4(buf),
        DataType::BChar4 => Value::BChar4(buf),
        DataType::Char2 => Value::Char2([buf[0] as i8, buf[1] as i8]),
        DataType::UChar2 => Value::UChar2([buf[0], buf[1]]),
        DataType::BChar2 => Value::BChar2([buf[0], buf[1]]),
        DataType::MemId => Value::MemId(u32::from_be_bytes(buf)),
        DataType::Chksum => Value::Chksum(u32::from_be_bytes(buf)),
        DataType::AChar => Value::AChar(buf[0]),
        DataType::AChar2 => Value::AChar2([buf[0], buf[1]]),
        DataType::AChar4 => Value::AChar4(buf),
        DataType::Char3 => Value::Char3([buf[0] as i8, buf[1] as i8, buf[2] as i8]),
        DataType::UChar3 => Value::UChar3([buf[0], buf[1], buf[2]]),
        DataType::BChar3 => Value::BChar3([buf[0], buf[1], buf[2]]),
        DataType::AChar3 => Value::AChar3([buf[0], buf[1], buf[2]]),
        DataType::DoubleH => Value::DoubleH(u32::from_be_bytes(buf)),
        DataType::DoubleL => Value::DoubleL(u32::from_be_bytes(buf)),
    })
}
