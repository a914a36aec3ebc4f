use std::convert::TryInto;

use crate::error::{ClientError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheItem {
    pub flags: u16,
    pub data: Vec<u8>,
}

impl CacheItem {
    pub fn new(flags: u16, data: Vec<u8>) -> CacheItem {
        CacheItem { flags, data }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    String(String),
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Any integer variant that fits into an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I16(value) => Some(i64::from(value)),
            Value::U16(value) => Some(i64::from(value)),
            Value::I32(value) => Some(i64::from(value)),
            Value::U32(value) => Some(i64::from(value)),
            Value::I64(value) => Some(value),
            Value::U64(value) => value.try_into().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(value) => Some(f64::from(value)),
            Value::F64(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Value::Bytes(bytes) => bytes,
            Value::String(string) => string.into_bytes(),
            other => format!("{}", other).into_bytes(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::String(string) => write!(f, "{}", string),
            Value::Bool(value) => write!(f, "{}", value),
            Value::I16(value) => write!(f, "{}", value),
            Value::U16(value) => write!(f, "{}", value),
            Value::I32(value) => write!(f, "{}", value),
            Value::U32(value) => write!(f, "{}", value),
            Value::I64(value) => write!(f, "{}", value),
            Value::U64(value) => write!(f, "{}", value),
            Value::F32(value) => write!(f, "{}", value),
            Value::F64(value) => write!(f, "{}", value),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Value {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_value!(
    Vec<u8> => Bytes,
    String => String,
    bool => Bool,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64
);

impl<'a> From<&'a str> for Value {
    fn from(value: &'a str) -> Value {
        Value::String(value.to_string())
    }
}

impl<'a> From<&'a [u8]> for Value {
    fn from(value: &'a [u8]) -> Value {
        Value::Bytes(value.to_vec())
    }
}

pub trait Transcoder: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<CacheItem>;

    fn deserialize(&self, item: CacheItem) -> Result<Value>;
}

const TYPE_CODE_FLAG: u16 = 0x0100;
const RAW_DATA_FLAG: u16 = 0xfa52;

const TYPE_BOOLEAN: u16 = 3;
const TYPE_INT16: u16 = 7;
const TYPE_UINT16: u16 = 8;
const TYPE_INT32: u16 = 9;
const TYPE_UINT32: u16 = 10;
const TYPE_INT64: u16 = 11;
const TYPE_UINT64: u16 = 12;
const TYPE_SINGLE: u16 = 13;
const TYPE_DOUBLE: u16 = 14;
const TYPE_STRING: u16 = 18;

/// Primitive values are tagged with `type code | 0x0100` and written little-endian. Raw bytes
/// carry `0xfa52`, and items written by other clients with flags 0 come back as raw bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTranscoder;

macro_rules! decode_le {
    ($data:expr, $ty:ty, $name:expr) => {
        <$ty>::from_le_bytes($data.as_slice().try_into().map_err(|_| {
            ClientError::Transcoder(format!(
                "payload of {} bytes cannot hold a {}",
                $data.len(),
                $name
            ))
        })?)
    };
}

impl Transcoder for DefaultTranscoder {
    fn serialize(&self, value: &Value) -> Result<CacheItem> {
        let (type_code, data) = match value {
            Value::Bytes(bytes) => return Ok(CacheItem::new(RAW_DATA_FLAG, bytes.clone())),
            Value::String(string) => (TYPE_STRING, string.as_bytes().to_vec()),
            Value::Bool(value) => (TYPE_BOOLEAN, vec![*value as u8]),
            Value::I16(value) => (TYPE_INT16, value.to_le_bytes().to_vec()),
            Value::U16(value) => (TYPE_UINT16, value.to_le_bytes().to_vec()),
            Value::I32(value) => (TYPE_INT32, value.to_le_bytes().to_vec()),
            Value::U32(value) => (TYPE_UINT32, value.to_le_bytes().to_vec()),
            Value::I64(value) => (TYPE_INT64, value.to_le_bytes().to_vec()),
            Value::U64(value) => (TYPE_UINT64, value.to_le_bytes().to_vec()),
            Value::F32(value) => (TYPE_SINGLE, value.to_le_bytes().to_vec()),
            Value::F64(value) => (TYPE_DOUBLE, value.to_le_bytes().to_vec()),
        };

        Ok(CacheItem::new(type_code | TYPE_CODE_FLAG, data))
    }

    fn deserialize(&self, item: CacheItem) -> Result<Value> {
        if item.flags == 0 || item.flags == RAW_DATA_FLAG {
            return Ok(Value::Bytes(item.data));
        }
        if item.flags & TYPE_CODE_FLAG != TYPE_CODE_FLAG {
            return Err(ClientError::Transcoder(format!("unknown flags {:#06x}", item.flags)));
        }

        let data = item.data;
        let value = match item.flags & 0xff {
            TYPE_STRING => Value::String(String::from_utf8(data).map_err(|err| {
                ClientError::Transcoder(format!("string payload is not UTF-8: {}", err))
            })?),
            TYPE_BOOLEAN => Value::Bool(decode_le!(data, u8, "bool") != 0),
            TYPE_INT16 => Value::I16(decode_le!(data, i16, "i16")),
            TYPE_UINT16 => Value::U16(decode_le!(data, u16, "u16")),
            TYPE_INT32 => Value::I32(decode_le!(data, i32, "i32")),
            TYPE_UINT32 => Value::U32(decode_le!(data, u32, "u32")),
            TYPE_INT64 => Value::I64(decode_le!(data, i64, "i64")),
            TYPE_UINT64 => Value::U64(decode_le!(data, u64, "u64")),
            TYPE_SINGLE => Value::F32(decode_le!(data, f32, "f32")),
            TYPE_DOUBLE => Value::F64(decode_le!(data, f64, "f64")),
            code => {
                return Err(ClientError::Transcoder(format!("unknown type code {}", code)));
            }
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) -> CacheItem {
        let transcoder = DefaultTranscoder;
        let item = transcoder.serialize(&value).unwrap();
        assert_eq!(transcoder.deserialize(item.clone()).unwrap(), value);
        item
    }

    #[test]
    fn typed_flags() {
        assert_eq!(round_trip(Value::from("hello")).flags, 0x0112);
        assert_eq!(round_trip(Value::from(true)).flags, 0x0103);
        assert_eq!(round_trip(Value::from(-5i16)).flags, 0x0107);
        assert_eq!(round_trip(Value::from(42u64)).flags, 0x010c);
        assert_eq!(round_trip(Value::from(1.5f64)).flags, 0x010e);

        let item = round_trip(Value::from(0x0102_0304i32));
        assert_eq!(item.data, vec![4, 3, 2, 1]);
    }

    #[test]
    fn raw_bytes() {
        let item = round_trip(Value::from(&b"\x00\xffraw"[..]));
        assert_eq!(item.flags, 0xfa52);

        let foreign = DefaultTranscoder
            .deserialize(CacheItem::new(0, b"written elsewhere".to_vec()))
            .unwrap();
        assert_eq!(foreign.as_bytes(), Some(&b"written elsewhere"[..]));
    }

    #[test]
    fn reject_malformed() {
        let transcoder = DefaultTranscoder;

        assert!(transcoder.deserialize(CacheItem::new(0x0109, vec![1, 2])).is_err());
        assert!(transcoder.deserialize(CacheItem::new(0x0103, Vec::new())).is_err());
        assert!(transcoder.deserialize(CacheItem::new(0x0163, vec![1])).is_err());
        assert!(transcoder.deserialize(CacheItem::new(0x0004, vec![1])).is_err());
        assert!(transcoder.deserialize(CacheItem::new(0x0112, vec![0xff, 0xfe])).is_err());
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(7u32).as_i64(), Some(7));
        assert_eq!(Value::from(u64::max_value()).as_i64(), None);
        assert_eq!(Value::from(2.5f32).as_f64(), Some(2.5));
        assert_eq!(Value::from("text").as_str(), Some("text"));
        assert_eq!(Value::from(12i64).into_bytes(), b"12".to_vec());
    }
}
