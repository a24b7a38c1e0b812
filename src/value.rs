//! The dynamic value target.

use crate::datetime::{read_wire_time, Zone};
use crate::formatter::{LongType, MapType, RealType};
use crate::tags::*;
use crate::{marshal, Decode, Decoder, Encode, Encoder, Formatter, HproseError, Result};
use bigdecimal::BigDecimal;
use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use uuid::Uuid;

/// Any hprose value, for data whose shape is only known at run time.
///
/// How numbers and maps are represented depends on the decoder's [`LongType`],
/// [`RealType`] and [`MapType`].
///
/// A `Value` owns its children, so a back-reference is read again as a copy. A wire graph
/// that refers to a value from inside itself can not be represented and fails with
/// [`HproseError::RecursiveReference`]; decode such graphs into `Arc<Mutex<T>>` structs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    BigInt(BigInt),
    Float32(f32),
    Float64(f64),
    BigFloat(BigDecimal),
    String(String),
    Bytes(Bytes),
    /// A date/time terminated by `;`.
    DateTime(DateTime<Local>),
    /// A date/time terminated by `Z`.
    UtcDateTime(DateTime<Utc>),
    Uuid(Uuid),
    List(Vec<Value>),
    /// A map with string keys, in wire order.
    Map(IndexMap<String, Value>),
    /// A map with arbitrary keys, in wire order.
    AnyMap(Vec<(Value, Value)>),
    /// An object of a registered class.
    Object(Object),
    /// An error value sent by the peer.
    Error(String),
}

/// An object read into a [`Value`]: its class name and field values in wire order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub class: String,
    pub fields: IndexMap<String, Value>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as an `i64`, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Uint(value) => i64::try_from(*value).ok(),
            Value::BigInt(value) => i64::try_from(value).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(value) => u64::try_from(*value).ok(),
            Value::Uint(value) => Some(*value),
            Value::BigInt(value) => u64::try_from(value).ok(),
            _ => None,
        }
    }

    /// The value as an `f64`, for any numeric variant except big numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Uint(value) => Some(*value as f64),
            Value::Float32(value) => Some(*value as f64),
            Value::Float64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of a string-keyed map or the fields of an object.
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            Value::Object(object) => Some(&object.fields),
            _ => None,
        }
    }

    /// Looks up `key` in a string-keyed map or an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)
    }
}

impl Encode for Value {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Value::String(value) => enc.write_str(value),
            _ => self.write(enc),
        }
    }

    fn write(&self, enc: &mut Encoder) {
        match self {
            Value::Null => enc.write_nil(),
            Value::Bool(value) => enc.write_bool(*value),
            Value::Int(value) => enc.write_int(*value),
            Value::Uint(value) => enc.write_uint(*value),
            Value::BigInt(value) => value.encode(enc),
            Value::Float32(value) => enc.write_f32(*value),
            Value::Float64(value) => enc.write_f64(*value),
            Value::BigFloat(value) => value.encode(enc),
            Value::String(value) => enc.write_str_value(value),
            Value::Bytes(value) => enc.write_bytes(value),
            Value::DateTime(value) => value.encode(enc),
            Value::UtcDateTime(value) => value.encode(enc),
            Value::Uuid(value) => enc.write_uuid(value),
            Value::List(items) => items.encode(enc),
            Value::Map(map) => map.encode(enc),
            Value::AnyMap(entries) => {
                enc.write_map_head(entries.len());
                for (key, value) in entries {
                    key.encode(enc);
                    value.encode(enc);
                }
                enc.write_foot();
            }
            Value::Object(object) => {
                enc.write_object_head(&object.class, object.fields.keys().map(String::as_str));
                for value in object.fields.values() {
                    value.encode(enc);
                }
                enc.write_foot();
            }
            Value::Error(message) => enc.write_error(message),
        }
    }
}

impl Decode for Value {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(Value::Int((tag - b'0') as i64)),
            TAG_INTEGER => Ok(Value::Int(dec.read_i128()? as i64)),
            TAG_LONG => read_long(dec, tag),
            TAG_DOUBLE | TAG_NAN | TAG_INFINITY => read_real(dec, tag),
            TAG_NULL => Ok(Value::Null),
            TAG_EMPTY => Ok(Value::String(String::new())),
            TAG_TRUE => Ok(Value::Bool(true)),
            TAG_FALSE => Ok(Value::Bool(false)),
            TAG_UTF8_CHAR | TAG_STRING => dec.read_text(tag).map(Value::String),
            TAG_BYTES => dec.read_bytes().map(|bytes| Value::Bytes(bytes.into())),
            TAG_GUID => dec.read_uuid().map(Value::Uuid),
            TAG_DATE | TAG_TIME => read_time(dec, tag),
            TAG_LIST => dec.read_vec(tag).map(Value::List),
            TAG_MAP => read_map(dec, tag),
            TAG_OBJECT => read_object(dec),
            TAG_ERROR => dec.decode::<String>().map(Value::Error),
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

// The arms below stay out of line so nested lists and maps recurse through small frames.

/// Reads `l` following the decoder's [`LongType`].
#[inline(never)]
fn read_long(dec: &mut Decoder, tag: u8) -> Result<Value> {
    match dec.long_type() {
        LongType::Int | LongType::Int64 => Ok(Value::Int(dec.read_i128()? as i64)),
        LongType::Uint | LongType::Uint64 => Ok(Value::Uint(dec.read_i128()? as u64)),
        LongType::BigInt => BigInt::decode(dec, tag).map(Value::BigInt),
    }
}

/// Reads `d`, `N` or `I` following the decoder's [`RealType`].
#[inline(never)]
fn read_real(dec: &mut Decoder, tag: u8) -> Result<Value> {
    match dec.real_type() {
        RealType::Float32 => f32::decode(dec, tag).map(Value::Float32),
        RealType::Float64 => f64::decode(dec, tag).map(Value::Float64),
        RealType::BigFloat => match tag {
            TAG_NAN => Err(HproseError::Parse {
                text: "NaN".to_string(),
                target: "BigDecimal",
            }),
            TAG_INFINITY => dec.read_infinity().map(Value::Float64),
            _ => BigDecimal::decode(dec, tag).map(Value::BigFloat),
        },
    }
}

#[inline(never)]
fn read_time(dec: &mut Decoder, tag: u8) -> Result<Value> {
    let stamp = read_wire_time(dec, tag)?.stamp()?;
    match stamp.zone {
        Zone::Utc => stamp.to_utc().map(Value::UtcDateTime),
        _ => stamp.to_local().map(Value::DateTime),
    }
}

/// Reads `m` following the decoder's [`MapType`].
#[inline(never)]
fn read_map(dec: &mut Decoder, tag: u8) -> Result<Value> {
    match dec.map_type() {
        MapType::StringKeyed => {
            let mut map = IndexMap::new();
            dec.read_map(tag, "Value", |key: String, value: Value| {
                map.insert(key, value);
            })?;
            Ok(Value::Map(map))
        }
        MapType::AnyKeyed => {
            let mut entries = Vec::new();
            dec.read_map(tag, "Value", |key: Value, value: Value| {
                entries.push((key, value));
            })?;
            Ok(Value::AnyMap(entries))
        }
    }
}

/// Reads `o`: a registered class gives [`Value::Object`], any other class a string-keyed map.
#[inline(never)]
fn read_object(dec: &mut Decoder) -> Result<Value> {
    let class = dec.read_object_head()?;
    let names = dec.class_fields(class);
    let mut fields = IndexMap::with_capacity(names.len());
    dec.read_body(names.len(), 1, |dec, i| {
        let value = dec.decode::<Value>()?;
        fields.insert(names[i].clone(), value);
        Ok(())
    })?;
    match dec.class_meta(class) {
        Some(_) => Ok(Value::Object(Object {
            class: dec.class_name(class).to_string(),
            fields,
        })),
        None => Ok(Value::Map(fields)),
    }
}

/// Converts a value to `T` the way a decoder would read it from the wire.
///
/// ```rust
/// use hprose_encoder::{convert, Value};
///
/// let value = Value::String("42".to_string());
/// assert_eq!(convert::<i32>(&value).unwrap(), 42);
/// ```
pub fn convert<T: Decode>(value: &Value) -> Result<T> {
    Formatter::default().unmarshal_bytes(marshal(value)?)
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Uint,
    u16 => Uint,
    u32 => Uint,
    u64 => Uint,
    f32 => Float32,
    f64 => Float64,
    BigInt => BigInt,
    BigDecimal => BigFloat,
    String => String,
    &str => String,
    Bytes => Bytes,
    DateTime<Local> => DateTime,
    DateTime<Utc> => UtcDateTime,
    Uuid => Uuid,
    Vec<Value> => List,
    IndexMap<String, Value> => Map,
    Object => Object,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
