#[cfg(feature = "ahash")]
use ahash::{AHashMap, AHashSet};
#[cfg(feature = "rust_decimal")]
use rust_decimal::Decimal;
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;
#[cfg(feature = "ulid")]
use ulid::Ulid;

#[allow(unused_imports)]
use crate::tags::*;
#[allow(unused_imports)]
use crate::{Decode, Decoder, Encode, Encoder, HproseError, Result};

// --- AHashMap / AHashSet ---
#[cfg(feature = "ahash")]
impl<K: Encode, V: Encode> Encode for AHashMap<K, V> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_map_head(self.len());
        for (key, value) in self.iter() {
            key.encode(enc);
            value.encode(enc);
        }
        enc.write_foot();
    }
}

#[cfg(feature = "ahash")]
impl<K: Decode + Eq + std::hash::Hash, V: Decode> Decode for AHashMap<K, V> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        std::collections::HashMap::<K, V, ahash::RandomState>::decode(dec, tag).map(Into::into)
    }
}

#[cfg(feature = "ahash")]
impl<T: Encode> Encode for AHashSet<T> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_list_head(self.len());
        for item in self.iter() {
            item.encode(enc);
        }
        enc.write_foot();
    }
}

#[cfg(feature = "ahash")]
impl<T: Decode + Eq + std::hash::Hash> Decode for AHashSet<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        std::collections::HashSet::<T, ahash::RandomState>::decode(dec, tag).map(Into::into)
    }
}

// --- Decimal ---
/// Written as a double with all of its digits.
#[cfg(feature = "rust_decimal")]
impl Encode for Decimal {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_double_text(&self.to_string());
    }
}

#[cfg(feature = "rust_decimal")]
impl Decode for Decimal {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(Decimal::from(tag - b'0')),
            TAG_INTEGER | TAG_LONG | TAG_DOUBLE => {
                let text = dec.read_number_text()?;
                parse_decimal(text)
            }
            TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(Decimal::ZERO),
            TAG_TRUE => Ok(Decimal::ONE),
            TAG_NAN => Err(HproseError::Parse {
                text: "NaN".to_string(),
                target: "Decimal",
            }),
            TAG_INFINITY => {
                let value = dec.read_infinity()?;
                Err(HproseError::Parse {
                    text: value.to_string(),
                    target: "Decimal",
                })
            }
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                parse_decimal(text)
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

#[cfg(feature = "rust_decimal")]
fn parse_decimal(text: String) -> Result<Decimal> {
    use std::str::FromStr;
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| HproseError::Parse {
            text,
            target: "Decimal",
        })
}

// --- Ulid ---
/// Written as a GUID with the same 128 bits.
#[cfg(feature = "ulid")]
impl Encode for Ulid {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uuid(&uuid::Uuid::from_u128(self.0));
    }
}

/// Reads a GUID, or a string in either ULID or UUID text form.
#[cfg(feature = "ulid")]
impl Decode for Ulid {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                Ulid::from_string(&text)
                    .ok()
                    .or_else(|| uuid::Uuid::try_parse(&text).ok().map(|id| Ulid(id.as_u128())))
                    .ok_or(HproseError::Parse {
                        text,
                        target: "Ulid",
                    })
            }
            _ => uuid::Uuid::decode(dec, tag).map(|id| Ulid(id.as_u128())),
        }
    }
}

// --- SmolStr ---
#[cfg(feature = "smol_str")]
impl Encode for SmolStr {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_str(self);
    }

    fn write(&self, enc: &mut Encoder) {
        enc.write_str_value(self);
    }
}

#[cfg(feature = "smol_str")]
impl Decode for SmolStr {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        String::decode(dec, tag).map(SmolStr::from)
    }
}

// --- serde_json::Value ---
#[cfg(feature = "serde_json")]
mod json {
    use super::*;
    use crate::Value;
    use serde_json::{Map, Number};

    impl Encode for serde_json::Value {
        fn encode(&self, enc: &mut Encoder) {
            match self {
                serde_json::Value::Null => enc.write_nil(),
                serde_json::Value::Bool(value) => enc.write_bool(*value),
                serde_json::Value::Number(number) => {
                    if let Some(value) = number.as_i64() {
                        enc.write_int(value);
                    } else if let Some(value) = number.as_u64() {
                        enc.write_uint(value);
                    } else {
                        enc.write_f64(number.as_f64().unwrap_or(f64::NAN));
                    }
                }
                serde_json::Value::String(value) => enc.write_str(value),
                serde_json::Value::Array(items) => items.encode(enc),
                serde_json::Value::Object(map) => {
                    enc.write_map_head(map.len());
                    for (key, value) in map {
                        enc.write_str(key);
                        value.encode(enc);
                    }
                    enc.write_foot();
                }
            }
        }
    }

    /// Read through [`Value`]: big numbers that do not fit a JSON number, date/times and
    /// GUIDs become strings, bytes become an array of numbers.
    impl Decode for serde_json::Value {
        fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
            Value::decode(dec, tag).map(to_json)
        }
    }

    fn float(value: f64) -> serde_json::Value {
        Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }

    fn to_json(value: Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(value),
            Value::Int(value) => serde_json::Value::Number(value.into()),
            Value::Uint(value) => serde_json::Value::Number(value.into()),
            Value::BigInt(value) => match (i64::try_from(&value), u64::try_from(&value)) {
                (Ok(small), _) => serde_json::Value::Number(small.into()),
                (_, Ok(small)) => serde_json::Value::Number(small.into()),
                _ => serde_json::Value::String(value.to_string()),
            },
            Value::Float32(value) => float(value as f64),
            Value::Float64(value) => float(value),
            Value::BigFloat(value) => serde_json::Value::String(value.to_string()),
            Value::String(value) | Value::Error(value) => serde_json::Value::String(value),
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::Number((*b).into())).collect(),
            ),
            Value::DateTime(value) => serde_json::Value::String(value.to_rfc3339()),
            Value::UtcDateTime(value) => serde_json::Value::String(value.to_rfc3339()),
            Value::Uuid(value) => serde_json::Value::String(value.hyphenated().to_string()),
            Value::List(items) => serde_json::Value::Array(items.into_iter().map(to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(key, value)| (key, to_json(value))).collect(),
            ),
            Value::Object(object) => serde_json::Value::Object(
                object
                    .fields
                    .into_iter()
                    .map(|(key, value)| (key, to_json(value)))
                    .collect(),
            ),
            Value::AnyMap(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = match to_json(key) {
                        serde_json::Value::String(key) => key,
                        other => other.to_string(),
                    };
                    map.insert(key, to_json(value));
                }
                serde_json::Value::Object(map)
            }
        }
    }
}
