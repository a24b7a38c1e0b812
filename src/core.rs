use crate::datetime::{read_datetime_text, read_unix_seconds};
use crate::tags::*;
use crate::{Decode, Decoder, Encode, Encoder, HproseError, RemoteError, Result};
use bytes::{Bytes, BytesMut};
use indexmap::{IndexMap, IndexSet};
use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError, RwLock, TryLockError};
use uuid::Uuid;

fn parse_error(text: String, target: &'static str) -> HproseError {
    HproseError::Parse { text, target }
}

// --- bool ---
impl Encode for bool {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bool(*self);
    }
}

/// Numbers are true when non-zero, strings are parsed (`1 t T TRUE true True` and their
/// false counterparts).
impl Decode for bool {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            b'0' | TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(false),
            b'1'..=b'9' | TAG_TRUE | TAG_NAN => Ok(true),
            TAG_INTEGER | TAG_LONG => Ok(dec.read_i128()? != 0),
            TAG_DOUBLE => Ok(dec.read_f64()? != 0.0),
            TAG_INFINITY => dec.read_infinity().map(|_| true),
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                match text.as_str() {
                    "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
                    "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
                    _ => Err(parse_error(text, "bool")),
                }
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

// --- integers ---
/// Reads any numeric wire value as an integer. Long values wrap, doubles are truncated,
/// date/times give Unix seconds.
fn read_integer(dec: &mut Decoder, tag: u8, target: &'static str) -> Result<i128> {
    match tag {
        tag if is_digit(tag) => Ok((tag - b'0') as i128),
        TAG_INTEGER | TAG_LONG => dec.read_i128(),
        TAG_DOUBLE => Ok(dec.read_f64()? as i128),
        TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(0),
        TAG_TRUE => Ok(1),
        TAG_DATE | TAG_TIME => read_unix_seconds(dec, tag).map(i128::from),
        _ => Err(dec.cast_error_named(tag, target)),
    }
}

macro_rules! impl_integer {
    ($($t:ty => $write:ident as $wide:ty),* $(,)?) => {
        $(
            impl Encode for $t {
                fn encode(&self, enc: &mut Encoder) {
                    enc.$write(*self as $wide);
                }
            }

            impl Decode for $t {
                fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
                    match tag {
                        TAG_UTF8_CHAR | TAG_STRING => {
                            let text = dec.read_text(tag)?;
                            text.parse::<$t>().map_err(|_| parse_error(text, stringify!($t)))
                        }
                        _ => read_integer(dec, tag, stringify!($t)).map(|value| value as $t),
                    }
                }
            }
        )*
    };
}

impl_integer!(
    i8 => write_int as i64,
    i16 => write_int as i64,
    i32 => write_int as i64,
    i64 => write_int as i64,
    isize => write_int as i64,
    u16 => write_uint as u64,
    u32 => write_uint as u64,
    u64 => write_uint as u64,
    usize => write_uint as u64,
);

// --- u8 ---
/// A `u8` is an integer; a sequence of `u8` (`Vec<u8>`, `[u8; N]`, `&[u8]`) is written as
/// bytes.
impl Encode for u8 {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uint(*self as u64);
    }

    fn encode_slice(items: &[u8], enc: &mut Encoder) {
        enc.write_bytes(items);
    }
}

impl Decode for u8 {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                text.parse::<u8>().map_err(|_| parse_error(text, "u8"))
            }
            _ => read_integer(dec, tag, "u8").map(|value| value as u8),
        }
    }

    /// Bytes, a list of integers, the UTF-8 of a string or the 16 bytes of a GUID.
    fn decode_vec(dec: &mut Decoder, tag: u8) -> Result<Vec<u8>> {
        match tag {
            TAG_NULL | TAG_EMPTY => Ok(Vec::new()),
            TAG_BYTES => dec.read_bytes(),
            TAG_UTF8_CHAR | TAG_STRING => dec.read_text(tag).map(String::into_bytes),
            TAG_GUID => dec.read_uuid().map(|uuid| uuid.as_bytes().to_vec()),
            TAG_LIST => dec.read_vec(tag),
            _ => Err(dec.cast_error::<Vec<u8>>(tag)),
        }
    }
}

// --- i128/u128 ---
impl Encode for i128 {
    fn encode(&self, enc: &mut Encoder) {
        match i64::try_from(*self) {
            Ok(value) => enc.write_int(value),
            Err(_) => enc.write_long_text(&self.to_string()),
        }
    }
}

impl Encode for u128 {
    fn encode(&self, enc: &mut Encoder) {
        match u64::try_from(*self) {
            Ok(value) => enc.write_uint(value),
            Err(_) => enc.write_long_text(&self.to_string()),
        }
    }
}

impl Decode for i128 {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                text.parse().map_err(|_| parse_error(text, "i128"))
            }
            _ => read_integer(dec, tag, "i128"),
        }
    }
}

impl Decode for u128 {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                text.parse().map_err(|_| parse_error(text, "u128"))
            }
            TAG_LONG => {
                let text = dec.read_number_text()?;
                match text.parse::<u128>() {
                    Ok(value) => Ok(value),
                    Err(_) => Ok(text.parse::<i128>().unwrap_or_default() as u128),
                }
            }
            _ => read_integer(dec, tag, "u128").map(|value| value as u128),
        }
    }
}

// --- floats ---
/// Reads any numeric wire value as a float.
fn read_float(dec: &mut Decoder, tag: u8, target: &'static str) -> Result<f64> {
    match tag {
        tag if is_digit(tag) => Ok((tag - b'0') as f64),
        TAG_INTEGER => Ok(dec.read_i128()? as f64),
        TAG_LONG | TAG_DOUBLE => dec.read_f64(),
        TAG_NAN => Ok(f64::NAN),
        TAG_INFINITY => dec.read_infinity(),
        TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(0.0),
        TAG_TRUE => Ok(1.0),
        _ => Err(dec.cast_error_named(tag, target)),
    }
}

impl Encode for f64 {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_f64(*self);
    }
}

impl Encode for f32 {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_f32(*self);
    }
}

impl Decode for f64 {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                text.parse().map_err(|_| parse_error(text, "f64"))
            }
            _ => read_float(dec, tag, "f64"),
        }
    }
}

/// Doubles are parsed straight to `f32` so that the shortest `f32` digits read back exactly.
impl Decode for f32 {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                text.parse().map_err(|_| parse_error(text, "f32"))
            }
            TAG_LONG | TAG_DOUBLE => {
                let text = dec.read_number_text()?;
                text.parse().map_err(|_| parse_error(text, "f32"))
            }
            _ => read_float(dec, tag, "f32").map(|value| value as f32),
        }
    }
}

// --- char ---
impl Encode for char {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_str(self.encode_utf8(&mut [0; 4]));
    }
}

impl Decode for char {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(char::from(tag)),
            TAG_NULL | TAG_EMPTY => Ok('\0'),
            TAG_UTF8_CHAR => dec.read_char(),
            TAG_STRING => {
                let text = dec.read_string()?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(parse_error(text, "char")),
                }
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

// --- strings ---
impl Encode for str {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_str(self);
    }

    fn write(&self, enc: &mut Encoder) {
        enc.write_str_value(self);
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_str(self);
    }

    fn write(&self, enc: &mut Encoder) {
        enc.write_str_value(self);
    }
}

impl Encode for Cow<'_, str> {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_str(self);
    }

    fn write(&self, enc: &mut Encoder) {
        enc.write_str_value(self);
    }
}

/// Every scalar has a textual form: numbers keep their wire digits, `t`/`f` become
/// `"true"`/`"false"`, GUIDs are hyphenated and date/times use RFC 3339.
impl Decode for String {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(char::from(tag).to_string()),
            TAG_NULL | TAG_EMPTY => Ok(String::new()),
            TAG_TRUE => Ok("true".to_string()),
            TAG_FALSE => Ok("false".to_string()),
            TAG_NAN => Ok("NaN".to_string()),
            TAG_INFINITY => {
                let value = dec.read_infinity()?;
                Ok(if value > 0.0 { "+Inf" } else { "-Inf" }.to_string())
            }
            TAG_INTEGER | TAG_LONG | TAG_DOUBLE => dec.read_number_text(),
            TAG_UTF8_CHAR | TAG_STRING => dec.read_text(tag),
            TAG_BYTES => {
                let bytes = dec.read_bytes()?;
                String::from_utf8(bytes).map_err(|_| HproseError::Cast {
                    from: "bytes",
                    to: "String",
                })
            }
            TAG_GUID => dec.read_uuid().map(|uuid| uuid.hyphenated().to_string()),
            TAG_DATE | TAG_TIME => read_datetime_text(dec, tag),
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

impl Decode for Box<str> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        String::decode(dec, tag).map(String::into_boxed_str)
    }
}

impl Decode for Cow<'static, str> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        String::decode(dec, tag).map(Cow::Owned)
    }
}

// --- unit ---
/// `()` is written as null and reads (and discards) any value.
impl Encode for () {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_nil();
    }
}

impl Decode for () {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        dec.skip_tagged(tag)
    }
}

// --- Option ---
/// `None` is written as null. A null reads as `None`; `Some` holds anything else, so an
/// empty list stays distinct from a missing one.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Some(value) => value.encode(enc),
            None => enc.write_nil(),
        }
    }

    fn write(&self, enc: &mut Encoder) {
        match self {
            Some(value) => value.write(enc),
            None => enc.write_nil(),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        if tag == TAG_NULL {
            return Ok(None);
        }
        T::decode(dec, tag).map(Some)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        T::decode_reference(dec, index).map(Some)
    }
}

// --- references and boxes ---
impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, enc: &mut Encoder) {
        (**self).encode(enc);
    }

    fn write(&self, enc: &mut Encoder) {
        (**self).write(enc);
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, enc: &mut Encoder) {
        (**self).encode(enc);
    }

    fn write(&self, enc: &mut Encoder) {
        (**self).write(enc);
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode(dec, tag).map(Box::new)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        T::decode_reference(dec, index).map(Box::new)
    }
}

// --- shared pointers ---
/// Shared values are written once per session; later occurrences of the same allocation
/// become back-references, which is also what makes cyclic graphs terminate.
impl<T: Encode + ?Sized + 'static> Encode for Rc<T> {
    fn encode(&self, enc: &mut Encoder) {
        let id = (Rc::as_ptr(self) as *const () as usize, TypeId::of::<T>());
        enc.write_shared(id, true, |enc| (**self).encode(enc));
    }

    fn write(&self, enc: &mut Encoder) {
        let id = (Rc::as_ptr(self) as *const () as usize, TypeId::of::<T>());
        enc.write_shared(id, false, |enc| (**self).encode(enc));
    }
}

/// Every occurrence decodes to its own allocation.
impl<T: Decode> Decode for Rc<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode(dec, tag).map(Rc::new)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        T::decode_reference(dec, index).map(Rc::new)
    }
}

impl<T: Encode + ?Sized + 'static> Encode for Arc<T> {
    fn encode(&self, enc: &mut Encoder) {
        let id = (Arc::as_ptr(self) as *const () as usize, TypeId::of::<T>());
        enc.write_shared(id, true, |enc| (**self).encode(enc));
    }

    fn write(&self, enc: &mut Encoder) {
        let id = (Arc::as_ptr(self) as *const () as usize, TypeId::of::<T>());
        enc.write_shared(id, false, |enc| (**self).encode(enc));
    }
}

/// A back-reference to a value that was decoded as `Arc<T>` yields the same allocation.
/// `Arc<Mutex<T>>` and `Arc<RwLock<T>>` are shared before their contents are read, so
/// references from inside the value (cycles) resolve to it as well.
impl<T: Decode + Send + Sync + 'static> Decode for Arc<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        let Some(index) = dec.next_ordinal() else {
            return T::decode(dec, tag).map(Arc::new);
        };
        if let Some(placeholder) = T::placeholder() {
            let shared = Arc::new(placeholder);
            dec.expect_shared(index, Box::new(shared.clone()));
            let value = T::decode(dec, tag);
            dec.clear_expected();
            T::fill(&shared, value?);
            return Ok(shared);
        }
        let shared = Arc::new(T::decode(dec, tag)?);
        dec.attach_shared(index, Box::new(shared.clone()));
        Ok(shared)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        match dec.shared::<Arc<T>>(index) {
            Some(shared) => Ok(shared),
            None => dec.replay(index),
        }
    }
}

// --- cells ---
/// A cell that is locked while it is being encoded (a cycle in simple mode) is an
/// unsupported value.
impl<T: Encode> Encode for Mutex<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self.try_lock() {
            Ok(guard) => guard.encode(enc),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().encode(enc),
            Err(TryLockError::WouldBlock) => enc.unsupported(type_name::<Self>()),
        }
    }
}

impl<T: Decode + Default> Decode for Mutex<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode(dec, tag).map(Mutex::new)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        T::decode_reference(dec, index).map(Mutex::new)
    }

    fn placeholder() -> Option<Self> {
        Some(Mutex::new(T::default()))
    }

    fn fill(&self, value: Self) {
        let value = value.into_inner().unwrap_or_else(PoisonError::into_inner);
        *self.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl<T: Encode> Encode for RwLock<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self.try_read() {
            Ok(guard) => guard.encode(enc),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().encode(enc),
            Err(TryLockError::WouldBlock) => enc.unsupported(type_name::<Self>()),
        }
    }
}

impl<T: Decode + Default> Decode for RwLock<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode(dec, tag).map(RwLock::new)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        T::decode_reference(dec, index).map(RwLock::new)
    }

    fn placeholder() -> Option<Self> {
        Some(RwLock::new(T::default()))
    }

    fn fill(&self, value: Self) {
        let value = value.into_inner().unwrap_or_else(PoisonError::into_inner);
        *self.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl<T: Encode> Encode for RefCell<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self.try_borrow() {
            Ok(value) => value.encode(enc),
            Err(_) => enc.unsupported(type_name::<Self>()),
        }
    }
}

impl<T: Decode> Decode for RefCell<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode(dec, tag).map(RefCell::new)
    }

    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        T::decode_reference(dec, index).map(RefCell::new)
    }
}

impl<T: Encode + Copy> Encode for Cell<T> {
    fn encode(&self, enc: &mut Encoder) {
        self.get().encode(enc);
    }
}

impl<T: Decode> Decode for Cell<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode(dec, tag).map(Cell::new)
    }
}

// --- sequences ---
impl<T: Encode> Encode for [T] {
    fn encode(&self, enc: &mut Encoder) {
        T::encode_slice(self, enc);
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, enc: &mut Encoder) {
        T::encode_slice(self, enc);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode_vec(dec, tag)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, enc: &mut Encoder) {
        T::encode_slice(self, enc);
    }
}

/// The list must have exactly `N` elements.
impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        let items = T::decode_vec(dec, tag)?;
        items.try_into().map_err(|_| HproseError::Cast {
            from: tag_name(tag),
            to: type_name::<Self>(),
        })
    }
}

fn encode_iter<'a, T: Encode + 'a>(
    enc: &mut Encoder,
    len: usize,
    items: impl Iterator<Item = &'a T>,
) {
    enc.write_list_head(len);
    for item in items {
        item.encode(enc);
    }
    enc.write_foot();
}

impl<T: Encode> Encode for VecDeque<T> {
    fn encode(&self, enc: &mut Encoder) {
        encode_iter(enc, self.len(), self.iter());
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        T::decode_vec(dec, tag).map(VecDeque::from)
    }
}

impl<T: Encode, S> Encode for HashSet<T, S> {
    fn encode(&self, enc: &mut Encoder) {
        encode_iter(enc, self.len(), self.iter());
    }
}

impl<T: Decode + Eq + Hash, S: BuildHasher + Default> Decode for HashSet<T, S> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        Ok(T::decode_vec(dec, tag)?.into_iter().collect())
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, enc: &mut Encoder) {
        encode_iter(enc, self.len(), self.iter());
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        Ok(T::decode_vec(dec, tag)?.into_iter().collect())
    }
}

impl<T: Encode, S> Encode for IndexSet<T, S> {
    fn encode(&self, enc: &mut Encoder) {
        encode_iter(enc, self.len(), self.iter());
    }
}

impl<T: Decode + Eq + Hash, S: BuildHasher + Default> Decode for IndexSet<T, S> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        Ok(T::decode_vec(dec, tag)?.into_iter().collect())
    }
}

impl Encode for Bytes {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(self);
    }
}

impl Decode for Bytes {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        u8::decode_vec(dec, tag).map(Bytes::from)
    }
}

impl Encode for BytesMut {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_bytes(self);
    }
}

impl Decode for BytesMut {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        u8::decode_vec(dec, tag).map(|bytes| BytesMut::from(&bytes[..]))
    }
}

// --- maps ---
/// Entries are written in the iteration order of the map.
fn encode_entries<'a, K: Encode + 'a, V: Encode + 'a>(
    enc: &mut Encoder,
    len: usize,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) {
    enc.write_map_head(len);
    for (key, value) in entries {
        key.encode(enc);
        value.encode(enc);
    }
    enc.write_foot();
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode(&self, enc: &mut Encoder) {
        encode_entries(enc, self.len(), self.iter());
    }
}

/// Reads a map, a list (keys are the indexes) or an object (keys are the field names).
impl<K: Decode + Eq + Hash, V: Decode, S: BuildHasher + Default> Decode for HashMap<K, V, S> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        let mut map = HashMap::with_hasher(S::default());
        dec.read_map(tag, type_name::<Self>(), |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, enc: &mut Encoder) {
        encode_entries(enc, self.len(), self.iter());
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        let mut map = BTreeMap::new();
        dec.read_map(tag, type_name::<Self>(), |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

impl<K: Encode, V: Encode, S> Encode for IndexMap<K, V, S> {
    fn encode(&self, enc: &mut Encoder) {
        encode_entries(enc, self.len(), self.iter());
    }
}

impl<K: Decode + Eq + Hash, V: Decode, S: BuildHasher + Default> Decode for IndexMap<K, V, S> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        let mut map = IndexMap::with_hasher(S::default());
        dec.read_map(tag, type_name::<Self>(), |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

// --- Tuple ---
/// Tuples are written as lists and read from lists of exactly their arity.
macro_rules! impl_tuple {
    ($($T:ident : $idx:tt),+) => {
        impl<$($T: Encode),+> Encode for ($($T,)+) {
            fn encode(&self, enc: &mut Encoder) {
                enc.write_list_head(count_args!($($T),+));
                $(
                    self.$idx.encode(enc);
                )+
                enc.write_foot();
            }
        }

        impl<$($T: Decode),+> Decode for ($($T,)+) {
            fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
                let arity = count_args!($($T),+);
                dec.read_tuple_head(tag, arity, type_name::<Self>())?;
                let mut slots: ($(Option<$T>,)+) = Default::default();
                dec.read_body(arity, 1, |dec, i| {
                    match i {
                        $(
                            $idx => slots.$idx = Some(dec.decode()?),
                        )+
                        _ => dec.skip_value()?,
                    }
                    Ok(())
                })?;
                let missing = || HproseError::Cast { from: "list", to: type_name::<Self>() };
                Ok(($(
                    slots.$idx.ok_or_else(missing)?,
                )+))
            }
        }
    };
}

macro_rules! count_args {
    () => { 0 };
    ($head:ident $(, $tail:ident)*) => { 1 + count_args!($($tail),*) };
}

impl_tuple!(T0: 0);
impl_tuple!(T0: 0, T1: 1);
impl_tuple!(T0: 0, T1: 1, T2: 2);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10);
impl_tuple!(T0: 0, T1: 1, T2: 2, T3: 3, T4: 4, T5: 5, T6: 6, T7: 7, T8: 8, T9: 9, T10: 10, T11: 11);

// --- Uuid ---
impl Encode for Uuid {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uuid(self);
    }
}

/// Reads a GUID, its text, or its 16 raw bytes. Null reads as the nil UUID.
impl Decode for Uuid {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_GUID => dec.read_uuid(),
            TAG_NULL | TAG_EMPTY => Ok(Uuid::nil()),
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                Uuid::try_parse(&text).map_err(|_| parse_error(text, "Uuid"))
            }
            TAG_BYTES => {
                let bytes = dec.read_bytes()?;
                Uuid::from_slice(&bytes)
                    .or_else(|_| Uuid::try_parse_ascii(&bytes))
                    .map_err(|_| parse_error(String::from_utf8_lossy(&bytes).into_owned(), "Uuid"))
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

// --- RemoteError ---
impl Encode for RemoteError {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_error(&self.0);
    }
}

impl Decode for RemoteError {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            TAG_ERROR => dec.decode::<String>().map(RemoteError),
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}
