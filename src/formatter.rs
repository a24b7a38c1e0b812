//! Session options and the `marshal`/`unmarshal` entry points.

use crate::decoder::DEFAULT_MAX_DEPTH;
use crate::pool::{acquire_decoder, acquire_encoder, release_decoder, release_encoder};
use crate::{Decode, Decoder, Encode, Encoder, Result};
use bytes::Bytes;
use std::io::Read;

/// What a long integer (`l`) becomes when read into a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongType {
    #[default]
    Int,
    Uint,
    Int64,
    Uint64,
    BigInt,
}

/// What a double (`d`, `N`, `I`) becomes when read into a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealType {
    Float32,
    #[default]
    Float64,
    BigFloat,
}

/// What a map (`m`) becomes when read into a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapType {
    /// `Value::Map`, keys converted to strings, insertion ordered.
    #[default]
    StringKeyed,
    /// `Value::AnyMap`, keys kept as values.
    AnyKeyed,
}

/// Encoding and decoding options.
///
/// ```rust
/// use hprose_encoder::{Formatter, LongType, Value};
///
/// let formatter = Formatter::new().long_type(LongType::BigInt);
/// let value: Value = formatter.unmarshal(b"l123;").unwrap();
/// assert_eq!(value, Value::BigInt(123.into()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatter {
    simple: bool,
    long_type: LongType,
    real_type: RealType,
    map_type: MapType,
    max_depth: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter {
            simple: false,
            long_type: LongType::default(),
            real_type: RealType::default(),
            map_type: MapType::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns reference tracking off. Cyclic values can not be encoded in simple mode.
    pub fn simple(mut self, simple: bool) -> Self {
        self.simple = simple;
        self
    }

    pub fn long_type(mut self, long_type: LongType) -> Self {
        self.long_type = long_type;
        self
    }

    pub fn real_type(mut self, real_type: RealType) -> Self {
        self.real_type = real_type;
        self
    }

    pub fn map_type(mut self, map_type: MapType) -> Self {
        self.map_type = map_type;
        self
    }

    /// Maximum nesting depth accepted by the decoder, 128 by default.
    ///
    /// Decoding recurses once per level; raise this only on threads with a larger stack.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn is_simple(&self) -> bool {
        self.simple
    }

    pub fn marshal<T: Encode + ?Sized>(&self, value: &T) -> Result<Bytes> {
        let mut enc = acquire_encoder(self.simple);
        let result = enc.encode(value).map(|_| enc.take_bytes());
        release_encoder(enc);
        result
    }

    pub fn unmarshal<T: Decode>(&self, data: &[u8]) -> Result<T> {
        self.unmarshal_bytes(Bytes::copy_from_slice(data))
    }

    /// Decodes one value. Returns the first error carried by the decoder, even when decoding
    /// recovered from it.
    pub fn unmarshal_bytes<T: Decode>(&self, data: Bytes) -> Result<T> {
        let mut dec = acquire_decoder(data, self.simple);
        self.configure(&mut dec);
        let result = finish(&mut dec);
        release_decoder(dec);
        result
    }

    /// Decodes one value from a blocking reader.
    pub fn unmarshal_reader<T: Decode, R: Read + Send + 'static>(&self, reader: R) -> Result<T> {
        let mut dec = self.stream_decoder(reader);
        finish(&mut dec)
    }

    /// A new encoder with these options.
    pub fn encoder(&self) -> Encoder {
        Encoder::new(self.simple)
    }

    /// A new decoder over `data` with these options.
    pub fn decoder(&self, data: Bytes) -> Decoder {
        let mut dec = Decoder::new(data, self.simple);
        self.configure(&mut dec);
        dec
    }

    /// A new decoder reading from `reader` with these options.
    pub fn stream_decoder<R: Read + Send + 'static>(&self, reader: R) -> Decoder {
        let mut dec = Decoder::from_reader(reader, self.simple);
        self.configure(&mut dec);
        dec
    }

    fn configure(&self, dec: &mut Decoder) {
        dec.set_long_type(self.long_type);
        dec.set_real_type(self.real_type);
        dec.set_map_type(self.map_type);
        dec.set_max_depth(self.max_depth);
    }
}

fn finish<T: Decode>(dec: &mut Decoder) -> Result<T> {
    let value = dec.decode::<T>()?;
    match dec.take_error() {
        Some(err) => Err(err),
        None => Ok(value),
    }
}
