//! # hprose-encoder
//!
//! An implementation of the hprose binary serialization format for Rust.
//!
//! - Self-describing, tag-prefixed encoding for primitives, strings, bytes, collections, maps,
//!   structs, big numbers, date/times and UUIDs
//! - Reference tracking: repeated strings, shared `Rc`/`Arc` values and cyclic graphs are written
//!   once and referenced afterwards (`r<n>;`); *simple mode* turns tracking off
//! - Target-directed decoding with the hprose coercion rules (a string can be read as a number,
//!   an object as a map, a list as a struct...)
//! - A dynamic [`Value`] target for data whose shape is not known at compile time
//! - Custom derive macros for structs
//!
//! ## Attribute Macros
//!
//! - `#[hprose(name = "Class")]` (struct): Class name written on the wire. Defaults to the Rust type name.
//! - `#[hprose(as_map)]` (struct): Encode as a string-keyed map instead of a class and an object.
//! - `#[hprose(rename = "alias")]`: Wire name of the field. Defaults to the field name with its first letter lowercased.
//! - `#[hprose(alias(json = "a", xml = "b"))]`: Per-namespace aliases, selected by [`register_with`].
//!   The `hprose` and `json` namespaces are always consulted first.
//! - `#[hprose(skip)]`: The field is neither written nor read; it keeps its `Default` on decode.
//! - `#[hprose(flatten)]`: Inline the fields of a nested struct into this one.
//!
//! ## Feature Flags
//!
//! - `rust_decimal`: `rust_decimal::Decimal`, written as a double.
//! - `ulid`: `ulid::Ulid`, written as a GUID.
//! - `serde_json`: `serde_json::Value`, as a dynamic value.
//! - `smol_str`: `smol_str::SmolStr`, written as a string.
//! - `ahash`: `ahash::AHashMap` and `ahash::AHashSet`.

mod buffer;
mod core;
mod datetime;
pub mod decoder;
pub mod encoder;
mod features;
pub mod formatter;
mod number;
pub mod pool;
mod refer;
pub mod registry;
pub mod tags;
pub mod value;

use bytes::Bytes;
use std::sync::Arc;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use formatter::{Formatter, LongType, MapType, RealType};
pub use hprose_encoder_derive::{Decode, Encode, Struct};
pub use pool::{
    acquire_bytes, acquire_decoder, acquire_encoder, release_bytes, release_decoder,
    release_encoder,
};
pub use registry::{
    lookup, meta_of, register, register_as, register_with, FieldDesc, FieldMeta, Struct,
    StructDecode, StructEncode, StructMeta,
};
pub use value::{convert, Object, Value};

/// Errors that can occur during encoding or decoding operations.
///
/// Errors are carried by the [`Encoder`] and [`Decoder`]: the first one is kept and reported
/// at the end of the session. See [`HproseError::is_recoverable`] for which errors leave the
/// input stream in a usable state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HproseError {
    /// The wire value has a shape that the target type can not hold.
    #[error("can not cast {from} to {to}")]
    Cast { from: &'static str, to: &'static str },
    /// A textual wire value could not be parsed as the target type.
    #[error("can not parse {text:?} as {target}")]
    Parse { text: String, target: &'static str },
    /// The value has no wire representation (encode side).
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// The grammar does not allow this tag here.
    #[error("unexpected tag {tag:#04x} while reading {expected}")]
    UnexpectedTag { tag: u8, expected: &'static str },
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("reference {0} is out of range")]
    UnknownReference(usize),
    #[error("class {0} is not defined")]
    UnknownClass(usize),
    /// A back-reference points into the value that is currently being read.
    #[error("reference {0} points into a value that is still being decoded")]
    RecursiveReference(usize),
    #[error("nesting depth exceeds {0}")]
    DepthLimit(usize),
    /// Back-references expanded into more data than the input can justify.
    #[error("back-references expand past {0} bytes")]
    ReplayLimit(usize),
    /// Two fields of a struct resolve to the same wire name.
    #[error("ambiguous fields with the same name or alias: {alias} in {class}")]
    AmbiguousField { class: String, alias: String },
    /// An error value (`E` tag) sent by the peer.
    #[error("{0}")]
    Remote(String),
    #[error(transparent)]
    Io(Arc<std::io::Error>),
}

impl HproseError {
    /// True when the offending wire value has been consumed completely, so the session can
    /// keep reading the values that follow it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HproseError::Cast { .. }
                | HproseError::Parse { .. }
                | HproseError::UnsupportedType(_)
                | HproseError::RecursiveReference(_)
                | HproseError::AmbiguousField { .. }
                | HproseError::Remote(_)
        )
    }
}

impl From<std::io::Error> for HproseError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            HproseError::UnexpectedEof
        } else {
            HproseError::Io(Arc::new(err))
        }
    }
}

/// The result type used throughout this crate for encode/decode operations.
pub type Result<T> = std::result::Result<T, HproseError>;

/// An application error carried on the wire by the `E` tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteError(pub String);

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RemoteError {}

impl From<RemoteError> for HproseError {
    fn from(err: RemoteError) -> Self {
        HproseError::Remote(err.0)
    }
}

/// Encodes a value with reference tracking on.
///
/// # Example
/// ```rust
/// use hprose_encoder::{marshal, unmarshal, Decode, Encode};
///
/// #[derive(Encode, Decode, PartialEq, Debug, Default)]
/// struct User {
///     id: u32,
///     name: String,
/// }
///
/// let value = User { id: 42, name: "hello".to_string() };
/// let bytes = marshal(&value).unwrap();
/// assert_eq!(&bytes[..], &b"c4\"User\"2{s2\"id\"s4\"name\"}o0{i42;s5\"hello\"}"[..]);
/// let decoded: User = unmarshal(&bytes).unwrap();
/// assert_eq!(value, decoded);
/// ```
pub fn marshal<T: Encode + ?Sized>(value: &T) -> Result<Bytes> {
    Formatter::default().marshal(value)
}

/// Decodes a value with the default [`Formatter`] options.
///
/// Returns the first error carried by the decoder, even when it was recovered from.
pub fn unmarshal<T: Decode>(data: &[u8]) -> Result<T> {
    Formatter::default().unmarshal(data)
}

/// Trait for types that can be written in the hprose format.
///
/// Encoding never fails immediately: a value that can not be written records an error on
/// the encoder and writes `n` in its place.
pub trait Encode {
    /// Appends the encoding of `self`, writing a back-reference when an identical shared
    /// value has already been written in this session.
    fn encode(&self, enc: &mut Encoder);

    /// Like [`Encode::encode`], but `self` is never looked up in the reference table.
    /// It is still recorded, so later occurrences can refer to it.
    fn write(&self, enc: &mut Encoder) {
        self.encode(enc)
    }

    #[doc(hidden)]
    fn encode_slice(items: &[Self], enc: &mut Encoder)
    where
        Self: Sized,
    {
        enc.write_list_head(items.len());
        for item in items {
            item.encode(enc);
        }
        enc.write_foot();
    }
}

/// Trait for types that can be read from the hprose format.
///
/// `decode` receives the tag byte that was just read. Class definitions (`c`) and
/// back-references (`r`) are handled by the [`Decoder`] before `decode` is called.
pub trait Decode: Sized {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self>;

    /// Resolves the back-reference `r<index>;`. The default reads the referenced value again.
    fn decode_reference(dec: &mut Decoder, index: usize) -> Result<Self> {
        dec.replay(index)
    }

    #[doc(hidden)]
    fn decode_vec(dec: &mut Decoder, tag: u8) -> Result<Vec<Self>> {
        dec.read_vec(tag)
    }

    /// A value that can be shared before it is decoded and filled in afterwards.
    #[doc(hidden)]
    fn placeholder() -> Option<Self> {
        None
    }

    #[doc(hidden)]
    fn fill(&self, _value: Self) {}
}
