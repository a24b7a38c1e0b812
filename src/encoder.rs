//! The encoder session.

use crate::number::{append_f32, append_f64};
use crate::refer::{EncoderRefer, Identity};
use crate::registry::{meta_of, StructEncode};
use crate::tags::*;
use crate::{Encode, HproseError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::any::TypeId;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq, Hash)]
enum ClassKey {
    Type(TypeId),
    /// Class of a dynamic object: name and field names.
    Shape(Box<str>),
}

/// Writes values in the hprose format into an in-memory buffer.
///
/// An encoder is one session: references and class definitions written earlier in the
/// session are reused by later values until [`Encoder::reset`].
///
/// ```rust
/// use hprose_encoder::Encoder;
///
/// let mut enc = Encoder::new(false);
/// enc.encode("我爱你").unwrap();
/// enc.encode("我爱你").unwrap();
/// assert_eq!(enc.bytes(), "s3\"我爱你\"r0;".as_bytes());
/// ```
#[derive(Debug)]
pub struct Encoder {
    buf: BytesMut,
    refer: Option<EncoderRefer>,
    classes: HashMap<ClassKey, usize>,
    error: Option<HproseError>,
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new(false)
    }
}

impl Encoder {
    /// Creates an encoder. In simple mode no references are tracked.
    pub fn new(simple: bool) -> Self {
        Encoder {
            buf: BytesMut::new(),
            refer: (!simple).then(EncoderRefer::default),
            classes: HashMap::new(),
            error: None,
        }
    }

    pub fn is_simple(&self) -> bool {
        self.refer.is_none()
    }

    pub fn set_simple(&mut self, simple: bool) {
        if simple {
            self.refer = None;
        } else if self.refer.is_none() {
            self.refer = Some(EncoderRefer::default());
        }
    }

    /// Appends `value` and returns the number of bytes written.
    ///
    /// Once an error has been carried, every call returns it; the bytes are still written,
    /// with `n` in place of the values that failed.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> Result<usize> {
        let start = self.buf.len();
        value.encode(self);
        self.written(start)
    }

    /// Appends `value` without looking it up in the reference table.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<usize> {
        let start = self.buf.len();
        value.write(self);
        self.written(start)
    }

    fn written(&self, start: usize) -> Result<usize> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.buf.len() - start),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Takes the encoded bytes, leaving the buffer empty. Reference tables are kept.
    pub fn take_bytes(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Writes the encoded bytes to `writer` and clears the buffer. Reference tables are kept,
    /// so one message can be written in several chunks.
    pub fn flush_to<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.buf)?;
        self.buf.clear();
        Ok(())
    }

    /// Clears the buffer, the reference and class tables and the carried error.
    pub fn reset(&mut self) {
        self.buf.clear();
        if let Some(refer) = self.refer.as_mut() {
            refer.reset();
        }
        self.classes.clear();
        self.error = None;
    }

    pub fn reset_buffer(&mut self) {
        self.buf.clear();
    }

    /// Resets the encoder before it goes back to a pool.
    pub(crate) fn free(&mut self) {
        self.reset();
        self.set_simple(false);
    }

    pub fn error(&self) -> Option<&HproseError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<HproseError> {
        self.error.take()
    }

    /// Records `err` unless an error is already carried.
    pub fn set_error(&mut self, err: HproseError) {
        if self.error.is_none() {
            debug!(error = %err, "encoder error");
            self.error = Some(err);
        }
    }

    /// Records an unsupported value and writes `n` in its place.
    pub fn unsupported(&mut self, type_name: &str) {
        self.set_error(HproseError::UnsupportedType(type_name.to_string()));
        self.write_nil();
    }

    // --- references ---

    /// Takes the next reference ordinal for the value about to be written.
    pub fn add_reference(&mut self) {
        if let Some(refer) = self.refer.as_mut() {
            refer.set();
        }
    }

    /// Reserves `n` ordinals that can never be referenced.
    pub fn add_reference_count(&mut self, n: usize) {
        if let Some(refer) = self.refer.as_mut() {
            refer.add_count(n);
        }
    }

    pub fn write_reference(&mut self, index: usize) {
        self.buf.put_u8(TAG_REF);
        self.put_uint(index as u64);
        self.buf.put_u8(TAG_SEMICOLON);
    }

    /// Writes a shared allocation: a back-reference when `id` has been written before,
    /// otherwise the value written by `f`, bound to `id`.
    pub(crate) fn write_shared(&mut self, id: Identity, lookup: bool, f: impl FnOnce(&mut Self)) {
        if let Some(refer) = self.refer.as_mut() {
            if lookup {
                if let Some(index) = refer.find_ptr(&id) {
                    self.write_reference(index);
                    return;
                }
            }
            refer.expect(id);
        }
        f(self);
        if let Some(refer) = self.refer.as_mut() {
            refer.clear_expected();
        }
    }

    // --- scalars ---

    pub fn write_nil(&mut self) {
        self.buf.put_u8(TAG_NULL);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(if value { TAG_TRUE } else { TAG_FALSE });
    }

    pub fn write_int(&mut self, value: i64) {
        if (0..=9).contains(&value) {
            self.buf.put_u8(b'0' + value as u8);
            return;
        }
        let tag = if i32::try_from(value).is_ok() {
            TAG_INTEGER
        } else {
            TAG_LONG
        };
        self.buf.put_u8(tag);
        self.buf.put_slice(value.to_string().as_bytes());
        self.buf.put_u8(TAG_SEMICOLON);
    }

    pub fn write_uint(&mut self, value: u64) {
        if value <= i32::MAX as u64 {
            self.write_int(value as i64);
            return;
        }
        self.buf.put_u8(TAG_LONG);
        self.put_uint(value);
        self.buf.put_u8(TAG_SEMICOLON);
    }

    /// Writes an integer of any size given as decimal text, always with the long tag.
    pub fn write_long_text(&mut self, digits: &str) {
        self.buf.put_u8(TAG_LONG);
        self.buf.put_slice(digits.as_bytes());
        self.buf.put_u8(TAG_SEMICOLON);
    }

    pub fn write_f64(&mut self, value: f64) {
        if value.is_nan() {
            self.buf.put_u8(TAG_NAN);
        } else if value.is_infinite() {
            self.buf.put_u8(TAG_INFINITY);
            self.buf
                .put_u8(if value > 0.0 { TAG_POS } else { TAG_NEG });
        } else {
            self.buf.put_u8(TAG_DOUBLE);
            append_f64(&mut self.buf, value);
            self.buf.put_u8(TAG_SEMICOLON);
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        if value.is_nan() || value.is_infinite() {
            self.write_f64(value as f64);
        } else {
            self.buf.put_u8(TAG_DOUBLE);
            append_f32(&mut self.buf, value);
            self.buf.put_u8(TAG_SEMICOLON);
        }
    }

    /// Writes a double given as decimal text.
    pub fn write_double_text(&mut self, text: &str) {
        self.buf.put_u8(TAG_DOUBLE);
        self.buf.put_slice(text.as_bytes());
        self.buf.put_u8(TAG_SEMICOLON);
    }

    // --- text ---

    /// Writes a string: `e`, `u<char>`, a back-reference to an equal string, or
    /// `s<len>"..."`.
    pub fn write_str(&mut self, value: &str) {
        self.put_text(value, true);
    }

    /// Writes a string without looking it up. It is still recorded.
    pub fn write_str_value(&mut self, value: &str) {
        self.put_text(value, false);
    }

    /// Writes `s<len>"..."` in a slot of its own; equal strings written later are not
    /// referenced to it.
    pub fn write_unlisted_str(&mut self, value: &str) {
        self.add_reference_count(1);
        self.put_string(value, utf16_len(value));
    }

    fn put_text(&mut self, value: &str, lookup: bool) {
        match utf16_len(value) {
            0 => self.buf.put_u8(TAG_EMPTY),
            1 => {
                self.buf.put_u8(TAG_UTF8_CHAR);
                self.buf.put_slice(value.as_bytes());
            }
            len => {
                if let Some(refer) = self.refer.as_mut() {
                    if lookup {
                        if let Some(index) = refer.find_str(value) {
                            self.write_reference(index);
                            return;
                        }
                    }
                    refer.set_str(value);
                }
                self.put_string(value, len);
            }
        }
    }

    fn put_string(&mut self, value: &str, len: usize) {
        self.buf.put_u8(TAG_STRING);
        if len > 0 {
            self.put_uint(len as u64);
        }
        self.buf.put_u8(TAG_QUOTE);
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(TAG_QUOTE);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.add_reference();
        self.buf.put_u8(TAG_BYTES);
        if !value.is_empty() {
            self.put_uint(value.len() as u64);
        }
        self.buf.put_u8(TAG_QUOTE);
        self.buf.put_slice(value);
        self.buf.put_u8(TAG_QUOTE);
    }

    pub fn write_uuid(&mut self, value: &Uuid) {
        self.add_reference();
        self.buf.put_u8(TAG_GUID);
        self.buf.put_u8(TAG_OPENBRACE);
        let mut text = Uuid::encode_buffer();
        self.buf
            .put_slice(value.hyphenated().encode_lower(&mut text).as_bytes());
        self.buf.put_u8(TAG_CLOSEBRACE);
    }

    /// Writes an application error, `E` followed by the message as a string.
    pub fn write_error(&mut self, message: &str) {
        self.add_reference_count(1);
        self.buf.put_u8(TAG_ERROR);
        self.put_string(message, utf16_len(message));
    }

    // --- structures ---

    /// Starts a list of `len` elements. Must be closed with [`Encoder::write_foot`].
    pub fn write_list_head(&mut self, len: usize) {
        self.write_head(TAG_LIST, len);
    }

    /// Starts a map of `len` entries. Must be closed with [`Encoder::write_foot`].
    pub fn write_map_head(&mut self, len: usize) {
        self.write_head(TAG_MAP, len);
    }

    fn write_head(&mut self, tag: u8, len: usize) {
        self.add_reference();
        self.buf.put_u8(tag);
        if len > 0 {
            self.put_uint(len as u64);
        }
        self.buf.put_u8(TAG_OPENBRACE);
    }

    pub fn write_foot(&mut self) {
        self.buf.put_u8(TAG_CLOSEBRACE);
    }

    /// Writes a derived struct as an object, preceded by its class definition the first
    /// time the type appears in this session.
    pub fn write_struct<T: StructEncode>(&mut self, value: &T) {
        let meta = match meta_of::<T>() {
            Ok(meta) => meta,
            Err(err) => {
                self.set_error(err);
                self.write_nil();
                return;
            }
        };
        let key = ClassKey::Type(TypeId::of::<T>());
        let class = match self.classes.get(&key) {
            Some(&class) => class,
            None => {
                let class = self.classes.len();
                trace!(class = %meta.name, index = class, "writing class definition");
                self.buf.put_slice(meta.header());
                self.add_reference_count(meta.fields.len());
                self.classes.insert(key, class);
                class
            }
        };
        self.add_reference();
        self.buf.put_u8(TAG_OBJECT);
        self.put_uint(class as u64);
        self.buf.put_u8(TAG_OPENBRACE);
        for field in &meta.fields {
            value.encode_field(field.index, self);
        }
        self.buf.put_u8(TAG_CLOSEBRACE);
    }

    /// Writes a derived struct as a map from field aliases to values.
    pub fn write_struct_map<T: StructEncode>(&mut self, value: &T) {
        let meta = match meta_of::<T>() {
            Ok(meta) => meta,
            Err(err) => {
                self.set_error(err);
                self.write_nil();
                return;
            }
        };
        self.write_map_head(meta.fields.len());
        for field in &meta.fields {
            self.write_str(&field.alias);
            value.encode_field(field.index, self);
        }
        self.write_foot();
    }

    /// Starts an object of a class that has no Rust type. The class definition is written
    /// the first time the same name and fields appear in this session. Field values follow
    /// and the object is closed with [`Encoder::write_foot`].
    pub fn write_object_head<'a>(
        &mut self,
        name: &str,
        fields: impl Iterator<Item = &'a str> + Clone,
    ) {
        let mut shape = String::from(name);
        let mut count = 0;
        for field in fields.clone() {
            shape.push('\0');
            shape.push_str(field);
            count += 1;
        }
        let key = ClassKey::Shape(shape.into_boxed_str());
        let class = match self.classes.get(&key) {
            Some(&class) => class,
            None => {
                let class = self.classes.len();
                trace!(class = name, index = class, "writing class definition");
                let header = class_block(name, fields);
                self.buf.put_slice(&header);
                self.add_reference_count(count);
                self.classes.insert(key, class);
                class
            }
        };
        self.add_reference();
        self.buf.put_u8(TAG_OBJECT);
        self.put_uint(class as u64);
        self.buf.put_u8(TAG_OPENBRACE);
    }

    pub(crate) fn put_raw(&mut self, raw: &[u8]) {
        self.buf.put_slice(raw);
    }

    fn put_uint(&mut self, value: u64) {
        self.buf.put_slice(value.to_string().as_bytes());
    }
}

/// Builds a class definition block, `c<len>"Name"<count>{s<len>"field"...}`.
pub(crate) fn class_block<'a>(name: &str, fields: impl Iterator<Item = &'a str>) -> BytesMut {
    let fields: Vec<&str> = fields.collect();
    let mut enc = Encoder::new(true);
    enc.buf.put_u8(TAG_CLASS);
    enc.put_uint(utf16_len(name) as u64);
    enc.buf.put_u8(TAG_QUOTE);
    enc.buf.put_slice(name.as_bytes());
    enc.buf.put_u8(TAG_QUOTE);
    if !fields.is_empty() {
        enc.put_uint(fields.len() as u64);
    }
    enc.buf.put_u8(TAG_OPENBRACE);
    for field in fields {
        enc.put_string(field, utf16_len(field));
    }
    enc.buf.put_u8(TAG_CLOSEBRACE);
    enc.buf
}

/// Length of `s` in UTF-16 code units.
pub(crate) fn utf16_len(s: &str) -> usize {
    if s.is_ascii() {
        s.len()
    } else {
        s.chars().map(char::len_utf16).sum()
    }
}
