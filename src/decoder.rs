//! The decoder session.

use crate::buffer::ByteReader;
use crate::datetime::read_wire_time;
use crate::formatter::{LongType, MapType, RealType};
use crate::refer::DecoderRefer;
use crate::registry::{lookup, meta_of, StructDecode, StructMeta};
use crate::tags::*;
use crate::{Decode, Encoder, HproseError, Result};
use bytes::Bytes;
use std::any::{Any, TypeId};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

pub(crate) const DEFAULT_MAX_DEPTH: usize = 128;
const REPLAY_FACTOR: usize = 16;
const REPLAY_ALLOWANCE: usize = 64 * 1024;

/// A class definition read from the input.
struct ClassInfo {
    name: String,
    fields: Arc<[String]>,
    /// Registered metadata for `name`, if any.
    meta: Option<Arc<StructMeta>>,
    /// Wire field position to struct field index, for the last struct type read.
    mapping: Option<(TypeId, Arc<[Option<usize>]>)>,
}

/// Reads hprose values from a byte buffer or a blocking stream.
///
/// The target type drives decoding: the same wire value can be read as a number, a string
/// or a struct field, following the hprose coercion rules. A back-reference `r<n>;` is
/// resolved by reading the referenced value again into the requested type, except for
/// `Arc` targets, which get the very same allocation.
pub struct Decoder {
    reader: ByteReader,
    refer: Option<DecoderRefer>,
    classes: Vec<ClassInfo>,
    error: Option<HproseError>,
    long_type: LongType,
    real_type: RealType,
    map_type: MapType,
    max_depth: usize,
    depth: usize,
    /// Slots currently being read again, innermost last.
    replaying: Vec<usize>,
    replayed: usize,
}

impl Decoder {
    /// Creates a decoder over an in-memory buffer. In simple mode no references are tracked.
    pub fn new(data: Bytes, simple: bool) -> Self {
        Self::with_reader(ByteReader::from_bytes(data), simple)
    }

    /// Creates a decoder that reads `reader` on demand.
    pub fn from_reader<R: Read + Send + 'static>(reader: R, simple: bool) -> Self {
        Self::with_reader(ByteReader::from_reader(reader), simple)
    }

    fn with_reader(reader: ByteReader, simple: bool) -> Self {
        Decoder {
            reader,
            refer: (!simple).then(DecoderRefer::default),
            classes: Vec::new(),
            error: None,
            long_type: LongType::default(),
            real_type: RealType::default(),
            map_type: MapType::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
            replaying: Vec::new(),
            replayed: 0,
        }
    }

    pub fn is_simple(&self) -> bool {
        self.refer.is_none()
    }

    pub fn set_simple(&mut self, simple: bool) {
        if simple {
            self.refer = None;
        } else if self.refer.is_none() {
            self.refer = Some(DecoderRefer::default());
        }
    }

    pub fn long_type(&self) -> LongType {
        self.long_type
    }

    pub fn set_long_type(&mut self, long_type: LongType) {
        self.long_type = long_type;
    }

    pub fn real_type(&self) -> RealType {
        self.real_type
    }

    pub fn set_real_type(&mut self, real_type: RealType) {
        self.real_type = real_type;
    }

    pub fn map_type(&self) -> MapType {
        self.map_type
    }

    pub fn set_map_type(&mut self, map_type: MapType) {
        self.map_type = map_type;
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Clears the reference and class tables and the carried error. Input that has already
    /// been consumed is released.
    pub fn reset(&mut self) {
        if let Some(refer) = self.refer.as_mut() {
            refer.reset();
        }
        self.classes.clear();
        self.error = None;
        self.depth = 0;
        self.replaying.clear();
        self.replayed = 0;
        self.reader.compact();
    }

    /// Replaces the input and resets the session.
    pub fn reset_bytes(&mut self, data: Bytes) {
        self.reader.reset(data);
        self.reset();
    }

    /// Resets the decoder before it goes back to a pool.
    pub(crate) fn free(&mut self) {
        self.reset_bytes(Bytes::new());
        self.set_simple(false);
        self.long_type = LongType::default();
        self.real_type = RealType::default();
        self.map_type = MapType::default();
        self.max_depth = DEFAULT_MAX_DEPTH;
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
            debug!(error = %err, position = self.reader.position(), "decoder error");
            self.error = Some(err);
        }
    }

    /// Reads the next value as `T`.
    pub fn decode<T: Decode>(&mut self) -> Result<T> {
        let tag = self.next_tag()?;
        self.decode_tagged(tag)
    }

    /// Reads a value as `T` whose tag has already been read.
    pub fn decode_tagged<T: Decode>(&mut self, tag: u8) -> Result<T> {
        let result = self.dispatch::<T>(tag);
        if let Err(err) = &result {
            self.set_error(err.clone());
        }
        result
    }

    fn dispatch<T: Decode>(&mut self, mut tag: u8) -> Result<T> {
        while tag == TAG_CLASS {
            self.read_class()?;
            tag = self.next_tag()?;
        }
        self.enter()?;
        let result = if tag == TAG_REF {
            self.read_reference_index()
                .and_then(|index| T::decode_reference(self, index))
        } else {
            T::decode(self, tag)
        };
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(HproseError::DepthLimit(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    // --- references ---

    /// Records the value whose tag was just read as the next reference ordinal.
    pub fn add_reference(&mut self) {
        if !self.replaying.is_empty() {
            return;
        }
        let start = self.reader.position().saturating_sub(1);
        if let Some(refer) = self.refer.as_mut() {
            refer.add(start);
        }
    }

    /// Reads the value of slot `index` again as `T`.
    ///
    /// Reading a slot from inside itself fails with `RecursiveReference`.
    pub fn replay<T: Decode>(&mut self, index: usize) -> Result<T> {
        let start = self
            .refer
            .as_ref()
            .and_then(|refer| refer.get(index))
            .map(|slot| slot.start)
            .ok_or(HproseError::UnknownReference(index))?;
        if self.replaying.contains(&index) {
            return Err(HproseError::RecursiveReference(index));
        }
        let limit = self.reader.consumed_len() * REPLAY_FACTOR + REPLAY_ALLOWANCE;
        if self.replayed > limit {
            return Err(HproseError::ReplayLimit(limit));
        }
        let resume = self.reader.position();
        self.reader.seek(start);
        self.replaying.push(index);
        let result = match self.next_tag() {
            Ok(tag) => self.decode_tagged::<T>(tag),
            Err(err) => Err(err),
        };
        self.replaying.pop();
        self.replayed += self.reader.position().saturating_sub(start);
        self.reader.seek(resume);
        result
    }

    fn read_reference_index(&mut self) -> Result<usize> {
        let digits = self.reader.read_until(TAG_SEMICOLON)?;
        parse_count(digits, "reference")
    }

    /// Ordinal the next recorded value will get, when references are being recorded.
    pub(crate) fn next_ordinal(&self) -> Option<usize> {
        if !self.replaying.is_empty() {
            return None;
        }
        self.refer.as_ref().map(DecoderRefer::len)
    }

    pub(crate) fn shared<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.refer.as_ref()?.shared::<T>(index)
    }

    pub(crate) fn expect_shared(&mut self, index: usize, handle: Box<dyn Any + Send>) {
        if let Some(refer) = self.refer.as_mut() {
            refer.expect(index, handle);
        }
    }

    pub(crate) fn clear_expected(&mut self) {
        if let Some(refer) = self.refer.as_mut() {
            refer.clear_expected();
        }
    }

    pub(crate) fn attach_shared(&mut self, index: usize, handle: Box<dyn Any + Send>) {
        if let Some(refer) = self.refer.as_mut() {
            refer.attach(index, handle);
        }
    }

    // --- errors ---

    /// Skips the value of `tag` and returns the cast error for `T`.
    pub fn cast_error<T: ?Sized>(&mut self, tag: u8) -> HproseError {
        self.cast_error_named(tag, std::any::type_name::<T>())
    }

    pub fn cast_error_named(&mut self, tag: u8, to: &'static str) -> HproseError {
        match self.skip_tagged(tag) {
            Ok(()) => HproseError::Cast {
                from: tag_name(tag),
                to,
            },
            Err(err) => err,
        }
    }

    /// Records a recoverable error and continues, or returns a fatal one.
    ///
    /// While a back-reference is being read again every error is returned, so that the
    /// reference as a whole fails and the position can be restored.
    pub fn recover(&mut self, err: HproseError) -> Result<()> {
        if self.can_recover(&err) {
            self.set_error(err);
            Ok(())
        } else {
            Err(err)
        }
    }

    fn can_recover(&self, err: &HproseError) -> bool {
        err.is_recoverable() && self.replaying.is_empty()
    }

    // --- raw input ---

    pub fn next_tag(&mut self) -> Result<u8> {
        self.reader.next()
    }

    pub(crate) fn peek_byte(&mut self) -> Result<Option<u8>> {
        self.reader.peek()
    }

    /// Reads `n` ASCII digits as a number.
    pub(crate) fn read_digits(&mut self, n: usize) -> Result<u32> {
        let digits = self.reader.read_exact(n)?;
        let mut value = 0u32;
        for &digit in digits {
            if !digit.is_ascii_digit() {
                return Err(HproseError::UnexpectedTag {
                    tag: digit,
                    expected: "date/time digit",
                });
            }
            value = value * 10 + (digit - b'0') as u32;
        }
        Ok(value)
    }

    pub fn expect_byte(&mut self, byte: u8, expected: &'static str) -> Result<()> {
        let tag = self.reader.next()?;
        if tag != byte {
            return Err(HproseError::UnexpectedTag { tag, expected });
        }
        Ok(())
    }

    /// Preallocation for `count` items, bounded by the input actually available.
    pub fn capacity_hint(&self, count: usize) -> usize {
        count.min(self.reader.remaining_hint())
    }

    // --- scalar bodies, read after their tag ---

    /// Body of `i` or `l`. Reading stops at the first non-digit; overflow wraps.
    pub fn read_i128(&mut self) -> Result<i128> {
        let text = self.reader.read_until(TAG_SEMICOLON)?;
        Ok(parse_int_lenient(text))
    }

    /// Body of `i`, `l` or `d` as text.
    pub fn read_number_text(&mut self) -> Result<String> {
        let text = self.reader.read_until(TAG_SEMICOLON)?;
        String::from_utf8(text.to_vec()).map_err(|_| HproseError::InvalidUtf8)
    }

    /// Body of `d`.
    pub fn read_f64(&mut self) -> Result<f64> {
        let text = self.read_number_text()?;
        text.parse().map_err(|_| HproseError::Parse { text, target: "f64" })
    }

    /// Body of `I`: the sign.
    pub fn read_infinity(&mut self) -> Result<f64> {
        match self.reader.next()? {
            TAG_NEG => Ok(f64::NEG_INFINITY),
            _ => Ok(f64::INFINITY),
        }
    }

    /// Body of `u`.
    pub fn read_char(&mut self) -> Result<char> {
        let lead = self.reader.next()?;
        let width = utf8_width(lead).ok_or(HproseError::InvalidUtf8)?;
        let mut bytes = [lead, 0, 0, 0];
        if width > 1 {
            bytes[1..width].copy_from_slice(self.reader.read_exact(width - 1)?);
        }
        std::str::from_utf8(&bytes[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(HproseError::InvalidUtf8)
    }

    /// Body of `s`. The string is recorded as a reference.
    pub fn read_string(&mut self) -> Result<String> {
        self.add_reference();
        let len = self.read_length()?;
        let text = self.read_utf16(len)?;
        self.expect_byte(TAG_QUOTE, "string")?;
        Ok(text)
    }

    /// Body of `u` or `s`.
    pub fn read_text(&mut self, tag: u8) -> Result<String> {
        match tag {
            TAG_UTF8_CHAR => self.read_char().map(String::from),
            TAG_STRING => self.read_string(),
            TAG_EMPTY => Ok(String::new()),
            _ => Err(HproseError::UnexpectedTag {
                tag,
                expected: "string",
            }),
        }
    }

    fn read_length(&mut self) -> Result<usize> {
        let digits = self.reader.read_until(TAG_QUOTE)?;
        parse_count(digits, "length")
    }

    /// Reads characters until `units` UTF-16 code units have been consumed.
    fn read_utf16(&mut self, units: usize) -> Result<String> {
        let mut out = Vec::with_capacity(self.capacity_hint(units));
        let mut read = 0;
        while read < units {
            let lead = self.reader.next()?;
            let width = utf8_width(lead).ok_or(HproseError::InvalidUtf8)?;
            out.push(lead);
            if width > 1 {
                out.extend_from_slice(self.reader.read_exact(width - 1)?);
            }
            read += if width == 4 { 2 } else { 1 };
        }
        String::from_utf8(out).map_err(|_| HproseError::InvalidUtf8)
    }

    /// Body of `b`. The bytes are recorded as a reference.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.add_reference();
        let len = self.read_length()?;
        let bytes = self.reader.read_exact(len)?.to_vec();
        self.expect_byte(TAG_QUOTE, "bytes")?;
        Ok(bytes)
    }

    /// Body of `g`. The GUID is recorded as a reference.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        self.add_reference();
        self.expect_byte(TAG_OPENBRACE, "guid")?;
        let text = self.reader.read_until(TAG_CLOSEBRACE)?;
        Uuid::try_parse_ascii(text).map_err(|_| HproseError::Parse {
            text: String::from_utf8_lossy(text).into_owned(),
            target: "Uuid",
        })
    }

    // --- structures ---

    fn read_count(&mut self) -> Result<usize> {
        let digits = self.reader.read_until(TAG_OPENBRACE)?;
        parse_count(digits, "count")
    }

    /// Body of `a` up to `{`: the element count. The list is recorded as a reference.
    pub fn read_list_head(&mut self) -> Result<usize> {
        self.add_reference();
        self.read_count()
    }

    /// Body of `m` up to `{`: the entry count. The map is recorded as a reference.
    pub fn read_map_head(&mut self) -> Result<usize> {
        self.add_reference();
        self.read_count()
    }

    /// Body of `o` up to `{`: the class ordinal. The object is recorded as a reference.
    pub fn read_object_head(&mut self) -> Result<usize> {
        self.add_reference();
        let class = self.read_count()?;
        if class >= self.classes.len() {
            return Err(HproseError::UnknownClass(class));
        }
        Ok(class)
    }

    /// Reads `count` items of `width` wire values each, then `}`.
    ///
    /// When an item fails with a recoverable error the remaining items are skipped and the
    /// error is returned; `f` must leave a failed item fully consumed.
    pub fn read_body(
        &mut self,
        count: usize,
        width: usize,
        mut f: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        for i in 0..count {
            if let Err(err) = f(self, i) {
                if !self.can_recover(&err) {
                    return Err(err);
                }
                for _ in 0..(count - i - 1).saturating_mul(width) {
                    self.skip_value()?;
                }
                self.expect_byte(TAG_CLOSEBRACE, "end of structure")?;
                return Err(err);
            }
        }
        self.expect_byte(TAG_CLOSEBRACE, "end of structure")
    }

    /// Reads a list into a vector. `n` and `e` give an empty vector.
    pub fn read_vec<T: Decode>(&mut self, tag: u8) -> Result<Vec<T>> {
        match tag {
            TAG_NULL | TAG_EMPTY => Ok(Vec::new()),
            TAG_LIST => {
                let count = self.read_list_head()?;
                let mut items = Vec::with_capacity(self.capacity_hint(count));
                self.read_body(count, 1, |dec, _| {
                    items.push(dec.decode()?);
                    Ok(())
                })?;
                Ok(items)
            }
            _ => Err(self.cast_error::<Vec<T>>(tag)),
        }
    }

    /// Starts a list that must have exactly `arity` elements.
    pub fn read_tuple_head(&mut self, tag: u8, arity: usize, target: &'static str) -> Result<()> {
        if tag != TAG_LIST {
            return Err(self.cast_error_named(tag, target));
        }
        let count = self.read_list_head()?;
        if count != arity {
            for _ in 0..count {
                self.skip_value()?;
            }
            self.expect_byte(TAG_CLOSEBRACE, "end of list")?;
            return Err(HproseError::Cast { from: "list", to: target });
        }
        Ok(())
    }

    /// Reads a map, a list (keyed by index) or an object (keyed by field name), passing
    /// each entry to `insert`.
    pub fn read_map<K: Decode, V: Decode>(
        &mut self,
        tag: u8,
        target: &'static str,
        mut insert: impl FnMut(K, V),
    ) -> Result<()> {
        match tag {
            TAG_NULL | TAG_EMPTY => Ok(()),
            TAG_MAP => {
                let count = self.read_map_head()?;
                self.read_body(count, 2, |dec, _| {
                    let key = match dec.decode::<K>() {
                        Ok(key) => key,
                        Err(err) => {
                            if dec.can_recover(&err) {
                                dec.skip_value()?;
                            }
                            return Err(err);
                        }
                    };
                    let value = dec.decode::<V>()?;
                    insert(key, value);
                    Ok(())
                })
            }
            TAG_LIST => {
                let count = self.read_list_head()?;
                self.read_body(count, 1, |dec, i| {
                    let mut enc = Encoder::new(true);
                    enc.write_uint(i as u64);
                    let key = match decode_detached::<K>(enc.take_bytes()) {
                        Ok(key) => key,
                        Err(err) => {
                            dec.skip_value()?;
                            return Err(err);
                        }
                    };
                    let value = dec.decode::<V>()?;
                    insert(key, value);
                    Ok(())
                })
            }
            TAG_OBJECT => {
                let class = self.read_object_head()?;
                let fields = self.class_fields(class);
                self.read_body(fields.len(), 1, |dec, i| {
                    let mut enc = Encoder::new(true);
                    enc.write_str(&fields[i]);
                    let key = match decode_detached::<K>(enc.take_bytes()) {
                        Ok(key) => key,
                        Err(err) => {
                            dec.skip_value()?;
                            return Err(err);
                        }
                    };
                    let value = dec.decode::<V>()?;
                    insert(key, value);
                    Ok(())
                })
            }
            _ => Err(self.cast_error_named(tag, target)),
        }
    }

    /// Reads a derived struct from an object, a map keyed by field alias or a list of
    /// field values. `n` and `e` give `T::default()`.
    ///
    /// A field that fails with a recoverable error keeps its default value; the error is
    /// carried.
    pub fn read_struct<T: StructDecode>(&mut self, tag: u8) -> Result<T> {
        if matches!(tag, TAG_NULL | TAG_EMPTY) {
            return Ok(T::default());
        }
        if !matches!(tag, TAG_OBJECT | TAG_MAP | TAG_LIST) {
            return Err(self.cast_error::<T>(tag));
        }
        let meta = match meta_of::<T>() {
            Ok(meta) => meta,
            Err(err) => {
                self.skip_tagged(tag)?;
                return Err(err);
            }
        };
        let mut value = T::default();
        match tag {
            TAG_OBJECT => {
                let class = self.read_object_head()?;
                let mapping = self.class_mapping::<T>(class, &meta);
                for slot in mapping.iter() {
                    let tag = self.next_tag()?;
                    match slot {
                        Some(index) => {
                            if let Err(err) = value.decode_field(*index, self, tag) {
                                self.recover(err)?;
                            }
                        }
                        None => self.skip_tagged(tag)?,
                    }
                }
            }
            TAG_MAP => {
                let count = self.read_map_head()?;
                for _ in 0..count {
                    let key = match self.decode::<String>() {
                        Ok(key) => key,
                        Err(err) => {
                            self.recover(err)?;
                            self.skip_value()?;
                            continue;
                        }
                    };
                    let tag = self.next_tag()?;
                    match meta.field(&key) {
                        Some(field) => {
                            if let Err(err) = value.decode_field(field.index, self, tag) {
                                self.recover(err)?;
                            }
                        }
                        None => self.skip_tagged(tag)?,
                    }
                }
            }
            _ => {
                let count = self.read_list_head()?;
                for i in 0..count {
                    let tag = self.next_tag()?;
                    match meta.fields.get(i) {
                        Some(field) => {
                            if let Err(err) = value.decode_field(field.index, self, tag) {
                                self.recover(err)?;
                            }
                        }
                        None => self.skip_tagged(tag)?,
                    }
                }
            }
        }
        self.expect_byte(TAG_CLOSEBRACE, "end of structure")?;
        Ok(value)
    }

    // --- classes ---

    fn read_class(&mut self) -> Result<()> {
        let len = self.read_length()?;
        let name = self.read_utf16(len)?;
        self.expect_byte(TAG_QUOTE, "class name")?;
        let count = self.read_count()?;
        let mut fields = Vec::with_capacity(self.capacity_hint(count));
        for _ in 0..count {
            let tag = self.next_tag()?;
            fields.push(self.read_text(tag)?);
        }
        self.expect_byte(TAG_CLOSEBRACE, "end of class")?;
        if self.replaying.is_empty() {
            trace!(class = %name, index = self.classes.len(), "read class definition");
            let meta = lookup(&name);
            self.classes.push(ClassInfo {
                name,
                fields: fields.into(),
                meta,
                mapping: None,
            });
        }
        Ok(())
    }

    /// Class name of the class ordinal `class`.
    pub fn class_name(&self, class: usize) -> &str {
        self.classes.get(class).map_or("", |info| info.name.as_str())
    }

    /// Wire field names of the class ordinal `class`.
    pub fn class_fields(&self, class: usize) -> Arc<[String]> {
        self.classes
            .get(class)
            .map_or_else(|| Arc::from(Vec::new()), |info| info.fields.clone())
    }

    /// Registered metadata for the class ordinal `class`.
    pub fn class_meta(&self, class: usize) -> Option<Arc<StructMeta>> {
        self.classes.get(class)?.meta.clone()
    }

    fn class_mapping<T: 'static>(&mut self, class: usize, meta: &StructMeta) -> Arc<[Option<usize>]> {
        let id = TypeId::of::<T>();
        let Some(info) = self.classes.get_mut(class) else {
            return Arc::from(Vec::new());
        };
        if let Some((cached, mapping)) = &info.mapping {
            if *cached == id {
                return mapping.clone();
            }
        }
        let mapping: Arc<[Option<usize>]> = info
            .fields
            .iter()
            .map(|name| meta.field(name).map(|field| field.index))
            .collect();
        info.mapping = Some((id, mapping.clone()));
        mapping
    }

    // --- skipping ---

    /// Reads and discards the next value.
    pub fn skip_value(&mut self) -> Result<()> {
        let tag = self.next_tag()?;
        self.skip_tagged(tag)
    }

    /// Discards a value whose tag has already been read. References and class definitions
    /// inside it are recorded as if it had been decoded.
    pub fn skip_tagged(&mut self, tag: u8) -> Result<()> {
        self.enter()?;
        let result = self.skip_body(tag);
        self.depth -= 1;
        result
    }

    fn skip_body(&mut self, tag: u8) -> Result<()> {
        match tag {
            b'0'..=b'9' | TAG_NULL | TAG_EMPTY | TAG_TRUE | TAG_FALSE | TAG_NAN => Ok(()),
            TAG_INFINITY => self.reader.next().map(drop),
            TAG_INTEGER | TAG_LONG | TAG_DOUBLE | TAG_REF => {
                self.reader.read_until(TAG_SEMICOLON).map(drop)
            }
            TAG_UTF8_CHAR => self.read_char().map(drop),
            TAG_STRING => self.read_string().map(drop),
            TAG_BYTES => self.read_bytes().map(drop),
            TAG_GUID => {
                self.add_reference();
                self.expect_byte(TAG_OPENBRACE, "guid")?;
                self.reader.read_until(TAG_CLOSEBRACE).map(drop)
            }
            TAG_DATE | TAG_TIME => read_wire_time(self, tag).map(drop),
            TAG_LIST => {
                let count = self.read_list_head()?;
                self.skip_items(count)
            }
            TAG_MAP => {
                let count = self.read_map_head()?;
                self.skip_items(count.saturating_mul(2))
            }
            TAG_OBJECT => {
                let class = self.read_object_head()?;
                let count = self.classes[class].fields.len();
                self.skip_items(count)
            }
            TAG_CLASS => {
                self.read_class()?;
                self.skip_value()
            }
            TAG_ERROR => self.skip_value(),
            _ => Err(HproseError::UnexpectedTag {
                tag,
                expected: "value",
            }),
        }
    }

    fn skip_items(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.skip_value()?;
        }
        self.expect_byte(TAG_CLOSEBRACE, "end of structure")
    }
}

/// Decodes `data` with a throwaway simple-mode decoder.
pub(crate) fn decode_detached<T: Decode>(data: Bytes) -> Result<T> {
    Decoder::new(data, true).decode()
}

fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}

fn parse_count(digits: &[u8], expected: &'static str) -> Result<usize> {
    let mut value = 0usize;
    for &digit in digits {
        if !digit.is_ascii_digit() {
            return Err(HproseError::UnexpectedTag {
                tag: digit,
                expected,
            });
        }
        value = value
            .saturating_mul(10)
            .saturating_add((digit - b'0') as usize);
    }
    Ok(value)
}

/// Parses an optionally signed decimal, stopping at the first non-digit.
fn parse_int_lenient(text: &[u8]) -> i128 {
    let (negative, digits) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut value: i128 = 0;
    for &digit in digits {
        if !digit.is_ascii_digit() {
            break;
        }
        value = value.wrapping_mul(10).wrapping_add((digit - b'0') as i128);
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_integers_stop_at_garbage() {
        assert_eq!(parse_int_lenient(b"-123"), -123);
        assert_eq!(parse_int_lenient(b"+7x9"), 7);
        assert_eq!(parse_int_lenient(b""), 0);
    }

    #[test]
    fn counts_reject_non_digits() {
        assert_eq!(parse_count(b"42", "count").unwrap(), 42);
        assert!(matches!(
            parse_count(b"4x", "count"),
            Err(HproseError::UnexpectedTag { tag: b'x', .. })
        ));
    }
}
