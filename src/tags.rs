//! Tag bytes of the hprose wire format.
//!
//! Every encoded value starts with exactly one of these bytes. The ASCII digits
//! `'0'..='9'` are not listed here: they encode the integers 0 to 9 directly.
//! Tags are part of the wire format and never change.

///< 32-bit integer, `i<n>;`
pub const TAG_INTEGER: u8 = b'i';
///< Integer outside the 32-bit range, `l<n>;`
pub const TAG_LONG: u8 = b'l';
///< Floating point number, `d<text>;`
pub const TAG_DOUBLE: u8 = b'd';
pub const TAG_NULL: u8 = b'n';
///< Present but empty value (empty string)
pub const TAG_EMPTY: u8 = b'e';
pub const TAG_TRUE: u8 = b't';
pub const TAG_FALSE: u8 = b'f';
pub const TAG_NAN: u8 = b'N';
///< Followed by `+` or `-`
pub const TAG_INFINITY: u8 = b'I';
///< `DYYYYMMDD`
pub const TAG_DATE: u8 = b'D';
///< `THHMMSS[.fff[fff[fff]]]`
pub const TAG_TIME: u8 = b'T';
///< Terminates a date/time in UTC
pub const TAG_UTC: u8 = b'Z';
///< `b<len>"raw"`
pub const TAG_BYTES: u8 = b'b';
///< A single character, no length
pub const TAG_UTF8_CHAR: u8 = b'u';
///< `s<utf16 len>"text"`
pub const TAG_STRING: u8 = b's';
///< `g{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}`
pub const TAG_GUID: u8 = b'g';
pub const TAG_LIST: u8 = b'a';
pub const TAG_MAP: u8 = b'm';
///< Class definition, `c<len>"Name"<count>{field names}`
pub const TAG_CLASS: u8 = b'c';
///< Object instance, `o<class>{field values}`
pub const TAG_OBJECT: u8 = b'o';
///< Back-reference, `r<ordinal>;`
pub const TAG_REF: u8 = b'r';

pub const TAG_POS: u8 = b'+';
pub const TAG_NEG: u8 = b'-';
pub const TAG_SEMICOLON: u8 = b';';
pub const TAG_OPENBRACE: u8 = b'{';
pub const TAG_CLOSEBRACE: u8 = b'}';
pub const TAG_QUOTE: u8 = b'"';
pub const TAG_POINT: u8 = b'.';

// Protocol tags, used by RPC framing around encoded values.
pub const TAG_HEADER: u8 = b'H';
pub const TAG_CALL: u8 = b'C';
pub const TAG_RESULT: u8 = b'R';
///< Error value, `E` followed by a string
pub const TAG_ERROR: u8 = b'E';
pub const TAG_END: u8 = b'z';

/// Returns true for the inline small-integer tags `'0'..='9'`.
#[inline]
pub fn is_digit(tag: u8) -> bool {
    tag.is_ascii_digit()
}

/// Human-readable name of a tag, used in error messages.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        b'0'..=b'9' => "digit",
        TAG_INTEGER => "integer",
        TAG_LONG => "long",
        TAG_DOUBLE => "double",
        TAG_NULL => "null",
        TAG_EMPTY => "empty",
        TAG_TRUE | TAG_FALSE => "bool",
        TAG_NAN => "NaN",
        TAG_INFINITY => "infinity",
        TAG_DATE | TAG_TIME => "time",
        TAG_BYTES => "bytes",
        TAG_UTF8_CHAR => "char",
        TAG_STRING => "string",
        TAG_GUID => "guid",
        TAG_LIST => "list",
        TAG_MAP => "map",
        TAG_CLASS => "class",
        TAG_OBJECT => "object",
        TAG_REF => "reference",
        TAG_ERROR => "error",
        _ => "unknown",
    }
}
