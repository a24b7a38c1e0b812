//! Date/time values.
//!
//! On the wire a date/time is `DYYYYMMDD`, `THHMMSS` or both, with an optional fraction of
//! 3, 6 or 9 digits, terminated by `Z` (UTC) or `;` (local time). A value at midnight is
//! written as a date only, a value on 1970-01-01 as a time only.

use crate::tags::*;
use crate::{Decode, Decoder, Encode, Encoder, HproseError, Result};
use chrono::{
    DateTime, Datelike, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeZone, Timelike, Utc,
};
use std::fmt::Write;
use std::time::SystemTime;

/// Text layouts accepted when a string is read as a date/time, tried in order.
const DATETIME_LAYOUTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_LAYOUT: &str = "%Y-%m-%d";
const TIME_LAYOUT: &str = "%H:%M:%S%.f";

/// The fields of a `D`/`T` value as they appear on the wire. Not validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WireTime {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanos: u32,
    pub utc: bool,
}

/// Reads the body of a `D` or `T` value and records it as a reference.
pub(crate) fn read_wire_time(dec: &mut Decoder, tag: u8) -> Result<WireTime> {
    dec.add_reference();
    let mut time = WireTime {
        year: 1970,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
        nanos: 0,
        utc: false,
    };
    let mut next = tag;
    if tag == TAG_DATE {
        time.year = dec.read_digits(4)?;
        time.month = dec.read_digits(2)?;
        time.day = dec.read_digits(2)?;
        next = dec.next_tag()?;
    }
    if next == TAG_TIME {
        time.hour = dec.read_digits(2)?;
        time.minute = dec.read_digits(2)?;
        time.second = dec.read_digits(2)?;
        next = dec.next_tag()?;
        if next == TAG_POINT {
            time.nanos = read_fraction(dec)?;
            next = dec.next_tag()?;
        }
    }
    time.utc = match next {
        TAG_UTC => true,
        TAG_SEMICOLON => false,
        tag => {
            return Err(HproseError::UnexpectedTag {
                tag,
                expected: "end of date/time",
            })
        }
    };
    Ok(time)
}

/// Reads 3, 6 or 9 fraction digits as nanoseconds.
fn read_fraction(dec: &mut Decoder) -> Result<u32> {
    let mut nanos = dec.read_digits(3)? * 1_000_000;
    if matches!(dec.peek_byte()?, Some(b'0'..=b'9')) {
        nanos += dec.read_digits(3)? * 1_000;
        if matches!(dec.peek_byte()?, Some(b'0'..=b'9')) {
            nanos += dec.read_digits(3)?;
        }
    }
    Ok(nanos)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Zone {
    Utc,
    Local,
    Fixed(FixedOffset),
}

/// A wall clock reading and the zone it was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    pub naive: NaiveDateTime,
    pub zone: Zone,
}

impl WireTime {
    pub fn stamp(&self) -> Result<Stamp> {
        let naive = NaiveDate::from_ymd_opt(self.year as i32, self.month, self.day)
            .and_then(|date| {
                date.and_hms_nano_opt(self.hour, self.minute, self.second, self.nanos)
            })
            .ok_or_else(|| HproseError::Parse {
                text: self.to_string(),
                target: "date/time",
            })?;
        let zone = if self.utc { Zone::Utc } else { Zone::Local };
        Ok(Stamp { naive, zone })
    }
}

impl std::fmt::Display for WireTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:09}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.nanos
        )?;
        if self.utc {
            f.write_str("Z")?;
        }
        Ok(())
    }
}

fn unresolved(naive: &NaiveDateTime) -> HproseError {
    HproseError::Parse {
        text: naive.to_string(),
        target: "local date/time",
    }
}

impl Stamp {
    fn utc(value: DateTime<Utc>) -> Self {
        Stamp {
            naive: value.naive_utc(),
            zone: Zone::Utc,
        }
    }

    pub fn to_utc(&self) -> Result<DateTime<Utc>> {
        match self.zone {
            Zone::Utc => Ok(Utc.from_utc_datetime(&self.naive)),
            Zone::Local => Ok(self.to_local()?.with_timezone(&Utc)),
            Zone::Fixed(offset) => Ok(self.in_offset(offset)?.with_timezone(&Utc)),
        }
    }

    pub fn to_local(&self) -> Result<DateTime<Local>> {
        match self.zone {
            Zone::Local => match Local.from_local_datetime(&self.naive) {
                LocalResult::Single(value) => Ok(value),
                LocalResult::Ambiguous(earliest, _) => Ok(earliest),
                LocalResult::None => Err(unresolved(&self.naive)),
            },
            _ => Ok(self.to_utc()?.with_timezone(&Local)),
        }
    }

    pub fn to_fixed(&self) -> Result<DateTime<FixedOffset>> {
        match self.zone {
            Zone::Utc => Ok(self.to_utc()?.fixed_offset()),
            Zone::Local => Ok(self.to_local()?.fixed_offset()),
            Zone::Fixed(offset) => self.in_offset(offset),
        }
    }

    fn in_offset(&self, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
        offset
            .from_local_datetime(&self.naive)
            .single()
            .ok_or_else(|| unresolved(&self.naive))
    }

    /// RFC 3339 text, `Z` for UTC.
    pub fn to_rfc3339(&self) -> Result<String> {
        match self.zone {
            Zone::Utc => Ok(self.to_utc()?.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            _ => Ok(self.to_fixed()?.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        }
    }
}

fn from_unix_nanos(nanos: i128) -> Result<Stamp> {
    let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok();
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    secs.and_then(|secs| DateTime::from_timestamp(secs, subsec))
        .map(Stamp::utc)
        .ok_or_else(|| HproseError::Parse {
            text: nanos.to_string(),
            target: "date/time",
        })
}

/// Parses the text layouts, RFC 3339 and RFC 2822. Text without an offset is local time.
fn parse_stamp(text: &str) -> Option<Stamp> {
    let text = text.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(Stamp {
            naive: value.naive_local(),
            zone: Zone::Fixed(*value.offset()),
        });
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(Stamp {
                naive,
                zone: Zone::Local,
            });
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_LAYOUT) {
        return Some(Stamp {
            naive: date.and_time(NaiveTime::MIN),
            zone: Zone::Local,
        });
    }
    if let Ok(time) = NaiveTime::parse_from_str(text, TIME_LAYOUT) {
        return Some(Stamp {
            naive: NaiveDate::default().and_time(time),
            zone: Zone::Local,
        });
    }
    DateTime::parse_from_rfc2822(text).ok().map(|value| Stamp {
        naive: value.naive_local(),
        zone: Zone::Fixed(*value.offset()),
    })
}

/// Reads any wire value a date/time target accepts.
///
/// Integers are Unix nanoseconds, doubles Unix seconds.
pub(crate) fn read_stamp(dec: &mut Decoder, tag: u8, target: &'static str) -> Result<Stamp> {
    match tag {
        tag if is_digit(tag) => from_unix_nanos((tag - b'0') as i128),
        TAG_INTEGER | TAG_LONG => from_unix_nanos(dec.read_i128()?),
        TAG_DOUBLE => {
            let secs = dec.read_f64()?;
            if !secs.is_finite() {
                return Err(HproseError::Parse {
                    text: secs.to_string(),
                    target,
                });
            }
            from_unix_nanos((secs * 1e9) as i128)
        }
        TAG_NULL | TAG_EMPTY | TAG_FALSE => from_unix_nanos(0),
        TAG_TRUE => from_unix_nanos(1),
        TAG_DATE | TAG_TIME => read_wire_time(dec, tag)?.stamp(),
        TAG_UTF8_CHAR | TAG_STRING => {
            let text = dec.read_text(tag)?;
            parse_stamp(&text).ok_or(HproseError::Parse { text, target })
        }
        _ => Err(dec.cast_error_named(tag, target)),
    }
}

/// Unix seconds of a `D`/`T` value, for integer targets.
pub(crate) fn read_unix_seconds(dec: &mut Decoder, tag: u8) -> Result<i64> {
    Ok(read_wire_time(dec, tag)?.stamp()?.to_utc()?.timestamp())
}

/// RFC 3339 text of a `D`/`T` value, for string targets.
pub(crate) fn read_datetime_text(dec: &mut Decoder, tag: u8) -> Result<String> {
    read_wire_time(dec, tag)?.stamp()?.to_rfc3339()
}

/// Writes a wall clock reading. The value takes a reference slot.
pub(crate) fn write_datetime(enc: &mut Encoder, naive: &NaiveDateTime, utc: bool) {
    let year = naive.year();
    if !(0..=9999).contains(&year) {
        enc.set_error(HproseError::UnsupportedType(format!("date/time in year {year}")));
        enc.write_nil();
        return;
    }
    enc.add_reference();
    let (month, day) = (naive.month(), naive.day());
    let (hour, minute, second) = (naive.hour(), naive.minute(), naive.second());
    let nanos = naive.nanosecond().min(999_999_999);
    let mut text = String::with_capacity(24);
    let has_time = hour != 0 || minute != 0 || second != 0 || nanos != 0;
    let on_epoch = year == 1970 && month == 1 && day == 1;
    if !has_time || !on_epoch {
        let _ = write!(text, "D{year:04}{month:02}{day:02}");
    }
    if has_time {
        let _ = write!(text, "T{hour:02}{minute:02}{second:02}");
        if nanos != 0 {
            text.push('.');
            if nanos % 1_000_000 == 0 {
                let _ = write!(text, "{:03}", nanos / 1_000_000);
            } else if nanos % 1_000 == 0 {
                let _ = write!(text, "{:06}", nanos / 1_000);
            } else {
                let _ = write!(text, "{nanos:09}");
            }
        }
    }
    text.push(if utc { 'Z' } else { ';' });
    enc.put_raw(text.as_bytes());
}

// --- chrono ---
impl Encode for NaiveDateTime {
    fn encode(&self, enc: &mut Encoder) {
        write_datetime(enc, self, false);
    }
}

impl Decode for NaiveDateTime {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        read_stamp(dec, tag, "NaiveDateTime").map(|stamp| stamp.naive)
    }
}

impl Encode for DateTime<Utc> {
    fn encode(&self, enc: &mut Encoder) {
        write_datetime(enc, &self.naive_utc(), true);
    }
}

impl Decode for DateTime<Utc> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        read_stamp(dec, tag, "DateTime<Utc>")?.to_utc()
    }
}

impl Encode for DateTime<Local> {
    fn encode(&self, enc: &mut Encoder) {
        write_datetime(enc, &self.naive_local(), false);
    }
}

impl Decode for DateTime<Local> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        read_stamp(dec, tag, "DateTime<Local>")?.to_local()
    }
}

/// A zero offset is written as UTC. Any other offset has no wire form and is converted to
/// local time.
impl Encode for DateTime<FixedOffset> {
    fn encode(&self, enc: &mut Encoder) {
        if self.offset().local_minus_utc() == 0 {
            write_datetime(enc, &self.naive_utc(), true);
        } else {
            write_datetime(enc, &self.with_timezone(&Local).naive_local(), false);
        }
    }
}

impl Decode for DateTime<FixedOffset> {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        read_stamp(dec, tag, "DateTime<FixedOffset>")?.to_fixed()
    }
}

impl Encode for NaiveDate {
    fn encode(&self, enc: &mut Encoder) {
        write_datetime(enc, &self.and_time(NaiveTime::MIN), false);
    }
}

impl Decode for NaiveDate {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        read_stamp(dec, tag, "NaiveDate").map(|stamp| stamp.naive.date())
    }
}

impl Encode for NaiveTime {
    fn encode(&self, enc: &mut Encoder) {
        write_datetime(enc, &NaiveDate::default().and_time(*self), false);
    }
}

impl Decode for NaiveTime {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        read_stamp(dec, tag, "NaiveTime").map(|stamp| stamp.naive.time())
    }
}

impl Encode for SystemTime {
    fn encode(&self, enc: &mut Encoder) {
        DateTime::<Utc>::from(*self).encode(enc);
    }
}

impl Decode for SystemTime {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        DateTime::<Utc>::decode(dec, tag).map(SystemTime::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn written(naive: NaiveDateTime, utc: bool) -> String {
        let mut enc = Encoder::new(false);
        write_datetime(&mut enc, &naive, utc);
        String::from_utf8(enc.bytes().to_vec()).unwrap()
    }

    fn at(date: (i32, u32, u32), time: (u32, u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_nano_opt(time.0, time.1, time.2, time.3)
            .unwrap()
    }

    #[test]
    fn midnight_is_date_only_and_epoch_day_is_time_only() {
        assert_eq!(written(at((2020, 2, 22), (0, 0, 0, 0)), true), "D20200222Z");
        assert_eq!(
            written(at((1970, 1, 1), (12, 12, 12, 123_456_789)), false),
            "T121212.123456789;"
        );
        assert_eq!(
            written(at((2021, 12, 31), (23, 59, 1, 500_000_000)), false),
            "D20211231T235901.500;"
        );
        assert_eq!(
            written(at((2021, 1, 2), (3, 4, 5, 6_000)), true),
            "D20210102T030405.000006Z"
        );
    }

    #[test]
    fn wire_time_keeps_every_field() {
        let mut dec = Decoder::new(Bytes::from_static(b"20200222T010203.004005Z"), false);
        let time = read_wire_time(&mut dec, TAG_DATE).unwrap();
        assert_eq!((time.year, time.month, time.day), (2020, 2, 22));
        assert_eq!((time.hour, time.minute, time.second), (1, 2, 3));
        assert_eq!(time.nanos, 4_005_000);
        assert!(time.utc);
    }

    #[test]
    fn text_layouts() {
        let stamp = parse_stamp("2020-02-22 01:02:03.5").unwrap();
        assert_eq!(stamp.naive, at((2020, 2, 22), (1, 2, 3, 500_000_000)));
        assert_eq!(stamp.zone, Zone::Local);
        let stamp = parse_stamp("2020-02-22T01:02:03Z").unwrap();
        assert_eq!(stamp.to_utc().unwrap().naive_utc(), at((2020, 2, 22), (1, 2, 3, 0)));
        assert_eq!(parse_stamp("12:30:00").unwrap().naive, at((1970, 1, 1), (12, 30, 0, 0)));
        assert!(parse_stamp("yesterday").is_none());
    }
}
