//! Float formatting and the big number types.

use crate::tags::*;
use crate::{Decode, Decoder, Encode, Encoder, HproseError, Result};
use bigdecimal::BigDecimal;
use bytes::{BufMut, BytesMut};
use num_bigint::BigInt;
use num_complex::Complex;
use num_rational::BigRational;
use num_traits::{FromPrimitive, One, Zero};
use std::str::FromStr;

/// Appends the shortest decimal that reads back as `value`, in `%g` layout.
pub(crate) fn append_f64(buf: &mut BytesMut, value: f64) {
    append_shortest(buf, &format!("{:e}", value));
}

pub(crate) fn append_f32(buf: &mut BytesMut, value: f32) {
    append_shortest(buf, &format!("{:e}", value));
}

/// Lays out a `LowerExp` rendering (`-1.25e-7`) the way `%g` does: plain digits when the
/// exponent is in `-4..6`, otherwise `d.ddde±XX`.
fn append_shortest(buf: &mut BytesMut, sci: &str) {
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let digits: Vec<u8> = mantissa.bytes().filter(|b| *b != b'.').collect();
    if negative {
        buf.put_u8(b'-');
    }
    if exp < -4 || exp >= 6 {
        buf.put_u8(digits[0]);
        if digits.len() > 1 {
            buf.put_u8(b'.');
            buf.put_slice(&digits[1..]);
        }
        buf.put_u8(b'e');
        buf.put_u8(if exp < 0 { b'-' } else { b'+' });
        let exp = exp.unsigned_abs();
        if exp < 10 {
            buf.put_u8(b'0');
        }
        buf.put_slice(exp.to_string().as_bytes());
    } else if exp < 0 {
        buf.put_slice(b"0.");
        for _ in 0..(-exp - 1) {
            buf.put_u8(b'0');
        }
        buf.put_slice(&digits);
    } else {
        let int_len = exp as usize + 1;
        if digits.len() <= int_len {
            buf.put_slice(&digits);
            for _ in digits.len()..int_len {
                buf.put_u8(b'0');
            }
        } else {
            buf.put_slice(&digits[..int_len]);
            buf.put_u8(b'.');
            buf.put_slice(&digits[int_len..]);
        }
    }
}

fn parse_error(text: String, target: &'static str) -> HproseError {
    HproseError::Parse { text, target }
}

// --- BigInt ---
/// Always written with the long tag.
impl Encode for BigInt {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_long_text(&self.to_string());
    }
}

impl Decode for BigInt {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(BigInt::from(tag - b'0')),
            TAG_INTEGER | TAG_LONG => {
                let text = dec.read_number_text()?;
                BigInt::from_str(&text).map_err(|_| parse_error(text, "BigInt"))
            }
            TAG_DOUBLE => {
                let value = dec.read_f64()?;
                BigInt::from_f64(value.trunc()).ok_or_else(|| parse_error(value.to_string(), "BigInt"))
            }
            TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(BigInt::zero()),
            TAG_TRUE => Ok(BigInt::one()),
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                BigInt::from_str(&text).map_err(|_| parse_error(text, "BigInt"))
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

// --- BigDecimal ---
/// Written as a double with all of its digits.
impl Encode for BigDecimal {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_double_text(&self.to_string());
    }
}

impl Decode for BigDecimal {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(BigDecimal::from((tag - b'0') as i64)),
            TAG_INTEGER | TAG_LONG | TAG_DOUBLE => {
                let text = dec.read_number_text()?;
                BigDecimal::from_str(&text).map_err(|_| parse_error(text, "BigDecimal"))
            }
            TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(BigDecimal::zero()),
            TAG_TRUE => Ok(BigDecimal::one()),
            TAG_NAN => Err(parse_error("NaN".to_string(), "BigDecimal")),
            TAG_INFINITY => {
                let value = dec.read_infinity()?;
                Err(parse_error(value.to_string(), "BigDecimal"))
            }
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                BigDecimal::from_str(text.trim()).map_err(|_| parse_error(text, "BigDecimal"))
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

// --- BigRational ---
/// An integral ratio is written as a big integer, any other as the string `"num/den"`.
impl Encode for BigRational {
    fn encode(&self, enc: &mut Encoder) {
        if self.is_integer() {
            self.numer().encode(enc);
        } else {
            enc.write_unlisted_str(&format!("{}/{}", self.numer(), self.denom()));
        }
    }
}

impl Decode for BigRational {
    fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
        match tag {
            tag if is_digit(tag) => Ok(BigRational::from_integer(BigInt::from(tag - b'0'))),
            TAG_INTEGER | TAG_LONG | TAG_DOUBLE => {
                let text = dec.read_number_text()?;
                parse_rational(&text).ok_or_else(|| parse_error(text, "BigRational"))
            }
            TAG_NULL | TAG_EMPTY | TAG_FALSE => Ok(BigRational::zero()),
            TAG_TRUE => Ok(BigRational::one()),
            TAG_UTF8_CHAR | TAG_STRING => {
                let text = dec.read_text(tag)?;
                parse_rational(&text).ok_or_else(|| parse_error(text, "BigRational"))
            }
            _ => Err(dec.cast_error::<Self>(tag)),
        }
    }
}

/// Parses `"a/b"` or a decimal such as `"1.25"` or `"5e-3"` exactly.
fn parse_rational(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if let Some((numer, denom)) = text.split_once('/') {
        let numer = BigInt::from_str(numer.trim()).ok()?;
        let denom = BigInt::from_str(denom.trim()).ok()?;
        if denom.is_zero() {
            return None;
        }
        return Some(BigRational::new(numer, denom));
    }
    let (digits, scale) = BigDecimal::from_str(text).ok()?.as_bigint_and_exponent();
    let ten = BigInt::from(10u8);
    if scale >= 0 {
        let denom = num_traits::pow(ten, usize::try_from(scale).ok()?);
        Some(BigRational::new(digits, denom))
    } else {
        let factor = num_traits::pow(ten, usize::try_from(-scale).ok()?);
        Some(BigRational::from_integer(digits * factor))
    }
}

// --- Complex ---
macro_rules! impl_complex {
    ($($t:ty => $write:ident),*) => {
        $(
            /// A complex number with a zero imaginary part is written as a plain double,
            /// any other as the list `[re, im]`.
            impl Encode for Complex<$t> {
                fn encode(&self, enc: &mut Encoder) {
                    if self.im == 0.0 {
                        enc.$write(self.re);
                    } else {
                        enc.write_list_head(2);
                        enc.$write(self.re);
                        enc.$write(self.im);
                        enc.write_foot();
                    }
                }
            }

            impl Decode for Complex<$t> {
                fn decode(dec: &mut Decoder, tag: u8) -> Result<Self> {
                    match tag {
                        TAG_LIST => {
                            dec.read_tuple_head(tag, 2, std::any::type_name::<Self>())?;
                            let mut parts = [0 as $t; 2];
                            dec.read_body(2, 1, |dec, i| {
                                parts[i] = dec.decode()?;
                                Ok(())
                            })?;
                            Ok(Complex::new(parts[0], parts[1]))
                        }
                        TAG_UTF8_CHAR | TAG_STRING => {
                            let text = dec.read_text(tag)?;
                            Complex::<$t>::from_str(text.trim())
                                .map_err(|_| parse_error(text, std::any::type_name::<Self>()))
                        }
                        _ => <$t>::decode(dec, tag).map(|re| Complex::new(re, 0.0)),
                    }
                }
            }
        )*
    };
}

impl_complex!(f32 => write_f32, f64 => write_f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn g(value: f64) -> String {
        let mut buf = BytesMut::new();
        append_f64(&mut buf, value);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn shortest_layout_matches_percent_g() {
        assert_eq!(g(0.0), "0");
        assert_eq!(g(100.0), "100");
        assert_eq!(g(123456.0), "123456");
        assert_eq!(g(1234567.0), "1.234567e+06");
        assert_eq!(g(1e6), "1e+06");
        assert_eq!(g(0.0001), "0.0001");
        assert_eq!(g(0.00001), "1e-05");
        assert_eq!(g(-3.25), "-3.25");
        assert_eq!(g(f64::MAX), "1.7976931348623157e+308");
        assert_eq!(g(5e-324), "5e-324");
    }

    #[test]
    fn f32_uses_its_own_shortest_digits() {
        let mut buf = BytesMut::new();
        append_f32(&mut buf, std::f32::consts::PI);
        assert_eq!(&buf[..], b"3.1415927");
    }

    #[test]
    fn rationals_parse_exactly() {
        assert_eq!(
            parse_rational("1.25"),
            Some(BigRational::new(5.into(), 4.into()))
        );
        assert_eq!(
            parse_rational("-3/6"),
            Some(BigRational::new((-1).into(), 2.into()))
        );
        assert_eq!(
            parse_rational("2e3"),
            Some(BigRational::from_integer(2000.into()))
        );
        assert_eq!(parse_rational("1/0"), None);
    }
}
