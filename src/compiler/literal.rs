//! Numeric literal conversion.
//!
//! Parameters arrive as text with separators already removed. Integers may be
//! decimal or `0x` hex with an optional sign; the signed and unsigned ranges
//! of a width are both accepted and wrap to two's complement. Floats are
//! rounded directly to the target width, so `f32` never goes via `f64`.

use fhex::FromHex;

use crate::error::CompileError;
use crate::wat::Span;

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn is_hex(body: &str) -> bool {
    body.starts_with("0x") || body.starts_with("0X")
}

/// Sign and magnitude of an integer literal.
fn magnitude(text: &str) -> Option<(bool, u128)> {
    let (negative, body) = split_sign(text);
    let (radix, digits) = if is_hex(body) { (16, &body[2..]) } else { (10, body) };
    if !digits.starts_with(|c: char| c.is_digit(radix)) {
        return None;
    }
    u128::from_str_radix(digits, radix).ok().map(|m| (negative, m))
}

/// An unsigned 32-bit value: an index, offset, alignment or limit.
pub fn parse_u32(text: &str, span: Span) -> Result<u32, CompileError> {
    match magnitude(text) {
        Some((false, m)) => u32::try_from(m).map_err(|_| CompileError::invalid_literal(text, "u32", span)),
        _ => Err(CompileError::invalid_literal(text, "u32", span)),
    }
}

pub fn parse_i32(text: &str, span: Span) -> Result<i32, CompileError> {
    match magnitude(text) {
        Some((true, m)) if m <= 1 << 31 => Ok((m as i64).wrapping_neg() as i32),
        Some((false, m)) if m <= u128::from(u32::MAX) => Ok(m as u32 as i32),
        _ => Err(CompileError::invalid_literal(text, "i32", span)),
    }
}

pub fn parse_i64(text: &str, span: Span) -> Result<i64, CompileError> {
    match magnitude(text) {
        Some((true, m)) if m <= 1 << 63 => Ok((m as i128).wrapping_neg() as i64),
        Some((false, m)) if m <= u128::from(u64::MAX) => Ok(m as u64 as i64),
        _ => Err(CompileError::invalid_literal(text, "i64", span)),
    }
}

/// Generates a float parser for one width.
///
/// Accepts decimal and hex floats, `inf`, `nan` (the canonical quiet NaN) and
/// `nan:0x...` with an explicit significand payload, each optionally signed.
macro_rules! parse_float {
    ($name:ident, $float:ty, $bits:ty, $ty_name:literal, sign: $sign:expr, exponent: $exponent:expr, canonical: $canonical:expr) => {
        pub fn $name(text: &str, span: Span) -> Result<$float, CompileError> {
            let invalid = || CompileError::invalid_literal(text, $ty_name, span);
            let (negative, body) = split_sign(text);
            let sign: $bits = if negative { $sign } else { 0 };

            if body == "inf" {
                return Ok(<$float>::from_bits(sign | $exponent));
            }
            if body == "nan" {
                return Ok(<$float>::from_bits(sign | $canonical));
            }
            if let Some(payload) = body.strip_prefix("nan:0x") {
                let payload = <$bits>::from_str_radix(payload, 16).map_err(|_| invalid())?;
                if payload == 0 || payload > !($sign | $exponent) {
                    return Err(invalid());
                }
                return Ok(<$float>::from_bits(sign | $exponent | payload));
            }

            let value = if is_hex(body) {
                let mut hex = body.to_ascii_lowercase();
                if !hex.contains('p') {
                    hex.push_str("p0");
                }
                <$float>::from_hex(&hex).unwrap_or(<$float>::NAN)
            } else {
                body.parse::<$float>().unwrap_or(<$float>::NAN)
            };
            if value.is_nan() {
                return Err(invalid());
            }
            if value.is_infinite() {
                return Err(CompileError::malformed("constant out of range", span));
            }
            Ok(if negative { -value } else { value })
        }
    };
}

parse_float!(parse_f32, f32, u32, "f32", sign: 0x8000_0000, exponent: 0x7F80_0000, canonical: 0x7FC0_0000);
parse_float!(
    parse_f64,
    f64,
    u64,
    "f64",
    sign: 0x8000_0000_0000_0000,
    exponent: 0x7FF0_0000_0000_0000,
    canonical: 0x7FF8_0000_0000_0000
);
