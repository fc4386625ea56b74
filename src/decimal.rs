//! Decimal scanning and directed decimal formatting.
//!
//! Both directions are exact up to the final rounding step: scanning builds
//! the decimal significand as an integer and divides by the power of ten
//! with the multi-precision kernel, formatting scales the exact binary
//! value by a power of ten and rounds the resulting rational once.
use std::cmp::Ordering;

use rug::Integer;
use rug::ops::Pow;

use crate::accumulator::{Accumulator, Special};
use crate::error::ParseError;
use crate::number::{MpNumber, Sign};
use crate::rounding::{Outcome, RoundingMode};

/// Largest accepted magnitude of a decimal exponent after folding in the
/// fraction digits
pub const DECIMAL_EXPONENT_LIMIT: i64 = 100_000;
/// Fraction digits a `Format` can request; larger requests are clamped
pub const FORMAT_DIGIT_LIMIT: usize = DECIMAL_EXPONENT_LIMIT as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// `ddd.fff`
    Fixed,
    /// `d.fffE+xx`
    Scientific,
}

/// Output shape: right-aligned in `width` columns with `frac_digits`
/// digits after the point, rounded in `mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    pub width: usize,
    pub frac_digits: usize,
    pub layout: Layout,
    pub mode: RoundingMode,
}

impl Format {
    pub fn fixed(width: usize, frac_digits: usize) -> Self {
        Format {
            width,
            frac_digits,
            layout: Layout::Fixed,
            mode: RoundingMode::Nearest,
        }
    }

    pub fn scientific(width: usize, frac_digits: usize) -> Self {
        Format {
            width,
            frac_digits,
            layout: Layout::Scientific,
            mode: RoundingMode::Nearest,
        }
    }

    pub fn with_mode(mut self, mode: RoundingMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::scientific(0, 16)
    }
}

/// A scanned literal: `significand * 10^exponent`
struct Literal {
    negative: bool,
    significand: String,
    exponent: i64,
}

/// Positions in errors are byte offsets into `s`
fn scan(s: &str) -> Result<Literal, ParseError> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    let unexpected = |pos: usize| match s[pos..].chars().next() {
        Some(found) => ParseError::UnexpectedChar { pos, found },
        None => ParseError::MissingDigits { pos },
    };

    let mut pos = 0;
    let negative = match bytes[0] {
        b'-' => {
            pos += 1;
            true
        }
        b'+' => {
            pos += 1;
            false
        }
        _ => false,
    };
    let rest = s[pos..].to_ascii_lowercase();
    if rest.starts_with("inf") || rest.starts_with("nan") {
        return Err(ParseError::NonFinite);
    }

    let mut significand = String::new();
    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    significand.push_str(&s[int_start..pos]);
    let mut frac_len = 0i64;
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        let frac_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        significand.push_str(&s[frac_start..pos]);
        frac_len = (pos - frac_start) as i64;
    }
    if significand.is_empty() {
        return Err(unexpected(pos));
    }

    let mut exponent = 0i64;
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        pos += 1;
        let mut exp_negative = false;
        if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            exp_negative = bytes[pos] == b'-';
            pos += 1;
        }
        let exp_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            exponent = exponent
                .checked_mul(10)
                .and_then(|e| e.checked_add(i64::from(bytes[pos] - b'0')))
                .ok_or(ParseError::ExponentRange)?;
            pos += 1;
        }
        if pos == exp_start {
            return Err(unexpected(pos));
        }
        if exp_negative {
            exponent = -exponent;
        }
    }
    if pos < bytes.len() {
        return Err(unexpected(pos));
    }

    let exponent = exponent
        .checked_sub(frac_len)
        .ok_or(ParseError::ExponentRange)?;
    Ok(Literal {
        negative,
        significand,
        exponent,
    })
}

/// `10^n`; every caller keeps `n` within the decimal and binary exponent
/// limits, well inside `u32`
fn pow10(n: u64) -> Integer {
    debug_assert!(n <= u64::from(u32::MAX));
    Integer::from(10).pow(u32::try_from(n).unwrap_or(u32::MAX))
}

impl MpNumber {
    /// Scan `[+-]digits[.digits][(e|E)[+-]digits]` and round the exact
    /// decimal value to `prec` bits. Surrounding whitespace is ignored.
    pub fn from_decimal(
        s: &str,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ParseError> {
        let literal = scan(s.trim())?;
        let sign = Sign::from_negative(literal.negative);
        let mut significand = Integer::from_str_radix(&literal.significand, 10)
            .map_err(|_| ParseError::MissingDigits { pos: 0 })?;
        if significand == 0 {
            return Ok(Outcome::exact(MpNumber::signed_zero(sign)));
        }
        // `unsigned_abs` keeps i64::MIN (a folded exponent can reach it) out of range
        let scale = literal.exponent.unsigned_abs();
        if scale > DECIMAL_EXPONENT_LIMIT.unsigned_abs() {
            return Err(ParseError::ExponentRange);
        }
        if literal.negative {
            significand = -significand;
        }

        if literal.exponent >= 0 {
            significand *= pow10(scale);
            Ok(MpNumber::from_integer(&significand)?.round_to(prec, mode)?)
        } else {
            let num = MpNumber::from_integer(&significand)?;
            let den = MpNumber::from_integer(&pow10(scale))?;
            Ok(num.div(&den, prec, mode)?)
        }
    }

    /// Render with the given layout; the last printed digit is rounded in
    /// `format.mode`
    pub fn format(&self, format: &Format) -> String {
        let body = if self.is_zero() {
            zero_body(format)
        } else {
            let (i, e2) = self.to_integer_exp();
            match format.layout {
                Layout::Fixed => fixed_body(&i, e2, format),
                Layout::Scientific => scientific_body(&i, e2, self.binary_exponent(), format),
            }
        };
        let signed = if self.is_negative() {
            format!("-{body}")
        } else {
            body
        };
        format!("{signed:>width$}", width = format.width)
    }
}

impl Accumulator {
    /// Render the exact accumulated value, or `NaN`/`+Inf`/`-Inf`
    pub fn format(&self, format: &Format) -> String {
        let text = match self.special() {
            Special::Finite => match self.to_mp_exact() {
                Ok(x) => return x.format(format),
                Err(_) => "NaN".to_string(),
            },
            Special::PosInf => "+Inf".to_string(),
            Special::NegInf => "-Inf".to_string(),
            Special::Nan { .. } => "NaN".to_string(),
        };
        format!("{text:>width$}", width = format.width)
    }
}

/// `num / den` rounded to an integer; `den` is positive
fn div_round(num: Integer, den: &Integer, mode: RoundingMode) -> Integer {
    let (q, r) = num.div_rem_floor(den.clone());
    if r == 0 {
        return q;
    }
    match mode {
        RoundingMode::Down => q,
        RoundingMode::Up => q + 1,
        RoundingMode::Chop => {
            if q < 0 {
                q + 1
            } else {
                q
            }
        }
        RoundingMode::Nearest => {
            let twice = r << 1u32;
            match twice.cmp(den) {
                Ordering::Less => q,
                Ordering::Greater => q + 1,
                Ordering::Equal if q.is_odd() => q + 1,
                Ordering::Equal => q,
            }
        }
    }
}

/// `i * 2^e2 * 10^k` rounded to an integer
fn scaled(i: &Integer, e2: i64, k: i64, mode: RoundingMode) -> Integer {
    let mut num = i.clone();
    let mut den = Integer::from(1);
    if k >= 0 {
        num *= pow10(k.unsigned_abs());
    } else {
        den *= pow10(k.unsigned_abs());
    }
    // binary exponents of an MpNumber stay within 32 * MP_EXPONENT_LIMIT
    let shift = u32::try_from(e2.unsigned_abs()).unwrap_or(u32::MAX);
    if e2 >= 0 {
        num <<= shift;
    } else {
        den <<= shift;
    }
    div_round(num, &den, mode)
}

fn zero_body(format: &Format) -> String {
    let frac = format.frac_digits.min(FORMAT_DIGIT_LIMIT);
    let mut out = String::from("0");
    if frac > 0 {
        out.push('.');
        out.extend(std::iter::repeat_n('0', frac));
    }
    if format.layout == Layout::Scientific {
        out.push_str("E+00");
    }
    out
}

fn fixed_body(i: &Integer, e2: i64, format: &Format) -> String {
    let frac = format.frac_digits.min(FORMAT_DIGIT_LIMIT);
    let n = scaled(i, e2, frac as i64, format.mode).abs();
    let mut digits = n.to_string();
    if digits.len() < frac + 1 {
        digits.insert_str(0, &"0".repeat(frac + 1 - digits.len()));
    }
    if frac > 0 {
        digits.insert(digits.len() - frac, '.');
    }
    digits
}

fn scientific_body(i: &Integer, e2: i64, exp2: Option<i64>, format: &Format) -> String {
    let frac = format.frac_digits.min(FORMAT_DIGIT_LIMIT) as i64;
    let lower = pow10(frac.unsigned_abs());
    let upper = pow10(frac.unsigned_abs() + 1);
    let magnitude = i.clone().abs();

    // the estimate is off by at most one; settle it on the truncated value
    let mut e10 = (exp2.unwrap_or(0) as f64 * std::f64::consts::LOG10_2).floor() as i64;
    loop {
        let t = scaled(&magnitude, e2, frac - e10, RoundingMode::Chop);
        if t >= upper {
            e10 += 1;
        } else if t < lower {
            e10 -= 1;
        } else {
            break;
        }
    }

    let mut n = scaled(i, e2, frac - e10, format.mode).abs();
    if n == upper {
        n = lower;
        e10 += 1;
    }
    let digits = n.to_string();
    let (lead, tail) = digits.split_at(1);
    if tail.is_empty() {
        format!("{lead}E{e10:+03}")
    } else {
        format!("{lead}.{tail}E{e10:+03}")
    }
}
