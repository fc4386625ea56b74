//! Multi-precision binary floating-point numbers with directed rounding
use std::cmp::Ordering;
use std::fmt;

use crate::error::ArithError;
use crate::mantissa::{
    DIGIT_BITS, Digit, Mantissa, add_magnitudes, cmp_magnitude, divrem_magnitudes, extract_bits,
    low_weight, mul_magnitudes, normalize_digits, place_bits, shl_bits, sub_magnitudes, zeroed,
};
use crate::rounding::{Flags, Outcome, Remainder, RoundingMode, round_at};

/// Largest absolute digit exponent of a non-zero `MpNumber`
pub const MP_EXPONENT_LIMIT: i64 = 1 << 24;

pub const F64_MANTISSA_BITS: i64 = f64::MANTISSA_DIGITS as i64;
/// Binary exponent of the smallest normal `f64`
pub const F64_MIN_NORMAL_EXP: i64 = f64::MIN_EXP as i64 - 1;
/// Binary exponent of the largest finite `f64`
pub const F64_MAX_EXP: i64 = f64::MAX_EXP as i64 - 1;
/// Weight of the least significant bit of a subnormal `f64`
pub const F64_MIN_ULP_EXP: i64 = F64_MIN_NORMAL_EXP - F64_MANTISSA_BITS + 1;

const F64_FRACTION_MASK: u64 = (1 << 52) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sign {
    #[default]
    Pos,
    Neg,
}

impl Sign {
    #[inline]
    pub fn from_negative(negative: bool) -> Sign {
        if negative { Sign::Neg } else { Sign::Pos }
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self == Sign::Neg
    }

    pub fn flip(self) -> Sign {
        match self {
            Sign::Pos => Sign::Neg,
            Sign::Neg => Sign::Pos,
        }
    }
}

/// Sign-magnitude number `(-1)^sign * sum(d_i * 2^(32 * (exponent - i)))`.
///
/// Non-zero values keep a normalized mantissa: digit 0 and the last digit
/// are both non-zero. Zero is out of band with an empty mantissa. The
/// remainder records what the operation that produced the value discarded.
#[derive(Debug, Clone)]
pub struct MpNumber {
    sign: Sign,
    zero: bool,
    exponent: i64,
    mantissa: Mantissa,
    remainder: Remainder,
}

impl Default for MpNumber {
    fn default() -> Self {
        MpNumber::zero()
    }
}

impl MpNumber {
    pub fn zero() -> Self {
        MpNumber {
            sign: Sign::Pos,
            zero: true,
            exponent: 0,
            mantissa: Mantissa::new(),
            remainder: Remainder::Exact,
        }
    }

    pub fn signed_zero(sign: Sign) -> Self {
        MpNumber {
            sign,
            ..MpNumber::zero()
        }
    }

    /// Build from raw digits, normalizing and range checking the exponent
    pub(crate) fn from_raw(
        sign: Sign,
        mut digits: Vec<Digit>,
        exponent: i64,
    ) -> Result<Self, ArithError> {
        let exponent = normalize_digits(&mut digits, exponent);
        if digits.is_empty() {
            return Ok(MpNumber::signed_zero(sign));
        }
        check_exponent(exponent)?;
        Ok(MpNumber {
            sign,
            zero: false,
            exponent,
            mantissa: Mantissa::from_digits(digits),
            remainder: Remainder::Exact,
        })
    }

    /// Exactly `(-1)^sign * significand * 2^exp2`
    pub fn from_parts(sign: Sign, significand: u64, exp2: i64) -> Self {
        Self::from_wide_parts(sign, significand as u128, exp2)
    }

    pub(crate) fn from_wide_parts(sign: Sign, significand: u128, exp2: i64) -> Self {
        let (digits, exponent) = place_bits(significand, exp2);
        if digits.is_empty() {
            return MpNumber::signed_zero(sign);
        }
        MpNumber {
            sign,
            zero: false,
            exponent,
            mantissa: Mantissa::from_digits(digits),
            remainder: Remainder::Exact,
        }
    }

    /// Exact conversion; infinities and NaNs have no `MpNumber` form
    pub fn from_f64(x: f64) -> Result<Self, ArithError> {
        if !x.is_finite() {
            return Err(ArithError::InvalidOperation);
        }
        let sign = Sign::from_negative(x.is_sign_negative());
        let bits = x.to_bits();
        let biased = ((bits >> 52) & 0x7FF) as i64;
        let fraction = bits & F64_FRACTION_MASK;
        Ok(if biased == 0 {
            Self::from_parts(sign, fraction, F64_MIN_ULP_EXP)
        } else {
            Self::from_parts(
                sign,
                fraction | (1 << 52),
                biased - 1023 - (F64_MANTISSA_BITS - 1),
            )
        })
    }

    pub fn from_i64(v: i64) -> Self {
        Self::from_parts(Sign::from_negative(v < 0), v.unsigned_abs(), 0)
    }

    pub fn from_u64(v: u64) -> Self {
        Self::from_parts(Sign::Pos, v, 0)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.zero
    }

    #[inline]
    pub fn sign(&self) -> Sign {
        self.sign
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.sign.is_negative()
    }

    /// Digit exponent of digit 0
    #[inline]
    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    #[inline]
    pub fn mantissa(&self) -> &Mantissa {
        &self.mantissa
    }

    #[inline]
    pub fn digits(&self) -> &[Digit] {
        self.mantissa.digits()
    }

    #[inline]
    pub fn remainder(&self) -> Remainder {
        self.remainder
    }

    /// Whether the operation that produced this value discarded nothing
    #[inline]
    pub fn is_exact(&self) -> bool {
        self.remainder.is_exact()
    }

    /// Binary exponent of the leading bit, `None` for zero
    pub fn binary_exponent(&self) -> Option<i64> {
        (!self.zero).then(|| {
            DIGIT_BITS as i64 * self.exponent + DIGIT_BITS as i64 - 1
                - self.mantissa.leading_zeros() as i64
        })
    }

    /// Number of bits between the leading and the trailing set bit
    pub fn precision_bits(&self) -> u64 {
        self.mantissa.significant_bits()
    }

    pub fn neg(&self) -> MpNumber {
        let mut out = self.clone();
        out.sign = out.sign.flip();
        out
    }

    pub fn abs(&self) -> MpNumber {
        let mut out = self.clone();
        out.sign = Sign::Pos;
        out
    }

    /// Exact multiplication by `2^n`
    pub fn scale2(&self, n: i64) -> Result<MpNumber, ArithError> {
        if self.zero {
            return Ok(self.clone());
        }
        let q = n.div_euclid(DIGIT_BITS as i64);
        let r = n.rem_euclid(DIGIT_BITS as i64) as u32;
        let (digits, exponent) = if r == 0 {
            (self.digits().to_vec(), self.exponent + q)
        } else {
            (shl_bits(self.digits(), r)?, self.exponent + q + 1)
        };
        Self::from_raw(self.sign, digits, exponent)
    }

    /// Compare absolute values
    pub fn cmp_abs(&self, other: &MpNumber) -> Ordering {
        cmp_magnitude(self.digits(), self.exponent, other.digits(), other.exponent)
    }

    /// Round to `prec` significant bits
    pub fn round_to(&self, prec: u32, mode: RoundingMode) -> Result<Outcome<MpNumber>, ArithError> {
        if self.zero {
            return Ok(Outcome::exact(self.clone()));
        }
        Self::round_raw(self.sign, self.digits(), self.exponent, false, prec, mode)
    }

    /// Round a normalized magnitude (plus sticky bit) to `prec` bits
    pub(crate) fn round_raw(
        sign: Sign,
        digits: &[Digit],
        exponent: i64,
        sticky: bool,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ArithError> {
        if digits.is_empty() {
            return Ok(Outcome::exact(MpNumber::signed_zero(sign)));
        }
        let prec = prec.max(1) as i64;
        let cut = digits[0].leading_zeros() as i64 + prec;
        let rounded = round_at(digits, exponent, cut, sticky, sign.is_negative(), mode);
        let flags = if rounded.remainder.is_exact() {
            Flags::empty()
        } else {
            Flags::INEXACT
        };

        if rounded.exponent > MP_EXPONENT_LIMIT {
            return Err(ArithError::Overflow);
        }
        if rounded.exponent < -MP_EXPONENT_LIMIT {
            let mut zero = MpNumber::signed_zero(sign);
            zero.remainder = Remainder::BelowHalf;
            return Ok(Outcome::new(zero, Flags::UNDERFLOW | Flags::INEXACT));
        }

        let mut mantissa = Mantissa::from_digits(rounded.digits);
        mantissa.shrink_to_fit();
        Ok(Outcome::new(
            MpNumber {
                sign,
                zero: false,
                exponent: rounded.exponent,
                mantissa,
                remainder: rounded.remainder,
            },
            flags,
        ))
    }

    /// Round to the nearest `f64` in the given direction
    pub fn to_f64(&self, mode: RoundingMode) -> Outcome<f64> {
        if self.zero {
            return Outcome::exact(signed_zero_f64(self.is_negative()));
        }
        round_to_f64(self.digits(), self.exponent, self.is_negative(), false, mode)
    }

    pub fn add_exact(&self, other: &MpNumber) -> Result<MpNumber, ArithError> {
        let (sign, digits, exponent) = self.signed_sum(other, false, None)?;
        Self::from_raw(sign, digits, exponent)
    }

    pub fn sub_exact(&self, other: &MpNumber) -> Result<MpNumber, ArithError> {
        let (sign, digits, exponent) = self.signed_sum(other, true, None)?;
        Self::from_raw(sign, digits, exponent)
    }

    pub fn mul_exact(&self, other: &MpNumber) -> Result<MpNumber, ArithError> {
        let sign = Sign::from_negative(self.is_negative() != other.is_negative());
        if self.zero || other.zero {
            return Ok(MpNumber::signed_zero(sign));
        }
        let digits = mul_magnitudes(self.digits(), other.digits())?;
        Self::from_raw(sign, digits, self.exponent + other.exponent + 1)
    }

    pub fn add(
        &self,
        other: &MpNumber,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ArithError> {
        self.rounded_sum(other, false, prec, mode)
    }

    pub fn sub(
        &self,
        other: &MpNumber,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ArithError> {
        self.rounded_sum(other, true, prec, mode)
    }

    pub fn mul(
        &self,
        other: &MpNumber,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ArithError> {
        let sign = Sign::from_negative(self.is_negative() != other.is_negative());
        if self.zero || other.zero {
            return Ok(Outcome::exact(MpNumber::signed_zero(sign)));
        }
        let mut digits = mul_magnitudes(self.digits(), other.digits())?;
        let exponent = normalize_digits(&mut digits, self.exponent + other.exponent + 1);
        Self::round_raw(sign, &digits, exponent, false, prec, mode)
    }

    /// Quotient rounded to `prec` bits; a zero divisor is an error
    pub fn div(
        &self,
        other: &MpNumber,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ArithError> {
        if other.zero {
            return Err(ArithError::DivByZero);
        }
        let sign = Sign::from_negative(self.is_negative() != other.is_negative());
        if self.zero {
            return Ok(Outcome::exact(MpNumber::signed_zero(sign)));
        }
        let (digits, exponent, sticky) = divide(
            self.digits(),
            self.exponent,
            other.digits(),
            other.exponent,
            prec as u64,
        )?;
        Self::round_raw(sign, &digits, exponent, sticky, prec, mode)
    }

    fn rounded_sum(
        &self,
        other: &MpNumber,
        subtract: bool,
        prec: u32,
        mode: RoundingMode,
    ) -> Result<Outcome<MpNumber>, ArithError> {
        let (sign, digits, exponent) = self.signed_sum(other, subtract, Some(prec))?;
        let mut digits = digits;
        let exponent = normalize_digits(&mut digits, exponent);
        if digits.is_empty() {
            // exact cancellation: -0 only when rounding down or both addends are -0
            let other_negative = other.is_negative() != subtract;
            let negative = if self.zero && other.zero && self.is_negative() == other_negative {
                other_negative
            } else {
                mode == RoundingMode::Down
            };
            return Ok(Outcome::exact(MpNumber::signed_zero(Sign::from_negative(
                negative,
            ))));
        }
        Self::round_raw(sign, &digits, exponent, false, prec, mode)
    }

    /// Signed sum of two numbers as raw digits. With a target precision, an
    /// operand lying entirely below the result's rounding position is
    /// replaced by a single sticky digit so the buffer stays small.
    fn signed_sum(
        &self,
        other: &MpNumber,
        subtract: bool,
        prec: Option<u32>,
    ) -> Result<(Sign, Vec<Digit>, i64), ArithError> {
        let other_sign = if subtract {
            other.sign.flip()
        } else {
            other.sign
        };
        if other.zero {
            return Ok((self.sign, self.digits().to_vec(), self.exponent));
        }
        if self.zero {
            return Ok((other_sign, other.digits().to_vec(), other.exponent));
        }

        let (big, big_sign, small, small_sign) = match self.cmp_abs(other) {
            Ordering::Less => (other, other_sign, self, self.sign),
            _ => (self, self.sign, other, other_sign),
        };

        let mut small_digits = small.digits();
        let mut small_exponent = small.exponent;
        let sticky_digit = [1 as Digit];
        if let Some(prec) = prec {
            let guard_digits = prec as i64 / DIGIT_BITS as i64 + 2;
            let cutoff = low_weight(big.digits(), big.exponent).min(big.exponent - guard_digits) - 1;
            if small.exponent < cutoff {
                small_digits = &sticky_digit;
                small_exponent = cutoff;
            }
        }

        if big_sign == small_sign {
            let (digits, exponent) =
                add_magnitudes(big.digits(), big.exponent, small_digits, small_exponent)?;
            Ok((big_sign, digits, exponent))
        } else {
            let (digits, exponent) =
                sub_magnitudes(big.digits(), big.exponent, small_digits, small_exponent)?;
            Ok((big_sign, digits, exponent))
        }
    }
}

fn check_exponent(exponent: i64) -> Result<(), ArithError> {
    if exponent > MP_EXPONENT_LIMIT {
        Err(ArithError::Overflow)
    } else if exponent < -MP_EXPONENT_LIMIT {
        Err(ArithError::Underflow)
    } else {
        Ok(())
    }
}

/// Quotient of two normalized magnitudes with more than `bits + 32` significant
/// bits, its exponent, and whether the division left a remainder
pub(crate) fn divide(
    a: &[Digit],
    ea: i64,
    b: &[Digit],
    eb: i64,
    bits: u64,
) -> Result<(Vec<Digit>, i64, bool), ArithError> {
    let needed = (bits.div_ceil(DIGIT_BITS as u64) + 2) as usize;
    let pad = (needed + b.len()).saturating_sub(a.len());
    let mut dividend = zeroed(a.len() + pad)?;
    dividend[..a.len()].copy_from_slice(a);

    let (mut quotient, sticky) = divrem_magnitudes(&dividend, b)?;
    let low = low_weight(a, ea) - pad as i64 - low_weight(b, eb);
    let top = low + quotient.len() as i64 - 1;
    let exponent = normalize_digits(&mut quotient, top);
    Ok((quotient, exponent, sticky))
}

#[inline]
pub(crate) fn signed_zero_f64(negative: bool) -> f64 {
    if negative { -0.0 } else { 0.0 }
}

/// Value of an `f64` overflow in the given direction
pub(crate) fn overflow_f64(negative: bool, mode: RoundingMode) -> f64 {
    let magnitude = if mode.overflows_to_infinity(negative) {
        f64::INFINITY
    } else {
        f64::MAX
    };
    if negative { -magnitude } else { magnitude }
}

/// Correctly round a normalized magnitude to `f64`, subnormals included.
/// `sticky` reports non-zero bits already discarded below the digits.
pub(crate) fn round_to_f64(
    digits: &[Digit],
    exponent: i64,
    negative: bool,
    sticky: bool,
    mode: RoundingMode,
) -> Outcome<f64> {
    let lead = |d: &[Digit], e: i64| {
        DIGIT_BITS as i64 * e + DIGIT_BITS as i64 - 1 - d[0].leading_zeros() as i64
    };
    let e2 = lead(digits, exponent);
    if e2 > F64_MAX_EXP {
        return Outcome::new(overflow_f64(negative, mode), Flags::OVERFLOW | Flags::INEXACT);
    }

    let ulp = (e2 - F64_MANTISSA_BITS + 1).max(F64_MIN_ULP_EXP);
    let cut = DIGIT_BITS as i64 * exponent + DIGIT_BITS as i64 - ulp;
    let rounded = round_at(digits, exponent, cut, sticky, negative, mode);
    let mut flags = Flags::empty();
    if !rounded.remainder.is_exact() {
        flags |= Flags::INEXACT;
        if e2 < F64_MIN_NORMAL_EXP {
            flags |= Flags::UNDERFLOW;
        }
    }
    if rounded.digits.is_empty() {
        return Outcome::new(signed_zero_f64(negative), flags);
    }

    let e2 = lead(&rounded.digits, rounded.exponent);
    if e2 > F64_MAX_EXP {
        return Outcome::new(overflow_f64(negative, mode), Flags::OVERFLOW | Flags::INEXACT);
    }
    let start = rounded.digits[0].leading_zeros() as i64;
    let bits = if e2 >= F64_MIN_NORMAL_EXP {
        let significand = extract_bits(&rounded.digits, start, F64_MANTISSA_BITS as u32);
        (((e2 + 1023) as u64) << 52) | (significand & F64_FRACTION_MASK)
    } else {
        let count = (e2 - F64_MIN_ULP_EXP + 1) as u32;
        extract_bits(&rounded.digits, start, count)
    };
    let value = f64::from_bits(bits);
    Outcome::new(if negative { -value } else { value }, flags)
}

impl PartialEq for MpNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MpNumber {}

impl PartialOrd for MpNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MpNumber {
    /// Numeric order; both zeros compare equal
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.zero, other.zero) {
            (true, true) => Ordering::Equal,
            (true, false) => {
                if other.is_negative() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                if self.is_negative() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => match (self.is_negative(), other.is_negative()) {
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (false, false) => self.cmp_abs(other),
                (true, true) => other.cmp_abs(self),
            },
        }
    }
}

impl fmt::Display for MpNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // enough decimal digits to identify the binary value
        let digits = (self.precision_bits() as f64 * std::f64::consts::LOG10_2).ceil() as usize + 1;
        let format = crate::decimal::Format::scientific(0, digits.max(2) - 1);
        f.write_str(&self.format(&format))
    }
}

impl TryFrom<f64> for MpNumber {
    type Error = ArithError;

    fn try_from(x: f64) -> Result<Self, Self::Error> {
        MpNumber::from_f64(x)
    }
}

/// Exact narrowing; a value with no `f64` form is `ArithError::Inexact`
impl TryFrom<&MpNumber> for f64 {
    type Error = ArithError;

    fn try_from(x: &MpNumber) -> Result<Self, Self::Error> {
        x.to_f64(RoundingMode::Nearest).into_exact()
    }
}

impl From<i64> for MpNumber {
    fn from(v: i64) -> Self {
        MpNumber::from_i64(v)
    }
}
