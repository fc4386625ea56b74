//! Exact conversions between `MpNumber` and the `rug` / `gmp_mpfr_sys`
//! types, plus MPFR-backed reference operations used to cross-check the
//! native kernel.
use gmp_mpfr_sys::mpfr;
use rug::integer::Order;
use rug::{Float, Integer};

use crate::error::ArithError;
use crate::mantissa::{DIGIT_BITS, Digit};
use crate::number::{MpNumber, Sign};
use crate::rounding::{Flags, Outcome, RoundingMode};

pub(crate) fn to_mpfr_round(mode: RoundingMode) -> mpfr::rnd_t {
    match mode {
        RoundingMode::Down => mpfr::rnd_t::RNDD,
        RoundingMode::Up => mpfr::rnd_t::RNDU,
        RoundingMode::Chop => mpfr::rnd_t::RNDZ,
        RoundingMode::Nearest => mpfr::rnd_t::RNDN,
    }
}

/// Returns true if the MPFR operation was exact (no rounding error); not thread safe
pub fn is_exact_operation<F>(f: F) -> bool
where
    F: FnOnce(),
{
    unsafe {
        mpfr::clear_inexflag();
    }
    f();
    unsafe { mpfr::inexflag_p() == 0 }
}

impl MpNumber {
    /// Signed integer `i` and exponent `e` with `self == i * 2^e`
    pub fn to_integer_exp(&self) -> (Integer, i64) {
        if self.is_zero() {
            return (Integer::new(), 0);
        }
        let digits = self.digits();
        let mut i = Integer::from_digits(digits, Order::Msf);
        if self.is_negative() {
            i = -i;
        }
        let low = self.exponent() - digits.len() as i64 + 1;
        (i, DIGIT_BITS as i64 * low)
    }

    /// Exact conversion of an arbitrary integer
    pub fn from_integer(i: &Integer) -> Result<MpNumber, ArithError> {
        let sign = Sign::from_negative(*i < 0);
        let digits: Vec<Digit> = i.to_digits(Order::Msf);
        let exponent = digits.len() as i64 - 1;
        MpNumber::from_raw(sign, digits, exponent)
    }

    /// Exact `Float`; the precision is widened to hold every bit
    pub fn to_float(&self) -> Float {
        let (i, exp) = self.to_integer_exp();
        let prec = i.significant_bits().max(1);
        let mut f = Float::with_val(prec, &i);
        f <<= exp as i32;
        if self.is_zero() && self.is_negative() {
            f = -f;
        }
        f
    }

    /// Round into a `Float` of `prec` bits, flagging any discarded bits
    pub fn to_float_round(&self, prec: u32, mode: RoundingMode) -> Outcome<Float> {
        let exact = self.to_float();
        let mut out = Float::new(prec.max(1));
        let inexact = !is_exact_operation(|| unsafe {
            mpfr::set(out.as_raw_mut(), exact.as_raw(), to_mpfr_round(mode));
        });
        Outcome::new(out, if inexact { Flags::INEXACT } else { Flags::empty() })
    }

    /// Exact conversion of a finite `Float`
    pub fn from_float(f: &Float) -> Result<MpNumber, ArithError> {
        if f.is_zero() {
            return Ok(MpNumber::signed_zero(Sign::from_negative(
                f.is_sign_negative(),
            )));
        }
        let (i, exp) = f.to_integer_exp().ok_or(ArithError::InvalidOperation)?;
        MpNumber::from_integer(&i)?.scale2(exp as i64)
    }
}

impl From<&MpNumber> for Float {
    fn from(x: &MpNumber) -> Float {
        x.to_float()
    }
}

impl TryFrom<&Float> for MpNumber {
    type Error = ArithError;

    fn try_from(f: &Float) -> Result<Self, Self::Error> {
        MpNumber::from_float(f)
    }
}

#[cfg(test)]
macro_rules! mpfr_binary_op {
    ($name:ident, $func:path) => {
        pub(crate) fn $name(lhs: &Float, rhs: &Float, out: &mut Float, mode: RoundingMode) -> bool {
            is_exact_operation(|| unsafe {
                $func(
                    out.as_raw_mut(),
                    lhs.as_raw(),
                    rhs.as_raw(),
                    to_mpfr_round(mode),
                );
            })
        }
    };
}

#[cfg(test)]
mpfr_binary_op!(reference_add, mpfr::add);
#[cfg(test)]
mpfr_binary_op!(reference_sub, mpfr::sub);
#[cfg(test)]
mpfr_binary_op!(reference_mul, mpfr::mul);
#[cfg(test)]
mpfr_binary_op!(reference_div, mpfr::div);
