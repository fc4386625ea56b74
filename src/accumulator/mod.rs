//! Exact accumulation of `f64` products and sums (a "dotprecision").
//!
//! The buffer spans every bit a product of two `f64` values can occupy, plus
//! guard digits for carries, so sums of products are exact and are rounded
//! only once when read out.
use std::cmp::Ordering;

use itertools::{EitherOrBoth, Itertools};
use tracing::debug;

use crate::directed::{Class, classify};
use crate::error::ArithError;
use crate::mantissa::{DIGIT_BITS, Digit, DoubleDigit, place_bits};
use crate::number::{MpNumber, Sign, round_to_f64, signed_zero_f64};
use crate::rounding::{Flags, Outcome, RoundingMode};

pub mod special;

pub use special::{Special, ZeroSigns};

const fn product_min_exp2() -> i64 {
    2 * (f64::MIN_EXP as i64 - f64::MANTISSA_DIGITS as i64)
}

const fn product_max_exp2() -> i64 {
    2 * f64::MAX_EXP as i64
}

/// Digits above the largest product that absorb carries of repeated additions
pub const ACCU_GUARD_DIGITS: i64 = 2;
/// Digit weight of the least significant buffer digit
pub const ACCU_BOTTOM: i64 = product_min_exp2().div_euclid(DIGIT_BITS as i64);
/// Digit weight of index 0, the sentinel above the guard digits
pub const ACCU_TOP: i64 =
    (product_max_exp2() - 1).div_euclid(DIGIT_BITS as i64) + ACCU_GUARD_DIGITS + 1;
pub const ACCU_DIGITS: usize = (ACCU_TOP - ACCU_BOTTOM + 1) as usize;
/// Lowest index the guard digits occupy
const GUARD_INDEX: usize = (ACCU_GUARD_DIGITS + 1) as usize;

#[derive(Debug, Clone)]
pub struct Accumulator {
    digits: Box<[Digit]>,
    begin: usize,
    end: usize,
    negative: bool,
    special: Special,
    zero_signs: ZeroSigns,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator::new()
    }
}

/// A single product or value prepared for accumulation
enum Term {
    Zero { negative: bool },
    Finite { negative: bool, significand: u128, exp2: i64 },
    Special(Special, Flags),
}

impl Term {
    fn value(x: f64) -> Term {
        match classify(x) {
            Class::Zero { negative } => Term::Zero { negative },
            Class::Finite {
                negative,
                significand,
                exp2,
            } => Term::Finite {
                negative,
                significand: significand as u128,
                exp2,
            },
            Class::Inf { negative } => Term::Special(Special::infinity(negative), Flags::empty()),
            Class::Nan { signaling } => Term::Special(
                Special::nan_from(x),
                if signaling {
                    Flags::INVALID
                } else {
                    Flags::empty()
                },
            ),
        }
    }

    fn product(x: f64, y: f64) -> Term {
        let (cx, cy) = (classify(x), classify(y));
        let negative = cx.is_negative() != cy.is_negative();
        match (cx, cy) {
            (Class::Nan { .. }, _) => Term::value(x),
            (_, Class::Nan { .. }) => Term::value(y),
            (Class::Inf { .. }, Class::Zero { .. }) | (Class::Zero { .. }, Class::Inf { .. }) => {
                Term::Special(
                    Special::Nan {
                        payload: special::INVALID_NAN_PAYLOAD,
                    },
                    Flags::INVALID,
                )
            }
            (Class::Inf { .. }, _) | (_, Class::Inf { .. }) => {
                Term::Special(Special::infinity(negative), Flags::empty())
            }
            (Class::Zero { .. }, _) | (_, Class::Zero { .. }) => Term::Zero { negative },
            (
                Class::Finite {
                    significand: mx,
                    exp2: ex,
                    ..
                },
                Class::Finite {
                    significand: my,
                    exp2: ey,
                    ..
                },
            ) => Term::Finite {
                negative,
                significand: mx as u128 * my as u128,
                exp2: ex + ey,
            },
        }
    }

    fn negated(self) -> Term {
        match self {
            Term::Zero { negative } => Term::Zero {
                negative: !negative,
            },
            Term::Finite {
                negative,
                significand,
                exp2,
            } => Term::Finite {
                negative: !negative,
                significand,
                exp2,
            },
            Term::Special(s, flags) => Term::Special(s.negate(), flags),
        }
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator {
            digits: vec![0; ACCU_DIGITS].into_boxed_slice(),
            begin: 0,
            end: 0,
            negative: false,
            special: Special::Finite,
            zero_signs: ZeroSigns::empty(),
        }
    }

    /// Accumulator holding `x`; a signaling NaN raises `INVALID`
    pub fn from_value(x: f64) -> Outcome<Self> {
        let mut accu = Accumulator::new();
        let flags = accu.add_value(x);
        Outcome::new(accu, flags)
    }

    /// Exact dot product of two equally long vectors, with the flags every
    /// product raised
    pub fn dot(xs: &[f64], ys: &[f64]) -> Result<Outcome<Self>, ArithError> {
        let mut accu = Accumulator::new();
        let mut flags = Flags::empty();
        for (index, pair) in xs.iter().zip_longest(ys).enumerate() {
            match pair {
                EitherOrBoth::Both(&x, &y) => {
                    flags |= accu.add_product(x, y);
                }
                _ => {
                    return Err(ArithError::IndexRange {
                        index,
                        len: xs.len().min(ys.len()),
                    });
                }
            }
        }
        Ok(Outcome::new(accu, flags))
    }

    pub fn reset(&mut self) {
        if !self.is_empty() {
            self.digits[self.begin..=self.end].fill(0);
        }
        self.begin = 0;
        self.end = 0;
        self.negative = false;
        self.special = Special::Finite;
        self.zero_signs = ZeroSigns::empty();
    }

    /// No finite digits are stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == 0
    }

    /// Finite and exactly zero
    pub fn is_zero(&self) -> bool {
        self.special.is_finite() && self.is_empty()
    }

    /// -1, 0 or 1; NaN reports 0
    pub fn sign(&self) -> i32 {
        match self.special {
            Special::PosInf => 1,
            Special::NegInf => -1,
            Special::Nan { .. } => 0,
            Special::Finite if self.is_empty() => 0,
            Special::Finite if self.negative => -1,
            Special::Finite => 1,
        }
    }

    #[inline]
    pub fn special(&self) -> Special {
        self.special
    }

    #[inline]
    pub fn zero_signs(&self) -> ZeroSigns {
        self.zero_signs
    }

    /// Occupied digit range as (begin, end) indices, `None` when empty
    pub fn extent(&self) -> Option<(usize, usize)> {
        (!self.is_empty()).then_some((self.begin, self.end))
    }

    /// Add `x * y` exactly; returns the flags the contribution raised
    pub fn add_product(&mut self, x: f64, y: f64) -> Flags {
        self.add_term(Term::product(x, y))
    }

    pub fn sub_product(&mut self, x: f64, y: f64) -> Flags {
        self.add_term(Term::product(x, y).negated())
    }

    pub fn add_value(&mut self, x: f64) -> Flags {
        self.add_term(Term::value(x))
    }

    pub fn sub_value(&mut self, x: f64) -> Flags {
        self.add_term(Term::value(x).negated())
    }

    pub fn add_accumulator(&mut self, other: &Accumulator) -> Flags {
        self.merge(other, false)
    }

    pub fn sub_accumulator(&mut self, other: &Accumulator) -> Flags {
        self.merge(other, true)
    }

    pub fn negate(&mut self) {
        if !self.is_empty() {
            self.negative = !self.negative;
        }
        self.special = self.special.negate();
        self.zero_signs = self.zero_signs.swapped();
    }

    pub fn abs(&mut self) {
        self.negative = false;
        if self.special == Special::NegInf {
            self.special = Special::PosInf;
        }
        if !self.zero_signs.is_empty() {
            self.zero_signs = ZeroSigns::POSITIVE;
        }
    }

    /// The accumulated value rounded once in the given direction
    pub fn result(&self, mode: RoundingMode) -> Outcome<f64> {
        if let Some(value) = self.special.to_f64() {
            return Outcome::exact(value);
        }
        if self.is_empty() {
            let negative = self.zero_signs.zero_is_negative(mode == RoundingMode::Down);
            return Outcome::exact(signed_zero_f64(negative));
        }
        round_to_f64(
            &self.digits[self.begin..=self.end],
            self.weight(self.begin),
            self.negative,
            false,
            mode,
        )
    }

    /// Tightest `f64` enclosure `(down, up)` of the accumulated value
    pub fn result_interval(&self) -> (f64, f64) {
        (
            self.result(RoundingMode::Down).value,
            self.result(RoundingMode::Up).value,
        )
    }

    /// The exact accumulated value; non-finite states have none
    pub fn to_mp_exact(&self) -> Result<MpNumber, ArithError> {
        if !self.special.is_finite() {
            return Err(ArithError::InvalidOperation);
        }
        if self.is_empty() {
            return Ok(MpNumber::signed_zero(Sign::from_negative(
                self.zero_signs.zero_is_negative(false),
            )));
        }
        MpNumber::from_raw(
            Sign::from_negative(self.negative),
            self.digits[self.begin..=self.end].to_vec(),
            self.weight(self.begin),
        )
    }

    pub fn to_mp(&self, prec: u32, mode: RoundingMode) -> Result<Outcome<MpNumber>, ArithError> {
        self.to_mp_exact()?.round_to(prec, mode)
    }

    /// Numeric comparison; `None` when either side is NaN
    pub fn compare(&self, other: &Accumulator) -> Option<Ordering> {
        let rank = |s: Special| match s {
            Special::NegInf => Some(-1),
            Special::Finite => Some(0),
            Special::PosInf => Some(1),
            Special::Nan { .. } => None,
        };
        let (ra, rb) = (rank(self.special)?, rank(other.special)?);
        if ra != 0 || rb != 0 {
            return Some(ra.cmp(&rb));
        }

        let (sa, sb) = (self.sign(), other.sign());
        if sa != sb {
            return Some(sa.cmp(&sb));
        }
        if sa == 0 {
            return Some(Ordering::Equal);
        }
        let lo = self.begin.min(other.begin);
        let hi = self.end.max(other.end);
        let magnitude = self.digits[lo..=hi].cmp(&other.digits[lo..=hi]);
        Some(if sa < 0 { magnitude.reverse() } else { magnitude })
    }

    /// Comparison with a single value; a signaling NaN also raises `INVALID`
    pub fn compare_f64(&self, x: f64) -> Outcome<Option<Ordering>> {
        Accumulator::from_value(x).map(|other| self.compare(&other))
    }

    #[inline]
    fn weight(&self, index: usize) -> i64 {
        ACCU_TOP - index as i64
    }

    fn add_term(&mut self, term: Term) -> Flags {
        match term {
            Term::Zero { negative } => {
                self.zero_signs |= ZeroSigns::of(negative);
                Flags::empty()
            }
            Term::Special(incoming, flags) => {
                let (special, raised) = self.special.combine(incoming);
                self.special = special;
                flags | raised
            }
            Term::Finite {
                negative,
                significand,
                exp2,
            } => {
                self.zero_signs = ZeroSigns::all();
                if self.special.is_finite() {
                    let (digits, exponent) = place_bits(significand, exp2);
                    let msb = (ACCU_TOP - exponent) as usize;
                    self.add_digits(negative, &digits, msb);
                }
                Flags::empty()
            }
        }
    }

    fn merge(&mut self, other: &Accumulator, subtract: bool) -> Flags {
        let incoming = if subtract {
            other.special.negate()
        } else {
            other.special
        };
        let (special, flags) = self.special.combine(incoming);
        self.special = special;
        self.zero_signs |= if subtract {
            other.zero_signs.swapped()
        } else {
            other.zero_signs
        };
        if self.special.is_finite() && !other.is_empty() {
            let digits = other.digits[other.begin..=other.end].to_vec();
            self.add_digits(other.negative != subtract, &digits, other.begin);
        }
        flags
    }

    /// Add a signed magnitude whose leading digit lands at index `msb`
    fn add_digits(&mut self, negative: bool, term: &[Digit], msb: usize) {
        let lsb = msb + term.len() - 1;
        debug_assert!(msb > 0 && lsb < ACCU_DIGITS);

        if self.is_empty() {
            self.digits[msb..=lsb].copy_from_slice(term);
            self.begin = msb;
            self.end = lsb;
            self.negative = negative;
            self.trim();
            return;
        }

        if negative == self.negative {
            let mut carry: DoubleDigit = 0;
            for (i, &d) in term.iter().enumerate().rev() {
                let s = self.digits[msb + i] as DoubleDigit + d as DoubleDigit + carry;
                self.digits[msb + i] = s as Digit;
                carry = s >> DIGIT_BITS;
            }
            let mut top = msb;
            while carry != 0 {
                top -= 1;
                let s = self.digits[top] as DoubleDigit + carry;
                self.digits[top] = s as Digit;
                carry = s >> DIGIT_BITS;
            }
            self.begin = self.begin.min(top);
            self.end = self.end.max(lsb);
        } else {
            let top = self.begin.min(msb);
            let bottom = self.end.max(lsb);
            let mut borrow = false;
            for (i, &d) in term.iter().enumerate().rev() {
                let (x, b1) = self.digits[msb + i].overflowing_sub(d);
                let (x, b2) = x.overflowing_sub(borrow as Digit);
                self.digits[msb + i] = x;
                borrow = b1 || b2;
            }
            let mut idx = msb;
            while borrow && idx > top {
                idx -= 1;
                let (x, b) = self.digits[idx].overflowing_sub(1);
                self.digits[idx] = x;
                borrow = b;
            }
            if borrow {
                // the term outweighed the stored magnitude
                self.negate_range(top, bottom);
                self.negative = !self.negative;
            }
            self.begin = top;
            self.end = bottom;
        }
        self.trim();

        if self.digits[0] != 0 {
            // carry reached the sentinel: beyond any representable sum
            self.special = Special::infinity(self.negative);
            self.digits.fill(0);
            self.begin = 0;
            self.end = 0;
            debug!(target: "verarith::accumulator", "carry reached the sentinel digit");
        } else if !self.is_empty() && self.begin < GUARD_INDEX {
            debug!(
                target: "verarith::accumulator",
                begin = self.begin,
                "accumulated magnitude spilled into the guard digits"
            );
        }
    }

    /// Two's complement of the digits in `[top, bottom]`
    fn negate_range(&mut self, top: usize, bottom: usize) {
        let mut carry = true;
        for d in self.digits[top..=bottom].iter_mut().rev() {
            let (x, c) = (!*d).overflowing_add(carry as Digit);
            *d = x;
            carry = c;
        }
    }

    /// Shrink `begin`/`end` to the exact non-zero extent
    fn trim(&mut self) {
        let occupied = &self.digits[self.begin..=self.end];
        match occupied.iter().position(|&d| d != 0) {
            None => {
                self.begin = 0;
                self.end = 0;
                self.negative = false;
            }
            Some(first) => {
                let last = occupied.iter().rposition(|&d| d != 0).unwrap_or(first);
                self.end = self.begin + last;
                self.begin += first;
            }
        }
    }
}

/// Exact readout; NaN and infinite states are `InvalidOperation`, values
/// with no `f64` form are `Inexact`
impl TryFrom<&Accumulator> for f64 {
    type Error = ArithError;

    fn try_from(accu: &Accumulator) -> Result<Self, Self::Error> {
        if !accu.special.is_finite() {
            return Err(ArithError::InvalidOperation);
        }
        accu.result(RoundingMode::Nearest).into_exact()
    }
}

impl PartialEq for Accumulator {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Accumulator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}
