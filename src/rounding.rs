//! Rounding modes, IEEE status flags and the bit-level rounding kernel
//! shared by the multi-precision, native and accumulator paths.
use bitflags::bitflags;
use rug::float::Round;

use crate::error::ArithError;
use crate::mantissa::{DIGIT_BITS, Digit, any_bits_from, bit_at, normalize_digits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoundingMode {
    /// Round to nearest, ties to even
    #[default]
    Nearest,
    /// Toward +inf
    Up,
    /// Toward -inf
    Down,
    /// Toward zero
    Chop,
}

impl RoundingMode {
    pub const ALL: [RoundingMode; 4] = [
        RoundingMode::Nearest,
        RoundingMode::Up,
        RoundingMode::Down,
        RoundingMode::Chop,
    ];

    /// Mode that yields the same magnitude after the sign of the operand flips
    pub fn mirrored(self) -> RoundingMode {
        match self {
            RoundingMode::Up => RoundingMode::Down,
            RoundingMode::Down => RoundingMode::Up,
            mode => mode,
        }
    }

    /// Whether a value of the given sign that overflows becomes infinite
    pub fn overflows_to_infinity(self, negative: bool) -> bool {
        match self {
            RoundingMode::Nearest => true,
            RoundingMode::Up => !negative,
            RoundingMode::Down => negative,
            RoundingMode::Chop => false,
        }
    }

    pub fn to_round(self) -> Round {
        match self {
            RoundingMode::Nearest => Round::Nearest,
            RoundingMode::Up => Round::Up,
            RoundingMode::Down => Round::Down,
            RoundingMode::Chop => Round::Zero,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoundingMode::Nearest => "nearest",
            RoundingMode::Up => "up",
            RoundingMode::Down => "down",
            RoundingMode::Chop => "chop",
        }
    }
}

bitflags! {
    /// IEEE 754 exception flags raised by an operation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        const INVALID = 1 << 0;
        const DIV_BY_ZERO = 1 << 1;
        const OVERFLOW = 1 << 2;
        const UNDERFLOW = 1 << 3;
        const INEXACT = 1 << 4;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

/// Discarded part of a rounded value, in units of its last kept bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Remainder {
    #[default]
    Exact = 0,
    BelowHalf = 1,
    Half = 2,
    AboveHalf = 3,
}

impl Remainder {
    /// Classify from the first discarded bit and the "anything below it" bit
    pub fn from_bits(round: bool, sticky: bool) -> Remainder {
        match (round, sticky) {
            (false, false) => Remainder::Exact,
            (false, true) => Remainder::BelowHalf,
            (true, false) => Remainder::Half,
            (true, true) => Remainder::AboveHalf,
        }
    }

    #[inline]
    pub fn is_exact(self) -> bool {
        self == Remainder::Exact
    }
}

/// A value together with the exception flags its computation raised
#[must_use = "an Outcome carries exception flags that must be inspected or escalated"]
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub flags: Flags,
}

impl<T> Outcome<T> {
    #[inline]
    pub fn new(value: T, flags: Flags) -> Self {
        Outcome { value, flags }
    }

    #[inline]
    pub fn exact(value: T) -> Self {
        Outcome::new(value, Flags::empty())
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        !self.flags.contains(Flags::INEXACT)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        Outcome::new(f(self.value), self.flags)
    }

    /// The value if the operation discarded nothing, else `ArithError::Inexact`
    pub fn into_exact(self) -> Result<T, ArithError> {
        if self.is_exact() {
            Ok(self.value)
        } else {
            Err(ArithError::Inexact)
        }
    }

    /// Drop the flags; callers take responsibility for ignoring them
    #[inline]
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Decide whether the kept magnitude must be bumped by one unit in the last place
pub(crate) fn round_increment(
    mode: RoundingMode,
    negative: bool,
    lsb_odd: bool,
    remainder: Remainder,
) -> bool {
    match (mode, remainder) {
        (_, Remainder::Exact) => false,
        (RoundingMode::Nearest, Remainder::BelowHalf) => false,
        (RoundingMode::Nearest, Remainder::Half) => lsb_odd,
        (RoundingMode::Nearest, Remainder::AboveHalf) => true,
        (RoundingMode::Up, _) => !negative,
        (RoundingMode::Down, _) => negative,
        (RoundingMode::Chop, _) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rounded {
    /// Normalized digits, empty when the magnitude rounded to zero
    pub digits: Vec<Digit>,
    pub exponent: i64,
    pub remainder: Remainder,
}

/// Round a normalized magnitude so that only the bits before `cut` survive.
///
/// Bit indices count from the top of digit 0, so `cut` may be negative (the
/// whole magnitude lies below the last kept bit) or past the end (nothing is
/// discarded). `sticky` reports non-zero bits already dropped below the
/// digits.
pub(crate) fn round_at(
    digits: &[Digit],
    exponent: i64,
    cut: i64,
    sticky: bool,
    negative: bool,
    mode: RoundingMode,
) -> Rounded {
    let bits = DIGIT_BITS as i64;
    let total = digits.len() as i64 * bits;

    let (mut kept, round, rest) = if cut >= total {
        (digits.to_vec(), false, sticky)
    } else if cut > 0 {
        let keep = ((cut + bits - 1) / bits) as usize;
        let mut kept = digits[..keep].to_vec();
        let partial = (cut % bits) as u32;
        if partial != 0 {
            let last = kept.len() - 1;
            kept[last] &= !(Digit::MAX >> partial);
        }
        (
            kept,
            bit_at(digits, cut),
            sticky || any_bits_from(digits, cut + 1),
        )
    } else {
        // cut == 0 keeps nothing but the top bit is still the round bit
        let round = cut == 0 && bit_at(digits, 0);
        let rest = sticky || if cut == 0 { any_bits_from(digits, 1) } else { !digits.is_empty() };
        (Vec::new(), round, rest)
    };

    let remainder = Remainder::from_bits(round, rest);
    let lsb_odd = cut > 0 && bit_at(digits, cut - 1);
    let mut exponent = exponent;

    if round_increment(mode, negative, lsb_odd, remainder) {
        let unit_index = cut - 1;
        let digit = unit_index.div_euclid(bits);
        let unit = (1 as Digit) << (DIGIT_BITS - 1 - unit_index.rem_euclid(bits) as u32);
        if kept.is_empty() {
            kept.push(unit);
            exponent -= digit;
        } else {
            let mut idx = digit as usize;
            if idx >= kept.len() {
                // sticky-only remainder below a short magnitude
                kept.resize(idx + 1, 0);
            }
            let (sum, mut carry) = kept[idx].overflowing_add(unit);
            kept[idx] = sum;
            while carry && idx > 0 {
                idx -= 1;
                let (sum, c) = kept[idx].overflowing_add(1);
                kept[idx] = sum;
                carry = c;
            }
            if carry {
                kept.insert(0, 1);
                exponent += 1;
            }
        }
    }

    let exponent = normalize_digits(&mut kept, exponent);
    Rounded {
        digits: kept,
        exponent,
        remainder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_classes() {
        assert_eq!(Remainder::from_bits(false, false), Remainder::Exact);
        assert_eq!(Remainder::from_bits(false, true), Remainder::BelowHalf);
        assert_eq!(Remainder::from_bits(true, false), Remainder::Half);
        assert_eq!(Remainder::from_bits(true, true), Remainder::AboveHalf);
        assert_eq!(Remainder::AboveHalf as u8, 3);
    }

    #[test]
    fn ties_go_to_even() {
        // 0b101 | 1 -> cut after 3 bits of 0b1011 (top of digit 0)
        let digits = [0b1011 << 28];
        let r = round_at(&digits, 0, 3, false, false, RoundingMode::Nearest);
        assert_eq!(r.remainder, Remainder::Half);
        assert_eq!(r.digits, vec![0b1100 << 28]);

        let digits = [0b1001 << 28];
        let r = round_at(&digits, 0, 3, false, false, RoundingMode::Nearest);
        assert_eq!(r.digits, vec![0b1000 << 28]);
    }

    #[test]
    fn directed_modes_follow_sign() {
        let digits = [0x8000_0001];
        for (mode, negative, bumped) in [
            (RoundingMode::Up, false, true),
            (RoundingMode::Up, true, false),
            (RoundingMode::Down, false, false),
            (RoundingMode::Down, true, true),
            (RoundingMode::Chop, false, false),
            (RoundingMode::Chop, true, false),
            (RoundingMode::Nearest, false, false),
        ] {
            let r = round_at(&digits, 0, 8, false, negative, mode);
            assert_eq!(r.remainder, Remainder::BelowHalf);
            let expected = if bumped { 0x8100_0000 } else { 0x8000_0000 };
            assert_eq!(r.digits, vec![expected], "{mode:?} negative={negative}");
        }
    }

    #[test]
    fn carry_out_of_top_digit() {
        let digits = [Digit::MAX, Digit::MAX];
        let r = round_at(&digits, 5, 32, false, false, RoundingMode::Up);
        assert_eq!(r.digits, vec![1]);
        assert_eq!(r.exponent, 6);
    }

    #[test]
    fn everything_below_the_cut() {
        let digits = [1];
        let r = round_at(&digits, 0, -4, false, false, RoundingMode::Up);
        assert_eq!(r.remainder, Remainder::BelowHalf);
        // unit at bit index -5 lies in the digit above
        assert_eq!(r.digits, vec![1 << 4]);
        assert_eq!(r.exponent, 1);

        let r = round_at(&digits, 0, -4, false, false, RoundingMode::Nearest);
        assert!(r.digits.is_empty());
    }

    #[test]
    fn sticky_input_only() {
        let digits = [0x8000_0000];
        let r = round_at(&digits, 0, 64, true, false, RoundingMode::Nearest);
        assert_eq!(r.remainder, Remainder::BelowHalf);
        assert_eq!(r.digits, vec![0x8000_0000]);
    }
}
