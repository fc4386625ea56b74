//! Directed rounding on native `f64` operands.
//!
//! Finite operands are combined exactly in an `MpNumber` (or the quotient
//! plus a sticky bit) and rounded once, so every mode is correctly rounded
//! without touching the hardware control word.
use tracing::error;

use crate::accumulator::Accumulator;
use crate::error::ArithError;
use crate::mantissa::Digit;
use crate::number::{MpNumber, Sign, divide, round_to_f64, signed_zero_f64};
use crate::rounding::{Flags, Outcome, RoundingMode};

const QUIET_BIT: u64 = 1 << 51;
const FRACTION_MASK: u64 = (1 << 52) - 1;
/// Extra quotient bits beyond the `f64` significand before the sticky bit
const DIVISION_GUARD_BITS: u64 = 64;

/// IEEE class of an `f64` operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Class {
    Zero { negative: bool },
    /// `significand * 2^exp2`, exact
    Finite { negative: bool, significand: u64, exp2: i64 },
    Inf { negative: bool },
    Nan { signaling: bool },
}

impl Class {
    pub fn is_negative(&self) -> bool {
        match *self {
            Class::Zero { negative }
            | Class::Finite { negative, .. }
            | Class::Inf { negative } => negative,
            Class::Nan { .. } => false,
        }
    }
}

pub fn classify(x: f64) -> Class {
    let bits = x.to_bits();
    let negative = x.is_sign_negative();
    let biased = ((bits >> 52) & 0x7FF) as i64;
    let fraction = bits & FRACTION_MASK;
    match (biased, fraction) {
        (0, 0) => Class::Zero { negative },
        (0, _) => Class::Finite {
            negative,
            significand: fraction,
            exp2: -1074,
        },
        (0x7FF, 0) => Class::Inf { negative },
        (0x7FF, _) => Class::Nan {
            signaling: bits & QUIET_BIT == 0,
        },
        _ => Class::Finite {
            negative,
            significand: fraction | (1 << 52),
            exp2: biased - 1075,
        },
    }
}

pub fn is_signaling_nan(x: f64) -> bool {
    matches!(classify(x), Class::Nan { signaling: true })
}

/// Quiet NaN result of an operation with at least one NaN operand
fn propagate_nan(a: f64, b: f64) -> Outcome<f64> {
    let source = if a.is_nan() { a } else { b };
    let flags = if is_signaling_nan(a) || is_signaling_nan(b) {
        Flags::INVALID
    } else {
        Flags::empty()
    };
    Outcome::new(f64::from_bits(source.to_bits() | QUIET_BIT), flags)
}

#[inline]
fn invalid() -> Outcome<f64> {
    Outcome::new(f64::NAN, Flags::INVALID)
}

#[inline]
fn infinity(negative: bool) -> f64 {
    if negative {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    }
}

pub fn add(a: f64, b: f64, mode: RoundingMode) -> Outcome<f64> {
    match (classify(a), classify(b)) {
        (Class::Nan { .. }, _) | (_, Class::Nan { .. }) => propagate_nan(a, b),
        (Class::Inf { negative: s }, Class::Inf { negative: t }) if s != t => invalid(),
        (Class::Inf { negative }, _) | (_, Class::Inf { negative }) => {
            Outcome::exact(infinity(negative))
        }
        (Class::Zero { negative: s }, Class::Zero { negative: t }) => {
            let negative = if s == t { s } else { mode == RoundingMode::Down };
            Outcome::exact(signed_zero_f64(negative))
        }
        (Class::Zero { .. }, _) => Outcome::exact(b),
        (_, Class::Zero { .. }) => Outcome::exact(a),
        (x, y) => finite_sum(x, y, mode),
    }
}

pub fn sub(a: f64, b: f64, mode: RoundingMode) -> Outcome<f64> {
    add(a, -b, mode)
}

pub fn mul(a: f64, b: f64, mode: RoundingMode) -> Outcome<f64> {
    let (ca, cb) = (classify(a), classify(b));
    let negative = ca.is_negative() != cb.is_negative();
    match (ca, cb) {
        (Class::Nan { .. }, _) | (_, Class::Nan { .. }) => propagate_nan(a, b),
        (Class::Inf { .. }, Class::Zero { .. }) | (Class::Zero { .. }, Class::Inf { .. }) => {
            invalid()
        }
        (Class::Inf { .. }, _) | (_, Class::Inf { .. }) => Outcome::exact(infinity(negative)),
        (Class::Zero { .. }, _) | (_, Class::Zero { .. }) => {
            Outcome::exact(signed_zero_f64(negative))
        }
        (
            Class::Finite {
                significand: ma,
                exp2: ea,
                ..
            },
            Class::Finite {
                significand: mb,
                exp2: eb,
                ..
            },
        ) => {
            let product =
                MpNumber::from_wide_parts(Sign::from_negative(negative), ma as u128 * mb as u128, ea + eb);
            round_to_f64(product.digits(), product.exponent(), negative, false, mode)
        }
    }
}

pub fn div(a: f64, b: f64, mode: RoundingMode) -> Outcome<f64> {
    let (ca, cb) = (classify(a), classify(b));
    let negative = ca.is_negative() != cb.is_negative();
    match (ca, cb) {
        (Class::Nan { .. }, _) | (_, Class::Nan { .. }) => propagate_nan(a, b),
        (Class::Inf { .. }, Class::Inf { .. }) | (Class::Zero { .. }, Class::Zero { .. }) => {
            invalid()
        }
        (Class::Inf { .. }, _) => Outcome::exact(infinity(negative)),
        (_, Class::Inf { .. }) | (Class::Zero { .. }, _) => {
            Outcome::exact(signed_zero_f64(negative))
        }
        (_, Class::Zero { .. }) => Outcome::new(infinity(negative), Flags::DIV_BY_ZERO),
        (
            Class::Finite {
                significand: ma,
                exp2: ea,
                ..
            },
            Class::Finite {
                significand: mb,
                exp2: eb,
                ..
            },
        ) => {
            let x = MpNumber::from_parts(Sign::Pos, ma, ea);
            let y = MpNumber::from_parts(Sign::Pos, mb, eb);
            finite_quotient(x.digits(), x.exponent(), y.digits(), y.exponent(), negative, mode)
        }
    }
}

/// `a * b + c` with a single rounding
pub fn fma(a: f64, b: f64, c: f64, mode: RoundingMode) -> Outcome<f64> {
    let mut accu = Accumulator::new();
    let mut flags = accu.add_product(a, b);
    flags |= accu.add_value(c);
    let result = accu.result(mode);
    Outcome::new(result.value, flags | result.flags)
}

pub fn sqr(a: f64, mode: RoundingMode) -> Outcome<f64> {
    mul(a, a, mode)
}

fn finite_sum(x: Class, y: Class, mode: RoundingMode) -> Outcome<f64> {
    let to_mp = |c: Class| match c {
        Class::Finite {
            negative,
            significand,
            exp2,
        } => MpNumber::from_parts(Sign::from_negative(negative), significand, exp2),
        _ => MpNumber::zero(),
    };
    // operands of f64 range keep the exact sum well inside the exponent limit
    match to_mp(x).add_exact(&to_mp(y)) {
        Ok(sum) if sum.is_zero() => Outcome::exact(signed_zero_f64(mode == RoundingMode::Down)),
        Ok(sum) => round_to_f64(sum.digits(), sum.exponent(), sum.is_negative(), false, mode),
        Err(err) => kernel_failed(err, "add"),
    }
}

fn finite_quotient(
    a: &[Digit],
    ea: i64,
    b: &[Digit],
    eb: i64,
    negative: bool,
    mode: RoundingMode,
) -> Outcome<f64> {
    let bits = f64::MANTISSA_DIGITS as u64 + DIVISION_GUARD_BITS;
    match divide(a, ea, b, eb, bits) {
        Ok((digits, exponent, sticky)) => round_to_f64(&digits, exponent, negative, sticky, mode),
        Err(err) => kernel_failed(err, "div"),
    }
}

/// The exact kernels see at most a few dozen digits for `f64` operands, far
/// inside the exponent range, so the only error they can return here is a
/// failed digit allocation; abort as the global allocator does.
#[cold]
fn kernel_failed(err: ArithError, op: &'static str) -> ! {
    error!(target: "verarith::directed", op, %err, "exact kernel failed on f64 operands");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: [RoundingMode; 4] = RoundingMode::ALL;

    #[test]
    fn classes() {
        assert_eq!(classify(-0.0), Class::Zero { negative: true });
        assert_eq!(classify(f64::NEG_INFINITY), Class::Inf { negative: true });
        assert_eq!(classify(f64::NAN), Class::Nan { signaling: false });
        assert_eq!(
            classify(1.0),
            Class::Finite {
                negative: false,
                significand: 1 << 52,
                exp2: -52
            }
        );
        assert_eq!(
            classify(5e-324),
            Class::Finite {
                negative: false,
                significand: 1,
                exp2: -1074
            }
        );
        let snan = f64::from_bits(0x7FF0_0000_0000_0001);
        assert!(is_signaling_nan(snan));
    }

    #[test]
    fn nearest_matches_hardware() {
        let samples = [
            (0.1, 0.2),
            (1.0, 3.0),
            (-7.5, 1e-17),
            (1e308, 1e308),
            (5e-324, -2.5e-324),
            (2.2250738585072014e-308, 3.0),
            (123456.789, -0.000123),
            (f64::MAX, 0.5),
        ];
        for (a, b) in samples {
            assert_eq!(add(a, b, RoundingMode::Nearest).value, a + b, "{a} + {b}");
            assert_eq!(sub(a, b, RoundingMode::Nearest).value, a - b, "{a} - {b}");
            assert_eq!(mul(a, b, RoundingMode::Nearest).value, a * b, "{a} * {b}");
            assert_eq!(div(a, b, RoundingMode::Nearest).value, a / b, "{a} / {b}");
        }
    }

    #[test]
    fn directed_brackets_nearest() {
        let ops: [fn(f64, f64, RoundingMode) -> Outcome<f64>; 4] = [add, sub, mul, div];
        for op in ops {
            for (a, b) in [(1.0, 3.0), (-2.0, 7.0), (0.1, 0.7), (1e-310, 3.0)] {
                let down = op(a, b, RoundingMode::Down).value;
                let near = op(a, b, RoundingMode::Nearest).value;
                let up = op(a, b, RoundingMode::Up).value;
                let chop = op(a, b, RoundingMode::Chop).value;
                assert!(down <= near && near <= up, "{a} {b}");
                let toward_zero = if up <= 0.0 { up } else { down };
                assert_eq!(chop, toward_zero, "{a} {b}");
            }
        }
    }

    #[test]
    fn exactness_flags() {
        let third = div(1.0, 3.0, RoundingMode::Nearest);
        assert!(third.flags.contains(Flags::INEXACT));
        let two = div(6.0, 3.0, RoundingMode::Nearest);
        assert_eq!(two, Outcome::exact(2.0));
        assert!(div(1.0, 3.0, RoundingMode::Down).value < div(1.0, 3.0, RoundingMode::Up).value);
    }

    #[test]
    fn special_value_table() {
        for mode in MODES {
            let r = add(f64::INFINITY, f64::NEG_INFINITY, mode);
            assert!(r.value.is_nan() && r.flags.contains(Flags::INVALID));
            let r = mul(0.0, f64::INFINITY, mode);
            assert!(r.value.is_nan() && r.flags.contains(Flags::INVALID));
            let r = div(0.0, -0.0, mode);
            assert!(r.value.is_nan() && r.flags.contains(Flags::INVALID));
            let r = div(f64::INFINITY, f64::INFINITY, mode);
            assert!(r.flags.contains(Flags::INVALID));

            let r = div(1.0, -0.0, mode);
            assert_eq!(r.value, f64::NEG_INFINITY);
            assert_eq!(r.flags, Flags::DIV_BY_ZERO);
            assert_eq!(div(-3.0, f64::INFINITY, mode).value.to_bits(), (-0.0f64).to_bits());
            assert_eq!(mul(-0.0, 5.0, mode).value.to_bits(), (-0.0f64).to_bits());
        }
    }

    #[test]
    fn nan_propagation() {
        let q = add(f64::NAN, 1.0, RoundingMode::Up);
        assert!(q.value.is_nan() && q.flags.is_empty());
        let snan = f64::from_bits(0x7FF0_0000_0000_0001);
        let r = mul(2.0, snan, RoundingMode::Nearest);
        assert!(r.value.is_nan() && !is_signaling_nan(r.value));
        assert_eq!(r.flags, Flags::INVALID);
    }

    #[test]
    fn zero_sign_rules() {
        assert_eq!(sub(1.5, 1.5, RoundingMode::Nearest).value.to_bits(), 0);
        assert!(sub(1.5, 1.5, RoundingMode::Down).value.is_sign_negative());
        assert!(add(-0.0, -0.0, RoundingMode::Up).value.is_sign_negative());
        assert!(add(0.0, -0.0, RoundingMode::Down).value.is_sign_negative());
        assert!(add(0.0, -0.0, RoundingMode::Nearest).value.is_sign_positive());
    }

    #[test]
    fn overflow_depends_on_direction() {
        let r = add(f64::MAX, f64::MAX, RoundingMode::Nearest);
        assert_eq!(r.value, f64::INFINITY);
        assert!(r.flags.contains(Flags::OVERFLOW | Flags::INEXACT));
        assert_eq!(add(f64::MAX, f64::MAX, RoundingMode::Down).value, f64::MAX);
        assert_eq!(mul(-f64::MAX, 2.0, RoundingMode::Up).value, -f64::MAX);
        assert_eq!(mul(-f64::MAX, 2.0, RoundingMode::Chop).value, -f64::MAX);
    }

    #[test]
    fn underflow_is_flagged_when_inexact() {
        let r = mul(1e-300, 1e-300, RoundingMode::Up);
        assert_eq!(r.value, 5e-324);
        assert!(r.flags.contains(Flags::UNDERFLOW | Flags::INEXACT));
        let exact = div(5e-324, 1.0, RoundingMode::Nearest);
        assert!(exact.flags.is_empty());
    }

    #[test]
    fn widest_operand_spread_stays_finite() {
        // the largest exact sum and quotient buffers f64 operands can need
        let sum = add(f64::MAX, 5e-324, RoundingMode::Up);
        assert_eq!(sum.value, f64::INFINITY);
        assert_eq!(sum.flags, Flags::OVERFLOW | Flags::INEXACT);
        assert_eq!(add(f64::MAX, -5e-324, RoundingMode::Down).value, f64::from_bits(f64::MAX.to_bits() - 1));
        assert_eq!(add(-5e-324, f64::MAX, RoundingMode::Nearest), Outcome::new(f64::MAX, Flags::INEXACT));

        let q = div(5e-324, f64::MAX, RoundingMode::Up);
        assert_eq!(q.value, 5e-324);
        assert_eq!(q.flags, Flags::UNDERFLOW | Flags::INEXACT);
        assert_eq!(div(5e-324, f64::MAX, RoundingMode::Nearest).value, 0.0);
        assert_eq!(div(f64::MAX, 5e-324, RoundingMode::Chop).value, f64::MAX);
    }

    #[test]
    fn fused_multiply_add_rounds_once() {
        let a = 1.0 + f64::EPSILON;
        let b = 1.0 - f64::EPSILON;
        // a * b = 1 - eps^2 exactly, which a separate multiply rounds to 1
        let fused = fma(a, b, -1.0, RoundingMode::Nearest);
        assert_eq!(fused.value, -f64::EPSILON * f64::EPSILON);
        assert!(fused.is_exact());
        assert_eq!(sqr(-3.0, RoundingMode::Nearest).value, 9.0);
    }
}
