use std::cmp::Ordering;

use crate::accumulator::Accumulator;
use crate::directed;
use crate::error::ArithError;
use crate::number::MpNumber;
use crate::rounding::{Flags, RoundingMode};

/// Closed `f64` interval `[lo, hi]` whose endpoints come from directed
/// rounding, so the exact result of every operation lies inside it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
    pub err: ErrorFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorFlags {
    /// Some point of the inputs has no result
    pub partial: bool,
    /// No point of the inputs has a result
    pub total: bool,
}

impl Default for Interval {
    fn default() -> Self {
        Interval::point(0.0)
    }
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        let err = if lo.is_nan() || hi.is_nan() || (lo == hi && lo.is_infinite()) {
            ErrorFlags::error()
        } else {
            ErrorFlags::none()
        };
        Interval { lo, hi, err }
    }

    pub fn point(x: f64) -> Self {
        Interval::new(x, x)
    }

    pub fn entire() -> Self {
        Interval::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Tightest enclosure of the exact accumulated value
    pub fn from_accumulator(accu: &Accumulator) -> Self {
        let (lo, hi) = accu.result_interval();
        Interval::new(lo, hi)
    }

    /// Enclosure of `sum(xs[i] * ys[i])` with a single rounding per bound.
    /// An invalid product (`0 * inf`, a signaling NaN) marks the result as
    /// an error.
    pub fn enclose_dot(xs: &[f64], ys: &[f64]) -> Result<Self, ArithError> {
        let accu = Accumulator::dot(xs, ys)?;
        let mut out = Interval::from_accumulator(&accu.value);
        if accu.flags.contains(Flags::INVALID) {
            out.err = ErrorFlags::error();
        }
        Ok(out)
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lo <= x && x <= self.hi
    }

    /// Whether the exact value `x` lies inside
    pub fn encloses(&self, x: &MpNumber) -> bool {
        let above_lo = match MpNumber::from_f64(self.lo) {
            Ok(lo) => lo <= *x,
            Err(_) => self.lo == f64::NEG_INFINITY,
        };
        let below_hi = match MpNumber::from_f64(self.hi) {
            Ok(hi) => *x <= hi,
            Err(_) => self.hi == f64::INFINITY,
        };
        above_lo && below_hi
    }

    /// Upper bound on `hi - lo`
    pub fn width(&self) -> f64 {
        directed::sub(self.hi, self.lo, RoundingMode::Up).value
    }

    pub fn is_empty(&self) -> bool {
        self.err.total
    }

    pub fn union_assign(&mut self, other: Interval) {
        if self.err.total {
            *self = other;
            self.err.partial = true;
            return;
        }

        if other.err.total {
            self.err.partial = true;
            return;
        }

        self.lo = min_endpoint(self.lo, other.lo);
        self.hi = max_endpoint(self.hi, other.hi);
        self.err = self.err.union_disjoint(&other.err);
    }

    /// A NaN endpoint can only come from erroneous inputs
    pub(crate) fn settle(&mut self) {
        if self.lo.is_nan() || self.hi.is_nan() {
            self.err = ErrorFlags::error();
        }
    }
}

// -0.0 and 0.0 compare equal; keep the one already there
fn min_endpoint(a: f64, b: f64) -> f64 {
    match b.partial_cmp(&a) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

fn max_endpoint(a: f64, b: f64) -> f64 {
    match b.partial_cmp(&a) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

impl ErrorFlags {
    pub fn new(partial: bool, total: bool) -> Self {
        ErrorFlags { partial, total }
    }

    pub fn none() -> Self {
        ErrorFlags::new(false, false)
    }

    pub fn error() -> Self {
        ErrorFlags::new(true, true)
    }

    pub fn union(&self, other: &ErrorFlags) -> ErrorFlags {
        ErrorFlags::new(self.partial || other.partial, self.total || other.total)
    }

    pub fn union_disjoint(&self, other: &ErrorFlags) -> ErrorFlags {
        ErrorFlags::new(self.partial || other.partial, self.total && other.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalClass {
    Pos = 1,
    Neg = -1,
    Mix = 0,
}

/// Sign class; `strict` excludes intervals touching zero from `Pos`/`Neg`
pub fn classify(ival: &Interval, strict: bool) -> IntervalClass {
    if strict {
        if ival.lo > 0.0 {
            IntervalClass::Pos
        } else if ival.hi < 0.0 {
            IntervalClass::Neg
        } else {
            IntervalClass::Mix
        }
    } else if ival.lo >= 0.0 {
        IntervalClass::Pos
    } else if ival.hi <= 0.0 {
        IntervalClass::Neg
    } else {
        IntervalClass::Mix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_flags() {
        assert_eq!(Interval::new(1.0, 2.0).err, ErrorFlags::none());
        assert_eq!(Interval::new(f64::NAN, 2.0).err, ErrorFlags::error());
        assert_eq!(Interval::point(f64::INFINITY).err, ErrorFlags::error());
        assert_eq!(Interval::entire().err, ErrorFlags::none());
    }

    #[test]
    fn classes() {
        assert_eq!(classify(&Interval::new(0.0, 1.0), false), IntervalClass::Pos);
        assert_eq!(classify(&Interval::new(0.0, 1.0), true), IntervalClass::Mix);
        assert_eq!(classify(&Interval::new(-1.0, -0.0), false), IntervalClass::Neg);
        assert_eq!(classify(&Interval::new(-1.0, 1.0), false), IntervalClass::Mix);
    }

    #[test]
    fn union_skips_total_errors() {
        let mut a = Interval::new(1.0, 2.0);
        a.union_assign(Interval::new(-3.0, 1.5));
        assert_eq!((a.lo, a.hi), (-3.0, 2.0));

        let mut bad = Interval::point(f64::NAN);
        bad.union_assign(Interval::new(1.0, 2.0));
        assert_eq!((bad.lo, bad.hi), (1.0, 2.0));
        assert!(bad.err.partial && !bad.err.total);

        let mut good = Interval::new(1.0, 2.0);
        good.union_assign(Interval::point(f64::NAN));
        assert_eq!((good.lo, good.hi), (1.0, 2.0));
        assert!(good.err.partial);
    }

    #[test]
    fn dot_enclosure_is_tight() {
        let x = Interval::enclose_dot(&[1e20, 1.0, -1e20], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!((x.lo, x.hi), (1.0, 1.0));

        let third = Interval::enclose_dot(&[1.0 / 3.0, 1.0 / 3.0], &[1.0, 2.0]).unwrap();
        assert!(third.lo < third.hi);
        assert_eq!(third.hi, f64::from_bits(third.lo.to_bits() + 1));
        assert!(Interval::enclose_dot(&[1.0], &[]).is_err());

        let invalid = Interval::enclose_dot(&[2.0, 0.0], &[1.0, f64::INFINITY]).unwrap();
        assert_eq!(invalid.err, ErrorFlags::error());
        assert!(invalid.is_empty());
    }

    #[test]
    fn membership() {
        let i = Interval::new(-1.0, 0.5);
        assert!(i.contains(0.0) && i.contains(-1.0) && !i.contains(0.75));
        let tenth = MpNumber::from_decimal("0.1", 200, RoundingMode::Nearest).unwrap().value;
        assert!(Interval::new(0.09999999999999999, 0.1).encloses(&tenth));
        assert!(!Interval::point(0.1).encloses(&tenth));
        assert!(Interval::entire().encloses(&tenth));
        assert_eq!(Interval::new(1.0, 3.0).width(), 2.0);
    }
}
