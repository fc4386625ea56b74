use super::value::{Interval, IntervalClass, classify};
use crate::directed;
use crate::rounding::RoundingMode;

impl Interval {
    pub fn add_assign(&mut self, a: &Interval, b: &Interval) {
        self.lo = directed::add(a.lo, b.lo, RoundingMode::Down).value;
        self.hi = directed::add(a.hi, b.hi, RoundingMode::Up).value;
        self.err = a.err.union(&b.err);
        self.settle();
    }

    pub fn sub_assign(&mut self, a: &Interval, b: &Interval) {
        self.lo = directed::sub(a.lo, b.hi, RoundingMode::Down).value;
        self.hi = directed::sub(a.hi, b.lo, RoundingMode::Up).value;
        self.err = a.err.union(&b.err);
        self.settle();
    }

    pub fn neg_assign(&mut self, a: &Interval) {
        self.lo = -a.hi;
        self.hi = -a.lo;
        self.err = a.err;
    }

    pub fn mul_assign(&mut self, a: &Interval, b: &Interval) {
        let class_a = classify(a, false);
        let class_b = classify(b, false);
        let err = a.err.union(&b.err);

        let mkmul = |out: &mut Interval, lo_a: f64, lo_b: f64, hi_a: f64, hi_b: f64| {
            out.lo = epmul(lo_a, lo_b, RoundingMode::Down);
            out.hi = epmul(hi_a, hi_b, RoundingMode::Up);
            out.err = err;
        };

        match (class_a, class_b) {
            (IntervalClass::Pos, IntervalClass::Pos) => mkmul(self, a.lo, b.lo, a.hi, b.hi),
            (IntervalClass::Pos, IntervalClass::Neg) => mkmul(self, a.hi, b.lo, a.lo, b.hi),
            (IntervalClass::Pos, IntervalClass::Mix) => mkmul(self, a.hi, b.lo, a.hi, b.hi),
            (IntervalClass::Neg, IntervalClass::Pos) => mkmul(self, a.lo, b.hi, a.hi, b.lo),
            (IntervalClass::Neg, IntervalClass::Neg) => mkmul(self, a.hi, b.hi, a.lo, b.lo),
            (IntervalClass::Neg, IntervalClass::Mix) => mkmul(self, a.lo, b.hi, a.lo, b.lo),
            (IntervalClass::Mix, IntervalClass::Pos) => mkmul(self, a.lo, b.hi, a.hi, b.hi),
            (IntervalClass::Mix, IntervalClass::Neg) => mkmul(self, a.hi, b.lo, a.lo, b.lo),
            (IntervalClass::Mix, IntervalClass::Mix) => {
                let mut other = *self;
                mkmul(self, a.hi, b.lo, a.lo, b.lo);
                mkmul(&mut other, a.lo, b.hi, a.hi, b.hi);
                self.union_assign(other);
            }
        }
        self.settle();
    }

    /// A divisor that touches zero gives `[-inf, inf]` flagged partial;
    /// `[0, 0]` is flagged total as well
    pub fn div_assign(&mut self, a: &Interval, b: &Interval) {
        let class_a = classify(a, true);
        let class_b = classify(b, true);

        self.err = a.err.union(&b.err);
        if b.lo <= 0.0 && b.hi >= 0.0 {
            self.err.partial = true;
        }
        if b.lo == 0.0 && b.hi == 0.0 {
            self.err.total = true;
            self.err.partial = true;
        }

        let (num_lo, den_lo, num_hi, den_hi) = match (class_a, class_b) {
            (_, IntervalClass::Mix) => {
                self.lo = f64::NEG_INFINITY;
                self.hi = f64::INFINITY;
                return;
            }
            (IntervalClass::Pos, IntervalClass::Pos) => (a.lo, b.hi, a.hi, b.lo),
            (IntervalClass::Pos, IntervalClass::Neg) => (a.hi, b.hi, a.lo, b.lo),
            (IntervalClass::Neg, IntervalClass::Pos) => (a.lo, b.lo, a.hi, b.hi),
            (IntervalClass::Neg, IntervalClass::Neg) => (a.hi, b.lo, a.lo, b.hi),
            (IntervalClass::Mix, IntervalClass::Pos) => (a.lo, b.lo, a.hi, b.lo),
            (IntervalClass::Mix, IntervalClass::Neg) => (a.hi, b.hi, a.lo, b.hi),
        };
        self.lo = directed::div(num_lo, den_lo, RoundingMode::Down).value;
        self.hi = directed::div(num_hi, den_hi, RoundingMode::Up).value;
        self.settle();
    }

    pub fn fma_assign(&mut self, a: &Interval, b: &Interval, c: &Interval) {
        let mut product = Interval::default();
        product.mul_assign(a, b);
        self.add_assign(&product, c);
    }
}

/// Endpoint product where a zero factor wins over an infinite one
fn epmul(a: f64, b: f64, mode: RoundingMode) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    directed::mul(a, b, mode).value
}
