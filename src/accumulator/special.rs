//! Non-finite state of an accumulator and the zero-sign bookkeeping
use bitflags::bitflags;

use crate::rounding::Flags;

/// Payload of the NaN produced by an invalid combination
pub const INVALID_NAN_PAYLOAD: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Special {
    #[default]
    Finite,
    PosInf,
    NegInf,
    Nan { payload: u64 },
}

impl Special {
    pub fn infinity(negative: bool) -> Special {
        if negative {
            Special::NegInf
        } else {
            Special::PosInf
        }
    }

    /// Quiet NaN carrying the given payload bits
    pub fn nan_from(x: f64) -> Special {
        Special::Nan {
            payload: x.to_bits() & ((1 << 51) - 1),
        }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self == Special::Finite
    }

    pub fn negate(self) -> Special {
        match self {
            Special::PosInf => Special::NegInf,
            Special::NegInf => Special::PosInf,
            other => other,
        }
    }

    /// Merge accumulated state with an incoming contribution.
    ///
    /// NaN absorbs everything, opposite infinities are invalid, and a finite
    /// contribution never changes a non-finite state.
    pub fn combine(self, incoming: Special) -> (Special, Flags) {
        match (self, incoming) {
            (Special::Nan { .. }, _) => (self, Flags::empty()),
            (_, Special::Nan { .. }) => (incoming, Flags::empty()),
            (Special::PosInf, Special::NegInf) | (Special::NegInf, Special::PosInf) => (
                Special::Nan {
                    payload: INVALID_NAN_PAYLOAD,
                },
                Flags::INVALID,
            ),
            (Special::Finite, _) => (incoming, Flags::empty()),
            (_, _) => (self, Flags::empty()),
        }
    }

    /// The `f64` form of a non-finite state
    pub fn to_f64(self) -> Option<f64> {
        match self {
            Special::Finite => None,
            Special::PosInf => Some(f64::INFINITY),
            Special::NegInf => Some(f64::NEG_INFINITY),
            Special::Nan { payload } => Some(f64::from_bits(
                f64::NAN.to_bits() | (payload & ((1 << 51) - 1)),
            )),
        }
    }
}

bitflags! {
    /// Signs of the zeros (and non-zero terms) that went into an accumulator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ZeroSigns: u8 {
        const POSITIVE = 1 << 0;
        const NEGATIVE = 1 << 1;
    }
}

impl Default for ZeroSigns {
    fn default() -> Self {
        ZeroSigns::empty()
    }
}

impl ZeroSigns {
    pub fn of(negative: bool) -> ZeroSigns {
        if negative {
            ZeroSigns::NEGATIVE
        } else {
            ZeroSigns::POSITIVE
        }
    }

    pub fn swapped(self) -> ZeroSigns {
        let mut out = ZeroSigns::empty();
        out.set(ZeroSigns::POSITIVE, self.contains(ZeroSigns::NEGATIVE));
        out.set(ZeroSigns::NEGATIVE, self.contains(ZeroSigns::POSITIVE));
        out
    }

    /// Sign of an exact zero result: `-0` only if every contribution was a
    /// negative zero, or contributions of both signs met in round-down
    pub fn zero_is_negative(self, round_down: bool) -> bool {
        if self == ZeroSigns::NEGATIVE {
            true
        } else if self == ZeroSigns::all() {
            round_down
        } else {
            false
        }
    }
}
