pub mod accumulator;
pub mod context;
pub mod decimal;
pub mod directed;
pub mod error;
#[cfg(all(feature = "hardware-rounding", target_arch = "x86_64"))]
pub mod hardware;
pub mod interval;
pub mod mantissa;
mod mpfr;
pub mod number;
pub mod rounding;
pub mod traps;

pub use accumulator::{Accumulator, Special, ZeroSigns};
pub use context::{ContextBuilder, RoundingContext};
pub use decimal::{Format, Layout};
pub use error::{ArithError, ParseError};
pub use interval::{ErrorFlags, Interval};
pub use mantissa::Mantissa;
pub use number::{MpNumber, Sign};
pub use rounding::{Flags, Outcome, Remainder, RoundingMode};
pub use traps::{Disposition, TrapEntry, TrapKind, TrapLog, TrapTable};
