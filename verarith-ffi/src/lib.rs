use std::os::raw::c_char;

use verarith::{ArithError, ParseError, RoundingMode};

pub mod accumulator;
pub mod arith;

pub use accumulator::VerarithAccumulator;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerarithError {
    Ok = 0,
    InvalidInput = -1,
    InvalidMode = -2,
    LengthMismatch = -3,
    NotFinite = -4,
    Panic = -99,
}

impl From<ArithError> for VerarithError {
    fn from(err: ArithError) -> Self {
        match err {
            ArithError::IndexRange { .. } => VerarithError::LengthMismatch,
            ArithError::InvalidOperation => VerarithError::NotFinite,
            _ => VerarithError::InvalidInput,
        }
    }
}

impl From<ParseError> for VerarithError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::NonFinite => VerarithError::NotFinite,
            ParseError::Arith(err) => err.into(),
            _ => VerarithError::InvalidInput,
        }
    }
}

pub const VERARITH_ABI_VERSION: u32 = 1;

/// Rounding mode codes accepted across the ABI
pub const VERARITH_ROUND_NEAREST: u32 = 0;
pub const VERARITH_ROUND_UP: u32 = 1;
pub const VERARITH_ROUND_DOWN: u32 = 2;
pub const VERARITH_ROUND_CHOP: u32 = 3;

pub(crate) fn rounding_mode(code: u32) -> Result<RoundingMode, VerarithError> {
    match code {
        VERARITH_ROUND_NEAREST => Ok(RoundingMode::Nearest),
        VERARITH_ROUND_UP => Ok(RoundingMode::Up),
        VERARITH_ROUND_DOWN => Ok(RoundingMode::Down),
        VERARITH_ROUND_CHOP => Ok(RoundingMode::Chop),
        _ => Err(VerarithError::InvalidMode),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn verarith_version() -> u32 {
    VERARITH_ABI_VERSION
}

#[unsafe(no_mangle)]
pub extern "C" fn verarith_error_message(error: VerarithError) -> *const c_char {
    match error {
        VerarithError::Ok => c"Success".as_ptr(),
        VerarithError::InvalidInput => c"Invalid input".as_ptr(),
        VerarithError::InvalidMode => c"Unknown rounding mode".as_ptr(),
        VerarithError::LengthMismatch => c"Operand lengths differ".as_ptr(),
        VerarithError::NotFinite => c"Value is not finite".as_ptr(),
        VerarithError::Panic => c"Internal panic".as_ptr(),
    }
}
