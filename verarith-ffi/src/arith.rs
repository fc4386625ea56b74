use crate::{VerarithError, rounding_mode};
use std::ffi::CStr;
use std::os::raw::c_char;
use verarith::{MpNumber, Outcome, RoundingMode, directed};

#[inline]
unsafe fn write_outcome(
    op: fn(f64, f64, RoundingMode) -> Outcome<f64>,
    a: f64,
    b: f64,
    mode: u32,
    out: *mut f64,
    flags: *mut u32,
) -> VerarithError {
    if out.is_null() {
        return VerarithError::InvalidInput;
    }
    let mode = match rounding_mode(mode) {
        Ok(mode) => mode,
        Err(e) => return e,
    };
    let result = op(a, b, mode);
    unsafe {
        *out = result.value;
        if !flags.is_null() {
            *flags = result.flags.bits();
        }
    }
    VerarithError::Ok
}

macro_rules! directed_binary_op {
    ($name:ident, $func:path) => {
        /// `*out = a op b` rounded in `mode`; `flags` may be null
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(
            a: f64,
            b: f64,
            mode: u32,
            out: *mut f64,
            flags: *mut u32,
        ) -> VerarithError {
            unsafe { write_outcome($func, a, b, mode, out, flags) }
        }
    };
}

directed_binary_op!(verarith_add, directed::add);
directed_binary_op!(verarith_sub, directed::sub);
directed_binary_op!(verarith_mul, directed::mul);
directed_binary_op!(verarith_div, directed::div);

/// Tightest `f64` enclosure `[lo, hi]` of a decimal literal; `flags` may be
/// null and receives the flags of both bounds
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_parse_decimal(
    text: *const c_char,
    lo: *mut f64,
    hi: *mut f64,
    flags: *mut u32,
) -> VerarithError {
    if text.is_null() || lo.is_null() || hi.is_null() {
        return VerarithError::InvalidInput;
    }
    let Ok(text) = unsafe { CStr::from_ptr(text) }.to_str() else {
        return VerarithError::InvalidInput;
    };
    // directed roundings compose, so rounding to 53 bits first loses nothing
    let bound = |mode| {
        MpNumber::from_decimal(text, f64::MANTISSA_DIGITS, mode).map(|parsed| {
            let narrowed = parsed.value.to_f64(mode);
            Outcome::new(narrowed.value, parsed.flags | narrowed.flags)
        })
    };
    let (down, up) = match (bound(RoundingMode::Down), bound(RoundingMode::Up)) {
        (Ok(down), Ok(up)) => (down, up),
        (Err(err), _) | (_, Err(err)) => return err.into(),
    };
    unsafe {
        *lo = down.value;
        *hi = up.value;
        if !flags.is_null() {
            *flags = (down.flags | up.flags).bits();
        }
    }
    VerarithError::Ok
}
