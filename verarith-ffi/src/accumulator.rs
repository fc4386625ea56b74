use crate::{VerarithError, rounding_mode};
use std::cmp::Ordering;
use std::slice;
use verarith::Accumulator;

/// Opaque accumulator handle
pub struct VerarithAccumulator {
    pub(crate) accu: Accumulator,
    /// Exception flags raised by contributions since the last reset
    pub(crate) flags: u32,
}

/// Returned by `verarith_accumulator_compare` when either side is NaN
pub const VERARITH_UNORDERED: i32 = 2;

#[unsafe(no_mangle)]
pub extern "C" fn verarith_accumulator_new() -> *mut VerarithAccumulator {
    Box::into_raw(Box::new(VerarithAccumulator {
        accu: Accumulator::new(),
        flags: 0,
    }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_free(accu: *mut VerarithAccumulator) {
    if !accu.is_null() {
        unsafe { drop(Box::from_raw(accu)) };
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_reset(accu: *mut VerarithAccumulator) {
    if let Some(wrapper) = unsafe { accu.as_mut() } {
        wrapper.accu.reset();
        wrapper.flags = 0;
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_add_product(
    accu: *mut VerarithAccumulator,
    x: f64,
    y: f64,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_mut() }) else {
        return VerarithError::InvalidInput;
    };
    wrapper.flags |= wrapper.accu.add_product(x, y).bits();
    VerarithError::Ok
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_sub_product(
    accu: *mut VerarithAccumulator,
    x: f64,
    y: f64,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_mut() }) else {
        return VerarithError::InvalidInput;
    };
    wrapper.flags |= wrapper.accu.sub_product(x, y).bits();
    VerarithError::Ok
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_add_value(
    accu: *mut VerarithAccumulator,
    x: f64,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_mut() }) else {
        return VerarithError::InvalidInput;
    };
    wrapper.flags |= wrapper.accu.add_value(x).bits();
    VerarithError::Ok
}

/// Add `sum(xs[i] * ys[i])` for `i < n`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_add_dot(
    accu: *mut VerarithAccumulator,
    xs: *const f64,
    ys: *const f64,
    n: usize,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_mut() }) else {
        return VerarithError::InvalidInput;
    };
    if n == 0 {
        return VerarithError::Ok;
    }
    if xs.is_null() || ys.is_null() {
        return VerarithError::InvalidInput;
    }
    let (xs, ys) = unsafe { (slice::from_raw_parts(xs, n), slice::from_raw_parts(ys, n)) };
    for (&x, &y) in xs.iter().zip(ys) {
        wrapper.flags |= wrapper.accu.add_product(x, y).bits();
    }
    VerarithError::Ok
}

/// Round the accumulated value once; `flags` (nullable) receives the
/// contribution flags together with those of the rounding
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_result(
    accu: *const VerarithAccumulator,
    mode: u32,
    out: *mut f64,
    flags: *mut u32,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_ref() }) else {
        return VerarithError::InvalidInput;
    };
    if out.is_null() {
        return VerarithError::InvalidInput;
    }
    let mode = match rounding_mode(mode) {
        Ok(mode) => mode,
        Err(e) => return e,
    };
    let rounded = wrapper.accu.result(mode);
    unsafe {
        *out = rounded.value;
        if !flags.is_null() {
            *flags = wrapper.flags | rounded.flags.bits();
        }
    }
    VerarithError::Ok
}

/// Exact `f64` readout; `NotFinite` for NaN or infinite states and
/// `InvalidInput` when the value needs rounding
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_exact(
    accu: *const VerarithAccumulator,
    out: *mut f64,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_ref() }) else {
        return VerarithError::InvalidInput;
    };
    if out.is_null() {
        return VerarithError::InvalidInput;
    }
    match f64::try_from(&wrapper.accu) {
        Ok(value) => {
            unsafe { *out = value };
            VerarithError::Ok
        }
        Err(err) => err.into(),
    }
}

/// One-shot `sum(xs[i] * ys[i])` rounded once in `mode`; the lengths must
/// agree
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_dot(
    xs: *const f64,
    nx: usize,
    ys: *const f64,
    ny: usize,
    mode: u32,
    out: *mut f64,
    flags: *mut u32,
) -> VerarithError {
    if out.is_null() || (xs.is_null() && nx != 0) || (ys.is_null() && ny != 0) {
        return VerarithError::InvalidInput;
    }
    let mode = match rounding_mode(mode) {
        Ok(mode) => mode,
        Err(e) => return e,
    };
    let xs: &[f64] = if nx == 0 { &[] } else { unsafe { slice::from_raw_parts(xs, nx) } };
    let ys: &[f64] = if ny == 0 { &[] } else { unsafe { slice::from_raw_parts(ys, ny) } };
    let accu = match Accumulator::dot(xs, ys) {
        Ok(accu) => accu,
        Err(err) => return err.into(),
    };
    let rounded = accu.value.result(mode);
    unsafe {
        *out = rounded.value;
        if !flags.is_null() {
            *flags = (accu.flags | rounded.flags).bits();
        }
    }
    VerarithError::Ok
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_result_interval(
    accu: *const VerarithAccumulator,
    lo: *mut f64,
    hi: *mut f64,
) -> VerarithError {
    let Some(wrapper) = (unsafe { accu.as_ref() }) else {
        return VerarithError::InvalidInput;
    };
    if lo.is_null() || hi.is_null() {
        return VerarithError::InvalidInput;
    }
    let (down, up) = wrapper.accu.result_interval();
    unsafe {
        *lo = down;
        *hi = up;
    }
    VerarithError::Ok
}

/// -1, 0 or 1; 0 for a null handle or a NaN state
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_sign(accu: *const VerarithAccumulator) -> i32 {
    unsafe { accu.as_ref() }.map_or(0, |wrapper| wrapper.accu.sign())
}

/// -1, 0 or 1 as `a` is below, equal to or above `b`;
/// `VERARITH_UNORDERED` for NaN states or null handles
#[unsafe(no_mangle)]
pub unsafe extern "C" fn verarith_accumulator_compare(
    a: *const VerarithAccumulator,
    b: *const VerarithAccumulator,
) -> i32 {
    let (Some(a), Some(b)) = (unsafe { a.as_ref() }, unsafe { b.as_ref() }) else {
        return VERARITH_UNORDERED;
    };
    match a.accu.compare(&b.accu) {
        Some(Ordering::Less) => -1,
        Some(Ordering::Equal) => 0,
        Some(Ordering::Greater) => 1,
        None => VERARITH_UNORDERED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VERARITH_ROUND_DOWN, VERARITH_ROUND_NEAREST, VERARITH_ROUND_UP};
    use verarith::Flags;

    #[test]
    fn lifecycle() {
        unsafe {
            let accu = verarith_accumulator_new();
            assert_eq!(verarith_accumulator_add_product(accu, 1e20, 1.0), VerarithError::Ok);
            assert_eq!(verarith_accumulator_add_value(accu, 1.0), VerarithError::Ok);
            assert_eq!(verarith_accumulator_sub_product(accu, 1e20, 1.0), VerarithError::Ok);

            let mut out = 0.0;
            let mut flags = u32::MAX;
            let status = verarith_accumulator_result(accu, VERARITH_ROUND_NEAREST, &mut out, &mut flags);
            assert_eq!(status, VerarithError::Ok);
            assert_eq!(out, 1.0);
            assert_eq!(flags, 0);
            assert_eq!(verarith_accumulator_sign(accu), 1);

            verarith_accumulator_reset(accu);
            assert_eq!(verarith_accumulator_sign(accu), 0);
            verarith_accumulator_free(accu);
        }
    }

    #[test]
    fn dot_and_interval() {
        unsafe {
            let accu = verarith_accumulator_new();
            let xs = [1.0 / 3.0, 1.0 / 3.0];
            let ys = [1.0, 2.0];
            assert_eq!(
                verarith_accumulator_add_dot(accu, xs.as_ptr(), ys.as_ptr(), 2),
                VerarithError::Ok
            );
            let (mut lo, mut hi) = (0.0, 0.0);
            assert_eq!(verarith_accumulator_result_interval(accu, &mut lo, &mut hi), VerarithError::Ok);
            assert_eq!(hi, f64::from_bits(lo.to_bits() + 1));

            let mut down = 0.0;
            let mut up = 0.0;
            verarith_accumulator_result(accu, VERARITH_ROUND_DOWN, &mut down, std::ptr::null_mut());
            verarith_accumulator_result(accu, VERARITH_ROUND_UP, &mut up, std::ptr::null_mut());
            assert_eq!((down, up), (lo, hi));
            verarith_accumulator_free(accu);
        }
    }

    #[test]
    fn invalid_contributions_set_flags() {
        unsafe {
            let accu = verarith_accumulator_new();
            verarith_accumulator_add_product(accu, 0.0, f64::INFINITY);
            let mut out = 0.0;
            let mut flags = 0;
            verarith_accumulator_result(accu, VERARITH_ROUND_NEAREST, &mut out, &mut flags);
            assert!(out.is_nan());
            assert_ne!(flags & Flags::INVALID.bits(), 0);
            assert_eq!(verarith_accumulator_result(accu, 9, &mut out, &mut flags), VerarithError::InvalidMode);
            verarith_accumulator_free(accu);
        }
    }

    #[test]
    fn exact_readout() {
        unsafe {
            let accu = verarith_accumulator_new();
            let mut out = 0.0;
            verarith_accumulator_add_product(accu, 0.5, 3.0);
            assert_eq!(verarith_accumulator_exact(accu, &mut out), VerarithError::Ok);
            assert_eq!(out, 1.5);
            verarith_accumulator_add_value(accu, 1e-300);
            assert_eq!(verarith_accumulator_exact(accu, &mut out), VerarithError::InvalidInput);
            verarith_accumulator_add_value(accu, f64::INFINITY);
            assert_eq!(verarith_accumulator_exact(accu, &mut out), VerarithError::NotFinite);
            verarith_accumulator_free(accu);
        }
    }

    #[test]
    fn one_shot_dot() {
        let xs = [1e300, 1.0, -1e300];
        let ys = [1e10, 0.5, 1e10];
        let (mut out, mut flags) = (0.0, u32::MAX);
        unsafe {
            let status = verarith_dot(xs.as_ptr(), 3, ys.as_ptr(), 3, VERARITH_ROUND_NEAREST, &mut out, &mut flags);
            assert_eq!(status, VerarithError::Ok);
            assert_eq!((out, flags), (0.5, 0));

            let status = verarith_dot(xs.as_ptr(), 3, ys.as_ptr(), 2, VERARITH_ROUND_NEAREST, &mut out, &mut flags);
            assert_eq!(status, VerarithError::LengthMismatch);

            let zero = [0.0];
            let inf = [f64::INFINITY];
            let status = verarith_dot(zero.as_ptr(), 1, inf.as_ptr(), 1, VERARITH_ROUND_UP, &mut out, &mut flags);
            assert_eq!(status, VerarithError::Ok);
            assert!(out.is_nan());
            assert_eq!(flags, Flags::INVALID.bits());

            let status = verarith_dot(std::ptr::null(), 0, std::ptr::null(), 0, VERARITH_ROUND_DOWN, &mut out, &mut flags);
            assert_eq!((status, out, flags), (VerarithError::Ok, 0.0, 0));
            assert_eq!(
                verarith_dot(std::ptr::null(), 1, ys.as_ptr(), 1, 0, &mut out, &mut flags),
                VerarithError::InvalidInput
            );
        }
    }

    #[test]
    fn null_handles() {
        unsafe {
            let mut out = 0.0;
            assert_eq!(
                verarith_accumulator_result(std::ptr::null(), 0, &mut out, std::ptr::null_mut()),
                VerarithError::InvalidInput
            );
            assert_eq!(verarith_accumulator_add_value(std::ptr::null_mut(), 1.0), VerarithError::InvalidInput);
            assert_eq!(verarith_accumulator_compare(std::ptr::null(), std::ptr::null()), VERARITH_UNORDERED);
            verarith_accumulator_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn ordering() {
        unsafe {
            let a = verarith_accumulator_new();
            let b = verarith_accumulator_new();
            verarith_accumulator_add_value(a, 0.1);
            verarith_accumulator_add_product(b, 0.1, 1.0);
            assert_eq!(verarith_accumulator_compare(a, b), 0);
            verarith_accumulator_add_value(b, 5e-324);
            assert_eq!(verarith_accumulator_compare(a, b), -1);
            verarith_accumulator_free(a);
            verarith_accumulator_free(b);
        }
    }
}
