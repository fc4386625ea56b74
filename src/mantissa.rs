//! Radix 2^32 digit storage and the digit-level kernels (add, subtract,
//! multiply, divide) the multi-precision number is built on.
//!
//! Digit slices are most-significant-first: digit 0 of a magnitude with
//! exponent `e` has weight `2^(32 * e)`, digit `i` has weight
//! `2^(32 * (e - i))`.
use std::cmp::Ordering;

use crate::error::ArithError;

pub type Digit = u32;
pub type DoubleDigit = u64;
pub const DIGIT_BITS: u32 = Digit::BITS;

/// Owned, growable digit buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Mantissa {
    digits: Vec<Digit>,
}

impl Mantissa {
    pub fn new() -> Self {
        Mantissa { digits: Vec::new() }
    }

    /// Reserve room for `len` digits, reporting allocation failure as an error
    pub fn with_capacity(len: usize) -> Result<Self, ArithError> {
        let mut digits = Vec::new();
        digits
            .try_reserve_exact(len)
            .map_err(|_| ArithError::Allocation { digits: len })?;
        Ok(Mantissa { digits })
    }

    pub fn from_digits(digits: Vec<Digit>) -> Self {
        Mantissa { digits }
    }

    #[inline]
    pub fn digits(&self) -> &[Digit] {
        &self.digits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Leading zero bits of digit 0
    pub fn leading_zeros(&self) -> u32 {
        self.digits.first().map_or(DIGIT_BITS, |d| d.leading_zeros())
    }

    /// Bits from the most significant set bit to the least significant set bit
    pub fn significant_bits(&self) -> u64 {
        match (self.digits.first(), self.digits.last()) {
            (Some(first), Some(last)) => {
                self.digits.len() as u64 * DIGIT_BITS as u64
                    - first.leading_zeros() as u64
                    - last.trailing_zeros() as u64
            }
            _ => 0,
        }
    }

    pub fn into_digits(self) -> Vec<Digit> {
        self.digits
    }

    /// Release spare capacity after a rounding step shrank the value
    pub fn shrink_to_fit(&mut self) {
        self.digits.shrink_to_fit();
    }
}

/// Zero-filled buffer of `len` digits
pub(crate) fn zeroed(len: usize) -> Result<Vec<Digit>, ArithError> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| ArithError::Allocation { digits: len })?;
    out.resize(len, 0);
    Ok(out)
}

/// Strip leading and trailing zero digits, returning the adjusted exponent
pub(crate) fn normalize_digits(digits: &mut Vec<Digit>, exponent: i64) -> i64 {
    let lead = digits.iter().take_while(|&&d| d == 0).count();
    if lead == digits.len() {
        digits.clear();
        return exponent;
    }
    digits.drain(..lead);
    while digits.last() == Some(&0) {
        digits.pop();
    }
    exponent - lead as i64
}

/// Bit `idx` counted from the top of digit 0; bits outside the slice are zero
pub(crate) fn bit_at(digits: &[Digit], idx: i64) -> bool {
    if idx < 0 {
        return false;
    }
    let word = (idx / DIGIT_BITS as i64) as usize;
    let offset = (idx % DIGIT_BITS as i64) as u32;
    digits
        .get(word)
        .is_some_and(|d| (d >> (DIGIT_BITS - 1 - offset)) & 1 == 1)
}

/// Whether any bit at index `idx` or later is set
pub(crate) fn any_bits_from(digits: &[Digit], idx: i64) -> bool {
    if idx <= 0 {
        return digits.iter().any(|&d| d != 0);
    }
    let word = (idx / DIGIT_BITS as i64) as usize;
    if word >= digits.len() {
        return false;
    }
    let offset = (idx % DIGIT_BITS as i64) as u32;
    let mask = Digit::MAX >> offset;
    digits[word] & mask != 0 || digits[word + 1..].iter().any(|&d| d != 0)
}

/// `count` (at most 64) bits starting at bit `start`, right aligned
pub(crate) fn extract_bits(digits: &[Digit], start: i64, count: u32) -> u64 {
    debug_assert!(count <= 64);
    (0..count as i64).fold(0u64, |acc, i| (acc << 1) | bit_at(digits, start + i) as u64)
}

/// Normalized digits of `value * 2^exp2`, with the exponent of digit 0
pub(crate) fn place_bits(value: u128, exp2: i64) -> (Vec<Digit>, i64) {
    let q = exp2.div_euclid(DIGIT_BITS as i64);
    let r = exp2.rem_euclid(DIGIT_BITS as i64) as u32;
    let low = value << r;
    let high = if r == 0 { 0 } else { value >> (128 - r) };
    let mut digits = vec![
        high as Digit,
        (low >> 96) as Digit,
        (low >> 64) as Digit,
        (low >> 32) as Digit,
        low as Digit,
    ];
    let exponent = normalize_digits(&mut digits, q + 4);
    (digits, exponent)
}

/// Compare two normalized magnitudes
pub(crate) fn cmp_magnitude(a: &[Digit], ea: i64, b: &[Digit], eb: i64) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    ea.cmp(&eb).then_with(|| {
        let n = a.len().max(b.len());
        (0..n)
            .map(|i| {
                let x = a.get(i).copied().unwrap_or(0);
                let y = b.get(i).copied().unwrap_or(0);
                x.cmp(&y)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Exponent of the lowest digit
#[inline]
pub(crate) fn low_weight(digits: &[Digit], exponent: i64) -> i64 {
    exponent - digits.len() as i64 + 1
}

/// Exact sum of two magnitudes, unnormalized, with the exponent of digit 0
pub(crate) fn add_magnitudes(
    a: &[Digit],
    ea: i64,
    b: &[Digit],
    eb: i64,
) -> Result<(Vec<Digit>, i64), ArithError> {
    let top = ea.max(eb) + 1;
    let low = low_weight(a, ea).min(low_weight(b, eb));
    let mut out = zeroed((top - low + 1) as usize)?;
    let oa = (top - ea) as usize;
    out[oa..oa + a.len()].copy_from_slice(a);

    let ob = (top - eb) as usize;
    let mut carry: DoubleDigit = 0;
    for (i, &d) in b.iter().enumerate().rev() {
        let s = out[ob + i] as DoubleDigit + d as DoubleDigit + carry;
        out[ob + i] = s as Digit;
        carry = s >> DIGIT_BITS;
    }
    let mut idx = ob;
    while carry != 0 {
        idx -= 1;
        let s = out[idx] as DoubleDigit + carry;
        out[idx] = s as Digit;
        carry = s >> DIGIT_BITS;
    }
    Ok((out, top))
}

/// Exact `|a| - |b|` for `|a| >= |b|`, unnormalized
pub(crate) fn sub_magnitudes(
    a: &[Digit],
    ea: i64,
    b: &[Digit],
    eb: i64,
) -> Result<(Vec<Digit>, i64), ArithError> {
    let top = ea.max(eb);
    let low = low_weight(a, ea).min(low_weight(b, eb));
    let mut out = zeroed((top - low + 1) as usize)?;
    let oa = (top - ea) as usize;
    out[oa..oa + a.len()].copy_from_slice(a);

    let ob = (top - eb) as usize;
    let mut borrow = false;
    for (i, &d) in b.iter().enumerate().rev() {
        let (x, b1) = out[ob + i].overflowing_sub(d);
        let (x, b2) = x.overflowing_sub(borrow as Digit);
        out[ob + i] = x;
        borrow = b1 || b2;
    }
    let mut idx = ob;
    while borrow && idx > 0 {
        idx -= 1;
        let (x, b1) = out[idx].overflowing_sub(1);
        out[idx] = x;
        borrow = b1;
    }
    debug_assert!(!borrow, "subtrahend exceeded minuend");
    Ok((out, top))
}

/// Schoolbook product; digit 0 of the result has exponent `ea + eb + 1`
pub(crate) fn mul_magnitudes(a: &[Digit], b: &[Digit]) -> Result<Vec<Digit>, ArithError> {
    let mut out = zeroed(a.len() + b.len())?;
    for (i, &x) in a.iter().enumerate().rev() {
        let mut carry: DoubleDigit = 0;
        for (j, &y) in b.iter().enumerate().rev() {
            let t = x as DoubleDigit * y as DoubleDigit + out[i + j + 1] as DoubleDigit + carry;
            out[i + j + 1] = t as Digit;
            carry = t >> DIGIT_BITS;
        }
        out[i] = carry as Digit;
    }
    Ok(out)
}

/// Knuth algorithm D. Both operands most-significant-first with a non-zero
/// leading digit and `u.len() >= v.len()`. Returns the quotient digits
/// (most significant first, `u.len() - v.len() + 1` of them) and whether the
/// remainder is non-zero.
pub(crate) fn divrem_magnitudes(u: &[Digit], v: &[Digit]) -> Result<(Vec<Digit>, bool), ArithError> {
    debug_assert!(!v.is_empty() && v[0] != 0 && u.len() >= v.len());
    let base: DoubleDigit = 1 << DIGIT_BITS;
    let m = u.len();
    let n = v.len();
    // little-endian working copies
    let u_le: Vec<Digit> = u.iter().rev().copied().collect();
    let v_le: Vec<Digit> = v.iter().rev().copied().collect();
    let mut q = zeroed(m - n + 1)?;

    if n == 1 {
        let d = v_le[0] as DoubleDigit;
        let mut rem: DoubleDigit = 0;
        for j in (0..m).rev() {
            let t = (rem << DIGIT_BITS) | u_le[j] as DoubleDigit;
            q[j] = (t / d) as Digit;
            rem = t % d;
        }
        q.reverse();
        return Ok((q, rem != 0));
    }

    // normalize so the divisor's top bit is set
    let s = v_le[n - 1].leading_zeros();
    let shl = |hi: Digit, lo: Digit| -> Digit {
        (((hi as DoubleDigit) << s) | ((lo as DoubleDigit) >> (DIGIT_BITS - s))) as Digit
    };
    let mut vn = zeroed(n)?;
    for i in (1..n).rev() {
        vn[i] = shl(v_le[i], v_le[i - 1]);
    }
    vn[0] = v_le[0] << s;
    let mut un = zeroed(m + 1)?;
    un[m] = ((u_le[m - 1] as DoubleDigit) >> (DIGIT_BITS - s)) as Digit;
    for i in (1..m).rev() {
        un[i] = shl(u_le[i], u_le[i - 1]);
    }
    un[0] = u_le[0] << s;

    let top = vn[n - 1] as DoubleDigit;
    let next = vn[n - 2] as DoubleDigit;
    for j in (0..=m - n).rev() {
        let num = ((un[j + n] as DoubleDigit) << DIGIT_BITS) | un[j + n - 1] as DoubleDigit;
        let mut qhat = num / top;
        let mut rhat = num % top;
        while qhat >= base || qhat * next > ((rhat << DIGIT_BITS) | un[j + n - 2] as DoubleDigit) {
            qhat -= 1;
            rhat += top;
            if rhat >= base {
                break;
            }
        }

        // multiply and subtract
        let mut k: i64 = 0;
        for i in 0..n {
            let p = qhat * vn[i] as DoubleDigit;
            let t = un[i + j] as i64 - k - (p & 0xFFFF_FFFF) as i64;
            un[i + j] = t as Digit;
            k = (p >> DIGIT_BITS) as i64 - (t >> DIGIT_BITS);
        }
        let t = un[j + n] as i64 - k;
        un[j + n] = t as Digit;

        if t < 0 {
            // qhat was one too large: add the divisor back
            q[j] = (qhat - 1) as Digit;
            let mut carry: DoubleDigit = 0;
            for i in 0..n {
                let s = un[i + j] as DoubleDigit + vn[i] as DoubleDigit + carry;
                un[i + j] = s as Digit;
                carry = s >> DIGIT_BITS;
            }
            un[j + n] = un[j + n].wrapping_add(carry as Digit);
        } else {
            q[j] = qhat as Digit;
        }
    }

    let sticky = un[..n].iter().any(|&d| d != 0);
    q.reverse();
    Ok((q, sticky))
}

/// Shift a magnitude left by `r < 32` bits into one extra leading digit
pub(crate) fn shl_bits(digits: &[Digit], r: u32) -> Result<Vec<Digit>, ArithError> {
    debug_assert!(r < DIGIT_BITS);
    let mut out = zeroed(digits.len() + 1)?;
    for (i, &d) in digits.iter().enumerate() {
        let wide = (d as DoubleDigit) << r;
        out[i] |= (wide >> DIGIT_BITS) as Digit;
        out[i + 1] = wide as Digit;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_u128(digits: &[Digit]) -> u128 {
        digits.iter().fold(0u128, |acc, &d| (acc << 32) | d as u128)
    }

    #[test]
    fn normalize_strips_both_ends() {
        let mut d = vec![0, 0, 5, 7, 0];
        let e = normalize_digits(&mut d, 10);
        assert_eq!(d, vec![5, 7]);
        assert_eq!(e, 8);

        let mut z = vec![0, 0];
        normalize_digits(&mut z, 3);
        assert!(z.is_empty());
    }

    #[test]
    fn bit_queries() {
        let d = [0x8000_0000, 0x0000_0001];
        assert!(bit_at(&d, 0));
        assert!(!bit_at(&d, 1));
        assert!(bit_at(&d, 63));
        assert!(!bit_at(&d, 64));
        assert!(!bit_at(&d, -1));
        assert!(any_bits_from(&d, 1));
        assert!(any_bits_from(&d, 63));
        assert!(!any_bits_from(&d, 64));
        assert_eq!(extract_bits(&d, 0, 4), 0b1000);
        assert_eq!(extract_bits(&d, 60, 6), 0b000100);
    }

    #[test]
    fn place_bits_splits_exponent() {
        let (d, e) = place_bits(3, 0);
        assert_eq!((d, e), (vec![3], 0));
        let (d, e) = place_bits(1, 33);
        assert_eq!((d, e), (vec![2], 1));
        let (d, e) = place_bits(1, -1);
        assert_eq!((d, e), (vec![0x8000_0000], -1));
        let (d, e) = place_bits(u128::MAX, 5);
        assert_eq!(d.len(), 5);
        assert_eq!(e, 4);
    }

    #[test]
    fn add_and_sub_align() {
        // (2^32 + 1) + 2^-32
        let (mut s, e) = add_magnitudes(&[1, 1], 1, &[1], -1).unwrap();
        let e = normalize_digits(&mut s, e);
        assert_eq!((s.clone(), e), (vec![1, 1, 1], 1));

        let (mut d, e) = sub_magnitudes(&s, e, &[1], -1).unwrap();
        let e = normalize_digits(&mut d, e);
        assert_eq!((d, e), (vec![1, 1], 1));

        let (mut d, e) = sub_magnitudes(&[1, 0], 1, &[1], 0).unwrap();
        let e = normalize_digits(&mut d, e);
        assert_eq!((d, e), (vec![Digit::MAX], 0));
    }

    #[test]
    fn carry_ripples_into_new_digit() {
        let (mut s, e) = add_magnitudes(&[Digit::MAX, Digit::MAX], 1, &[1], 0).unwrap();
        let e = normalize_digits(&mut s, e);
        assert_eq!((s, e), (vec![1], 2));
    }

    #[test]
    fn schoolbook_matches_u128() {
        let a = [0xDEAD_BEEF, 0x1234_5678];
        let b = [0xFFFF_FFFF, 0x0000_0003];
        let p = mul_magnitudes(&a, &b).unwrap();
        assert_eq!(to_u128(&p), to_u128(&a) * to_u128(&b));
    }

    #[test]
    fn long_division_matches_u128() {
        let cases: [(u128, u128); 6] = [
            (0xFFFF_FFFF_FFFF_FFFF_FFFF_FFFF, 0x1_0000_0001),
            (0x8000_0000_0000_0000_0000_0000, 0xFFFF_FFFF_FFFF),
            (1_000_000_000_000_000_000_000_007, 3),
            (0x7FFF_FFFF_8000_0000_0000_0000, 0x8000_0000_FFFF_FFFF),
            (12345678901234567890123456789, 98765432109876543),
            (0xFFFF_FFFF_0000_0000_0000_0000, 0xFFFF_FFFF_0000_0001),
        ];
        for (x, y) in cases {
            let u: Vec<Digit> = (0..4).rev().map(|i| (x >> (32 * i)) as Digit).collect();
            let v: Vec<Digit> = (0..4)
                .rev()
                .map(|i| (y >> (32 * i)) as Digit)
                .skip_while(|&d| d == 0)
                .collect();
            let u: Vec<Digit> = u.into_iter().skip_while(|&d| d == 0).collect();
            let (q, sticky) = divrem_magnitudes(&u, &v).unwrap();
            assert_eq!(to_u128(&q), x / y, "{x} / {y}");
            assert_eq!(sticky, x % y != 0);
        }
    }

    #[test]
    fn magnitude_ordering() {
        assert_eq!(cmp_magnitude(&[1], 1, &[Digit::MAX], 0), Ordering::Greater);
        assert_eq!(cmp_magnitude(&[1, 1], 0, &[1], 0), Ordering::Greater);
        assert_eq!(cmp_magnitude(&[], 0, &[1], -9), Ordering::Less);
        assert_eq!(cmp_magnitude(&[7], 2, &[7], 2), Ordering::Equal);
    }

    #[test]
    fn allocation_failure_is_reported() {
        assert_eq!(
            Mantissa::with_capacity(usize::MAX).unwrap_err(),
            ArithError::Allocation { digits: usize::MAX }
        );
    }

    #[test]
    fn shift_left_spills_into_extra_digit() {
        assert_eq!(shl_bits(&[0x8000_0001], 1).unwrap(), vec![1, 2]);
        assert_eq!(shl_bits(&[5, 6], 0).unwrap(), vec![0, 5, 6]);
    }
}
