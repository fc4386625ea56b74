use std::sync::{Arc, Mutex};

use rug::Float;
use verarith::{
    Accumulator, ArithError, Disposition, Flags, Format, Interval, MpNumber, RoundingContext,
    RoundingMode, Special, TrapEntry, TrapKind, TrapTable, directed,
};

#[test]
fn cancellation_is_exact() {
    let mut accu = Accumulator::new();
    let _ = accu.add_product(1e20, 1.0);
    let _ = accu.add_product(-1e20, 1.0);
    let _ = accu.add_product(1.0, 1.0);
    for mode in RoundingMode::ALL {
        let out = accu.result(mode);
        assert_eq!(out.value, 1.0);
        assert!(out.is_exact());
    }

    // the naive sum loses the one entirely
    let naive = directed::add(
        directed::add(1e20, 1.0, RoundingMode::Nearest).value,
        -1e20,
        RoundingMode::Nearest,
    );
    assert_eq!(naive.value, 0.0);
}

#[test]
fn quotient_exactness() {
    let third = directed::div(1.0, 3.0, RoundingMode::Nearest);
    assert!(third.flags.contains(Flags::INEXACT));
    let two = directed::div(6.0, 3.0, RoundingMode::Nearest);
    assert!(two.is_exact());
    assert_eq!(two.value, 2.0);

    let mp_third = MpNumber::from_i64(1)
        .div(&MpNumber::from_i64(3), 256, RoundingMode::Nearest)
        .unwrap();
    assert!(!mp_third.is_exact());
    assert!(!mp_third.value.is_exact());
}

#[test]
fn special_value_algebra() {
    let inf = f64::INFINITY;
    let cases = [
        (directed::add(inf, -inf, RoundingMode::Nearest), Flags::INVALID),
        (directed::mul(0.0, inf, RoundingMode::Up), Flags::INVALID),
        (directed::div(0.0, 0.0, RoundingMode::Down), Flags::INVALID),
        (directed::div(inf, inf, RoundingMode::Chop), Flags::INVALID),
    ];
    for (out, flags) in cases {
        assert!(out.value.is_nan());
        assert_eq!(out.flags, flags);
    }
    let pole = directed::div(-2.0, 0.0, RoundingMode::Nearest);
    assert_eq!(pole.value, f64::NEG_INFINITY);
    assert_eq!(pole.flags, Flags::DIV_BY_ZERO);

    let mut accu = Accumulator::new();
    assert_eq!(accu.add_value(inf), Flags::empty());
    assert_eq!(accu.add_product(-1.0, inf), Flags::INVALID);
    assert!(matches!(accu.special(), Special::Nan { .. }));
    assert_eq!(accu.add_value(1.0), Flags::empty());
    assert!(accu.result(RoundingMode::Nearest).value.is_nan());
}

#[test]
fn registered_sub_code_routes_to_its_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut table = TrapTable::quiet();
    table.register(
        TrapKind::IndexRange.code() + 1,
        TrapEntry::active(Disposition::Fail).with_handler(move |report| {
            if let Ok(mut v) = sink.lock() {
                v.push(report.to_string());
            }
        }),
    );
    let mut ctx = RoundingContext::builder().traps(table).build();

    let err = match Accumulator::dot(&[1.0, 2.0], &[3.0]) {
        Ok(_) => panic!("length mismatch accepted"),
        Err(err) => err,
    };
    assert_eq!(err, ArithError::IndexRange { index: 1, len: 1 });
    let routed = ctx.raise_code(TrapKind::IndexRange.code() + 1, TrapKind::IndexRange, "dot", "1, 1");
    assert_eq!(
        routed,
        Err(ArithError::Trapped {
            kind: TrapKind::IndexRange,
            op: "dot"
        })
    );
    // the group code itself is still inactive
    assert!(ctx.raise(TrapKind::IndexRange, "dot", "").is_ok());
    assert_eq!(seen.lock().unwrap().as_slice(), ["index out of range in dot(1, 1)"]);
}

#[test]
fn context_escalates_mp_overflow() {
    let mut ctx = RoundingContext::builder().traps(TrapTable::failing()).build();
    let huge = MpNumber::from_i64(1).scale2(32 * ((1 << 24) - 1)).unwrap();
    let err = ctx.mp_mul(&huge, &huge).unwrap_err();
    assert_eq!(
        err,
        ArithError::Trapped {
            kind: TrapKind::Overflow,
            op: "mp_mul"
        }
    );
    assert!(ctx.flags().contains(Flags::OVERFLOW));

    let mut lenient = RoundingContext::default();
    assert_eq!(lenient.mp_mul(&huge, &huge).unwrap_err(), ArithError::Overflow);
    assert_eq!(lenient.log().len(), 1);
}

#[test]
fn interval_dot_encloses_reference() {
    let xs = [0.1, -0.7, 1e10, 3.0, -1e10];
    let ys = [0.3, 0.11, 1.5, 1.0 / 7.0, 1.5];
    let enclosure = Interval::enclose_dot(&xs, &ys).unwrap();

    let mut exact = Float::with_val(4400, 0);
    for (x, y) in xs.iter().zip(&ys) {
        exact += Float::with_val(120, *x) * *y;
    }
    assert!(Float::with_val(53, enclosure.lo) <= exact);
    assert!(exact <= Float::with_val(53, enclosure.hi));
    assert!(enclosure.width() <= f64::EPSILON);

    // the same value built term by term is much wider
    let mut naive = Interval::point(0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let mut term = Interval::default();
        term.mul_assign(&Interval::point(*x), &Interval::point(*y));
        let prev = naive;
        naive.add_assign(&prev, &term);
    }
    assert!(naive.lo <= enclosure.lo && enclosure.hi <= naive.hi);
}

#[test]
fn merged_accumulators_and_text() {
    let mut a = Accumulator::dot(&[1.0, 2.0], &[0.5, 0.25]).unwrap().value;
    let b = Accumulator::from_value(1e-30).value;
    let _ = a.add_accumulator(&b);
    let _ = a.sub_accumulator(&b);
    assert_eq!(a.result(RoundingMode::Nearest).value, 1.0);
    assert_eq!(a.format(&Format::fixed(0, 3)), "1.000");
    a.negate();
    assert_eq!(a.sign(), -1);
    assert_eq!(a.format(&Format::scientific(10, 2)), " -1.00E+00");

    let tenth = MpNumber::from_decimal("0.1", 64, RoundingMode::Up).unwrap().value;
    assert_eq!(
        tenth.format(&Format::fixed(0, 20).with_mode(RoundingMode::Up)),
        "0.10000000000000000001"
    );
}
