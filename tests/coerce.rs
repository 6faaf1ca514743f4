//! Tests for scalar coercion into typed slots.

use anyhow::Result;
use shardflow::*;

#[test]
fn integers_fit_any_wide_enough_slot() -> Result<()> {
    let mut a: i8 = 0;
    let mut b: u16 = 0;
    let mut c: i64 = 0;
    let mut d: u64 = 0;
    coerce(&Value::U64(100), Slot::I8(&mut a))?;
    coerce(&Value::I64(65_535), Slot::U16(&mut b))?;
    coerce(&Value::U8(7), Slot::I64(&mut c))?;
    coerce(&Value::I32(9), Slot::U64(&mut d))?;
    assert_eq!((a, b, c, d), (100, 65_535, 7, 9));
    Ok(())
}

#[test]
fn narrowing_overflow_fails_and_leaves_slot() {
    let mut a: i8 = 5;
    let err = coerce(&Value::I32(200), Slot::I8(&mut a)).unwrap_err();
    assert!(matches!(
        err,
        Error::TypeMismatch {
            from: ScalarKind::I32,
            to: ScalarKind::I8
        }
    ));
    assert_eq!(a, 5);

    let mut u: u32 = 1;
    assert!(coerce(&Value::I64(-1), Slot::U32(&mut u)).is_err());
    assert!(coerce(&Value::U64(u64::MAX), Slot::I64(&mut 0)).is_err());
    assert_eq!(u, 1);
}

#[test]
fn integers_widen_into_floats() -> Result<()> {
    let mut f: f64 = 0.0;
    let mut g: f32 = 0.0;
    coerce(&Value::I64(-12), Slot::F64(&mut f))?;
    coerce(&Value::U8(3), Slot::F32(&mut g))?;
    assert_eq!(f, -12.0);
    assert_eq!(g, 3.0);
    coerce(&Value::F32(0.5), Slot::F64(&mut f))?;
    assert_eq!(f, 0.5);
    Ok(())
}

#[test]
fn floats_into_integers_only_when_integral() -> Result<()> {
    let mut n: i32 = 0;
    coerce(&Value::F64(42.0), Slot::I32(&mut n))?;
    assert_eq!(n, 42);
    assert!(coerce(&Value::F64(1.5), Slot::I32(&mut n)).is_err());
    assert!(coerce(&Value::F64(f64::NAN), Slot::I32(&mut n)).is_err());
    assert!(coerce(&Value::F64(f64::INFINITY), Slot::I32(&mut n)).is_err());
    assert!(coerce(&Value::F64(1e12), Slot::I32(&mut n)).is_err());
    assert_eq!(n, 42);
    Ok(())
}

#[test]
fn text_and_bytes() -> Result<()> {
    let mut s = String::new();
    let mut b = Vec::new();
    coerce(&Value::from("hello"), Slot::Text(&mut s))?;
    coerce(&Value::from("hi"), Slot::Bytes(&mut b))?;
    assert_eq!(s, "hello");
    assert_eq!(b, b"hi");

    coerce(&Value::Bytes(b"ok".to_vec()), Slot::Text(&mut s))?;
    assert_eq!(s, "ok");
    assert!(coerce(&Value::Bytes(vec![0xff, 0xfe]), Slot::Text(&mut s)).is_err());
    assert_eq!(s, "ok");
    Ok(())
}

#[test]
fn cross_kind_conversions_fail() {
    let mut flag = false;
    let mut n: i64 = 0;
    let mut s = String::new();
    assert!(coerce(&Value::from("true"), Slot::Bool(&mut flag)).is_err());
    assert!(coerce(&Value::I64(1), Slot::Bool(&mut flag)).is_err());
    assert!(coerce(&Value::from("12"), Slot::I64(&mut n)).is_err());
    assert!(coerce(&Value::Bool(true), Slot::I64(&mut n)).is_err());
    assert!(coerce(&Value::I64(12), Slot::Text(&mut s)).is_err());
    assert!(coerce(&Value::Bool(true), Slot::F64(&mut 0.0)).is_err());
    assert!(!flag);
    assert_eq!(n, 0);
    assert!(s.is_empty());
}

#[test]
fn bool_into_bool() -> Result<()> {
    let mut flag = false;
    coerce(&Value::Bool(true), Slot::Bool(&mut flag))?;
    assert!(flag);
    Ok(())
}

#[test]
fn slot_set_keeps_first_fill() -> Result<()> {
    let slots = SlotSet::new([ScalarKind::U8, ScalarKind::Text]);
    assert_eq!(slots.len(), 2);
    assert!(!slots.is_filled());
    assert_eq!(slots.values(), vec![Value::U8(0), Value::from("")]);

    slots.fill(&[Value::I64(3), Value::from("three")])?;
    slots.fill(&[Value::I64(4), Value::from("four")])?;
    assert!(slots.is_filled());
    assert_eq!(slots.values(), vec![Value::U8(3), Value::from("three")]);
    Ok(())
}

#[test]
fn failed_fill_leaves_slot_set_unchanged() -> Result<()> {
    let slots = SlotSet::new([ScalarKind::I32, ScalarKind::Bool]);
    let err = slots.fill(&[Value::I64(1), Value::from("yes")]).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { to: ScalarKind::Bool, .. }));
    assert!(!slots.is_filled());
    assert_eq!(slots.get(0), Some(Value::I32(0)));

    slots.fill(&[Value::I64(1), Value::Bool(true)])?;
    assert_eq!(slots.get(1), Some(Value::Bool(true)));
    Ok(())
}

#[test]
fn extra_fields_are_ignored_and_missing_fields_keep_zero() -> Result<()> {
    let slots = SlotSet::new([ScalarKind::I64]);
    slots.fill(&[Value::I64(1), Value::from("extra")])?;
    assert_eq!(slots.values(), vec![Value::I64(1)]);

    let short = SlotSet::new([ScalarKind::I64, ScalarKind::F64]);
    short.fill(&[Value::I64(2)])?;
    assert_eq!(short.values(), vec![Value::I64(2), Value::F64(0.0)]);
    Ok(())
}

#[test]
fn float_narrowing_out_of_range_fails() -> Result<()> {
    let mut g: f32 = 1.0;
    let err = coerce(&Value::F64(1e300), Slot::F32(&mut g)).unwrap_err();
    assert!(matches!(
        err,
        Error::TypeMismatch {
            from: ScalarKind::F64,
            to: ScalarKind::F32
        }
    ));
    assert!(coerce(&Value::F64(-1e40), Slot::F32(&mut g)).is_err());
    assert_eq!(g, 1.0);

    coerce(&Value::F64(3.5e38), Slot::F64(&mut 0.0))?;
    coerce(&Value::F64(f64::INFINITY), Slot::F32(&mut g))?;
    assert!(g.is_infinite());
    coerce(&Value::U64(u64::MAX), Slot::F32(&mut g))?;
    assert!(g.is_finite());
    Ok(())
}

#[test]
fn short_row_marks_only_provided_slots_assigned() -> Result<()> {
    let slots = SlotSet::new([ScalarKind::I64, ScalarKind::I64]);
    assert_eq!(slots.assigned(), 0);
    slots.fill(&[Value::I64(0)])?;
    assert!(slots.is_filled());
    assert_eq!(slots.assigned(), 1);
    assert!(slots.is_assigned(0));
    assert!(!slots.is_assigned(1));
    assert_eq!(slots.values(), vec![Value::I64(0), Value::I64(0)]);

    let wide = SlotSet::new([ScalarKind::I64]);
    wide.fill(&[Value::I64(1), Value::I64(2), Value::I64(3)])?;
    assert_eq!(wide.assigned(), 1);
    Ok(())
}
