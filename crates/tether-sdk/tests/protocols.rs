//! Attribute access, rich comparison and the numeric protocol.

use tether_sdk::{
    Acquire, BuildArg, ErrorKind, Handle, HeapRuntime, HostRuntime, Module, Raised,
};

fn int_args(values: &[i64]) -> Vec<BuildArg> {
    values.iter().map(|v| BuildArg::Int(*v)).collect()
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn test_module_attribute_round_trip() {
    let rt = HeapRuntime::new();
    let raw = rt.new_module("sample");
    let module = Module::new(&rt, raw, Acquire::Steal, false).unwrap();

    let value = Handle::from_i64(&rt, 42).unwrap();
    module.setattr("answer", &value).unwrap();

    let read = module.getattr("answer").unwrap();
    assert!(read.is(value.raw()));
    assert_eq!(read.as_i64().unwrap(), 42);

    module.delattr("answer").unwrap();
    assert_eq!(module.getattr("answer").unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Attribute);
}

#[test]
fn test_int_exposes_itself_as_real_part() {
    let rt = HeapRuntime::new();
    let one = Handle::from_i64(&rt, 1).unwrap();
    let init = rt.refcount(one.raw());

    {
        let real = one.getattr("real").unwrap();
        // The host hands back the very same object, freshly claimed.
        assert!(real.is(one.raw()));
        assert_eq!(rt.refcount(one.raw()), init + 1);
    }
    assert_eq!(rt.refcount(one.raw()), init);
}

#[test]
fn test_missing_attribute_raises() {
    let rt = HeapRuntime::new();
    let one = Handle::from_i64(&rt, 1).unwrap();
    assert_eq!(one.getattr("imaginary_unit").unwrap_err(), Raised);
    let err = rt.take_error().unwrap();
    assert_eq!(err.kind, ErrorKind::Attribute);
    assert!(err.message.contains("'int' object has no attribute"));
}

#[test]
fn test_setattr_on_readonly_object_raises() {
    let rt = HeapRuntime::new();
    let one = Handle::from_i64(&rt, 1).unwrap();
    let value = Handle::from_i64(&rt, 2).unwrap();
    assert_eq!(one.setattr("anything", &value).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Attribute);
}

// ============================================================================
// Rich comparison
// ============================================================================

#[test]
fn test_list_comparisons() {
    let rt = HeapRuntime::new();
    let small = Handle::build(&rt, "[ii]", &int_args(&[1, 1])).unwrap();
    let small_again = Handle::build(&rt, "[ii]", &int_args(&[1, 1])).unwrap();
    let large = Handle::build(&rt, "[ii]", &int_args(&[1, 2])).unwrap();

    assert!(small.eq(&small_again).unwrap());
    assert!(!small.ne(&small_again).unwrap());
    assert!(small.le(&small_again).unwrap());
    assert!(small.ge(&small_again).unwrap());

    assert!(small.lt(&large).unwrap());
    assert!(small.le(&large).unwrap());
    assert!(!small.gt(&large).unwrap());
    assert!(!small.ge(&large).unwrap());
    assert!(small.ne(&large).unwrap());
    assert!(!rt.error_pending());
}

#[test]
fn test_int_comparisons() {
    let rt = HeapRuntime::new();
    let six = Handle::from_i64(&rt, 6).unwrap();
    let seven = Handle::from_i64(&rt, 7).unwrap();

    assert!(six.lt(&seven).unwrap());
    assert!(six.ne(&seven).unwrap());
    assert!(!six.eq(&seven).unwrap());
    assert!(seven.gt(&six).unwrap());
}

#[test]
fn test_ordering_against_incompatible_operand_raises() {
    let rt = HeapRuntime::new();
    let list = Handle::build(&rt, "[ii]", &int_args(&[1, 1])).unwrap();
    let one = Handle::from_i64(&rt, 1).unwrap();

    assert_eq!(list.lt(&one).unwrap_err(), Raised);
    let err = rt.take_error().unwrap();
    assert_eq!(err.kind, ErrorKind::Type);
    assert!(err.message.contains("'list' and 'int'"));
}

#[test]
fn test_equality_across_kinds_is_false_not_an_error() {
    let rt = HeapRuntime::new();
    let list = Handle::build(&rt, "[i]", &int_args(&[1])).unwrap();
    let one = Handle::from_i64(&rt, 1).unwrap();

    assert!(!list.eq(&one).unwrap());
    assert!(list.ne(&one).unwrap());
    assert!(!rt.error_pending());
}

// ============================================================================
// Numeric protocol
// ============================================================================

#[test]
fn test_arithmetic_methods() {
    let rt = HeapRuntime::new();
    let six = Handle::from_i64(&rt, 6).unwrap();
    let seven = Handle::from_i64(&rt, 7).unwrap();

    assert_eq!(six.add(&seven).unwrap().as_i64().unwrap(), 13);
    assert_eq!(six.sub(&seven).unwrap().as_i64().unwrap(), -1);
    assert_eq!(six.mul(&seven).unwrap().as_i64().unwrap(), 42);
    assert_eq!(seven.floordiv(&six).unwrap().as_i64().unwrap(), 1);
    assert_eq!(seven.rem(&six).unwrap().as_i64().unwrap(), 1);
}

#[test]
fn test_operator_sugar() {
    let rt = HeapRuntime::new();
    let six = Handle::from_i64(&rt, 6).unwrap();
    let seven = Handle::from_i64(&rt, 7).unwrap();

    assert_eq!((&six + &seven).unwrap().as_i64().unwrap(), 13);
    assert_eq!((&six - &seven).unwrap().as_i64().unwrap(), -1);
    assert_eq!((&six * &seven).unwrap().as_i64().unwrap(), 42);
    assert_eq!((&seven / &six).unwrap().as_i64().unwrap(), 1);
    assert_eq!((&seven % &six).unwrap().as_i64().unwrap(), 1);
}

#[test]
fn test_divmod_returns_both_parts() {
    let rt = HeapRuntime::new();
    let thirteen = Handle::from_i64(&rt, 13).unwrap();
    let six = Handle::from_i64(&rt, 6).unwrap();

    let (quot, rem) = thirteen.divmod(&six).unwrap();
    assert_eq!(quot.as_i64().unwrap(), 2);
    assert_eq!(rem.as_i64().unwrap(), 1);
}

#[test]
fn test_floor_division_rounds_toward_negative_infinity() {
    let rt = HeapRuntime::new();
    let minus_thirteen = Handle::from_i64(&rt, -13).unwrap();
    let six = Handle::from_i64(&rt, 6).unwrap();

    let (quot, rem) = minus_thirteen.divmod(&six).unwrap();
    assert_eq!(quot.as_i64().unwrap(), -3);
    // Remainder takes the divisor's sign.
    assert_eq!(rem.as_i64().unwrap(), 5);
}

#[test]
fn test_division_by_zero_raises() {
    let rt = HeapRuntime::new();
    let six = Handle::from_i64(&rt, 6).unwrap();
    let zero = Handle::from_i64(&rt, 0).unwrap();

    assert_eq!(six.floordiv(&zero).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Value);
}

#[test]
fn test_division_overflow_raises() {
    let rt = HeapRuntime::new();
    let min = Handle::from_i64(&rt, i64::MIN).unwrap();
    let minus_one = Handle::from_i64(&rt, -1).unwrap();

    // The quotient of i64::MIN and -1 has no i64 representation.
    assert_eq!(min.floordiv(&minus_one).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Overflow);
    assert_eq!(min.rem(&minus_one).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Overflow);
    assert_eq!(min.divmod(&minus_one).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Overflow);
}

#[test]
fn test_comparing_empty_handles_raises() {
    let rt = HeapRuntime::new();
    let a = Handle::empty(&rt);
    let b = Handle::empty(&rt);

    // Empty handles have no object to answer about.
    assert_eq!(a.eq(&b).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Runtime);
    assert_eq!(a.lt(&b).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Runtime);
}

#[test]
fn test_arithmetic_on_non_numbers_raises() {
    let rt = HeapRuntime::new();
    let list = Handle::build(&rt, "[i]", &int_args(&[1])).unwrap();
    let one = Handle::from_i64(&rt, 1).unwrap();

    assert!(!list.is_number());
    assert!(one.is_number());
    assert_eq!(list.add(&one).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Type);
}

#[test]
fn test_as_i64_error_discrimination() {
    let rt = HeapRuntime::new();
    // A genuine -1 reads back cleanly.
    let minus_one = Handle::from_i64(&rt, -1).unwrap();
    assert_eq!(minus_one.as_i64().unwrap(), -1);
    assert!(!rt.error_pending());

    // A non-integer fails and leaves the diagnostic behind.
    let list = Handle::build(&rt, "[i]", &int_args(&[1])).unwrap();
    assert_eq!(list.as_i64().unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Type);
}

#[test]
fn test_as_u64_rejects_negative_values() {
    let rt = HeapRuntime::new();
    let minus_one = Handle::from_i64(&rt, -1).unwrap();
    assert_eq!(minus_one.as_u64().unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Overflow);
}
