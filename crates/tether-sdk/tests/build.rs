//! Template-driven value building and native conversions.

use tether_sdk::{BuildArg, ErrorKind, Handle, HeapRuntime, HostRuntime, Raised};

#[test]
fn test_single_item_template_yields_the_value_itself() {
    let rt = HeapRuntime::new();
    let one = rt.int_from_i64(1);
    let init = rt.refcount(one);

    {
        let built = Handle::build(&rt, "i", &[BuildArg::Int(1)]).unwrap();
        // Small integers are interned, so the builder hands back the
        // singleton with a fresh claim.
        assert!(built.is(one));
        assert_eq!(rt.refcount(one), init + 1);
        assert_eq!(built.as_i64().unwrap(), 1);
    }
    assert_eq!(rt.refcount(one), init);
    rt.release(one);
}

#[test]
fn test_multiple_top_level_items_make_a_tuple() {
    let rt = HeapRuntime::new();
    let pair = Handle::build(&rt, "ii", &[BuildArg::Int(6), BuildArg::Int(7)]).unwrap();
    assert!(pair.is_tuple());

    let first = Handle::steal(&rt, rt.sequence_item(pair.raw(), 0)).unwrap();
    let second = Handle::steal(&rt, rt.sequence_item(pair.raw(), 1)).unwrap();
    assert_eq!(first.as_i64().unwrap(), 6);
    assert_eq!(second.as_i64().unwrap(), 7);
}

#[test]
fn test_bracketed_groups_nest() {
    let rt = HeapRuntime::new();
    let tree = Handle::build(
        &rt,
        "[i(ii)]",
        &[BuildArg::Int(1), BuildArg::Int(2), BuildArg::Int(3)],
    )
    .unwrap();

    let head = Handle::steal(&rt, rt.sequence_item(tree.raw(), 0)).unwrap();
    assert_eq!(head.as_i64().unwrap(), 1);

    let inner = Handle::steal(&rt, rt.sequence_item(tree.raw(), 1)).unwrap();
    assert!(inner.is_tuple());
    let last = Handle::steal(&rt, rt.sequence_item(inner.raw(), 1)).unwrap();
    assert_eq!(last.as_i64().unwrap(), 3);
}

#[test]
fn test_unsigned_and_float_items() {
    let rt = HeapRuntime::new();
    let value = Handle::build(&rt, "I", &[BuildArg::Uint(7)]).unwrap();
    assert_eq!(value.as_u64().unwrap(), 7);

    let pair = Handle::build(&rt, "Id", &[BuildArg::Uint(1), BuildArg::Float(0.5)]).unwrap();
    assert!(pair.is_tuple());
}

#[test]
fn test_bad_template_character_raises() {
    let rt = HeapRuntime::new();
    assert_eq!(Handle::build(&rt, "iz", &[BuildArg::Int(1)]).unwrap_err(), Raised);
    let err = rt.take_error().unwrap();
    assert_eq!(err.kind, ErrorKind::Value);
    assert!(err.message.contains('z'));
}

#[test]
fn test_argument_mismatch_raises_without_leaking() {
    let rt = HeapRuntime::new();
    let baseline = rt.live_objects();
    assert_eq!(
        Handle::build(&rt, "[ii]", &[BuildArg::Int(4_000_000)]).unwrap_err(),
        Raised
    );
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Value);
    // The half-built list was torn down.
    assert_eq!(rt.live_objects(), baseline);
}

#[test]
fn test_unterminated_group_raises() {
    let rt = HeapRuntime::new();
    assert_eq!(Handle::build(&rt, "[i", &[BuildArg::Int(1)]).unwrap_err(), Raised);
    assert_eq!(rt.take_error().unwrap().kind, ErrorKind::Value);
}

#[test]
fn test_from_u64_round_trip() {
    let rt = HeapRuntime::new();
    let value = Handle::from_u64(&rt, 123_456_789).unwrap();
    assert_eq!(value.as_u64().unwrap(), 123_456_789);
    assert_eq!(value.as_i64().unwrap(), 123_456_789);
}

#[test]
fn test_extract_native_values() {
    let rt = HeapRuntime::new();
    let value = Handle::from_i64(&rt, 42).unwrap();
    assert_eq!(value.extract::<i64>().unwrap(), 42);
    assert_eq!(value.extract::<u64>().unwrap(), 42);
    assert!(value.extract::<bool>().unwrap());

    let zero = Handle::from_i64(&rt, 0).unwrap();
    assert!(!zero.extract::<bool>().unwrap());
}

#[test]
fn test_to_host_builds_objects() {
    use tether_sdk::ToHost;

    let rt = HeapRuntime::new();
    let value = 99i64.to_host(&rt).unwrap();
    assert_eq!(value.as_i64().unwrap(), 99);

    let value = 7u64.to_host(&rt).unwrap();
    assert_eq!(value.as_u64().unwrap(), 7);
}
