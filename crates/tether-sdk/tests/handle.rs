//! Reference accounting through the handle lifecycle.

use tether_sdk::{Acquire, Handle, HeapRuntime, HostRuntime, Raised, RawRef};

/// A counted object plus its reference count at the start of a test.
fn counted(rt: &HeapRuntime, value: i64) -> (RawRef, usize) {
    let raw = rt.int_from_i64(value);
    let count = rt.refcount(raw);
    (raw, count)
}

#[test]
fn test_steal_takes_over_without_retaining() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    {
        let h = Handle::steal(&rt, one).unwrap();
        assert!(!h.is_borrow());
        assert!(h.is(one));
        assert_eq!(rt.refcount(one), init);
    }
    // Drop pays the claim the handle took over.
    assert_eq!(rt.refcount(one), init - 1);
}

#[test]
fn test_retain_claims_a_fresh_reference() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    {
        let h = Handle::retain(&rt, one).unwrap();
        assert!(!h.is_borrow());
        assert_eq!(rt.refcount(one), init + 1);
    }
    assert_eq!(rt.refcount(one), init);
    rt.release(one);
}

#[test]
fn test_borrow_never_touches_the_count() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    {
        let h = Handle::borrow(&rt, one).unwrap();
        assert!(h.is_borrow());
        assert_eq!(rt.refcount(one), init);
    }
    assert_eq!(rt.refcount(one), init);
    rt.release(one);
}

#[test]
fn test_null_raises_unless_allowed() {
    let rt = HeapRuntime::new();
    assert_eq!(Handle::steal(&rt, RawRef::NULL).unwrap_err(), Raised);
    assert_eq!(Handle::borrow(&rt, RawRef::NULL).unwrap_err(), Raised);

    let h = Handle::new(&rt, RawRef::NULL, Acquire::Steal, true).unwrap();
    assert!(h.is_empty());
    // Empty handles are always borrowing, whatever mode was requested.
    assert!(h.is_borrow());
}

#[test]
fn test_clone_owning_retains() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    let h = Handle::steal(&rt, one).unwrap();
    {
        let dup = h.clone();
        assert!(!dup.is_borrow());
        assert_eq!(rt.refcount(one), init + 1);
    }
    assert_eq!(rt.refcount(one), init);
}

#[test]
fn test_clone_borrowing_stays_free() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    let h = Handle::borrow(&rt, one).unwrap();
    {
        let dup = h.clone();
        assert!(dup.is_borrow());
        assert_eq!(rt.refcount(one), init);
    }
    assert_eq!(rt.refcount(one), init);
    rt.release(one);
}

#[test]
fn test_take_moves_the_obligation() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    let mut h = Handle::steal(&rt, one).unwrap();
    let taken = h.take();

    // The source stays inspectable but no longer owes anything.
    assert!(h.is(one));
    assert!(h.is_borrow());
    assert!(!taken.is_borrow());
    assert_eq!(rt.refcount(one), init);

    drop(h);
    assert_eq!(rt.refcount(one), init);
    drop(taken);
    assert_eq!(rt.refcount(one), init - 1);
}

#[test]
fn test_release_hands_exactly_one_claim() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);

    // From an owning handle the claim transfers without a count change.
    let mut h = Handle::steal(&rt, one).unwrap();
    let raw = h.release();
    assert_eq!(raw, one);
    assert!(h.is_borrow());
    assert_eq!(rt.refcount(one), init);
    drop(h);
    assert_eq!(rt.refcount(one), init);
    rt.release(raw);
    assert_eq!(rt.refcount(one), init - 1);

    // From a borrowing handle a fresh claim is minted first.
    let (one, init) = counted(&rt, 1);
    let mut h = Handle::borrow(&rt, one).unwrap();
    let raw = h.release();
    assert_eq!(rt.refcount(one), init + 1);
    rt.release(raw);
    drop(h);
    assert_eq!(rt.refcount(one), init);
    rt.release(one);
}

#[test]
fn test_raw_retained_mints_a_claim() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    let h = Handle::steal(&rt, one).unwrap();
    let raw = h.raw_retained();
    assert_eq!(rt.refcount(one), init + 1);
    rt.release(raw);
    drop(h);
    assert_eq!(rt.refcount(one), init - 1);
}

#[test]
fn test_reset_discharges_the_old_reference() {
    let rt = HeapRuntime::new();
    let (one, one_init) = counted(&rt, 1);
    let (two, two_init) = counted(&rt, 2);

    let mut h = Handle::steal(&rt, one).unwrap();
    h.reset(two, Acquire::Steal, false).unwrap();
    assert!(h.is(two));
    assert_eq!(rt.refcount(one), one_init - 1);
    assert_eq!(rt.refcount(two), two_init);

    drop(h);
    assert_eq!(rt.refcount(two), two_init - 1);
}

#[test]
fn test_reset_to_same_object_is_safe() {
    let rt = HeapRuntime::new();
    let big = rt.int_from_i64(1_000_000);
    assert_eq!(rt.refcount(big), 1);

    let mut h = Handle::steal(&rt, big).unwrap();
    // Retain-then-release on the sole reference must not destroy it.
    h.reset(big, Acquire::Retain, false).unwrap();
    assert!(h.is(big));
    assert_eq!(rt.refcount(big), 1);
    drop(h);
    assert_eq!(rt.refcount(big), 0);
}

#[test]
fn test_reset_failure_leaves_empty() {
    let rt = HeapRuntime::new();
    let (one, init) = counted(&rt, 1);
    let mut h = Handle::steal(&rt, one).unwrap();
    assert_eq!(
        h.reset(RawRef::NULL, Acquire::Steal, false).unwrap_err(),
        Raised
    );
    assert!(h.is_empty());
    assert_eq!(rt.refcount(one), init - 1);
}

#[test]
fn test_read_slot_adopts_a_borrowed_reference() {
    let rt = HeapRuntime::new();
    let (one, one_init) = counted(&rt, 1);
    let (two, two_init) = counted(&rt, 2);

    let mut h = Handle::steal(&rt, one).unwrap();
    *h.read_slot() = two;
    // The old claim was discharged; the new reference is held borrowed.
    assert_eq!(rt.refcount(one), one_init - 1);
    assert!(h.is(two));
    assert!(h.is_borrow());
    drop(h);
    assert_eq!(rt.refcount(two), two_init);
    rt.release(two);
}

#[test]
fn test_swap_exchanges_references_and_modes() {
    let rt = HeapRuntime::new();
    let (one, one_init) = counted(&rt, 1);
    let (two, two_init) = counted(&rt, 2);

    let mut a = Handle::steal(&rt, one).unwrap();
    let mut b = Handle::borrow(&rt, two).unwrap();
    a.swap(&mut b);

    assert!(a.is(two));
    assert!(a.is_borrow());
    assert!(b.is(one));
    assert!(!b.is_borrow());

    drop(a);
    drop(b);
    assert_eq!(rt.refcount(one), one_init - 1);
    assert_eq!(rt.refcount(two), two_init);
    rt.release(two);
}

#[test]
fn test_no_object_outlives_its_handles() {
    let rt = HeapRuntime::new();
    let baseline = rt.live_objects();
    {
        let h = Handle::from_i64(&rt, 5_000_000).unwrap();
        let dup = h.clone();
        let _third = dup.clone();
        assert_eq!(rt.live_objects(), baseline + 1);
    }
    assert_eq!(rt.live_objects(), baseline);
}
