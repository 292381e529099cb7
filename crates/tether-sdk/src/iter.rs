//! IterHandle: pull-model cursor over a host iterator
//!
//! Wraps a host iterator object behind a one-ahead cursor: construction
//! pulls the first element eagerly, [`IterHandle::advance`] pulls the next
//! one, and a null pull with a clean error slot marks natural exhaustion.
//! A default-constructed cursor is the past-the-end sentinel; equality is
//! defined only between a live cursor and the sentinel.
//!
//! The cursor also implements [`Iterator`], yielding `HostResult<Handle>`
//! so a failing host iterator surfaces as an `Err` item instead of being
//! silently truncated.

use crate::error::{check_pending, ErrorKind, HostResult, Raised};
use crate::handle::Handle;
use crate::raw::RawRef;
use crate::runtime::HostRuntime;

/// Cursor over a host iterator object.
///
/// States: sentinel (no underlying iterator), active with a buffered
/// current value, or active and exhausted.
#[derive(Debug)]
pub struct IterHandle<'rt> {
    iter: Option<Handle<'rt>>,
    value: Option<Handle<'rt>>,
    // A pull that failed while refilling the one-ahead buffer inside
    // `Iterator::next`; reported on the following call so the element
    // already buffered is not lost.
    deferred_failure: bool,
}

impl<'rt> IterHandle<'rt> {
    /// Wrap a host iterator, stealing `raw`.
    ///
    /// A null `raw` raises immediately (the host call that produced it
    /// already set its diagnostic). A non-null object that is not an
    /// iterator gets a type-mismatch diagnostic recorded on the error
    /// slot, with the host's own built-in wording, and raises. Otherwise
    /// the first element is pulled right away.
    pub fn new(rt: &'rt dyn HostRuntime, raw: RawRef) -> HostResult<Self> {
        let iter = Handle::steal(rt, raw)?;
        if !rt.is_iterator(iter.raw()) {
            let message = format!(
                "'{}' object is not an iterator",
                rt.type_name(iter.raw())
            );
            rt.set_error(ErrorKind::Type, &message);
            return Err(Raised);
        }

        let mut cursor = Self {
            iter: Some(iter),
            value: None,
            deferred_failure: false,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    /// The past-the-end sentinel.
    pub fn sentinel() -> Self {
        Self {
            iter: None,
            value: None,
            deferred_failure: false,
        }
    }

    /// Whether this cursor is the sentinel (has no underlying iterator).
    pub fn is_sentinel(&self) -> bool {
        self.iter.is_none()
    }

    /// Whether the cursor currently buffers a value.
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// The buffered current value, if the cursor is not exhausted.
    pub fn value(&self) -> Option<&Handle<'rt>> {
        self.value.as_ref()
    }

    /// Pull the next element from the host iterator.
    ///
    /// A null pull with a clean error slot transitions to exhausted and
    /// succeeds; a null pull with a pending error raises. The two must not
    /// be collapsed: only the latter means the iteration failed.
    ///
    /// # Panics
    ///
    /// Panics when called on the sentinel.
    pub fn advance(&mut self) -> HostResult<()> {
        let iter = self
            .iter
            .as_ref()
            .expect("advance called on the sentinel cursor");
        let rt = iter.rt();

        let next = rt.iter_next(iter.raw());
        if next.is_null() {
            self.value = None;
            return check_pending(rt);
        }
        self.value = Some(Handle::steal(rt, next)?);
        Ok(())
    }
}

impl Default for IterHandle<'_> {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl PartialEq for IterHandle<'_> {
    /// Equality against the sentinel: a live cursor equals it iff
    /// exhausted. Comparing two live cursors (or two sentinels) is not a
    /// supported operation.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one side is the sentinel.
    fn eq(&self, other: &Self) -> bool {
        assert!(
            self.is_sentinel() != other.is_sentinel(),
            "cursor comparison is only defined against the sentinel"
        );
        let live = if self.is_sentinel() { other } else { self };
        !live.has_value()
    }
}

impl<'rt> Iterator for IterHandle<'rt> {
    type Item = HostResult<Handle<'rt>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.deferred_failure {
            self.deferred_failure = false;
            return Some(Err(Raised));
        }
        let current = self.value.take()?;
        if self.advance().is_err() {
            self.deferred_failure = true;
        }
        Some(Ok(current))
    }
}
