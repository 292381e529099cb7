//! Handle: owned reference to a host object
//!
//! The core of the crate. A [`Handle`] pairs a [`RawRef`] with an ownership
//! mode and a host runtime, and automates the retain/release bookkeeping
//! the host's C conventions would otherwise push onto every call site:
//! owning handles discharge exactly one release when dropped, borrowing
//! handles never touch the count, and every protocol method turns the
//! host's null/status/tri-state signaling into `HostResult`.
//!
//! # Ownership modes
//!
//! - **owning**: the handle owes the host exactly one release, paid in
//!   `Drop` or handed off through [`Handle::release`] / [`Handle::take`].
//! - **borrowing**: the handle is a naming convenience only; the count is
//!   never touched on its behalf.
//!
//! An empty handle (null reference) is always borrowing, whatever mode was
//! requested, so lifecycle code never consults the host for it.

use std::ops;

use crate::error::{check_pending, HostResult, Raised};
use crate::iter::IterHandle;
use crate::raw::RawRef;
use crate::runtime::{BinaryOp, BuildArg, CmpOp, HostRuntime};

/// How a constructor treats the reference it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The reference is a fresh one whose release obligation the handle
    /// takes over.
    Steal,
    /// Wrap without claiming; the count is left alone.
    Borrow,
    /// Wrap an existing reference and claim a fresh retain for the handle.
    Retain,
}

/// Reference-counted handle to a host object.
pub struct Handle<'rt> {
    raw: RawRef,
    borrowed: bool,
    rt: &'rt dyn HostRuntime,
}

impl<'rt> Handle<'rt> {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Wrap a raw reference under the given acquisition mode.
    ///
    /// A null `raw` raises unless `allow_null` is set; the common case for
    /// the raise is a host call that already recorded its diagnostic before
    /// returning null. Nothing is retained on the failure path, so no
    /// release can later be charged against a reference that was never
    /// claimed.
    pub fn new(
        rt: &'rt dyn HostRuntime,
        raw: RawRef,
        acquire: Acquire,
        allow_null: bool,
    ) -> HostResult<Self> {
        if raw.is_null() {
            if allow_null {
                return Ok(Self::empty(rt));
            }
            return Err(Raised);
        }
        if acquire == Acquire::Retain {
            rt.retain(raw);
        }
        Ok(Self {
            raw,
            borrowed: acquire == Acquire::Borrow,
            rt,
        })
    }

    /// Take over a fresh reference, raising on null.
    ///
    /// The construction mode for wrapping results of host calls that hand
    /// out new references.
    pub fn steal(rt: &'rt dyn HostRuntime, raw: RawRef) -> HostResult<Self> {
        Self::new(rt, raw, Acquire::Steal, false)
    }

    /// Wrap an existing reference without claiming it, raising on null.
    pub fn borrow(rt: &'rt dyn HostRuntime, raw: RawRef) -> HostResult<Self> {
        Self::new(rt, raw, Acquire::Borrow, false)
    }

    /// Wrap an existing reference and claim a fresh retain, raising on null.
    pub fn retain(rt: &'rt dyn HostRuntime, raw: RawRef) -> HostResult<Self> {
        Self::new(rt, raw, Acquire::Retain, false)
    }

    /// An empty, borrowing handle.
    pub fn empty(rt: &'rt dyn HostRuntime) -> Self {
        Self {
            raw: RawRef::NULL,
            borrowed: true,
            rt,
        }
    }

    /// Build an integer object on the host.
    pub fn from_i64(rt: &'rt dyn HostRuntime, value: i64) -> HostResult<Self> {
        Self::steal(rt, rt.int_from_i64(value))
    }

    /// Build an integer object on the host from an unsigned value.
    pub fn from_u64(rt: &'rt dyn HostRuntime, value: u64) -> HostResult<Self> {
        Self::steal(rt, rt.int_from_u64(value))
    }

    /// Build an object tree through the host's generic value builder.
    ///
    /// See [`HostRuntime::build_value`] for the template language.
    pub fn build(
        rt: &'rt dyn HostRuntime,
        template: &str,
        args: &[BuildArg],
    ) -> HostResult<Self> {
        Self::steal(rt, rt.build_value(template, args))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Whether the handle holds no object.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_null()
    }

    /// Whether the handle only borrows its reference.
    #[inline]
    pub fn is_borrow(&self) -> bool {
        self.borrowed
    }

    /// Identity comparison against a raw reference.
    #[inline]
    pub fn is(&self, raw: RawRef) -> bool {
        self.raw == raw
    }

    /// The raw reference, ownership untouched.
    #[inline]
    pub fn raw(&self) -> RawRef {
        self.raw
    }

    /// The runtime this handle works against.
    #[inline]
    pub fn rt(&self) -> &'rt dyn HostRuntime {
        self.rt
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// The raw reference with a fresh retain claimed for the caller.
    ///
    /// For handing a reference to host calls that consume one
    /// independently of this handle's own claim.
    pub fn raw_retained(&self) -> RawRef {
        if !self.raw.is_null() {
            self.rt.retain(self.raw);
        }
        self.raw
    }

    /// Hand the reference to the caller, who now owes exactly one release.
    ///
    /// An owning handle transfers its obligation without touching the
    /// count and demotes itself to borrowing. A borrowing handle claims a
    /// fresh retain first, so the returned reference is safely releasable
    /// either way. Null comes back as null with nothing owed.
    pub fn release(&mut self) -> RawRef {
        if !self.raw.is_null() {
            if self.borrowed {
                self.rt.retain(self.raw);
            } else {
                self.borrowed = true;
            }
        }
        self.raw
    }

    /// Move the reference and mode out into a new handle.
    ///
    /// Contract: the source keeps the same raw reference but demotes to
    /// borrowing, so it stays inspectable after the move while the release
    /// obligation travels with the returned handle.
    pub fn take(&mut self) -> Handle<'rt> {
        let taken = Handle {
            raw: self.raw,
            borrowed: self.borrowed,
            rt: self.rt,
        };
        self.borrowed = true;
        taken
    }

    /// Re-seat the handle on another reference.
    ///
    /// Parameters as in [`Handle::new`]. The new state is adopted before
    /// the old one is discharged, so re-seating on the same object is safe
    /// in every mode. On failure the handle is left empty.
    pub fn reset(
        &mut self,
        raw: RawRef,
        acquire: Acquire,
        allow_null: bool,
    ) -> HostResult<()> {
        match Handle::new(self.rt, raw, acquire, allow_null) {
            Ok(mut fresh) => {
                std::mem::swap(self, &mut fresh);
                // `fresh` now holds the previous state and discharges it.
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }

    /// Reset to empty and expose the internal slot by mutable reference.
    ///
    /// For host APIs that write a *borrowed* reference into a
    /// caller-supplied output slot; whatever gets written is held in
    /// borrowing mode.
    pub fn read_slot(&mut self) -> &mut RawRef {
        self.clear();
        &mut self.raw
    }

    /// Swap the managed references of two handles.
    pub fn swap(&mut self, other: &mut Handle<'rt>) {
        std::mem::swap(self, other);
    }

    fn clear(&mut self) {
        if !self.borrowed {
            self.rt.release(self.raw);
        }
        self.raw = RawRef::NULL;
        self.borrowed = true;
    }

    // ========================================================================
    // Attribute protocol
    // ========================================================================

    /// Get an attribute of the object.
    pub fn getattr(&self, name: &str) -> HostResult<Handle<'rt>> {
        Handle::steal(self.rt, self.rt.get_attr(self.raw, name))
    }

    /// Set an attribute on the object. The value is passed borrowed.
    pub fn setattr(&self, name: &str, value: &Handle<'_>) -> HostResult<()> {
        if self.rt.set_attr(self.raw, name, value.raw()) != 0 {
            return Err(Raised);
        }
        Ok(())
    }

    /// Delete an attribute of the object.
    pub fn delattr(&self, name: &str) -> HostResult<()> {
        if self.rt.del_attr(self.raw, name) != 0 {
            return Err(Raised);
        }
        Ok(())
    }

    // ========================================================================
    // Rich comparison
    // ========================================================================

    /// Compare against another object under the given operator, mapping
    /// the host's tri-state result to boolean-or-raise.
    pub fn compare(&self, op: CmpOp, other: &Handle<'_>) -> HostResult<bool> {
        match self.rt.compare(op, self.raw, other.raw()) {
            -1 => Err(Raised),
            0 => Ok(false),
            _ => Ok(true),
        }
    }

    /// `self < other` by host comparison.
    pub fn lt(&self, other: &Handle<'_>) -> HostResult<bool> {
        self.compare(CmpOp::Lt, other)
    }

    /// `self <= other` by host comparison.
    pub fn le(&self, other: &Handle<'_>) -> HostResult<bool> {
        self.compare(CmpOp::Le, other)
    }

    /// `self == other` by host comparison.
    pub fn eq(&self, other: &Handle<'_>) -> HostResult<bool> {
        self.compare(CmpOp::Eq, other)
    }

    /// `self != other` by host comparison.
    pub fn ne(&self, other: &Handle<'_>) -> HostResult<bool> {
        self.compare(CmpOp::Ne, other)
    }

    /// `self > other` by host comparison.
    pub fn gt(&self, other: &Handle<'_>) -> HostResult<bool> {
        self.compare(CmpOp::Gt, other)
    }

    /// `self >= other` by host comparison.
    pub fn ge(&self, other: &Handle<'_>) -> HostResult<bool> {
        self.compare(CmpOp::Ge, other)
    }

    // ========================================================================
    // Numeric protocol
    // ========================================================================

    /// Whether the object supports the numeric protocol.
    pub fn is_number(&self) -> bool {
        self.rt.is_number(self.raw)
    }

    fn binary(&self, op: BinaryOp, other: &Handle<'_>) -> HostResult<Handle<'rt>> {
        Handle::steal(self.rt, self.rt.number_binary(op, self.raw, other.raw()))
    }

    /// Add two numbers.
    pub fn add(&self, other: &Handle<'_>) -> HostResult<Handle<'rt>> {
        self.binary(BinaryOp::Add, other)
    }

    /// Subtract a number from this one.
    pub fn sub(&self, other: &Handle<'_>) -> HostResult<Handle<'rt>> {
        self.binary(BinaryOp::Sub, other)
    }

    /// Multiply two numbers.
    pub fn mul(&self, other: &Handle<'_>) -> HostResult<Handle<'rt>> {
        self.binary(BinaryOp::Mul, other)
    }

    /// Floor-divide by a number.
    pub fn floordiv(&self, other: &Handle<'_>) -> HostResult<Handle<'rt>> {
        self.binary(BinaryOp::FloorDiv, other)
    }

    /// Remainder under host semantics.
    pub fn rem(&self, other: &Handle<'_>) -> HostResult<Handle<'rt>> {
        self.binary(BinaryOp::Rem, other)
    }

    /// Quotient and remainder in one host call.
    pub fn divmod(&self, other: &Handle<'_>) -> HostResult<(Handle<'rt>, Handle<'rt>)> {
        let pair = self.binary(BinaryOp::Divmod, other)?;
        let quot = Handle::steal(self.rt, self.rt.sequence_item(pair.raw(), 0))?;
        let rem = Handle::steal(self.rt, self.rt.sequence_item(pair.raw(), 1))?;
        Ok((quot, rem))
    }

    /// Read the object as a native `i64`.
    pub fn as_i64(&self) -> HostResult<i64> {
        let value = self.rt.int_as_i64(self.raw);
        check_pending(self.rt)?;
        Ok(value)
    }

    /// Read the object as a native `u64`.
    pub fn as_u64(&self) -> HostResult<u64> {
        let value = self.rt.int_as_u64(self.raw);
        check_pending(self.rt)?;
        Ok(value)
    }

    // ========================================================================
    // Type checks
    // ========================================================================

    /// Whether the object is a type object.
    pub fn is_type(&self) -> bool {
        self.rt.is_type(self.raw)
    }

    /// Whether the object is a tuple.
    pub fn is_tuple(&self) -> bool {
        self.rt.is_tuple(self.raw)
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Get an iteration cursor over the object.
    ///
    /// Raises for non-iterables, with the host's diagnostic on the slot.
    pub fn iter(&self) -> HostResult<IterHandle<'rt>> {
        IterHandle::new(self.rt, self.rt.get_iter(self.raw))
    }
}

impl<'rt> Clone for Handle<'rt> {
    /// Duplicate the handle: borrowing sources give borrowing duplicates,
    /// owning sources give owning duplicates with a fresh retain.
    fn clone(&self) -> Self {
        if !self.borrowed {
            self.rt.retain(self.raw);
        }
        Self {
            raw: self.raw,
            borrowed: self.borrowed,
            rt: self.rt,
        }
    }
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        if !self.borrowed {
            self.rt.release(self.raw);
        }
    }
}

impl std::fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("raw", &self.raw)
            .field("borrowed", &self.borrowed)
            .finish()
    }
}

// Operator sugar over the numeric protocol methods. Fallible by nature, so
// the output is a HostResult rather than a bare Handle.

impl<'rt> ops::Add for &Handle<'rt> {
    type Output = HostResult<Handle<'rt>>;

    fn add(self, rhs: Self) -> Self::Output {
        Handle::add(self, rhs)
    }
}

impl<'rt> ops::Sub for &Handle<'rt> {
    type Output = HostResult<Handle<'rt>>;

    fn sub(self, rhs: Self) -> Self::Output {
        Handle::sub(self, rhs)
    }
}

impl<'rt> ops::Mul for &Handle<'rt> {
    type Output = HostResult<Handle<'rt>>;

    fn mul(self, rhs: Self) -> Self::Output {
        Handle::mul(self, rhs)
    }
}

impl<'rt> ops::Div for &Handle<'rt> {
    type Output = HostResult<Handle<'rt>>;

    /// Floor division, the less surprising reading of `/` for integer
    /// host objects.
    fn div(self, rhs: Self) -> Self::Output {
        Handle::floordiv(self, rhs)
    }
}

impl<'rt> ops::Rem for &Handle<'rt> {
    type Output = HostResult<Handle<'rt>>;

    fn rem(self, rhs: Self) -> Self::Output {
        Handle::rem(self, rhs)
    }
}
