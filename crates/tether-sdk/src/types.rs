//! Specialized handle subtypes
//!
//! Thin convenience wrappers over [`Handle`] for tuple building, struct
//! sequence building, module population and static type lifecycle. None of
//! them add ownership invariants; they only package the construction
//! shortcuts the base handle would make verbose.

use std::ops::Deref;

use tracing::debug;

use crate::error::{HostResult, Raised};
use crate::handle::{Acquire, Handle};
use crate::raw::RawRef;
use crate::runtime::{HostRuntime, StructSeqDesc, TypeSpec};

// ============================================================================
// Tuple
// ============================================================================

/// Builder-style handle for host tuples.
///
/// Meant for creating new tuples; reading existing ones goes through the
/// generic sequence and iteration protocols instead.
pub struct Tuple<'rt> {
    handle: Handle<'rt>,
}

impl<'rt> Tuple<'rt> {
    /// Allocate a tuple of the given length with empty slots.
    pub fn with_len(rt: &'rt dyn HostRuntime, len: usize) -> HostResult<Self> {
        Ok(Self {
            handle: Handle::steal(rt, rt.tuple_new(len))?,
        })
    }

    /// Set the item at a position, consuming the argument's reference.
    ///
    /// Hand the handle itself over to transfer its claim without touching
    /// the count; pass a clone to keep yours.
    pub fn set_item(&self, pos: usize, mut value: Handle<'_>) {
        let stolen = value.release();
        self.handle.rt().tuple_set(self.handle.raw(), pos, stolen);
    }

    /// Unwrap into the underlying handle.
    pub fn into_handle(self) -> Handle<'rt> {
        self.handle
    }
}

impl<'rt> Deref for Tuple<'rt> {
    type Target = Handle<'rt>;

    fn deref(&self) -> &Handle<'rt> {
        &self.handle
    }
}

// ============================================================================
// StructSeq
// ============================================================================

/// Builder-style handle for host struct sequence objects.
#[derive(Debug)]
pub struct StructSeq<'rt> {
    handle: Handle<'rt>,
}

impl<'rt> StructSeq<'rt> {
    /// Allocate an instance of the given struct sequence type.
    ///
    /// The caller is responsible for `ty` really naming a struct sequence
    /// type.
    pub fn new(rt: &'rt dyn HostRuntime, ty: RawRef) -> HostResult<Self> {
        Ok(Self {
            handle: Handle::steal(rt, rt.struct_seq_new(ty))?,
        })
    }

    /// Allocate an instance of a type held by a [`StaticType`].
    pub fn from_static(rt: &'rt dyn HostRuntime, ty: &StaticType) -> HostResult<Self> {
        Self::new(rt, ty.raw())
    }

    /// Set the item at a position, consuming the argument's reference.
    pub fn set_item(&self, pos: usize, mut value: Handle<'_>) {
        let stolen = value.release();
        self.handle.rt().struct_seq_set(self.handle.raw(), pos, stolen);
    }

    /// Unwrap into the underlying handle.
    pub fn into_handle(self) -> Handle<'rt> {
        self.handle
    }
}

impl<'rt> Deref for StructSeq<'rt> {
    type Target = Handle<'rt>;

    fn deref(&self) -> &Handle<'rt> {
        &self.handle
    }
}

// ============================================================================
// Module
// ============================================================================

/// Handle for host modules.
///
/// During extension setup modules are accessed, not owned, so the default
/// wrapping mode is borrowing, unlike the base handle's stealing default.
pub struct Module<'rt> {
    handle: Handle<'rt>,
}

impl<'rt> Module<'rt> {
    /// Wrap a module reference in borrowing mode, raising on null.
    pub fn wrap(rt: &'rt dyn HostRuntime, raw: RawRef) -> HostResult<Self> {
        Self::new(rt, raw, Acquire::Borrow, false)
    }

    /// Wrap a module reference under an explicit acquisition mode.
    pub fn new(
        rt: &'rt dyn HostRuntime,
        raw: RawRef,
        acquire: Acquire,
        allow_null: bool,
    ) -> HostResult<Self> {
        Ok(Self {
            handle: Handle::new(rt, raw, acquire, allow_null)?,
        })
    }

    /// Add a named member to the module, consuming the argument's
    /// reference whether or not the host accepts it.
    pub fn add_object(&self, name: &str, mut value: Handle<'_>) -> HostResult<()> {
        let stolen = value.release();
        if self.handle.rt().module_add(self.handle.raw(), name, stolen) != 0 {
            return Err(Raised);
        }
        Ok(())
    }

    /// Unwrap into the underlying handle.
    pub fn into_handle(self) -> Handle<'rt> {
        self.handle
    }
}

impl<'rt> Deref for Module<'rt> {
    type Target = Handle<'rt>;

    fn deref(&self) -> &Handle<'rt> {
        &self.handle
    }
}

// ============================================================================
// StaticType
// ============================================================================

/// Lifecycle holder for a statically defined host type.
///
/// Host type objects cannot be finalized before the host runtime itself is
/// up, so the holder keeps the [`TypeSpec`] record inline together with a
/// one-shot readiness latch. Construct the holder at a well-defined
/// initialization point and call one of the `make_ready` entry points when
/// the runtime is available; second and later calls are no-ops.
pub struct StaticType {
    spec: TypeSpec,
    obj: RawRef,
    ready: bool,
}

impl StaticType {
    /// Create an unready holder around a type record.
    pub fn new(spec: TypeSpec) -> Self {
        Self {
            spec,
            obj: RawRef::NULL,
            ready: false,
        }
    }

    /// Whether the type has been made ready.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// The type record, as last seen by the host.
    pub fn spec(&self) -> &TypeSpec {
        &self.spec
    }

    /// The finalized type object; null until ready.
    pub fn raw(&self) -> RawRef {
        self.obj
    }

    /// Finalize the type on the host.
    ///
    /// On the first call the customization step runs against the record,
    /// then the host finalizes it; `Ok(true)` is returned. Later calls do
    /// nothing, skip the customization step entirely, and return
    /// `Ok(false)`.
    pub fn make_ready<F>(&mut self, rt: &dyn HostRuntime, customize: F) -> HostResult<bool>
    where
        F: FnOnce(&mut TypeSpec),
    {
        if self.ready {
            return Ok(false);
        }

        customize(&mut self.spec);
        let obj = rt.finalize_type(&self.spec);
        if obj.is_null() {
            return Err(Raised);
        }

        debug!(name = %self.spec.name, "static type ready");
        self.obj = obj;
        self.ready = true;
        Ok(true)
    }

    /// Finalize the type as a struct sequence.
    ///
    /// Struct sequence types cannot go through the generic type path, so
    /// this entry point hands the descriptor to the host's dedicated
    /// initializer. Idempotent like [`make_ready`](Self::make_ready).
    pub fn make_ready_struct_seq(
        &mut self,
        rt: &dyn HostRuntime,
        desc: &StructSeqDesc,
    ) -> HostResult<bool> {
        if self.ready {
            return Ok(false);
        }

        let obj = rt.init_struct_seq_type(desc);
        if obj.is_null() {
            return Err(Raised);
        }

        debug!(name = %desc.name, "struct sequence type ready");
        self.spec.name = desc.name.clone();
        self.spec.doc = desc.doc.clone();
        self.obj = obj;
        self.ready = true;
        Ok(true)
    }

    /// A handle to the finalized type object: borrowing by default, owning
    /// with a fresh retain when `retain` is set. Raises while unready.
    pub fn handle<'rt>(
        &self,
        rt: &'rt dyn HostRuntime,
        retain: bool,
    ) -> HostResult<Handle<'rt>> {
        let acquire = if retain {
            Acquire::Retain
        } else {
            Acquire::Borrow
        };
        Handle::new(rt, self.obj, acquire, false)
    }
}
