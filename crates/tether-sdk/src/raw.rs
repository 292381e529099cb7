//! RawRef: opaque reference word for host objects
//!
//! A `RawRef` names an object inside the host runtime the same way a raw
//! `*mut` pointer would at a C ABI boundary: it is a plain 64-bit word with
//! no ownership attached and a designated null value. All retain/release
//! bookkeeping lives in [`Handle`](crate::Handle); a bare `RawRef` carries
//! no obligation and no guarantee of liveness.

/// Opaque 64-bit reference to a host object.
///
/// The bit pattern is assigned by the host runtime and is meaningful only to
/// it. Zero is the null reference (`RawRef::NULL`), matching the C-level
/// convention where a null return either means "nothing" or "failure,
/// consult the error slot".
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RawRef(u64);

impl RawRef {
    /// The null reference.
    pub const NULL: RawRef = RawRef(0);

    /// Create from raw bits handed out by a host runtime.
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get the raw bits for handing back to a host runtime.
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Check whether this is the null reference.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for RawRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Debug for RawRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "RawRef::null")
        } else {
            write!(f, "RawRef({:#x})", self.0)
        }
    }
}
