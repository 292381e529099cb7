//! Conversions between host objects and native values
//!
//! `FromHost` reads a handle into a native value; `ToHost` builds a host
//! object from one. Both delegate to the handle's protocol methods, so
//! failures follow the usual rule: the host error slot holds the
//! diagnostic and [`Raised`](crate::Raised) propagates.

use crate::error::HostResult;
use crate::handle::Handle;
use crate::runtime::HostRuntime;

/// Read a host object into a native value.
pub trait FromHost: Sized {
    /// Convert from a handle, raising when the object cannot be read as
    /// this type.
    fn from_host(handle: &Handle<'_>) -> HostResult<Self>;
}

/// Build a host object from a native value.
pub trait ToHost {
    /// Convert into a handle on the given runtime.
    fn to_host<'rt>(self, rt: &'rt dyn HostRuntime) -> HostResult<Handle<'rt>>;
}

impl FromHost for i64 {
    fn from_host(handle: &Handle<'_>) -> HostResult<Self> {
        handle.as_i64()
    }
}

impl FromHost for u64 {
    fn from_host(handle: &Handle<'_>) -> HostResult<Self> {
        handle.as_u64()
    }
}

impl FromHost for bool {
    fn from_host(handle: &Handle<'_>) -> HostResult<Self> {
        Ok(handle.as_i64()? != 0)
    }
}

impl ToHost for i64 {
    fn to_host<'rt>(self, rt: &'rt dyn HostRuntime) -> HostResult<Handle<'rt>> {
        Handle::from_i64(rt, self)
    }
}

impl ToHost for u64 {
    fn to_host<'rt>(self, rt: &'rt dyn HostRuntime) -> HostResult<Handle<'rt>> {
        Handle::from_u64(rt, self)
    }
}

impl<'rt> Handle<'rt> {
    /// Read the object as a native value of the given type.
    pub fn extract<T: FromHost>(&self) -> HostResult<T> {
        T::from_host(self)
    }
}
