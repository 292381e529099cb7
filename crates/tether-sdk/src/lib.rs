//! Tether SDK - Reference-counted handles over a host object runtime
//!
//! This crate wraps the raw reference-counted object references of an
//! embedded host runtime in RAII handles, so extension code written in
//! Rust cannot leak or double-release references. The host is abstracted
//! behind the [`HostRuntime`] trait; everything else layers on top of it:
//!
//! - [`Handle`] owns (or borrows) one reference and releases it on drop;
//! - [`IterHandle`] drives the host's iteration protocol one value ahead;
//! - [`Tuple`], [`StructSeq`], [`Module`] and [`StaticType`] wrap the
//!   container and type protocols;
//! - [`Raised`] is the content-free failure signal; the diagnostic itself
//!   stays on the host's error slot.
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{BuildArg, Handle, HostResult, HostRuntime};
//!
//! fn sum(rt: &dyn HostRuntime) -> HostResult<i64> {
//!     let list = Handle::build(rt, "[iii]", &[
//!         BuildArg::Int(1),
//!         BuildArg::Int(2),
//!         BuildArg::Int(3),
//!     ])?;
//!     let mut total = 0;
//!     for item in list.iter()? {
//!         total += item?.as_i64()?;
//!     }
//!     Ok(total)
//! }
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod handle;
pub mod iter;
pub mod logging;
pub mod raw;
pub mod runtime;
pub mod testing;
pub mod types;

pub use convert::{FromHost, ToHost};
pub use error::{check_pending, ErrorKind, HostError, HostResult, Raised};
pub use handle::{Acquire, Handle};
pub use iter::IterHandle;
pub use raw::RawRef;
pub use runtime::{
    BinaryOp, BuildArg, CmpOp, HostRuntime, StructSeqDesc, StructSeqField, TypeSpec,
};
pub use testing::HeapRuntime;
pub use types::{Module, StaticType, StructSeq, Tuple};
