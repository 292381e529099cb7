//! HostRuntime trait: abstract host object runtime
//!
//! Defines the capability surface the handle layer needs from the host:
//! reference counting, the pending-error slot, and the protocol entry
//! points (numbers, comparison, attributes, iteration, value building,
//! sequences, types, modules). The handle layer programs against
//! `&dyn HostRuntime` only; the real host and the in-process
//! [`HeapRuntime`](crate::testing::HeapRuntime) both implement this trait.
//!
//! # Conventions
//!
//! The trait keeps the host's C-level signaling conventions on purpose,
//! because discriminating them is exactly the handle layer's job:
//!
//! - fallible allocations return [`RawRef::NULL`] with the error slot set;
//! - `iter_next` returns null for *both* exhaustion and failure, told apart
//!   by the error slot;
//! - status operations return `0` on success and `-1` with the slot set;
//! - `compare` is tri-state: `-1` error, `0` false, `1` true;
//! - `int_as_*` return a sentinel value and set the slot on failure.

use crate::error::{ErrorKind, HostError};
use crate::raw::RawRef;

/// Binary operation codes for the numeric protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Floor division
    FloorDiv,
    /// Remainder (host semantics, sign follows the divisor)
    Rem,
    /// Quotient and remainder as a pair
    Divmod,
}

/// Operator codes for rich comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// One argument consumed by [`HostRuntime::build_value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildArg {
    /// Consumed by an `i` template item
    Int(i64),
    /// Consumed by an `I` template item
    Uint(u64),
    /// Consumed by a `d` template item
    Float(f64),
}

/// Record from which the host finalizes a type object.
///
/// Held inline by [`StaticType`](crate::StaticType); the customization step
/// passed to `make_ready` mutates this record before the host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    /// Type name as exposed to host code
    pub name: String,
    /// Documentation string
    pub doc: String,
    /// Instance payload size in bytes
    pub basic_size: usize,
}

impl TypeSpec {
    /// Create a spec with the given name and no payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            basic_size: 0,
        }
    }
}

/// One named field of a struct sequence type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSeqField {
    /// Field name, used for attribute access on instances
    pub name: String,
    /// Field documentation
    pub doc: String,
}

/// Descriptor for a fixed-layout struct sequence type.
///
/// Struct sequence types cannot go through the generic type path on the
/// host side, so they get their own initialization entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSeqDesc {
    /// Type name
    pub name: String,
    /// Type documentation
    pub doc: String,
    /// Named fields, in positional order
    pub fields: Vec<StructSeqField>,
}

impl StructSeqDesc {
    /// Create a descriptor with the given name and fields.
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            fields: fields
                .iter()
                .map(|f| StructSeqField {
                    name: (*f).to_string(),
                    doc: String::new(),
                })
                .collect(),
        }
    }
}

/// Abstract host object runtime.
///
/// The single seam between the handle layer and whatever actually owns the
/// objects. Reference ownership moves across this boundary the C way:
/// methods documented as returning a *new reference* hand the caller one
/// release obligation; methods documented as *stealing* take one obligation
/// off the caller's hands.
pub trait HostRuntime {
    // ========================================================================
    // Object lifetime
    // ========================================================================

    /// Increment the reference count. No-op for null.
    fn retain(&self, obj: RawRef);

    /// Decrement the reference count, destroying the object at zero.
    /// No-op for null.
    fn release(&self, obj: RawRef);

    /// Current reference count; `0` for null.
    fn refcount(&self, obj: RawRef) -> usize;

    // ========================================================================
    // Error channel
    // ========================================================================

    /// Whether an error is pending on the slot.
    fn error_pending(&self) -> bool;

    /// Record a diagnostic on the slot, replacing any pending one.
    fn set_error(&self, kind: ErrorKind, message: &str);

    /// Consume and clear the pending diagnostic, if any.
    fn take_error(&self) -> Option<HostError>;

    // ========================================================================
    // Introspection predicates
    // ========================================================================

    /// Host-level type name of the object, for diagnostics.
    fn type_name(&self, obj: RawRef) -> String;

    /// Whether the object supports the numeric protocol.
    fn is_number(&self, obj: RawRef) -> bool;

    /// Whether the object is an iterator (supports `iter_next`).
    fn is_iterator(&self, obj: RawRef) -> bool;

    /// Whether the object is a type object.
    fn is_type(&self, obj: RawRef) -> bool;

    /// Whether the object is a tuple.
    fn is_tuple(&self, obj: RawRef) -> bool;

    // ========================================================================
    // Numeric protocol
    // ========================================================================

    /// Apply a binary numeric operation. New reference, or null with the
    /// error slot set.
    fn number_binary(&self, op: BinaryOp, lhs: RawRef, rhs: RawRef) -> RawRef;

    /// Build an integer object. New reference, or null with the slot set.
    fn int_from_i64(&self, value: i64) -> RawRef;

    /// Build an integer object from an unsigned value. New reference, or
    /// null with the slot set.
    fn int_from_u64(&self, value: u64) -> RawRef;

    /// Read an integer object as `i64`. On failure returns `-1` with the
    /// slot set; callers must probe the slot, since `-1` is also a value.
    fn int_as_i64(&self, obj: RawRef) -> i64;

    /// Read an integer object as `u64`. Failure convention as
    /// [`int_as_i64`](Self::int_as_i64), with sentinel `u64::MAX`.
    fn int_as_u64(&self, obj: RawRef) -> u64;

    // ========================================================================
    // Rich comparison
    // ========================================================================

    /// Compare two objects under the given operator. Tri-state result:
    /// `1` true, `0` false, `-1` failure with the slot set.
    fn compare(&self, op: CmpOp, lhs: RawRef, rhs: RawRef) -> i32;

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Get an attribute by name. New reference, or null with the slot set.
    fn get_attr(&self, obj: RawRef, name: &str) -> RawRef;

    /// Set an attribute by name, borrowing `value`. `0` on success, `-1`
    /// with the slot set on failure.
    fn set_attr(&self, obj: RawRef, name: &str, value: RawRef) -> i32;

    /// Delete an attribute by name. `0` on success, `-1` with the slot set.
    fn del_attr(&self, obj: RawRef, name: &str) -> i32;

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Get an iterator over the object. New reference, or null with the
    /// slot set (e.g. for non-iterables).
    fn get_iter(&self, obj: RawRef) -> RawRef;

    /// Pull the next value from an iterator. New reference; null means
    /// either exhaustion (slot clean) or failure (slot set).
    fn iter_next(&self, iter: RawRef) -> RawRef;

    // ========================================================================
    // Value building and sequences
    // ========================================================================

    /// Build an object tree from a template: `i` an [`BuildArg::Int`],
    /// `I` a [`BuildArg::Uint`], `d` a [`BuildArg::Float`], `[...]` a
    /// list, `(...)` a tuple; two or more top-level items make a tuple.
    /// New reference, or null with the slot set.
    fn build_value(&self, template: &str, args: &[BuildArg]) -> RawRef;

    /// Allocate a tuple of the given length with empty slots. New
    /// reference, or null with the slot set.
    fn tuple_new(&self, len: usize) -> RawRef;

    /// Set a tuple slot, stealing `value`. Only valid on freshly built
    /// tuples at in-range positions.
    fn tuple_set(&self, tuple: RawRef, pos: usize, value: RawRef);

    /// Get an item of a sequence by position. New reference, or null with
    /// the slot set.
    fn sequence_item(&self, obj: RawRef, pos: usize) -> RawRef;

    /// Allocate an instance of a struct sequence type. New reference, or
    /// null with the slot set.
    fn struct_seq_new(&self, ty: RawRef) -> RawRef;

    /// Set a struct sequence slot, stealing `value`.
    fn struct_seq_set(&self, seq: RawRef, pos: usize, value: RawRef);

    // ========================================================================
    // Types and modules
    // ========================================================================

    /// Finalize a type object from a spec. New reference, or null with the
    /// slot set.
    fn finalize_type(&self, spec: &TypeSpec) -> RawRef;

    /// Initialize a struct sequence type from a descriptor. New reference,
    /// or null with the slot set.
    fn init_struct_seq_type(&self, desc: &StructSeqDesc) -> RawRef;

    /// Add a named member to a module namespace, stealing `value` whether
    /// or not the call succeeds. `0` on success, `-1` with the slot set.
    fn module_add(&self, module: RawRef, name: &str, value: RawRef) -> i32;
}
