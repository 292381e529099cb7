//! HeapRuntime: in-process counted-object host for tests
//!
//! A small reference-counted object heap implementing [`HostRuntime`], so
//! the handle layer can be exercised without linking a real host. Objects
//! live in cells keyed by their `RawRef` bits; containers own retained
//! references to their elements and release them recursively when their
//! own count hits zero. Small integers are interned singletons, mirroring
//! the host convention the build/parse tests rely on.
//!
//! Single-threaded on purpose: the whole ownership model is a stack
//! discipline, so the heap uses `RefCell`/`Cell` and is `!Sync`.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::error::{ErrorKind, HostError};
use crate::raw::RawRef;
use crate::runtime::{BinaryOp, BuildArg, CmpOp, HostRuntime, StructSeqDesc, TypeSpec};

const SMALL_INT_MIN: i64 = -5;
const SMALL_INT_MAX: i64 = 256;

/// One object on the fake heap.
enum Obj {
    Int(i64),
    Float(f64),
    List(Vec<RawRef>),
    Tuple(Vec<RawRef>),
    Iter(IterState),
    Module {
        name: String,
        members: HashMap<String, RawRef>,
    },
    Type {
        name: String,
        fields: Vec<String>,
    },
    StructSeq {
        ty: RawRef,
        items: Vec<RawRef>,
    },
}

struct IterState {
    items: VecDeque<RawRef>,
    // 1-based index of the pull that fails, for failure-injection tests.
    fail_at_call: Option<usize>,
    calls: usize,
}

struct Slot {
    refcount: usize,
    obj: Obj,
}

enum Node {
    Int(i64),
    Float(f64),
    List(Vec<RawRef>),
    Tuple(Vec<RawRef>),
    Other,
}

/// In-process reference-counted host runtime.
pub struct HeapRuntime {
    slots: RefCell<HashMap<u64, Slot>>,
    next_id: Cell<u64>,
    error: RefCell<Option<HostError>>,
    small_ints: RefCell<HashMap<i64, RawRef>>,
}

impl HeapRuntime {
    /// Create an empty heap with a clean error slot.
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            error: RefCell::new(None),
            small_ints: RefCell::new(HashMap::new()),
        }
    }

    /// Number of live cells, interned integers included.
    pub fn live_objects(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Allocate a module object. New reference.
    pub fn new_module(&self, name: &str) -> RawRef {
        self.alloc(Obj::Module {
            name: name.to_string(),
            members: HashMap::new(),
        })
    }

    /// Allocate an iterator over the given items (borrowed, retained here)
    /// whose `fail_at_call`-th pull fails with a diagnostic on the slot.
    /// New reference.
    pub fn failing_iter(&self, items: &[RawRef], fail_at_call: usize) -> RawRef {
        for item in items {
            self.retain(*item);
        }
        self.alloc(Obj::Iter(IterState {
            items: items.iter().copied().collect(),
            fail_at_call: Some(fail_at_call),
            calls: 0,
        }))
    }

    fn alloc(&self, obj: Obj) -> RawRef {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.slots.borrow_mut().insert(id, Slot { refcount: 1, obj });
        trace!(id, "object allocated");
        RawRef::from_bits(id)
    }

    fn destroy(&self, obj: Obj) {
        match obj {
            Obj::List(items) | Obj::Tuple(items) => {
                for item in items {
                    self.release(item);
                }
            }
            Obj::Iter(state) => {
                for item in state.items {
                    self.release(item);
                }
            }
            Obj::Module { members, .. } => {
                for (_, member) in members {
                    self.release(member);
                }
            }
            Obj::StructSeq { ty, items } => {
                self.release(ty);
                for item in items {
                    self.release(item);
                }
            }
            Obj::Int(_) | Obj::Float(_) | Obj::Type { .. } => {}
        }
    }

    fn raise(&self, kind: ErrorKind, message: impl Into<String>) {
        self.set_error(kind, &message.into());
    }

    // Detached view of one cell, so comparisons can recurse without
    // holding the heap borrow.
    fn snapshot(&self, obj: RawRef) -> Node {
        let slots = self.slots.borrow();
        match slots.get(&obj.to_bits()).map(|s| &s.obj) {
            Some(Obj::Int(v)) => Node::Int(*v),
            Some(Obj::Float(v)) => Node::Float(*v),
            Some(Obj::List(items)) => Node::List(items.clone()),
            Some(Obj::Tuple(items)) => Node::Tuple(items.clone()),
            _ => Node::Other,
        }
    }

    fn deep_eq(&self, a: RawRef, b: RawRef) -> bool {
        if a == b {
            return true;
        }
        match (self.snapshot(a), self.snapshot(b)) {
            (Node::Int(x), Node::Int(y)) => x == y,
            (Node::Float(x), Node::Float(y)) => x == y,
            (Node::Int(x), Node::Float(y)) | (Node::Float(y), Node::Int(x)) => x as f64 == y,
            (Node::List(xs), Node::List(ys)) | (Node::Tuple(xs), Node::Tuple(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys.iter()).all(|(x, y)| self.deep_eq(*x, *y))
            }
            _ => false,
        }
    }

    // Ordering is defined within numbers and within same-kind sequences
    // (lexicographic); everything else is unorderable.
    fn order(&self, a: RawRef, b: RawRef) -> Option<Ordering> {
        match (self.snapshot(a), self.snapshot(b)) {
            (Node::Int(x), Node::Int(y)) => Some(x.cmp(&y)),
            (Node::Float(x), Node::Float(y)) => x.partial_cmp(&y),
            (Node::Int(x), Node::Float(y)) => (x as f64).partial_cmp(&y),
            (Node::Float(x), Node::Int(y)) => x.partial_cmp(&(y as f64)),
            (Node::List(xs), Node::List(ys)) | (Node::Tuple(xs), Node::Tuple(ys)) => {
                for (x, y) in xs.iter().zip(ys.iter()) {
                    match self.order(*x, *y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(xs.len().cmp(&ys.len()))
            }
            _ => None,
        }
    }

    fn build_items(
        &self,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        args: &[BuildArg],
        next_arg: &mut usize,
        closer: Option<char>,
    ) -> Result<Vec<RawRef>, ()> {
        let mut built: Vec<RawRef> = Vec::new();
        loop {
            let ch = match chars.peek().copied() {
                None => {
                    if closer.is_some() {
                        self.raise(ErrorKind::Value, "unterminated template group");
                        self.drop_built(built);
                        return Err(());
                    }
                    return Ok(built);
                }
                Some(ch) => ch,
            };
            if Some(ch) == closer {
                chars.next();
                return Ok(built);
            }
            chars.next();
            let item = match ch {
                ' ' | ',' => continue,
                'i' => self.next_int_arg(args, next_arg).map(|v| self.int_from_i64(v)),
                'I' => self.next_uint_arg(args, next_arg).map(|v| self.int_from_u64(v)),
                'd' => self
                    .next_float_arg(args, next_arg)
                    .map(|v| self.alloc(Obj::Float(v))),
                '[' => self
                    .build_items(chars, args, next_arg, Some(']'))
                    .map(|items| self.alloc(Obj::List(items))),
                '(' => self
                    .build_items(chars, args, next_arg, Some(')'))
                    .map(|items| self.alloc(Obj::Tuple(items))),
                other => {
                    self.raise(
                        ErrorKind::Value,
                        format!("bad template character '{other}'"),
                    );
                    Err(())
                }
            };
            match item {
                Ok(raw) if !raw.is_null() => built.push(raw),
                _ => {
                    self.drop_built(built);
                    return Err(());
                }
            }
        }
    }

    fn drop_built(&self, built: Vec<RawRef>) {
        for raw in built {
            self.release(raw);
        }
    }

    fn next_int_arg(&self, args: &[BuildArg], next_arg: &mut usize) -> Result<i64, ()> {
        match args.get(*next_arg) {
            Some(BuildArg::Int(v)) => {
                *next_arg += 1;
                Ok(*v)
            }
            _ => {
                self.raise(ErrorKind::Value, "template expects an Int argument");
                Err(())
            }
        }
    }

    fn next_uint_arg(&self, args: &[BuildArg], next_arg: &mut usize) -> Result<u64, ()> {
        match args.get(*next_arg) {
            Some(BuildArg::Uint(v)) => {
                *next_arg += 1;
                Ok(*v)
            }
            _ => {
                self.raise(ErrorKind::Value, "template expects a Uint argument");
                Err(())
            }
        }
    }

    fn next_float_arg(&self, args: &[BuildArg], next_arg: &mut usize) -> Result<f64, ()> {
        match args.get(*next_arg) {
            Some(BuildArg::Float(v)) => {
                *next_arg += 1;
                Ok(*v)
            }
            _ => {
                self.raise(ErrorKind::Value, "template expects a Float argument");
                Err(())
            }
        }
    }
}

impl Default for HeapRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for HeapRuntime {
    // ========================================================================
    // Object lifetime
    // ========================================================================

    fn retain(&self, obj: RawRef) {
        if obj.is_null() {
            return;
        }
        let mut slots = self.slots.borrow_mut();
        let slot = slots
            .get_mut(&obj.to_bits())
            .expect("retain of an object not on the heap");
        slot.refcount += 1;
        trace!(id = obj.to_bits(), refcount = slot.refcount, "retain");
    }

    fn release(&self, obj: RawRef) {
        if obj.is_null() {
            return;
        }
        let dead = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots
                .get_mut(&obj.to_bits())
                .expect("release of an object not on the heap");
            assert!(slot.refcount > 0, "refcount underflow");
            slot.refcount -= 1;
            trace!(id = obj.to_bits(), refcount = slot.refcount, "release");
            if slot.refcount == 0 {
                slots.remove(&obj.to_bits())
            } else {
                None
            }
        };
        if let Some(slot) = dead {
            trace!(id = obj.to_bits(), "object destroyed");
            self.destroy(slot.obj);
        }
    }

    fn refcount(&self, obj: RawRef) -> usize {
        if obj.is_null() {
            return 0;
        }
        self.slots
            .borrow()
            .get(&obj.to_bits())
            .map(|slot| slot.refcount)
            .unwrap_or(0)
    }

    // ========================================================================
    // Error channel
    // ========================================================================

    fn error_pending(&self) -> bool {
        self.error.borrow().is_some()
    }

    fn set_error(&self, kind: ErrorKind, message: &str) {
        debug!(%kind, message, "error recorded");
        *self.error.borrow_mut() = Some(HostError::new(kind, message));
    }

    fn take_error(&self) -> Option<HostError> {
        self.error.borrow_mut().take()
    }

    // ========================================================================
    // Introspection predicates
    // ========================================================================

    fn type_name(&self, obj: RawRef) -> String {
        let direct = {
            let slots = self.slots.borrow();
            match slots.get(&obj.to_bits()).map(|s| &s.obj) {
                Some(Obj::Int(_)) => Ok("int"),
                Some(Obj::Float(_)) => Ok("float"),
                Some(Obj::List(_)) => Ok("list"),
                Some(Obj::Tuple(_)) => Ok("tuple"),
                Some(Obj::Iter(_)) => Ok("iterator"),
                Some(Obj::Module { .. }) => Ok("module"),
                Some(Obj::Type { .. }) => Ok("type"),
                Some(Obj::StructSeq { ty, .. }) => Err(*ty),
                None => Ok("<null>"),
            }
        };
        match direct {
            Ok(name) => name.to_string(),
            Err(ty) => self.type_name(ty),
        }
    }

    fn is_number(&self, obj: RawRef) -> bool {
        matches!(
            self.slots.borrow().get(&obj.to_bits()).map(|s| &s.obj),
            Some(Obj::Int(_)) | Some(Obj::Float(_))
        )
    }

    fn is_iterator(&self, obj: RawRef) -> bool {
        matches!(
            self.slots.borrow().get(&obj.to_bits()).map(|s| &s.obj),
            Some(Obj::Iter(_))
        )
    }

    fn is_type(&self, obj: RawRef) -> bool {
        matches!(
            self.slots.borrow().get(&obj.to_bits()).map(|s| &s.obj),
            Some(Obj::Type { .. })
        )
    }

    fn is_tuple(&self, obj: RawRef) -> bool {
        matches!(
            self.slots.borrow().get(&obj.to_bits()).map(|s| &s.obj),
            Some(Obj::Tuple(_))
        )
    }

    // ========================================================================
    // Numeric protocol
    // ========================================================================

    fn number_binary(&self, op: BinaryOp, lhs: RawRef, rhs: RawRef) -> RawRef {
        let operands = {
            let slots = self.slots.borrow();
            match (
                slots.get(&lhs.to_bits()).map(|s| &s.obj),
                slots.get(&rhs.to_bits()).map(|s| &s.obj),
            ) {
                (Some(Obj::Int(a)), Some(Obj::Int(b))) => Some((*a, *b)),
                _ => None,
            }
        };
        let (a, b) = match operands {
            Some(pair) => pair,
            None => {
                self.raise(
                    ErrorKind::Type,
                    format!(
                        "unsupported operand type(s): '{}' and '{}'",
                        self.type_name(lhs),
                        self.type_name(rhs)
                    ),
                );
                return RawRef::NULL;
            }
        };

        if matches!(op, BinaryOp::FloorDiv | BinaryOp::Rem | BinaryOp::Divmod) {
            if b == 0 {
                self.raise(ErrorKind::Value, "integer division or modulo by zero");
                return RawRef::NULL;
            }
            // The one quotient that does not fit an i64.
            if a == i64::MIN && b == -1 {
                self.raise(ErrorKind::Overflow, "integer result out of range");
                return RawRef::NULL;
            }
        }

        let checked = |v: Option<i64>| match v {
            Some(v) => Ok(v),
            None => {
                self.raise(ErrorKind::Overflow, "integer result out of range");
                Err(())
            }
        };

        // Floor semantics: quotient rounds toward negative infinity and
        // the remainder takes the divisor's sign.
        let floor_pair = |a: i64, b: i64| {
            let mut q = a / b;
            let mut r = a % b;
            if r != 0 && (r < 0) != (b < 0) {
                q -= 1;
                r += b;
            }
            (q, r)
        };

        let result = match op {
            BinaryOp::Add => checked(a.checked_add(b)),
            BinaryOp::Sub => checked(a.checked_sub(b)),
            BinaryOp::Mul => checked(a.checked_mul(b)),
            BinaryOp::FloorDiv => Ok(floor_pair(a, b).0),
            BinaryOp::Rem => Ok(floor_pair(a, b).1),
            BinaryOp::Divmod => {
                let (q, r) = floor_pair(a, b);
                let pair = vec![self.int_from_i64(q), self.int_from_i64(r)];
                return self.alloc(Obj::Tuple(pair));
            }
        };
        match result {
            Ok(v) => self.int_from_i64(v),
            Err(()) => RawRef::NULL,
        }
    }

    fn int_from_i64(&self, value: i64) -> RawRef {
        if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&value) {
            let interned = self.small_ints.borrow().get(&value).copied();
            let raw = match interned {
                Some(raw) => raw,
                None => {
                    // The intern table keeps the singleton's initial
                    // reference alive for the heap's lifetime.
                    let raw = self.alloc(Obj::Int(value));
                    self.small_ints.borrow_mut().insert(value, raw);
                    raw
                }
            };
            self.retain(raw);
            return raw;
        }
        self.alloc(Obj::Int(value))
    }

    fn int_from_u64(&self, value: u64) -> RawRef {
        if value > i64::MAX as u64 {
            self.raise(ErrorKind::Overflow, "unsigned value too large for the heap");
            return RawRef::NULL;
        }
        self.int_from_i64(value as i64)
    }

    fn int_as_i64(&self, obj: RawRef) -> i64 {
        match self.slots.borrow().get(&obj.to_bits()).map(|s| &s.obj) {
            Some(Obj::Int(v)) => *v,
            _ => {
                self.raise(ErrorKind::Type, "an integer is required");
                -1
            }
        }
    }

    fn int_as_u64(&self, obj: RawRef) -> u64 {
        match self.slots.borrow().get(&obj.to_bits()).map(|s| &s.obj) {
            Some(Obj::Int(v)) if *v >= 0 => *v as u64,
            Some(Obj::Int(_)) => {
                self.raise(
                    ErrorKind::Overflow,
                    "can't convert negative int to unsigned",
                );
                u64::MAX
            }
            _ => {
                self.raise(ErrorKind::Type, "an integer is required");
                u64::MAX
            }
        }
    }

    // ========================================================================
    // Rich comparison
    // ========================================================================

    fn compare(&self, op: CmpOp, lhs: RawRef, rhs: RawRef) -> i32 {
        // A null operand reaching a protocol call is caller misuse, not
        // a value to answer about.
        if lhs.is_null() || rhs.is_null() {
            self.raise(ErrorKind::Runtime, "null operand in comparison");
            return -1;
        }
        match op {
            CmpOp::Eq => self.deep_eq(lhs, rhs) as i32,
            CmpOp::Ne => !self.deep_eq(lhs, rhs) as i32,
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                let ordering = match self.order(lhs, rhs) {
                    Some(ordering) => ordering,
                    None => {
                        self.raise(
                            ErrorKind::Type,
                            format!(
                                "ordering not supported between instances of '{}' and '{}'",
                                self.type_name(lhs),
                                self.type_name(rhs)
                            ),
                        );
                        return -1;
                    }
                };
                let verdict = match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    CmpOp::Ge => ordering != Ordering::Less,
                    _ => unreachable!(),
                };
                verdict as i32
            }
        }
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn get_attr(&self, obj: RawRef, name: &str) -> RawRef {
        let found = {
            let slots = self.slots.borrow();
            match slots.get(&obj.to_bits()).map(|s| &s.obj) {
                // Integers expose themselves as their own real part, the
                // way the host's numeric tower does.
                Some(Obj::Int(_)) if name == "real" => Some(obj),
                Some(Obj::Module { members, .. }) => members.get(name).copied(),
                Some(Obj::StructSeq { ty, items }) => {
                    let field = match slots.get(&ty.to_bits()).map(|s| &s.obj) {
                        Some(Obj::Type { fields, .. }) => {
                            fields.iter().position(|f| f == name)
                        }
                        _ => None,
                    };
                    field.and_then(|pos| items.get(pos).copied()).filter(|r| !r.is_null())
                }
                _ => None,
            }
        };
        match found {
            Some(raw) => {
                self.retain(raw);
                raw
            }
            None => {
                self.raise(
                    ErrorKind::Attribute,
                    format!(
                        "'{}' object has no attribute '{}'",
                        self.type_name(obj),
                        name
                    ),
                );
                RawRef::NULL
            }
        }
    }

    fn set_attr(&self, obj: RawRef, name: &str, value: RawRef) -> i32 {
        self.retain(value);
        let replaced = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&obj.to_bits()).map(|s| &mut s.obj) {
                Some(Obj::Module { members, .. }) => {
                    Ok(members.insert(name.to_string(), value))
                }
                _ => Err(()),
            }
        };
        match replaced {
            Ok(old) => {
                if let Some(old) = old {
                    self.release(old);
                }
                0
            }
            Err(()) => {
                self.release(value);
                self.raise(
                    ErrorKind::Attribute,
                    format!("'{}' object attributes are read-only", self.type_name(obj)),
                );
                -1
            }
        }
    }

    fn del_attr(&self, obj: RawRef, name: &str) -> i32 {
        let removed = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&obj.to_bits()).map(|s| &mut s.obj) {
                Some(Obj::Module { members, .. }) => members.remove(name).ok_or(()),
                _ => Err(()),
            }
        };
        match removed {
            Ok(old) => {
                self.release(old);
                0
            }
            Err(()) => {
                self.raise(
                    ErrorKind::Attribute,
                    format!(
                        "'{}' object has no attribute '{}'",
                        self.type_name(obj),
                        name
                    ),
                );
                -1
            }
        }
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    fn get_iter(&self, obj: RawRef) -> RawRef {
        enum Source {
            Snapshot(Vec<RawRef>),
            Itself,
            NotIterable,
        }
        let source = {
            let slots = self.slots.borrow();
            match slots.get(&obj.to_bits()).map(|s| &s.obj) {
                Some(Obj::List(items)) | Some(Obj::Tuple(items)) => {
                    Source::Snapshot(items.clone())
                }
                Some(Obj::Iter(_)) => Source::Itself,
                _ => Source::NotIterable,
            }
        };
        match source {
            Source::Snapshot(items) => {
                for item in &items {
                    self.retain(*item);
                }
                self.alloc(Obj::Iter(IterState {
                    items: items.into(),
                    fail_at_call: None,
                    calls: 0,
                }))
            }
            // An iterator's iterator is itself.
            Source::Itself => {
                self.retain(obj);
                obj
            }
            Source::NotIterable => {
                self.raise(
                    ErrorKind::Type,
                    format!("'{}' object is not iterable", self.type_name(obj)),
                );
                RawRef::NULL
            }
        }
    }

    fn iter_next(&self, iter: RawRef) -> RawRef {
        enum Pull {
            Item(RawRef),
            Fail,
            NotIter,
        }
        let pull = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&iter.to_bits()).map(|s| &mut s.obj) {
                Some(Obj::Iter(state)) => {
                    state.calls += 1;
                    if state.fail_at_call == Some(state.calls) {
                        Pull::Fail
                    } else {
                        // Ownership of the popped reference transfers
                        // to the caller.
                        Pull::Item(state.items.pop_front().unwrap_or(RawRef::NULL))
                    }
                }
                _ => Pull::NotIter,
            }
        };
        match pull {
            Pull::Item(raw) => raw,
            Pull::Fail => {
                self.raise(ErrorKind::Runtime, "iterator failure injected");
                RawRef::NULL
            }
            Pull::NotIter => {
                self.raise(
                    ErrorKind::Type,
                    format!("'{}' object is not an iterator", self.type_name(iter)),
                );
                RawRef::NULL
            }
        }
    }

    // ========================================================================
    // Value building and sequences
    // ========================================================================

    fn build_value(&self, template: &str, args: &[BuildArg]) -> RawRef {
        let mut chars = template.chars().peekable();
        let mut next_arg = 0usize;
        let mut built = match self.build_items(&mut chars, args, &mut next_arg, None) {
            Ok(built) => built,
            Err(()) => return RawRef::NULL,
        };
        match built.len() {
            0 => {
                self.raise(ErrorKind::Value, "empty build template");
                RawRef::NULL
            }
            1 => built.pop().unwrap_or(RawRef::NULL),
            _ => self.alloc(Obj::Tuple(built)),
        }
    }

    fn tuple_new(&self, len: usize) -> RawRef {
        self.alloc(Obj::Tuple(vec![RawRef::NULL; len]))
    }

    fn tuple_set(&self, tuple: RawRef, pos: usize, value: RawRef) {
        let old = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&tuple.to_bits()).map(|s| &mut s.obj) {
                Some(Obj::Tuple(items)) if pos < items.len() => {
                    Ok(std::mem::replace(&mut items[pos], value))
                }
                _ => Err(()),
            }
        };
        match old {
            Ok(old) => self.release(old),
            Err(()) => {
                // Value is stolen even on misuse, so nothing leaks.
                self.release(value);
                self.raise(ErrorKind::Index, "tuple assignment position out of range");
            }
        }
    }

    fn sequence_item(&self, obj: RawRef, pos: usize) -> RawRef {
        let found = {
            let slots = self.slots.borrow();
            match slots.get(&obj.to_bits()).map(|s| &s.obj) {
                Some(Obj::List(items))
                | Some(Obj::Tuple(items))
                | Some(Obj::StructSeq { items, .. }) => {
                    items.get(pos).copied().filter(|r| !r.is_null()).ok_or(())
                }
                _ => Err(()),
            }
        };
        match found {
            Ok(raw) => {
                self.retain(raw);
                raw
            }
            Err(()) => {
                self.raise(ErrorKind::Index, "sequence index out of range");
                RawRef::NULL
            }
        }
    }

    fn struct_seq_new(&self, ty: RawRef) -> RawRef {
        let len = {
            let slots = self.slots.borrow();
            match slots.get(&ty.to_bits()).map(|s| &s.obj) {
                Some(Obj::Type { fields, .. }) if !fields.is_empty() => Some(fields.len()),
                _ => None,
            }
        };
        match len {
            Some(len) => {
                self.retain(ty);
                self.alloc(Obj::StructSeq {
                    ty,
                    items: vec![RawRef::NULL; len],
                })
            }
            None => {
                self.raise(ErrorKind::Type, "not a struct sequence type");
                RawRef::NULL
            }
        }
    }

    fn struct_seq_set(&self, seq: RawRef, pos: usize, value: RawRef) {
        let old = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&seq.to_bits()).map(|s| &mut s.obj) {
                Some(Obj::StructSeq { items, .. }) if pos < items.len() => {
                    Ok(std::mem::replace(&mut items[pos], value))
                }
                _ => Err(()),
            }
        };
        match old {
            Ok(old) => self.release(old),
            Err(()) => {
                self.release(value);
                self.raise(
                    ErrorKind::Index,
                    "struct sequence assignment position out of range",
                );
            }
        }
    }

    // ========================================================================
    // Types and modules
    // ========================================================================

    fn finalize_type(&self, spec: &TypeSpec) -> RawRef {
        debug!(name = %spec.name, "type finalized");
        self.alloc(Obj::Type {
            name: spec.name.clone(),
            fields: Vec::new(),
        })
    }

    fn init_struct_seq_type(&self, desc: &StructSeqDesc) -> RawRef {
        if desc.fields.is_empty() {
            self.raise(ErrorKind::Value, "struct sequence type needs fields");
            return RawRef::NULL;
        }
        debug!(name = %desc.name, fields = desc.fields.len(), "struct sequence type initialized");
        self.alloc(Obj::Type {
            name: desc.name.clone(),
            fields: desc.fields.iter().map(|f| f.name.clone()).collect(),
        })
    }

    fn module_add(&self, module: RawRef, name: &str, value: RawRef) -> i32 {
        let replaced = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&module.to_bits()).map(|s| &mut s.obj) {
                Some(Obj::Module { members, .. }) => {
                    Ok(members.insert(name.to_string(), value))
                }
                _ => Err(()),
            }
        };
        match replaced {
            Ok(old) => {
                if let Some(old) = old {
                    self.release(old);
                }
                0
            }
            Err(()) => {
                // The member reference is stolen on failure too.
                self.release(value);
                self.raise(
                    ErrorKind::Type,
                    format!("'{}' object is not a module", self.type_name(module)),
                );
                -1
            }
        }
    }
}
