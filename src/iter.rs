/// Lazy Iterators
///
/// An iterator is a heap object with a kind discriminator and an opaque
/// state, pulled through one contract: `next(arena, iter)` yields
/// `Some(value)`, propagates `Some(ERROR)`, or signals end of stream with
/// `None`. Four kinds:
///
///   List     - walks a table's positional elements
///   Resource - delegates to an instance's `next` callable
///   Map      - pulls upstream, applies a transform, stays lazy
///   Scoped   - middleware: runs a definition's `setup` on first pull,
///              threads an arena context around upstream pulls, and fires
///              `teardown` once when the stream ends or errors
///
/// A native `next` callable signals end of stream by returning the
/// internal absent marker, which never crosses this boundary: it is
/// translated to `None` here.

use crate::core::arena::Arena;
use crate::core::bignum::ArenaSwitch;
use crate::core::value::{
    alloc_header, call, HeapTag, Header, Value, ERROR, UNUSED,
};
use crate::resource;
use crate::runtime;
use crate::table;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IterKind {
    List = 0,
    Resource = 1,
    Map = 2,
    Scoped = 3,
}

#[repr(C)]
pub struct IterObj {
    pub header: Header,
    pub kind: u8,
    /// Scoped: setup has run.
    started: u8,
    /// Scoped: stream ended and teardown fired.
    finished: u8,
    _pad: u8,
    _pad2: u32,
    /// List source / resource instance / upstream iterator.
    pub a: Value,
    /// Map transform / scoped resource definition.
    pub b: Value,
    /// Scoped middleware context returned by setup.
    pub ctx: Value,
    /// List cursor.
    pub cursor: u64,
}

pub fn is_iter(v: Value) -> bool {
    v.is_heap(HeapTag::Iter)
}

fn make(arena: &Arena, kind: IterKind, a: Value, b: Value) -> Value {
    let obj = alloc_header(arena, HeapTag::Iter, std::mem::size_of::<IterObj>()) as *mut IterObj;
    unsafe {
        (*obj).kind = kind as u8;
        (*obj).started = 0;
        (*obj).finished = 0;
        (*obj)._pad = 0;
        (*obj)._pad2 = 0;
        (*obj).a = a;
        (*obj).b = b;
        (*obj).ctx = UNUSED;
        (*obj).cursor = 0;
        Value::from_obj(obj as *mut Header)
    }
}

/// Iterator over a table's positional elements.
pub fn list_iter(arena: &Arena, list: Value) -> Value {
    debug_assert!(list.is_heap(HeapTag::Table));
    make(arena, IterKind::List, list, UNUSED)
}

/// Iterator that delegates to an instance's `next` callable.
pub fn resource_iter(arena: &Arena, inst: Value) -> Value {
    debug_assert!(resource::is_instance(inst));
    make(arena, IterKind::Resource, inst, UNUSED)
}

/// Lazy transformation of an upstream iterator.
pub fn map_iter(arena: &Arena, upstream: Value, transform: Value) -> Value {
    debug_assert!(is_iter(upstream));
    make(arena, IterKind::Map, upstream, transform)
}

/// Scoped middleware around an upstream iterator.
pub fn scoped_iter(arena: &Arena, upstream: Value, def: Value) -> Value {
    debug_assert!(is_iter(upstream));
    debug_assert!(resource::is_def(def));
    make(arena, IterKind::Scoped, upstream, def)
}

// ---------------------------------------------------------------------------
// Pulling
// ---------------------------------------------------------------------------

/// Pull the next value. `None` is end of stream; an error value is
/// propagated, not swallowed.
pub fn next(arena: &Arena, iter: Value) -> Option<Value> {
    debug_assert!(is_iter(iter));
    let obj = iter.obj() as *mut IterObj;
    let kind = unsafe { (*obj).kind };

    if kind == IterKind::List as u8 {
        return next_list(obj);
    }
    if kind == IterKind::Resource as u8 {
        return next_resource(arena, unsafe { (*obj).a });
    }
    if kind == IterKind::Map as u8 {
        return next_map(arena, obj);
    }
    next_scoped(arena, obj)
}

fn next_list(obj: *mut IterObj) -> Option<Value> {
    unsafe {
        let list = (*obj).a;
        let cursor = (*obj).cursor;
        if cursor >= table::next_index(list) as u64 {
            return None;
        }
        (*obj).cursor = cursor + 1;
        Some(table::get(list, Value::small(cursor as i64)))
    }
}

fn next_resource(arena: &Arena, inst: Value) -> Option<Value> {
    if !resource::is_instance(inst) {
        return None;
    }
    let next_fn = resource::def_next(resource::inst_def(inst));
    if next_fn.is_unused() {
        return None;
    }
    let v = call(arena, next_fn, inst, resource::inst_state(inst), ERROR);
    if v.is_unused() {
        return None;
    }
    Some(v)
}

fn next_map(arena: &Arena, obj: *mut IterObj) -> Option<Value> {
    let (upstream, transform) = unsafe { ((*obj).a, (*obj).b) };
    let v = next(arena, upstream)?;
    if v.is_error() {
        return Some(ERROR);
    }
    match transform.heap_tag() {
        Some(HeapTag::Func) => Some(call(arena, transform, transform, ERROR, v)),
        Some(HeapTag::ResourceInst) => {
            let step = resource::def_step(resource::inst_def(transform));
            if step.is_unused() {
                return Some(v);
            }
            Some(call(arena, step, transform, resource::inst_state(transform), v))
        }
        _ => Some(v),
    }
}

fn next_scoped(arena: &Arena, obj: *mut IterObj) -> Option<Value> {
    unsafe {
        if (*obj).finished != 0 {
            return None;
        }
        if (*obj).started == 0 {
            (*obj).started = 1;
            let setup = resource::def_setup((*obj).b);
            if !setup.is_unused() {
                (*obj).ctx = call(arena, setup, (*obj).b, ERROR, ERROR);
            }
        }

        // If the context names an arena, upstream values are allocated
        // there for the duration of the pull.
        let pulled = match runtime::handle_arena((*obj).ctx) {
            Some(scope_arena) => {
                let _guard = ArenaSwitch::new(scope_arena.clone());
                next(&scope_arena, (*obj).a)
            }
            None => next(arena, (*obj).a),
        };

        match pulled {
            None => {
                finish_scoped(arena, obj);
                None
            }
            Some(v) if v.is_error() => {
                finish_scoped(arena, obj);
                Some(ERROR)
            }
            some => some,
        }
    }
}

unsafe fn finish_scoped(arena: &Arena, obj: *mut IterObj) {
    if (*obj).finished != 0 {
        return;
    }
    (*obj).finished = 1;
    let teardown = resource::def_teardown((*obj).b);
    if !teardown.is_unused() {
        call(arena, teardown, (*obj).b, (*obj).ctx, ERROR);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
