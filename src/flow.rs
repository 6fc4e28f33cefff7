/// Flow Operator
///
/// `left -> right` composes values, iterators, and resources:
///
///   1. `right` is a resource definition → middleware: the promoted left
///      is wrapped in a scoped iterator and returned. Still lazy.
///   2. left is iterable, `right` is a function → lazy map iterator.
///   3. left is iterable, `right` is a resource instance → a pump task is
///      scheduled to drain left into the sink; returns the absent marker
///      (the drain form is a statement, it produces no value).
///   4. scalar left, function or instance right → one sink task carrying
///      `left`; returns `left`.
///
/// So `->` is lazy for transformation and strict-but-asynchronous for
/// drains: the pipeline runs when the scheduler is pumped.
///
/// "Iterable" means an iterator, a list or pair table, or an instance
/// whose definition carries a `next` callable.

use crate::core::arena::Arena;
use crate::core::value::{type_name, HeapTag, Value, ERROR, UNUSED};
use crate::iter;
use crate::resource;
use crate::sched;

/// Promote a value to an iterator if it is iterable.
pub fn promote_to_iter(arena: &Arena, v: Value) -> Option<Value> {
    match v.heap_tag() {
        Some(HeapTag::Iter) => Some(v),
        Some(HeapTag::Table) => Some(iter::list_iter(arena, v)),
        Some(HeapTag::ResourceInst) if resource::instance_has_next(v) => {
            Some(iter::resource_iter(arena, v))
        }
        _ => None,
    }
}

fn is_sink(v: Value) -> bool {
    matches!(v.heap_tag(), Some(HeapTag::Func) | Some(HeapTag::ResourceInst))
}

pub fn flow(arena: &Arena, left: Value, right: Value) -> Value {
    if left.is_error() || right.is_error() {
        return ERROR;
    }

    // Middleware: a definition on the right scopes the stream.
    if resource::is_def(right) {
        return match promote_to_iter(arena, left) {
            Some(upstream) => iter::scoped_iter(arena, upstream, right),
            None => {
                tracing::debug!(left = type_name(left), "flow: middleware needs an iterable left");
                ERROR
            }
        };
    }

    if let Some(upstream) = promote_to_iter(arena, left) {
        // Lazy transformation.
        if right.is_heap(HeapTag::Func) {
            return iter::map_iter(arena, upstream, right);
        }
        // Drain into a sink: scheduled, not executed here.
        if right.is_heap(HeapTag::ResourceInst) {
            if sched::spawn_pump(upstream, right) {
                return UNUSED;
            }
            return ERROR;
        }
        tracing::debug!(right = type_name(right), "flow: unsupported right operand");
        return left;
    }

    // Scalar push: one sink task for one value.
    if is_sink(right) {
        if sched::spawn_sink(right, left) {
            return left;
        }
        return ERROR;
    }

    tracing::debug!(
        left = type_name(left),
        right = type_name(right),
        "flow: no applicable form"
    );
    left
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
