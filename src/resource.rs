/// Resource Definitions and Instances
///
/// A resource definition is a record of four optional lifecycle callables:
/// `setup`, `step`, `teardown`, `next` (absent slots hold the internal
/// `UNUSED` marker). The prefix `@` operator instantiates a definition:
/// it runs `setup` with empty arguments, stores the returned state on the
/// new instance, and registers the instance's teardown hook with the
/// arena that owns it. Teardown runs at most once: when a scoped
/// pipeline finishes with the instance, or when the owning arena is
/// destroyed, whichever comes first.

use crate::core::arena::Arena;
use crate::core::value::{
    alloc_header, call, HeapTag, Header, Value, ERROR, FLAG_TORN_DOWN, UNUSED,
};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct ResourceDefObj {
    pub header: Header,
    pub setup: Value,
    pub step: Value,
    pub teardown: Value,
    pub next: Value,
}

#[repr(C)]
pub struct ResourceInstObj {
    pub header: Header,
    pub def: Value,
    pub state: Value,
}

pub fn is_def(v: Value) -> bool {
    v.is_heap(HeapTag::ResourceDef)
}

pub fn is_instance(v: Value) -> bool {
    v.is_heap(HeapTag::ResourceInst)
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build a definition. Pass `UNUSED` for absent callables.
pub fn make_def(arena: &Arena, setup: Value, step: Value, teardown: Value, next: Value) -> Value {
    let obj = alloc_header(arena, HeapTag::ResourceDef, std::mem::size_of::<ResourceDefObj>())
        as *mut ResourceDefObj;
    unsafe {
        (*obj).setup = setup;
        (*obj).step = step;
        (*obj).teardown = teardown;
        (*obj).next = next;
        Value::from_obj(obj as *mut Header)
    }
}

/// Instantiate a definition: run `setup` (receiver = the definition,
/// empty arguments), keep its return as the instance state, and register
/// the teardown hook on the owning arena. Non-definitions yield the
/// error sentinel; the `@`-on-anything-else identity lives in the
/// operator layer.
pub fn instantiate(arena: &Arena, def: Value) -> Value {
    if !is_def(def) {
        return ERROR;
    }

    let obj = alloc_header(arena, HeapTag::ResourceInst, std::mem::size_of::<ResourceInstObj>())
        as *mut ResourceInstObj;
    let inst = unsafe {
        (*obj).def = def;
        (*obj).state = UNUSED;
        Value::from_obj(obj as *mut Header)
    };

    let setup = def_setup(def);
    if !setup.is_unused() {
        let state = call(arena, setup, def, ERROR, ERROR);
        unsafe {
            (*obj).state = state;
        }
    }

    if !def_teardown(def).is_unused() {
        let bits = inst.bits();
        arena.register_teardown(move |a| run_teardown(a, Value::from_bits(bits)));
    }

    inst
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

macro_rules! def_slot {
    ($name:ident, $field:ident) => {
        pub fn $name(def: Value) -> Value {
            if !is_def(def) {
                return UNUSED;
            }
            unsafe { (*(def.obj() as *const ResourceDefObj)).$field }
        }
    };
}

def_slot!(def_setup, setup);
def_slot!(def_step, step);
def_slot!(def_teardown, teardown);
def_slot!(def_next, next);

pub fn inst_def(inst: Value) -> Value {
    debug_assert!(is_instance(inst));
    unsafe { (*(inst.obj() as *const ResourceInstObj)).def }
}

pub fn inst_state(inst: Value) -> Value {
    debug_assert!(is_instance(inst));
    unsafe { (*(inst.obj() as *const ResourceInstObj)).state }
}

pub fn set_inst_state(inst: Value, state: Value) {
    debug_assert!(is_instance(inst));
    unsafe {
        (*(inst.obj() as *mut ResourceInstObj)).state = state;
    }
}

/// An instance can feed a pipeline when its definition has a `next`.
pub fn instance_has_next(v: Value) -> bool {
    is_instance(v) && !def_next(inst_def(v)).is_unused()
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

/// Run an instance's teardown exactly once: receiver is the instance,
/// `left` carries the state/context.
pub fn run_teardown(arena: &Arena, inst: Value) {
    if !is_instance(inst) {
        return;
    }
    unsafe {
        let header = inst.obj();
        if (*header).flags & FLAG_TORN_DOWN != 0 {
            return;
        }
        (*header).flags |= FLAG_TORN_DOWN;
    }
    let teardown = def_teardown(inst_def(inst));
    if !teardown.is_unused() {
        call(arena, teardown, inst, inst_state(inst), ERROR);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::make_func;
    use crate::table;

    fn tally(arena: &Arena) -> Value {
        table::new(arena)
    }

    fn bump(_a: &Arena, _recv: Value, _l: Value, _r: Value) -> Value {
        Value::small(7)
    }

    #[test]
    fn def_slots_hold_callables() {
        let arena = Arena::new(4096);
        let f = make_func(&arena, bump);
        let def = make_def(&arena, f, UNUSED, UNUSED, f);
        assert!(is_def(def));
        assert_eq!(def_setup(def), f);
        assert!(def_step(def).is_unused());
        assert!(def_teardown(def).is_unused());
        assert_eq!(def_next(def), f);
    }

    #[test]
    fn instantiate_runs_setup_and_stores_state() {
        let arena = Arena::new(4096);
        let def = make_def(&arena, make_func(&arena, bump), UNUSED, UNUSED, UNUSED);
        let inst = instantiate(&arena, def);
        assert!(is_instance(inst));
        assert_eq!(inst_def(inst), def);
        assert_eq!(inst_state(inst), Value::small(7));
    }

    #[test]
    fn instantiate_without_setup_leaves_state_absent() {
        let arena = Arena::new(4096);
        let def = make_def(&arena, UNUSED, UNUSED, UNUSED, UNUSED);
        let inst = instantiate(&arena, def);
        assert!(inst_state(inst).is_unused());
    }

    #[test]
    fn instantiate_non_def_is_error() {
        let arena = Arena::new(4096);
        assert_eq!(instantiate(&arena, Value::small(3)), ERROR);
    }

    #[test]
    fn teardown_fires_once_on_arena_drop() {
        fn record(a: &Arena, recv: Value, state: Value, _r: Value) -> Value {
            // State carries the recording table; receiver is the instance.
            assert!(is_instance(recv));
            table::push(a, state, Value::small(1));
            state
        }

        let arena = Arena::new(4096);
        let log = tally(&arena);
        let def = make_def(&arena, UNUSED, UNUSED, make_func(&arena, record), UNUSED);
        let inst = instantiate(&arena, def);
        set_inst_state(inst, log);

        run_teardown(&arena, inst);
        run_teardown(&arena, inst); // second call is a no-op
        assert_eq!(table::count(log), 1);

        // Arena drop must not fire it again (flag already set); dropping
        // here exercises the hook path.
        drop(arena);
    }

    #[test]
    fn instance_has_next_requires_next_slot() {
        let arena = Arena::new(4096);
        let with_next = make_def(&arena, UNUSED, UNUSED, UNUSED, make_func(&arena, bump));
        let without = make_def(&arena, UNUSED, UNUSED, UNUSED, UNUSED);
        assert!(instance_has_next(instantiate(&arena, with_next)));
        assert!(!instance_has_next(instantiate(&arena, without)));
        assert!(!instance_has_next(Value::small(1)));
    }
}
