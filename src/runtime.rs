/// Runtime Handle and Arena Registry
///
/// `Runtime` is what a generated program (or an embedding host) stands
/// up first: it owns the root arena, binds the scheduler and the
/// thread-local current-arena slot, and keeps the registry that backs
/// opaque arena-handle values.
///
/// Arena handles exist for the syscall bridge: `arena_create` hands
/// generated code a fresh arena as a heap value, `arena_release` retires
/// it (firing registered teardowns). The handle carries a registry slot,
/// never a raw address, so a released handle degrades to an error value
/// instead of a dangling pointer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::core::arena::Arena;
use crate::core::bignum;
use crate::core::value::{alloc_header, HeapTag, Header, Value};
use crate::sched;
use crate::table;

// ---------------------------------------------------------------------------
// Arena handles
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct ArenaHandleObj {
    pub header: Header,
    pub slot: u32,
    _pad: u32,
}

pub fn make_arena_handle(arena: &Arena, slot: u32) -> Value {
    let obj = alloc_header(arena, HeapTag::ArenaHandle, std::mem::size_of::<ArenaHandleObj>())
        as *mut ArenaHandleObj;
    unsafe {
        (*obj).slot = slot;
        (*obj)._pad = 0;
        Value::from_obj(obj as *mut Header)
    }
}

pub fn is_arena_handle(v: Value) -> bool {
    v.is_heap(HeapTag::ArenaHandle)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Registry {
    arenas: Vec<Option<Rc<Arena>>>,
    page_size: usize,
}

thread_local! {
    static REGISTRY: RefCell<Registry> =
        RefCell::new(Registry { arenas: Vec::new(), page_size: 4096 });
}

/// Create a registry-owned arena; returns its slot.
pub(crate) fn registry_create() -> u32 {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        let arena = Rc::new(Arena::new(r.page_size));
        r.arenas.push(Some(arena));
        (r.arenas.len() - 1) as u32
    })
}

/// Drop a registry slot. The arena's teardown hooks fire when the last
/// reference goes away (scoped middleware may still be holding one).
pub(crate) fn registry_release(slot: u32) -> bool {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        match r.arenas.get_mut(slot as usize) {
            Some(entry) if entry.is_some() => {
                *entry = None;
                true
            }
            _ => false,
        }
    })
}

/// Resolve a handle value to its arena; `None` for non-handles and
/// released slots.
pub fn handle_arena(v: Value) -> Option<Rc<Arena>> {
    if !is_arena_handle(v) {
        return None;
    }
    let slot = unsafe { (*(v.obj() as *const ArenaHandleObj)).slot };
    REGISTRY.with(|r| r.borrow().arenas.get(slot as usize).cloned().flatten())
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

pub struct Runtime {
    root: Rc<Arena>,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Runtime {
        let root = Rc::new(Arena::new(config.page_size));
        bignum::set_current(Some(Rc::clone(&root)));
        sched::init(&root);
        REGISTRY.with(|r| r.borrow_mut().page_size = config.page_size);
        tracing::debug!(page_size = config.page_size, "runtime up");
        Runtime { root, config }
    }

    pub fn with_defaults() -> Runtime {
        Runtime::new(RuntimeConfig::default())
    }

    /// The root arena all top-level values allocate from.
    pub fn arena(&self) -> &Rc<Arena> {
        &self.root
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Fresh table sized by the configured hint.
    pub fn new_table(&self) -> Value {
        table::with_capacity(&self.root, self.config.table_capacity)
    }

    /// Drive the scheduler until the ready queue drains.
    pub fn run(&self) {
        sched::run();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Unbind the slot so the root arena's refcount can reach zero.
        if let Some(current) = bignum::current() {
            if Rc::ptr_eq(&current, &self.root) {
                bignum::set_current(None);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
