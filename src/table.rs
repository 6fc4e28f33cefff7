/// Table: Hash + Array Hybrid
///
/// Tables are OrgLang's universal container: arrays, maps, and scopes.
/// Positional elements get auto-assigned integer keys (`push` hands out a
/// monotonic `next_index`); named elements use string keys. Lookup is an
/// open-addressed hash table with linear probing, capacity always a power
/// of two, resized (×2, rehash) when an insert would push the load factor
/// past 75%.
///
/// Keys are restricted to immediate integers and strings. An empty slot's
/// key is the internal `UNUSED` marker. The slot array lives in the
/// owning arena; on growth it is extended in place while it is still the
/// newest allocation (the realloc fast path), otherwise a fresh slab is
/// allocated and the old one is abandoned for the arena to reclaim in
/// bulk.

use crate::core::arena::Arena;
use crate::core::value::{
    alloc_header, bool_value, str_slice, HeapTag, Header, Value, ERROR, FLAG_PAIR, UNUSED,
};

const INITIAL_CAP: u32 = 8;
const LOAD_PERCENT: u64 = 75;

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct Slot {
    pub key: Value,
    pub value: Value,
    pub hash: u32,
    _pad: u32,
}

#[repr(C)]
pub struct TableObj {
    pub header: Header,
    /// Live entries.
    pub count: u32,
    /// Total slots; always a power of two.
    pub capacity: u32,
    /// Next auto-index for positional elements. Monotonic; removal never
    /// decrements it.
    pub next_index: u32,
    _pad: u32,
    pub slots: *mut Slot,
}

#[inline(always)]
unsafe fn table_obj(v: Value) -> *mut TableObj {
    v.obj() as *mut TableObj
}

#[inline(always)]
unsafe fn slots_of<'a>(t: *mut TableObj) -> &'a mut [Slot] {
    std::slice::from_raw_parts_mut((*t).slots, (*t).capacity as usize)
}

fn is_table(v: Value) -> bool {
    v.is_heap(HeapTag::Table)
}

fn is_valid_key(key: Value) -> bool {
    key.is_small() || key.is_heap(HeapTag::Str)
}

// ---------------------------------------------------------------------------
// Hashing and key equality
// ---------------------------------------------------------------------------

fn fnv1a(data: &[u8]) -> u32 {
    let mut h: u32 = 2166136261;
    for &b in data {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    h
}

/// Hash a key. Integer keys get a four-step avalanche mix of the tagged
/// bits; string keys hash their UTF-8 bytes with FNV-1a.
pub fn hash_value(key: Value) -> u32 {
    if key.is_small() {
        let mut k = key.bits();
        k = (k ^ (k >> 16)).wrapping_mul(0x45d9f3b);
        k = (k ^ (k >> 16)).wrapping_mul(0x45d9f3b);
        k ^= k >> 16;
        return k as u32;
    }
    if key.is_heap(HeapTag::Str) {
        return fnv1a(unsafe { str_slice(key) });
    }
    0
}

/// Identical tagged bits are always equal; two strings are equal when
/// their byte contents match; anything else is unequal.
pub fn key_equal(a: Value, b: Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_small() && b.is_small() {
        return false;
    }
    if a.is_heap(HeapTag::Str) && b.is_heap(HeapTag::Str) {
        return unsafe { str_slice(a) == str_slice(b) };
    }
    false
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn alloc_slots(arena: &Arena, capacity: u32) -> *mut Slot {
    let size = std::mem::size_of::<Slot>() * capacity as usize;
    let slots = arena.alloc(size, crate::core::arena::OBJ_ALIGN) as *mut Slot;
    unsafe {
        for i in 0..capacity as usize {
            let s = slots.add(i);
            (*s).key = UNUSED;
            (*s).value = UNUSED;
            (*s).hash = 0;
            (*s)._pad = 0;
        }
    }
    slots
}

/// Find the slot for `key`: either the slot holding it or the first empty
/// slot on its probe chain. The load factor keeps at least one slot free,
/// so the probe always terminates.
fn find_slot(slots: &mut [Slot], key: Value, hash: u32) -> usize {
    let mask = slots.len() - 1;
    let mut idx = hash as usize & mask;
    loop {
        let k = slots[idx].key;
        if k.is_unused() {
            return idx;
        }
        if slots[idx].hash == hash && key_equal(k, key) {
            return idx;
        }
        idx = (idx + 1) & mask;
    }
}

/// Double the slot array and rehash. Rehashing reshuffles every slot, so
/// live entries move to scratch first; the slab itself is extended in
/// place when it is still the newest arena allocation, and replaced
/// (old slab abandoned to the arena) when it is not.
fn grow(arena: &Arena, t: *mut TableObj) {
    unsafe {
        let old_cap = (*t).capacity;
        let new_cap = old_cap * 2;
        let slot_size = std::mem::size_of::<Slot>();

        let mut live = Vec::with_capacity((*t).count as usize);
        for i in 0..old_cap as usize {
            let e = &*(*t).slots.add(i);
            if !e.key.is_unused() {
                live.push((e.key, e.value, e.hash));
            }
        }

        let extended = arena.grow_in_place(
            (*t).slots as *mut u8,
            slot_size * old_cap as usize,
            slot_size * new_cap as usize,
        );
        if extended {
            for i in 0..new_cap as usize {
                let s = (*t).slots.add(i);
                (*s).key = UNUSED;
                (*s).value = UNUSED;
                (*s).hash = 0;
                (*s)._pad = 0;
            }
        } else {
            (*t).slots = alloc_slots(arena, new_cap);
        }
        (*t).capacity = new_cap;

        let slots = slots_of(t);
        for (key, value, hash) in live {
            let slot = find_slot(slots, key, hash);
            slots[slot] = Slot { key, value, hash, _pad: 0 };
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub fn new(arena: &Arena) -> Value {
    with_capacity(arena, INITIAL_CAP)
}

/// New table sized for `expected` entries (capacity rounds up to a power
/// of two, minimum 8).
pub fn with_capacity(arena: &Arena, expected: u32) -> Value {
    let mut cap = INITIAL_CAP;
    while cap < expected {
        cap *= 2;
    }

    let obj = alloc_header(arena, HeapTag::Table, std::mem::size_of::<TableObj>()) as *mut TableObj;
    unsafe {
        (*obj).count = 0;
        (*obj).capacity = cap;
        (*obj).next_index = 0;
        (*obj)._pad = 0;
        (*obj).slots = alloc_slots(arena, cap);
        Value::from_obj(obj as *mut Header)
    }
}

/// Build a list: a table whose elements are pushed positionally.
pub fn make_list(arena: &Arena, items: &[Value]) -> Value {
    let t = with_capacity(arena, items.len() as u32);
    for &item in items {
        push(arena, t, item);
    }
    t
}

/// Build a pair: a two-element list carrying the pair flag.
pub fn make_pair(arena: &Arena, key: Value, value: Value) -> Value {
    let t = make_list(arena, &[key, value]);
    unsafe {
        (*t.obj()).flags |= FLAG_PAIR;
    }
    t
}

pub fn is_pair(v: Value) -> bool {
    is_table(v) && unsafe { (*v.obj()).flags & FLAG_PAIR != 0 }
}

// ---------------------------------------------------------------------------
// Insertion
// ---------------------------------------------------------------------------

/// Insert or overwrite. Returns the table, or the error sentinel for a
/// non-table receiver or an invalid key type. Grows before the insert
/// when the load factor would exceed 75%.
pub fn set(arena: &Arena, table: Value, key: Value, value: Value) -> Value {
    if !is_table(table) {
        return ERROR;
    }
    if !is_valid_key(key) {
        return ERROR;
    }

    unsafe {
        let t = table_obj(table);
        if ((*t).count as u64 + 1) * 100 > (*t).capacity as u64 * LOAD_PERCENT {
            grow(arena, t);
        }

        let hash = hash_value(key);
        let slots = slots_of(t);
        let slot = find_slot(slots, key, hash);

        if slots[slot].key.is_unused() {
            (*t).count += 1;
        }
        slots[slot] = Slot { key, value, hash, _pad: 0 };
    }
    table
}

/// Append a positional value under the next auto-index.
pub fn push(arena: &Arena, table: Value, value: Value) -> Value {
    if !is_table(table) {
        return ERROR;
    }
    let key = unsafe {
        let t = table_obj(table);
        let key = Value::small((*t).next_index as i64);
        (*t).next_index += 1;
        key
    };
    set(arena, table, key, value)
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Value for `key`, or the error sentinel on a miss.
pub fn get(table: Value, key: Value) -> Value {
    if !is_table(table) || !is_valid_key(key) {
        return ERROR;
    }
    unsafe {
        let t = table_obj(table);
        let hash = hash_value(key);
        let slots = slots_of(t);
        let mask = slots.len() - 1;
        let mut idx = hash as usize & mask;
        loop {
            let e = &slots[idx];
            if e.key.is_unused() {
                return ERROR;
            }
            if e.hash == hash && key_equal(e.key, key) {
                return e.value;
            }
            idx = (idx + 1) & mask;
        }
    }
}

/// Name lookup without constructing a key value: hashes the borrowed
/// bytes and compares against string slots inline. Used for scope reads.
pub fn get_cstr(table: Value, name: &str) -> Value {
    if !is_table(table) {
        return ERROR;
    }
    unsafe {
        let t = table_obj(table);
        let hash = fnv1a(name.as_bytes());
        let slots = slots_of(t);
        let mask = slots.len() - 1;
        let mut idx = hash as usize & mask;
        loop {
            let e = &slots[idx];
            if e.key.is_unused() {
                return ERROR;
            }
            if e.hash == hash && e.key.is_heap(HeapTag::Str) && str_slice(e.key) == name.as_bytes()
            {
                return e.value;
            }
            idx = (idx + 1) & mask;
        }
    }
}

pub fn has(table: Value, key: Value) -> Value {
    bool_value(!get(table, key).is_error())
}

pub fn count(table: Value) -> u32 {
    if !is_table(table) {
        return 0;
    }
    unsafe { (*table_obj(table)).count }
}

/// Number of positional elements handed out so far.
pub fn next_index(table: Value) -> u32 {
    if !is_table(table) {
        return 0;
    }
    unsafe { (*table_obj(table)).next_index }
}

pub fn capacity(table: Value) -> u32 {
    if !is_table(table) {
        return 0;
    }
    unsafe { (*table_obj(table)).capacity }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
