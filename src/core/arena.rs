/// Chained-Page Arena Allocator
///
/// Memory is allocated by bumping a pointer forward inside the current
/// page. Individual frees are not supported; memory is reclaimed in bulk
/// via checkpoints (`save`/`restore`) or by dropping the whole arena.
///
/// Each page is a single heap allocation: a small header followed by the
/// data region. The active page sits at the head of a singly-linked list.
/// Objects larger than half the default page size get a dedicated page so
/// they never displace a stream of small allocations.
///
/// Arenas also own the teardown hooks registered by resource instances.
/// Hooks run (most recent first) when the arena is dropped.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::cell::{Cell, RefCell};

/// Smallest page size an arena will accept.
const MIN_PAGE_SIZE: usize = 64;

/// Object alignment guaranteed by the arena. Tagged pointers need the low
/// three bits free.
pub const OBJ_ALIGN: usize = 8;

#[inline(always)]
fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Page header. The data region begins immediately after this struct
/// (the header is three words, so the region starts 8-byte aligned).
#[repr(C)]
struct Page {
    prev: *mut Page,
    /// Usable bytes in the data region.
    capacity: usize,
    /// Bytes handed out so far (offset of the bump cursor).
    used: usize,
}

impl Page {
    fn layout(capacity: usize) -> Layout {
        Layout::from_size_align(std::mem::size_of::<Page>() + capacity, std::mem::align_of::<Page>())
            .expect("page layout overflow")
    }

    /// Allocate a page with `capacity` usable bytes.
    fn new(capacity: usize) -> *mut Page {
        let layout = Page::layout(capacity);
        let raw = unsafe { alloc(layout) };
        if raw.is_null() {
            handle_alloc_error(layout);
        }
        let page = raw as *mut Page;
        unsafe {
            (*page).prev = std::ptr::null_mut();
            (*page).capacity = capacity;
            (*page).used = 0;
        }
        page
    }

    unsafe fn free(page: *mut Page) {
        let layout = Page::layout((*page).capacity);
        dealloc(page as *mut u8, layout);
    }

    /// First byte of the data region.
    #[inline(always)]
    unsafe fn data(page: *mut Page) -> *mut u8 {
        (page as *mut u8).add(std::mem::size_of::<Page>())
    }
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// A saved arena position. Restoring reclaims everything allocated after
/// the save point.
#[derive(Clone, Copy)]
pub struct Checkpoint {
    page: *mut Page,
    used: usize,
    hooks: usize,
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Teardown hook registered by a resource instance. Receives the owning
/// arena so teardown callables can allocate their own diagnostics.
type Hook = Box<dyn FnOnce(&Arena)>;

pub struct Arena {
    current: Cell<*mut Page>,
    default_page_size: usize,
    hooks: RefCell<Vec<Hook>>,
}

impl Arena {
    /// Create an arena whose pages hold `page_size` usable bytes.
    /// Sizes below 64 are clamped up.
    pub fn new(page_size: usize) -> Arena {
        let default_page_size = page_size.max(MIN_PAGE_SIZE);
        Arena {
            current: Cell::new(Page::new(default_page_size)),
            default_page_size,
            hooks: RefCell::new(Vec::new()),
        }
    }

    /// Bump-allocate `size` bytes at `align` (a power of two).
    ///
    /// The aligned offset is computed from the absolute address of the
    /// data region, not the offset alone, so the returned pointer is
    /// aligned even when the region base is not aligned to `align`.
    /// Aborts on system allocation failure.
    pub fn alloc(&self, size: usize, align: usize) -> *mut u8 {
        debug_assert!(align.is_power_of_two());
        let page = self.current.get();
        unsafe {
            let base = Page::data(page).add((*page).used) as usize;
            let aligned = align_up(base, align);
            let padding = aligned - Page::data(page) as usize;

            // Fast path: fits in the current page.
            if padding + size <= (*page).capacity {
                (*page).used = padding + size;
                return aligned as *mut u8;
            }
        }
        self.alloc_new_page(size, align)
    }

    /// Slow path: open a fresh page. Outsized requests get a page of their
    /// own, sized to the request.
    fn alloc_new_page(&self, size: usize, align: usize) -> *mut u8 {
        let mut capacity = self.default_page_size;
        if size > capacity / 2 {
            capacity = align_up(size, align);
        }
        tracing::trace!(capacity, size, "arena: new page");

        let page = Page::new(capacity);
        unsafe {
            (*page).prev = self.current.get();
            self.current.set(page);

            let base = Page::data(page) as usize;
            let aligned = align_up(base, align);
            let padding = aligned - base;
            (*page).used = padding + size;
            aligned as *mut u8
        }
    }

    /// Extend the most recent allocation in place, if `ptr + old_size` is
    /// the current bump cursor and the page has room. Returns false when
    /// the caller must allocate fresh space and copy.
    pub fn grow_in_place(&self, ptr: *mut u8, old_size: usize, new_size: usize) -> bool {
        if new_size <= old_size {
            return true;
        }
        let page = self.current.get();
        unsafe {
            let end_of_alloc = ptr.add(old_size);
            let cursor = Page::data(page).add((*page).used);
            if end_of_alloc == cursor {
                let extra = new_size - old_size;
                if (*page).used + extra <= (*page).capacity {
                    (*page).used += extra;
                    return true;
                }
            }
        }
        false
    }

    /// Save the current position. Pair with `restore`.
    pub fn save(&self) -> Checkpoint {
        let page = self.current.get();
        Checkpoint {
            page,
            used: unsafe { (*page).used },
            hooks: self.hooks.borrow().len(),
        }
    }

    /// Rewind to a checkpoint, freeing every page opened after it and any
    /// teardown hooks registered after it (the hooks are discarded, not
    /// run; hooks fire at arena destruction).
    ///
    /// # Safety
    ///
    /// `cp` must come from this arena, and no pointer into the reclaimed
    /// region may be used afterwards.
    pub unsafe fn restore(&self, cp: Checkpoint) {
        while self.current.get() != cp.page {
            let page = self.current.get();
            let prev = (*page).prev;
            Page::free(page);
            self.current.set(prev);
        }
        (*cp.page).used = cp.used;
        self.hooks.borrow_mut().truncate(cp.hooks);
    }

    /// Register a teardown hook. Hooks run most-recent-first when the
    /// arena is dropped.
    pub fn register_teardown(&self, hook: impl FnOnce(&Arena) + 'static) {
        self.hooks.borrow_mut().push(Box::new(hook));
    }

    /// Bytes used in the current page. Test hook.
    pub fn current_page_used(&self) -> usize {
        unsafe { (*self.current.get()).used }
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // Hooks first: teardown callables may still allocate here.
        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        for hook in hooks.into_iter().rev() {
            hook(self);
        }

        let mut page = self.current.get();
        while !page.is_null() {
            unsafe {
                let prev = (*page).prev;
                Page::free(page);
                page = prev;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
