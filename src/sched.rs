/// Cooperative Fiber Scheduler
///
/// Single-threaded, one FIFO ready queue, no preemption. A fiber is an
/// id, the arena it allocates from, and a task to resume. `run` drains
/// the queue: dequeue the head, point the thread-local current-arena slot
/// at the fiber's arena, resume. A fiber that wants to continue returns
/// `Step::Again` and is re-enqueued at the tail.
///
/// Two built-in task shapes drive pipelines:
///
///   pump - pulls one upstream value per step; spawns a sink task for the
///          value *before* re-enqueueing itself, so values reach their
///          sink in emission order while independent pumps interleave
///          round-robin. Retires on end of stream or on an error value.
///   sink - invokes the consumer (function, or instance `step`) with one
///          value; retires.
///
/// Nothing here blocks the OS thread, and fibers never migrate threads.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::core::arena::Arena;
use crate::core::bignum;
use crate::core::value::{call, HeapTag, Value, ERROR};
use crate::iter;
use crate::resource;

// ---------------------------------------------------------------------------
// Fibers
// ---------------------------------------------------------------------------

pub enum Step {
    Done,
    Again,
}

enum Task {
    Pump { iter: Value, sink: Value },
    Sink { sink: Value, value: Value },
}

pub struct Fiber {
    pub id: u64,
    /// Reserved for joins; recorded but not yet consumed.
    pub parent: Option<u64>,
    pub arena: Rc<Arena>,
    task: Task,
}

impl Fiber {
    fn resume(&mut self) -> Step {
        match self.task {
            Task::Pump { iter, sink } => match iter::next(&self.arena, iter) {
                None => {
                    tracing::trace!(fiber = self.id, "pump: end of stream");
                    Step::Done
                }
                Some(v) if v.is_error() => {
                    tracing::debug!(fiber = self.id, "pump: error value, retiring");
                    Step::Done
                }
                Some(v) => {
                    // Sink first, then yield: per-pipeline ordering.
                    enqueue(Task::Sink { sink, value: v }, Rc::clone(&self.arena), Some(self.id));
                    Step::Again
                }
            },
            Task::Sink { sink, value } => {
                deliver(&self.arena, sink, value);
                Step::Done
            }
        }
    }
}

/// Hand one value to a sink: plain functions are called directly,
/// instances through their definition's `step`.
fn deliver(arena: &Arena, sink: Value, value: Value) {
    match sink.heap_tag() {
        Some(HeapTag::Func) => {
            call(arena, sink, sink, ERROR, value);
        }
        Some(HeapTag::ResourceInst) => {
            let step = resource::def_step(resource::inst_def(sink));
            if step.is_unused() {
                tracing::debug!("sink instance has no step");
                return;
            }
            call(arena, step, sink, resource::inst_state(sink), value);
        }
        _ => {
            tracing::debug!(kind = crate::core::value::type_name(sink), "unsupported sink");
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler context
// ---------------------------------------------------------------------------

struct Scheduler {
    ready: VecDeque<Fiber>,
    next_id: u64,
    current: Option<u64>,
    root: Option<Rc<Arena>>,
}

thread_local! {
    static SCHED: RefCell<Scheduler> = RefCell::new(Scheduler {
        ready: VecDeque::new(),
        next_id: 0,
        current: None,
        root: None,
    });
}

/// Bind the scheduler to its root arena. Clears any stale fibers.
pub fn init(arena: &Rc<Arena>) {
    SCHED.with(|s| {
        let mut s = s.borrow_mut();
        s.ready.clear();
        s.next_id = 0;
        s.current = None;
        s.root = Some(Rc::clone(arena));
    });
}

/// Arena for a newly spawned fiber: the arena of the fiber currently
/// running, falling back to the scheduler's root.
fn spawn_arena() -> Option<Rc<Arena>> {
    bignum::current().or_else(|| SCHED.with(|s| s.borrow().root.clone()))
}

fn enqueue(task: Task, arena: Rc<Arena>, parent: Option<u64>) -> u64 {
    SCHED.with(|s| {
        let mut s = s.borrow_mut();
        let id = s.next_id;
        s.next_id += 1;
        s.ready.push_back(Fiber { id, parent, arena, task });
        id
    })
}

/// Enqueue a pump task driving `iter` into `sink`. Returns false when no
/// arena is bound to the calling thread.
pub fn spawn_pump(iter: Value, sink: Value) -> bool {
    let Some(arena) = spawn_arena() else {
        tracing::debug!("spawn_pump with no bound arena");
        return false;
    };
    let parent = SCHED.with(|s| s.borrow().current);
    enqueue(Task::Pump { iter, sink }, arena, parent);
    true
}

/// Enqueue a single sink task for one value.
pub fn spawn_sink(sink: Value, value: Value) -> bool {
    let Some(arena) = spawn_arena() else {
        tracing::debug!("spawn_sink with no bound arena");
        return false;
    };
    let parent = SCHED.with(|s| s.borrow().current);
    enqueue(Task::Sink { sink, value }, arena, parent);
    true
}

/// Fibers waiting in the ready queue.
pub fn pending() -> usize {
    SCHED.with(|s| s.borrow().ready.len())
}

/// Drain the ready queue. Every resume first installs the fiber's arena
/// as the thread-local big-number arena, so allocations triggered by the
/// fiber land in its arena.
pub fn run() {
    loop {
        let fiber = SCHED.with(|s| s.borrow_mut().ready.pop_front());
        let Some(mut fiber) = fiber else {
            break;
        };
        bignum::set_current(Some(Rc::clone(&fiber.arena)));
        SCHED.with(|s| s.borrow_mut().current = Some(fiber.id));

        match fiber.resume() {
            Step::Done => {}
            Step::Again => SCHED.with(|s| s.borrow_mut().ready.push_back(fiber)),
        }
    }
    SCHED.with(|s| s.borrow_mut().current = None);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{make_func, UNUSED};
    use crate::resource::{instantiate, make_def, set_inst_state};
    use crate::table;

    fn small(n: i64) -> Value {
        Value::small(n)
    }

    /// Sink step that appends its value to the recording table held in
    /// the instance state.
    fn recording_step(a: &Arena, _inst: Value, state: Value, value: Value) -> Value {
        table::push(a, state, value);
        state
    }

    fn recording_sink(arena: &Arena) -> (Value, Value) {
        let log = table::new(arena);
        let def = make_def(arena, UNUSED, make_func(arena, recording_step), UNUSED, UNUSED);
        let inst = instantiate(arena, def);
        set_inst_state(inst, log);
        (inst, log)
    }

    fn setup_arena() -> Rc<Arena> {
        let arena = Rc::new(Arena::new(1 << 16));
        init(&arena);
        bignum::set_current(Some(Rc::clone(&arena)));
        arena
    }

    #[test]
    fn pump_delivers_in_source_order() {
        let arena = setup_arena();
        let (sink, log) = recording_sink(&arena);
        let list = table::make_list(&arena, &[small(1), small(2), small(3)]);
        let it = iter::list_iter(&arena, list);

        assert!(spawn_pump(it, sink));
        run();

        assert_eq!(table::next_index(log), 3);
        for i in 0..3 {
            assert_eq!(table::get(log, small(i)), small(i + 1));
        }
        bignum::set_current(None);
    }

    #[test]
    fn independent_pumps_interleave_fifo() {
        let arena = setup_arena();
        let (sink, log) = recording_sink(&arena);
        let a = iter::list_iter(&arena, table::make_list(&arena, &[small(1), small(2)]));
        let b = iter::list_iter(&arena, table::make_list(&arena, &[small(10), small(20)]));

        spawn_pump(a, sink);
        spawn_pump(b, sink);
        run();

        // Round-robin between the two pumps, order preserved per pump.
        let got: Vec<i64> =
            (0..4).map(|i| table::get(log, small(i)).as_small()).collect();
        assert_eq!(got, vec![1, 10, 2, 20]);
        bignum::set_current(None);
    }

    #[test]
    fn pump_retires_on_error_value() {
        let arena = setup_arena();
        let (sink, log) = recording_sink(&arena);
        let list = table::make_list(&arena, &[small(1), ERROR, small(3)]);

        spawn_pump(iter::list_iter(&arena, list), sink);
        run();

        // Only the value before the error reaches the sink.
        assert_eq!(table::next_index(log), 1);
        assert_eq!(table::get(log, small(0)), small(1));
        bignum::set_current(None);
    }

    #[test]
    fn sink_task_delivers_to_function() {
        thread_local! {
            static SEEN: std::cell::Cell<i64> = std::cell::Cell::new(0);
        }
        fn observe(_a: &Arena, _recv: Value, _l: Value, r: Value) -> Value {
            SEEN.with(|s| s.set(r.as_small()));
            UNUSED
        }

        let arena = setup_arena();
        let f = make_func(&arena, observe);
        spawn_sink(f, small(77));
        run();
        SEEN.with(|s| assert_eq!(s.get(), 77));
        bignum::set_current(None);
    }

    #[test]
    fn run_on_empty_queue_is_noop() {
        let arena = setup_arena();
        run();
        assert_eq!(pending(), 0);
        drop(arena);
        bignum::set_current(None);
    }
}
