//! The coroutine ring.
//!
//! Every live coroutine executes at one canonical stack location, pinned
//! when the ring starts. The running coroutine owns that location; each
//! suspended coroutine is a serialized frame image in the storage area,
//! ordered as a FIFO queue. A yield serializes the running coroutine at the
//! back of the queue, reinstates the front entry and resumes it, which
//! makes the schedule strict round-robin. A coroutine leaves the ring by
//! returning from its entry function.
//!
//! The split of responsibilities: [arena] owns the storage area, [frame]
//! knows the entry layout, [context_switch] holds the four naked routines,
//! and this module carries the bookkeeping they call back into, plus the
//! public surface.

use std::io;
use std::{mem, ptr, slice};

use log::{debug, trace};

mod arena;
mod context_switch;
mod frame;
mod tls;

/// Capacity of the coroutine storage area: 90 000 slots, 720 kB.
const CSA_SLOTS: usize = 90_000;

/// Bytes between the copy-in target and the stack pointer the pop
/// bookkeeping runs on, so the bookkeeping frames stay clear of the
/// reinstated entry.
const POP_SLACK: u64 = 8 * 1024;

/// A coroutine entry point plus its argument words.
#[derive(Debug)]
pub struct Task {
    entry: u64,
    args: Vec<u64>,
}

impl Task {
    /// A coroutine taking `args.len()` 64-bit arguments.
    ///
    /// Values narrower than 64 bits must be widened by the caller;
    /// floating-point values must be passed as bit patterns.
    ///
    /// # Panics
    /// If more than 127 arguments are supplied.
    ///
    /// # Safety
    /// `entry` must be an `extern "C"` function taking exactly
    /// `args.len()` arguments, each a 64-bit scalar, and it must not
    /// unwind.
    pub unsafe fn new(entry: *const (), args: &[u64]) -> Task {
        assert!(
            args.len() <= frame::MAX_ARGS,
            "a coroutine takes at most 127 arguments"
        );

        Task {
            entry: entry as u64,
            args: args.to_vec(),
        }
    }

    /// A coroutine without arguments.
    pub fn from_fn(entry: extern "C" fn()) -> Task {
        unsafe { Task::new(entry as *const (), &[]) }
    }

    fn slots(&self) -> usize {
        frame::entry_slots(self.args.len()) + 1
    }
}

struct RingState {
    arena: arena::Arena,
    /// Live coroutines, the running one included.
    count: usize,
    /// Canonical frame base every coroutine sees; slot addresses below it
    /// hold the running coroutine's frames.
    base: u64,
    /// Stack pointer of the ring driver's continuation, adopted when the
    /// ring empties.
    driver_sp: u64,
    /// Coroutines supplied to [start], encoded once the base is known.
    pending: Vec<Task>,
    resume: context_switch::Resume,
}

impl RingState {
    fn new(pending: Vec<Task>) -> io::Result<RingState> {
        Ok(RingState {
            arena: arena::Arena::new(CSA_SLOTS)?,
            count: 0,
            base: 0,
            driver_sp: 0,
            pending,
            resume: context_switch::Resume { sp: 0, args: [0; 6] },
        })
    }

    /// Serializes a not yet started coroutine at the back of the queue.
    fn enqueue(&mut self, task: &Task) {
        let slots = frame::entry_slots(task.args.len());
        let entry = self.arena.open_bottom(slots + 1);

        frame::encode(
            &mut entry[..slots],
            self.base,
            task.entry,
            context_switch::cleanup as usize as u64,
            &task.args,
        );
        entry[slots] = frame::first_run_trailer(slots, task.args.len());

        self.count += 1;
        trace!(
            "enqueued coroutine {:#x} with {} argument(s)",
            task.entry,
            task.args.len()
        );
    }

    /// Stack pointer for the next trip through the pop trampoline: clear of
    /// the front entry's copy-in target, 16-byte aligned.
    fn landing_sp(&self) -> u64 {
        let slots = frame::trailer_slots(self.arena.top_trailer());
        let destination = self.base - 8 * (slots as u64 + 2);
        (destination - POP_SLACK) & !15
    }
}

/// Pins the canonical base and the driver continuation, then encodes the
/// supplied coroutines. Returns the first landing stack pointer, or zero
/// when there is nothing to run.
extern "C" fn prepare_ring(sp: u64) -> u64 {
    tls::ring(|state| {
        state.driver_sp = sp;
        state.base = sp & !15;

        for task in mem::take(&mut state.pending) {
            state.enqueue(&task);
        }
        debug!("ring started with {} coroutine(s)", state.count);

        if state.count == 0 {
            0
        } else {
            state.landing_sp()
        }
    })
}

/// Serializes the frames in `[sp, base - 2)` at the back of the queue and
/// returns the landing stack pointer for the front entry.
extern "C" fn suspend_current(sp: u64) -> u64 {
    tls::ring(|state| {
        let slots = ((state.base - sp) / 8) as usize - 2;
        let entry = state.arena.open_bottom(slots + 1);

        unsafe { ptr::copy_nonoverlapping(sp as *const u64, entry.as_mut_ptr(), slots) };
        entry[slots] = slots as u64;

        state.landing_sp()
    })
}

/// Evicts the front entry and copies it to the canonical location. On a
/// first run, stages the argument registers in the resume scratch and
/// relocates overflow arguments to the stack slots the calling convention
/// expects.
extern "C" fn prepare_pop() -> *mut context_switch::Resume {
    tls::ring(|state| {
        let trailer = state.arena.top_trailer();
        let slots = frame::trailer_slots(trailer);
        let entry = state.arena.evict_top(slots);

        let destination = (state.base - 8 * (slots as u64 + 2)) as *mut u64;
        unsafe { ptr::copy_nonoverlapping(entry, destination, slots) };

        if let Some(arg_count) = frame::first_run_args(trailer) {
            let args = unsafe { slice::from_raw_parts(entry.add(frame::ARG_SLOT), arg_count) };
            let in_registers = arg_count.min(frame::REGISTER_ARGS);
            state.resume.args[..in_registers].copy_from_slice(&args[..in_registers]);

            unsafe {
                ptr::copy_nonoverlapping(
                    entry.add(frame::ARG_SLOT + in_registers),
                    destination.add(frame::ARG_SLOT),
                    arg_count - in_registers,
                )
            };
        }

        state.resume.sp = destination as u64;
        &mut state.resume as *mut context_switch::Resume
    })
}

/// Removes the coroutine that just returned. Returns the landing stack
/// pointer for the front entry, or zero when the ring is empty.
extern "C" fn retire_current() -> u64 {
    tls::ring(|state| {
        state.count -= 1;
        trace!("coroutine returned, {} live", state.count);

        if state.count == 0 {
            0
        } else {
            state.landing_sp()
        }
    })
}

extern "C" fn driver_continuation() -> u64 {
    tls::ring(|state| state.driver_sp)
}

/// Runs a ring of coroutines until every one of them has returned.
///
/// The coroutines run in the supplied order, then round-robin: each
/// [yield_now] moves the caller to the back of the ring. An empty `tasks`
/// is valid and returns immediately.
///
/// # Errors
/// If the storage area cannot be acquired, or a ring is already running on
/// this thread.
///
/// # Panics
/// If the supplied coroutines do not fit the storage area.
pub fn start(tasks: Vec<Task>) -> io::Result<()> {
    if tls::installed() {
        return Err(io::Error::other("a ring is already running on this thread"));
    }

    let slots: usize = tasks.iter().map(Task::slots).sum();
    assert!(slots <= CSA_SLOTS, "coroutine storage area overflow");

    let state = RingState::new(tasks)?;
    tls::exclusive(state, || {
        unsafe { context_switch::enter() };

        tls::ring(|state| {
            debug_assert_eq!(state.count, 0);
            debug_assert_eq!(state.arena.occupied(), 0);
        });
        debug!("ring drained");
    });

    Ok(())
}

/// Adds a coroutine at the back of the running ring without yielding; it
/// first runs once every currently queued coroutine has had a turn.
///
/// # Panics
/// If no ring is running on this thread, or the storage area overflows.
pub fn spawn(task: Task) {
    tls::ring(|state| state.enqueue(&task));
}

/// Suspends the calling coroutine and resumes the next one in the ring.
/// A no-op while the ring holds a single coroutine.
///
/// # Panics
/// If no ring is running on this thread.
pub fn yield_now() {
    let peers = tls::ring(|state| state.count > 1);
    if peers {
        unsafe { context_switch::switch() };
    }
}

/// Number of live coroutines, the running one included. Zero on a thread
/// without a running ring.
pub fn coroutine_count() -> usize {
    tls::try_ring(|state| state.count).unwrap_or(0)
}

/// Yields until the predicate is true. The predicate is re-evaluated every
/// time the ring comes back around; with no peers this spins.
pub fn wait_until(mut predicate: impl FnMut() -> bool) {
    while !predicate() {
        yield_now();
    }
}
