//! Time helpers for coroutines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::runtime;

/// Yields until at least `delay` has passed.
///
/// The clock is re-checked every time the ring comes back around; with no
/// peers this spins on the clock.
pub fn wait(delay: Duration) {
    let deadline = Instant::now() + delay;
    runtime::wait_until(|| Instant::now() >= deadline);
}

/// Yields until the deadline passes, `continuing` goes false, or
/// `canceling` goes true, whichever happens first.
pub fn wait_or(delay: Duration, continuing: &AtomicBool, canceling: Option<&AtomicBool>) {
    let deadline = Instant::now() + delay;
    runtime::wait_until(|| {
        Instant::now() >= deadline
            || !continuing.load(Ordering::Relaxed)
            || canceling.is_some_and(|flag| flag.load(Ordering::Relaxed))
    });
}

/// Blocks the OS thread, stalling every coroutine on the ring. An escape
/// hatch for callers that really want the thread gone; coroutines should
/// prefer [wait].
pub fn sleep(duration: Duration) {
    thread::sleep(duration);
}
