//! Thread local home of the ring state.
//!
//! One ring may run per thread. [exclusive] installs the state for the
//! duration of the ring and tears it down afterwards; the native routines
//! reach the same state through [ring] between context switches.

use std::cell::RefCell;

thread_local! {
    static RING: RefCell<Option<super::RingState>> = const { RefCell::new(None) };
}

/// Whether a ring is currently installed on this thread.
pub(super) fn installed() -> bool {
    RING.with(|cell| cell.borrow().is_some())
}

/// Installs `state` for the duration of the closure.
pub(super) fn exclusive<T>(state: super::RingState, f: impl FnOnce() -> T) -> T {
    RING.with(|cell| {
        let mut cell = cell.borrow_mut();
        assert!(cell.is_none(), "a ring is already running on this thread");
        *cell = Some(state);
    });

    let output = f();

    RING.with(|cell| *cell.borrow_mut() = None);

    output
}

/// Runs a closure against the active ring state.
pub(super) fn ring<T>(f: impl FnOnce(&mut super::RingState) -> T) -> T {
    RING.with(|cell| {
        let mut cell = cell.borrow_mut();
        let state = cell.as_mut().expect("no ring is running on this thread");
        f(state)
    })
}

/// Like [ring], but reports the absence of a ring instead of panicking.
pub(super) fn try_ring<T>(f: impl FnOnce(&mut super::RingState) -> T) -> Option<T> {
    RING.with(|cell| cell.borrow_mut().as_mut().map(f))
}
