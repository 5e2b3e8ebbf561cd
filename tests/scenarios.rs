//! End to end rings exercised through the public surface only.

use std::cell::RefCell;

use coring::{coroutine_count, spawn, start, wait_until, yield_now, Task};

extern "C" fn emit(log: u64, token: u64, turns: u64) {
    let log = unsafe { &*(log as *const RefCell<String>) };
    for _ in 0..turns {
        log.borrow_mut().push(token as u8 as char);
        yield_now();
    }
}

fn emitter(log: &RefCell<String>, token: char, turns: u64) -> Task {
    unsafe {
        Task::new(
            emit as *const (),
            &[log as *const _ as u64, token as u64, turns],
        )
    }
}

#[test]
fn a_trivial_coroutine_terminates_the_ring() {
    extern "C" fn observe(out: u64) {
        unsafe { *(out as *mut usize) = coroutine_count() };
    }

    let mut inside = 0usize;
    let task = unsafe { Task::new(observe as *const (), &[&mut inside as *mut usize as u64]) };

    start(vec![task]).unwrap();

    assert_eq!(inside, 1);
    assert_eq!(coroutine_count(), 0);
}

#[test]
fn two_printers_interleave() {
    let log = RefCell::new(String::new());

    start(vec![emitter(&log, 'A', 10), emitter(&log, 'B', 10)]).unwrap();

    assert_eq!(log.borrow().as_str(), "ABABABABABABABABABAB");
}

#[test]
fn nine_arguments_arrive_intact() {
    #[rustfmt::skip]
    extern "C" fn sum9(
        a: u64, b: u64, c: u64, d: u64, e: u64, f: u64, g: u64, h: u64, i: u64,
        out: u64,
    ) {
        unsafe { *(out as *mut u64) = a + b + c + d + e + f + g + h + i };
    }

    let mut result = 0u64;
    let task = unsafe {
        Task::new(
            sum9 as *const (),
            &[1, 2, 3, 4, 5, 6, 7, 8, 9, &mut result as *mut u64 as u64],
        )
    };

    start(vec![task]).unwrap();

    assert_eq!(result, 45);
}

#[test]
fn a_mixed_ring_drains_completely() {
    let log = RefCell::new(String::new());
    let tasks = vec![
        emitter(&log, 'a', 3),
        emitter(&log, 'b', 1),
        emitter(&log, 'c', 4),
        emitter(&log, 'd', 1),
        emitter(&log, 'e', 5),
    ];

    start(tasks).unwrap();

    assert_eq!(coroutine_count(), 0);
    assert_eq!(log.borrow().len(), 3 + 1 + 4 + 1 + 5);
}

#[test]
fn a_waiter_wakes_once_its_peer_has_ticked() {
    thread_local! {
        static TICKS: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
    }

    extern "C" fn ticking() {
        for _ in 0..10 {
            TICKS.with(|ticks| ticks.set(ticks.get() + 1));
            yield_now();
        }
    }

    extern "C" fn waiting(out: u64) {
        wait_until(|| TICKS.with(|ticks| ticks.get()) >= 7);
        unsafe { *(out as *mut u64) = TICKS.with(|ticks| ticks.get()) };
    }

    let mut woken_at = 0u64;
    let tasks = vec![
        unsafe { Task::new(waiting as *const (), &[&mut woken_at as *mut u64 as u64]) },
        Task::from_fn(ticking),
    ];

    start(tasks).unwrap();

    assert!(woken_at >= 7);
}

#[test]
fn an_inserted_coroutine_runs_on_the_next_turn() {
    extern "C" fn inserting(log: u64) {
        let follower = unsafe { Task::new(emit as *const (), &[log, 'b' as u64, 1]) };
        spawn(follower);

        let log = unsafe { &*(log as *const RefCell<String>) };
        log.borrow_mut().push('a');
        yield_now();
        log.borrow_mut().push('A');
    }

    let log = RefCell::new(String::new());
    let task = unsafe { Task::new(inserting as *const (), &[&log as *const _ as u64]) };

    start(vec![task]).unwrap();

    assert_eq!(log.borrow().as_str(), "abA");
}
