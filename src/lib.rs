//! Stackful cooperative multitasking on a single OS thread.
//!
//! A ring of coroutines shares one canonical stack location. The running
//! coroutine owns the stack; everyone else lives as a serialized frame image
//! in a fixed capacity arena. [yield_now] copies the live frames out, copies
//! the next coroutine's frames back in and resumes it, strictly round-robin.
//! A coroutine leaves the ring by returning from its entry function; [start]
//! returns to its caller once the ring is empty.
//!
//! Coroutine entries are `extern "C"` functions taking 64-bit word
//! arguments. Narrower values must be widened by the caller and
//! floating-point values passed as bit patterns; SSE register state is not
//! preserved across a yield.
//!
//! Only x86_64 is supported, with the System-V AMD64 calling convention on
//! unix and the Microsoft x64 convention on windows.
//!
//! ```
//! use coring::{start, yield_now, Task};
//!
//! extern "C" fn ping() {
//!     for _ in 0..3 {
//!         yield_now();
//!     }
//! }
//!
//! start(vec![Task::from_fn(ping), Task::from_fn(ping)]).unwrap();
//! ```

mod runtime;
pub mod time;

pub use runtime::{coroutine_count, spawn, start, wait_until, yield_now, Task};
