//! Native half of the multitasker.
//!
//! Four naked routines cooperate with the bookkeeping callbacks in [super]:
//!
//! - [enter] pins the ring driver's continuation and starts the first
//!   coroutine.
//! - [switch] is the yield primitive. It spills the callee saved registers,
//!   has [super::suspend_current] serialize the live frames into the arena,
//!   then falls into [pop].
//! - [pop] reinstates the top arena entry at the canonical stack location.
//!   [super::prepare_pop] performs the copy and the first run argument
//!   marshalling; the asm tail loads the argument registers, adopts the
//!   reinstated stack and returns into the coroutine.
//! - [cleanup] is the return address of every coroutine body. It retires
//!   the finished coroutine and pops the next one, or returns to [enter]'s
//!   caller once the ring is empty.
//!
//! Being naked, the routines own their exact stack layout; the entry layout
//! in [super::frame] mirrors their push and pop sequences, so no offset
//! here depends on compiler code generation. Before every call back into
//! Rust the stack pointer has already been moved clear of the copy-in
//! target and is re-aligned to 16 bytes.

use std::arch::naked_asm;

#[cfg(not(target_arch = "x86_64"))]
compile_error!("coring only supports x86_64");

#[cfg(not(any(unix, windows)))]
compile_error!("coring only supports the System-V AMD64 and Microsoft x64 ABIs");

/// Scratch handed from [super::prepare_pop] back to [pop].
#[repr(C)]
#[derive(Debug)]
pub(super) struct Resume {
    /// Stack pointer to adopt; addresses the reinstated entry's lowest slot.
    pub(super) sp: u64,
    /// First run argument registers, source order. Stale on a plain resume,
    /// where the argument registers are dead anyway.
    pub(super) args: [u64; 6],
}

#[cfg(unix)]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn enter() {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "and rsp, -16",
        "call {prepare}",
        "test rax, rax",
        "jz 2f",
        "mov rsp, rax",
        "jmp {pop}",
        // empty ring, return straight to the caller
        "2:",
        "call {continuation}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
        prepare = sym super::prepare_ring,
        continuation = sym super::driver_continuation,
        pop = sym pop,
    )
}

#[cfg(unix)]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn switch() {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "and rsp, -16",
        "call {suspend}",
        "mov rsp, rax",
        "jmp {pop}",
        suspend = sym super::suspend_current,
        pop = sym pop,
    )
}

#[cfg(unix)]
#[unsafe(naked)]
unsafe extern "C" fn pop() {
    naked_asm!(
        "call {prepare}",
        "mov rdi, [rax + 8]",
        "mov rsi, [rax + 16]",
        "mov rdx, [rax + 24]",
        "mov rcx, [rax + 32]",
        "mov r8, [rax + 40]",
        "mov r9, [rax + 48]",
        "mov rsp, [rax]",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
        prepare = sym super::prepare_pop,
    )
}

#[cfg(unix)]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn cleanup() {
    naked_asm!(
        "and rsp, -16",
        "call {retire}",
        "test rax, rax",
        "jz 2f",
        "mov rsp, rax",
        "jmp {pop}",
        // last coroutine returned, unwind to the ring driver's caller
        "2:",
        "call {continuation}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
        retire = sym super::retire_current,
        continuation = sym super::driver_continuation,
        pop = sym pop,
    )
}

#[cfg(windows)]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn enter() {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push rdi",
        "push rsi",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rcx, rsp",
        "and rsp, -16",
        "sub rsp, 32",
        "call {prepare}",
        "test rax, rax",
        "jz 2f",
        "mov rsp, rax",
        "jmp {pop}",
        // empty ring, return straight to the caller
        "2:",
        "call {continuation}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rsi",
        "pop rdi",
        "pop rbx",
        "pop rbp",
        "ret",
        prepare = sym super::prepare_ring,
        continuation = sym super::driver_continuation,
        pop = sym pop,
    )
}

#[cfg(windows)]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn switch() {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push rdi",
        "push rsi",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rcx, rsp",
        "and rsp, -16",
        "sub rsp, 32",
        "call {suspend}",
        "mov rsp, rax",
        "jmp {pop}",
        suspend = sym super::suspend_current,
        pop = sym pop,
    )
}

#[cfg(windows)]
#[unsafe(naked)]
unsafe extern "C" fn pop() {
    naked_asm!(
        "sub rsp, 32",
        "call {prepare}",
        "mov rcx, [rax + 8]",
        "mov rdx, [rax + 16]",
        "mov r8, [rax + 24]",
        "mov r9, [rax + 32]",
        "mov rsp, [rax]",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rsi",
        "pop rdi",
        "pop rbx",
        "pop rbp",
        "ret",
        prepare = sym super::prepare_pop,
    )
}

#[cfg(windows)]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn cleanup() {
    naked_asm!(
        "and rsp, -16",
        "sub rsp, 32",
        "call {retire}",
        "test rax, rax",
        "jz 2f",
        "mov rsp, rax",
        "jmp {pop}",
        // last coroutine returned, unwind to the ring driver's caller
        "2:",
        "call {continuation}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rsi",
        "pop rdi",
        "pop rbx",
        "pop rbp",
        "ret",
        retire = sym super::retire_current,
        continuation = sym super::driver_continuation,
        pop = sym pop,
    )
}
