//! x86_64 jump point implementation
//!
//! Uses inline assembly (`naked_asm!`, stable since Rust 1.88).
//!
//! System V AMD64: callee-saved registers are rbx, rbp, r12-r15. Everything
//! caller-saved is already spilled to the stack frame by the compiler around
//! the `save_point` call, and the engine restores that frame verbatim before
//! resuming, so saving the callee-saved set plus rsp/rip is sufficient.

use core::arch::naked_asm;

/// Saved register state for one suspension point.
///
/// Offsets are load-bearing: the assembly below addresses fields by constant
/// displacement.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct JumpPoint {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

impl JumpPoint {
    pub const fn new() -> Self {
        Self {
            rsp: 0,
            rip: 0,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }
}

impl Default for JumpPoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Record the current execution point into `point`.
///
/// Returns [`SAVED`](super::SAVED) on the first, recording return. When
/// `resume_point` later jumps back here, the call returns a second time with
/// [`RESUMED`](super::RESUMED).
///
/// # Safety
///
/// `point` must be valid for writes. The caller must treat this like setjmp:
/// any stack state mutated after the saving return is reverted when the point
/// is resumed, so decisions after resumption may only depend on heap state
/// and on locals computed before the save. The returned flag itself is part
/// of that caveat — the compiler assumes the call returns once, so the flag
/// must not be branched on across a resume unless the stack bytes spanning
/// the saved rsp were pasted back first (see the module docs in `arch`).
#[unsafe(naked)]
pub unsafe extern "C" fn save_point(_point: *mut JumpPoint) -> usize {
    naked_asm!(
        // rsp at entry still includes our return address slot
        "mov [rdi + 0x00], rsp",
        "mov rax, [rsp]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        "xor eax, eax",
        "ret",
    );
}

/// Jump to a previously saved execution point. Never returns.
///
/// # Safety
///
/// The stack bytes spanning the saved rsp must hold exactly what they held
/// when `save_point` recorded `point` (the engine pastes the routine's
/// snapshot back before calling this, or never left that stack region).
#[unsafe(naked)]
pub unsafe extern "C" fn resume_point(_point: *const JumpPoint) -> ! {
    naked_asm!(
        // Reload rsp as if save_point's ret had executed
        "mov rsp, [rdi + 0x00]",
        "add rsp, 8",
        "mov rcx, [rdi + 0x08]",
        "mov rbx, [rdi + 0x10]",
        "mov rbp, [rdi + 0x18]",
        "mov r12, [rdi + 0x20]",
        "mov r13, [rdi + 0x28]",
        "mov r14, [rdi + 0x30]",
        "mov r15, [rdi + 0x38]",
        "mov eax, 1",
        "jmp rcx",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ptr;

    #[inline(never)]
    unsafe fn resume_from_below(point: *const JumpPoint) -> ! {
        resume_point(point)
    }

    #[test]
    fn test_save_point_returns_twice() {
        // No paste happens here, so the raw return flag must not drive the
        // branch (the compiler assumes a single return and may cache it);
        // the resume decision goes through volatile heap memory instead.
        let hits: *mut u32 = Box::into_raw(Box::new(0));
        let mut point = JumpPoint::new();
        unsafe {
            save_point(&mut point);
            ptr::write_volatile(hits, ptr::read_volatile(hits) + 1);
            if ptr::read_volatile(hits) == 1 {
                resume_from_below(&point);
            }
            assert_eq!(ptr::read_volatile(hits), 2);
            drop(Box::from_raw(hits));
        }
    }

    #[inline(never)]
    fn visit_then_resume(point: *const JumpPoint, log: &RefCell<Vec<u32>>) {
        log.borrow_mut().push(1);
        unsafe { resume_from_below(point) };
    }

    #[test]
    fn test_resume_ordering() {
        // Save, descend one frame, jump back up; the volatile pass counter
        // keeps the resumed path from re-entering the descent.
        let log = Box::new(RefCell::new(Vec::new()));
        let pass: *mut u32 = Box::into_raw(Box::new(0));
        let mut point = JumpPoint::new();
        unsafe {
            save_point(&mut point);
            if ptr::read_volatile(pass) == 0 {
                ptr::write_volatile(pass, 1);
                log.borrow_mut().push(0);
                visit_then_resume(&point, &log);
            }
        }
        log.borrow_mut().push(2);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        unsafe { drop(Box::from_raw(pass)) };
    }
}
