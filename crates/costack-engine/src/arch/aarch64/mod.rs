//! aarch64 jump point implementation
//!
//! AAPCS64: callee-saved registers are x19-x28, the frame pointer x29, and
//! the SIMD registers d8-d15 (low 64 bits). The link register x30 at entry is
//! the resume address.

use core::arch::naked_asm;

/// Saved register state for one suspension point.
///
/// Offsets are load-bearing: the assembly below addresses fields by constant
/// displacement.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct JumpPoint {
    pub sp: u64,      // 0x00
    pub pc: u64,      // 0x08 (x30 at save time)
    pub x: [u64; 10], // 0x10 x19..x28
    pub fp: u64,      // 0x60 x29
    pub d: [u64; 8],  // 0x68 d8..d15
}

impl JumpPoint {
    pub const fn new() -> Self {
        Self {
            sp: 0,
            pc: 0,
            x: [0; 10],
            fp: 0,
            d: [0; 8],
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
/// Returns [`SAVED`](super::SAVED) on the first, recording return;
/// [`RESUMED`](super::RESUMED) when jumped back into.
///
/// # Safety
///
/// Same contract as the x86_64 variant: setjmp semantics, state mutated
/// after the saving return is reverted on resume, and the returned flag
/// must not be branched on across a resume unless the stack bytes spanning
/// the saved sp were pasted back first (see the module docs in `arch`).
#[unsafe(naked)]
pub unsafe extern "C" fn save_point(_point: *mut JumpPoint) -> usize {
    naked_asm!(
        "mov x9, sp",
        "str x9, [x0]",
        "str x30, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "str x29, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        "mov x0, #0",
        "ret",
    );
}

/// Jump to a previously saved execution point. Never returns.
///
/// # Safety
///
/// The stack bytes spanning the saved sp must hold exactly what they held
/// when `save_point` recorded `point`.
#[unsafe(naked)]
pub unsafe extern "C" fn resume_point(_point: *const JumpPoint) -> ! {
    naked_asm!(
        "ldr x9, [x0]",
        "mov sp, x9",
        "ldr x30, [x0, #0x08]",
        "ldp x19, x20, [x0, #0x10]",
        "ldp x21, x22, [x0, #0x20]",
        "ldp x23, x24, [x0, #0x30]",
        "ldp x25, x26, [x0, #0x40]",
        "ldp x27, x28, [x0, #0x50]",
        "ldr x29, [x0, #0x60]",
        "ldp d8, d9, [x0, #0x68]",
        "ldp d10, d11, [x0, #0x78]",
        "ldp d12, d13, [x0, #0x88]",
        "ldp d14, d15, [x0, #0x98]",
        "mov x0, #1",
        "ret",
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
