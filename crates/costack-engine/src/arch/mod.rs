//! Architecture-specific jump points
//!
//! A `JumpPoint` is the saved register/program-counter state of one
//! suspension point: callee-saved registers, the stack pointer, and the
//! address execution resumes at. `save_point` records the current point and
//! returns [`SAVED`]; when some routine later jumps back into it via
//! `resume_point`, the same call "returns" a second time with [`RESUMED`].
//!
//! The pair has setjmp/longjmp semantics, including setjmp's caveat: the
//! compiler assumes a call returns once, so state derived from the first
//! return (the flag included) may be cached or folded and is unreliable
//! after the second. Branching on the raw flag is only dependable when the
//! stack bytes spanning the saved stack pointer have been restored first,
//! which is what the engine does by pasting the routine's snapshot back
//! before every resume. A bare in-frame resume (jumping back without a
//! paste, as the unit tests here do) must route its control decision
//! through volatile memory instead.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
    }
}

/// `save_point` return value on the first, saving return.
pub const SAVED: usize = 0;

/// `save_point` return value after `resume_point` jumped back into it.
pub const RESUMED: usize = 1;
