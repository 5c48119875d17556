//! # costack-engine
//!
//! A user-space cooperative multitasking engine. One OS thread runs many
//! routines by capturing and restoring each routine's live region of the one
//! shared call stack, switching between them with a non-local jump.
//!
//! This crate provides:
//! - Jump-point save/resume (architecture-specific assembly)
//! - Per-routine stack snapshots (grow-only copy buffers)
//! - The alive/blocked scheduling lists and the block/wake protocol
//! - Engine lifecycle: `start` runs routines to completion, calling a
//!   caller-supplied idle callback whenever every routine is blocked
//!
//! The engine knows nothing about sockets or readiness multiplexers; that
//! integration lives in `costack-reactor` and talks to the engine only
//! through `current()`, `block()`, `wake_with_events()` and `wake_all()`.

pub mod arch;
pub mod config;
pub mod context;
pub mod engine;

// Re-exports
pub use config::EngineConfig;
pub use context::ListTag;
pub use engine::Engine;

pub use costack_core::{EngineError, EngineResult, RoutineId};

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
