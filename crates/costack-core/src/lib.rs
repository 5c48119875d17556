//! # costack-core
//!
//! Core types for the costack coroutine engine.
//!
//! This crate is platform-agnostic and contains no OS-specific code; the
//! engine itself (stack capture, context switching, scheduling) lives in
//! `costack-engine`, and the epoll integration in `costack-reactor`.
//!
//! ## Modules
//!
//! - `id` - Routine identifier type
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod env;
pub mod error;
pub mod id;
pub mod kprint;

// Re-exports for convenience
pub use env::{env_get, env_get_bool};
pub use error::{EngineError, EngineResult};
pub use id::RoutineId;
pub use kprint::{set_log_level, LogLevel};
