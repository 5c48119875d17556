//! # costack - Stack-Copying Cooperative Multitasking
//!
//! A single-threaded coroutine engine: all routines share the one OS call
//! stack, and a suspended routine is a byte copy of the stack region it
//! occupied. Switching pastes the target's bytes back and performs a
//! non-local jump. No per-routine stack allocation, no mmap, no guard
//! pages; a routine costs exactly as much memory as it has live stack.
//!
//! ## Quick Start
//!
//! ```ignore
//! use costack::{Engine, EngineConfig};
//! use std::rc::Rc;
//!
//! fn main() {
//!     let engine = Rc::new(Engine::new(EngineConfig::from_env()));
//!     let e = engine.clone();
//!     engine
//!         .start(
//!             || {},
//!             move || {
//!                 let e2 = e.clone();
//!                 e.spawn(move || {
//!                     println!("hello from a routine");
//!                     e2.yield_now();
//!                     println!("back again");
//!                 })
//!                 .unwrap();
//!                 e.yield_now();
//!             },
//!         )
//!         .unwrap();
//! }
//! ```
//!
//! For network servers, [`run`] wires an [`Engine`] to a [`Reactor`] so
//! routines can block on socket readiness:
//!
//! ```ignore
//! use costack::{run, CoListener, EngineConfig};
//!
//! fn main() {
//!     run(EngineConfig::from_env(), |engine, reactor| {
//!         let listener = CoListener::bind(reactor, 8080).unwrap();
//!         while let Some(stream) = listener.accept().unwrap() {
//!             let e = engine.clone();
//!             engine.spawn(move || { /* serve stream */ }).unwrap();
//!         }
//!     })
//!     .unwrap();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                    User Code                       │
//! │        spawn(), yield_now(), block()/wake()        │
//! └────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌────────────────────────────────────────────────────┐
//! │                     Engine                         │
//! │   alive/blocked lists, stack capture & restore     │
//! └────────────────────────────────────────────────────┘
//!                          │ idle callback
//!                          ▼
//! ┌────────────────────────────────────────────────────┐
//! │                    Reactor                         │
//! │     epoll_wait, eventfd waker, readiness wake      │
//! └────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use costack_core::{EngineError, EngineResult, RoutineId};

// Re-export kprint macros for debug logging
pub use costack_core::{kdebug, kerror, kinfo, kprintln, kwarn};
pub use costack_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};

// Re-export env utilities
pub use costack_core::{env_get, env_get_bool};

// Re-export engine types
pub use costack_engine::{Engine, EngineConfig};

// Re-export reactor types
pub use costack_reactor::{CoListener, CoStream, EpollFlags, Reactor, ReactorError, ReactorResult};

use std::rc::Rc;

/// Wire an engine to a reactor and run `main` as the first routine, with
/// the reactor's dispatcher as the idle callback. Returns when every
/// routine has finished.
///
/// This is the typical entry point for network applications.
pub fn run<F>(config: EngineConfig, main: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Rc<Engine>, Rc<Reactor>) + 'static,
{
    let engine = Rc::new(Engine::new(config));
    let reactor = Rc::new(Reactor::new(engine.clone())?);

    let e_main = engine.clone();
    let r_main = reactor.clone();
    let r_idle = reactor.clone();
    engine.start(
        move || {
            if let Err(err) = r_idle.dispatch() {
                kerror!("reactor dispatch failed: {}", err);
            }
        },
        move || main(e_main, r_main),
    )?;
    Ok(())
}
