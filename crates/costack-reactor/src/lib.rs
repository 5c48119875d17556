//! # costack-reactor
//!
//! Epoll integration for the costack engine: the readiness dispatcher that
//! serves as the engine's idle callback, the block-on-epoll protocol for
//! routines, and cooperative TCP socket wrappers built on it.
//!
//! Wiring is three lines:
//!
//! ```ignore
//! let engine = Rc::new(Engine::with_defaults());
//! let reactor = Rc::new(Reactor::new(engine.clone())?);
//! let r = reactor.clone();
//! engine.start(move || { let _ = r.dispatch(); }, main_routine)?;
//! ```

pub mod error;
pub mod net;
pub mod reactor;

pub use error::{ReactorError, ReactorResult};
pub use net::{CoListener, CoStream};
pub use reactor::Reactor;

// the interest-set type routines pass to Reactor::block_on
pub use nix::sys::epoll::EpollFlags;
