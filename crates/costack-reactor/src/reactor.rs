//! # Reactor — the epoll readiness multiplexer
//!
//! The reactor is the engine's idle-time progress source. When every routine
//! is blocked, the engine calls [`Reactor::dispatch`], which sleeps in
//! `epoll_wait` until some watched descriptor becomes ready and then wakes
//! the routine registered for it, delivering the readiness bits.
//!
//! A routine never talks to epoll directly: it calls [`Reactor::block_on`]
//! with its descriptor and interest set, which registers the descriptor with
//! the routine's own id as the epoll payload, blocks, and deregisters on
//! resume.
//!
//! An eventfd waker is registered alongside the sockets under a reserved
//! payload value. Writing it from any thread (including a signal handler,
//! via [`Reactor::notify_fd`]) pops the dispatcher out of `epoll_wait` and
//! wakes every blocked routine with empty readiness, which blocked I/O
//! wrappers report as [`ReactorError::Stopped`] once [`Reactor::shutdown`]
//! has run.
//!
//! Everything except the eventfd write is single-threaded: the reactor lives
//! on the engine thread and is driven from routine bodies and the idle
//! callback only.

use crate::error::{ReactorError, ReactorResult};

use costack_core::{kdebug, RoutineId};
use costack_engine::Engine;

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};

use std::cell::Cell;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::rc::Rc;

/// Epoll payload reserved for the eventfd waker; never a routine id.
const WAKER_TOKEN: u64 = u64::MAX;

/// Epoll events drained per `epoll_wait` call.
const MAX_EVENTS: usize = 64;

/// Readiness multiplexer bound to one engine.
pub struct Reactor {
    engine: Rc<Engine>,
    epoll: Epoll,
    waker: EventFd,
    running: Cell<bool>,
}

impl Reactor {
    /// Create a reactor and register its eventfd waker.
    pub fn new(engine: Rc<Engine>) -> ReactorResult<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        let waker = EventFd::from_value_and_flags(
            0,
            EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC,
        )?;
        epoll.add(
            waker.as_fd(),
            EpollEvent::new(EpollFlags::EPOLLIN, WAKER_TOKEN),
        )?;
        Ok(Self {
            engine,
            epoll,
            waker,
            running: Cell::new(true),
        })
    }

    /// The engine this reactor wakes.
    pub fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    /// False once [`Reactor::shutdown`] has run. Cooperative I/O wrappers
    /// check this after every wake.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Block the current routine until `fd` reports one of the `interest`
    /// events (or the reactor is shut down). Returns the readiness bits
    /// delivered at the wake; 0 means the wake came from the waker, not
    /// from the descriptor.
    ///
    /// The descriptor is watched only for the duration of the call.
    ///
    /// Must be called from a routine body, never from the idle callback.
    pub fn block_on(&self, fd: RawFd, interest: EpollFlags) -> ReactorResult<u32> {
        let id = self.engine.current();
        let bfd = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll
            .add(bfd, EpollEvent::new(interest, id.as_u32() as u64))?;

        self.engine.block();

        // The peer may have closed the descriptor while we were blocked;
        // a vanished registration is not an error here.
        match self.epoll.delete(bfd) {
            Ok(()) | Err(Errno::ENOENT) | Err(Errno::EBADF) => {}
            Err(e) => return Err(ReactorError::Os(e)),
        }
        Ok(self.engine.events())
    }

    /// Idle callback body: sleep in `epoll_wait` and wake routines until at
    /// least one is runnable again.
    pub fn dispatch(&self) -> ReactorResult<()> {
        let mut events = [EpollEvent::empty(); MAX_EVENTS];
        while self.engine.is_all_blocked() {
            let n = match self.epoll.wait(&mut events, EpollTimeout::NONE) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(ReactorError::Os(e)),
            };
            for ev in &events[..n] {
                if ev.data() == WAKER_TOKEN {
                    self.drain_waker();
                    kdebug!("dispatch: waker fired, waking all routines");
                    self.engine.wake_all();
                } else {
                    let id = RoutineId::new(ev.data() as u32);
                    self.engine
                        .wake_with_events(id, ev.events().bits() as u32);
                }
            }
        }
        Ok(())
    }

    /// Kick the dispatcher out of `epoll_wait` and wake every blocked
    /// routine. Safe to call from any thread.
    pub fn notify(&self) -> ReactorResult<()> {
        match self.waker.arm() {
            Ok(_) => Ok(()),
            // counter full means a kick is already pending
            Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(ReactorError::Os(e)),
        }
    }

    /// Raw waker descriptor, for async-signal-safe notification: a signal
    /// handler may `write(2)` a nonzero u64 to it directly.
    pub fn notify_fd(&self) -> RawFd {
        self.waker.as_fd().as_raw_fd()
    }

    /// Stop accepting new blocked waits and release every current one.
    /// Blocked wrappers observe the stop and return [`ReactorError::Stopped`].
    pub fn shutdown(&self) {
        self.running.set(false);
        let _ = self.notify();
    }

    fn drain_waker(&self) {
        // counter semantics: one read zeroes it, EAGAIN means already empty
        let _ = self.waker.read();
    }
}
