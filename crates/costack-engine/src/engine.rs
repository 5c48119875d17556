//! The coroutine engine
//!
//! One OS thread, one shared call stack, many routines. A suspended routine
//! is a verbatim copy of the stack region it occupied plus a jump point;
//! switching pastes the target's bytes back over the shared stack and jumps.
//!
//! The stack-bottom anchor is recorded once in `start`, and every switch
//! happens in calls made at or below that frame. Restoring a routine whose
//! region overlaps the restorer's own frame would overwrite live state, so
//! the restore path first recurses deeper until its frame is clear of the
//! paste span ([`dig_and_resume`]), exactly as the capture/restore contract
//! in `arch` requires.
//!
//! Not threadsafe: the engine is `!Send`/`!Sync` by construction and all
//! routine bodies run interleaved on the one thread, so state shared between
//! routines needs no locking.

use crate::arch::{RESUMED, SAVED};
use crate::config::EngineConfig;
use crate::context::{Context, ContextArena, ListTag, RunLists, StackImage};
use crate::current_arch::{resume_point, save_point, JumpPoint};

use costack_core::{kdebug, EngineError, EngineResult, RoutineId};

use std::cell::UnsafeCell;
use std::marker::PhantomData;

/// Extra clearance, beyond the paste span itself, that the restore recursion
/// leaves between its own frame and the lowest pasted address. Keeps the
/// digger's locals and spilled arguments out of the region it is about to
/// overwrite.
const RESTORE_HEADROOM: usize = 1024;

struct EngineInner {
    /// Anchor address recorded by `start`; 0 while the engine is not running.
    stack_bottom: usize,
    arena: ContextArena,
    lists: RunLists,
    /// Currently running routine; NONE while the idle context holds the CPU.
    cur: RoutineId,
    idle_point: JumpPoint,
    idle_image: StackImage,
}

/// Entry point of the coroutine engine.
///
/// Owns the context arena, the alive/blocked scheduling lists, and the idle
/// context. Single-ownership: create one, hand it (typically in an `Rc`) to
/// the code that drives it, and drop it after `start` returns.
pub struct Engine {
    inner: UnsafeCell<EngineInner>,
    // one OS thread only; raw pointer strips Send/Sync
    _single_thread: PhantomData<*mut ()>,
}

impl Engine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        config.validate().expect("invalid engine configuration");
        config.apply_logging();
        Engine {
            inner: UnsafeCell::new(EngineInner {
                stack_bottom: 0,
                arena: ContextArena::new(config.max_routines),
                lists: RunLists::new(),
                cur: RoutineId::NONE,
                idle_point: JumpPoint::new(),
                idle_image: StackImage::new(),
            }),
            _single_thread: PhantomData,
        }
    }

    /// Create an engine with environment-derived defaults.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::from_env())
    }

    #[inline]
    fn inner(&self) -> *mut EngineInner {
        self.inner.get()
    }

    /// Register a new routine. It receives control only when the scheduler
    /// later enters it; new routines are inserted at the head of the alive
    /// list and are therefore favored over older ones.
    ///
    /// Fails with [`EngineError::NotStarted`] before `start` has recorded the
    /// stack anchor, and with [`EngineError::RoutineLimit`] when the
    /// configured slot cap is reached.
    ///
    /// The returned handle is valid until the routine finishes; after that
    /// the slot may be reused. Obtain wake handles from [`Engine::current`]
    /// at the block site, not from stored spawn results. Routine bodies must
    /// not unwind: a panic would walk back into stack frames the engine has
    /// already replayed.
    pub fn spawn<F>(&self, f: F) -> EngineResult<RoutineId>
    where
        F: FnOnce() + 'static,
    {
        let inner = self.inner();
        unsafe {
            if (*inner).stack_bottom == 0 {
                return Err(EngineError::NotStarted);
            }
            let id = (*inner).arena.insert(Context::new(Box::new(f)))?;
            let ctx: *mut Context = (*inner).arena.ptr(id);

            if save_point(&mut (*ctx).point) == RESUMED {
                // First entry: the scheduler pasted this frame back and
                // jumped here. Locals computed before the save (id, ctx) are
                // valid; everything else must come from the heap.
                if let Some(body) = (*ctx).entry.take() {
                    body();
                }
                self.finish_current();
            }

            // Saving return: snapshot this frame and everything beneath it
            // on the shared stack, so entering the routine later replays the
            // registration site.
            store_stack(&mut (*ctx).image, (*inner).stack_bottom);
            (*inner).lists.push(&mut (*inner).arena, ListTag::Alive, id);
            kdebug!("spawn: routine {} registered", id);
            Ok(id)
        }
    }

    /// Start the engine: register `main` as the first routine and run until
    /// no routine remains alive or blocked.
    ///
    /// `idle` is invoked whenever every registered routine is blocked and
    /// none is runnable; its job is to make progress by consulting a
    /// readiness source and calling [`Engine::wake_with_events`] /
    /// [`Engine::wake_all`]. It is never invoked when the engine drains
    /// naturally.
    ///
    /// Blocks the calling thread until all routines are done.
    pub fn start<I, F>(&self, idle: I, main: F) -> EngineResult<()>
    where
        I: FnMut(),
        F: FnOnce() + 'static,
    {
        let inner = self.inner();
        unsafe {
            if (*inner).stack_bottom != 0 {
                return Err(EngineError::AlreadyStarted);
            }

            // Heap-box the idle callback: the bytes of this frame are
            // replayed on every return to idle, so closure state must not
            // live in it.
            let mut idle: Box<dyn FnMut()> = Box::new(idle);

            // Everything the engine will ever snapshot lives below this
            // local's address.
            let anchor: u8 = 0;
            (*inner).stack_bottom = std::hint::black_box(&anchor as *const u8 as usize);

            let first = match self.spawn(main) {
                Ok(id) => id,
                Err(e) => {
                    (*inner).stack_bottom = 0;
                    return Err(e);
                }
            };

            if save_point(&mut (*inner).idle_point) == SAVED {
                store_stack(&mut (*inner).idle_image, (*inner).stack_bottom);
                self.enter(first);
                // enter() from the idle context does not return
            }

            // Idle driver: control lands here, with this frame replayed
            // fresh, every time the scheduler degrades to the idle context.
            // All loop progress lives in the engine, not in this frame.
            loop {
                self.yield_now();
                if self.is_all_blocked() {
                    idle();
                    continue;
                }
                if (*inner).lists.alive.is_none() && (*inner).lists.blocked.is_none() {
                    break;
                }
            }

            // Drained: release the idle snapshot and stop accepting spawns.
            (*inner).idle_image.release();
            (*inner).cur = RoutineId::NONE;
            (*inner).stack_bottom = 0;
            kdebug!("engine drained");
            Ok(())
        }
    }

    /// Give up execution and let the engine schedule another routine.
    ///
    /// Policy: if the head of the alive list is the current routine, control
    /// passes to the entry after it, otherwise to the head itself. This is
    /// not strict round-robin — freshly spawned routines sit at the head and
    /// run first. If no other alive routine is eligible and the current one
    /// is still runnable, this is a no-op; a blocked current routine degrades
    /// to the idle context instead.
    pub fn yield_now(&self) {
        let inner = self.inner();
        unsafe {
            let mut cand = (*inner).lists.alive;
            if cand.is_some() && cand == (*inner).cur {
                cand = (*(*inner).arena.ptr(cand)).next;
            }
            if cand.is_some() {
                self.enter(cand);
                // execution resumes here when this routine is next entered
            }

            let cur = (*inner).cur;
            if cur.is_none() {
                // already the idle context; let it proceed to the idle driver
                return;
            }
            if (*(*inner).arena.ptr(cur)).list == ListTag::Alive {
                // still runnable and nobody else to run
                return;
            }
            // current routine is blocked: hand the CPU to the idle context
            self.enter(RoutineId::NONE);
        }
    }

    /// Suspend the current routine and transfer control to `target`,
    /// resuming it from its last suspension point.
    ///
    /// With `None`, returns immediately if a routine is running (explicit
    /// hand-back is a no-op mid-routine) and otherwise behaves like
    /// [`Engine::yield_now`].
    pub fn sched(&self, target: Option<RoutineId>) {
        let inner = self.inner();
        unsafe {
            match target {
                None => {
                    if (*inner).cur.is_some() {
                        return;
                    }
                    self.yield_now();
                }
                Some(id) => {
                    if id == (*inner).cur {
                        return;
                    }
                    if (*inner).arena.get(id).is_none() {
                        kdebug!("sched: unknown routine {} (no-op)", id);
                        return;
                    }
                    self.enter(id);
                }
            }
        }
    }

    /// Block the current routine: move it to the blocked list, clear any
    /// stale pending events, and yield. Does not return until another code
    /// path wakes this routine and the scheduler resumes it.
    ///
    /// # Panics
    ///
    /// Panics if called while no routine is running — blocking the idle
    /// context would deadlock the engine, so that is a programming error.
    pub fn block(&self) {
        let inner = self.inner();
        unsafe {
            let cur = (*inner).cur;
            assert!(
                cur.is_some(),
                "block() called outside a running routine"
            );
            (*inner)
                .lists
                .transfer(&mut (*inner).arena, cur, ListTag::Blocked);
            (*(*inner).arena.ptr(cur)).events = 0;
            kdebug!("block: routine {}", cur);
            self.yield_now();
        }
    }

    /// Wake a blocked routine: move it back to the alive list.
    ///
    /// Waking a routine that is already alive, or an id that names no live
    /// routine, is an idempotent no-op (the policy this engine commits to
    /// for the double-wake ambiguity; see DESIGN.md).
    pub fn wake(&self, id: RoutineId) {
        let inner = self.inner();
        unsafe {
            match (*inner).arena.get(id) {
                Some(ctx) if ctx.list == ListTag::Blocked => {
                    (*inner)
                        .lists
                        .transfer(&mut (*inner).arena, id, ListTag::Alive);
                    kdebug!("wake: routine {}", id);
                }
                Some(_) => kdebug!("wake: routine {} already alive (no-op)", id),
                None => kdebug!("wake: unknown routine {} (no-op)", id),
            }
        }
    }

    /// Deliver readiness bits to a routine and wake it.
    ///
    /// This is the reactor's wake primitive: the bits land in the routine's
    /// pending-events slot and are readable via [`Engine::events`] once it
    /// resumes. The engine never interprets the bits.
    pub fn wake_with_events(&self, id: RoutineId, events: u32) {
        let inner = self.inner();
        unsafe {
            if let Some(ctx) = (*inner).arena.get_mut(id) {
                ctx.events = events;
            }
        }
        self.wake(id);
    }

    /// Wake every blocked routine. Used at shutdown to force I/O waiters
    /// back into the runnable pool so each can observe a stop flag and
    /// terminate voluntarily.
    pub fn wake_all(&self) {
        let inner = self.inner();
        unsafe {
            while (*inner).lists.blocked.is_some() {
                let head = (*inner).lists.blocked;
                self.wake(head);
            }
        }
    }

    /// True iff no routine is runnable but at least one is blocked — the
    /// exact condition under which the idle callback must make progress.
    /// Both lists empty means the engine has drained.
    pub fn is_all_blocked(&self) -> bool {
        let inner = self.inner();
        unsafe { (*inner).lists.alive.is_none() && (*inner).lists.blocked.is_some() }
    }

    /// Handle of the currently running routine (NONE from the idle context).
    ///
    /// A routine about to block passes this handle to the reactor so the
    /// matching readiness notification can find it.
    pub fn current(&self) -> RoutineId {
        unsafe { (*self.inner()).cur }
    }

    /// Readiness bits delivered at the current routine's last wake; 0 from
    /// the idle context.
    pub fn events(&self) -> u32 {
        let inner = self.inner();
        unsafe {
            let cur = (*inner).cur;
            if cur.is_none() {
                return 0;
            }
            match (*inner).arena.get(cur) {
                Some(ctx) => ctx.events,
                None => 0,
            }
        }
    }

    /// Number of routines in the alive list.
    pub fn alive_count(&self) -> usize {
        let inner = self.inner();
        unsafe { (*inner).lists.count(&(*inner).arena, ListTag::Alive) }
    }

    /// Number of routines in the blocked list.
    pub fn blocked_count(&self) -> usize {
        let inner = self.inner();
        unsafe { (*inner).lists.count(&(*inner).arena, ListTag::Blocked) }
    }

    /// Suspend the current routine in place and transfer to `target`
    /// (a routine id, or NONE for the idle context).
    ///
    /// Never returns on the switching-away path; returns (much later) when
    /// some switch restores the suspended routine.
    unsafe fn enter(&self, target: RoutineId) {
        let inner = self.inner();
        let cur = (*inner).cur;
        if cur.is_some() {
            let ctx = (*inner).arena.ptr(cur);
            if save_point(&mut (*ctx).point) == RESUMED {
                // switched back in; the pasted frame carries on from here
                return;
            }
            store_stack(&mut (*ctx).image, (*inner).stack_bottom);
        }
        if target.is_some() {
            (*inner).cur = target;
            let ctx = (*inner).arena.ptr(target);
            dig_and_resume(&(*ctx).image, &(*ctx).point);
        } else {
            (*inner).cur = RoutineId::NONE;
            dig_and_resume(&(*inner).idle_image, &(*inner).idle_point);
        }
        unreachable!("stack restore returned");
    }

    /// Termination path of every routine: unlink, destroy the context, and
    /// hand the CPU to the idle context. Execution must never fall through
    /// a finished routine's original registration frame.
    unsafe fn finish_current(&self) -> ! {
        let inner = self.inner();
        let id = (*inner).cur;
        kdebug!("finish: routine {}", id);
        (*inner).lists.unlink(&mut (*inner).arena, id);
        (*inner).cur = RoutineId::NONE;
        // Synchronous destruction: snapshot buffer and closure die here.
        drop((*inner).arena.remove(id));
        dig_and_resume(&(*inner).idle_image, &(*inner).idle_point);
        unreachable!("stack restore returned");
    }
}

/// Address of a probe local in a frame strictly deeper than the caller's.
#[inline(never)]
fn stack_mark() -> usize {
    let probe: u8 = 0;
    std::hint::black_box(&probe as *const u8 as usize)
}

/// Capture the live stack between the engine anchor and a mark taken below
/// the caller's frame.
#[inline(never)]
unsafe fn store_stack(image: &mut StackImage, bottom: usize) {
    let mark = stack_mark();
    image.capture(bottom, mark);
}

/// Paste a stack image back and jump to its saved point, recursing deeper
/// first until this function's own frame is clear of the paste span.
///
/// The recursion is the algorithm, not an optimization: pasting from a frame
/// inside the span would overwrite the paster. The volatile use of the
/// recursive result keeps the compiler from folding the self-call into a
/// loop, which would reuse the frame instead of descending.
#[inline(never)]
unsafe extern "C" fn dig_and_resume(image: *const StackImage, point: *const JumpPoint) -> usize {
    let mut pad = [0u8; 64];
    core::ptr::write_volatile(pad.as_mut_ptr(), 0);
    let mark = pad.as_ptr() as usize;
    if mark + RESTORE_HEADROOM >= (*image).low() && mark <= (*image).high() {
        let deeper = dig_and_resume(image, point);
        return core::ptr::read_volatile(&deeper);
    }
    (*image).paste();
    resume_point(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn engine() -> Rc<Engine> {
        Rc::new(Engine::new(EngineConfig::from_env().max_routines(64)))
    }

    #[test]
    fn test_spawn_before_start_fails() {
        let e = Engine::with_defaults();
        assert_eq!(e.spawn(|| {}).unwrap_err(), EngineError::NotStarted);
    }

    #[test]
    fn test_trivial_main_drains_without_idle() {
        let e = engine();
        let idle_calls = Rc::new(Cell::new(0u32));
        let ran = Rc::new(Cell::new(false));

        let ic = idle_calls.clone();
        let r = ran.clone();
        e.start(move || ic.set(ic.get() + 1), move || r.set(true))
            .unwrap();

        assert!(ran.get());
        assert_eq!(idle_calls.get(), 0);
        assert_eq!(e.alive_count(), 0);
        assert_eq!(e.blocked_count(), 0);
    }

    #[test]
    fn test_start_twice_rejected_while_running() {
        let e = engine();
        let e2 = e.clone();
        let nested = Rc::new(Cell::new(None));
        let n = nested.clone();
        e.start(
            || {},
            move || {
                n.set(Some(e2.start(|| {}, || {}).unwrap_err()));
            },
        )
        .unwrap();
        assert_eq!(nested.get(), Some(EngineError::AlreadyStarted));
        // drained engine can be started again
        e.start(|| {}, || {}).unwrap();
    }

    #[test]
    fn test_yield_interleaves_two_routines() {
        let e = engine();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let e_main = e.clone();
        let l_main = log.clone();
        e.start(
            || {},
            move || {
                l_main.borrow_mut().push("m1");
                let e_a = e_main.clone();
                let l_a = l_main.clone();
                e_main
                    .spawn(move || {
                        l_a.borrow_mut().push("a1");
                        e_a.yield_now();
                        l_a.borrow_mut().push("a2");
                    })
                    .unwrap();
                e_main.yield_now();
                l_main.borrow_mut().push("m2");
            },
        )
        .unwrap();

        assert_eq!(*log.borrow(), vec!["m1", "a1", "m2", "a2"]);
    }

    #[test]
    fn test_non_yielding_routine_runs_atomically() {
        let e = engine();
        let log: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

        let e_main = e.clone();
        let l_main = log.clone();
        e.start(
            || {},
            move || {
                for tag in [1u32, 2] {
                    let l = l_main.clone();
                    e_main
                        .spawn(move || {
                            for _ in 0..3 {
                                l.borrow_mut().push(tag);
                            }
                        })
                        .unwrap();
                }
            },
        )
        .unwrap();

        // routine 2 was spawned last, sits at the head, and runs first;
        // neither interleaves with the other
        assert_eq!(*log.borrow(), vec![2, 2, 2, 1, 1, 1]);
    }

    #[test]
    fn test_fresh_routine_finishes_before_yielder_resumes() {
        let e = engine();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let e_main = e.clone();
        let l_main = log.clone();
        e.start(
            || {},
            move || {
                let e_a = e_main.clone();
                let l_a = l_main.clone();
                e_main
                    .spawn(move || {
                        l_a.borrow_mut().push("a1");
                        e_a.yield_now();
                        l_a.borrow_mut().push("a2");
                    })
                    .unwrap();
                let l_b = l_main.clone();
                e_main
                    .spawn(move || {
                        l_b.borrow_mut().push("b");
                    })
                    .unwrap();
            },
        )
        .unwrap();

        // B (never yields, spawned last) completes before A even starts;
        // A's own yield is a no-op once it is the only alive routine
        assert_eq!(*log.borrow(), vec!["b", "a1", "a2"]);
    }

    #[test]
    fn test_block_until_wake_with_events() {
        let e = engine();
        let handle = Rc::new(Cell::new(RoutineId::NONE));
        let observed = Rc::new(Cell::new(0u32));
        let idle_calls = Rc::new(Cell::new(0u32));

        let e_idle = e.clone();
        let h_idle = handle.clone();
        let ic = idle_calls.clone();
        let e_main = e.clone();
        let h_main = handle.clone();
        let o_main = observed.clone();
        e.start(
            move || {
                // simulated reactor: deliver READABLE to the blocked routine
                ic.set(ic.get() + 1);
                e_idle.wake_with_events(h_idle.get(), 0x1);
            },
            move || {
                h_main.set(e_main.current());
                e_main.block();
                o_main.set(e_main.events());
            },
        )
        .unwrap();

        assert_eq!(observed.get(), 0x1);
        assert_eq!(idle_calls.get(), 1);
    }

    #[test]
    fn test_block_clears_stale_events() {
        let e = engine();
        let handle = Rc::new(Cell::new(RoutineId::NONE));
        let seen: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

        let e_idle = e.clone();
        let h_idle = handle.clone();
        let mut first = true;
        let e_main = e.clone();
        let h_main = handle.clone();
        let s_main = seen.clone();
        e.start(
            move || {
                if first {
                    e_idle.wake_with_events(h_idle.get(), 0x4);
                    first = false;
                } else {
                    // plain wake: no event bits this time
                    e_idle.wake(h_idle.get());
                }
            },
            move || {
                h_main.set(e_main.current());
                e_main.block();
                s_main.borrow_mut().push(e_main.events());
                // second block must not carry the 0x4 over
                e_main.block();
                s_main.borrow_mut().push(e_main.events());
            },
        )
        .unwrap();

        assert_eq!(*seen.borrow(), vec![0x4, 0]);
    }

    #[test]
    fn test_wake_all_empties_blocked() {
        let e = engine();
        let resumed = Rc::new(Cell::new(0u32));
        let idle_calls = Rc::new(Cell::new(0u32));

        let e_idle = e.clone();
        let ic = idle_calls.clone();
        let e_main = e.clone();
        let r_main = resumed.clone();
        e.start(
            move || {
                ic.set(ic.get() + 1);
                assert!(e_idle.is_all_blocked());
                e_idle.wake_all();
                assert_eq!(e_idle.blocked_count(), 0);
            },
            move || {
                for _ in 0..3 {
                    let e_r = e_main.clone();
                    let r = r_main.clone();
                    e_main
                        .spawn(move || {
                            e_r.block();
                            r.set(r.get() + 1);
                        })
                        .unwrap();
                }
            },
        )
        .unwrap();

        assert_eq!(resumed.get(), 3);
        assert_eq!(idle_calls.get(), 1);
    }

    #[test]
    fn test_double_wake_is_noop() {
        let e = engine();
        let handle = Rc::new(Cell::new(RoutineId::NONE));
        let resumes = Rc::new(Cell::new(0u32));

        let e_idle = e.clone();
        let h_idle = handle.clone();
        let e_main = e.clone();
        let h_main = handle.clone();
        let r_main = resumes.clone();
        e.start(
            move || {
                // second wake on an already-alive routine must be a no-op
                e_idle.wake_with_events(h_idle.get(), 0x1);
                e_idle.wake_with_events(h_idle.get(), 0x1);
                // so must waking an id that names no routine
                e_idle.wake(RoutineId::new(999));
            },
            move || {
                h_main.set(e_main.current());
                e_main.block();
                r_main.set(r_main.get() + 1);
            },
        )
        .unwrap();

        assert_eq!(resumes.get(), 1);
    }

    #[test]
    fn test_sched_direct_handoff() {
        let e = engine();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let e_main = e.clone();
        let l_main = log.clone();
        e.start(
            || {},
            move || {
                let e_a = e_main.clone();
                let l_a = l_main.clone();
                let a = e_main
                    .spawn(move || {
                        l_a.borrow_mut().push("a");
                        e_a.yield_now();
                        l_a.borrow_mut().push("a-again");
                    })
                    .unwrap();
                let l_b = l_main.clone();
                e_main
                    .spawn(move || {
                        l_b.borrow_mut().push("b");
                    })
                    .unwrap();
                // bypass the head (b) and hand off to a directly
                e_main.sched(Some(a));
                l_main.borrow_mut().push("m");
                // sched(None) mid-routine is a no-op
                e_main.sched(None);
                l_main.borrow_mut().push("m2");
            },
        )
        .unwrap();

        // b (alive head) runs when a yields; a's tail runs before the
        // scheduler comes back around to main
        assert_eq!(
            *log.borrow(),
            vec!["a", "b", "a-again", "m", "m2"]
        );
    }

    #[test]
    fn test_snapshot_buffer_grows_only() {
        fn deepen(e: &Engine, depth: usize) {
            if depth == 0 {
                e.yield_now();
            } else {
                let pad = std::hint::black_box([0u8; 128]);
                deepen(e, depth - 1);
                std::hint::black_box(pad);
            }
        }

        let e = engine();
        let sizes: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));

        let e_main = e.clone();
        let s_main = sizes.clone();
        e.start(
            || {},
            move || {
                let e_r = e_main.clone();
                let r = e_main
                    .spawn(move || {
                        // deep suspension first, then shallow ones
                        deepen(&e_r, 8);
                        e_r.yield_now();
                        e_r.yield_now();
                    })
                    .unwrap();
                for _ in 0..3 {
                    e_main.yield_now();
                    let len = unsafe {
                        (*e_main.inner())
                            .arena
                            .get(r)
                            .map(|ctx| ctx.image.buf_len())
                            .unwrap_or(0)
                    };
                    s_main.borrow_mut().push(len);
                }
            },
        )
        .unwrap();

        let sizes = sizes.borrow();
        assert!(sizes[0] > 0);
        // buffer never shrinks across suspend/resume cycles
        assert!(sizes.windows(2).all(|w| w[1] >= w[0]));
        // the shallow suspensions did not grow it past the deep one
        assert_eq!(sizes[0], *sizes.iter().max().unwrap());
    }

    #[test]
    fn test_lists_disjoint_under_mixed_ops() {
        let e = engine();
        let e_main = e.clone();
        let checks = Rc::new(Cell::new(0u32));
        let c_main = checks.clone();
        e.start(
            || {},
            move || {
                let e_a = e_main.clone();
                e_main.spawn(move || e_a.block()).unwrap();
                let e_b = e_main.clone();
                e_main.spawn(move || e_b.block()).unwrap();
                // both spawned routines run, block, and control comes back
                e_main.yield_now();
                assert_eq!(e_main.blocked_count(), 2);
                assert_eq!(e_main.alive_count(), 1);
                c_main.set(c_main.get() + 1);
                e_main.wake_all();
                assert_eq!(e_main.blocked_count(), 0);
                assert_eq!(e_main.alive_count(), 3);
                c_main.set(c_main.get() + 1);
            },
        )
        .unwrap();
        assert_eq!(checks.get(), 2);
        assert_eq!(e.alive_count() + e.blocked_count(), 0);
    }
}
