//! Routine contexts, stack snapshots, and the scheduling lists
//!
//! A `Context` is the engine's saved representation of one suspended routine:
//! its jump point, a snapshot of the stack region it occupied, its links into
//! the scheduling lists, and the event bits delivered at its last wake.
//!
//! Contexts live in a `ContextArena` and are addressed by stable `RoutineId`
//! slot indices; list membership is an explicit tag plus prev/next indices,
//! so nodes moving between lists can never leave a dangling pointer behind.

use crate::current_arch::JumpPoint;
use costack_core::{EngineError, EngineResult, RoutineId};

/// A captured copy of one routine's live stack region.
///
/// The buffer is grow-only: it is reallocated only when a larger extent is
/// captured and never shrinks, amortizing allocation across the many
/// suspend/resume cycles of a long-lived routine.
pub struct StackImage {
    low: usize,
    high: usize,
    buf: Vec<u8>,
    used: usize,
}

impl StackImage {
    pub const fn new() -> Self {
        Self {
            low: 0,
            high: 0,
            buf: Vec::new(),
            used: 0,
        }
    }

    /// Lowest address of the captured span.
    #[inline]
    pub fn low(&self) -> usize {
        self.low
    }

    /// Highest address of the captured span.
    #[inline]
    pub fn high(&self) -> usize {
        self.high
    }

    /// Bytes captured at the last suspension.
    #[inline]
    pub fn captured_len(&self) -> usize {
        self.used
    }

    /// Current buffer size (high-water mark, never shrinks).
    #[inline]
    pub fn buf_len(&self) -> usize {
        self.buf.len()
    }

    /// Copy the live stack bytes between `a` and `b` into the buffer.
    ///
    /// The two bounds may come in either order; on the downward-growing
    /// stacks of both supported architectures the current frame mark is the
    /// lower one.
    ///
    /// # Safety
    ///
    /// The span between `a` and `b` must be readable stack memory of the
    /// calling thread.
    pub unsafe fn capture(&mut self, a: usize, b: usize) {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let len = high - low;
        if len > self.buf.len() {
            self.buf.resize(len, 0);
        }
        core::ptr::copy_nonoverlapping(low as *const u8, self.buf.as_mut_ptr(), len);
        self.low = low;
        self.high = high;
        self.used = len;
    }

    /// Copy the captured bytes back to their original stack addresses.
    ///
    /// # Safety
    ///
    /// The caller's own active frame must lie entirely outside the captured
    /// span; the engine guarantees this by digging deeper first (see
    /// `engine::dig_and_resume`).
    pub unsafe fn paste(&self) {
        core::ptr::copy_nonoverlapping(self.buf.as_ptr(), self.low as *mut u8, self.used);
    }

    /// Drop the buffer (engine teardown).
    pub fn release(&mut self) {
        self.buf = Vec::new();
        self.used = 0;
        self.low = 0;
        self.high = 0;
    }
}

impl Default for StackImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Which scheduling list a context is linked into.
///
/// The tag is the blocked flag: membership and flag are one field and cannot
/// drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTag {
    /// Ready to be scheduled (suspended-but-runnable routines included)
    Alive,
    /// Waiting for a wake (I/O readiness, shutdown)
    Blocked,
}

/// One suspended or running routine.
pub struct Context {
    /// Saved register/program-counter state at the last suspension
    pub point: JumpPoint,
    /// Stack bytes the routine occupied at the last suspension
    pub image: StackImage,
    /// Link to the previous node of the owning list
    pub prev: RoutineId,
    /// Link to the next node of the owning list
    pub next: RoutineId,
    /// Which list the links belong to
    pub list: ListTag,
    /// Readiness bits delivered at the last wake; valid only while the
    /// routine is running after that wake
    pub events: u32,
    /// Routine body, taken exactly once at first entry
    pub entry: Option<Box<dyn FnOnce()>>,
}

impl Context {
    pub fn new(entry: Box<dyn FnOnce()>) -> Self {
        Self {
            point: JumpPoint::new(),
            image: StackImage::new(),
            prev: RoutineId::NONE,
            next: RoutineId::NONE,
            list: ListTag::Alive,
            events: 0,
            entry: Some(entry),
        }
    }
}

/// Slab of routine contexts with a LIFO free list.
///
/// Slot ids are stable for the lifetime of the routine; freed slots are
/// reused most-recently-freed-first.
pub struct ContextArena {
    slots: Vec<Option<Box<Context>>>,
    free: Vec<u32>,
    max_slots: usize,
    live: usize,
}

impl ContextArena {
    pub fn new(max_slots: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            max_slots,
            live: 0,
        }
    }

    /// Insert a context, returning its slot id.
    pub fn insert(&mut self, ctx: Context) -> EngineResult<RoutineId> {
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(Box::new(ctx));
                idx
            }
            None => {
                if self.slots.len() >= self.max_slots {
                    return Err(EngineError::RoutineLimit);
                }
                self.slots.push(Some(Box::new(ctx)));
                (self.slots.len() - 1) as u32
            }
        };
        self.live += 1;
        Ok(RoutineId::new(idx))
    }

    /// Remove a context, freeing its slot for reuse.
    pub fn remove(&mut self, id: RoutineId) -> Option<Box<Context>> {
        let slot = self.slots.get_mut(id.as_usize())?;
        let ctx = slot.take()?;
        self.free.push(id.as_u32());
        self.live -= 1;
        Some(ctx)
    }

    pub fn get(&self, id: RoutineId) -> Option<&Context> {
        self.slots.get(id.as_usize())?.as_deref()
    }

    pub fn get_mut(&mut self, id: RoutineId) -> Option<&mut Context> {
        self.slots.get_mut(id.as_usize())?.as_deref_mut()
    }

    /// Raw pointer to a context that must exist.
    ///
    /// The Box keeps the pointee address stable even if the slot vector
    /// reallocates while the pointer is held across a switch.
    pub fn ptr(&mut self, id: RoutineId) -> *mut Context {
        let ctx = self
            .get_mut(id)
            .expect("scheduling list referenced a missing routine slot");
        ctx as *mut Context
    }

    /// Number of live contexts.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// The two intrusive scheduling lists, stored as head indices.
///
/// Every live context is linked into exactly one of the two; the idle
/// context is not a `Context` at all and can never appear here.
pub struct RunLists {
    pub alive: RoutineId,
    pub blocked: RoutineId,
}

impl RunLists {
    pub const fn new() -> Self {
        Self {
            alive: RoutineId::NONE,
            blocked: RoutineId::NONE,
        }
    }

    fn head_mut(&mut self, tag: ListTag) -> &mut RoutineId {
        match tag {
            ListTag::Alive => &mut self.alive,
            ListTag::Blocked => &mut self.blocked,
        }
    }

    /// Link `id` at the head of the given list.
    ///
    /// The context must not currently be linked anywhere.
    pub fn push(&mut self, arena: &mut ContextArena, tag: ListTag, id: RoutineId) {
        let old_head = *self.head_mut(tag);
        {
            let ctx = arena
                .get_mut(id)
                .expect("push on a missing routine slot");
            ctx.prev = RoutineId::NONE;
            ctx.next = old_head;
            ctx.list = tag;
        }
        if old_head.is_some() {
            let head = arena
                .get_mut(old_head)
                .expect("list head slot missing");
            head.prev = id;
        }
        *self.head_mut(tag) = id;
    }

    /// Unlink `id` from whichever list its tag names.
    pub fn unlink(&mut self, arena: &mut ContextArena, id: RoutineId) {
        let (tag, prev, next) = {
            let ctx = arena
                .get_mut(id)
                .expect("unlink on a missing routine slot");
            let triple = (ctx.list, ctx.prev, ctx.next);
            ctx.prev = RoutineId::NONE;
            ctx.next = RoutineId::NONE;
            triple
        };
        if prev.is_some() {
            arena
                .get_mut(prev)
                .expect("list prev slot missing")
                .next = next;
        }
        if next.is_some() {
            arena
                .get_mut(next)
                .expect("list next slot missing")
                .prev = prev;
        }
        let head = self.head_mut(tag);
        if *head == id {
            *head = next;
        }
    }

    /// Move `id` to the other list (no-op if it is already there).
    pub fn transfer(&mut self, arena: &mut ContextArena, id: RoutineId, to: ListTag) {
        let from = match arena.get(id) {
            Some(ctx) => ctx.list,
            None => return,
        };
        if from == to {
            return;
        }
        self.unlink(arena, id);
        self.push(arena, to, id);
    }

    /// Walk one list, head first.
    pub fn collect(&self, arena: &ContextArena, tag: ListTag) -> Vec<RoutineId> {
        let mut out = Vec::new();
        let mut cur = match tag {
            ListTag::Alive => self.alive,
            ListTag::Blocked => self.blocked,
        };
        while cur.is_some() {
            out.push(cur);
            cur = match arena.get(cur) {
                Some(ctx) => ctx.next,
                None => RoutineId::NONE,
            };
        }
        out
    }

    /// Number of entries in one list.
    pub fn count(&self, arena: &ContextArena, tag: ListTag) -> usize {
        self.collect(arena, tag).len()
    }
}

impl Default for RunLists {
    fn default() -> Self {
        Self::new()
    }
}
