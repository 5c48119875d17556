//! Routine handles

use core::fmt;

/// Opaque handle to a routine: a slot index into the engine's context
/// arena, packed into a u32.
///
/// `u32::MAX` is reserved. It stands for "no routine" and doubles as the
/// terminator of the intrusive scheduling lists, so the engine's slot cap
/// must stay below it (the config validator enforces this). A handle stays
/// valid until its routine finishes; after that the slot can be reissued.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RoutineId(u32);

impl RoutineId {
    /// The "no routine" sentinel and list terminator.
    pub const NONE: RoutineId = RoutineId(u32::MAX);

    #[inline]
    pub const fn new(id: u32) -> Self {
        RoutineId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Slot index form, for arena lookups.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }
}

impl From<u32> for RoutineId {
    #[inline]
    fn from(id: u32) -> Self {
        RoutineId(id)
    }
}

impl From<RoutineId> for u32 {
    #[inline]
    fn from(id: RoutineId) -> Self {
        id.0
    }
}

impl fmt::Debug for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "RoutineId(NONE)")
        } else {
            write!(f, "RoutineId({})", self.0)
        }
    }
}

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for RoutineId {
    fn default() -> Self {
        RoutineId::NONE
    }
}
