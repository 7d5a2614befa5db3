//! Association slots.
//!
//! A [`Slot`] caches the resolved value of one association (or async computed
//! field) on one entity. Its state is explicit: a slot is either
//! [`SlotState::Unresolved`] or [`SlotState::Resolved`], never an implicit
//! "missing" value, so a resolved `None` for a nullable association is
//! distinguishable from "not loaded yet".
//!
//! ```rust
//! use kinship_runtime::Slot;
//!
//! let slot: Slot<Option<i64>> = Slot::new();
//! assert!(!slot.is_resolved());
//!
//! slot.set(None);
//! assert!(slot.is_resolved());
//! assert_eq!(slot.get(), Some(None));
//! ```

use std::fmt;

use parking_lot::Mutex;

/// State of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState<T> {
    /// Not yet loaded.
    #[default]
    Unresolved,
    /// Loaded.
    Resolved(T),
}

impl<T> SlotState<T> {
    /// Check if resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// A cache cell shared by sibling entities.
///
/// Writes only happen while the relation's lock is held; the inner mutex is
/// never held across an await point. State and epoch change together.
pub struct Slot<T> {
    inner: Mutex<SlotInner<T>>,
}

struct SlotInner<T> {
    state: SlotState<T>,
    epoch: u64,
}

impl<T> Slot<T> {
    /// Create a new unresolved slot.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Unresolved,
                epoch: 0,
            }),
        }
    }

    /// Create a slot that is already resolved.
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: SlotState::Resolved(value),
                epoch: 1,
            }),
        }
    }

    /// Check if the slot has been resolved.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.inner.lock().state.is_resolved()
    }

    /// Resolve the slot, replacing any previous value.
    ///
    /// Each call starts a new epoch.
    pub fn set(&self, value: T) {
        let mut inner = self.inner.lock();
        inner.state = SlotState::Resolved(value);
        inner.epoch += 1;
    }

    /// Return to the unresolved state so the next access loads again.
    pub fn reset(&self) {
        self.inner.lock().state = SlotState::Unresolved;
    }

    /// Number of times this slot has been resolved.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }
}

impl<T: Clone> Slot<T> {
    /// Get the resolved value, if any.
    pub fn get(&self) -> Option<T> {
        match &self.inner.lock().state {
            SlotState::Resolved(value) => Some(value.clone()),
            SlotState::Unresolved => None,
        }
    }

    /// Snapshot the current state.
    pub fn state(&self) -> SlotState<T> {
        self.inner.lock().state.clone()
    }

    /// Snapshot the current state together with the epoch that produced it.
    pub fn versioned(&self) -> (SlotState<T>, u64) {
        let inner = self.inner.lock();
        (inner.state.clone(), inner.epoch)
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.lock().state {
            SlotState::Resolved(value) => f
                .debug_struct("Slot")
                .field("state", &"Resolved")
                .field("value", value)
                .finish(),
            SlotState::Unresolved => f.debug_struct("Slot").field("state", &"Unresolved").finish(),
        }
    }
}
