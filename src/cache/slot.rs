use crate::error::Error;

use super::SlotFuture;

#[derive(Clone)]
pub(crate) enum Slot<V> {
    // a load has started and nobody has settled the slot yet
    Pending(SlotFuture<V>),
    Resolved(V),
    // poisoned, never retried unless cleared by the owner
    Failed(Error),
}

impl<V: Clone> Slot<V> {
    pub(crate) fn snapshot(&self) -> SlotState<V> {
        match self {
            Slot::Pending(_) => SlotState::Pending,
            Slot::Resolved(v) => SlotState::Resolved(v.clone()),
            Slot::Failed(e) => SlotState::Failed(e.clone()),
        }
    }
}

/// A point in time view of a single cache slot.
///
/// Unlike [`IdentityCache::peek`](super::IdentityCache::peek), this tells apart a key that was
/// never requested from one that is still loading or has failed.
#[derive(Debug, Clone)]
pub enum SlotState<V> {
    Absent,
    Pending,
    Resolved(V),
    Failed(Error),
}

impl<V> SlotState<V> {
    pub fn is_absent(&self) -> bool {
        matches!(self, SlotState::Absent)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, SlotState::Resolved(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SlotState::Failed(_))
    }

    pub fn value(self) -> Option<V> {
        match self {
            SlotState::Resolved(v) => Some(v),
            _ => None,
        }
    }
}
