//! Per-target single-slot bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::entities::ImageRequest;
use crate::domain::errors::Cancelled;
use crate::domain::ports::TargetId;

use super::request_delegate::RequestDelegate;

#[derive(Default)]
struct Slot {
    current: Option<Arc<RequestDelegate>>,
    detached: bool,
    parked: Option<ImageRequest>,
}

impl Slot {
    fn is_vacant(&self) -> bool {
        self.current.is_none() && !self.detached && self.parked.is_none()
    }
}

fn prune(slots: &mut HashMap<TargetId, Slot>, id: TargetId) {
    if slots.get(&id).is_some_and(Slot::is_vacant) {
        slots.remove(&id);
    }
}

/// Table of target slots, each holding at most one live attempt.
///
/// Delegates are disposed only after the table lock is released, so target
/// callbacks running under a delegate's delivery lock may safely enqueue
/// new requests. A slot stays in the table only while it has an occupant,
/// is detached or holds a parked request.
#[derive(Default)]
pub struct TargetSlots {
    slots: Mutex<HashMap<TargetId, Slot>>,
}

impl TargetSlots {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `delegate` the sole occupant of `id`, disposing the previous one
    /// before returning.
    ///
    /// # Errors
    /// Returns [`Cancelled`] if the target is detached. Its request is parked
    /// and restarted by [`TargetSlots::attach`].
    pub fn occupy(&self, id: TargetId, delegate: &Arc<RequestDelegate>) -> Result<(), Cancelled> {
        let previous = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(id).or_default();
            if slot.detached {
                slot.parked = Some(delegate.request().clone());
                return Err(Cancelled);
            }
            slot.current.replace(delegate.clone())
        };
        if let Some(previous) = previous {
            debug!(target_id = %id, attempt = %previous.attempt(), "Superseding request");
            previous.dispose();
        }
        Ok(())
    }

    /// Returns true if `delegate` currently occupies `id`.
    #[must_use]
    pub fn is_current(&self, id: TargetId, delegate: &Arc<RequestDelegate>) -> bool {
        self.slots
            .lock()
            .get(&id)
            .and_then(|slot| slot.current.as_ref())
            .is_some_and(|current| Arc::ptr_eq(current, delegate))
    }

    /// Disposes `delegate` and clears the slot if it still occupies `id`.
    pub fn dispose_if_current(&self, id: TargetId, delegate: &Arc<RequestDelegate>) -> bool {
        let current = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&id) else {
                return false;
            };
            let is_current = slot
                .current
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, delegate));
            let current = if is_current { slot.current.take() } else { None };
            prune(&mut slots, id);
            current
        };
        current.is_some_and(|current| {
            current.dispose();
            true
        })
    }

    /// Disposes whatever occupies `id` and remembers its request.
    ///
    /// Requests started while detached are parked instead of run.
    pub fn detach(&self, id: TargetId) -> bool {
        let current = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(id).or_default();
            slot.detached = true;
            let current = slot.current.take();
            if let Some(current) = &current {
                slot.parked = Some(current.request().clone());
            }
            current
        };
        match current {
            Some(current) => {
                debug!(target_id = %id, "Detached target");
                current.dispose();
                true
            }
            None => false,
        }
    }

    /// Re-attaches `id`, returning the request to restart if one was parked.
    pub fn attach(&self, id: TargetId) -> Option<ImageRequest> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&id)?;
        slot.detached = false;
        let parked = slot.parked.take();
        prune(&mut slots, id);
        parked
    }

    /// Clears the slot once `delegate`'s attempt has ended, unless a newer
    /// attempt took it over.
    pub fn release(&self, id: TargetId, delegate: &Arc<RequestDelegate>) {
        let released = {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.get_mut(&id) else {
                return;
            };
            let is_current = slot
                .current
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, delegate));
            let released = if is_current { slot.current.take() } else { None };
            prune(&mut slots, id);
            released
        };
        drop(released);
    }

    /// Disposes the occupant of `id` and drops all state kept for it,
    /// including a parked request and the detached flag.
    ///
    /// Returns true if the table knew the target.
    pub fn forget(&self, id: TargetId) -> bool {
        let Some(slot) = self.slots.lock().remove(&id) else {
            return false;
        };
        if let Some(current) = slot.current {
            debug!(target_id = %id, "Forgetting target");
            current.dispose();
        }
        true
    }

    /// Guard that releases `id` when dropped.
    pub(crate) fn lease(
        self: &Arc<Self>,
        id: TargetId,
        delegate: &Arc<RequestDelegate>,
    ) -> SlotLease {
        SlotLease {
            slots: self.clone(),
            id,
            delegate: delegate.clone(),
        }
    }

    /// Disposes every occupant and forgets all slots.
    pub fn dispose_all(&self) {
        let slots = std::mem::take(&mut *self.slots.lock());
        for current in slots.into_values().filter_map(|slot| slot.current) {
            current.dispose();
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.current.is_some())
            .count()
    }

    /// Number of targets the table keeps state for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Returns true if no target has state in the table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

/// Releases an attempt's slot when the attempt ends or its task is dropped.
pub(crate) struct SlotLease {
    slots: Arc<TargetSlots>,
    id: TargetId,
    delegate: Arc<RequestDelegate>,
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slots.release(self.id, &self.delegate);
    }
}

impl std::fmt::Debug for TargetSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSlots")
            .field("occupied", &self.occupied())
            .field("len", &self.len())
            .finish()
    }
}
