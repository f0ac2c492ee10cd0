//! Resource membership bookkeeping guarded by the pool lock
//!
//! Everything in here is plain single-threaded data manipulation. The pool
//! wraps a `PoolState` in one mutex and layers the wait/notify protocol on
//! top of the transitions defined here.

use std::collections::HashMap;
use std::sync::Arc;

/// Identity of a tracked resource: the address of its `Arc` allocation.
///
/// The pool holds a clone of every tracked `Arc`, so the address cannot be
/// reused by another allocation while the key is in any set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResourceKey(usize);

impl ResourceKey {
    pub fn of<R: ?Sized>(resource: &Arc<R>) -> Self {
        Self(Arc::as_ptr(resource) as *const () as usize)
    }
}

/// A busy resource somebody is blocked in `remove` for.
#[derive(Debug, Clone, Copy)]
struct PendingRemoval {
    generation: u64,
    waiters: usize,
}

/// Ticket handed to a `remove` caller while it waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RemovalTicket {
    key: ResourceKey,
    generation: u64,
}

/// What happened to a resource handed back through `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// Back in the available set.
    Returned,
    /// It was pending removal, so it left the pool instead.
    Dropped,
    /// The resource was not busy.
    NotBusy,
}

/// Result of a non-blocking eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Eviction {
    pub removed: bool,
    pub cancelled_pending: bool,
}

pub(crate) struct PoolState<R: ?Sized> {
    pub open: bool,
    available: HashMap<ResourceKey, Arc<R>>,
    busy: HashMap<ResourceKey, Arc<R>>,
    pending_removal: HashMap<ResourceKey, PendingRemoval>,
    pub waiting_acquirers: usize,
    next_generation: u64,
}

impl<R: ?Sized> PoolState<R> {
    pub fn new(open: bool) -> Self {
        Self {
            open,
            available: HashMap::new(),
            busy: HashMap::new(),
            pending_removal: HashMap::new(),
            waiting_acquirers: 0,
            next_generation: 0,
        }
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    pub fn busy_len(&self) -> usize {
        self.busy.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_removal.len()
    }

    pub fn is_available(&self, key: ResourceKey) -> bool {
        self.available.contains_key(&key)
    }

    pub fn is_busy(&self, key: ResourceKey) -> bool {
        self.busy.contains_key(&key)
    }

    /// Move an arbitrary available resource into the busy set.
    pub fn take_available(&mut self) -> Option<Arc<R>> {
        let key = *self.available.keys().next()?;
        let resource = self.available.remove(&key)?;
        self.busy.insert(key, Arc::clone(&resource));
        Some(resource)
    }

    /// Insert into the available set. Returns false when already available.
    ///
    /// Callers must reject busy resources first.
    pub fn insert_available(&mut self, resource: Arc<R>) -> bool {
        let key = ResourceKey::of(&resource);
        debug_assert!(!self.busy.contains_key(&key));
        if self.available.contains_key(&key) {
            return false;
        }
        self.available.insert(key, resource);
        true
    }

    pub fn remove_available(&mut self, key: ResourceKey) -> bool {
        self.available.remove(&key).is_some()
    }

    pub fn release(&mut self, key: ResourceKey) -> ReleaseOutcome {
        let Some(resource) = self.busy.remove(&key) else {
            return ReleaseOutcome::NotBusy;
        };
        if self.pending_removal.remove(&key).is_some() {
            ReleaseOutcome::Dropped
        } else {
            self.available.insert(key, resource);
            ReleaseOutcome::Returned
        }
    }

    /// Register a `remove` waiter for a busy resource.
    ///
    /// Concurrent removers of the same resource share one pending entry.
    pub fn mark_pending(&mut self, key: ResourceKey) -> RemovalTicket {
        debug_assert!(self.busy.contains_key(&key));
        let next_generation = &mut self.next_generation;
        let entry = self.pending_removal.entry(key).or_insert_with(|| {
            *next_generation += 1;
            PendingRemoval {
                generation: *next_generation,
                waiters: 0,
            }
        });
        entry.waiters += 1;
        RemovalTicket {
            key,
            generation: entry.generation,
        }
    }

    /// Whether the removal a ticket waits for is still outstanding.
    pub fn is_pending(&self, ticket: RemovalTicket) -> bool {
        self.pending_removal
            .get(&ticket.key)
            .is_some_and(|pending| pending.generation == ticket.generation)
    }

    /// Withdraw a waiter that gives up. The entry disappears with its last waiter.
    pub fn withdraw_pending(&mut self, ticket: RemovalTicket) {
        if let Some(pending) = self.pending_removal.get_mut(&ticket.key)
            && pending.generation == ticket.generation
        {
            pending.waiters -= 1;
            if pending.waiters == 0 {
                self.pending_removal.remove(&ticket.key);
            }
        }
    }

    /// Remove a resource from whichever set holds it, without waiting.
    pub fn evict(&mut self, key: ResourceKey) -> Eviction {
        if self.available.remove(&key).is_some() {
            return Eviction {
                removed: true,
                cancelled_pending: false,
            };
        }
        let cancelled_pending = self.pending_removal.remove(&key).is_some();
        let removed = self.busy.remove(&key).is_some();
        Eviction {
            removed,
            cancelled_pending,
        }
    }

    pub fn clear(&mut self) {
        self.available.clear();
        self.busy.clear();
        self.pending_removal.clear();
    }

    /// Available and busy are disjoint, and pending removal is a subset of busy.
    pub fn invariants_hold(&self) -> bool {
        self.available.keys().all(|key| !self.busy.contains_key(key))
            && self
                .pending_removal
                .keys()
                .all(|key| self.busy.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(resources: &[Arc<String>]) -> PoolState<String> {
        let mut state = PoolState::new(true);
        for resource in resources {
            state.insert_available(Arc::clone(resource));
        }
        state
    }

    #[test]
    fn test_identity_ignores_value_equality() {
        let a = Arc::new("same".to_string());
        let b = Arc::new("same".to_string());
        let mut state = state_with(&[Arc::clone(&a)]);

        assert!(state.insert_available(Arc::clone(&b)));
        assert!(!state.insert_available(Arc::clone(&a)));
        assert_eq!(state.available_len(), 2);
        assert_ne!(ResourceKey::of(&a), ResourceKey::of(&b));
        assert_eq!(ResourceKey::of(&a), ResourceKey::of(&Arc::clone(&a)));
    }

    #[test]
    fn test_take_then_release_returns_to_available() {
        let a = Arc::new("A".to_string());
        let mut state = state_with(&[Arc::clone(&a)]);

        let taken = state.take_available().unwrap();
        assert!(Arc::ptr_eq(&taken, &a));
        assert!(state.is_busy(ResourceKey::of(&a)));
        assert!(state.take_available().is_none());
        assert!(state.invariants_hold());

        assert_eq!(state.release(ResourceKey::of(&a)), ReleaseOutcome::Returned);
        assert!(state.is_available(ResourceKey::of(&a)));
        assert_eq!(state.busy_len(), 0);
        assert_eq!(state.release(ResourceKey::of(&a)), ReleaseOutcome::NotBusy);
    }

    #[test]
    fn test_pending_resource_is_dropped_on_release() {
        let a = Arc::new("A".to_string());
        let mut state = state_with(&[Arc::clone(&a)]);
        let key = ResourceKey::of(&a);
        state.take_available();

        let first = state.mark_pending(key);
        let second = state.mark_pending(key);
        assert_eq!(first, second);
        assert_eq!(state.pending_len(), 1);
        assert!(state.invariants_hold());

        assert_eq!(state.release(key), ReleaseOutcome::Dropped);
        assert!(!state.is_pending(first));
        assert_eq!(state.available_len() + state.busy_len(), 0);
    }

    #[test]
    fn test_withdraw_keeps_entry_until_last_waiter() {
        let a = Arc::new("A".to_string());
        let mut state = state_with(&[Arc::clone(&a)]);
        let key = ResourceKey::of(&a);
        state.take_available();

        let first = state.mark_pending(key);
        let second = state.mark_pending(key);
        state.withdraw_pending(first);
        assert!(state.is_pending(second));
        state.withdraw_pending(second);
        assert!(!state.is_pending(second));

        assert_eq!(state.release(key), ReleaseOutcome::Returned);
    }

    #[test]
    fn test_stale_ticket_does_not_match_new_removal() {
        let a = Arc::new("A".to_string());
        let mut state = state_with(&[Arc::clone(&a)]);
        let key = ResourceKey::of(&a);

        state.take_available();
        let old = state.mark_pending(key);
        state.release(key);

        state.insert_available(Arc::clone(&a));
        state.take_available();
        let new = state.mark_pending(key);

        assert!(!state.is_pending(old));
        assert!(state.is_pending(new));
        state.withdraw_pending(old);
        assert!(state.is_pending(new));
    }

    #[test]
    fn test_evict_busy_cancels_pending() {
        let a = Arc::new("A".to_string());
        let mut state = state_with(&[Arc::clone(&a)]);
        let key = ResourceKey::of(&a);
        state.take_available();
        let ticket = state.mark_pending(key);

        let eviction = state.evict(key);
        assert!(eviction.removed);
        assert!(eviction.cancelled_pending);
        assert!(!state.is_pending(ticket));
        assert_eq!(state.evict(key), Eviction::default());
        assert!(state.invariants_hold());
    }

    #[test]
    fn test_clear_drops_everything() {
        let a = Arc::new("A".to_string());
        let b = Arc::new("B".to_string());
        let mut state = state_with(&[Arc::clone(&a), Arc::clone(&b)]);
        let busy = state.take_available().unwrap();
        state.mark_pending(ResourceKey::of(&busy));

        state.clear();
        assert_eq!(state.available_len(), 0);
        assert_eq!(state.busy_len(), 0);
        assert_eq!(state.pending_len(), 0);
    }
}
