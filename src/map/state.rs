//! Latest-result holder for map renders.
//!
//! Each request takes a ticket before it starts. A finished request
//! publishes under its ticket and is accepted only if no request that
//! started later has already published. Readers always see a complete
//! snapshot.

use crate::models::LoadState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Identifies one request, ordered by start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Slot<T> {
    ticket: u64,
    state: LoadState<Arc<T>>,
}

/// Shared "last started request wins" state.
pub struct MapState<T> {
    next_ticket: AtomicU64,
    slot: RwLock<Slot<T>>,
}

impl<T> Default for MapState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MapState<T> {
    pub fn new() -> Self {
        Self {
            next_ticket: AtomicU64::new(1),
            slot: RwLock::new(Slot {
                ticket: 0,
                state: LoadState::NotLoaded,
            }),
        }
    }

    /// Take a ticket for a request that is about to start.
    pub fn begin(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::SeqCst))
    }

    /// Publish a finished request's result.
    ///
    /// Returns false, discarding the result, when a later request has
    /// already published.
    pub fn publish(&self, ticket: Ticket, state: LoadState<T>) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());

        if ticket.0 <= slot.ticket {
            debug!(
                "Discarding result of request {} (request {} already published)",
                ticket.0, slot.ticket
            );
            return false;
        }

        slot.ticket = ticket.0;
        slot.state = state.map(Arc::new);
        true
    }

    /// Snapshot of the latest published state.
    pub fn current(&self) -> LoadState<Arc<T>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).state.clone()
    }

    /// Ticket id of the latest published result, 0 if none.
    pub fn published_ticket(&self) -> u64 {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_starts_not_loaded() {
        let state: MapState<u32> = MapState::new();
        assert_eq!(state.current(), LoadState::NotLoaded);
        assert_eq!(state.published_ticket(), 0);
    }

    #[test]
    fn test_tickets_increase() {
        let state: MapState<u32> = MapState::new();
        let a = state.begin();
        let b = state.begin();
        assert!(a < b);
        assert_eq!(b.id(), a.id() + 1);
    }

    #[test]
    fn test_stale_result_discarded() {
        let state = MapState::new();
        let stale = state.begin();
        let fresh = state.begin();

        assert!(state.publish(fresh, LoadState::Loaded("fresh")));
        assert!(!state.publish(stale, LoadState::Loaded("stale")));
        assert_eq!(state.current(), LoadState::Loaded(Arc::new("fresh")));
    }

    #[test]
    fn test_in_order_results_replace() {
        let state = MapState::new();
        let first = state.begin();
        let second = state.begin();

        assert!(state.publish(first, LoadState::Loaded(1)));
        assert!(state.publish(second, LoadState::Failed("timeout".to_string())));
        assert_eq!(state.current(), LoadState::Failed("timeout".to_string()));
    }

    #[test]
    fn test_same_ticket_publishes_once() {
        let state = MapState::new();
        let ticket = state.begin();
        assert!(state.publish(ticket, LoadState::Loaded(1)));
        assert!(!state.publish(ticket, LoadState::Loaded(2)));
        assert_eq!(state.current(), LoadState::Loaded(Arc::new(1)));
    }

    #[test]
    fn test_concurrent_publish_keeps_newest() {
        let state = Arc::new(MapState::new());
        let tickets: Vec<Ticket> = (0..16).map(|_| state.begin()).collect();
        let newest = tickets.last().copied().unwrap();

        let handles: Vec<_> = tickets
            .into_iter()
            .rev()
            .map(|ticket| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    state.publish(ticket, LoadState::Loaded(vec![ticket.id(); 64]));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.published_ticket(), newest.id());
        let current = state.current();
        let data = current.loaded().unwrap();
        assert!(data.iter().all(|id| *id == newest.id()));
    }
}
