//! Transaction registry
//!
//! Tracks requests awaiting a reply, keyed by [`TransactionId`], and hands out
//! new ids. The registry is owned by one [`ClientProtocol`](crate::protocol::ClientProtocol)
//! and is never shared between connections.

use modbus_core::{IdMode, TransactionId};
use std::collections::HashMap;

/// Pending requests of one connection
///
/// `P` is the producer half of each request's deferred result. Retrieving an
/// entry removes it, so one id can satisfy at most one reply.
#[derive(Debug)]
pub struct TransactionRegistry<P> {
    pending: HashMap<TransactionId, P>,
    next_id: TransactionId,
    mode: IdMode,
}

impl<P> TransactionRegistry<P> {
    /// Create an empty registry
    pub fn new(mode: IdMode) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: TransactionId::FIRST,
            mode,
        }
    }

    pub fn mode(&self) -> IdMode {
        self.mode
    }

    /// Allocate the next transaction id
    ///
    /// Sequential ids start at 1, skip the reserved zero and wrap from
    /// `u16::MAX` back to 1. Implicit mode always yields the single slot.
    pub fn allocate(&mut self) -> TransactionId {
        match self.mode {
            IdMode::Sequential => {
                let id = self.next_id;
                self.next_id = id.next();
                id
            }
            IdMode::Implicit => TransactionId::IMPLICIT,
        }
    }

    /// The id the next call to [`allocate`](Self::allocate) will return
    pub fn peek_next(&self) -> TransactionId {
        match self.mode {
            IdMode::Sequential => self.next_id,
            IdMode::Implicit => TransactionId::IMPLICIT,
        }
    }

    /// Register a pending request
    ///
    /// An existing entry under the same id is replaced. The displaced entry is
    /// dropped without being resolved; this only happens when more requests
    /// are in flight than the id space can tell apart.
    pub fn add(&mut self, id: TransactionId, pending: P) {
        if self.pending.insert(id, pending).is_some() {
            log::warn!(
                "Transaction {} replaced while pending; its caller will not receive a reply",
                id
            );
        }
    }

    /// Take the pending request for `id`, if any
    pub fn get(&mut self, id: TransactionId) -> Option<P> {
        self.pending.remove(&id)
    }

    /// Remove a pending request without resolving it
    pub fn remove(&mut self, id: TransactionId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Snapshot of every pending id
    pub fn pending_ids(&self) -> Vec<TransactionId> {
        let mut ids: Vec<TransactionId> = self.pending.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Remove and return every pending request
    pub fn drain(&mut self) -> Vec<(TransactionId, P)> {
        self.pending.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
