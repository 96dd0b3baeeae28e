use crate::spider::Request;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Request identities already claimed for fetching in this run
///
/// The lock is only held for a single lookup or insert.
#[derive(Debug, Default)]
pub struct VisitedSet {
    visited: Mutex<HashMap<String, bool>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically checks and sets the request's visited flag
    ///
    /// Returns `true` only for the first caller with a given identity.
    pub fn mark_if_unvisited(&self, req: &Request) -> bool {
        let mut visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
        match visited.insert(req.fingerprint(), true) {
            Some(was_visited) => !was_visited,
            None => true,
        }
    }

    pub fn contains(&self, req: &Request) -> bool {
        let visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
        visited.get(&req.fingerprint()).copied().unwrap_or(false)
    }

    /// Clears the flag so the request can be fetched again
    pub(crate) fn unmark(&self, req: &Request) {
        let mut visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
        visited.remove(&req.fingerprint());
    }

    pub fn len(&self) -> usize {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
