use crate::spider::Request;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Requests whose fetch has failed at least once
///
/// Guarded separately from the visited set. Recording is idempotent, which is
/// what bounds retries to one per identity.
#[derive(Debug, Default)]
pub struct FailureSet {
    failures: Mutex<HashMap<String, Request>>,
}

impl FailureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure, returning `true` if it is the first for this identity
    pub fn record(&self, req: &Request) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let key = req.fingerprint();
        if failures.contains_key(&key) {
            return false;
        }
        failures.insert(key, req.clone());
        true
    }

    pub fn contains(&self, req: &Request) -> bool {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&req.fingerprint())
    }

    /// URLs of every failed request, sorted
    pub fn urls(&self) -> Vec<String> {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let mut urls: Vec<String> = failures.values().map(|req| req.url.clone()).collect();
        urls.sort();
        urls
    }

    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_idempotent() {
        let failures = FailureSet::new();
        let req = Request::new("https://example.com/broken", "page");

        assert!(failures.record(&req));
        assert!(!failures.record(&req));
        assert!(!failures.record(&req.clone().with_depth(2)));
        assert!(failures.contains(&req));
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_urls_sorted() {
        let failures = FailureSet::new();
        failures.record(&Request::new("https://example.com/b", "page"));
        failures.record(&Request::new("https://example.com/a", "page"));

        assert_eq!(
            failures.urls(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }
}
