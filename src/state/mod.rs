//! Shared crawl state
//!
//! The only mutable structures shared between workers: the visited set, the
//! failure set (each behind its own lock) and lock-free run counters.

mod counters;
mod failures;
mod visited;

pub use counters::Counters;
pub use failures::FailureSet;
pub use visited::VisitedSet;
