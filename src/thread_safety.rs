//! # Thread-Safety Tiers
//!
//! Plugin objects (problems, algorithms, batch evaluators) self-declare how
//! much concurrency they tolerate through the [`ThreadSafety`] tier. The
//! runtime adapts its strategy per call: a `Constant` problem is shared by
//! reference across worker threads, a `Basic` problem is cloned per worker,
//! and anything weaker is rejected for threaded evaluation.
//!
//! The tier is a construction-time property of each object. It is never
//! reduced at runtime, and all checks in the core are `>=` comparisons on
//! the derived ordering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Totally ordered thread-safety guarantee of a plugin object.
///
/// The ordering is `None < CopyOnly < Basic < Constant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreadSafety {
    /// Unsafe to even read concurrently.
    None,
    /// Safe to copy concurrently, but calls are not reentrant.
    CopyOnly,
    /// Multiple instances are usable from multiple threads; a single
    /// instance is not reentrant.
    Basic,
    /// A single instance is reentrantly callable from multiple threads.
    Constant,
}

impl fmt::Display for ThreadSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThreadSafety::None => "none",
            ThreadSafety::CopyOnly => "copy_only",
            ThreadSafety::Basic => "basic",
            ThreadSafety::Constant => "constant",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(ThreadSafety::None < ThreadSafety::CopyOnly);
        assert!(ThreadSafety::CopyOnly < ThreadSafety::Basic);
        assert!(ThreadSafety::Basic < ThreadSafety::Constant);
        assert!(ThreadSafety::Constant >= ThreadSafety::Basic);
        assert!(ThreadSafety::Basic >= ThreadSafety::Basic);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ThreadSafety::None.to_string(), "none");
        assert_eq!(ThreadSafety::CopyOnly.to_string(), "copy_only");
        assert_eq!(ThreadSafety::Basic.to_string(), "basic");
        assert_eq!(ThreadSafety::Constant.to_string(), "constant");
    }
}
