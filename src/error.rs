//! # Error Types
//!
//! This module defines the error type shared by the whole crate. Every
//! fallible operation in the evolution core returns [`Result`], and the
//! variants of [`PelagoError`] map one-to-one onto the failure classes of
//! the runtime: argument validation, arithmetic overflow, failures captured
//! inside asynchronous evolve tasks, threading-primitive failures and
//! archive problems.
//!
//! ## Examples
//!
//! ```rust
//! use pelago::error::{PelagoError, Result};
//!
//! fn check_len(dvs: &[f64], nx: usize) -> Result<()> {
//!     if dvs.len() % nx != 0 {
//!         return Err(PelagoError::InvalidArgument(format!(
//!             "batch length {} is not a multiple of the problem dimension {}",
//!             dvs.len(),
//!             nx
//!         )));
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::PoisonError;

use thiserror::Error;

/// Represents errors that can occur in the asynchronous evolution core.
///
/// Errors raised synchronously are returned to the caller directly. Errors
/// raised inside an evolve task are captured in the task's completion
/// handle, wrapped in [`PelagoError::Task`], and surfaced by the next call
/// to `Island::wait`.
#[derive(Error, Debug)]
pub enum PelagoError {
    /// A dimension mismatch, a missing capability on a problem, or a
    /// weaker-than-required thread-safety tier.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Batch-size arithmetic would exceed the index range.
    #[error("overflow: {0}")]
    Overflow(String),

    /// An asynchronous evolve task failed; carries the original error.
    #[error("evolve task failed: {0}")]
    Task(#[source] Box<PelagoError>),

    /// A threading primitive failed (poisoned lock, dead worker thread).
    /// Fatal when encountered while an island is being torn down.
    #[error("system error: {0}")]
    System(String),

    /// An archive could not be written or read, or a plugin type is not
    /// registered for deserialization.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An optional capability was invoked on an object that does not
    /// provide it.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

impl PelagoError {
    /// Wraps `self` as the payload of a failed task.
    ///
    /// Used by the task queue when a submitted closure returns an error;
    /// `Island::wait` reports the wrapped error as-is.
    pub(crate) fn into_task_error(self) -> PelagoError {
        match self {
            // A task that fails while joining a nested task already
            // carries the original payload.
            PelagoError::Task(_) => self,
            other => PelagoError::Task(Box::new(other)),
        }
    }

    /// Returns `true` for errors that indicate a threading-primitive
    /// failure rather than an ordinary task outcome.
    pub fn is_system(&self) -> bool {
        matches!(self, PelagoError::System(_))
    }
}

impl<T> From<PoisonError<T>> for PelagoError {
    fn from(err: PoisonError<T>) -> Self {
        PelagoError::System(format!("poisoned lock: {err}"))
    }
}

impl From<serde_json::Error> for PelagoError {
    fn from(err: serde_json::Error) -> Self {
        PelagoError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for evolution-core operations.
pub type Result<T> = std::result::Result<T, PelagoError>;
