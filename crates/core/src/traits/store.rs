//! The artifact-store seam.
//!
//! One artifact of each kind exists per account at a time; an epoch's
//! file simply replaces the previous epoch's. Readers get `None` when no
//! artifact has ever been written, and [`StoreError::Corrupt`] when one
//! exists but fails validation; corrupt artifacts are never silently
//! replaced.

use std::path::PathBuf;

use thiserror::Error;

use medianet_types::{CommitFile, DisputeFile, ProposeFile};

/// Failures of the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The artifact exists but violates its invariants.
    #[error("corrupt artifact {path}: {reason}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// First violation found.
        reason: String,
    },

    /// Another process holds the run lock.
    #[error("run lock already held: {0}")]
    Locked(PathBuf),

    /// The artifact could not be serialized.
    #[error("serialize: {0}")]
    Serialize(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for the three epoch artifacts.
pub trait Store: Send + Sync {
    /// Persist the commit artifact. Must be durable before the commit
    /// transaction is broadcast.
    fn write_commit(&self, file: &CommitFile) -> StoreResult<()>;

    /// Read back the commit artifact, validating it.
    fn read_commit(&self) -> StoreResult<Option<CommitFile>>;

    /// Persist the propose artifact. Must be durable before the propose
    /// transaction is broadcast.
    fn write_propose(&self, file: &ProposeFile) -> StoreResult<()>;

    /// Read back the propose artifact, validating it.
    fn read_propose(&self) -> StoreResult<Option<ProposeFile>>;

    /// Persist the bounty queue.
    fn write_dispute(&self, file: &DisputeFile) -> StoreResult<()>;

    /// Read back the bounty queue, validating it.
    fn read_dispute(&self) -> StoreResult<Option<DisputeFile>>;
}
