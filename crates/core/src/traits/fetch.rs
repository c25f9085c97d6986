//! The data-source seam.

use async_trait::async_trait;
use thiserror::Error;

use medianet_types::Job;

/// Failures of a single data-source fetch. Each one affects only the
/// collection the job belongs to.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint answered with a non-2xx status.
    #[error("{url} responded with status {status}")]
    Status {
        /// Endpoint queried.
        url: String,
        /// HTTP status received.
        status: u16,
    },

    /// The request could not be completed within its deadline.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Endpoint queried.
        url: String,
        /// Transport-level reason.
        reason: String,
    },

    /// The selector matched nothing in the response.
    #[error("selector {selector:?} matched nothing at {url}")]
    SelectorMiss {
        /// Endpoint queried.
        url: String,
        /// Selector that missed.
        selector: String,
    },

    /// The response or the selected datum was not usable.
    #[error("malformed response from {url}: {reason}")]
    Malformed {
        /// Endpoint queried.
        url: String,
        /// What was wrong.
        reason: String,
    },

    /// All attempts were spent.
    #[error("{url} unreachable after {attempts} attempts")]
    Exhausted {
        /// Endpoint queried.
        url: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Retrieves one numeric datum, as a decimal string, from a job's
/// endpoint.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the fetch and extraction for one job.
    async fn fetch(&self, job: &Job) -> FetchResult<String>;
}
