//! # Medianet Data Fetch
//!
//! Retrieval and aggregation of collection data:
//!
//! - [`HttpFetcher`] performs one HTTPS GET per job with a hard deadline
//!   and a small fixed retry budget, then extracts a single numeric datum
//!   with either a JSON path or an XHTML CSS selector.
//! - [`Aggregator`] runs every job of every active collection under a
//!   bounded concurrency limit, scales the results to fixed-point
//!   integers by the collection's decimal power, and applies the
//!   collection's aggregation method.
//!
//! All arithmetic past the HTTP boundary is exact `U256`; decimal strings
//! are scaled with integer math, truncating toward zero.

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

mod aggregate;
mod source;

pub use aggregate::{scale_decimal, Aggregator, CollectionValue};
pub use source::HttpFetcher;
