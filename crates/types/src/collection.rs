//! Data collections and their source jobs.
//!
//! A collection is an on-chain data series (e.g. an asset price) fed by one
//! or more [`Job`]s, each of which names a URL and a selector that extracts
//! a single numeric datum from the response. The active collection set is
//! dynamic and must be re-fetched from the chain every epoch.

use serde::{Deserialize, Serialize};

use crate::{CollectionId, LeafId};

/// How a [`Job`] extracts its datum from the fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Dotted JSON path evaluated against the response body,
    /// e.g. `data.market.price` or `quotes[0].last`.
    JsonPath,
    /// CSS selector applied to an XHTML document; the first matching
    /// element's text content is the datum.
    Xhtml,
}

/// A single data source feeding a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Endpoint to GET.
    pub url: String,
    /// How [`selector`](Self::selector) is interpreted.
    pub selector_kind: SelectorKind,
    /// Path or CSS selector locating the datum in the response.
    pub selector: String,
}

/// Aggregation applied across a collection's successful job results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Lower median of the sorted job values.
    Median,
    /// Truncating arithmetic mean.
    Mean,
    /// Smallest job value.
    Min,
    /// Largest job value.
    Max,
}

/// An active data collection as reported by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Stable on-chain identifier.
    pub collection_id: CollectionId,
    /// Index in the current Merkle leaf ordering. Vote vectors are
    /// assembled in ascending leaf order.
    pub leaf_id: LeafId,
    /// Decimal scale: the reported value is `datum * 10^power`,
    /// truncated toward zero when `power` is negative.
    pub power: i8,
    /// Aggregation applied across this collection's jobs.
    pub aggregation: AggregationMethod,
    /// Source endpoints feeding this collection.
    pub jobs: Vec<Job>,
    /// Human-readable name, display only.
    pub name: String,
}
