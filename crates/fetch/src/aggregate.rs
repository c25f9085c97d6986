//! Collection aggregation.
//!
//! Every job of every active collection is fetched concurrently under one
//! semaphore, each datum is scaled to a fixed-point integer by the
//! collection's decimal power, and the collection's aggregation method is
//! applied across the successful results. A collection with no successful
//! job contributes zero and is flagged not-revealed, which keeps it out of
//! the epoch's commit vector.

use std::sync::Arc;

use alloy_primitives::U256;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use medianet_core::Fetcher;
use medianet_types::{AggregationMethod, Collection, CollectionId, LeafId};

/// One collection's aggregated value for the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionValue {
    /// Collection the value belongs to.
    pub collection_id: CollectionId,
    /// Leaf position, the commit vector is ordered by this.
    pub leaf_id: LeafId,
    /// Aggregated fixed-point value; zero when not revealed.
    pub value: U256,
    /// False when every job failed and the collection is excluded from
    /// the vote.
    pub revealed: bool,
}

/// Fetches and aggregates all active collections.
pub struct Aggregator {
    fetcher: Arc<dyn Fetcher>,
    semaphore: Arc<Semaphore>,
}

impl Aggregator {
    /// Build an aggregator over a fetcher with the given concurrency
    /// bound.
    pub fn new(fetcher: Arc<dyn Fetcher>, max_concurrency: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Aggregate every collection, returning results in leaf order.
    pub async fn collect_all(&self, collections: &[Collection]) -> Vec<CollectionValue> {
        let mut values = Vec::with_capacity(collections.len());
        for collection in collections {
            values.push(self.collect_one(collection).await);
        }
        values.sort_by_key(|v| v.leaf_id);
        values
    }

    /// Fetch all jobs of one collection and aggregate the successes.
    async fn collect_one(&self, collection: &Collection) -> CollectionValue {
        let mut tasks = JoinSet::new();
        for job in collection.jobs.iter().cloned() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&self.semaphore);
            let power = collection.power;
            tasks.spawn(async move {
                // Closing the semaphore is not part of this design; a
                // failed acquire only happens on shutdown.
                let _permit = semaphore.acquire_owned().await.ok()?;
                match fetcher.fetch(&job).await {
                    Ok(datum) => match scale_decimal(&datum, power) {
                        Ok(value) => Some(value),
                        Err(reason) => {
                            warn!(url = %job.url, %datum, reason = %reason, "datum unusable");
                            None
                        }
                    },
                    Err(err) => {
                        warn!(url = %job.url, error = %err, "job failed");
                        None
                    }
                }
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some(value)) = joined {
                results.push(value);
            }
        }

        if results.is_empty() {
            warn!(
                collection_id = collection.collection_id,
                name = %collection.name,
                "no job succeeded, collection not revealed"
            );
            return CollectionValue {
                collection_id: collection.collection_id,
                leaf_id: collection.leaf_id,
                value: U256::ZERO,
                revealed: false,
            };
        }

        let value = apply_aggregation(collection.aggregation, &mut results);
        debug!(
            collection_id = collection.collection_id,
            name = %collection.name,
            %value,
            jobs_ok = results.len(),
            "collection aggregated"
        );
        CollectionValue {
            collection_id: collection.collection_id,
            leaf_id: collection.leaf_id,
            value,
            revealed: true,
        }
    }
}

/// Aggregate non-empty job results. Sorts in place for the order-based
/// methods.
fn apply_aggregation(method: AggregationMethod, values: &mut Vec<U256>) -> U256 {
    values.sort();
    match method {
        AggregationMethod::Median => values[(values.len() - 1) / 2],
        AggregationMethod::Mean => {
            let sum = values
                .iter()
                .fold(U256::ZERO, |acc, v| acc.saturating_add(*v));
            sum / U256::from(values.len() as u64)
        }
        AggregationMethod::Min => values[0],
        AggregationMethod::Max => values[values.len() - 1],
    }
}

/// Scale a decimal string by `10^power` into an exact `U256`, truncating
/// toward zero. `"1.5"` at power 2 is `150`; `"1234"` at power -2 is
/// `12`.
pub fn scale_decimal(datum: &str, power: i8) -> Result<U256, String> {
    let datum = datum.trim();
    if datum.is_empty() {
        return Err("empty datum".to_string());
    }
    if datum.starts_with('-') {
        return Err(format!("negative datum {datum}"));
    }

    let (int_part, frac_part) = match datum.split_once('.') {
        Some((i, f)) => (i, f),
        None => (datum, ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
        || (int_part.is_empty() && frac_part.is_empty())
    {
        return Err(format!("not a decimal number: {datum}"));
    }

    let digits = format!("{int_part}{frac_part}");
    let mantissa =
        U256::from_str_radix(&digits, 10).map_err(|e| format!("digits overflow: {e}"))?;

    let exponent = power as i64 - frac_part.len() as i64;
    let ten = U256::from(10u64);
    if exponent >= 0 {
        let scale = ten
            .checked_pow(U256::from(exponent as u64))
            .ok_or_else(|| format!("scale 10^{exponent} overflows"))?;
        mantissa
            .checked_mul(scale)
            .ok_or_else(|| format!("{datum} * 10^{exponent} overflows"))
    } else {
        let scale = ten
            .checked_pow(U256::from((-exponent) as u64))
            .ok_or_else(|| format!("scale 10^{} overflows", -exponent))?;
        // Integer division truncates toward zero, as the contract does.
        Ok(mantissa / scale)
    }
}
