//! Aggregator tests against a scripted fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use medianet_core::{FetchError, FetchResult, Fetcher};
use medianet_fetch::Aggregator;
use medianet_types::{AggregationMethod, Collection, Job, SelectorKind};

/// Fetcher answering from a fixed url → datum table.
struct ScriptedFetcher {
    data: HashMap<String, String>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            data: entries
                .iter()
                .map(|(u, d)| (u.to_string(), d.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, job: &Job) -> FetchResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.data
            .get(&job.url)
            .cloned()
            .ok_or_else(|| FetchError::Exhausted {
                url: job.url.clone(),
                attempts: 2,
            })
    }
}

fn job(url: &str) -> Job {
    Job {
        url: url.to_string(),
        selector_kind: SelectorKind::JsonPath,
        selector: "price".to_string(),
    }
}

fn collection(
    collection_id: u16,
    leaf_id: u16,
    power: i8,
    aggregation: AggregationMethod,
    urls: &[&str],
) -> Collection {
    Collection {
        collection_id,
        leaf_id,
        power,
        aggregation,
        jobs: urls.iter().map(|u| job(u)).collect(),
        name: format!("collection-{collection_id}"),
    }
}

#[tokio::test]
async fn aggregates_the_median_of_scaled_job_values() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        ("https://a", "100.50"),
        ("https://b", "101.00"),
        ("https://c", "99.75"),
    ]));
    let aggregator = Aggregator::new(fetcher, 8);

    let collections = [collection(
        1,
        0,
        2,
        AggregationMethod::Median,
        &["https://a", "https://b", "https://c"],
    )];
    let values = aggregator.collect_all(&collections).await;

    assert_eq!(values.len(), 1);
    assert!(values[0].revealed);
    // Scaled values: 10050, 10100, 9975 → median 10050.
    assert_eq!(values[0].value, U256::from(10_050u64));
}

#[tokio::test]
async fn failed_jobs_are_excluded_not_fatal() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[("https://ok", "40")]));
    let aggregator = Aggregator::new(fetcher, 4);

    let collections = [collection(
        2,
        0,
        0,
        AggregationMethod::Max,
        &["https://ok", "https://down"],
    )];
    let values = aggregator.collect_all(&collections).await;

    assert!(values[0].revealed);
    assert_eq!(values[0].value, U256::from(40u64));
}

#[tokio::test]
async fn a_fully_failed_collection_is_not_revealed() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[("https://up", "7")]));
    let aggregator = Aggregator::new(fetcher, 4);

    let collections = [
        collection(3, 1, 0, AggregationMethod::Mean, &["https://down"]),
        collection(4, 0, 0, AggregationMethod::Mean, &["https://up"]),
    ];
    let values = aggregator.collect_all(&collections).await;

    // Results come back in leaf order.
    assert_eq!(values[0].collection_id, 4);
    assert!(values[0].revealed);
    assert_eq!(values[1].collection_id, 3);
    assert!(!values[1].revealed);
    assert_eq!(values[1].value, U256::ZERO);
}

#[tokio::test]
async fn unparsable_datum_counts_as_a_failed_job() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        ("https://good", "12"),
        ("https://bad", "n/a"),
    ]));
    let aggregator = Aggregator::new(fetcher, 4);

    let collections = [collection(
        5,
        0,
        0,
        AggregationMethod::Min,
        &["https://good", "https://bad"],
    )];
    let values = aggregator.collect_all(&collections).await;

    assert!(values[0].revealed);
    assert_eq!(values[0].value, U256::from(12u64));
}

#[tokio::test]
async fn every_job_is_attempted_once() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        ("https://a", "1"),
        ("https://b", "2"),
        ("https://c", "3"),
        ("https://d", "4"),
    ]));
    let aggregator = Aggregator::new(Arc::clone(&fetcher) as Arc<dyn Fetcher>, 2);

    let collections = [collection(
        6,
        0,
        0,
        AggregationMethod::Mean,
        &["https://a", "https://b", "https://c", "https://d"],
    )];
    let values = aggregator.collect_all(&collections).await;

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
    // Mean of 1..4 truncates to 2.
    assert_eq!(values[0].value, U256::from(2u64));
}
