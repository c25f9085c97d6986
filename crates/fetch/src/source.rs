//! Single data-source fetcher.
//!
//! One job, one GET: a hard per-request deadline, a fixed retry budget
//! for transport-level failures, and selector extraction applied to the
//! final body. Extraction failures are not retried; the body already
//! arrived, fetching it again will not change what the selector finds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use medianet_core::{Clock, FetchError, FetchResult, Fetcher, Retry};
use medianet_types::{Job, SelectorKind};

/// HTTP implementation of the [`Fetcher`] seam.
pub struct HttpFetcher {
    client: Client,
    retry: Retry,
    clock: Arc<dyn Clock>,
}

impl HttpFetcher {
    /// Build a fetcher with the given per-request timeout and retry
    /// budget (`attempts` total tries spaced `retry_delay` apart).
    pub fn new(
        timeout: Duration,
        attempts: u32,
        retry_delay: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("medianet/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            retry: Retry::fixed(attempts, retry_delay),
            clock,
        })
    }

    async fn get_body(&self, url: &str) -> FetchResult<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, job: &Job) -> FetchResult<String> {
        let url = job.url.clone();
        let attempts = self.retry.attempts;
        let body = self
            .retry
            .run(self.clock.as_ref(), "data source fetch", || {
                self.get_body(&url)
            })
            .await
            .map_err(|last| match last {
                status @ FetchError::Status { .. } => status,
                _ => FetchError::Exhausted {
                    url: url.clone(),
                    attempts,
                },
            })?;

        let datum = match job.selector_kind {
            SelectorKind::JsonPath => extract_json(&body, &job.selector, &job.url)?,
            SelectorKind::Xhtml => extract_xhtml(&body, &job.selector, &job.url)?,
        };
        debug!(url = %job.url, selector = %job.selector, %datum, "datum extracted");
        Ok(datum)
    }
}

/// Evaluate a dotted JSON path (`data.market[0].price`) against a body.
fn extract_json(body: &str, selector: &str, url: &str) -> FetchResult<String> {
    let root: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: format!("not valid JSON: {e}"),
        })?;

    let mut current = &root;
    for token in path_tokens(selector) {
        current = match token {
            PathToken::Key(key) => current.get(key),
            PathToken::Index(i) => current.get(i),
        }
        .ok_or_else(|| FetchError::SelectorMiss {
            url: url.to_string(),
            selector: selector.to_string(),
        })?;
    }

    match current {
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        other => Err(FetchError::Malformed {
            url: url.to_string(),
            reason: format!("selected datum is not numeric: {other}"),
        }),
    }
}

enum PathToken<'a> {
    Key(&'a str),
    Index(usize),
}

/// Split `a.b[2].c` (or leading `[0].x`) into keys and indices.
fn path_tokens(selector: &str) -> impl Iterator<Item = PathToken<'_>> {
    selector.split('.').flat_map(|segment| {
        let mut tokens = Vec::new();
        let (key, rest) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            tokens.push(PathToken::Key(key));
        }
        for part in rest.split('[').skip_while(|p| p.is_empty()) {
            if let Some(index) = part.strip_suffix(']').and_then(|n| n.parse().ok()) {
                tokens.push(PathToken::Index(index));
            }
        }
        tokens
    })
}

/// Apply a CSS selector to an XHTML document; the first match's text is
/// the datum.
fn extract_xhtml(body: &str, selector: &str, url: &str) -> FetchResult<String> {
    let document = Html::parse_document(body);
    let parsed = Selector::parse(selector).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: format!("bad selector: {e}"),
    })?;

    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| FetchError::SelectorMiss {
            url: url.to_string(),
            selector: selector.to_string(),
        })?;

    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        return Err(FetchError::SelectorMiss {
            url: url.to_string(),
            selector: selector.to_string(),
        });
    }
    Ok(text)
}
