//! Concurrent page dispatch across credential lanes.
//!
//! Each credential is a [`Lane`]: a backend plus a semaphore holding that
//! credential's concurrency budget. Page `i` is dealt to lane `i % lanes`,
//! so two credentials double the number of calls in flight.
//!
//! Pages complete in any order; results carry their page index and are
//! sorted before being returned, so the caller always sees page order.
//!
//! The first page that exhausts its retries fails the whole call and the
//! remaining in-flight requests are dropped.
//!
//! ## Retry strategy
//!
//! Retryable errors (timeouts, 429, 5xx, transport) back off exponentially:
//! `backoff_ms * 2^(attempt-1)`. Credential and request errors fail at once.

use crate::error::OcrError;
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::ocr::VisionBackend;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One credential's backend and concurrency budget.
#[derive(Clone)]
pub struct Lane {
    backend: Arc<dyn VisionBackend>,
    permits: Arc<Semaphore>,
    budget: usize,
}

impl Lane {
    pub fn new(backend: Arc<dyn VisionBackend>, budget: usize) -> Self {
        let budget = budget.max(1);
        Self {
            backend,
            permits: Arc::new(Semaphore::new(budget)),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }
}

/// Per-page retry and timeout settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub call_timeout: Duration,
}

/// Transcribe all pages, returning their text in page order.
pub async fn transcribe_pages(
    lanes: &[Lane],
    pages: Vec<EncodedPage>,
    policy: &RetryPolicy,
) -> Result<Vec<String>, OcrError> {
    if lanes.is_empty() {
        return Err(OcrError::Unavailable("no OCR credential lanes".into()));
    }
    let total_budget: usize = lanes.iter().map(Lane::budget).sum();
    let total_pages = pages.len();
    debug!(
        "Dispatching {} pages over {} lane(s), {} calls in flight max",
        total_pages,
        lanes.len(),
        total_budget
    );

    let mut results: Vec<(usize, String)> = stream::iter(pages.into_iter().enumerate().map(
        |(slot, page)| {
            let lane = lanes[slot % lanes.len()].clone();
            let policy = *policy;
            async move {
                let _permit = lane
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| OcrError::Unavailable("lane closed".into()))?;
                let text = transcribe_with_retry(lane.backend.as_ref(), &page, &policy).await?;
                Ok::<_, OcrError>((page.index, text))
            }
        },
    ))
    .buffer_unordered(total_budget)
    .try_collect()
    .await?;

    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, text)| text).collect())
}

/// One page with timeout and exponential backoff.
async fn transcribe_with_retry(
    backend: &dyn VisionBackend,
    page: &EncodedPage,
    policy: &RetryPolicy,
) -> Result<String, OcrError> {
    let page_num = page.page_num();
    let mut last_err = OcrError::Unavailable("no attempt made".into());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(policy.call_timeout, backend.transcribe(page)).await {
            Ok(result) => result,
            Err(_) => Err(OcrError::Timeout {
                page: page_num,
                secs: policy.call_timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = e;
            }
            Err(e) => {
                warn!("Page {}: permanent OCR failure: {}", page_num, e);
                return Err(e);
            }
        }
    }

    Err(last_err)
}
