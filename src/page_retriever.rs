use std::time::Duration;

use log::{info, warn};
use serde_json::Value;

use crate::blob_extractor::BlobExtractor;
use crate::error::PageError;
use crate::models::PageJob;
use crate::record_mapper::{MappedRecord, RecordContext, map_record};
use crate::requests::PageFetcher;
use crate::tree_search::TreeSearch;

/// Bounded exponential backoff for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th consecutive failure (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

/// Records recovered from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    pub job: PageJob,
    pub records: Vec<MappedRecord>,
    /// Records dropped because a required field was missing.
    pub rejected: usize,
    /// Review collections that were present but empty.
    pub empty_collections: usize,
    pub attempts: u32,
}

pub struct PageRetriever<'a> {
    fetcher: &'a dyn PageFetcher,
    blob_extractor: BlobExtractor,
    retry: RetryPolicy,
}

impl<'a> PageRetriever<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, retry: RetryPolicy) -> anyhow::Result<Self> {
        let blob_extractor = BlobExtractor::new()?;
        Ok(Self {
            fetcher,
            blob_extractor,
            retry,
        })
    }

    /// Fetches the page until its data blob holds at least one review
    /// collection, then maps every record found.
    pub async fn retrieve(&self, job: &PageJob) -> Result<PageOutcome, PageError> {
        info!("Scraping page {}", job.url);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_once(&job.url).await {
                Ok(blob) => return Ok(self.collect_records(job, &blob, attempts)),
                Err(err) if attempts >= max_attempts => {
                    return Err(PageError::Exhausted {
                        url: job.url.clone(),
                        attempts,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.retry.backoff(attempts);
                    warn!(
                        "Reloading {} (attempt {}/{}) in {:.1}s: {}",
                        job.url,
                        attempts,
                        max_attempts,
                        delay.as_secs_f64(),
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_once(&self, url: &str) -> Result<Value, PageError> {
        let text = self.fetcher.fetch_text(url).await?;
        let blob = self.blob_extractor.extract(&text)?;
        // A blob without a single collection key is a half-rendered page, not
        // a page without reviews.
        if TreeSearch::reviews(&blob).matches().next().is_none() {
            return Err(PageError::EmptyTree);
        }
        Ok(blob)
    }

    fn collect_records(&self, job: &PageJob, blob: &Value, attempts: u32) -> PageOutcome {
        let mut outcome = PageOutcome {
            job: job.clone(),
            records: Vec::new(),
            rejected: 0,
            empty_collections: 0,
            attempts,
        };

        for collection in TreeSearch::reviews(blob) {
            let Some(raw_records) = collection.as_array() else {
                warn!(
                    "Ignoring non-list review collection at attraction {}, page {}. URL: {}",
                    job.attraction_id,
                    job.page_index + 1,
                    job.url
                );
                continue;
            };
            if raw_records.is_empty() {
                info!(
                    "No reviews found at attraction {}, page {}. URL: {}",
                    job.attraction_id,
                    job.page_index + 1,
                    job.url
                );
                outcome.empty_collections += 1;
                continue;
            }
            for (record_index, raw) in raw_records.iter().enumerate() {
                let ctx = RecordContext {
                    attraction_id: job.attraction_id,
                    page_index: job.page_index,
                    record_index,
                    url: &job.url,
                };
                match map_record(raw, &ctx) {
                    Ok(record) => outcome.records.push(record),
                    Err(err) => {
                        warn!(
                            "Skipping review {} at attraction {}, page {}: {}. URL: {}",
                            record_index + 1,
                            job.attraction_id,
                            job.page_index + 1,
                            err,
                            job.url
                        );
                        outcome.rejected += 1;
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out scripted responses (a body or an HTTP status) in order,
    /// repeating the last one.
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<String, u16>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<&str, u16>>) -> Self {
            let responses = responses
                .into_iter()
                .map(|r| r.map(str::to_string))
                .collect();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop_front()
            } else {
                responses.front().cloned()
            };
            match next {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) => Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn job() -> PageJob {
        PageJob {
            url: "https://example.com/Attraction-7-Reviews-or10".into(),
            attraction_id: 7,
            page_index: 1,
        }
    }

    fn review(id: i64) -> String {
        format!(
            r#"{{"id":{id},"title":"t{id}","rating":4,"text":"x","publishedDate":"2024-01-0{id}","userProfile":{{"route":{{"url":"/Profile/u{id}"}}}}}}"#
        )
    }

    fn page(body: &str) -> String {
        format!("<script>window.__WEB_CONTEXT__={{pageManifest:{body}}};</script>")
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn returns_records_from_every_non_empty_list_in_order() {
        let body = page(&format!(
            r#"{{"a":{{"reviews":[{},{}]}},"b":{{"reviews":[]}},"c":[{{"reviews":[{}]}}]}}"#,
            review(1),
            review(2),
            review(3)
        ));
        let fetcher = ScriptedFetcher::new(vec![Ok(body.as_str())]);
        let retriever = PageRetriever::new(&fetcher, fast_retry(3)).unwrap();

        let outcome = retriever.retrieve(&job()).await.unwrap();
        let ids: Vec<_> = outcome.records.iter().map(|r| r.review.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(outcome.empty_collections, 1);
        assert_eq!(outcome.rejected, 0);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.records.iter().all(|r| r.review.attraction_id == 7));
    }

    #[tokio::test]
    async fn only_empty_lists_is_a_valid_page() {
        let body = page(r#"{"reviews":[]}"#);
        let fetcher = ScriptedFetcher::new(vec![Ok(body.as_str())]);
        let retriever = PageRetriever::new(&fetcher, fast_retry(3)).unwrap();

        let outcome = retriever.retrieve(&job()).await.unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.empty_collections, 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn retries_through_transient_failures() {
        let good = page(&format!(r#"{{"reviews":[{}]}}"#, review(5)));
        let no_collections = page(r#"{"other":1}"#);
        let fetcher = ScriptedFetcher::new(vec![
            Err(503),
            Ok("<html>cached shell</html>"),
            Ok(no_collections.as_str()),
            Ok(good.as_str()),
        ]);
        let retriever = PageRetriever::new(&fetcher, fast_retry(5)).unwrap();

        let outcome = retriever.retrieve(&job()).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let fetcher = ScriptedFetcher::new(vec![Ok("<html>no blob here</html>")]);
        let retriever = PageRetriever::new(&fetcher, fast_retry(3)).unwrap();

        let err = retriever.retrieve(&job()).await.unwrap_err();
        match err {
            PageError::Exhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, PageError::Extraction(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn rejected_records_do_not_abort_the_page() {
        let body = page(&format!(
            r#"{{"reviews":[{{"id":9,"rating":3}},{},"junk"]}}"#,
            review(2)
        ));
        let fetcher = ScriptedFetcher::new(vec![Ok(body.as_str())]);
        let retriever = PageRetriever::new(&fetcher, fast_retry(1)).unwrap();

        let outcome = retriever.retrieve(&job()).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].review.id, 2);
        assert_eq!(outcome.rejected, 2);
    }
}
