use anyhow::Context;
use log::{debug, error, info, warn};

use crate::config::ScrapingConfig;
use crate::detail_extractor::DetailExtractor;
use crate::models::Attraction;
use crate::page_retriever::{PageOutcome, PageRetriever};
use crate::pagination::PaginationPlanner;
use crate::ratelimit::PageThrottle;
use crate::requests::PageFetcher;
use crate::store::{AttractionFilter, ReviewStore};

/// What happened to one attraction during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttractionReport {
    pub attraction_id: i64,
    pub pages: usize,
    /// Indices of pages that were given up on.
    pub failed_pages: Vec<usize>,
    pub reviews_inserted: usize,
    pub users_inserted: usize,
    pub records_rejected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub attractions_scraped: usize,
    /// Attractions left unscraped because their details could not be read.
    pub attractions_skipped: usize,
    pub pages: usize,
    pub failed_pages: usize,
    pub reviews_inserted: usize,
    pub users_inserted: usize,
    pub records_rejected: usize,
}

impl RunSummary {
    fn add(&mut self, report: &AttractionReport) {
        self.attractions_scraped += 1;
        self.pages += report.pages;
        self.failed_pages += report.failed_pages.len();
        self.reviews_inserted += report.reviews_inserted;
        self.users_inserted += report.users_inserted;
        self.records_rejected += report.records_rejected;
    }
}

/// Walks every pending attraction and scrapes all of its review pages,
/// one attraction and one page at a time.
pub struct ReviewScraper<'a> {
    config: &'a ScrapingConfig,
    store: &'a dyn ReviewStore,
    details: &'a dyn DetailExtractor,
    retriever: PageRetriever<'a>,
    planner: PaginationPlanner,
    throttle: PageThrottle,
    filter: AttractionFilter,
}

impl<'a> ReviewScraper<'a> {
    pub fn new(
        config: &'a ScrapingConfig,
        store: &'a dyn ReviewStore,
        fetcher: &'a dyn PageFetcher,
        details: &'a dyn DetailExtractor,
    ) -> anyhow::Result<Self> {
        let retriever = PageRetriever::new(fetcher, config.retry)?;
        let planner = PaginationPlanner::new(&config.search_type, config.reviews_per_page);
        Ok(Self {
            config,
            store,
            details,
            retriever,
            planner,
            throttle: config.page_throttle,
            filter: config.attraction_filter.clone(),
        })
    }

    pub async fn run(&self) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();
        // Attractions come back in descending id order; the cursor keeps a
        // skipped attraction from being handed out again.
        let mut cursor = None;
        while let Some(attraction) = self
            .store
            .next_pending(&self.filter, cursor)
            .await
            .context("failed to read pending attractions")?
        {
            cursor = Some(attraction.id);
            match self.scrape_attraction(attraction).await? {
                Some(report) => summary.add(&report),
                None => summary.attractions_skipped += 1,
            }
        }
        info!(
            "Run finished: {} attractions scraped, {} skipped, {} pages ({} failed), {} new reviews, {} new users",
            summary.attractions_scraped,
            summary.attractions_skipped,
            summary.pages,
            summary.failed_pages,
            summary.reviews_inserted,
            summary.users_inserted
        );
        Ok(summary)
    }

    /// Returns `None` when the attraction was skipped.
    pub async fn scrape_attraction(
        &self,
        mut attraction: Attraction,
    ) -> anyhow::Result<Option<AttractionReport>> {
        let url = self.config.attraction_url(&attraction.url);
        let details = match self.details.details(&url).await {
            Ok(details) => details,
            Err(err) => {
                error!("Skipping attraction {} ({}): {}", attraction.id, url, err);
                return Ok(None);
            }
        };
        info!(
            "Attraction {}: location {:?}, {} reviews, {} pages",
            attraction.id, details.location, details.num_reviews, details.page_count
        );

        // Written before any review so a crash mid-attraction still leaves
        // accurate metadata behind.
        attraction.apply_details(&details);
        self.store
            .upsert_attraction(&attraction)
            .await
            .with_context(|| format!("failed to update attraction {}", attraction.id))?;

        let jobs = self.planner.plan(&url, attraction.id, details.page_count);
        let mut report = AttractionReport {
            attraction_id: attraction.id,
            pages: jobs.len(),
            ..AttractionReport::default()
        };

        for job in &jobs {
            match self.retriever.retrieve(job).await {
                Ok(outcome) => self.persist(&outcome, &mut report).await?,
                Err(err) => {
                    warn!(
                        "Page {} of attraction {} failed: {}",
                        job.page_index + 1,
                        attraction.id,
                        err
                    );
                    report.failed_pages.push(job.page_index);
                }
            }
            self.throttle.pause().await;
        }

        self.store
            .set_scraped(attraction.id, true)
            .await
            .with_context(|| format!("failed to mark attraction {} scraped", attraction.id))?;
        Ok(Some(report))
    }

    async fn persist(
        &self,
        outcome: &PageOutcome,
        report: &mut AttractionReport,
    ) -> anyhow::Result<()> {
        report.records_rejected += outcome.rejected;
        for record in &outcome.records {
            if record.has_user() {
                if self.store.upsert_user(&record.user).await? {
                    report.users_inserted += 1;
                }
            } else {
                debug!("Empty user information for review {}", record.review.id);
            }
            if self.store.upsert_review(&record.review).await? {
                report.reviews_inserted += 1;
            }
        }
        Ok(())
    }
}
