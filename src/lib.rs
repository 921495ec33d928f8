mod blob_extractor;
mod config;
mod detail_extractor;
mod error;
mod models;
mod page_retriever;
mod pagination;
mod pg_store;
mod ratelimit;
mod record_mapper;
mod requests;
mod review_scraper;
mod scraping_context;
mod store;
mod tree_search;

pub use blob_extractor::BlobExtractor;
pub use config::{LoadFromEnv, ScrapingConfig, ScrapingEnv};
pub use detail_extractor::{DetailExtractor, HtmlDetailExtractor};
pub use error::{DetailError, ExtractionError, FetchError, PageError, RecordError, StoreError};
pub use models::{Attraction, AttractionDetails, Location, PageJob, Review, User};
pub use page_retriever::{PageOutcome, PageRetriever, RetryPolicy};
pub use pagination::PaginationPlanner;
pub use pg_store::PgStore;
pub use ratelimit::{PageThrottle, RateLimiter};
pub use record_mapper::{FieldPath, MappedRecord, MissingField, RecordContext, map_record};
pub use requests::{PageFetcher, RequestClient};
pub use review_scraper::{AttractionReport, ReviewScraper, RunSummary};
pub use scraping_context::ScrapingContext;
pub use store::{AttractionFilter, MemoryStore, ReviewStore, StoreEvent};
pub use tree_search::{Matches, REVIEWS_KEY, TreeSearch};
