use std::sync::Arc;

use crate::{
    config::ScrapingConfig, detail_extractor::HtmlDetailExtractor, pg_store::PgStore,
    requests::RequestClient, review_scraper::ReviewScraper,
};

/// Everything a scraping run needs, opened once and shared by every request.
pub struct ScrapingContext {
    pub scraping_config: ScrapingConfig,
    pub request_client: Arc<RequestClient>,
    pub detail_extractor: HtmlDetailExtractor,
    pub store: PgStore,
}

impl ScrapingContext {
    pub async fn new() -> anyhow::Result<Self> {
        let scraping_config = ScrapingConfig::new()?;
        let request_client = Arc::new(RequestClient::new(scraping_config.requests_per_second)?);
        let detail_extractor =
            HtmlDetailExtractor::new(request_client.clone(), scraping_config.reviews_per_page);
        let store = PgStore::connect(&scraping_config.database_url).await?;
        Ok(ScrapingContext {
            scraping_config,
            request_client,
            detail_extractor,
            store,
        })
    }

    pub fn review_scraper(&self) -> anyhow::Result<ReviewScraper<'_>> {
        ReviewScraper::new(
            &self.scraping_config,
            &self.store,
            self.request_client.as_ref(),
            &self.detail_extractor,
        )
    }
}
