use dotenv::dotenv;
use log::{LevelFilter, error, info};
use tripscrape::ScrapingContext;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let context = ScrapingContext::new().await?;
    let result = context.review_scraper()?.run().await;
    context.store.close().await;

    match result {
        Ok(summary) => {
            info!("{:?}", summary);
            Ok(())
        }
        Err(e) => {
            error!("Scrape aborted: {e:#}");
            Err(e)
        }
    }
}
