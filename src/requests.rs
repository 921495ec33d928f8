use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};

use crate::error::FetchError;
use crate::ratelimit::RateLimiter;

// The site serves a stripped page without the data blob to unknown agents.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Source of raw page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

pub struct RequestClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl RequestClient {
    pub fn new(requests_per_second: u32) -> anyhow::Result<Self> {
        let client = ClientBuilder::new().user_agent(USER_AGENT).build()?;
        let rate_limiter = RateLimiter::new(requests_per_second);
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    pub async fn fetch_url_response(&self, url: &str) -> Result<Response, FetchError> {
        // Wait (non-blocking) until we're allowed to make a request according
        // to our self-imposed rate-limiting policy.
        self.rate_limiter.wait_until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub async fn fetch_url_body(&self, url: &str) -> Result<String, FetchError> {
        let response = self.fetch_url_response(url).await?;
        response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PageFetcher for RequestClient {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_url_body(url).await
    }
}
