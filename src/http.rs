//! HTTP transport used by sources, the series cache and the scraper.
//!
//! Everything that touches the network goes through the [`Fetcher`] trait so
//! the scraping logic can be driven by canned responses in tests.

use crate::config::ScrapingConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Outbound HTTP operations the scraper needs.
///
/// GET requests do not check the response status: the body is returned
/// whatever the server answered with.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a document and returns its body as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches a binary payload (page images).
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Issues a HEAD request and returns the status code.
    async fn head_status(&self, url: &str) -> Result<u16, FetchError>;
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher using the user agent and timeout from the config.
    pub fn new(config: &ScrapingConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_store(true);

        if config.timeout_sec > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_sec));
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

/// Connection and timeout failures mean the host never answered.
fn send_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_connect() || err.is_timeout() {
        FetchError::Unreachable(format!("{}: {}", url, err))
    } else {
        FetchError::Request(err)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        Ok(response.text().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url, "GET (binary)");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn head_status(&self, url: &str) -> Result<u16, FetchError> {
        tracing::debug!(url, "HEAD");
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        Ok(response.status().as_u16())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_builds_from_default_config() {
        assert!(HttpFetcher::new(&ScrapingConfig::default()).is_ok());
    }

    /// URL of a local port nothing listens on.
    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/", port)
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let fetcher = HttpFetcher::new(&ScrapingConfig::default()).unwrap();
        let url = closed_port_url();

        assert!(matches!(
            fetcher.get_text(&url).await,
            Err(FetchError::Unreachable(_))
        ));
        assert!(matches!(
            fetcher.head_status(&url).await,
            Err(FetchError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_url_is_request_error() {
        let fetcher = HttpFetcher::new(&ScrapingConfig::default()).unwrap();
        assert!(matches!(
            fetcher.get_bytes("www.test.com").await,
            Err(FetchError::Request(_))
        ));
    }

    #[test]
    fn test_http_fetcher_builds_without_timeout() {
        let config = ScrapingConfig {
            timeout_sec: 0,
            ..ScrapingConfig::default()
        };
        assert!(HttpFetcher::new(&config).is_ok());
    }
}
