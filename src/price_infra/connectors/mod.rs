pub mod json_api;
pub mod html_scrape;
pub mod bulk_archive;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use crate::error::{Error, Result};
use crate::price_infra::RawPayload;

/// Retrieval half of a source: turns an endpoint into a raw payload.
///
/// Adapters never normalize prices. Every failure (status, timeout, proxy,
/// undecodable body) comes back as an `Err` of the fetch-failure class.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, url: &str, deadline: Instant) -> Result<RawPayload>;
}

/// Shared HTTP client; proxy and user agent apply to every transport.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(proxy: Option<&str>, user_agent: &str) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::ConfigError(format!("invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Routing quote sources through proxy {}", proxy_url);
        }

        let client = builder
            .build()
            .map_err(|e| Error::ConfigError(format!("HTTP client build failed: {}", e)))?;

        Ok(HttpTransport { client })
    }

    /// GET bounded by `deadline`; non-2xx statuses are errors.
    pub async fn get(&self, url: &str, deadline: Instant) -> Result<reqwest::Response> {
        let budget = remaining(url, deadline)?;

        let response = self.client.get(url).timeout(budget).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

/// Time left until `deadline`, or a timeout error if it already passed.
pub fn remaining(url: &str, deadline: Instant) -> Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(Error::Timeout(format!("deadline passed before requesting {}", url)));
    }
    Ok(left)
}
