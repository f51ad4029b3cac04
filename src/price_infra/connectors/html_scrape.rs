use async_trait::async_trait;
use tokio::time::Instant;
use crate::error::{Error, Result};
use crate::price_infra::RawPayload;
use crate::price_infra::connectors::{HttpTransport, SourceAdapter};

/// Fetches HTML or XML pages as text for the markup strategies.
pub struct HtmlScrapeAdapter {
    transport: HttpTransport,
}

impl HtmlScrapeAdapter {
    pub fn new(transport: HttpTransport) -> Self {
        HtmlScrapeAdapter { transport }
    }
}

#[async_trait]
impl SourceAdapter for HtmlScrapeAdapter {
    async fn fetch(&self, url: &str, deadline: Instant) -> Result<RawPayload> {
        let response = self.transport.get(url, deadline).await?;
        let text = response.text().await?;

        if text.trim().is_empty() {
            return Err(Error::MalformedBody {
                url: url.to_string(),
                reason: "empty body".to_string(),
            });
        }

        Ok(RawPayload::Markup(text))
    }
}
