use async_trait::async_trait;
use tokio::time::Instant;
use crate::error::{Error, Result};
use crate::price_infra::RawPayload;
use crate::price_infra::connectors::{HttpTransport, SourceAdapter};

pub struct JsonApiAdapter {
    transport: HttpTransport,
}

impl JsonApiAdapter {
    pub fn new(transport: HttpTransport) -> Self {
        JsonApiAdapter { transport }
    }
}

#[async_trait]
impl SourceAdapter for JsonApiAdapter {
    async fn fetch(&self, url: &str, deadline: Instant) -> Result<RawPayload> {
        let response = self.transport.get(url, deadline).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("json") {
            // Plenty of venues serve JSON as text/html; decode anyway.
            tracing::debug!("{} answered with content-type {:?}", url, content_type);
        }

        let body = response.bytes().await?;
        let value = serde_json::from_slice(&body).map_err(|e| Error::MalformedBody {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(RawPayload::Json(value))
    }
}
