use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use crate::error::{Error, Result};
use crate::price_infra::connectors::SourceAdapter;
use crate::price_infra::connectors::bulk_archive::BulkArchiveAdapter;
use crate::price_infra::connectors::html_scrape::HtmlScrapeAdapter;
use crate::price_infra::connectors::json_api::JsonApiAdapter;
use crate::price_infra::connectors::HttpTransport;
use crate::price_infra::feed_cache::FeedCache;
use crate::price_infra::strategy::ExtractionStrategy;
use crate::price_infra::{SourceConfig, TransportKind};

/// A named URL plus the transport that knows how to fetch it.
pub struct Endpoint {
    pub name: String,
    pub url: String,
    pub adapter: Arc<dyn SourceAdapter>,
}

/// One configured quote source: its endpoints and its ordered strategies.
pub struct QuoteSource {
    pub id: String,
    pub endpoints: Vec<Endpoint>,
    pub strategies: Vec<Box<dyn ExtractionStrategy>>,
    pub per_source_timeout: Option<Duration>,
}

impl QuoteSource {
    pub fn new(id: impl Into<String>) -> Self {
        QuoteSource {
            id: id.into(),
            endpoints: Vec::new(),
            strategies: Vec::new(),
            per_source_timeout: None,
        }
    }

    pub fn with_endpoint(mut self, name: &str, url: &str, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.endpoints.push(Endpoint {
            name: name.to_string(),
            url: url.to_string(),
            adapter,
        });
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_source_timeout = Some(timeout);
        self
    }

    /// Endpoint by name; `None` selects the first endpoint.
    pub fn endpoint(&self, name: Option<&str>) -> Option<&Endpoint> {
        match name {
            Some(name) => self.endpoints.iter().find(|e| e.name == name),
            None => self.endpoints.first(),
        }
    }

    pub fn from_config(
        config: &SourceConfig,
        transport: &HttpTransport,
        cache: &Arc<FeedCache>,
    ) -> Result<Self> {
        validate(config)?;

        let mut source = QuoteSource::new(&config.id);
        source.per_source_timeout = config.per_source_timeout();

        for endpoint in &config.endpoints {
            let adapter: Arc<dyn SourceAdapter> = match config.endpoint_transport(endpoint) {
                TransportKind::JsonApi => Arc::new(JsonApiAdapter::new(transport.clone())),
                TransportKind::HtmlScrape => Arc::new(HtmlScrapeAdapter::new(transport.clone())),
                TransportKind::BulkArchive => {
                    let archive = config.archive.as_ref().ok_or_else(|| {
                        Error::ConfigError(format!("source {}: bulk_archive endpoint without [archive]", config.id))
                    })?;
                    Arc::new(BulkArchiveAdapter::new(
                        transport.clone(),
                        Arc::clone(cache),
                        archive.ttl(),
                        archive.members.clone(),
                        archive.max_member_bytes,
                    ))
                }
            };
            source = source.with_endpoint(&endpoint.name, &endpoint.url, adapter);
        }

        for strategy in &config.strategies {
            source = source.with_strategy(strategy.build()?);
        }

        tracing::debug!(
            "Built source {} with {} endpoint(s) and {} strateg(ies)",
            source.id,
            source.endpoints.len(),
            source.strategies.len()
        );
        Ok(source)
    }
}

fn validate(config: &SourceConfig) -> Result<()> {
    let fail = |msg: String| Err(Error::ConfigError(format!("source {}: {}", config.id, msg)));

    if config.id.trim().is_empty() {
        return Err(Error::ConfigError("source with empty id".to_string()));
    }
    if config.endpoints.is_empty() {
        return fail("no endpoints".to_string());
    }
    if config.strategies.is_empty() {
        return fail("no strategies".to_string());
    }
    if config.per_source_timeout_ms == Some(0) {
        return fail("per_source_timeout_ms must be positive".to_string());
    }

    let mut names = HashSet::new();
    for endpoint in &config.endpoints {
        if !names.insert(endpoint.name.as_str()) {
            return fail(format!("duplicate endpoint {}", endpoint.name));
        }
        if reqwest::Url::parse(&endpoint.url).is_err() {
            return fail(format!("invalid url {}", endpoint.url));
        }
    }

    for strategy in &config.strategies {
        if let Some(endpoint) = strategy.endpoint() {
            if !names.contains(endpoint) {
                return fail(format!("strategy {} references unknown endpoint {}", strategy.name(), endpoint));
            }
        }
    }

    let uses_archive = config
        .endpoints
        .iter()
        .any(|e| config.endpoint_transport(e) == TransportKind::BulkArchive);
    if uses_archive {
        match &config.archive {
            None => return fail("bulk_archive endpoint without [archive] section".to_string()),
            Some(archive) if archive.members.is_empty() => return fail("archive members list is empty".to_string()),
            Some(archive) if archive.ttl_secs == 0 => return fail("archive ttl_secs must be positive".to_string()),
            Some(archive) if archive.max_member_bytes == 0 => {
                return fail("archive max_member_bytes must be positive".to_string());
            }
            Some(_) => {}
        }
    }

    Ok(())
}
