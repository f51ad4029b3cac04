use std::sync::Arc;
use std::time::Duration;
use crate::config::loader::AppConfig;
use crate::error::{Error, Result};
use crate::price_infra::aggregator::QuoteAggregator;
use crate::price_infra::connectors::HttpTransport;
use crate::price_infra::feed_cache::FeedCache;
use crate::price_infra::source::QuoteSource;
use crate::types::quote::AggregateReport;

/// Everything a caller needs to ask for quotes: configured sources, the
/// shared HTTP client and the bulk-feed cache they share.
pub struct Engine {
    sources: Vec<Arc<QuoteSource>>,
    cache: Arc<FeedCache>,
    aggregator: QuoteAggregator,
    per_source_timeout: Duration,
    overall_timeout: Duration,
}

impl Engine {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let transport = HttpTransport::new(config.engine.proxy.as_deref(), &config.engine.user_agent)?;
        let cache = Arc::new(FeedCache::new());

        let sources = config
            .enabled_sources()
            .map(|source| QuoteSource::from_config(source, &transport, &cache).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Quote engine ready with {} source(s): {}",
            sources.len(),
            sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(Engine {
            sources,
            cache,
            aggregator: QuoteAggregator::new(),
            per_source_timeout: config.engine.per_source_timeout(),
            overall_timeout: config.engine.overall_timeout(),
        })
    }

    /// Assembles an engine from already-built sources sharing `cache`.
    pub fn with_sources(
        sources: Vec<Arc<QuoteSource>>,
        cache: Arc<FeedCache>,
        per_source_timeout: Duration,
        overall_timeout: Duration,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::NoSourcesConfigured);
        }
        Ok(Engine {
            sources,
            cache,
            aggregator: QuoteAggregator::new(),
            per_source_timeout,
            overall_timeout,
        })
    }

    /// One aggregation round over every configured source.
    pub async fn refresh(&self) -> AggregateReport {
        self.aggregator
            .aggregate_all(&self.sources, self.per_source_timeout, self.overall_timeout)
            .await
    }

    pub fn sources(&self) -> &[Arc<QuoteSource>] {
        &self.sources
    }

    pub fn cache(&self) -> &Arc<FeedCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_config_in_order() {
        let config = AppConfig::from_toml_str(
            r#"
            [engine]
            per_source_timeout_ms = 1000
            overall_timeout_ms = 3000

            [[sources]]
            id = "first"
            transport = "json_api"
            endpoints = [{ name = "main", url = "https://example.com/a" }]
            strategies = [{ kind = "order_book", name = "depth" }]

            [[sources]]
            id = "skipped"
            enabled = false
            transport = "json_api"
            endpoints = [{ name = "main", url = "https://example.com/b" }]
            strategies = [{ kind = "order_book", name = "depth" }]

            [[sources]]
            id = "second"
            transport = "html_scrape"
            endpoints = [{ name = "page", url = "https://example.com/c" }]
            strategies = [{ kind = "html_pattern", name = "page", buy_pattern = 'b=(\d+)', sell_pattern = 's=(\d+)', sidedness = "buy_is_ask" }]
            "#,
        )
        .unwrap();

        let engine = Engine::from_config(&config).unwrap();
        let ids: Vec<_> = engine.sources().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn empty_source_list_is_rejected() {
        assert!(matches!(
            Engine::with_sources(Vec::new(), Arc::new(FeedCache::new()), Duration::from_secs(1), Duration::from_secs(2)),
            Err(Error::NoSourcesConfigured)
        ));
    }
}
