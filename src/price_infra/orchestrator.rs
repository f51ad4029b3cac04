use std::collections::HashMap;
use tokio::time::Instant;
use crate::error::{Error, Result};
use crate::observability::metrics::{FETCH_FAILURES, PARSE_FAILURES};
use crate::price_infra::RawPayload;
use crate::price_infra::source::QuoteSource;
use crate::types::quote::Quote;

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedQuote {
    pub quote: Quote,
    pub strategy: String,
}

/// Runs a source's strategies in priority order and returns the first
/// complete quote.
///
/// Endpoints are fetched lazily, at most once per call, the first time a
/// strategy needs them. A strategy whose endpoint could not be fetched is
/// skipped. Returns `FetchFailed` when no endpoint answered and `ParseFailed`
/// when something answered but nothing usable came out of it.
pub async fn resolve(source: &QuoteSource, deadline: Instant) -> Result<ResolvedQuote> {
    let mut fetched: HashMap<&str, std::result::Result<RawPayload, String>> = HashMap::new();

    for strategy in &source.strategies {
        let Some(endpoint) = source.endpoint(strategy.endpoint()) else {
            let name = strategy.endpoint().unwrap_or("<first>");
            tracing::warn!("Source {}: strategy {} has no endpoint {}", source.id, strategy.name(), name);
            fetched
                .entry(name)
                .or_insert_with(|| Err(Error::UnknownEndpoint(name.to_string()).to_string()));
            continue;
        };

        if !fetched.contains_key(endpoint.name.as_str()) {
            let outcome = endpoint.adapter.fetch(&endpoint.url, deadline).await;
            if let Err(e) = &outcome {
                FETCH_FAILURES.inc();
                tracing::warn!("Source {}: fetching {} failed: {}", source.id, endpoint.name, e);
            }
            fetched.insert(endpoint.name.as_str(), outcome.map_err(|e| e.to_string()));
        }

        let Some(Ok(payload)) = fetched.get(endpoint.name.as_str()) else {
            continue;
        };

        match strategy.apply(payload) {
            Some(quote) if quote.is_complete() => {
                tracing::debug!("Source {}: strategy {} produced {:?}", source.id, strategy.name(), quote);
                return Ok(ResolvedQuote {
                    quote,
                    strategy: strategy.name().to_string(),
                });
            }
            Some(quote) => {
                tracing::debug!("Source {}: strategy {} gave incomplete {:?}", source.id, strategy.name(), quote);
            }
            None => {
                tracing::debug!("Source {}: strategy {} did not match", source.id, strategy.name());
            }
        }
    }

    if fetched.values().any(|outcome| outcome.is_ok()) {
        PARSE_FAILURES.inc();
        return Err(Error::ParseFailed {
            source_id: source.id.clone(),
        });
    }

    let reason = fetched
        .iter()
        .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| format!("{}: {}", name, e)))
        .collect::<Vec<_>>()
        .join("; ");

    Err(Error::FetchFailed {
        source_id: source.id.clone(),
        reason: if reason.is_empty() { "no endpoint fetched".to_string() } else { reason },
    })
}
