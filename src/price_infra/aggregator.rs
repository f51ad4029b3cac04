use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::Instrument;
use crate::error::Error;
use crate::observability::metrics::{
    AGGREGATION_LATENCY, QUOTES_RESOLVED, SOURCES_UNAVAILABLE, SOURCE_LATENCY, SOURCE_TIMEOUTS,
};
use crate::observability::tracing::{trace_aggregation, trace_source_resolution};
use crate::price_infra::orchestrator::resolve;
use crate::price_infra::source::QuoteSource;
use crate::types::quote::{AggregateReport, SourceResult, UnavailableReason};

/// Fans out one resolution task per source and gathers the results in
/// configuration order.
///
/// ## Deadlines
/// - **Per source**: the source's own override, else `per_source_timeout`;
///   exceeding it yields `Unavailable(TimedOut)` for that source only
/// - **Overall**: upper bound on the whole call; sources still pending when it
///   passes are aborted and reported as `Unavailable(Cancelled)`
///
/// The call returns as soon as the slowest task settles, never later than the
/// overall deadline. Panics and errors inside one task never affect siblings.
#[derive(Clone, Debug, Default)]
pub struct QuoteAggregator;

impl QuoteAggregator {
    pub fn new() -> Self {
        QuoteAggregator
    }

    pub async fn aggregate_all(
        &self,
        sources: &[Arc<QuoteSource>],
        per_source_timeout: Duration,
        overall_timeout: Duration,
    ) -> AggregateReport {
        let started = Instant::now();
        let overall_deadline = started + overall_timeout;
        let span = trace_aggregation(sources.len());

        let handles: Vec<(String, JoinHandle<SourceResult>)> = sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let budget = source.per_source_timeout.unwrap_or(per_source_timeout);
                let own_deadline = started + budget;
                let (deadline, clipped) = if own_deadline > overall_deadline {
                    (overall_deadline, true)
                } else {
                    (own_deadline, false)
                };

                let source_id = source.id.clone();
                let task_span = trace_source_resolution(&source_id);
                let handle = tokio::spawn(
                    async move { resolve_source(&source, deadline, clipped).await }.instrument(task_span),
                );
                (source_id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (source_id, mut handle) in handles {
            let result = match timeout_at(overall_deadline, &mut handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    let cause = if join_error.is_panic() {
                        span.in_scope(|| tracing::error!("Source {} panicked during resolution", source_id));
                        UnavailableReason::Panicked
                    } else {
                        UnavailableReason::Cancelled
                    };
                    SourceResult::unavailable(source_id, cause)
                }
                Err(_) => {
                    handle.abort();
                    span.in_scope(|| tracing::warn!("Source {} still pending at overall deadline", source_id));
                    SourceResult::unavailable(source_id, UnavailableReason::Cancelled)
                }
            };

            if result.outcome.is_available() {
                QUOTES_RESOLVED.inc();
            } else {
                SOURCES_UNAVAILABLE.inc();
            }
            results.push(result);
        }

        AGGREGATION_LATENCY.observe(started.elapsed().as_secs_f64());
        span.in_scope(|| {
            tracing::info!(
                "Aggregated {} source(s), {} available, in {:?}",
                results.len(),
                results.iter().filter(|r| r.outcome.is_available()).count(),
                started.elapsed()
            )
        });

        AggregateReport { results }
    }
}

async fn resolve_source(source: &QuoteSource, deadline: Instant, clipped: bool) -> SourceResult {
    let started = Instant::now();

    let result = match timeout_at(deadline, resolve(source, deadline)).await {
        Ok(Ok(resolved)) => SourceResult::available(&source.id, resolved.quote, resolved.strategy),
        Ok(Err(Error::ParseFailed { .. })) => {
            SourceResult::unavailable(&source.id, UnavailableReason::ParseFailed)
        }
        Ok(Err(e)) => SourceResult::unavailable(&source.id, UnavailableReason::FetchFailed(e.to_string())),
        Err(_) if clipped => {
            tracing::warn!("Source {} cut off by the overall deadline", source.id);
            SourceResult::unavailable(&source.id, UnavailableReason::Cancelled)
        }
        Err(_) => {
            SOURCE_TIMEOUTS.inc();
            tracing::warn!("Source {} timed out", source.id);
            SourceResult::unavailable(&source.id, UnavailableReason::TimedOut)
        }
    };

    SOURCE_LATENCY.observe(started.elapsed().as_secs_f64());
    result
}
