use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-of-book quote. Only a quote with both sides present is usable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub bid_size: Option<f64>,
    pub ask_size: Option<f64>,
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Quote {
            bid: Some(bid),
            ask: Some(ask),
            bid_size: None,
            ask_size: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }

    /// Mid price, only for complete quotes.
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The source did not answer (transport, status, timeout inside the adapter).
    FetchFailed(String),
    /// The source answered but nothing usable could be extracted.
    ParseFailed,
    /// Per-source timeout elapsed.
    TimedOut,
    /// Overall deadline elapsed while the source was still pending.
    Cancelled,
    /// The resolution task panicked.
    Panicked,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuoteOutcome {
    Available { quote: Quote },
    Unavailable { cause: UnavailableReason },
}

impl QuoteOutcome {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            QuoteOutcome::Available { quote } => Some(quote),
            QuoteOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, QuoteOutcome::Available { .. })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceResult {
    pub source_id: String,
    pub outcome: QuoteOutcome,
    pub fetched_at: DateTime<Utc>,
    pub strategy_used: Option<String>,
}

impl SourceResult {
    pub fn available(source_id: impl Into<String>, quote: Quote, strategy: impl Into<String>) -> Self {
        SourceResult {
            source_id: source_id.into(),
            outcome: QuoteOutcome::Available { quote },
            fetched_at: Utc::now(),
            strategy_used: Some(strategy.into()),
        }
    }

    pub fn unavailable(source_id: impl Into<String>, cause: UnavailableReason) -> Self {
        SourceResult {
            source_id: source_id.into(),
            outcome: QuoteOutcome::Unavailable { cause },
            fetched_at: Utc::now(),
            strategy_used: None,
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.outcome.quote()
    }
}

/// One entry per configured source, in configuration order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AggregateReport {
    pub results: Vec<SourceResult>,
}

impl AggregateReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceResult> {
        self.results.iter().find(|r| r.source_id == source_id)
    }

    pub fn available(&self) -> impl Iterator<Item = (&str, &Quote)> {
        self.results
            .iter()
            .filter_map(|r| r.quote().map(|q| (r.source_id.as_str(), q)))
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.source_id.as_str()).collect()
    }
}
