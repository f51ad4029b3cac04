pub mod types;
pub mod price_infra;
pub mod error;
pub mod config;
pub mod observability;

pub use crate::config::loader::AppConfig;
pub use crate::error::{Error, Result};
pub use crate::price_infra::aggregator::QuoteAggregator;
pub use crate::price_infra::engine::Engine;
pub use crate::price_infra::feed_cache::FeedCache;
pub use crate::price_infra::source::QuoteSource;
pub use crate::types::quote::{AggregateReport, Quote, QuoteOutcome, SourceResult, UnavailableReason};
