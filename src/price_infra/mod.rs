pub mod extractor;
pub mod strategy;
pub mod connectors;
pub mod feed_cache;
pub mod source;
pub mod orchestrator;
pub mod aggregator;
pub mod engine;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;
use crate::price_infra::strategy::StrategyConfig;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SourceConfig {
    pub id: String,
    pub transport: TransportKind,
    pub endpoints: Vec<EndpointConfig>,
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub per_source_timeout_ms: Option<u64>,
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn per_source_timeout(&self) -> Option<Duration> {
        self.per_source_timeout_ms.map(Duration::from_millis)
    }

    pub fn endpoint_transport(&self, endpoint: &EndpointConfig) -> TransportKind {
        endpoint.transport.unwrap_or(self.transport)
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    JsonApi,
    HtmlScrape,
    BulkArchive,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub transport: Option<TransportKind>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ArchiveConfig {
    pub ttl_secs: u64,
    pub members: Vec<String>,
    /// Upper bound on one decompressed member, whatever its header claims.
    #[serde(default = "default_max_member_bytes")]
    pub max_member_bytes: u64,
}

fn default_max_member_bytes() -> u64 {
    64 * 1024 * 1024
}

impl ArchiveConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// What a transport hands to the extraction strategies.
#[derive(Clone, Debug, PartialEq)]
pub enum RawPayload {
    Json(Value),
    Markup(String),
    Archive(BTreeMap<String, Vec<u8>>),
}

impl RawPayload {
    /// JSON view of the payload. Markup bodies and archive members are
    /// parsed on demand; anything that is not JSON yields `None`.
    pub fn json(&self, member: Option<&str>) -> Option<Cow<'_, Value>> {
        match self {
            RawPayload::Json(value) => Some(Cow::Borrowed(value)),
            RawPayload::Markup(text) => serde_json::from_str(text).ok().map(Cow::Owned),
            RawPayload::Archive(_) => {
                let bytes = self.member_bytes(member)?;
                serde_json::from_slice(bytes).ok().map(Cow::Owned)
            }
        }
    }

    /// Text view of the payload; JSON payloads have none.
    pub fn text(&self, member: Option<&str>) -> Option<Cow<'_, str>> {
        match self {
            RawPayload::Json(_) => None,
            RawPayload::Markup(text) => Some(Cow::Borrowed(text.as_str())),
            RawPayload::Archive(_) => self.member_bytes(member).map(String::from_utf8_lossy),
        }
    }

    /// Named archive member, or the first one when no name is given.
    fn member_bytes(&self, member: Option<&str>) -> Option<&[u8]> {
        let RawPayload::Archive(members) = self else {
            return None;
        };
        match member {
            Some(name) => members.get(name).map(Vec::as_slice),
            None => members.values().next().map(Vec::as_slice),
        }
    }
}
