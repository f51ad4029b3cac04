use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::{Error, Result};
use crate::price_infra::RawPayload;
use crate::price_infra::extractor::{self, KeyPath, PlausibleRange};
use crate::types::quote::Quote;
use crate::types::side::Sidedness;

/// A pure function from a raw payload to a (possibly partial) quote.
///
/// Returning a one-sided quote is allowed; the orchestrator only accepts
/// complete ones and moves on to the next strategy otherwise.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Endpoint the strategy reads. `None` means the source's first endpoint.
    fn endpoint(&self) -> Option<&str>;

    fn apply(&self, payload: &RawPayload) -> Option<Quote>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BestLevel {
    /// Trust the venue's sort order and take the first parseable level.
    #[default]
    First,
    /// Highest bid / lowest ask across all levels.
    Scan,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    OrderBook {
        name: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        member: Option<String>,
        #[serde(default = "default_bid_keys")]
        bids: Vec<KeyPath>,
        #[serde(default = "default_ask_keys")]
        asks: Vec<KeyPath>,
        #[serde(default)]
        best: BestLevel,
        #[serde(default)]
        range: PlausibleRange,
    },
    JsonFields {
        name: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        member: Option<String>,
        buy: Vec<KeyPath>,
        sell: Vec<KeyPath>,
        #[serde(default)]
        buy_size: Vec<KeyPath>,
        #[serde(default)]
        sell_size: Vec<KeyPath>,
        sidedness: Sidedness,
        #[serde(default)]
        range: PlausibleRange,
    },
    HtmlPattern {
        name: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        member: Option<String>,
        buy_pattern: String,
        sell_pattern: String,
        sidedness: Sidedness,
        #[serde(default)]
        range: PlausibleRange,
    },
    XmlCrossRate {
        name: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        member: Option<String>,
        base: String,
        quote: String,
        #[serde(default = "default_item_tag")]
        item_tag: String,
        #[serde(default = "default_from_tag")]
        from_tag: String,
        #[serde(default = "default_to_tag")]
        to_tag: String,
        #[serde(default = "default_value_tag")]
        value_tag: String,
        sidedness: Sidedness,
        #[serde(default)]
        round_dp: Option<u32>,
        #[serde(default)]
        range: PlausibleRange,
    },
}

fn default_bid_keys() -> Vec<KeyPath> {
    KeyPath::list(&["bids", "bid", "buy"])
}

fn default_ask_keys() -> Vec<KeyPath> {
    KeyPath::list(&["asks", "ask", "sell"])
}

fn default_item_tag() -> String {
    "item".to_string()
}

fn default_from_tag() -> String {
    "from".to_string()
}

fn default_to_tag() -> String {
    "to".to_string()
}

fn default_value_tag() -> String {
    "out".to_string()
}

impl StrategyConfig {
    pub fn name(&self) -> &str {
        match self {
            StrategyConfig::OrderBook { name, .. }
            | StrategyConfig::JsonFields { name, .. }
            | StrategyConfig::HtmlPattern { name, .. }
            | StrategyConfig::XmlCrossRate { name, .. } => name,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            StrategyConfig::OrderBook { endpoint, .. }
            | StrategyConfig::JsonFields { endpoint, .. }
            | StrategyConfig::HtmlPattern { endpoint, .. }
            | StrategyConfig::XmlCrossRate { endpoint, .. } => endpoint.as_deref(),
        }
    }

    fn range(&self) -> PlausibleRange {
        match self {
            StrategyConfig::OrderBook { range, .. }
            | StrategyConfig::JsonFields { range, .. }
            | StrategyConfig::HtmlPattern { range, .. }
            | StrategyConfig::XmlCrossRate { range, .. } => *range,
        }
    }

    pub fn build(&self) -> Result<Box<dyn ExtractionStrategy>> {
        if !self.range().is_valid() {
            return Err(Error::ConfigError(format!(
                "strategy {}: invalid plausible range {:?}",
                self.name(),
                self.range()
            )));
        }

        let strategy: Box<dyn ExtractionStrategy> = match self.clone() {
            StrategyConfig::OrderBook { name, endpoint, member, bids, asks, best, range } => {
                Box::new(OrderBookStrategy { name, endpoint, member, bids, asks, best, range })
            }
            StrategyConfig::JsonFields {
                name, endpoint, member, buy, sell, buy_size, sell_size, sidedness, range,
            } => Box::new(JsonFieldsStrategy {
                name, endpoint, member, buy, sell, buy_size, sell_size, sidedness, range,
            }),
            StrategyConfig::HtmlPattern {
                name, endpoint, member, buy_pattern, sell_pattern, sidedness, range,
            } => Box::new(HtmlPatternStrategy {
                buy_pattern: compile(&name, &buy_pattern)?,
                sell_pattern: compile(&name, &sell_pattern)?,
                name, endpoint, member, sidedness, range,
            }),
            StrategyConfig::XmlCrossRate {
                name, endpoint, member, base, quote, item_tag, from_tag, to_tag, value_tag,
                sidedness, round_dp, range,
            } => Box::new(XmlCrossRateStrategy {
                name, endpoint, member, base, quote, item_tag, from_tag, to_tag, value_tag,
                sidedness, round_dp, range,
            }),
        };
        Ok(strategy)
    }
}

fn compile(strategy: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::ConfigError(format!("strategy {}: bad pattern {:?}: {}", strategy, pattern, e)))
}

const LEVEL_PRICE_KEYS: &[&str] = &["0", "price", "rate", "p"];
const LEVEL_SIZE_KEYS: &[&str] = &["1", "amount", "size", "quantity", "volume", "q"];

/// Top of book from `bids` / `asks` ladders.
pub struct OrderBookStrategy {
    pub name: String,
    pub endpoint: Option<String>,
    pub member: Option<String>,
    pub bids: Vec<KeyPath>,
    pub asks: Vec<KeyPath>,
    pub best: BestLevel,
    pub range: PlausibleRange,
}

impl OrderBookStrategy {
    fn best_level(&self, levels: &[Value], higher_is_better: bool) -> Option<(f64, Option<f64>)> {
        let price_keys = KeyPath::list(LEVEL_PRICE_KEYS);
        let size_keys = KeyPath::list(LEVEL_SIZE_KEYS);
        let size_range = PlausibleRange::new(0.0, f64::MAX);

        let mut parsed = levels.iter().filter_map(|level| {
            let price = extractor::extract(level, &price_keys, self.range)?;
            Some((price, extractor::extract(level, &size_keys, size_range)))
        });

        match self.best {
            BestLevel::First => parsed.next(),
            BestLevel::Scan => parsed.reduce(|best, candidate| {
                let better = if higher_is_better {
                    candidate.0 > best.0
                } else {
                    candidate.0 < best.0
                };
                if better { candidate } else { best }
            }),
        }
    }
}

impl ExtractionStrategy for OrderBookStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn apply(&self, payload: &RawPayload) -> Option<Quote> {
        let book = payload.json(self.member.as_deref())?;

        let side = |keys: &[KeyPath], higher_is_better: bool| {
            extractor::locate(&book, keys)
                .and_then(Value::as_array)
                .and_then(|levels| self.best_level(levels, higher_is_better))
        };
        let bid = side(&self.bids, true);
        let ask = side(&self.asks, false);

        Some(Quote {
            bid: bid.map(|(price, _)| price),
            ask: ask.map(|(price, _)| price),
            bid_size: bid.and_then(|(_, size)| size),
            ask_size: ask.and_then(|(_, size)| size),
        })
    }
}

/// Labelled buy/sell prices at known (or guessable) JSON paths.
pub struct JsonFieldsStrategy {
    pub name: String,
    pub endpoint: Option<String>,
    pub member: Option<String>,
    pub buy: Vec<KeyPath>,
    pub sell: Vec<KeyPath>,
    pub buy_size: Vec<KeyPath>,
    pub sell_size: Vec<KeyPath>,
    pub sidedness: Sidedness,
    pub range: PlausibleRange,
}

impl ExtractionStrategy for JsonFieldsStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn apply(&self, payload: &RawPayload) -> Option<Quote> {
        let value = payload.json(self.member.as_deref())?;
        let size_range = PlausibleRange::new(0.0, f64::MAX);

        let (bid, ask) = self.sidedness.to_bid_ask(
            extractor::extract(&value, &self.buy, self.range),
            extractor::extract(&value, &self.sell, self.range),
        );
        let (bid_size, ask_size) = self.sidedness.to_bid_ask(
            extractor::extract(&value, &self.buy_size, size_range),
            extractor::extract(&value, &self.sell_size, size_range),
        );

        Some(Quote { bid, ask, bid_size, ask_size })
    }
}

/// Scrapes labelled prices out of markup with regular expressions.
pub struct HtmlPatternStrategy {
    pub name: String,
    pub endpoint: Option<String>,
    pub member: Option<String>,
    pub buy_pattern: Regex,
    pub sell_pattern: Regex,
    pub sidedness: Sidedness,
    pub range: PlausibleRange,
}

impl HtmlPatternStrategy {
    /// First match, in document order, that coerces to an in-range number.
    /// Out-of-range hits (page ids, years, phone numbers) are skipped.
    fn first_price(&self, pattern: &Regex, text: &str) -> Option<f64> {
        pattern.captures_iter(text).find_map(|caps| {
            let raw = caps.get(1).or_else(|| caps.get(0))?;
            extractor::in_range(extractor::coerce_str(raw.as_str()), self.range)
        })
    }
}

impl ExtractionStrategy for HtmlPatternStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn apply(&self, payload: &RawPayload) -> Option<Quote> {
        let text = payload.text(self.member.as_deref())?;
        let (bid, ask) = self.sidedness.to_bid_ask(
            self.first_price(&self.buy_pattern, &text),
            self.first_price(&self.sell_pattern, &text),
        );
        Some(Quote { bid, ask, ..Quote::default() })
    }
}

/// Derives a quote from an exchanger-style XML rates list.
///
/// The direct leg `base -> quote` is the "sell" price (quote units received
/// per base sold). The reversed leg `quote -> base` is inverted into the "buy"
/// price (quote units paid per base bought). `sidedness` maps the two onto
/// bid/ask. `round_dp` only rounds the inverted leg; the direct leg is
/// published as-is.
pub struct XmlCrossRateStrategy {
    pub name: String,
    pub endpoint: Option<String>,
    pub member: Option<String>,
    pub base: String,
    pub quote: String,
    pub item_tag: String,
    pub from_tag: String,
    pub to_tag: String,
    pub value_tag: String,
    pub sidedness: Sidedness,
    pub round_dp: Option<u32>,
    pub range: PlausibleRange,
}

impl XmlCrossRateStrategy {
    fn invert(&self, value: f64) -> Option<f64> {
        if value <= 0.0 {
            return None;
        }
        let inverted = 1.0 / value;
        let inverted = match self.round_dp {
            Some(dp) => {
                let factor = 10f64.powi(dp as i32);
                (inverted * factor).round() / factor
            }
            None => inverted,
        };
        extractor::in_range(Some(inverted), self.range)
    }
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
}

impl ExtractionStrategy for XmlCrossRateStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn apply(&self, payload: &RawPayload) -> Option<Quote> {
        let text = payload.text(self.member.as_deref())?;
        let doc = roxmltree::Document::parse(&text).ok()?;

        let mut sell = None;
        let mut buy = None;

        for item in doc.descendants().filter(|n| n.has_tag_name(self.item_tag.as_str())) {
            let (Some(from), Some(to)) = (
                child_text(item, &self.from_tag),
                child_text(item, &self.to_tag),
            ) else {
                continue;
            };
            let value = child_text(item, &self.value_tag).and_then(extractor::coerce_str);

            if sell.is_none() && from == self.base && to == self.quote {
                sell = extractor::in_range(value, self.range);
            } else if buy.is_none() && from == self.quote && to == self.base {
                buy = value.and_then(|v| self.invert(v));
            }
        }

        let (bid, ask) = self.sidedness.to_bid_ask(buy, sell);
        Some(Quote { bid, ask, ..Quote::default() })
    }
}
