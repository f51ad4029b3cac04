use serde::{Deserialize, Serialize};

/// How a venue's "buy"/"sell" labels map onto bid/ask.
///
/// Scraped sources disagree: some publish "buy" as the price they pay you
/// (the bid), others as the price you pay them (the ask). Every strategy
/// reading labelled prices must state which convention it follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sidedness {
    BuyIsBid,
    BuyIsAsk,
}

impl Sidedness {
    /// Maps labelled (buy, sell) values to (bid, ask).
    pub fn to_bid_ask<T>(self, buy: T, sell: T) -> (T, T) {
        match self {
            Sidedness::BuyIsBid => (buy, sell),
            Sidedness::BuyIsAsk => (sell, buy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_labels_to_sides() {
        assert_eq!(Sidedness::BuyIsBid.to_bid_ask(1, 2), (1, 2));
        assert_eq!(Sidedness::BuyIsAsk.to_bid_ask(1, 2), (2, 1));
    }
}
