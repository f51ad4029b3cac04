use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Wrapper keys that APIs commonly nest their real payload under.
/// At most one of these levels is unwrapped.
pub const ENVELOPE_KEYS: &[&str] = &["data", "result"];

/// Dotted lookup path into a JSON value, e.g. `ticker.bid` or `bids.0.0`.
/// Numeric segments index arrays; any segment indexes objects by key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new(path: &str) -> Self {
        KeyPath(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    pub fn list(paths: &[&str]) -> Vec<KeyPath> {
        paths.iter().map(|p| KeyPath::new(p)).collect()
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        KeyPath::new(&path)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.0.join(".")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Inclusive bounds a price must fall within to be believed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    pub fn new(min: f64, max: f64) -> Self {
        PlausibleRange { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

impl Default for PlausibleRange {
    fn default() -> Self {
        PlausibleRange {
            min: 1e-9,
            max: 1e12,
        }
    }
}

/// Returns the first candidate that resolves to an in-range number.
///
/// Candidates are tried against `value` itself, then against the contents of
/// the first envelope key that holds a match. Never panics.
pub fn extract(value: &Value, candidates: &[KeyPath], range: PlausibleRange) -> Option<f64> {
    first_match(value, candidates, range).or_else(|| {
        ENVELOPE_KEYS
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(|inner| first_match(inner, candidates, range))
    })
}

/// The envelope-unwrapped value a path resolves against, without coercion.
pub fn locate<'a>(value: &'a Value, candidates: &[KeyPath]) -> Option<&'a Value> {
    let direct = |v: &'a Value| candidates.iter().find_map(|path| path.lookup(v));
    direct(value).or_else(|| {
        ENVELOPE_KEYS
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(direct)
    })
}

fn first_match(value: &Value, candidates: &[KeyPath], range: PlausibleRange) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|path| path.lookup(value))
        .filter_map(coerce_number)
        .find(|n| range.contains(*n))
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => coerce_str(s),
        _ => None,
    }
}

/// Parses locale-formatted numbers: `" 77,25 "`, `"1 234.5"`, `"77.30"`.
/// A comma is read as the decimal separator only when no dot is present.
pub fn coerce_str(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let normalized = if compact.contains('.') {
        compact
    } else {
        compact.replacen(',', ".", 1)
    };

    normalized.parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn in_range(value: Option<f64>, range: PlausibleRange) -> Option<f64> {
    value.filter(|v| range.contains(*v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn wide() -> PlausibleRange {
        PlausibleRange::new(1.0, 10_000.0)
    }

    #[test]
    fn coerces_locale_variants() {
        assert_eq!(coerce_str("77,25"), Some(77.25));
        assert_eq!(coerce_str(" 77.30 "), Some(77.30));
        assert_eq!(coerce_str("1\u{a0}234,5"), Some(1234.5));
        assert_eq!(coerce_str("1,234.5"), None);
        assert_eq!(coerce_str("1,2,3"), None);
        assert_eq!(coerce_str(""), None);
        assert_eq!(coerce_str("abc"), None);
        assert_eq!(coerce_str("NaN"), None);
        assert_eq!(coerce_str("inf"), None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let value = json!({ "a": "1e9", "b": "-5", "c": "77,25" });
        assert_eq!(extract(&value, &KeyPath::list(&["a"]), wide()), None);
        assert_eq!(extract(&value, &KeyPath::list(&["b"]), wide()), None);
        assert_eq!(extract(&value, &KeyPath::list(&["a", "b", "c"]), wide()), Some(77.25));
    }

    #[test]
    fn candidates_are_tried_in_order() {
        let value = json!({ "bestBid": 77.1, "bid": "77.0" });
        assert_eq!(extract(&value, &KeyPath::list(&["bid", "bestBid"]), wide()), Some(77.0));
        assert_eq!(extract(&value, &KeyPath::list(&["missing", "bestBid"]), wide()), Some(77.1));
    }

    #[test]
    fn unwraps_exactly_one_envelope() {
        let one = json!({ "data": { "bid": "77,1" } });
        assert_eq!(extract(&one, &KeyPath::list(&["bid"]), wide()), Some(77.1));

        let two = json!({ "data": { "data": { "bid": 77.1 } } });
        assert_eq!(extract(&two, &KeyPath::list(&["bid"]), wide()), None);

        let result = json!({ "result": { "ticker": { "ask": 10 } } });
        assert_eq!(extract(&result, &KeyPath::list(&["ticker.ask"]), wide()), Some(10.0));
    }

    #[test]
    fn root_match_wins_over_envelope() {
        let value = json!({ "bid": 50, "data": { "bid": 60 } });
        assert_eq!(extract(&value, &KeyPath::list(&["bid"]), wide()), Some(50.0));
    }

    #[test]
    fn indexes_arrays_by_numeric_segment() {
        let value = json!({ "bids": [["77.10", "3.5"], ["77.00", "1"]] });
        assert_eq!(extract(&value, &KeyPath::list(&["bids.0.0"]), wide()), Some(77.10));
        assert_eq!(extract(&value, &KeyPath::list(&["bids.1.1"]), wide()), Some(1.0));
        assert_eq!(extract(&value, &KeyPath::list(&["bids.9.0"]), wide()), None);
        assert_eq!(extract(&value, &KeyPath::list(&["bids.x.0"]), wide()), None);
    }

    #[test]
    fn mixed_types_are_absent() {
        let value = json!({ "a": true, "b": null, "c": [1], "d": { "e": 1 }, "f": "  " });
        assert_eq!(extract(&value, &KeyPath::list(&["a", "b", "c", "d", "f"]), wide()), None);
        assert_eq!(extract(&json!(42), &KeyPath::list(&["a"]), wide()), None);
        assert_eq!(extract(&json!("77"), &KeyPath::list(&["a"]), wide()), None);
    }

    #[test]
    fn key_path_round_trips_through_string() {
        let path: KeyPath = serde_json::from_value(json!("ticker.bids.0")).unwrap();
        assert_eq!(path.to_string(), "ticker.bids.0");
        assert_eq!(serde_json::to_value(&path).unwrap(), json!("ticker.bids.0"));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<f64>().prop_map(|f| json!(f)),
            any::<i64>().prop_map(|i| json!(i)),
            ".{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::hash_map("(data|result|bid|ask|[a-z0-9]{1,4})", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn extract_never_panics_and_respects_range(
            value in arb_json(),
            paths in prop::collection::vec("[a-z0-9.]{0,10}", 0..5),
        ) {
            let candidates: Vec<KeyPath> = paths.iter().map(|p| KeyPath::new(p)).collect();
            if let Some(found) = extract(&value, &candidates, wide()) {
                prop_assert!(wide().contains(found));
            }
        }

        #[test]
        fn coerce_str_never_panics(raw in ".{0,24}") {
            if let Some(found) = coerce_str(&raw) {
                prop_assert!(found.is_finite());
            }
        }
    }
}
