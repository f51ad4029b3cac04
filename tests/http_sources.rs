use std::io::{Cursor, Write};
use quote_infra::{AppConfig, Engine, Quote, QuoteOutcome, UnavailableReason};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RATES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rates>
  <item><from>USDT</from><to>RUB</to><in>1</in><out>77.25</out></item>
  <item><from>RUB</from><to>USDT</to><in>1</in><out>0.0125</out></item>
</rates>"#;

fn abcex_config(base: &str) -> String {
    format!(
        r#"
        [engine]
        per_source_timeout_ms = 2000
        overall_timeout_ms = 5000

        [[sources]]
        id = "abcex"
        transport = "json_api"

        [[sources.endpoints]]
        name = "depth"
        url = "{base}/depth"

        [[sources.endpoints]]
        name = "rates"
        url = "{base}/rates"
        transport = "html_scrape"

        [[sources.strategies]]
        kind = "order_book"
        name = "depth"
        endpoint = "depth"

        [[sources.strategies]]
        kind = "xml_cross_rate"
        name = "rates"
        endpoint = "rates"
        base = "USDT"
        quote = "RUB"
        sidedness = "buy_is_ask"
        round_dp = 2
        "#
    )
}

fn engine(toml_src: &str) -> Engine {
    let config = AppConfig::from_toml_str(toml_src).unwrap();
    Engine::from_config(&config).unwrap()
}

#[tokio::test]
async fn order_book_endpoint_is_preferred() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/depth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "bids": [["77.10", "5"]], "asks": [["77.30", "2"]] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RATES_XML))
        .expect(0)
        .mount(&server)
        .await;

    let report = engine(&abcex_config(&server.uri())).refresh().await;

    let result = report.get("abcex").unwrap();
    assert_eq!(result.strategy_used.as_deref(), Some("depth"));
    let quote = result.quote().unwrap();
    assert_eq!((quote.bid, quote.ask), (Some(77.10), Some(77.30)));
    assert_eq!((quote.bid_size, quote.ask_size), (Some(5.0), Some(2.0)));
}

#[tokio::test]
async fn failing_depth_falls_back_to_rates_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/depth"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RATES_XML))
        .expect(1)
        .mount(&server)
        .await;

    let report = engine(&abcex_config(&server.uri())).refresh().await;

    let result = report.get("abcex").unwrap();
    assert_eq!(result.strategy_used.as_deref(), Some("rates"));
    assert_eq!(result.quote(), Some(&Quote::new(77.25, 80.0)));
}

#[tokio::test]
async fn empty_book_with_broken_rates_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/depth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "bids": [], "asks": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rates><item>"))
        .mount(&server)
        .await;

    let report = engine(&abcex_config(&server.uri())).refresh().await;

    assert_eq!(
        report.get("abcex").unwrap().outcome,
        QuoteOutcome::Unavailable { cause: UnavailableReason::ParseFailed }
    );
}

#[tokio::test]
async fn both_endpoints_down_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let report = engine(&abcex_config(&server.uri())).refresh().await;

    assert!(matches!(
        report.get("abcex").unwrap().outcome,
        QuoteOutcome::Unavailable { cause: UnavailableReason::FetchFailed(_) }
    ));
}

#[tokio::test]
async fn scraped_page_skips_implausible_numbers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/usdt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                 <span class="buy">2024</span>
                 <span class="buy">78,40</span>
                 <span class="sell">77,05</span>
               </body></html>"#,
        ))
        .mount(&server)
        .await;

    let config = format!(
        r#"
        [engine]
        per_source_timeout_ms = 2000
        overall_timeout_ms = 5000

        [[sources]]
        id = "exchanger"
        transport = "html_scrape"

        [[sources.endpoints]]
        name = "page"
        url = "{}/usdt"

        [[sources.strategies]]
        kind = "html_pattern"
        name = "page"
        buy_pattern = 'class="buy">\s*([0-9][0-9 .,]*)<'
        sell_pattern = 'class="sell">\s*([0-9][0-9 .,]*)<'
        sidedness = "buy_is_ask"

        [sources.strategies.range]
        min = 10.0
        max = 1000.0
        "#,
        server.uri()
    );

    let report = engine(&config).refresh().await;

    let quote = report.get("exchanger").unwrap().quote().unwrap();
    assert_eq!(quote.ask, Some(78.40));
    assert_eq!(quote.bid, Some(77.05));
}

fn zipped(name: &str, body: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(name, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(body.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn bulk_archive_is_downloaded_once_within_ttl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(zipped("rates.xml", RATES_XML)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = format!(
        r#"
        [engine]
        per_source_timeout_ms = 2000
        overall_timeout_ms = 5000

        [[sources]]
        id = "feed"
        transport = "bulk_archive"

        [sources.archive]
        ttl_secs = 600
        members = ["rates.xml"]

        [[sources.endpoints]]
        name = "zip"
        url = "{}/feed.zip"

        [[sources.strategies]]
        kind = "xml_cross_rate"
        name = "rates"
        member = "rates.xml"
        base = "USDT"
        quote = "RUB"
        sidedness = "buy_is_ask"
        "#,
        server.uri()
    );

    let engine = engine(&config);
    let first = engine.refresh().await;
    let second = engine.refresh().await;

    for report in [first, second] {
        let quote = report.get("feed").unwrap().quote().copied().unwrap();
        assert_eq!(quote.bid, Some(77.25));
        assert!((quote.ask.unwrap() - 80.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn slow_source_does_not_block_fast_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "bid": 1.0, "ask": 2.0 }))
                .set_delay(std::time::Duration::from_secs(10)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "bid": 77.1, "ask": 77.3 })))
        .mount(&server)
        .await;

    let source = |id: &str| {
        format!(
            r#"
            [[sources]]
            id = "{id}"
            transport = "json_api"

            [[sources.endpoints]]
            name = "ticker"
            url = "{base}/{id}"

            [[sources.strategies]]
            kind = "json_fields"
            name = "ticker"
            buy = ["bid"]
            sell = ["ask"]
            sidedness = "buy_is_bid"
            "#,
            base = server.uri()
        )
    };
    let config = format!(
        "[engine]\nper_source_timeout_ms = 500\noverall_timeout_ms = 3000\n{}{}",
        source("slow"),
        source("fast")
    );

    let started = std::time::Instant::now();
    let report = engine(&config).refresh().await;

    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert_eq!(report.source_ids(), vec!["slow", "fast"]);
    assert!(!report.results[0].outcome.is_available());
    assert_eq!(report.results[1].quote(), Some(&Quote::new(77.1, 77.3)));
}
