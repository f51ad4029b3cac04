use anyhow::Context;
use quote_infra::observability::metrics::{gather_text, register_metrics};
use quote_infra::observability::tracing::init_tracing;
use quote_infra::{AppConfig, Engine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::args().nth(1).unwrap_or_else(|| "development".to_string());

    let config = AppConfig::load(&env).with_context(|| format!("loading configuration for {}", env))?;
    init_tracing(&config.logging);
    register_metrics().context("registering metrics")?;

    let engine = Engine::from_config(&config).context("building quote engine")?;
    let report = engine.refresh().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!("Metrics after refresh:\n{}", gather_text().context("encoding metrics")?);
    Ok(())
}
