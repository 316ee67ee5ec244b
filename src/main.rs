use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gmail_search::config::Config;
use gmail_search::pipeline::{CancellationFlag, Pipeline};
use gmail_search::providers::auth::TokenAuthenticator;
use gmail_search::providers::gmail::GmailProvider;
use gmail_search::providers::provider::Authenticator;
use gmail_search::services::normalizer::MessageNormalizer;
use gmail_search::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    let authenticator = TokenAuthenticator::new(
        config.access_token.clone(),
        Duration::from_secs(config.timeout_secs),
    );
    let client = authenticator.authenticate().await?;
    let provider = Arc::new(GmailProvider::new(client, config.api_base_url.clone()));
    let normalizer = Arc::new(MessageNormalizer::from_config(&config)?);
    let pipeline = Pipeline::new(provider, normalizer, &config);

    // Ctrl-C stops new fetches; whatever finished is still saved.
    let cancel = CancellationFlag::default();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight messages");
            on_signal.cancel();
        }
    });

    let report = pipeline.run(&cancel).await?;
    let written = store::persist(&config.output_dir, &report, config.save_each)?;

    if let Some(results) = written.first() {
        tracing::info!(
            path = %results.display(),
            messages = report.messages.len(),
            skipped = report.skipped.len(),
            "Done"
        );
    }
    Ok(())
}
