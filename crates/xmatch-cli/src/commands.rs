//! Subcommand handlers.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::Path;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use xmatch_core::{AppConfig, Marketplace, SearchOptions, SourceProduct};
use xmatch_engine::Coordinator;
use xmatch_scraper::{extractor_for, Page};

/// Searches every target concurrently and prints one result per target, in
/// the order the targets were given.
///
/// Ctrl-C cancels every in-flight request; each still resolves and cleans up.
///
/// # Errors
///
/// Returns an error if the coordinator cannot be built or the output cannot
/// be serialized. Per-target failures are part of the printed results.
pub(crate) async fn run_match(
    config: &AppConfig,
    source: &SourceProduct,
    targets: &[Marketplace],
    options: SearchOptions,
) -> anyhow::Result<()> {
    let coordinator =
        Coordinator::from_app_config(config).context("failed to build match coordinator")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    let coordinator = &coordinator;
    let results: Vec<serde_json::Value> = stream::iter(targets.iter().copied())
        .map(|target| {
            let options = options.clone();
            let cancel = cancel.clone();
            async move {
                let result = coordinator
                    .find_match_with_cancel(source, target, Some(options), cancel)
                    .await;
                serde_json::json!({ "target": target, "result": result })
            }
        })
        .buffered(targets.len().max(1))
        .collect()
        .await;

    let matched = results
        .iter()
        .filter(|r| r["result"]["success"] == true)
        .count();
    tracing::info!(targets = targets.len(), matched, "match run complete");

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Prints the search URL for `source` on `target`.
///
/// # Errors
///
/// Returns an error if `target` has no search adapter.
pub(crate) fn run_query(
    config: &AppConfig,
    source: &SourceProduct,
    target: Marketplace,
    options: &SearchOptions,
) -> anyhow::Result<()> {
    let url = xmatch_engine::build_search_url(source, target, options, &config.endpoints)?;
    println!("{url}");
    Ok(())
}

/// Runs the `marketplace` extractor over a saved page and prints the report.
///
/// # Errors
///
/// Returns an error if the file cannot be read or `marketplace` has no
/// extractor.
pub(crate) fn run_extract(
    config: &AppConfig,
    marketplace: Marketplace,
    file: &Path,
    page_url: Option<&str>,
) -> anyhow::Result<()> {
    let extractor = extractor_for(marketplace)?;
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let url = match page_url {
        Some(url) => url.to_owned(),
        None => config
            .endpoints
            .base_url(marketplace)
            .map(|base| format!("{base}/"))
            .unwrap_or_default(),
    };

    let report = extractor.extract_report(&Page::new(url, html));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
