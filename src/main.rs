use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use serde_json::json;
use url::Url;

use sybau_guard::{
    config,
    dom::{html, Viewport},
    infrastructure::{directories, logging, shutdown},
    Detector,
};

/// Scans a page the way a reader scrolls through it, sends the visible text
/// for classification and marks what gets flagged.
#[derive(Debug, Parser)]
#[command(name = "sybau-guard", version)]
struct Cli {
    /// HTML file or http(s) URL.
    page: String,
    /// Overrides SYBAU_API_URL.
    #[arg(long)]
    api_url: Option<String>,
    /// Pixels scrolled per step.
    #[arg(long, default_value_t = 400.0)]
    scroll_step: f64,
    #[arg(long, default_value_t = 250)]
    scroll_interval_ms: u64,
    #[arg(long, default_value_t = 720.0)]
    viewport_height: f64,
    /// Writes the annotated page here.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(url) = &cli.api_url {
        std::env::set_var("SYBAU_API_URL", url);
    }
    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let source = load_page(&cli.page).await?;
    let mut doc = html::parse_html(&source);
    let viewport = Viewport {
        height: cli.viewport_height,
        ..doc.viewport()
    };
    doc.set_viewport(viewport);
    let page_height = html::layout_blocks(&mut doc, viewport.width);
    let max_scroll = (page_height - viewport.height).max(0.0);
    tracing::info!(page = %cli.page, page_height, "page loaded");

    let page = doc.into_page();
    let detector = Detector::with_http(config.detector.clone(), page.clone())?;
    detector.start()?;

    let mut listener = shutdown.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.scroll_interval_ms.max(1)));
    let mut scroll_y = 0.0;
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = listener.notified() => {
                tracing::info!("shutdown requested (CTRL+C / SIGTERM)");
                interrupted = true;
                break;
            }
            _ = ticker.tick() => {
                detector.process_mutations();
                detector.refresh_visibility();
                if scroll_y >= max_scroll {
                    break;
                }
                scroll_y = (scroll_y + cli.scroll_step.max(1.0)).min(max_scroll);
                page.lock().scroll_to(scroll_y);
            }
        }
    }

    if !interrupted {
        tokio::select! {
            _ = listener.notified() => {
                tracing::info!("shutdown requested while flushing; skipping remaining candidates");
            }
            _ = detector.flush_now() => {}
        }
    }
    detector.stop();

    let stats = detector.stats();
    let report = json!({
        "page": cli.page,
        "total": stats.total,
        "flagged": stats.flagged,
        "clean": stats.clean,
        "errors": stats.errors,
        "flagged_percent": stats.flagged_percent(),
        "clean_percent": stats.clean_percent(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(output) = &cli.output {
        let annotated = html::to_html(&page.lock());
        tokio::fs::write(output, annotated)
            .await
            .with_context(|| format!("failed to write {}", output.display()))?;
        tracing::info!(output = %output.display(), "annotated page written");
    }

    detector.shutdown(Duration::from_secs(5)).await;
    tracing::info!(%stats, "done");
    Ok(())
}

async fn load_page(source: &str) -> Result<String> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let client = Client::builder()
                .user_agent(format!("sybau-guard/{}", env!("CARGO_PKG_VERSION")))
                .build()?;
            let body = client
                .get(url)
                .send()
                .await
                .with_context(|| format!("failed to fetch {source}"))?
                .error_for_status()?
                .text()
                .await?;
            Ok(body)
        }
        _ => tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("failed to read {source}")),
    }
}
