//! Smoke check against a running fraud-analysis backend: health, a sample
//! mouse analysis, and optionally a document upload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use loanguard_core::http::UPLOAD_FIELD;
use loanguard_core::types::sample_mouse_features;
use loanguard_core::{ApiConfig, HealthStatus, MultipartForm};
use loanguard_runtime::hooks::{analyze_mouse_mutation, health_query, upload_mutation};
use loanguard_runtime::logging::init_tracing;
use loanguard_runtime::AppContext;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "loanguard-probe", about = "Check that the fraud-analysis backend answers")]
struct Args {
    /// Backend base URL (defaults to $LOANGUARD_API_BASE or http://localhost:5000)
    #[arg(long)]
    base_url: Option<String>,

    /// File to send to the upload endpoint
    #[arg(long)]
    upload: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    let ctx = AppContext::init(config).context("building HTTP client")?;

    info!("checking health");
    match health_query(&ctx).fetch().await {
        Ok(decoded) => match HealthStatus::from_decoded(&decoded) {
            Some(health) => println!("health: {}", health.message),
            None => println!("health: {}", decoded.to_display_string()),
        },
        Err(e) => println!("health failed: {e}"),
    }

    info!("calling mouse analysis");
    match analyze_mouse_mutation(&ctx).mutate(sample_mouse_features()).await {
        Ok(decoded) => println!("mouse: {}", decoded.to_display_string()),
        Err(e) => println!("mouse failed: {e}"),
    }

    if let Some(path) = args.upload {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        let form = MultipartForm::new().file(UPLOAD_FIELD, file_name, None, bytes);

        info!(path = %path.display(), "uploading");
        match upload_mutation(&ctx).mutate(form).await {
            Ok(decoded) => println!("upload: {}", decoded.to_display_string()),
            Err(e) => println!("upload failed: {e}"),
        }
    }

    ctx.teardown();
    Ok(())
}
