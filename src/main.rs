use std::error::Error;

use file_info_engine::{EngineConfig, GitLabPage, resolve_gitlab_page};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file when present.
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,file_info_engine=debug"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let snapshot_path = std::env::args()
        .nth(1)
        .ok_or("usage: file-info-backend <page-snapshot.json>")?;
    let raw = std::fs::read_to_string(&snapshot_path)?;
    let page: GitLabPage = serde_json::from_str(&raw)?;

    let cfg = EngineConfig::from_env()?;
    match resolve_gitlab_page(&cfg, &page).await? {
        Some(descriptor) => println!("{}", serde_json::to_string_pretty(&descriptor)?),
        None => info!(url = %page.url, "page shows no file"),
    }

    Ok(())
}
