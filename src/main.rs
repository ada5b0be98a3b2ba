mod ai;
mod app;
mod config;
mod dom;
mod domain;
mod feed;
mod host;
mod infrastructure;
mod relay;
mod report;
mod tasks;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::FeedGuardApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
