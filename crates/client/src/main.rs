//! Delivery agent binary.
//!
//! Reads configuration from the environment (and `.env`), then runs one or
//! two agents against the in-process arena.
//!
//! ```bash
//! COURIER_MODE=duo COURIER_TICKS=600 cargo run -p courier-client
//! ```
use anyhow::Result;

use courier_client::{ArenaMap, ClientConfig, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = ClientConfig::from_env();
    let _guard = logging::setup_logging(config.log_dir.as_deref())?;

    let map = match &config.arena_map {
        Some(path) => ArenaMap::load(path)?,
        None => ArenaMap::demo()?,
    };

    tracing::info!("Starting courier: {:?}", config);
    let summary = courier_client::run(&config, map).await?;
    tracing::info!("Delivered {} over {} ticks", summary.total(), summary.ticks);
    Ok(())
}
