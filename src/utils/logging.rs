//! File logging through `tracing`
//!
//! Events go to `<data dir>/dreamsync.log`. The filter comes from `RUST_LOG`, then
//! `DREAMSYNC_LOGLEVEL`, then a default that keeps the HTTP and websocket stacks quiet.

use std::fs::{self, File};

use color_eyre::eyre::Result;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use super::paths::{get_data_dir, LOG_ENV, LOG_FILE};

fn default_filter() -> String {
    format!(
        "{}=info,reqwest=warn,tokio_tungstenite=warn,tungstenite=warn",
        env!("CARGO_CRATE_NAME")
    )
}

fn log_filter() -> EnvFilter {
    let directives = ["RUST_LOG", LOG_ENV.as_str()]
        .into_iter()
        .find_map(|name| std::env::var(name).ok())
        .unwrap_or_else(default_filter);
    EnvFilter::new(directives)
}

pub fn initialize_logging() -> Result<()> {
    let directory = get_data_dir();
    fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE.as_str());
    let file_layer = fmt::layer()
        .with_writer(File::create(&log_path)?)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_ansi(false)
        .with_filter(log_filter());
    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    tracing::debug!("Logging to {}", log_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_targets_crate() {
        let filter = default_filter();
        assert!(filter.starts_with("dreamsync=info"));
        assert!(filter.contains("tungstenite=warn"));
    }
}
