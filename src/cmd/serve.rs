//! HTTP server command: `swiftflow serve`.

use anyhow::Result;

use swiftflow::config::AppConfig;
use swiftflow::orders::server::{ServerConfig, start_server};

pub async fn cmd_serve(config: &AppConfig) -> Result<()> {
    start_server(ServerConfig::from(config)).await
}
