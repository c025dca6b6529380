//! Database initialization command: `swiftflow init-db`.

use anyhow::Result;

use swiftflow::config::AppConfig;
use swiftflow::orders::server::open_database;

pub fn cmd_init_db(config: &AppConfig) -> Result<()> {
    let path = &config.database.path;
    open_database(path)?;
    tracing::info!(db_path = %path.display(), "database initialized");
    println!("SwiftFlow database initialized at {}", path.display());
    Ok(())
}
