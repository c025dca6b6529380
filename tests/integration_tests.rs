//! Integration tests for the swiftflow binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_KEYS: [&str; 6] = [
    "SWIFTFLOW_HOST",
    "SWIFTFLOW_PORT",
    "SWIFTFLOW_DB_PATH",
    "SWIFTFLOW_DEV_MODE",
    "SWIFTFLOW_LOG",
    "SWIFTFLOW_LOG_FORMAT",
];

/// Helper to create a swiftflow Command running in `dir` with a clean
/// SWIFTFLOW_* environment.
fn swiftflow(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("swiftflow");
    cmd.current_dir(dir.path());
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let dir = TempDir::new().unwrap();
        swiftflow(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("init-db"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        swiftflow(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_command_fails() {
        let dir = TempDir::new().unwrap();
        swiftflow(&dir).arg("frobnicate").assert().failure();
    }
}

mod init_db {
    use super::*;

    #[test]
    fn test_init_db_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("data").join("orders.db");

        swiftflow(&dir)
            .arg("init-db")
            .arg("--db-path")
            .arg(&db_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("database initialized"));

        assert!(db_path.exists());
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("orders.db");

        for _ in 0..2 {
            swiftflow(&dir)
                .args(["init-db", "--db-path"])
                .arg(&db_path)
                .assert()
                .success();
        }
    }

    #[test]
    fn test_init_db_uses_env_path() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("from-env.db");

        swiftflow(&dir)
            .env("SWIFTFLOW_DB_PATH", &db_path)
            .arg("init-db")
            .assert()
            .success();

        assert!(db_path.exists());
    }
}

mod config_commands {
    use super::*;

    #[test]
    fn test_config_show_prints_defaults() {
        let dir = TempDir::new().unwrap();
        swiftflow(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[server]"))
            .stdout(predicate::str::contains("port = 8080"))
            .stdout(predicate::str::contains("format = \"pretty\""));
    }

    #[test]
    fn test_config_show_layers_file_and_env() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("swiftflow.toml"),
            "[server]\nport = 9000\nhost = \"0.0.0.0\"\n",
        )
        .unwrap();

        swiftflow(&dir)
            .env("SWIFTFLOW_PORT", "9100")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9100"))
            .stdout(predicate::str::contains("host = \"0.0.0.0\""));
    }

    #[test]
    fn test_invalid_env_value_fails() {
        let dir = TempDir::new().unwrap();
        swiftflow(&dir)
            .env("SWIFTFLOW_PORT", "eighty")
            .args(["config", "validate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("SWIFTFLOW_PORT"));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        swiftflow(&dir)
            .args(["--config", "missing.toml", "config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("missing.toml"));
    }

    #[test]
    fn test_config_init_writes_default_file_once() {
        let dir = TempDir::new().unwrap();

        swiftflow(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created swiftflow.toml"));

        let written = fs::read_to_string(dir.path().join("swiftflow.toml")).unwrap();
        assert!(written.contains("[database]"));

        swiftflow(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }
}
