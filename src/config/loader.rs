//! TOML configuration loading, env-var overrides, and atomic saves.
//!
//! # Loading order
//! 1. Parse `~/.zenii/config.toml` (or the path in `ZENII_CONFIG`)
//! 2. Apply `ZENII_*` environment variable overrides
//! 3. Fall back to [`AppConfig::default()`] if the file is missing
//!
//! # Atomic save
//! Writes to `<path>.tmp` → backup existing as `<path>.bak` → rename to
//! `<path>`, avoiding partial writes corrupting the config file.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use super::schema::AppConfig;

/// Return the default config file path: `~/.zenii/config.toml`.
pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::home_dir()
        .map(|h| h.join(".zenii").join("config.toml"))
        .ok_or_else(|| "could not determine home directory".to_string())
}

/// Load [`AppConfig`] from the given path, falling back to defaults if the
/// file does not exist, then applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)
            .map_err(|e| format!("failed to parse config at {path:?}: {e}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => return Err(format!("failed to read config at {path:?}: {e}")),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load config from the default path (or `ZENII_CONFIG` if set).
pub fn load_default_config() -> AppConfig {
    let path = env::var("ZENII_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml")));

    load_config(&path).unwrap_or_default()
}

/// Apply `ZENII_*` environment variable overrides to `config`.
///
/// Supported overrides:
/// - `ZENII_PROVIDER_BASE_URL` → `provider.base_url`
/// - `ZENII_PROVIDER_MODEL`    → `provider.default_model`
/// - `ZENII_SCHEDULER_INTERVAL_SECS` → `scheduler.interval_secs`
/// - `ZENII_WORKSPACE_ROOT`    → `workspace.root`
/// - `ZENII_MCP_CONFIG_PATH`   → `mcp_config_path`
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = env::var("ZENII_PROVIDER_BASE_URL") {
        config.provider.base_url = Some(v);
    }
    if let Ok(v) = env::var("ZENII_PROVIDER_MODEL") {
        config.provider.default_model = v;
    }
    if let Ok(v) = env::var("ZENII_SCHEDULER_INTERVAL_SECS") {
        if let Ok(secs) = v.parse::<u64>() {
            config.scheduler.interval_secs = secs;
        }
    }
    if let Ok(v) = env::var("ZENII_WORKSPACE_ROOT") {
        config.workspace.root = v;
    }
    if let Ok(v) = env::var("ZENII_MCP_CONFIG_PATH") {
        config.mcp_config_path = Some(v);
    }
}

/// Atomically save `config` to `path`.
///
/// Writes to `<path>.tmp`, backs up the existing file as `<path>.bak`, then
/// renames the temp file to `<path>`.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = toml::to_string_pretty(config).map_err(|e| format!("failed to serialise config: {e}"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("failed to create config dir: {e}"))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &content).map_err(|e| format!("failed to write temp config: {e}"))?;

    if path.exists() {
        let bak_path = path.with_extension("toml.bak");
        fs::copy(path, &bak_path).map_err(|e| format!("failed to backup config: {e}"))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| format!("failed to replace config file: {e}"))?;
    Ok(())
}

#[cfg(test)]
#[allow(unsafe_code)] // env::set_var / remove_var are unsafe in Rust 2024; tests are single-threaded.
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[provider]
default_model = "claude-3-haiku"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.provider.default_model, "claude-3-haiku");
        assert_eq!(config.scheduler.interval_secs, 30);
    }

    #[test]
    fn load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[provider]
base_url = "http://localhost:11434/v1"
default_model = "llama3"
request_timeout_secs = 30

[scheduler]
interval_secs = 60

[policy]
confirm_tools = ["web.search"]
deny_tools = ["shell.exec"]

[workspace]
root = "/tmp/ws"

mcp_config_path = "/tmp/mcp.json"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.provider.default_model, "llama3");
        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.policy.confirm_tools, vec!["web.search".to_string()]);
        assert_eq!(config.workspace.root, "/tmp/ws");
        assert_eq!(config.mcp_config_path.as_deref(), Some("/tmp/mcp.json"));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut original = AppConfig::default();
        original.provider.default_model = "claude-3-haiku".to_owned();
        original.workspace.root = "/srv/zenii".to_owned();

        save_config(&path, &original).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, original, "config should round-trip through save/load");
    }

    #[test]
    fn save_creates_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        save_config(&path, &AppConfig::default()).unwrap();
        save_config(&path, &AppConfig::default()).unwrap();

        let bak = path.with_extension("toml.bak");
        assert!(bak.exists(), "backup file should exist after second save");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested_path = dir.path().join("a").join("b").join("config.toml");
        save_config(&nested_path, &AppConfig::default()).unwrap();
        assert!(nested_path.exists(), "config should be created in nested dirs");
    }

    #[test]
    fn env_override_provider_model() {
        let key = "ZENII_PROVIDER_MODEL";
        // SAFETY: single-threaded test context; no other threads read this var.
        unsafe {
            env::set_var(key, "gpt-4o");
        }
        let config = load_default_config();
        // SAFETY: same as set_var above.
        unsafe {
            env::remove_var(key);
        }
        assert_eq!(config.provider.default_model, "gpt-4o");
    }

    #[test]
    fn env_override_scheduler_interval() {
        let key = "ZENII_SCHEDULER_INTERVAL_SECS";
        // SAFETY: single-threaded test context; no other threads read this var.
        unsafe {
            env::set_var(key, "90");
        }
        let config = load_default_config();
        // SAFETY: same as set_var above.
        unsafe {
            env::remove_var(key);
        }
        assert_eq!(config.scheduler.interval_secs, 90);
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "this is not valid toml!!!");
        let result = load_config(&path);
        assert!(result.is_err(), "invalid TOML should return an error");
    }
}
