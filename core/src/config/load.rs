use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Default overwatch data directory: `~/.overwatch`.
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".overwatch"))
}

/// Load configuration with the usual precedence:
/// `~/.overwatch/config.toml`, then `./config.toml`, then built-in defaults.
/// Environment variables override on top.
pub fn load_default() -> anyhow::Result<AppConfig> {
    let data_dir = get_data_dir()?;
    let home_config = data_dir.join("config.toml");
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if home_config.exists() {
        let s = std::fs::read_to_string(&home_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    if cfg.data_dir.trim().is_empty() {
        cfg.data_dir = data_dir.to_string_lossy().to_string();
    } else {
        cfg.data_dir = shellexpand::tilde(&cfg.data_dir).to_string();
    }

    if cfg
        .logging
        .directory
        .as_deref()
        .map(str::trim)
        .map(str::is_empty)
        .unwrap_or(true)
    {
        let logs_dir = PathBuf::from(&cfg.data_dir).join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    // Environment overrides (highest priority)
    if let Ok(v) = std::env::var("OVERWATCH_DATA_DIR") {
        if !v.trim().is_empty() {
            cfg.data_dir = shellexpand::tilde(&v).to_string();
        }
    }
    if let Ok(v) = std::env::var("OVERWATCH_MAX_CONCURRENT_RUNS") {
        if let Ok(n) = v.trim().parse::<usize>() {
            if n > 0 {
                cfg.scheduler.max_concurrent_runs = n;
            }
        }
    }

    std::fs::create_dir_all(&cfg.data_dir)?;

    Ok(cfg)
}
