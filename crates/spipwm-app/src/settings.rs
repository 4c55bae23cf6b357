use std::env;
use std::path::{Path, PathBuf};

use log::{debug, info};
use spipwm_core::{ConfigError, HarnessConfig};

pub const CONFIG_ENV: &str = "SPIPWM_CONFIG";
const CONFIG_FILE: &str = "harness.toml";

/// `<config dir>/spipwm/harness.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("spipwm").join(CONFIG_FILE))
}

/// Explicit path, then `SPIPWM_CONFIG`, then the per-user file, then defaults.
///
/// An explicitly named file must exist; the per-user file is optional.
pub fn resolve_config(explicit: Option<&Path>) -> Result<HarnessConfig, ConfigError> {
    if let Some(path) = explicit {
        info!("Loading config from {}", path.display());
        return HarnessConfig::load(path);
    }

    if let Ok(env_path) = env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        info!("Loading config from {} ({CONFIG_ENV})", path.display());
        return HarnessConfig::load(&path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config from {}", path.display());
            HarnessConfig::load(&path)
        }
        _ => {
            debug!("No config file found, using defaults");
            Ok(HarnessConfig::default())
        }
    }
}
