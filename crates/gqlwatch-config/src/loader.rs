//! Configuration file loading.

use std::path::Path;

use tracing::debug;

use crate::settings::GqlwatchConfig;
use crate::{ConfigError, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "gqlwatch.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV_VAR: &str = "GQLWATCH_CONFIG";

/// Loads and validates the configuration at `path`.
///
/// A missing file yields the default configuration rooted at the file's
/// directory. A relative `root_dir` is resolved against that directory too.
pub fn load_config(path: &Path) -> Result<GqlwatchConfig> {
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str::<GqlwatchConfig>(&content)
            .map_err(|e| ConfigError::parse(format!("{}: {e}", path.display())))?
    } else {
        debug!("Config file does not exist: {:?}, using defaults", path);
        GqlwatchConfig::default()
    };

    let config = config.resolve_root(base);
    config.validate()?;
    Ok(config)
}
