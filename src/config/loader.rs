//! Settings file loading.

use std::path::Path;

use super::{
    ConfigError,
    TranslateSettings,
};

/// Conventional settings file name looked up in a directory.
pub const SETTINGS_FILE_NAME: &str = ".translate.json";

/// Reads and validates settings from a JSON file.
///
/// # Errors
/// - File read error
/// - JSON parse error
/// - Validation error
pub fn load_from_path(path: &Path) -> Result<TranslateSettings, ConfigError> {
    tracing::debug!("Loading configuration from: {:?}", path);

    let content = std::fs::read_to_string(path)?;
    let settings: TranslateSettings = serde_json::from_str(&content)?;
    settings.validate().map_err(ConfigError::ValidationErrors)?;

    Ok(settings)
}

/// Looks for [`SETTINGS_FILE_NAME`] in `dir`.
///
/// # Returns
/// - `Ok(Some(settings))`: file found and valid
/// - `Ok(None)`: no settings file
/// - `Err(ConfigError)`: read, parse or validation error
pub fn load_from_dir(dir: &Path) -> Result<Option<TranslateSettings>, ConfigError> {
    let config_path = dir.join(SETTINGS_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!("Configuration file not found: {:?}", config_path);
        return Ok(None);
    }

    load_from_path(&config_path).map(Some)
}
