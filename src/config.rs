//! Runtime settings.
/// Settings file loader
mod loader;
/// Settings types and validation
mod types;

pub use loader::{
    SETTINGS_FILE_NAME,
    load_from_dir,
    load_from_path,
};
pub use types::{
    ConfigError,
    TranslateSettings,
    ValidationError,
};
