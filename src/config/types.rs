use std::path::PathBuf;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "defaultLanguage")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateSettings {
    /// Language applied as the default (fallback) language on startup.
    pub default_language: Option<String>,

    /// Look keys up in the default language when the current one lacks them.
    pub use_default_lang: bool,

    /// Merge newly loaded tables into tables already present for the language.
    pub extend: bool,

    /// Text used for keys no table provides. Unset: the key itself is shown.
    pub missing_translation: Option<String>,

    /// Directory holding `<lang>.json` tables.
    pub translations_dir: Option<PathBuf>,
}

impl Default for TranslateSettings {
    fn default() -> Self {
        Self {
            default_language: None,
            use_default_lang: true,
            extend: false,
            missing_translation: None,
            translations_dir: None,
        }
    }
}

impl TranslateSettings {
    /// # Errors
    /// - Empty language code
    /// - Empty missing translation text
    /// - Empty translations directory
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(lang) = &self.default_language
            && lang.trim().is_empty()
        {
            errors.push(ValidationError::new(
                "defaultLanguage",
                "The language cannot be empty. Please specify a language code (e.g., \"en\"), or remove this field",
            ));
        }

        if let Some(text) = &self.missing_translation
            && text.is_empty()
        {
            errors.push(ValidationError::new(
                "missingTranslation",
                "The text cannot be empty. Remove this field to show the key instead",
            ));
        }

        if let Some(dir) = &self.translations_dir
            && dir.as_os_str().is_empty()
        {
            errors.push(ValidationError::new(
                "translationsDir",
                "The directory cannot be empty. Example: \"./i18n\"",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
