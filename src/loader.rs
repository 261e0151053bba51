//! Translation table loaders.

use std::collections::HashMap;
use std::path::{
    Path,
    PathBuf,
};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use thiserror::Error;

/// Failure to produce a language's table.
///
/// `Clone` because one load is shared by every request for the same language.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("No translations available for language '{0}'")]
    NotFound(String),

    #[error("Failed to read translations for '{lang}': {message}")]
    Io { lang: String, message: String },

    #[error("Failed to parse translations for '{lang}': {message}")]
    Parse { lang: String, message: String },

    #[error("Loading translations for '{0}' was abandoned")]
    Cancelled(String),
}

/// Asynchronous source of translation tables.
pub trait TranslateLoader {
    /// Fetches the table for `lang`.
    fn get_translation(&self, lang: &str) -> LocalBoxFuture<'static, Result<Value, LoaderError>>;
}

impl<T: TranslateLoader + ?Sized> TranslateLoader for Rc<T> {
    fn get_translation(&self, lang: &str) -> LocalBoxFuture<'static, Result<Value, LoaderError>> {
        (**self).get_translation(lang)
    }
}

/// Loader that yields an empty table for every language.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeLoader;

impl TranslateLoader for FakeLoader {
    fn get_translation(&self, _lang: &str) -> LocalBoxFuture<'static, Result<Value, LoaderError>> {
        futures::future::ready(Ok(Value::Object(serde_json::Map::new()))).boxed_local()
    }
}

/// Loader backed by tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    tables: HashMap<String, Value>,
}

impl StaticLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, lang: impl Into<String>, table: Value) -> Self {
        self.tables.insert(lang.into(), table);
        self
    }
}

impl TranslateLoader for StaticLoader {
    fn get_translation(&self, lang: &str) -> LocalBoxFuture<'static, Result<Value, LoaderError>> {
        let result = self.tables.get(lang).cloned().ok_or_else(|| LoaderError::NotFound(lang.to_string()));
        futures::future::ready(result).boxed_local()
    }
}

/// Loader reading `<dir>/<lang><suffix>` JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    dir: PathBuf,
    suffix: String,
}

impl JsonFileLoader {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), suffix: ".json".to_string() }
    }

    /// Overrides the file suffix (default `.json`).
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn path_for(&self, lang: &str) -> PathBuf {
        self.dir.join(format!("{lang}{}", self.suffix))
    }
}

impl TranslateLoader for JsonFileLoader {
    fn get_translation(&self, lang: &str) -> LocalBoxFuture<'static, Result<Value, LoaderError>> {
        let path = self.path_for(lang);
        let lang = lang.to_string();
        async move { load_translation_file(&path, &lang).await }.boxed_local()
    }
}

/// Reads and parses one translation file.
///
/// # Errors
/// Returns error if file read or JSON parse fails.
pub async fn load_translation_file(path: &Path, lang: &str) -> Result<Value, LoaderError> {
    tracing::debug!(path = %path.display(), lang, "Loading translation file");

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoaderError::NotFound(lang.to_string()));
        }
        Err(e) => return Err(LoaderError::Io { lang: lang.to_string(), message: e.to_string() }),
    };

    serde_json::from_str(&content)
        .map_err(|e| LoaderError::Parse { lang: lang.to_string(), message: e.to_string() })
}
