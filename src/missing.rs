//! Handling of keys absent from the current and default tables.

use futures::future::LocalBoxFuture;

use crate::service::TranslateService;
use crate::types::Params;

/// Context handed to a [`MissingTranslationHandler`].
#[derive(Debug, Clone, Copy)]
pub struct MissingTranslationParams<'a> {
    /// The key that could not be found.
    pub key: &'a str,
    /// The service performing the lookup.
    pub translate_service: &'a TranslateService,
    /// Parameters of the lookup, if any.
    pub interpolate_params: Option<&'a Params>,
}

/// Result of handling a missing key.
pub enum MissingTranslation {
    /// Use this text.
    Text(String),
    /// The text arrives later.
    Pending(LocalBoxFuture<'static, String>),
    /// No opinion; the key itself is used.
    Unhandled,
}

impl std::fmt::Debug for MissingTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Pending(_) => f.write_str("Pending(<future>)"),
            Self::Unhandled => f.write_str("Unhandled"),
        }
    }
}

/// Strategy for keys that no table provides.
///
/// A handler that panics is not contained; the panic reaches whoever asked
/// for the translation.
pub trait MissingTranslationHandler {
    fn handle(&self, params: MissingTranslationParams<'_>) -> MissingTranslation;
}

/// Answers with a configured text, or leaves the key as the result.
#[derive(Debug, Clone, Default)]
pub struct DefaultMissingHandler {
    /// Text for missing keys; `None` leaves the key.
    default_text: Option<String>,
}

impl DefaultMissingHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_text(text: impl Into<String>) -> Self {
        Self { default_text: Some(text.into()) }
    }
}

impl MissingTranslationHandler for DefaultMissingHandler {
    fn handle(&self, params: MissingTranslationParams<'_>) -> MissingTranslation {
        tracing::trace!(key = params.key, "Missing translation");
        self.default_text.clone().map_or(MissingTranslation::Unhandled, MissingTranslation::Text)
    }
}
