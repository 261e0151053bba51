//! Core types used throughout the project.

use std::rc::Rc;

use serde_json::{
    Map,
    Value,
};

/// Interpolation parameters, keyed by path segment.
pub type Params = Map<String, Value>;

/// Parameters as handed to the pipe, before normalization.
///
/// Equality is structural, so two separately built but equal maps compare
/// equal and hit the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawParams {
    /// Already structured parameters.
    Map(Params),
    /// Loose object literal such as `{count: 2, name: 'x'}`.
    Text(String),
}

impl RawParams {
    /// Interprets a loosely typed argument.
    ///
    /// Objects and non-empty strings become parameters; everything else
    /// (null, numbers, arrays, `""`) means "no parameters".
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::Map(map.clone())),
            Value::String(text) if !text.is_empty() => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    /// `true` for empty text, which carries no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl From<Params> for RawParams {
    fn from(map: Params) -> Self {
        Self::Map(map)
    }
}

impl From<&str> for RawParams {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RawParams {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Payload of the language, default language and translation change events.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationEvent {
    pub lang: String,
    /// Table snapshot for `lang` at the time of the event.
    pub translations: Rc<Value>,
}

/// Outcome of a language switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangSwitch {
    /// The language became active and the change event fired.
    Switched,
    /// The language was already active; nothing fired.
    Unchanged,
    /// A newer request finished the switch; this one fired nothing.
    Superseded,
    /// The table could not be loaded; nothing fired.
    Unavailable,
}
