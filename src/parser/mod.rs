//! Parameter parsing and template interpolation.

/// `{{ path }}` substitution and nested lookups
mod interpolate;
/// Loose object literal parameters
mod params;

pub use interpolate::{
    get_value,
    interpolate_string,
};
pub use params::{
    InvalidParameterError,
    normalize,
    parse_loose_object,
};
use serde_json::Value;

use crate::types::Params;

/// Turns table entries into resolved values.
///
/// The service delegates every lookup and interpolation to its parser, so a
/// different placeholder syntax only needs a new implementation of this trait.
pub trait TranslateParser {
    /// Interpolates a table entry.
    ///
    /// Strings are treated as templates; any other value is returned as-is.
    fn interpolate(&self, value: &Value, params: Option<&Params>) -> Value;

    /// Finds the entry for `key` in a table.
    fn get_value<'a>(&self, table: &'a Value, key: &str) -> Option<&'a Value>;
}

/// `{{ path }}` templates with dotted lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParser;

impl TranslateParser for DefaultParser {
    fn interpolate(&self, value: &Value, params: Option<&Params>) -> Value {
        match value {
            Value::String(template) => Value::String(interpolate_string(template, params)),
            other => other.clone(),
        }
    }

    fn get_value<'a>(&self, table: &'a Value, key: &str) -> Option<&'a Value> {
        get_value(table, key)
    }
}
