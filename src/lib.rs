//! translate-runtime
//!
//! Runtime translation resolution: per-language JSON tables, `{{ param }}`
//! interpolation, default language fallback and cached lookups that refresh
//! themselves when the language or its table changes.
//!
//! Everything is single-threaded. Table loads are futures awaited by the
//! caller; results of async missing translation handlers are driven by the
//! spawner given to [`service::TranslateServiceBuilder::spawner`], or by the pipe
//! itself when there is none.

pub mod config;
pub mod loader;
pub mod missing;
pub mod parser;
pub mod pipe;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use loader::{
    JsonFileLoader,
    LoaderError,
    StaticLoader,
    TranslateLoader,
};
pub use missing::{
    DefaultMissingHandler,
    MissingTranslation,
    MissingTranslationHandler,
    MissingTranslationParams,
};
pub use parser::InvalidParameterError;
pub use pipe::{
    ChangeDetector,
    TranslatePipe,
};
pub use service::{
    Parsed,
    TranslateService,
};
pub use types::{
    LangSwitch,
    Params,
    RawParams,
    TranslationEvent,
};
