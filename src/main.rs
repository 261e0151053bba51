//! Command line entry point: resolves one key from a directory of JSON tables.

use std::error::Error;
use std::io::Write;
use std::path::{
    Path,
    PathBuf,
};

use clap::Parser;
use serde_json::Value;
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;
use translate_runtime::parser::normalize;
use translate_runtime::{
    JsonFileLoader,
    LangSwitch,
    RawParams,
    TranslatePipe,
    TranslateService,
    config,
};

/// Resolves one translation key from a directory of `<lang>.json` tables.
#[derive(Parser, Debug)]
#[command(name = "translate-runtime", version)]
struct Args {
    /// Settings file; `.translate.json` in the working directory if absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of `<lang>.json` tables
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Language to switch to
    lang: String,

    /// Key to resolve
    key: String,

    /// Loose object literal with interpolation parameters, e.g. `{name: 'Ann'}`
    params: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(writer).init();

    let args = Args::parse();
    LocalSet::new().run_until(run(args)).await
}

/// Resolves the requested key and prints it.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let settings = match &args.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load_from_dir(Path::new("."))?.unwrap_or_default(),
    };
    let dir = args
        .dir
        .or_else(|| settings.translations_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    tracing::debug!(dir = %dir.display(), lang = %args.lang, "Resolving translation");

    let service = TranslateService::builder()
        .settings(settings)
        .loader(JsonFileLoader::new(&dir))
        .spawner(|task| drop(tokio::task::spawn_local(task)))
        .build();
    if let Some(outcome) = service.init().await {
        tracing::debug!(?outcome, "Default language applied");
    }
    if service.use_lang(&args.lang).await == LangSwitch::Unavailable {
        return Err(format!("No translations for '{}' in {}", args.lang, dir.display()).into());
    }

    let params = args.params.map(RawParams::from);
    let interpolate_params = params.as_ref().map(normalize).transpose()?;
    let pipe = TranslatePipe::new(service.clone(), || tracing::trace!("Translation changed"));
    let mut value = pipe.resolve(&args.key, params)?;
    if value.as_str() == Some("") {
        value = service.get(&args.key, interpolate_params.as_ref()).await;
    }

    let text = match value {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other)?,
    };
    writeln!(std::io::stdout().lock(), "{text}")?;
    Ok(())
}
