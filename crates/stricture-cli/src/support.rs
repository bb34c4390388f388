use serde::Serialize;
use std::path::Path;
use stricture_manifest::Manifest;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status when analysis finds `error` violations.
pub const EXIT_VIOLATIONS: i32 = 1;
/// Exit status for a manifest, configuration or I/O failure.
pub const EXIT_FATAL: i32 = 2;

const LOG_ENV: &str = "STRICTURE_LOG";

/// Logs go to stderr so stdout stays machine readable.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(EXIT_FATAL);
}

pub fn load_manifest_or_exit(path: &Path) -> Manifest {
    Manifest::from_path(path).unwrap_or_else(|err| fail(err))
}

pub fn print_json_or_exit<T: Serialize>(value: &T, what: &str) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|err| fail(format!("failed to render {what} json: {err}")));
    println!("{rendered}");
}

/// `@/=src/` → (`@/`, `src/`).
pub fn parse_alias_or_exit(raw: &str) -> (String, String) {
    match raw.split_once('=') {
        Some((prefix, replacement)) if !prefix.is_empty() => {
            (prefix.to_string(), replacement.to_string())
        }
        _ => fail(format!("invalid --alias '{raw}', expected PREFIX=REPLACEMENT")),
    }
}
