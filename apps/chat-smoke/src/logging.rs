//! Tracing bootstrap for the smoke binary.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,chat_smoke=debug,chat_http=debug,chat_core=debug";
const FILTER_VARS: [&str; 3] = ["RUST_LOG", "CHAT_SMOKE_LOG", "CHAT_LOG"];

/// Install the global subscriber. The first of `RUST_LOG`, `CHAT_SMOKE_LOG`
/// and `CHAT_LOG` holding a valid directive wins; otherwise the built-in
/// default applies.
pub fn init() {
    let directives = select_directives(|key| env::var(key).ok());
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(EnvFilter::new(directives))
        .try_init();
}

fn select_directives<F>(mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    FILTER_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty() && EnvFilter::try_new(value).is_ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned())
}
