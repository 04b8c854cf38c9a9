use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "esmp_sync=info";
const VERBOSE_FILTER: &str = "esmp_sync=debug";

pub fn init(verbose: bool) {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into());

    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");
    let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if let Some(ansi) = log_ansi {
        layer = layer.with_ansi(ansi);
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init();
}
