use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const CRATE_TARGET: &str = "coinfolio";

/// Installs the global subscriber. `verbose` enables debug output for this
/// crate; `RUST_LOG`, when set and valid, replaces the default directives.
pub fn init_logging(verbose: bool) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(crate_targets(verbose))
        .with(env_filter(verbose, directives.as_deref()))
        .init();
}

/// Gates this crate on `--verbose`. Other targets pass through to the
/// env filter.
fn crate_targets(verbose: bool) -> Targets {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };
    Targets::new()
        .with_target(CRATE_TARGET, level)
        .with_default(LevelFilter::TRACE)
}

fn env_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| {
            EnvFilter::new(if verbose {
                format!("{CRATE_TARGET}=debug")
            } else {
                "off".to_string()
            })
        })
}
