use crate::core::tracker::API_LOG_TARGET;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Logs go to stderr so they never interleave with the dashboard on stdout.
/// Without `verbose`, only failed API calls are reported.
pub fn init_logging(verbose: bool) {
    let (app_level, api_level, level) = if verbose {
        (LevelFilter::DEBUG, LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::OFF, LevelFilter::ERROR, "error")
    };
    let app_filter = Targets::new()
        .with_target("quaiwatch", app_level)
        .with_target(API_LOG_TARGET, api_level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(app_filter)
        .with(env_filter)
        .init();
}
