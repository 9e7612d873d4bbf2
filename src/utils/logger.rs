use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Overrides the filter for this tool alone; `RUST_LOG` is honored after it.
pub const LOG_ENV: &str = "LUNCH_ROULETTE_LOG";

/// Filter used when neither environment variable is set. The relay client
/// (reqwest/hyper) stays at warn even in verbose mode.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "lunch_roulette=debug,hyper=warn,reqwest=warn,info"
    } else {
        "lunch_roulette=info,warn"
    }
}

/// Logs go to stderr; stdout carries the pairing and the send report.
pub fn init_cli_logger(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
