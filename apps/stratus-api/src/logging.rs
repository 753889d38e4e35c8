//! Structured JSON logging setup using tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Targets that log every statement or request at `info`. They are held at
/// `warn` unless the filter names them.
const NOISY_TARGETS: [&str; 3] = ["sqlx", "hyper", "reqwest"];

/// `filter` with a `warn` directive appended for each noisy target it does
/// not mention.
fn filter_directives(filter: &str) -> String {
    let mut directives = filter.trim().to_string();
    for target in NOISY_TARGETS {
        let mentioned = directives
            .split(',')
            .any(|d| d.trim().split(['=', ':', '[']).next() == Some(target));
        if !mentioned {
            if !directives.is_empty() {
                directives.push(',');
            }
            directives.push_str(target);
            directives.push_str("=warn");
        }
    }
    directives
}

/// Initialize the tracing subscriber with JSON logging.
///
/// `filter` is the value of `RUST_LOG` as loaded by the configuration.
///
/// # Panics
///
/// Panics if the subscriber has already been initialized.
pub fn init_logging(filter: &str) {
    let directives = filter_directives(filter);
    let filter_layer = match EnvFilter::try_new(&directives) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("FATAL: Invalid log filter {directives:?}: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .flatten_event(true),
        )
        .with(filter_layer)
        .init();

    tracing::info!(filter = %directives, "Logging initialized");
}
