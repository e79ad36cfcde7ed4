//! Logging setup
//!
//! Two outputs share one `tracing` registry:
//!
//! - the console (stderr), filtered by `RUST_LOG` or `logging.filter`
//! - an optional daily trigger log that only receives events on
//!   [`TRIGGER_LOG_TARGET`]
//!
//! Each output carries its own filter, so a quiet console (`RUST_LOG=warn`)
//! does not silence the trigger log, and trigger log events are not echoed
//! to the console.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{Directive, EnvFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::config::LoggingConfig;

/// Target of trigger events routed to the trigger log file
pub const TRIGGER_LOG_TARGET: &str = "uartium::trigger_log";

/// File name prefix of the daily trigger log
pub const TRIGGER_LOG_FILE: &str = "triggers.log";

/// Console filter from `directives`, with trigger log events removed
pub fn console_filter(directives: &str) -> EnvFilter {
    let filter = EnvFilter::new(directives);
    match format!("{}=off", TRIGGER_LOG_TARGET).parse::<Directive>() {
        Ok(off) => filter.add_directive(off),
        Err(_) => filter,
    }
}

/// Filter of the trigger log file layer
pub fn trigger_log_filter() -> Targets {
    Targets::new().with_target(TRIGGER_LOG_TARGET, tracing::Level::INFO)
}

/// Install the global subscriber
///
/// The returned guard flushes the trigger log when dropped; keep it alive
/// for the lifetime of the process.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let directives =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| config.filter.clone());

    let (trigger_log, guard) = match &config.trigger_log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, TRIGGER_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(trigger_log_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter(&directives)),
        )
        .with(trigger_log)
        .init();

    guard
}
