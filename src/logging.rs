use std::backtrace::Backtrace;

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// `RUST_LOG` wins over `logging.rust_log` when both are set.
pub fn init_tracing(cfg: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.rust_log));
    if fmt().with_env_filter(filter).with_target(false).try_init().is_ok() {
        set_panic_hook();
    }
}

fn set_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown panic");
        let backtrace = Backtrace::capture();

        match info.location() {
            Some(location) => tracing::error!(
                panic = %message,
                location = %location,
                backtrace = %backtrace,
                "panic"
            ),
            None => tracing::error!(panic = %message, backtrace = %backtrace, "panic"),
        }
    }));
}
