//! Logging setup for binaries embedding the engine.
//!
//! The library itself only emits `tracing` events; a host decides where they
//! go. [`init_logging`] is the stock choice: compact stdout output filtered by
//! a default filter plus whatever `RUST_LOG` adds.

use std::{env, panic};

use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::uptime},
    prelude::*,
};

/// Default filter. The engine logs at info, everything else at warn.
pub const DEFAULT_FILTER: &str = "warn,rigid_fiz_engine=info,fiz_demo=info";

/// Builds the filter string from the default plus the `RUST_LOG` directives.
fn filter_directives(env_filter: Option<&str>) -> String {
    let mut filter = DEFAULT_FILTER.to_owned();
    if let Some(env_filter) = env_filter.filter(|f| !f.is_empty()) {
        filter.push(',');
        filter.push_str(env_filter);
    }
    filter
}

/// Installs a global `tracing` subscriber writing to stdout.
///
/// Accepts ecosystem-standard `RUST_LOG` filters. Returns `false` if a
/// subscriber was already installed. Panic messages are routed through the
/// logger as well.
pub fn init_logging() -> bool {
    let format = fmt::format().compact().with_timer(uptime()).with_line_number(true);
    let stdout_log = fmt::layer().event_format(format);

    let env_filter = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::new(filter_directives(env_filter.as_deref()));

    let subscriber = Registry::default().with(filter).with(stdout_log);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        tracing::error!("{}", info);
        default_hook(info);
    }));
    tracing::trace!("installed panic hook");
    true
}
