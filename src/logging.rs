//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr so command output on stdout stays clean.
//! `RUST_LOG` overrides the verbosity chosen with `-v`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn,gitkb=info,gitkb_core=info",
            1 => "info,gitkb=debug,gitkb_core=debug",
            2 => "debug,gitkb=trace,gitkb_core=trace",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // A second init (e.g. from tests) leaves the first subscriber in place.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
