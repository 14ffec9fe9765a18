//! Diagnostics on stderr; stdout only ever carries the result.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Filter directives that take precedence over `-v`, checked before `RUST_LOG`.
pub const ENV_LOG: &str = "TWPOST_LOG";

/// Directive used when neither `TWPOST_LOG` nor `RUST_LOG` is set.
pub fn default_directive(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error",
		// step transitions; the CDP wire layer only when something breaks
		1 => "info,twpost_runtime=warn",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let filter = EnvFilter::try_from_env(ENV_LOG)
		.or_else(|_| EnvFilter::try_from_default_env())
		.unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.with_target(verbosity > 1)
		.without_time()
		.compact()
		.init();
}
