//! Result envelope and human-readable output.
//!
//! With `-f json` every run prints one envelope on stdout:
//!
//! ```json
//! { "ok": true, "command": "post", "data": { "mode": "reply", ... } }
//! ```
//!
//! On failure:
//!
//! ```json
//! { "ok": false, "command": "post", "error": { "code": "SEND_NOT_CONFIRMED", "message": "..." } }
//! ```
//!
//! Errors are always also printed to stderr as `Error [CODE]: message`.


use std::io::{self, Write};

use serde::Serialize;
use twpost::{ComposeMode, ErrorCode, LaunchOutcome, PostReport};

pub const COMMAND: &str = "post";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelope
	Json,
}

/// Envelope printed in JSON mode.
#[derive(Debug, Serialize)]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,
	pub command: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

impl From<&twpost::Error> for CommandError {
	fn from(err: &twpost::Error) -> Self {
		Self {
			code: err.code(),
			message: err.to_string(),
		}
	}
}

impl<T: Serialize> CommandResult<T> {
	pub fn success(data: T) -> Self {
		Self {
			ok: true,
			command: COMMAND,
			data: Some(data),
			error: None,
		}
	}
}

impl CommandResult<()> {
	pub fn failure(error: CommandError) -> Self {
		Self {
			ok: false,
			command: COMMAND,
			data: None,
			error: Some(error),
		}
	}
}

/// One-line summary of a successful post.
pub fn summary(report: &PostReport) -> String {
	let mut line = match (&report.mode, &report.reply_to) {
		(ComposeMode::Reply, Some(url)) => format!("Replied to {url}"),
		_ => "Posted tweet".to_string(),
	};
	if let Some(path) = &report.attachment {
		line.push_str(&format!(" with image {}", path.display()));
	}
	if let LaunchOutcome::Launched { pid, .. } = report.browser {
		line.push_str(&format!(" (started browser pid {pid} on port {})", report.port));
	}
	line
}

pub fn print_success(report: &PostReport, format: OutputFormat) {
	match format {
		OutputFormat::Text => {
			let _ = writeln!(io::stdout().lock(), "{}", summary(report));
		}
		OutputFormat::Json => print_json(&CommandResult::success(report)),
	}
}

/// Prints `err` to stderr, plus the failure envelope on stdout in JSON mode.
pub fn print_failure(err: &twpost::Error, format: OutputFormat) {
	let error = CommandError::from(err);
	print_error_stderr(&error);
	if format == OutputFormat::Json {
		print_json(&CommandResult::failure(error));
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

fn print_json<T: Serialize>(result: &CommandResult<T>) {
	if let Ok(json) = serde_json::to_string_pretty(result) {
		println!("{json}");
	}
}
