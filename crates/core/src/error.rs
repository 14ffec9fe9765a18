use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Invalid invocation (blank text, malformed reply URL).
	#[error("{0}")]
	Usage(String),

	#[error("image file not found: {}", path.display())]
	FileNotFound { path: PathBuf },

	#[error("could not find a Chrome/Chromium executable; install Chrome or pass --chrome <PATH>")]
	BrowserNotFound,

	#[error("failed to launch browser at {}: {source}", executable.display())]
	LaunchFailed {
		executable: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("browser (pid {pid}) exited before the DevTools endpoint became available (status: {status})")]
	BrowserExited { pid: u32, status: String },

	#[error("browser did not expose a DevTools endpoint on port {port} after {attempts} attempts")]
	LaunchTimeout { port: u16, attempts: u32 },

	#[error("process control failed: {0}")]
	Process(String),

	#[error("cannot attach to browser on port {port}: {message}")]
	Connection { port: u16, message: String },

	#[error("navigation to {url} failed: {message}")]
	Navigation { url: String, message: String },

	#[error("{step}: no interactable element matched {selector} within {ms}ms (page layout changed or not logged in?)")]
	ElementNotFound {
		step: &'static str,
		selector: String,
		ms: u64,
	},

	#[error("image upload did not complete: {0}")]
	UploadFailed(String),

	#[error("send was not confirmed within {ms}ms: the compose box still holds the draft")]
	SendNotConfirmed { ms: u64 },

	#[error("page script failed: {0}")]
	Script(String),

	#[error(transparent)]
	Cdp(#[from] twpost_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

/// Standardized error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	UsageError,
	FileNotFound,
	BrowserLaunchFailed,
	LaunchTimeout,
	ConnectionError,
	NavigationError,
	ElementNotFound,
	UploadFailed,
	SendNotConfirmed,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ErrorCode::UsageError => "USAGE_ERROR",
			ErrorCode::FileNotFound => "FILE_NOT_FOUND",
			ErrorCode::BrowserLaunchFailed => "BROWSER_LAUNCH_FAILED",
			ErrorCode::LaunchTimeout => "LAUNCH_TIMEOUT",
			ErrorCode::ConnectionError => "CONNECTION_ERROR",
			ErrorCode::NavigationError => "NAVIGATION_ERROR",
			ErrorCode::ElementNotFound => "ELEMENT_NOT_FOUND",
			ErrorCode::UploadFailed => "UPLOAD_FAILED",
			ErrorCode::SendNotConfirmed => "SEND_NOT_CONFIRMED",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(s)
	}
}

impl ErrorCode {
	/// Process exit status for this code. Usage errors share clap's status 2.
	pub fn exit_code(self) -> i32 {
		match self {
			ErrorCode::InternalError => 1,
			ErrorCode::UsageError => 2,
			ErrorCode::FileNotFound => 3,
			ErrorCode::LaunchTimeout => 4,
			ErrorCode::ConnectionError => 5,
			ErrorCode::NavigationError => 6,
			ErrorCode::ElementNotFound => 7,
			ErrorCode::UploadFailed => 8,
			ErrorCode::SendNotConfirmed => 9,
			ErrorCode::BrowserLaunchFailed => 10,
		}
	}
}

impl Error {
	pub fn code(&self) -> ErrorCode {
		match self {
			Error::Usage(_) => ErrorCode::UsageError,
			Error::FileNotFound { .. } => ErrorCode::FileNotFound,
			Error::BrowserNotFound | Error::LaunchFailed { .. } | Error::BrowserExited { .. } | Error::Process(_) => ErrorCode::BrowserLaunchFailed,
			Error::LaunchTimeout { .. } => ErrorCode::LaunchTimeout,
			Error::Connection { .. } => ErrorCode::ConnectionError,
			Error::Navigation { .. } => ErrorCode::NavigationError,
			Error::ElementNotFound { .. } => ErrorCode::ElementNotFound,
			Error::UploadFailed(_) => ErrorCode::UploadFailed,
			Error::SendNotConfirmed { .. } => ErrorCode::SendNotConfirmed,
			Error::Cdp(e) if e.is_unreachable() => ErrorCode::ConnectionError,
			Error::Script(_) | Error::Cdp(_) | Error::Io(_) | Error::Json(_) => ErrorCode::InternalError,
		}
	}

	pub fn exit_code(&self) -> i32 {
		self.code().exit_code()
	}

	/// Errors a polling loop may see while the page is mid-navigation.
	///
	/// A destroyed execution context or a slow evaluate is retried by the next
	/// poll; a dead socket is not.
	pub fn is_transient(&self) -> bool {
		match self {
			Error::Cdp(e) => e.is_timeout() || matches!(e, twpost_runtime::Error::Remote { .. }),
			Error::Script(_) => true,
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_code_has_a_distinct_exit_status() {
		let codes = [
			ErrorCode::InternalError,
			ErrorCode::UsageError,
			ErrorCode::FileNotFound,
			ErrorCode::LaunchTimeout,
			ErrorCode::ConnectionError,
			ErrorCode::NavigationError,
			ErrorCode::ElementNotFound,
			ErrorCode::UploadFailed,
			ErrorCode::SendNotConfirmed,
			ErrorCode::BrowserLaunchFailed,
		];
		let mut statuses: Vec<i32> = codes.iter().map(|c| c.exit_code()).collect();
		statuses.sort_unstable();
		statuses.dedup();
		assert_eq!(statuses.len(), codes.len());
		assert!(!statuses.contains(&0));
	}

	#[test]
	fn taxonomy_maps_to_expected_codes() {
		assert_eq!(Error::Usage("blank".into()).code(), ErrorCode::UsageError);
		assert_eq!(
			Error::FileNotFound {
				path: PathBuf::from("missing.png")
			}
			.exit_code(),
			3
		);
		assert_eq!(Error::LaunchTimeout { port: 9222, attempts: 10 }.exit_code(), 4);
		assert_eq!(Error::SendNotConfirmed { ms: 15000 }.exit_code(), 9);
		assert_eq!(Error::BrowserNotFound.code(), ErrorCode::BrowserLaunchFailed);
	}

	#[test]
	fn closed_socket_counts_as_connection_error() {
		let err = Error::from(twpost_runtime::Error::ChannelClosed);
		assert_eq!(err.code(), ErrorCode::ConnectionError);
		assert!(!err.is_transient());
	}

	#[test]
	fn remote_cdp_error_is_transient() {
		let err = Error::from(twpost_runtime::Error::Remote {
			method: "Runtime.evaluate".into(),
			code: -32000,
			message: "Execution context was destroyed.".into(),
		});
		assert!(err.is_transient());
		assert_eq!(err.code(), ErrorCode::InternalError);
	}

	#[test]
	fn error_code_serializes_screaming_snake() {
		let json = serde_json::to_string(&ErrorCode::SendNotConfirmed).unwrap();
		assert_eq!(json, "\"SEND_NOT_CONFIRMED\"");
		assert_eq!(ErrorCode::ElementNotFound.to_string(), "ELEMENT_NOT_FOUND");
	}
}
