//! Error types for the CDP runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a DevTools endpoint.
#[derive(Debug, Error)]
pub enum Error {
	/// An HTTP discovery request could not be completed.
	#[error("HTTP request to {url} failed: {source}")]
	Http {
		url: String,
		#[source]
		source: reqwest::Error,
	},

	/// The DevTools HTTP server answered with a non-success status.
	#[error("unexpected status {status} from {url}")]
	Status { url: String, status: u16 },

	/// WebSocket handshake or framing failure.
	#[error("WebSocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	/// Malformed or unexpected protocol traffic.
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// The browser rejected a command.
	#[error("{method} failed ({code}): {message}")]
	Remote { method: String, code: i64, message: String },

	/// No response arrived for a command within the connection timeout.
	#[error("Timeout after {ms}ms waiting for {method}")]
	Timeout { method: String, ms: u64 },

	/// The WebSocket closed while a command was outstanding.
	#[error("CDP connection closed")]
	ChannelClosed,

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if this error means the endpoint could not be reached at all.
	pub fn is_unreachable(&self) -> bool {
		matches!(self, Error::Http { .. } | Error::Status { .. } | Error::WebSocket(_) | Error::ChannelClosed)
	}

	/// Returns true if this error is a command timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}
}
