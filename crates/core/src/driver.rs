//! Capability traits between the posting flow and the outside world.
//!
//! The launcher, session and composer only see these traits. The real
//! implementations live in [`crate::chrome`] and [`crate::probe`]; in-memory
//! doubles live in [`crate::testing`].
//!
//! - [`CdpProbe`]: the `/json/version` handshake on a port
//! - [`ProcessControl`]: find, terminate, spawn and watch OS processes
//! - [`BrowserConnector`]: tab discovery/creation and attach
//! - [`PageDriver`]: DOM queries and input on one attached tab

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use twpost_runtime::VersionInfo;

/// Answers whether a DevTools endpoint is listening on a port.
#[async_trait]
pub trait CdpProbe: Send + Sync {
	/// Returns the endpoint's version info, or [`None`] on any failure.
	async fn version(&self, port: u16) -> Option<VersionInfo>;
}

/// What to start when no browser is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
	/// Explicit executable; the implementation discovers one when [`None`].
	pub executable: Option<PathBuf>,
	pub port: u16,
	pub profile_dir: PathBuf,
	pub headless: bool,
}

impl LaunchSpec {
	/// Command-line flags passed to the browser.
	pub fn args(&self) -> Vec<String> {
		let mut args = vec![
			format!("--remote-debugging-port={}", self.port),
			format!("--user-data-dir={}", self.profile_dir.display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
		];
		if self.headless {
			args.push("--headless=new".to_string());
		}
		args
	}
}

/// OS process operations used by the launcher.
pub trait ProcessControl: Send + Sync {
	/// Pids of processes listening on `port`.
	fn pids_on_port(&self, port: u16) -> Result<Vec<u32>>;

	/// Asks `pid` to exit (SIGTERM on Unix).
	fn terminate(&self, pid: u32) -> Result<()>;

	/// Forcibly kills `pid` (SIGKILL on Unix).
	fn kill(&self, pid: u32) -> Result<()>;

	/// Starts the browser detached from this process; returns its pid.
	fn spawn_browser(&self, spec: &LaunchSpec) -> Result<u32>;

	/// Exit status of a browser started by [`ProcessControl::spawn_browser`],
	/// or [`None`] while it is still running (or was not started here).
	fn exit_status(&self, pid: u32) -> Result<Option<String>>;

	/// Removes the profile's `SingletonLock` left behind by a killed browser.
	/// Returns true if a lock was removed.
	fn remove_stale_lock(&self, profile_dir: &Path) -> Result<bool>;
}

/// One browser tab as reported by the DevTools endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabInfo {
	pub id: String,
	pub url: String,
	pub title: String,
	#[serde(skip)]
	pub ws_url: Option<String>,
}

impl From<twpost_runtime::TargetInfo> for TabInfo {
	fn from(target: twpost_runtime::TargetInfo) -> Self {
		Self {
			id: target.id,
			url: target.url,
			title: target.title,
			ws_url: target.web_socket_debugger_url,
		}
	}
}

/// Tab-level access to a running browser.
#[async_trait]
pub trait BrowserConnector: Send + Sync {
	/// Regular page tabs (workers and extensions excluded).
	async fn tabs(&self, port: u16) -> Result<Vec<TabInfo>>;

	async fn open_tab(&self, port: u16, url: &str) -> Result<TabInfo>;

	async fn attach(&self, tab: &TabInfo) -> Result<Box<dyn PageDriver>>;
}

/// DOM-level automation of one attached tab.
///
/// Selectors are CSS selectors matched against the first element in document
/// order. Methods act once and do not wait; waiting is the caller's job.
#[async_trait]
pub trait PageDriver: Send + Sync {
	async fn url(&self) -> Result<String>;

	/// Starts navigation to `url`; returns once the navigation is committed.
	async fn goto(&self, url: &str) -> Result<()>;

	/// `document.readyState`.
	async fn ready_state(&self) -> Result<String>;

	async fn count(&self, selector: &str) -> Result<usize>;

	/// Present, rendered with a non-empty box, and not disabled.
	async fn is_interactable(&self, selector: &str) -> Result<bool>;

	/// `textContent` of the first match, or [`None`] if nothing matches.
	async fn text_content(&self, selector: &str) -> Result<Option<String>>;

	async fn click(&self, selector: &str) -> Result<()>;

	/// Focuses the element and inserts `text` as if typed.
	async fn insert_text(&self, selector: &str, text: &str) -> Result<()>;

	/// Submits `files` to a file `<input>`.
	async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()>;

	/// Makes the tab the active one, so it is not throttled as a background tab.
	async fn bring_to_front(&self) -> Result<()>;

	/// Closes the tab this driver is attached to.
	async fn close(&self) -> Result<()>;
}
