//! Runtime configuration.
//!
//! Everything the launcher, session and composer need (debugging port,
//! profile directory, target site, timeouts) travels in one [`Config`] value
//! so tests can point them at ephemeral ports and temp directories.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

pub const DEFAULT_CDP_PORT: u16 = 9222;

pub const ENV_PORT: &str = "TWPOST_CDP_PORT";
pub const ENV_PROFILE_DIR: &str = "TWPOST_PROFILE_DIR";
pub const ENV_CHROME: &str = "TWPOST_CHROME";
pub const ENV_HEADLESS: &str = "CHROME_HEADLESS";
pub const ENV_DISPLAY: &str = "DISPLAY";
pub const ENV_WAYLAND_DISPLAY: &str = "WAYLAND_DISPLAY";

#[derive(Debug, Clone)]
pub struct Config {
	/// Remote debugging port the browser listens on.
	pub port: u16,
	/// Dedicated user-data directory holding the logged-in profile.
	pub profile_dir: PathBuf,
	/// Explicit browser executable; discovered on PATH when unset.
	pub chrome_path: Option<PathBuf>,
	pub headless: bool,
	pub site: SiteConfig,
	pub timeouts: Timeouts,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			port: DEFAULT_CDP_PORT,
			profile_dir: default_profile_dir(),
			chrome_path: None,
			headless: false,
			site: SiteConfig::default(),
			timeouts: Timeouts::default(),
		}
	}
}

impl Config {
	/// Defaults overlaid with the process environment.
	pub fn from_env() -> Self {
		Self::default().with_env(|key| std::env::var(key).ok())
	}

	/// Overlays values found through `lookup`; unparseable values are ignored with a warning.
	///
	/// On Linux a headed browser needs a display server; without `DISPLAY` or
	/// `WAYLAND_DISPLAY` the browser is launched headless regardless of
	/// `CHROME_HEADLESS`.
	pub fn with_env<F>(mut self, lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(raw) = lookup(ENV_PORT) {
			match raw.trim().parse::<u16>() {
				Ok(port) if port != 0 => self.port = port,
				_ => warn!(target = "twpost", value = %raw, "ignoring invalid {}", ENV_PORT),
			}
		}
		if let Some(dir) = lookup(ENV_PROFILE_DIR).filter(|v| !v.trim().is_empty()) {
			self.profile_dir = expand_home(&dir);
		}
		if let Some(path) = lookup(ENV_CHROME).filter(|v| !v.trim().is_empty()) {
			self.chrome_path = Some(expand_home(&path));
		}
		if let Some(raw) = lookup(ENV_HEADLESS) {
			self.headless = parse_truthy(&raw);
		}
		if cfg!(target_os = "linux") && !self.headless && !has_display(&lookup) {
			info!(target = "twpost", "no DISPLAY or WAYLAND_DISPLAY set; launching the browser headless");
			self.headless = true;
		}
		self
	}
}

fn has_display<F>(lookup: &F) -> bool
where
	F: Fn(&str) -> Option<String>,
{
	[ENV_DISPLAY, ENV_WAYLAND_DISPLAY]
		.into_iter()
		.any(|key| lookup(key).is_some_and(|v| !v.trim().is_empty()))
}

/// Which site the tool drives and where a new post is composed.
#[derive(Debug, Clone)]
pub struct SiteConfig {
	pub home_url: String,
	pub hosts: Vec<String>,
}

impl Default for SiteConfig {
	fn default() -> Self {
		Self {
			home_url: "https://x.com/home".to_string(),
			hosts: ["x.com", "twitter.com", "mobile.x.com", "mobile.twitter.com"]
				.into_iter()
				.map(str::to_string)
				.collect(),
		}
	}
}

impl SiteConfig {
	/// Returns true if `url` points at one of the site's hosts.
	pub fn is_site_url(&self, url: &str) -> bool {
		let Ok(parsed) = url::Url::parse(url) else {
			return false;
		};
		parsed
			.host_str()
			.is_some_and(|host| self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host)))
	}

	/// Returns true if `url` is the home timeline (where the inline composer lives).
	pub fn is_home_url(&self, url: &str) -> bool {
		let (Ok(current), Ok(home)) = (url::Url::parse(url), url::Url::parse(&self.home_url)) else {
			return false;
		};
		self.is_site_url(url) && current.path().trim_end_matches('/') == home.path().trim_end_matches('/')
	}
}

/// Bounds for every wait the tool performs.
#[derive(Debug, Clone)]
pub struct Timeouts {
	/// HTTP timeout for `/json/*` requests.
	pub probe: Duration,
	pub launch_attempts: u32,
	pub launch_interval: Duration,
	/// Bound on each wait for a signalled process to release the port.
	pub reap_grace: Duration,
	/// Pause after the endpoint first answers, while the browser finishes starting.
	pub launch_settle: Duration,
	/// Per-command CDP response timeout.
	pub command: Duration,
	pub navigation: Duration,
	pub element: Duration,
	pub upload: Duration,
	pub confirm: Duration,
	pub poll_interval: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			probe: Duration::from_millis(400),
			launch_attempts: 10,
			launch_interval: Duration::from_millis(500),
			reap_grace: Duration::from_secs(2),
			launch_settle: Duration::from_secs(2),
			command: Duration::from_secs(10),
			navigation: Duration::from_secs(60),
			element: Duration::from_secs(30),
			upload: Duration::from_secs(60),
			confirm: Duration::from_secs(15),
			poll_interval: Duration::from_millis(250),
		}
	}
}

impl Timeouts {
	/// Near-zero waits for tests driving in-memory fakes.
	pub fn immediate() -> Self {
		Self {
			probe: Duration::from_millis(50),
			launch_attempts: 3,
			launch_interval: Duration::from_millis(1),
			reap_grace: Duration::ZERO,
			launch_settle: Duration::ZERO,
			command: Duration::from_millis(200),
			navigation: Duration::from_millis(50),
			element: Duration::from_millis(50),
			upload: Duration::from_millis(50),
			confirm: Duration::from_millis(50),
			poll_interval: Duration::from_millis(5),
		}
	}
}

/// `~/.chrome_bot`, or `./.chrome_bot` when no home directory is known.
pub fn default_profile_dir() -> PathBuf {
	dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".chrome_bot")
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
	match (path.strip_prefix("~"), dirs::home_dir()) {
		(Some(""), Some(home)) => home,
		(Some(rest), Some(home)) if rest.starts_with('/') || rest.starts_with('\\') => home.join(&rest[1..]),
		_ => PathBuf::from(path),
	}
}

fn parse_truthy(raw: &str) -> bool {
	matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
