//! Makes sure a debuggable browser is listening on the configured port.
//!
//! [`Launcher::ensure`] runs probe, reap, spawn and wait in that order. Each
//! step is public so callers and tests can drive them one at a time.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::driver::{CdpProbe, LaunchSpec, ProcessControl};
use crate::error::{Error, Result};
use crate::probe::is_cdp_available;
use crate::wait::wait_until;

/// What [`Launcher::ensure`] had to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LaunchOutcome {
	/// An endpoint was already answering; nothing was killed or started.
	AlreadyRunning,
	/// A browser was started; `reaped` lists the stale pids terminated first.
	Launched { pid: u32, reaped: Vec<u32> },
}

pub struct Launcher<'a> {
	config: &'a Config,
	probe: &'a dyn CdpProbe,
	processes: &'a dyn ProcessControl,
}

impl<'a> Launcher<'a> {
	pub fn new(config: &'a Config, probe: &'a dyn CdpProbe, processes: &'a dyn ProcessControl) -> Self {
		Self { config, probe, processes }
	}

	pub async fn probe(&self) -> bool {
		is_cdp_available(self.probe, self.config.port).await
	}

	/// Clears whatever holds the port without answering as a DevTools
	/// endpoint (a hung browser, usually). Each holder is sent SIGTERM once;
	/// survivors are killed. The profile lock is removed only once the port is
	/// free, and a port that stays held is an error.
	pub async fn reap(&self) -> Result<Vec<u32>> {
		let port = self.config.port;
		let pids = self.holders()?;

		if pids.is_empty() {
			debug!(target = "twpost", port, "no stale process on port");
			return Ok(pids);
		}

		for &pid in &pids {
			info!(target = "twpost", pid, port, "terminating stale process holding the debugging port");
			// It may have exited since the listing; the port check below decides.
			if let Err(e) = self.processes.terminate(pid) {
				warn!(target = "twpost", pid, error = %e, "terminate failed");
			}
		}

		if !self.port_released().await? {
			for pid in self.holders()? {
				warn!(target = "twpost", pid, port, "stale process ignored SIGTERM; killing it");
				if let Err(e) = self.processes.kill(pid) {
					warn!(target = "twpost", pid, error = %e, "kill failed");
				}
			}
			if !self.port_released().await? {
				let holders = self.holders()?;
				return Err(Error::Process(format!(
					"port {port} is still held by pid(s) {holders:?} after SIGKILL"
				)));
			}
		}

		match self.processes.remove_stale_lock(&self.config.profile_dir) {
			Ok(true) => debug!(target = "twpost", profile = %self.config.profile_dir.display(), "removed stale SingletonLock"),
			Ok(false) => {}
			Err(e) => warn!(target = "twpost", error = %e, "could not remove stale SingletonLock"),
		}

		Ok(pids)
	}

	/// Pids listening on the port, other than this process.
	fn holders(&self) -> Result<Vec<u32>> {
		let mut pids = self.processes.pids_on_port(self.config.port)?;
		pids.sort_unstable();
		pids.dedup();
		pids.retain(|&pid| pid != std::process::id());
		Ok(pids)
	}

	/// Waits up to `reap_grace` for the port to have no holders.
	async fn port_released(&self) -> Result<bool> {
		let timeouts = &self.config.timeouts;
		wait_until(timeouts.reap_grace, timeouts.poll_interval, move || async move {
			Ok(self.holders()?.is_empty())
		})
		.await
	}

	/// Starts the browser against the profile directory, creating it if needed.
	pub fn spawn(&self) -> Result<u32> {
		std::fs::create_dir_all(&self.config.profile_dir)?;
		let spec = self.launch_spec();
		let pid = self.processes.spawn_browser(&spec)?;
		info!(target = "twpost", pid, port = spec.port, profile = %spec.profile_dir.display(), "browser started");
		Ok(pid)
	}

	/// Polls the endpoint until it answers, then waits for the browser to settle.
	/// Fails early if the browser started as `pid` exits first.
	pub async fn wait_ready(&self, pid: u32) -> Result<()> {
		let timeouts = &self.config.timeouts;
		for attempt in 1..=timeouts.launch_attempts {
			tokio::time::sleep(timeouts.launch_interval).await;
			if self.probe().await {
				debug!(target = "twpost", attempt, "DevTools endpoint is up");
				tokio::time::sleep(timeouts.launch_settle).await;
				return Ok(());
			}
			if let Some(status) = self.processes.exit_status(pid)? {
				return Err(Error::BrowserExited { pid, status });
			}
		}

		Err(Error::LaunchTimeout {
			port: self.config.port,
			attempts: timeouts.launch_attempts,
		})
	}

	pub async fn ensure(&self) -> Result<LaunchOutcome> {
		if self.probe().await {
			info!(target = "twpost", port = self.config.port, "browser already listening");
			return Ok(LaunchOutcome::AlreadyRunning);
		}

		let reaped = self.reap().await?;
		let pid = self.spawn()?;
		self.wait_ready(pid).await?;
		Ok(LaunchOutcome::Launched { pid, reaped })
	}

	fn launch_spec(&self) -> LaunchSpec {
		LaunchSpec {
			executable: self.config.chrome_path.clone(),
			port: self.config.port,
			profile_dir: self.config.profile_dir.clone(),
			headless: self.config.headless,
		}
	}
}

/// Probes, reaps and spawns as needed; see [`Launcher::ensure`].
pub async fn ensure_browser(config: &Config, probe: &dyn CdpProbe, processes: &dyn ProcessControl) -> Result<LaunchOutcome> {
	Launcher::new(config, probe, processes).ensure().await
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;
	use crate::config::Timeouts;
	use crate::testing::{BrowserEvent, FakeBrowser};

	fn config(profile: &TempDir) -> Config {
		Config {
			port: 9555,
			profile_dir: profile.path().join("profile"),
			timeouts: Timeouts::immediate(),
			..Config::default()
		}
	}

	#[tokio::test]
	async fn running_browser_is_left_alone() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::running().with_stale_pid(4242);

		let outcome = ensure_browser(&config, &browser, &browser).await.unwrap();

		assert_eq!(outcome, LaunchOutcome::AlreadyRunning);
		assert!(browser.spawned().is_empty());
		assert!(browser.terminated().is_empty());
	}

	#[tokio::test]
	async fn stale_process_is_terminated_once_before_spawn() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().with_stale_pid(4242).with_stale_pid(4242);

		let outcome = ensure_browser(&config, &browser, &browser).await.unwrap();

		let LaunchOutcome::Launched { reaped, .. } = outcome else {
			panic!("expected a launch, got {outcome:?}");
		};
		assert_eq!(reaped, vec![4242]);
		assert_eq!(browser.terminated(), vec![4242]);
		assert_eq!(browser.spawned().len(), 1);

		let events = browser.events();
		let kill_at = events.iter().position(|e| matches!(e, BrowserEvent::Terminate(4242))).unwrap();
		let spawn_at = events.iter().position(|e| matches!(e, BrowserEvent::Spawn(_))).unwrap();
		let unlock_at = events.iter().position(|e| matches!(e, BrowserEvent::RemoveLock(_))).unwrap();
		assert!(kill_at < unlock_at && unlock_at < spawn_at, "unexpected order: {events:?}");
	}

	#[tokio::test]
	async fn spawn_uses_configured_port_profile_and_headless() {
		let dir = TempDir::new().unwrap();
		let mut config = config(&dir);
		config.headless = true;
		config.chrome_path = Some("/opt/chrome/chrome".into());
		let browser = FakeBrowser::stopped();

		ensure_browser(&config, &browser, &browser).await.unwrap();

		let spawned = browser.spawned();
		assert_eq!(spawned.len(), 1);
		let spec = &spawned[0];
		assert_eq!(spec.port, 9555);
		assert_eq!(spec.profile_dir, config.profile_dir);
		assert!(spec.headless);
		assert_eq!(spec.executable.as_deref(), Some(std::path::Path::new("/opt/chrome/chrome")));
		assert!(config.profile_dir.is_dir(), "profile dir should be created");
	}

	#[tokio::test]
	async fn no_stale_process_skips_lock_removal() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped();

		let outcome = ensure_browser(&config, &browser, &browser).await.unwrap();

		assert!(matches!(outcome, LaunchOutcome::Launched { ref reaped, .. } if reaped.is_empty()));
		assert!(!browser.events().iter().any(|e| matches!(e, BrowserEvent::RemoveLock(_))));
	}

	#[tokio::test]
	async fn endpoint_that_never_appears_times_out() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().never_starts();

		let err = ensure_browser(&config, &browser, &browser).await.unwrap_err();

		assert_eq!(err.exit_code(), 4);
		match err {
			Error::LaunchTimeout { port, attempts } => {
				assert_eq!(port, 9555);
				assert_eq!(attempts, config.timeouts.launch_attempts);
			}
			other => panic!("expected LaunchTimeout, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn holder_ignoring_sigterm_is_killed() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().with_stubborn_pid(4242);

		let outcome = ensure_browser(&config, &browser, &browser).await.unwrap();

		assert!(matches!(outcome, LaunchOutcome::Launched { ref reaped, .. } if reaped == &[4242]));
		assert_eq!(browser.terminated(), vec![4242]);
		assert_eq!(browser.killed(), vec![4242]);

		let events = browser.events();
		let kill_at = events.iter().position(|e| matches!(e, BrowserEvent::Kill(4242))).unwrap();
		let unlock_at = events.iter().position(|e| matches!(e, BrowserEvent::RemoveLock(_))).unwrap();
		let spawn_at = events.iter().position(|e| matches!(e, BrowserEvent::Spawn(_))).unwrap();
		assert!(kill_at < unlock_at && unlock_at < spawn_at, "unexpected order: {events:?}");
	}

	#[tokio::test]
	async fn port_held_after_kill_fails_without_spawning() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().with_unkillable_pid(4242);

		let err = ensure_browser(&config, &browser, &browser).await.unwrap_err();

		assert!(matches!(err, Error::Process(ref msg) if msg.contains("4242")), "got {err:?}");
		assert_eq!(err.exit_code(), 10);
		assert_eq!(browser.killed(), vec![4242]);
		assert!(browser.spawned().is_empty());
		assert!(!browser.events().iter().any(|e| matches!(e, BrowserEvent::RemoveLock(_))));
	}

	#[tokio::test]
	async fn cooperative_holder_is_not_killed() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().with_stale_pid(4242);

		ensure_browser(&config, &browser, &browser).await.unwrap();

		assert!(browser.killed().is_empty());
	}

	#[tokio::test]
	async fn browser_exiting_before_endpoint_is_reported() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().exits_on_spawn("exit status: 21");

		let err = ensure_browser(&config, &browser, &browser).await.unwrap_err();

		match err {
			Error::BrowserExited { ref status, .. } => assert_eq!(status, "exit status: 21"),
			ref other => panic!("expected BrowserExited, got {other:?}"),
		}
		assert_eq!(err.exit_code(), 10);
		let probes = browser.events().iter().filter(|e| matches!(e, BrowserEvent::Probe(_))).count();
		assert_eq!(probes, 2, "should stop after the first failed poll");
	}

	#[tokio::test]
	async fn missing_executable_is_reported() {
		let dir = TempDir::new().unwrap();
		let config = config(&dir);
		let browser = FakeBrowser::stopped().without_executable();

		let err = ensure_browser(&config, &browser, &browser).await.unwrap_err();
		assert!(matches!(err, Error::BrowserNotFound));
		assert_eq!(err.exit_code(), 10);
	}
}
