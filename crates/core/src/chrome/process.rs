//! Finding, terminating and spawning browser processes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::driver::{LaunchSpec, ProcessControl};
use crate::error::{Error, Result};

/// [`ProcessControl`] backed by the host OS (`lsof`/`kill` on Unix, `netstat`/`taskkill` on Windows).
///
/// Browsers it spawns are kept as child handles so an early exit can be noticed.
#[derive(Debug, Default)]
pub struct SystemProcesses {
	children: Mutex<HashMap<u32, Child>>,
}

impl SystemProcesses {
	pub fn new() -> Self {
		Self::default()
	}
}

/// Sends `signal` to `pid`. Windows always gets `taskkill /F`.
fn send_signal(pid: u32, signal: &str) -> Result<()> {
	let pid_arg = pid.to_string();
	#[cfg(windows)]
	let status = Command::new("taskkill").args(["/PID", &pid_arg, "/F"]).status();
	#[cfg(not(windows))]
	let status = Command::new("kill").args([format!("-{signal}").as_str(), &pid_arg]).status();

	match status {
		Ok(status) if status.success() => {
			debug!(target = "twpost", pid, signal, "signalled");
			Ok(())
		}
		Ok(status) => Err(Error::Process(format!("could not signal pid {pid} with {signal} ({status})"))),
		Err(e) => Err(Error::Process(format!("could not signal pid {pid} with {signal}: {e}"))),
	}
}

impl ProcessControl for SystemProcesses {
	fn pids_on_port(&self, port: u16) -> Result<Vec<u32>> {
		#[cfg(windows)]
		{
			let output = Command::new("netstat")
				.args(["-ano", "-p", "TCP"])
				.output()
				.map_err(|e| Error::Process(format!("failed to run netstat: {e}")))?;
			Ok(parse_netstat_pids(&String::from_utf8_lossy(&output.stdout), port))
		}

		#[cfg(not(windows))]
		{
			let output = match Command::new("lsof")
				.args(["-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
				.output()
			{
				Ok(output) => output,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
					warn!(target = "twpost", port, "lsof not installed; cannot look for a stale browser on the port");
					return Ok(Vec::new());
				}
				Err(e) => return Err(Error::Process(format!("failed to run lsof: {e}"))),
			};
			// lsof exits 1 when nothing matches.
			Ok(parse_lsof_pids(&String::from_utf8_lossy(&output.stdout)))
		}
	}

	fn terminate(&self, pid: u32) -> Result<()> {
		send_signal(pid, "TERM")
	}

	fn kill(&self, pid: u32) -> Result<()> {
		send_signal(pid, "KILL")
	}

	fn spawn_browser(&self, spec: &LaunchSpec) -> Result<u32> {
		let executable = match &spec.executable {
			Some(path) => path.clone(),
			None => find_chrome_executable().ok_or(Error::BrowserNotFound)?,
		};
		debug!(target = "twpost", executable = %executable.display(), args = ?spec.args(), "spawning browser");

		let mut cmd = Command::new(&executable);
		cmd.args(spec.args()).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

		#[cfg(unix)]
		std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

		let child = cmd.spawn().map_err(|source| {
			if source.kind() == std::io::ErrorKind::NotFound && spec.executable.is_none() {
				Error::BrowserNotFound
			} else {
				Error::LaunchFailed { executable, source }
			}
		})?;
		let pid = child.id();
		self.children.lock().insert(pid, child);
		Ok(pid)
	}

	fn exit_status(&self, pid: u32) -> Result<Option<String>> {
		let mut children = self.children.lock();
		let Some(child) = children.get_mut(&pid) else {
			return Ok(None);
		};
		Ok(child.try_wait()?.map(|status| status.to_string()))
	}

	fn remove_stale_lock(&self, profile_dir: &Path) -> Result<bool> {
		let lock = profile_dir.join("SingletonLock");
		// The lock is a dangling symlink once its owner is gone, so `exists()` would miss it.
		match std::fs::symlink_metadata(&lock) {
			Ok(_) => {
				std::fs::remove_file(&lock)?;
				Ok(true)
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

/// First Chromium-family browser found at a well-known location or on `PATH`.
pub fn find_chrome_executable() -> Option<PathBuf> {
	let candidates: Vec<String> = if cfg!(target_os = "macos") {
		[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_browser_candidates()
	} else {
		[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"brave",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	};

	candidates.into_iter().find_map(|candidate| {
		let path = PathBuf::from(&candidate);
		if path.is_absolute() {
			path.exists().then_some(path)
		} else {
			which::which(&candidate).ok()
		}
	})
}

fn windows_browser_candidates() -> Vec<String> {
	let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
		.into_iter()
		.filter_map(|key| std::env::var_os(key).map(PathBuf::from))
		.collect();
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["BraveSoftware", "Brave-Browser", "Application", "brave.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates: Vec<String> = roots
		.iter()
		.flat_map(|root| {
			suffixes
				.iter()
				.map(move |suffix| suffix.iter().fold(root.clone(), |path, part| path.join(part)))
		})
		.map(|path| path.to_string_lossy().into_owned())
		.collect();
	candidates.extend(["chrome.exe", "msedge.exe", "brave.exe", "chromium.exe"].map(str::to_string));
	candidates
}

/// Pids from `lsof -t` output, one per line, deduplicated in order.
#[cfg_attr(windows, allow(dead_code))]
fn parse_lsof_pids(output: &str) -> Vec<u32> {
	let mut pids = Vec::new();
	for pid in output.lines().filter_map(|line| line.trim().parse::<u32>().ok()) {
		if !pids.contains(&pid) {
			pids.push(pid);
		}
	}
	pids
}

/// Pids of `LISTENING` rows in `netstat -ano` output whose local address ends in `:port`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_netstat_pids(output: &str, port: u16) -> Vec<u32> {
	let suffix = format!(":{port}");
	let mut pids = Vec::new();
	for line in output.lines() {
		let parts: Vec<&str> = line.split_whitespace().collect();
		let [_, local, _, state, pid] = parts.as_slice() else {
			continue;
		};
		if *state != "LISTENING" || !local.ends_with(&suffix) {
			continue;
		}
		if let Ok(pid) = pid.parse::<u32>() {
			if pid != 0 && !pids.contains(&pid) {
				pids.push(pid);
			}
		}
	}
	pids
}
