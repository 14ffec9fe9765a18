//! Runs the built binary for invocations that must fail before any browser work.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

fn twpost_binary() -> PathBuf {
	PathBuf::from(env!("CARGO_BIN_EXE_twpost"))
}

/// A loopback port nothing listens on.
fn free_port() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port()
}

/// Runs with an unused port and a throwaway profile so nothing real is touched.
fn run(args: &[&str], profile: &TempDir) -> Output {
	Command::new(twpost_binary())
		.args(args)
		.env("TWPOST_CDP_PORT", free_port().to_string())
		.env("TWPOST_PROFILE_DIR", profile.path().join("profile"))
		.env("TWPOST_CHROME", profile.path().join("no-chrome-here"))
		.env_remove("RUST_LOG")
		.output()
		.expect("failed to execute twpost")
}

fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn help_exits_zero() {
	let dir = TempDir::new().unwrap();
	let output = run(&["--help"], &dir);
	assert_eq!(output.status.code(), Some(0));
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.contains("--reply"));
	assert!(stdout.contains("--image"));
}

#[test]
fn missing_text_is_usage_error() {
	let dir = TempDir::new().unwrap();
	let output = run(&[], &dir);
	assert_eq!(output.status.code(), Some(2));
}

#[test]
fn blank_text_is_usage_error() {
	let dir = TempDir::new().unwrap();
	let output = run(&["   "], &dir);
	assert_eq!(output.status.code(), Some(2));
	assert!(stderr(&output).contains("Error [USAGE_ERROR]"), "stderr: {}", stderr(&output));
}

#[test]
fn bad_reply_url_is_usage_error() {
	let dir = TempDir::new().unwrap();
	let output = run(&["-r", "https://x.com/home", "nice"], &dir);
	assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_image_fails_before_launching_browser() {
	let dir = TempDir::new().unwrap();
	let output = run(&["-i", "missing.png", "x"], &dir);

	assert_eq!(output.status.code(), Some(3));
	assert!(stderr(&output).contains("Error [FILE_NOT_FOUND]"), "stderr: {}", stderr(&output));
	assert!(!dir.path().join("profile").exists(), "profile dir is only created by a launch");
}

#[test]
fn json_format_prints_failure_envelope() {
	let dir = TempDir::new().unwrap();
	let output = run(&["-f", "json", "-i", "missing.png", "x"], &dir);

	let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
	assert_eq!(envelope["ok"], false);
	assert_eq!(envelope["command"], "post");
	assert_eq!(envelope["error"]["code"], "FILE_NOT_FOUND");
}

#[test]
fn unlaunchable_browser_reports_launch_failure() {
	let dir = TempDir::new().unwrap();
	let output = run(&["hello"], &dir);

	assert_eq!(output.status.code(), Some(10));
	assert!(stderr(&output).contains("Error [BROWSER_LAUNCH_FAILED]"), "stderr: {}", stderr(&output));
}
