//! Wires the parsed invocation to the posting flow.

use tracing::debug;
use twpost::{ChromeConnector, Config, HttpProbe, PostReport, SystemProcesses};

use crate::cli::Cli;

/// Validates the draft first, so usage and missing-file errors never touch the browser.
pub async fn run(cli: &Cli) -> twpost::Result<PostReport> {
	let config = cli.apply(Config::from_env());
	let draft = cli.draft()?;
	debug!(target = "twpost", port = config.port, profile = %config.profile_dir.display(), mode = ?draft.mode(), "starting");

	let probe = HttpProbe::new(config.timeouts.probe);
	let connector = ChromeConnector::new(&config);
	twpost::post(&draft, &config, &probe, &SystemProcesses::new(), &connector).await
}
