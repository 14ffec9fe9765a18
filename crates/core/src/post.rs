//! The whole posting flow: ensure browser, attach, compose, send.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::composer::compose_and_send;
use crate::config::Config;
use crate::draft::{ComposeMode, TweetDraft};
use crate::driver::{BrowserConnector, CdpProbe, ProcessControl};
use crate::error::Result;
use crate::launcher::{LaunchOutcome, ensure_browser};
use crate::session::open_session;

/// Summary of a successful post.
#[derive(Debug, Clone, Serialize)]
pub struct PostReport {
	pub mode: ComposeMode,
	pub text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reply_to: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub attachment: Option<PathBuf>,
	pub port: u16,
	pub browser: LaunchOutcome,
	pub tab_id: String,
	pub opened_tab: bool,
}

/// Posts `draft`. The draft is already validated, so nothing here touches the
/// filesystem before the browser is ensured.
pub async fn post(
	draft: &TweetDraft,
	config: &Config,
	probe: &dyn CdpProbe,
	processes: &dyn ProcessControl,
	connector: &dyn BrowserConnector,
) -> Result<PostReport> {
	let browser = ensure_browser(config, probe, processes).await?;
	let session = open_session(config, connector).await?;

	let report = PostReport {
		mode: draft.mode(),
		text: draft.text.clone(),
		reply_to: draft.reply_target.as_ref().map(|t| t.url.clone()),
		attachment: draft.attachment.clone(),
		port: config.port,
		browser,
		tab_id: session.tab().id.clone(),
		opened_tab: session.opened_tab(),
	};

	let sent = compose_and_send(&session, draft, config).await;
	session.finish().await;
	sent?;

	info!(target = "twpost", mode = ?report.mode, "posted");
	Ok(report)
}
