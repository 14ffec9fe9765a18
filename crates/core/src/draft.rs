//! The tweet to post for one invocation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::config::expand_home;
use crate::error::{Error, Result};

static STATUS_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/status/(\d+)").unwrap());

/// Whether the draft is a new post or a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeMode {
	NewPost,
	Reply,
}

/// Post being replied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyTarget {
	pub url: String,
	pub status_id: String,
}

impl ReplyTarget {
	/// Parses a post URL such as `https://x.com/user/status/123`.
	pub fn parse(raw: &str) -> Result<Self> {
		let parsed = url::Url::parse(raw.trim()).map_err(|e| Error::Usage(format!("invalid reply URL {raw:?}: {e}")))?;
		if !matches!(parsed.scheme(), "http" | "https") {
			return Err(Error::Usage(format!("reply URL must be http(s): {raw}")));
		}
		let status_id = extract_status_id(parsed.path())
			.ok_or_else(|| Error::Usage(format!("reply URL does not point at a post (expected /status/<id>): {raw}")))?;
		Ok(Self {
			url: parsed.to_string(),
			status_id,
		})
	}
}

/// Pulls the numeric id out of a `/status/<id>` path.
pub fn extract_status_id(path: &str) -> Option<String> {
	STATUS_ID_RE.captures(path).map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetDraft {
	/// Body, sent verbatim. Length limits are the site's business.
	pub text: String,
	pub reply_target: Option<ReplyTarget>,
	pub attachment: Option<PathBuf>,
}

impl TweetDraft {
	/// Starts a new-post draft; blank text is a usage error.
	pub fn new(text: impl Into<String>) -> Result<Self> {
		let text = text.into();
		if text.trim().is_empty() {
			return Err(Error::Usage("tweet text must not be empty".into()));
		}
		Ok(Self {
			text,
			reply_target: None,
			attachment: None,
		})
	}

	pub fn reply_to(mut self, url: &str) -> Result<Self> {
		self.reply_target = Some(ReplyTarget::parse(url)?);
		Ok(self)
	}

	/// Attaches an image; the file must exist now, before any browser work starts.
	pub fn with_attachment(mut self, path: &Path) -> Result<Self> {
		self.attachment = Some(resolve_attachment(path)?);
		Ok(self)
	}

	pub fn mode(&self) -> ComposeMode {
		if self.reply_target.is_some() {
			ComposeMode::Reply
		} else {
			ComposeMode::NewPost
		}
	}
}

/// Expands `~`, checks the file exists and returns its absolute path.
pub fn resolve_attachment(path: &Path) -> Result<PathBuf> {
	let expanded = expand_home(&path.to_string_lossy());
	if !expanded.is_file() {
		return Err(Error::FileNotFound { path: expanded });
	}
	Ok(std::fs::canonicalize(&expanded)?)
}
