//! Types and sends the draft through the site's compose UI.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::draft::{ComposeMode, ReplyTarget, TweetDraft};
use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::session::{Session, navigate};
use crate::wait::wait_until;

/// CSS selectors for the compose UI, keyed on `data-testid` attributes.
#[derive(Debug, Clone)]
pub struct Selectors {
	/// One post in a timeline or thread.
	pub post: String,
	/// Reply control inside a post; opens the reply dialog.
	pub reply: String,
	/// Scope for everything inside the reply dialog.
	pub dialog: String,
	pub text_area: String,
	pub file_input: String,
	/// Preview container for attached media.
	pub attachments: String,
	/// Present while an attached image is still uploading.
	pub upload_progress: String,
	/// Send button of the home timeline composer.
	pub send_inline: String,
	/// Send button of the reply dialog.
	pub send_dialog: String,
}

impl Default for Selectors {
	fn default() -> Self {
		Self {
			post: r#"article[data-testid="tweet"]"#.to_string(),
			reply: r#"[data-testid="reply"]"#.to_string(),
			dialog: r#"[role="dialog"]"#.to_string(),
			text_area: r#"[data-testid="tweetTextarea_0"]"#.to_string(),
			file_input: r#"input[type="file"][accept*="image"]"#.to_string(),
			attachments: r#"[data-testid="attachments"]"#.to_string(),
			upload_progress: r#"[data-testid="attachments"] [role="progressbar"]"#.to_string(),
			send_inline: r#"[data-testid="tweetButtonInline"]"#.to_string(),
			send_dialog: r#"[data-testid="tweetButton"]"#.to_string(),
		}
	}
}

impl Selectors {
	/// `selector` restricted to the reply dialog.
	pub fn in_dialog(&self, selector: &str) -> String {
		format!("{} {}", self.dialog, selector)
	}

	/// Reply control of the post linking to `/status/<status_id>`. A post page
	/// renders the thread's earlier posts above the target, each with its own
	/// reply control.
	pub fn reply_for(&self, status_id: &str) -> String {
		format!(r#"{}:has(a[href$="/status/{status_id}"]) {}"#, self.post, self.reply)
	}

	/// `selector` as it applies to the composer used for `mode`.
	pub fn for_mode(&self, mode: ComposeMode, selector: &str) -> String {
		match mode {
			ComposeMode::NewPost => selector.to_string(),
			ComposeMode::Reply => self.in_dialog(selector),
		}
	}

	pub fn send(&self, mode: ComposeMode) -> &str {
		match mode {
			ComposeMode::NewPost => &self.send_inline,
			ComposeMode::Reply => &self.send_dialog,
		}
	}
}

/// Drives one page through the compose steps.
pub struct Composer<'a> {
	page: &'a dyn PageDriver,
	config: &'a Config,
	selectors: Selectors,
}

impl<'a> Composer<'a> {
	pub fn new(page: &'a dyn PageDriver, config: &'a Config) -> Self {
		Self {
			page,
			config,
			selectors: Selectors::default(),
		}
	}

	pub fn with_selectors(mut self, selectors: Selectors) -> Self {
		self.selectors = selectors;
		self
	}

	/// Runs every step for `draft`; any missing control fails the whole send.
	pub async fn send(&self, draft: &TweetDraft) -> Result<()> {
		let mode = draft.mode();
		match &draft.reply_target {
			Some(target) => self.open_reply(target).await?,
			None => self.ensure_home().await?,
		}

		let text_area = self.selectors.for_mode(mode, &self.selectors.text_area);
		self.enter_text(&text_area, &draft.text).await?;

		if let Some(path) = &draft.attachment {
			self.attach(mode, path).await?;
		}

		let send = self.selectors.send(mode);
		self.wait_interactable("send", send).await?;
		info!(target = "twpost", "sending");
		self.page.click(send).await?;

		self.confirm(&text_area).await
	}

	async fn open_reply(&self, target: &ReplyTarget) -> Result<()> {
		info!(target = "twpost", status_id = %target.status_id, "opening reply");
		navigate(self.page, &target.url, self.config).await?;
		let reply = self.selectors.reply_for(&target.status_id);
		self.wait_interactable("open reply", &reply).await?;
		self.page.click(&reply).await
	}

	async fn ensure_home(&self) -> Result<()> {
		let current = self.page.url().await?;
		if self.config.site.is_home_url(&current) {
			debug!(target = "twpost", url = %current, "already on home timeline");
			return Ok(());
		}
		navigate(self.page, &self.config.site.home_url, self.config).await
	}

	async fn enter_text(&self, text_area: &str, text: &str) -> Result<()> {
		self.wait_interactable("focus text area", text_area).await?;
		self.page.click(text_area).await?;
		self.page.insert_text(text_area, text).await?;
		debug!(target = "twpost", chars = text.chars().count(), "text inserted");

		let page = self.page;
		let timeouts = &self.config.timeouts;
		let entered = wait_until(timeouts.element, timeouts.poll_interval, move || async move {
			Ok(page.text_content(text_area).await?.is_some_and(|t| !t.trim().is_empty()))
		})
		.await?;
		if !entered {
			return Err(not_found("enter text", text_area, timeouts.element));
		}
		Ok(())
	}

	async fn attach(&self, mode: ComposeMode, path: &Path) -> Result<()> {
		let s = &self.selectors;
		let file_input = s.for_mode(mode, &s.file_input);
		let attachments = s.for_mode(mode, &s.attachments);
		let progress = s.for_mode(mode, &s.upload_progress);
		let page = self.page;
		let timeouts = &self.config.timeouts;

		let input = file_input.as_str();
		let present = wait_until(timeouts.element, timeouts.poll_interval, move || async move { Ok(page.count(input).await? > 0) }).await?;
		if !present {
			return Err(not_found("attach image", input, timeouts.element));
		}

		info!(target = "twpost", path = %path.display(), "attaching image");
		page.set_input_files(input, &[path.to_path_buf()])
			.await
			.map_err(|e| Error::UploadFailed(format!("could not submit {}: {e}", path.display())))?;

		let (attachments, progress) = (attachments.as_str(), progress.as_str());
		let uploaded = wait_until(timeouts.upload, timeouts.poll_interval, move || async move {
			Ok(page.count(attachments).await? > 0 && page.count(progress).await? == 0)
		})
		.await?;
		if !uploaded {
			return Err(Error::UploadFailed(format!(
				"preview for {} did not finish within {}ms",
				path.display(),
				timeouts.upload.as_millis()
			)));
		}
		debug!(target = "twpost", "upload finished");
		Ok(())
	}

	/// The send went through once the compose box is emptied or removed.
	async fn confirm(&self, text_area: &str) -> Result<()> {
		let page = self.page;
		let timeouts = &self.config.timeouts;
		let cleared = wait_until(timeouts.confirm, timeouts.poll_interval, move || async move {
			Ok(match page.text_content(text_area).await? {
				None => true,
				Some(text) => text.trim().is_empty(),
			})
		})
		.await?;

		if cleared {
			info!(target = "twpost", "send confirmed");
			Ok(())
		} else {
			Err(Error::SendNotConfirmed {
				ms: millis(timeouts.confirm),
			})
		}
	}

	async fn wait_interactable(&self, step: &'static str, selector: &str) -> Result<()> {
		let page = self.page;
		let timeout = self.config.timeouts.element;
		let found = wait_until(timeout, self.config.timeouts.poll_interval, move || async move {
			page.is_interactable(selector).await
		})
		.await?;
		if found {
			debug!(target = "twpost", step, selector, "element ready");
			Ok(())
		} else {
			Err(not_found(step, selector, timeout))
		}
	}
}

fn not_found(step: &'static str, selector: &str, timeout: Duration) -> Error {
	Error::ElementNotFound {
		step,
		selector: selector.to_string(),
		ms: millis(timeout),
	}
}

fn millis(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Composes and sends `draft` in the session's tab.
pub async fn compose_and_send(session: &Session, draft: &TweetDraft, config: &Config) -> Result<()> {
	Composer::new(session.page(), config).send(draft).await
}
