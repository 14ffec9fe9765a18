//! Attaching to the site's tab in the running browser.

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::{Config, SiteConfig};
use crate::driver::{BrowserConnector, PageDriver, TabInfo};
use crate::error::{Error, ErrorCode, Result};
use crate::wait::wait_until;

/// The attached tab the composer drives.
pub struct Session {
	page: Box<dyn PageDriver>,
	tab: TabInfo,
	opened: bool,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("tab", &self.tab)
			.field("opened", &self.opened)
			.finish_non_exhaustive()
	}
}

impl Session {
	pub fn new(page: Box<dyn PageDriver>, tab: TabInfo, opened: bool) -> Self {
		Self { page, tab, opened }
	}

	pub fn page(&self) -> &dyn PageDriver {
		self.page.as_ref()
	}

	pub fn tab(&self) -> &TabInfo {
		&self.tab
	}

	/// True if this invocation opened the tab rather than reusing one.
	pub fn opened_tab(&self) -> bool {
		self.opened
	}

	/// Closes the tab if this invocation opened it; a reused tab is left as found.
	pub async fn finish(self) {
		if !self.opened {
			return;
		}
		match self.page.close().await {
			Ok(()) => debug!(target = "twpost", tab = %self.tab.id, "closed tab opened for this post"),
			Err(e) => warn!(target = "twpost", tab = %self.tab.id, error = %e, "failed to close tab"),
		}
	}
}

/// Picks the tab to reuse: a site tab already on the home timeline, else the first site tab.
pub fn pick_tab<'t>(tabs: &'t [TabInfo], site: &SiteConfig) -> Option<&'t TabInfo> {
	tabs.iter()
		.find(|t| site.is_home_url(&t.url))
		.or_else(|| tabs.iter().find(|t| site.is_site_url(&t.url)))
}

/// Finds or opens the site's tab, attaches to it and waits for the document.
pub async fn open_session(config: &Config, connector: &dyn BrowserConnector) -> Result<Session> {
	let port = config.port;
	let tabs = connector.tabs(port).await.map_err(|e| connection_error(port, e))?;
	debug!(target = "twpost", count = tabs.len(), "listed tabs");

	let (tab, opened) = match pick_tab(&tabs, &config.site) {
		Some(tab) => {
			info!(target = "twpost", tab = %tab.id, url = %tab.url, "reusing open tab");
			(tab.clone(), false)
		}
		None => {
			let tab = connector
				.open_tab(port, &config.site.home_url)
				.await
				.map_err(|e| connection_error(port, e))?;
			info!(target = "twpost", tab = %tab.id, url = %config.site.home_url, "opened new tab");
			(tab, true)
		}
	};

	let page = connector.attach(&tab).await.map_err(|e| connection_error(port, e))?;
	if !opened {
		if let Err(e) = page.bring_to_front().await {
			warn!(target = "twpost", tab = %tab.id, error = %e, "could not activate tab");
		}
	}
	let session = Session::new(page, tab, opened);
	let url = session.tab.url.clone();
	if let Err(e) = wait_for_document(session.page(), &url, config).await {
		session.finish().await;
		return Err(e);
	}
	Ok(session)
}

/// Navigates to `url` and waits for the document to become usable.
pub async fn navigate(page: &dyn PageDriver, url: &str, config: &Config) -> Result<()> {
	info!(target = "twpost", url, "navigating");
	page.goto(url).await.map_err(|e| match e {
		Error::Navigation { .. } => e,
		e if e.code() == ErrorCode::ConnectionError => e,
		e => Error::Navigation {
			url: url.to_string(),
			message: e.to_string(),
		},
	})?;
	wait_for_document(page, url, config).await
}

/// Waits for `document.readyState` to reach `interactive` or `complete`.
pub async fn wait_for_document(page: &dyn PageDriver, url: &str, config: &Config) -> Result<()> {
	let timeouts = &config.timeouts;
	let ready = wait_until(timeouts.navigation, timeouts.poll_interval, move || async move {
		let state = page.ready_state().await?;
		Ok(matches!(state.as_str(), "interactive" | "complete"))
	})
	.await?;

	if ready {
		Ok(())
	} else {
		Err(Error::Navigation {
			url: url.to_string(),
			message: format!("document not ready within {}ms", timeouts.navigation.as_millis()),
		})
	}
}

fn connection_error(port: u16, e: Error) -> Error {
	Error::Connection {
		port,
		message: e.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Timeouts;
	use crate::testing::{BrowserEvent, FakeBrowser, FakePage, HOME_URL, PageAction};

	fn config() -> Config {
		Config {
			timeouts: Timeouts::immediate(),
			..Config::default()
		}
	}

	fn tab(id: &str, url: &str) -> TabInfo {
		TabInfo {
			id: id.to_string(),
			url: url.to_string(),
			title: String::new(),
			ws_url: None,
		}
	}

	#[test]
	fn pick_tab_prefers_home_then_any_site_tab() {
		let site = SiteConfig::default();
		let tabs = vec![
			tab("a", "https://example.com/"),
			tab("b", "https://x.com/someone/status/5"),
			tab("c", "https://x.com/home"),
		];
		assert_eq!(pick_tab(&tabs, &site).map(|t| t.id.as_str()), Some("c"));
		assert_eq!(pick_tab(&tabs[..2], &site).map(|t| t.id.as_str()), Some("b"));
		assert!(pick_tab(&tabs[..1], &site).is_none());
	}

	#[tokio::test]
	async fn reuses_existing_site_tab() {
		let page = FakePage::home_timeline();
		let browser = FakeBrowser::running().with_tab("home", page.clone());

		let session = open_session(&config(), &browser).await.unwrap();

		assert_eq!(session.tab().id, "home");
		assert!(!session.opened_tab());
		assert!(browser.opened_tabs().is_empty());

		session.finish().await;
		assert!(!page.is_closed(), "reused tab must stay open");
		assert!(page.actions().contains(&PageAction::BringToFront));
	}

	#[test]
	fn debug_shows_tab_and_ownership() {
		let session = Session::new(Box::new(FakePage::default()), tab("t1", HOME_URL), true);
		let debug = format!("{session:?}");
		assert!(debug.contains("t1"), "{debug}");
		assert!(debug.contains("opened: true"), "{debug}");
	}

	#[tokio::test]
	async fn opens_home_tab_when_none_exists() {
		let browser = FakeBrowser::running().with_tab("other", FakePage::new("https://example.com/"));

		let session = open_session(&config(), &browser).await.unwrap();

		assert!(session.opened_tab());
		assert_eq!(browser.opened_tabs(), vec![HOME_URL.to_string()]);
		assert_eq!(session.tab().url, HOME_URL);
		session.finish().await;
	}

	#[tokio::test]
	async fn finish_closes_only_opened_tab() {
		let page = FakePage::default();
		let browser = FakeBrowser::running().with_new_tab_page(page.clone());

		let session = open_session(&config(), &browser).await.unwrap();
		session.finish().await;

		assert!(page.is_closed());
		assert!(!page.actions().contains(&PageAction::BringToFront), "a new tab is already in front");
	}

	#[tokio::test]
	async fn listing_failure_is_connection_error() {
		let browser = FakeBrowser::stopped();
		let err = open_session(&config(), &browser).await.unwrap_err();
		assert!(matches!(err, Error::Connection { port: 9222, .. }), "got {err:?}");
		assert_eq!(err.exit_code(), 5);
	}

	#[tokio::test]
	async fn attach_failure_is_connection_error() {
		let browser = FakeBrowser::running().with_site_tab(FakePage::home_timeline()).failing_attach();
		let err = open_session(&config(), &browser).await.unwrap_err();
		assert!(matches!(err, Error::Connection { .. }), "got {err:?}");
		assert!(browser.events().iter().any(|e| matches!(e, BrowserEvent::Attach(id) if id == "site-tab")));
	}

	#[tokio::test]
	async fn document_that_never_loads_is_navigation_error() {
		let page = FakePage::home_timeline().with_ready_state("loading");
		let browser = FakeBrowser::running().with_site_tab(page);
		let err = open_session(&config(), &browser).await.unwrap_err();
		assert!(matches!(err, Error::Navigation { .. }), "got {err:?}");
		assert_eq!(err.exit_code(), 6);
	}

	#[tokio::test]
	async fn navigate_records_goto_and_waits_for_document() {
		let page = FakePage::new("about:blank");
		navigate(&page, "https://x.com/u/status/1", &config()).await.unwrap();
		assert_eq!(page.navigations(), vec!["https://x.com/u/status/1".to_string()]);
		assert_eq!(page.current_url(), "https://x.com/u/status/1");
	}
}
