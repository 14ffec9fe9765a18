//! End-to-end posting flow against the in-memory browser.

use tempfile::TempDir;
use twpost::testing::{BrowserEvent, Effect, FakeBrowser, FakePage, PageAction};
use twpost::{Config, Error, LaunchOutcome, Selectors, Timeouts, TweetDraft, post};

fn config(dir: &TempDir) -> Config {
	Config {
		port: 9444,
		profile_dir: dir.path().join("chrome_bot"),
		timeouts: Timeouts::immediate(),
		..Config::default()
	}
}

#[tokio::test]
async fn plain_post_on_running_browser() {
	let dir = TempDir::new().unwrap();
	let page = FakePage::home_timeline();
	let browser = FakeBrowser::running().with_site_tab(page.clone());
	let draft = TweetDraft::new("hi").unwrap();

	let report = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap();

	assert_eq!(report.browser, LaunchOutcome::AlreadyRunning);
	assert!(!report.opened_tab);
	assert_eq!(page.typed_text(), "hi");
	assert_eq!(page.clicks().last(), Some(&Selectors::default().send_inline));
	assert!(page.navigations().is_empty());
	assert!(browser.spawned().is_empty());
	assert!(browser.terminated().is_empty());
}

#[tokio::test]
async fn reply_navigates_to_post_before_typing() {
	let dir = TempDir::new().unwrap();
	let url = "https://x.com/u/status/1";
	let page = FakePage::status_page("1");
	let browser = FakeBrowser::running().with_site_tab(page.clone());
	let draft = TweetDraft::new("nice").unwrap().reply_to(url).unwrap();

	let report = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap();

	assert_eq!(report.reply_to.as_deref(), Some(url));
	let actions = page.actions();
	let goto_at = actions.iter().position(|a| *a == PageAction::Goto(url.to_string())).unwrap();
	let type_at = actions
		.iter()
		.position(|a| matches!(a, PageAction::InsertText { text, .. } if text == "nice"))
		.unwrap();
	assert!(goto_at < type_at);
}

#[tokio::test]
async fn cold_start_reaps_stale_holder_then_launches_once() {
	let dir = TempDir::new().unwrap();
	let config = config(&dir);
	let page = FakePage::home_timeline();
	let browser = FakeBrowser::stopped().with_stale_pid(31337).with_new_tab_page(page.clone());
	let draft = TweetDraft::new("good morning").unwrap();

	let report = post(&draft, &config, &browser, &browser, &browser).await.unwrap();

	assert_eq!(browser.terminated(), vec![31337]);
	assert_eq!(browser.spawned().len(), 1);
	assert!(matches!(report.browser, LaunchOutcome::Launched { ref reaped, .. } if reaped == &[31337]));
	assert!(report.opened_tab);
	assert!(page.is_closed(), "tab opened for the post is closed afterwards");

	let events = browser.events();
	let kill_at = events.iter().position(|e| *e == BrowserEvent::Terminate(31337)).unwrap();
	let spawn_at = events.iter().position(|e| matches!(e, BrowserEvent::Spawn(_))).unwrap();
	assert!(kill_at < spawn_at);
}

#[tokio::test]
async fn attachment_is_uploaded_with_post() {
	let dir = TempDir::new().unwrap();
	let image = dir.path().join("cat.jpg");
	std::fs::write(&image, b"jpeg").unwrap();
	let page = FakePage::home_timeline();
	let browser = FakeBrowser::running().with_site_tab(page.clone());
	let draft = TweetDraft::new("look").unwrap().with_attachment(&image).unwrap();

	let report = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap();

	let canonical = std::fs::canonicalize(&image).unwrap();
	assert_eq!(report.attachment.as_deref(), Some(canonical.as_path()));
	assert!(page
		.actions()
		.iter()
		.any(|a| matches!(a, PageAction::SetFiles { files, .. } if files == &[canonical.clone()])));
}

#[tokio::test]
async fn unconfirmed_send_fails_with_exit_nine() {
	let dir = TempDir::new().unwrap();
	let s = Selectors::default();
	let page = FakePage::home_timeline().on_click(&s.send_inline, vec![]);
	let browser = FakeBrowser::running().with_site_tab(page);
	let draft = TweetDraft::new("hi").unwrap();

	let err = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap_err();

	assert!(matches!(err, Error::SendNotConfirmed { .. }));
	assert_eq!(err.exit_code(), 9);
}

#[tokio::test]
async fn logged_out_page_is_element_not_found() {
	let dir = TempDir::new().unwrap();
	let s = Selectors::default();
	let page = FakePage::home_timeline()
		.without_element(&s.text_area)
		.without_element(&s.send_inline);
	let browser = FakeBrowser::running().with_site_tab(page.clone());
	let draft = TweetDraft::new("hi").unwrap();

	let err = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap_err();

	assert!(matches!(err, Error::ElementNotFound { .. }), "got {err:?}");
	assert!(page.typed_text().is_empty());
}

#[tokio::test]
async fn upload_that_never_finishes_stops_before_send() {
	let dir = TempDir::new().unwrap();
	let image = dir.path().join("big.png");
	std::fs::write(&image, b"png").unwrap();
	let s = Selectors::default();
	let page = FakePage::home_timeline().on_files(vec![Effect::Show(s.upload_progress.clone())]);
	let browser = FakeBrowser::running().with_site_tab(page.clone());
	let draft = TweetDraft::new("pic").unwrap().with_attachment(&image).unwrap();

	let err = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap_err();

	assert_eq!(err.exit_code(), 8);
	assert!(!page.clicks().contains(&s.send_inline));
}

#[tokio::test]
async fn browser_that_never_answers_is_launch_timeout() {
	let dir = TempDir::new().unwrap();
	let browser = FakeBrowser::stopped().never_starts();
	let draft = TweetDraft::new("hi").unwrap();

	let err = post(&draft, &config(&dir), &browser, &browser, &browser).await.unwrap_err();

	assert!(matches!(err, Error::LaunchTimeout { port: 9444, .. }));
	assert!(!browser.events().iter().any(|e| matches!(e, BrowserEvent::ListTabs(_))));
}
