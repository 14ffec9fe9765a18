//! In-memory browser doubles for exercising the launcher, session and composer
//! without spawning Chrome.
//!
//! [`FakeBrowser`] implements [`CdpProbe`], [`ProcessControl`] and
//! [`BrowserConnector`] over one shared state and records every call as a
//! [`BrowserEvent`]. [`FakePage`] implements [`PageDriver`] over a map of
//! selectors to elements; clicks and file submissions can be wired to
//! [`Effect`]s that change the page, and every action is recorded as a
//! [`PageAction`].
//!
//! ```ignore
//! use twpost::testing::{FakeBrowser, FakePage};
//!
//! let page = FakePage::home_timeline();
//! let browser = FakeBrowser::running().with_site_tab(page.clone());
//! // ... run the flow against `browser`
//! assert!(page.typed_text().contains("hello"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::composer::Selectors;
use crate::driver::{BrowserConnector, CdpProbe, LaunchSpec, PageDriver, ProcessControl, TabInfo, VersionInfo};
use crate::error::{Error, Result};

pub const HOME_URL: &str = "https://x.com/home";

/// Call recorded by [`FakeBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
	Probe(u16),
	ListPids(u16),
	Terminate(u32),
	Kill(u32),
	RemoveLock(PathBuf),
	Spawn(LaunchSpec),
	ListTabs(u16),
	OpenTab(String),
	Attach(String),
}

struct BrowserState {
	running: bool,
	starts_on_spawn: bool,
	executable_found: bool,
	fail_attach: bool,
	stale_pids: Vec<u32>,
	ignores_term: Vec<u32>,
	ignores_kill: Vec<u32>,
	exit_on_spawn: Option<String>,
	spawned_pids: Vec<u32>,
	next_pid: u32,
	tabs: Vec<(TabInfo, FakePage)>,
	new_tab_page: Option<FakePage>,
	events: Vec<BrowserEvent>,
}

/// Scriptable stand-in for a Chrome process and its DevTools endpoint.
#[derive(Clone)]
pub struct FakeBrowser {
	state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
	/// A browser already answering on every port.
	pub fn running() -> Self {
		Self::with_running(true)
	}

	/// Nothing listening; a spawn brings the endpoint up.
	pub fn stopped() -> Self {
		Self::with_running(false)
	}

	fn with_running(running: bool) -> Self {
		Self {
			state: Arc::new(Mutex::new(BrowserState {
				running,
				starts_on_spawn: true,
				executable_found: true,
				fail_attach: false,
				stale_pids: Vec::new(),
				ignores_term: Vec::new(),
				ignores_kill: Vec::new(),
				exit_on_spawn: None,
				spawned_pids: Vec::new(),
				next_pid: 1000,
				tabs: Vec::new(),
				new_tab_page: None,
				events: Vec::new(),
			})),
		}
	}

	/// Reports `pid` as holding the port. Repeats model duplicate `lsof` lines.
	pub fn with_stale_pid(self, pid: u32) -> Self {
		self.state.lock().stale_pids.push(pid);
		self
	}

	/// Like [`FakeBrowser::with_stale_pid`], but `pid` survives SIGTERM and only
	/// releases the port when killed.
	pub fn with_stubborn_pid(self, pid: u32) -> Self {
		self.state.lock().ignores_term.push(pid);
		self.with_stale_pid(pid)
	}

	/// `pid` holds the port no matter what it is sent.
	pub fn with_unkillable_pid(self, pid: u32) -> Self {
		self.state.lock().ignores_kill.push(pid);
		self.with_stubborn_pid(pid)
	}

	/// Spawned browsers exit at once with `status`; the endpoint never answers.
	pub fn exits_on_spawn(self, status: &str) -> Self {
		let mut state = self.state.lock();
		state.starts_on_spawn = false;
		state.exit_on_spawn = Some(status.to_string());
		drop(state);
		self
	}

	/// Spawns succeed but the endpoint never answers.
	pub fn never_starts(self) -> Self {
		self.state.lock().starts_on_spawn = false;
		self
	}

	/// No executable can be discovered (an explicit path still works).
	pub fn without_executable(self) -> Self {
		self.state.lock().executable_found = false;
		self
	}

	pub fn failing_attach(self) -> Self {
		self.state.lock().fail_attach = true;
		self
	}

	/// Adds an open tab backed by `page`; its URL is the page's current URL.
	pub fn with_tab(self, id: &str, page: FakePage) -> Self {
		let tab = TabInfo {
			id: id.to_string(),
			url: page.current_url(),
			title: String::new(),
			ws_url: Some(format!("ws://127.0.0.1/devtools/page/{id}")),
		};
		self.state.lock().tabs.push((tab, page));
		self
	}

	/// Adds an open tab on the home timeline backed by `page`.
	pub fn with_site_tab(self, page: FakePage) -> Self {
		self.with_tab("site-tab", page)
	}

	/// Page handed out for tabs opened through [`BrowserConnector::open_tab`].
	pub fn with_new_tab_page(self, page: FakePage) -> Self {
		self.state.lock().new_tab_page = Some(page);
		self
	}

	pub fn events(&self) -> Vec<BrowserEvent> {
		self.state.lock().events.clone()
	}

	pub fn spawned(&self) -> Vec<LaunchSpec> {
		self.filter_events(|e| match e {
			BrowserEvent::Spawn(spec) => Some(spec.clone()),
			_ => None,
		})
	}

	pub fn terminated(&self) -> Vec<u32> {
		self.filter_events(|e| match e {
			BrowserEvent::Terminate(pid) => Some(*pid),
			_ => None,
		})
	}

	pub fn killed(&self) -> Vec<u32> {
		self.filter_events(|e| match e {
			BrowserEvent::Kill(pid) => Some(*pid),
			_ => None,
		})
	}

	pub fn opened_tabs(&self) -> Vec<String> {
		self.filter_events(|e| match e {
			BrowserEvent::OpenTab(url) => Some(url.clone()),
			_ => None,
		})
	}

	fn filter_events<T>(&self, f: impl Fn(&BrowserEvent) -> Option<T>) -> Vec<T> {
		self.state.lock().events.iter().filter_map(f).collect()
	}

	fn record(&self, event: BrowserEvent) {
		self.state.lock().events.push(event);
	}
}

#[async_trait]
impl CdpProbe for FakeBrowser {
	async fn version(&self, port: u16) -> Option<VersionInfo> {
		self.record(BrowserEvent::Probe(port));
		self.state.lock().running.then(|| VersionInfo {
			browser: Some("Chrome/126.0.0.0".to_string()),
			protocol_version: Some("1.3".to_string()),
			web_socket_debugger_url: format!("ws://127.0.0.1:{port}/devtools/browser/fake"),
		})
	}
}

impl ProcessControl for FakeBrowser {
	fn pids_on_port(&self, port: u16) -> Result<Vec<u32>> {
		self.record(BrowserEvent::ListPids(port));
		Ok(self.state.lock().stale_pids.clone())
	}

	fn terminate(&self, pid: u32) -> Result<()> {
		let mut state = self.state.lock();
		state.events.push(BrowserEvent::Terminate(pid));
		if !state.ignores_term.contains(&pid) {
			state.stale_pids.retain(|&p| p != pid);
		}
		Ok(())
	}

	fn kill(&self, pid: u32) -> Result<()> {
		let mut state = self.state.lock();
		state.events.push(BrowserEvent::Kill(pid));
		if !state.ignores_kill.contains(&pid) {
			state.stale_pids.retain(|&p| p != pid);
		}
		Ok(())
	}

	fn spawn_browser(&self, spec: &LaunchSpec) -> Result<u32> {
		let mut state = self.state.lock();
		if spec.executable.is_none() && !state.executable_found {
			return Err(Error::BrowserNotFound);
		}
		state.events.push(BrowserEvent::Spawn(spec.clone()));
		if state.starts_on_spawn {
			state.running = true;
		}
		state.next_pid += 1;
		let pid = state.next_pid;
		state.spawned_pids.push(pid);
		Ok(pid)
	}

	fn exit_status(&self, pid: u32) -> Result<Option<String>> {
		let state = self.state.lock();
		if !state.spawned_pids.contains(&pid) {
			return Ok(None);
		}
		Ok(state.exit_on_spawn.clone())
	}

	fn remove_stale_lock(&self, profile_dir: &Path) -> Result<bool> {
		self.record(BrowserEvent::RemoveLock(profile_dir.to_path_buf()));
		Ok(true)
	}
}

#[async_trait]
impl BrowserConnector for FakeBrowser {
	async fn tabs(&self, port: u16) -> Result<Vec<TabInfo>> {
		self.record(BrowserEvent::ListTabs(port));
		let state = self.state.lock();
		if !state.running {
			return Err(twpost_runtime::Error::Protocol(format!("nothing listening on port {port}")).into());
		}
		Ok(state.tabs.iter().map(|(tab, _)| tab.clone()).collect())
	}

	async fn open_tab(&self, _port: u16, url: &str) -> Result<TabInfo> {
		self.record(BrowserEvent::OpenTab(url.to_string()));
		let mut state = self.state.lock();
		let page = state.new_tab_page.clone().unwrap_or_default();
		page.set_url(url);
		let id = format!("new-tab-{}", state.tabs.len() + 1);
		let tab = TabInfo {
			id: id.clone(),
			url: url.to_string(),
			title: String::new(),
			ws_url: Some(format!("ws://127.0.0.1/devtools/page/{id}")),
		};
		state.tabs.push((tab.clone(), page));
		Ok(tab)
	}

	async fn attach(&self, tab: &TabInfo) -> Result<Box<dyn PageDriver>> {
		self.record(BrowserEvent::Attach(tab.id.clone()));
		let state = self.state.lock();
		if state.fail_attach {
			return Err(twpost_runtime::Error::ChannelClosed.into());
		}
		state
			.tabs
			.iter()
			.find(|(t, _)| t.id == tab.id)
			.map(|(_, page)| Box::new(page.clone()) as Box<dyn PageDriver>)
			.ok_or_else(|| twpost_runtime::Error::Protocol(format!("no tab with id {}", tab.id)).into())
	}
}

/// One element on a [`FakePage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
	pub visible: bool,
	pub disabled: bool,
	pub text: String,
}

impl Default for FakeElement {
	fn default() -> Self {
		Self {
			visible: true,
			disabled: false,
			text: String::new(),
		}
	}
}

/// Page change triggered by a click or a file submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
	Show(String),
	Remove(String),
	ClearText(String),
}

/// Action recorded by [`FakePage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
	Goto(String),
	Click(String),
	InsertText { selector: String, text: String },
	SetFiles { selector: String, files: Vec<PathBuf> },
	BringToFront,
	Close,
}

struct PageState {
	url: String,
	ready_state: String,
	elements: HashMap<String, FakeElement>,
	on_click: HashMap<String, Vec<Effect>>,
	on_files: Vec<Effect>,
	rejects_text: Vec<String>,
	actions: Vec<PageAction>,
}

/// Scriptable page keyed by exact selector strings.
#[derive(Clone)]
pub struct FakePage {
	state: Arc<Mutex<PageState>>,
}

impl Default for FakePage {
	fn default() -> Self {
		Self {
			state: Arc::new(Mutex::new(PageState {
				url: "about:blank".to_string(),
				ready_state: "complete".to_string(),
				elements: HashMap::new(),
				on_click: HashMap::new(),
				on_files: Vec::new(),
				rejects_text: Vec::new(),
				actions: Vec::new(),
			})),
		}
	}
}

impl FakePage {
	pub fn new(url: &str) -> Self {
		let page = Self::default();
		page.set_url(url);
		page
	}

	/// Logged-in home timeline with a working inline composer: sending clears
	/// the text area and choosing an image shows a finished preview.
	pub fn home_timeline() -> Self {
		let s = Selectors::default();
		Self::new(HOME_URL)
			.with_element(&s.text_area)
			.with_element(&s.file_input)
			.with_element(&s.send_inline)
			.on_click(&s.send_inline, vec![Effect::ClearText(s.text_area.clone())])
			.on_files(vec![Effect::Show(s.attachments.clone())])
	}

	/// Home tab that, once navigated to post `status_id`, shows it below its
	/// parent. Both reply controls open the reply dialog; the dialog works
	/// either way, so tests must check which control was clicked.
	pub fn status_page(status_id: &str) -> Self {
		let s = Selectors::default();
		let text_area = s.in_dialog(&s.text_area);
		let file_input = s.in_dialog(&s.file_input);
		let attachments = s.in_dialog(&s.attachments);
		let open_dialog = vec![
			Effect::Show(text_area.clone()),
			Effect::Show(file_input),
			Effect::Show(s.send_dialog.clone()),
		];
		let target_reply = s.reply_for(status_id);
		Self::new(HOME_URL)
			.with_element(&s.reply)
			.with_element(&target_reply)
			.on_click(&s.reply, open_dialog.clone())
			.on_click(&target_reply, open_dialog)
			.on_click(&s.send_dialog, vec![Effect::Remove(text_area)])
			.on_files(vec![Effect::Show(attachments)])
	}

	pub fn with_element(self, selector: &str) -> Self {
		self.put_element(selector, FakeElement::default())
	}

	pub fn put_element(self, selector: &str, element: FakeElement) -> Self {
		self.state.lock().elements.insert(selector.to_string(), element);
		self
	}

	pub fn without_element(self, selector: &str) -> Self {
		self.state.lock().elements.remove(selector);
		self
	}

	/// Replaces the effects of clicking `selector`.
	pub fn on_click(self, selector: &str, effects: Vec<Effect>) -> Self {
		self.state.lock().on_click.insert(selector.to_string(), effects);
		self
	}

	/// Replaces the effects of submitting files to any input.
	pub fn on_files(self, effects: Vec<Effect>) -> Self {
		self.state.lock().on_files = effects;
		self
	}

	/// Text inserted into `selector` is recorded but never shows up in it.
	pub fn rejecting_text(self, selector: &str) -> Self {
		self.state.lock().rejects_text.push(selector.to_string());
		self
	}

	pub fn with_ready_state(self, ready_state: &str) -> Self {
		self.state.lock().ready_state = ready_state.to_string();
		self
	}

	pub fn set_url(&self, url: &str) {
		self.state.lock().url = url.to_string();
	}

	pub fn current_url(&self) -> String {
		self.state.lock().url.clone()
	}

	pub fn element(&self, selector: &str) -> Option<FakeElement> {
		self.state.lock().elements.get(selector).cloned()
	}

	pub fn actions(&self) -> Vec<PageAction> {
		self.state.lock().actions.clone()
	}

	/// Everything inserted through [`PageDriver::insert_text`], concatenated.
	pub fn typed_text(&self) -> String {
		self.actions()
			.into_iter()
			.filter_map(|a| match a {
				PageAction::InsertText { text, .. } => Some(text),
				_ => None,
			})
			.collect()
	}

	pub fn navigations(&self) -> Vec<String> {
		self.actions()
			.into_iter()
			.filter_map(|a| match a {
				PageAction::Goto(url) => Some(url),
				_ => None,
			})
			.collect()
	}

	pub fn clicks(&self) -> Vec<String> {
		self.actions()
			.into_iter()
			.filter_map(|a| match a {
				PageAction::Click(selector) => Some(selector),
				_ => None,
			})
			.collect()
	}

	pub fn is_closed(&self) -> bool {
		self.actions().contains(&PageAction::Close)
	}

	fn apply(state: &mut PageState, effects: &[Effect]) {
		for effect in effects {
			match effect {
				Effect::Show(selector) => {
					state.elements.entry(selector.clone()).or_default().visible = true;
				}
				Effect::Remove(selector) => {
					state.elements.remove(selector);
				}
				Effect::ClearText(selector) => {
					if let Some(el) = state.elements.get_mut(selector) {
						el.text.clear();
					}
				}
			}
		}
	}
}

fn no_match(selector: &str) -> Error {
	Error::Script(format!("no element matches {selector}"))
}

#[async_trait]
impl PageDriver for FakePage {
	async fn url(&self) -> Result<String> {
		Ok(self.current_url())
	}

	async fn goto(&self, url: &str) -> Result<()> {
		let mut state = self.state.lock();
		state.actions.push(PageAction::Goto(url.to_string()));
		state.url = url.to_string();
		Ok(())
	}

	async fn ready_state(&self) -> Result<String> {
		Ok(self.state.lock().ready_state.clone())
	}

	async fn count(&self, selector: &str) -> Result<usize> {
		Ok(usize::from(self.state.lock().elements.contains_key(selector)))
	}

	async fn is_interactable(&self, selector: &str) -> Result<bool> {
		Ok(self.state.lock().elements.get(selector).is_some_and(|el| el.visible && !el.disabled))
	}

	async fn text_content(&self, selector: &str) -> Result<Option<String>> {
		Ok(self.state.lock().elements.get(selector).map(|el| el.text.clone()))
	}

	async fn click(&self, selector: &str) -> Result<()> {
		let mut state = self.state.lock();
		if !state.elements.contains_key(selector) {
			return Err(no_match(selector));
		}
		state.actions.push(PageAction::Click(selector.to_string()));
		let effects = state.on_click.get(selector).cloned().unwrap_or_default();
		Self::apply(&mut state, &effects);
		Ok(())
	}

	async fn insert_text(&self, selector: &str, text: &str) -> Result<()> {
		let mut state = self.state.lock();
		let rejects = state.rejects_text.iter().any(|s| s == selector);
		let Some(el) = state.elements.get_mut(selector) else {
			return Err(no_match(selector));
		};
		if !rejects {
			el.text.push_str(text);
		}
		state.actions.push(PageAction::InsertText {
			selector: selector.to_string(),
			text: text.to_string(),
		});
		Ok(())
	}

	async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()> {
		let mut state = self.state.lock();
		if !state.elements.contains_key(selector) {
			return Err(no_match(selector));
		}
		state.actions.push(PageAction::SetFiles {
			selector: selector.to_string(),
			files: files.to_vec(),
		});
		let effects = state.on_files.clone();
		Self::apply(&mut state, &effects);
		Ok(())
	}

	async fn bring_to_front(&self) -> Result<()> {
		self.state.lock().actions.push(PageAction::BringToFront);
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.state.lock().actions.push(PageAction::Close);
		Ok(())
	}
}
