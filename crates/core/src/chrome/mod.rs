//! Real browser backend: DevTools HTTP for tabs, one WebSocket per attached page.

mod page;
mod process;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use twpost_runtime::{Connection, DevToolsHttp};

pub use page::CdpPage;
pub use process::{SystemProcesses, find_chrome_executable};

use crate::config::Config;
use crate::driver::{BrowserConnector, PageDriver, TabInfo};
use crate::error::Result;

/// [`BrowserConnector`] for a Chrome listening on a loopback debugging port.
#[derive(Debug, Clone)]
pub struct ChromeConnector {
	http_timeout: Duration,
	command_timeout: Duration,
}

impl ChromeConnector {
	pub fn new(config: &Config) -> Self {
		Self {
			http_timeout: config.timeouts.probe.max(Duration::from_secs(2)),
			command_timeout: config.timeouts.command,
		}
	}

	async fn http(&self, port: u16) -> Result<DevToolsHttp> {
		let (http, _) = DevToolsHttp::discover(port, self.http_timeout).await?;
		Ok(http)
	}
}

#[async_trait]
impl BrowserConnector for ChromeConnector {
	async fn tabs(&self, port: u16) -> Result<Vec<TabInfo>> {
		let targets = self.http(port).await?.list().await?;
		Ok(targets.into_iter().filter(|t| t.is_page()).map(TabInfo::from).collect())
	}

	async fn open_tab(&self, port: u16, url: &str) -> Result<TabInfo> {
		let target = self.http(port).await?.new_tab(url).await?;
		Ok(TabInfo::from(target))
	}

	async fn attach(&self, tab: &TabInfo) -> Result<Box<dyn PageDriver>> {
		let ws_url = tab
			.ws_url
			.as_deref()
			.ok_or_else(|| twpost_runtime::Error::Protocol(format!("tab {} is already attached to another client", tab.id)))?;
		let base = http_base(ws_url).ok_or_else(|| twpost_runtime::Error::Protocol(format!("unexpected debugger URL {ws_url}")))?;

		debug!(target = "twpost", tab = %tab.id, ws_url, "attaching");
		let connection = Connection::connect(ws_url, self.command_timeout).await?;
		let http = DevToolsHttp::new(base, self.http_timeout)?;
		Ok(Box::new(CdpPage::new(connection, http, tab.id.clone())))
	}
}

/// `ws://host:port/devtools/...` to `http://host:port`.
fn http_base(ws_url: &str) -> Option<String> {
	let parsed = url::Url::parse(ws_url).ok()?;
	let scheme = match parsed.scheme() {
		"ws" => "http",
		"wss" => "https",
		_ => return None,
	};
	let host = match parsed.host()? {
		url::Host::Ipv6(addr) => format!("[{addr}]"),
		host => host.to_string(),
	};
	Some(match parsed.port() {
		Some(port) => format!("{scheme}://{host}:{port}"),
		None => format!("{scheme}://{host}"),
	})
}
