//! DevTools HTTP discovery endpoints (`/json/version`, `/json/list`, `/json/new`, `/json/close`).

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
	#[serde(rename = "Protocol-Version")]
	pub protocol_version: Option<String>,
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
}

/// One entry of `/json/list` (or the body returned by `/json/new`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	pub id: String,
	#[serde(rename = "type")]
	pub target_type: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
	/// Returns true for regular tabs (not workers, extensions or iframes).
	pub fn is_page(&self) -> bool {
		self.target_type == "page"
	}
}

/// Loopback base URLs tried in order; environments vary on IPv4/IPv6 binding.
pub fn loopback_bases(port: u16) -> [String; 3] {
	[
		format!("http://127.0.0.1:{port}"),
		format!("http://localhost:{port}"),
		format!("http://[::1]:{port}"),
	]
}

/// HTTP client bound to one DevTools server.
#[derive(Debug, Clone)]
pub struct DevToolsHttp {
	client: reqwest::Client,
	base: String,
}

impl DevToolsHttp {
	/// Creates a client for `base` (e.g. `http://127.0.0.1:9222`).
	pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
		let base = base.into();
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|source| Error::Http { url: base.clone(), source })?;
		Ok(Self { client, base })
	}

	/// Finds the loopback address answering on `port` and returns its version info.
	pub async fn discover(port: u16, timeout: Duration) -> Result<(Self, VersionInfo)> {
		let mut last_error = None;

		for base in loopback_bases(port) {
			let http = Self::new(base, timeout)?;
			match http.version().await {
				Ok(info) => return Ok((http, info)),
				Err(e) => {
					debug!(base = http.base(), error = %e, "DevTools endpoint not answering");
					last_error = Some(e);
				}
			}
		}

		Err(last_error.unwrap_or_else(|| Error::Protocol(format!("no loopback address for port {port}"))))
	}

	pub fn base(&self) -> &str {
		&self.base
	}

	/// `GET /json/version`.
	pub async fn version(&self) -> Result<VersionInfo> {
		let url = format!("{}/json/version", self.base);
		self.fetch(self.client.get(&url), &url).await
	}

	/// `GET /json/list`.
	pub async fn list(&self) -> Result<Vec<TargetInfo>> {
		let url = format!("{}/json/list", self.base);
		self.fetch(self.client.get(&url), &url).await
	}

	/// `PUT /json/new?<url>`; newer Chrome rejects GET on this endpoint.
	pub async fn new_tab(&self, target_url: &str) -> Result<TargetInfo> {
		let url = format!("{}/json/new?{}", self.base, target_url);
		self.fetch(self.client.put(&url), &url).await
	}

	/// `GET /json/close/<id>`.
	pub async fn close_tab(&self, id: &str) -> Result<()> {
		let url = format!("{}/json/close/{}", self.base, id);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|source| Error::Http { url: url.clone(), source })?;
		if !response.status().is_success() {
			return Err(Error::Status {
				url,
				status: response.status().as_u16(),
			});
		}
		Ok(())
	}

	async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, url: &str) -> Result<T> {
		let response = request.send().await.map_err(|source| Error::Http {
			url: url.to_string(),
			source,
		})?;

		if !response.status().is_success() {
			return Err(Error::Status {
				url: url.to_string(),
				status: response.status().as_u16(),
			});
		}

		let body = response.bytes().await.map_err(|source| Error::Http {
			url: url.to_string(),
			source,
		})?;
		Ok(serde_json::from_slice(&body)?)
	}
}
