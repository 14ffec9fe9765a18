//! Is a DevTools endpoint listening on the port?

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use twpost_runtime::DevToolsHttp;

use crate::driver::{CdpProbe, VersionInfo};

/// Returns true only if `/json/version` on `port` yields a parseable body with
/// a `webSocketDebuggerUrl`. Never fails.
pub async fn is_cdp_available(probe: &dyn CdpProbe, port: u16) -> bool {
	probe.version(port).await.is_some()
}

/// Probes over HTTP, trying `127.0.0.1`, `localhost` then `[::1]`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
	timeout: Duration,
}

impl HttpProbe {
	pub fn new(timeout: Duration) -> Self {
		Self { timeout }
	}
}

#[async_trait]
impl CdpProbe for HttpProbe {
	async fn version(&self, port: u16) -> Option<VersionInfo> {
		match DevToolsHttp::discover(port, self.timeout).await {
			Ok((http, info)) => {
				debug!(target = "twpost", base = http.base(), browser = ?info.browser, "DevTools endpoint found");
				Some(info)
			}
			Err(e) => {
				debug!(target = "twpost", port, error = %e, "no DevTools endpoint");
				None
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	use super::*;

	/// Serves `body` as JSON to every connection until the test ends.
	async fn serve_json(body: &'static str) -> u16 {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let port = listener.local_addr().unwrap().port();
		tokio::spawn(async move {
			while let Ok((mut socket, _)) = listener.accept().await {
				let mut buf = [0u8; 1024];
				let _ = socket.read(&mut buf).await;
				let response = format!(
					"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
					body.len(),
					body
				);
				let _ = socket.write_all(response.as_bytes()).await;
				let _ = socket.shutdown().await;
			}
		});
		port
	}

	async fn closed_port() -> u16 {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		listener.local_addr().unwrap().port()
	}

	#[tokio::test]
	async fn endpoint_with_debugger_url_is_available() {
		let port = serve_json(r#"{"Browser":"Chrome/126.0","webSocketDebuggerUrl":"ws://127.0.0.1/devtools/browser/abc"}"#).await;
		let probe = HttpProbe::new(Duration::from_millis(500));

		let info = probe.version(port).await.expect("endpoint should answer");
		assert_eq!(info.browser.as_deref(), Some("Chrome/126.0"));
		assert!(is_cdp_available(&probe, port).await);
	}

	#[tokio::test]
	async fn body_without_debugger_url_is_not_available() {
		let port = serve_json(r#"{"Browser":"Chrome/126.0"}"#).await;
		let probe = HttpProbe::new(Duration::from_millis(500));
		assert!(!is_cdp_available(&probe, port).await);
	}

	#[tokio::test]
	async fn closed_port_is_not_available() {
		let port = closed_port().await;
		let probe = HttpProbe::new(Duration::from_millis(200));
		assert!(!is_cdp_available(&probe, port).await);
	}
}
