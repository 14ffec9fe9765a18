//! [`PageDriver`] over a page-level CDP connection.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, trace};
use twpost_runtime::{Connection, DevToolsHttp};

use crate::driver::PageDriver;
use crate::error::{Error, Result};

/// Page attached over its own WebSocket.
pub struct CdpPage {
	connection: Connection,
	http: DevToolsHttp,
	target_id: String,
}

impl CdpPage {
	pub fn new(connection: Connection, http: DevToolsHttp, target_id: String) -> Self {
		Self {
			connection,
			http,
			target_id,
		}
	}

	/// `Runtime.evaluate` returning the value by JSON; page exceptions become [`Error::Script`].
	async fn evaluate(&self, expression: &str) -> Result<Value> {
		trace!(target = "twpost", expression, "evaluate");
		let response = self
			.connection
			.send(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
				}),
			)
			.await?;

		if let Some(details) = response.get("exceptionDetails") {
			let message = details
				.pointer("/exception/description")
				.or_else(|| details.get("text"))
				.and_then(Value::as_str)
				.unwrap_or("uncaught exception");
			return Err(Error::Script(message.to_string()));
		}
		Ok(response.pointer("/result/value").cloned().unwrap_or(Value::Null))
	}

	/// Evaluates `body` with `el` bound to the first match of `selector` (or null).
	async fn with_element(&self, selector: &str, body: &str) -> Result<Value> {
		self.evaluate(&element_script(selector, body)).await
	}

	/// Scrolls the element into view and returns its center in viewport coordinates.
	async fn center(&self, selector: &str) -> Result<(f64, f64)> {
		let point = self
			.with_element(
				selector,
				"if (!el) return null;\
				 el.scrollIntoView({block: 'center', inline: 'center'});\
				 const r = el.getBoundingClientRect();\
				 return {x: r.left + r.width / 2, y: r.top + r.height / 2};",
			)
			.await?;
		match (point.get("x").and_then(Value::as_f64), point.get("y").and_then(Value::as_f64)) {
			(Some(x), Some(y)) => Ok((x, y)),
			_ => Err(Error::Script(format!("no element matches {selector}"))),
		}
	}

	async fn mouse(&self, kind: &str, x: f64, y: f64) -> Result<()> {
		self.connection
			.send(
				"Input.dispatchMouseEvent",
				json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 }),
			)
			.await?;
		Ok(())
	}
}

/// Wraps `body` in an IIFE with `el` bound; the selector is embedded as a JSON string literal.
fn element_script(selector: &str, body: &str) -> String {
	format!("(() => {{ const el = document.querySelector({}); {body} }})()", Value::from(selector))
}

#[async_trait]
impl PageDriver for CdpPage {
	async fn url(&self) -> Result<String> {
		Ok(self.evaluate("location.href").await?.as_str().unwrap_or_default().to_string())
	}

	async fn goto(&self, url: &str) -> Result<()> {
		let response = self.connection.send("Page.navigate", json!({ "url": url })).await?;
		match response.get("errorText").and_then(Value::as_str) {
			Some(text) if !text.is_empty() => Err(Error::Navigation {
				url: url.to_string(),
				message: text.to_string(),
			}),
			_ => Ok(()),
		}
	}

	async fn ready_state(&self) -> Result<String> {
		Ok(self.evaluate("document.readyState").await?.as_str().unwrap_or_default().to_string())
	}

	async fn count(&self, selector: &str) -> Result<usize> {
		let script = format!("document.querySelectorAll({}).length", Value::from(selector));
		let count = self.evaluate(&script).await?.as_u64().unwrap_or(0);
		Ok(usize::try_from(count).unwrap_or(usize::MAX))
	}

	async fn is_interactable(&self, selector: &str) -> Result<bool> {
		let value = self
			.with_element(
				selector,
				"if (!el) return false;\
				 const r = el.getBoundingClientRect();\
				 const style = getComputedStyle(el);\
				 if (r.width === 0 || r.height === 0 || style.visibility === 'hidden' || style.display === 'none') return false;\
				 return !el.disabled && el.getAttribute('aria-disabled') !== 'true';",
			)
			.await?;
		Ok(value.as_bool().unwrap_or(false))
	}

	async fn text_content(&self, selector: &str) -> Result<Option<String>> {
		let value = self.with_element(selector, "return el ? el.textContent : null;").await?;
		Ok(value.as_str().map(str::to_string))
	}

	async fn click(&self, selector: &str) -> Result<()> {
		let (x, y) = self.center(selector).await?;
		debug!(target = "twpost", selector, x, y, "click");
		self.mouse("mouseMoved", x, y).await?;
		self.mouse("mousePressed", x, y).await?;
		self.mouse("mouseReleased", x, y).await
	}

	async fn insert_text(&self, selector: &str, text: &str) -> Result<()> {
		let focused = self.with_element(selector, "if (!el) return false; el.focus(); return true;").await?;
		if focused.as_bool() != Some(true) {
			return Err(Error::Script(format!("no element matches {selector}")));
		}
		self.connection.send("Input.insertText", json!({ "text": text })).await?;
		Ok(())
	}

	async fn set_input_files(&self, selector: &str, files: &[PathBuf]) -> Result<()> {
		let document = self.connection.send("DOM.getDocument", json!({ "depth": 0 })).await?;
		let root = document
			.pointer("/root/nodeId")
			.and_then(Value::as_i64)
			.ok_or_else(|| twpost_runtime::Error::Protocol("DOM.getDocument returned no root node".into()))?;

		let found = self
			.connection
			.send("DOM.querySelector", json!({ "nodeId": root, "selector": selector }))
			.await?;
		let node_id = found.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
		if node_id == 0 {
			return Err(Error::Script(format!("no element matches {selector}")));
		}

		let files: Vec<String> = files.iter().map(|p| p.to_string_lossy().into_owned()).collect();
		self.connection
			.send("DOM.setFileInputFiles", json!({ "nodeId": node_id, "files": files }))
			.await?;
		Ok(())
	}

	async fn bring_to_front(&self) -> Result<()> {
		self.connection.send("Page.bringToFront", json!({})).await?;
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.http.close_tab(&self.target_id).await?;
		Ok(())
	}
}
