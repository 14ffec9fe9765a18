//! CDP request/response connection over a WebSocket.
//!
//! Commands are JSON objects `{id, method, params}`; the browser answers with
//! `{id, result}` or `{id, error}` and interleaves `{method, params}` events.
//! A reader task correlates responses to pending commands by id. Events are
//! only logged: nothing in this crate subscribes to them.


use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

type Callbacks = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Outgoing command.
#[derive(Debug, Clone, Serialize)]
pub struct Request<'a> {
	pub id: u64,
	pub method: &'a str,
	pub params: Value,
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteError {
	pub code: i64,
	pub message: String,
	#[serde(default)]
	pub data: Option<String>,
}

/// Response to a command.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
	pub id: u64,
	#[serde(default)]
	pub result: Option<Value>,
	#[serde(default)]
	pub error: Option<RemoteError>,
}

/// Unsolicited event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, rename = "sessionId")]
	pub session_id: Option<String>,
}

/// Any message read from the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
	Response(Response),
	Event(Event),
}

/// A live CDP connection to one target (browser or page).
pub struct Connection {
	outgoing: mpsc::UnboundedSender<Message>,
	callbacks: Callbacks,
	last_id: AtomicU64,
	closed: Arc<AtomicBool>,
	timeout: Duration,
	reader: JoinHandle<()>,
	writer: JoinHandle<()>,
}

impl Connection {
	/// Opens a WebSocket to `ws_url` and starts the message loop.
	pub async fn connect(ws_url: &str, timeout: Duration) -> Result<Self> {
		debug!(target = "twpost_runtime", ws_url, "connecting to CDP endpoint");
		let (stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
		Ok(Self::from_stream(stream, timeout))
	}

	/// Wraps an already-established WebSocket stream.
	pub fn from_stream<S>(stream: WebSocketStream<S>, timeout: Duration) -> Self
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (mut sink, mut source) = stream.split();
		let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
		let callbacks: Callbacks = Arc::new(Mutex::new(HashMap::new()));
		let closed = Arc::new(AtomicBool::new(false));

		let writer_closed = closed.clone();
		let writer = tokio::spawn(async move {
			while let Some(message) = outgoing_rx.recv().await {
				if let Err(e) = sink.send(message).await {
					warn!(target = "twpost_runtime", error = %e, "CDP write failed");
					break;
				}
			}
			writer_closed.store(true, Ordering::SeqCst);
			let _ = sink.close().await;
		});

		let reader_callbacks = callbacks.clone();
		let reader_closed = closed.clone();
		let reader = tokio::spawn(async move {
			while let Some(frame) = source.next().await {
				match frame {
					Ok(Message::Text(text)) => match serde_json::from_str::<Incoming>(&text) {
						Ok(message) => dispatch(&reader_callbacks, message),
						Err(e) => warn!(target = "twpost_runtime", error = %e, "unparseable CDP message"),
					},
					Ok(Message::Close(_)) => {
						debug!(target = "twpost_runtime", "CDP socket closed by peer");
						break;
					}
					Ok(_) => {}
					Err(e) => {
						warn!(target = "twpost_runtime", error = %e, "CDP read failed");
						break;
					}
				}
			}
			reader_closed.store(true, Ordering::SeqCst);
			fail_pending(&reader_callbacks);
		});

		Self {
			outgoing,
			callbacks,
			last_id: AtomicU64::new(1),
			closed,
			timeout,
			reader,
			writer,
		}
	}

	/// Sends `method` with `params` and waits for its result.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let text = serde_json::to_string(&Request { id, method, params })?;
		trace!(target = "twpost_runtime", id, method, "-> {}", text);

		let rx = self.register(id)?;

		if self.outgoing.send(Message::Text(text)).is_err() {
			self.forget(id);
			return Err(Error::ChannelClosed);
		}

		let outcome = tokio::time::timeout(self.timeout, rx).await;

		match outcome {
			Ok(Ok(result)) => result.map_err(|e| match e {
				Error::Remote { code, message, .. } => Error::Remote {
					method: method.to_string(),
					code,
					message,
				},
				other => other,
			}),
			Ok(Err(_)) => Err(Error::ChannelClosed),
			Err(_) => {
				self.forget(id);
				Err(Error::Timeout {
					method: method.to_string(),
					ms: self.timeout.as_millis() as u64,
				})
			}
		}
	}

	/// Returns true once either side of the socket has shut down.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Adds a pending callback for `id`. The reader drains callbacks only after
	/// marking the connection closed, so a callback added after the drain is
	/// caught by the second check instead of waiting out the timeout.
	fn register(&self, id: u64) -> Result<oneshot::Receiver<Result<Value>>> {
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(id, tx);
		if self.closed.load(Ordering::SeqCst) {
			self.forget(id);
			return Err(Error::ChannelClosed);
		}
		Ok(rx)
	}

	fn forget(&self, id: u64) {
		self.callbacks.lock().remove(&id);
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.reader.abort();
		self.writer.abort();
	}
}

/// Routes one incoming message to its waiting command, if any.
fn dispatch(callbacks: &Callbacks, message: Incoming) {
	match message {
		Incoming::Response(response) => {
			let Some(tx) = callbacks.lock().remove(&response.id) else {
				debug!(target = "twpost_runtime", id = response.id, "response for unknown id");
				return;
			};
			let result = match response.error {
				Some(err) => Err(Error::Remote {
					method: String::new(),
					code: err.code,
					message: match err.data {
						Some(data) => format!("{} ({})", err.message, data),
						None => err.message,
					},
				}),
				None => Ok(response.result.unwrap_or(Value::Null)),
			};
			let _ = tx.send(result);
		}
		Incoming::Event(event) => {
			trace!(target = "twpost_runtime", method = %event.method, "event");
		}
	}
}

fn fail_pending(callbacks: &Callbacks) {
	for (_, tx) in callbacks.lock().drain() {
		let _ = tx.send(Err(Error::ChannelClosed));
	}
}
