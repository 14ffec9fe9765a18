//! Bounded polling.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;

/// Polls `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns `Ok(true)` when the condition held, `Ok(false)` on timeout. The
/// condition is evaluated at least once. Transient errors (see
/// [`crate::Error::is_transient`]) count as "not yet"; any other error ends
/// the wait immediately.
pub async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> Result<bool>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<bool>>,
{
	let deadline = Instant::now() + timeout;

	loop {
		match condition().await {
			Ok(true) => return Ok(true),
			Ok(false) => {}
			Err(e) if e.is_transient() => debug!(target = "twpost", error = %e, "poll failed, retrying"),
			Err(e) => return Err(e),
		}

		let now = Instant::now();
		if now >= deadline {
			return Ok(false);
		}
		tokio::time::sleep(interval.min(deadline - now)).await;
	}
}
