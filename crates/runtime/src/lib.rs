//! Thin Chrome DevTools Protocol runtime.
//!
//! Two pieces: [`DevToolsHttp`] for the discovery endpoints a debugging port
//! serves over plain HTTP, and [`Connection`] for JSON commands over a target's
//! WebSocket.

pub mod connection;
pub mod error;
pub mod http;

pub use connection::Connection;
pub use error::{Error, Result};
pub use http::{DevToolsHttp, TargetInfo, VersionInfo};
