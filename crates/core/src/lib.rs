//! Post to X/Twitter by driving an already logged-in Chrome over the DevTools Protocol.
//!
//! The flow is linear: [`launcher`] makes sure a browser listens on the
//! debugging port, [`session`] attaches to the site's tab, and [`composer`]
//! types and sends the [`TweetDraft`]. Each stage talks to the browser only
//! through the traits in [`driver`], implemented for real by [`chrome`] and
//! [`probe`] and in memory by [`testing`].

pub mod chrome;
pub mod composer;
pub mod config;
pub mod draft;
pub mod driver;
pub mod error;
pub mod launcher;
pub mod post;
pub mod probe;
pub mod session;
pub mod testing;
pub mod wait;

pub use chrome::{ChromeConnector, SystemProcesses};
pub use composer::{Composer, Selectors, compose_and_send};
pub use config::{Config, SiteConfig, Timeouts};
pub use draft::{ComposeMode, ReplyTarget, TweetDraft};
pub use driver::{BrowserConnector, CdpProbe, LaunchSpec, PageDriver, ProcessControl, TabInfo};
pub use error::{Error, ErrorCode, Result};
pub use launcher::{LaunchOutcome, Launcher, ensure_browser};
pub use post::{PostReport, post};
pub use probe::{HttpProbe, is_cdp_available};
pub use session::{Session, open_session};
pub use wait::wait_until;
