
use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use twpost::config::expand_home;
use twpost::{Config, TweetDraft};

use crate::output::OutputFormat;

const HELP_STYLES: Styles = Styles::styled()
	.header(AnsiColor::Yellow.on_default().bold())
	.usage(AnsiColor::Yellow.on_default().bold())
	.literal(AnsiColor::Green.on_default().bold())
	.placeholder(AnsiColor::Cyan.on_default())
	.error(AnsiColor::Red.on_default().bold())
	.invalid(AnsiColor::Red.on_default());

/// Post a tweet (or reply) through a logged-in Chrome.
///
/// Reuses the browser listening on the debugging port, or launches one with
/// the bot profile. Log in once in that browser; later runs reuse the session.
#[derive(Parser, Debug)]
#[command(name = "twpost")]
#[command(version)]
#[command(styles = HELP_STYLES)]
pub struct Cli {
	/// Tweet text, sent verbatim
	#[arg(value_name = "TEXT")]
	pub text: String,

	/// Reply to the post at this URL (https://x.com/<user>/status/<id>)
	#[arg(short, long, value_name = "URL")]
	pub reply: Option<String>,

	/// Attach an image file
	#[arg(short, long, value_name = "FILE")]
	pub image: Option<PathBuf>,

	/// Increase verbosity (-v info, -vv debug; TWPOST_LOG or RUST_LOG override)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Remote debugging port [env: TWPOST_CDP_PORT, default: 9222]
	#[arg(long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
	pub port: Option<u16>,

	/// Browser profile directory [env: TWPOST_PROFILE_DIR, default: ~/.chrome_bot]
	#[arg(long, value_name = "DIR")]
	pub profile_dir: Option<PathBuf>,

	/// Browser executable to launch [env: TWPOST_CHROME, default: discovered]
	#[arg(long, value_name = "PATH")]
	pub chrome: Option<PathBuf>,

	/// Launch the browser headless [env: CHROME_HEADLESS]
	#[arg(long)]
	pub headless: bool,
}

impl Cli {
	/// Flags overlaid on `base` (usually [`Config::from_env`]).
	pub fn apply(&self, mut base: Config) -> Config {
		if let Some(port) = self.port {
			base.port = port;
		}
		if let Some(dir) = &self.profile_dir {
			base.profile_dir = expand_home(&dir.to_string_lossy());
		}
		if let Some(chrome) = &self.chrome {
			base.chrome_path = Some(expand_home(&chrome.to_string_lossy()));
		}
		if self.headless {
			base.headless = true;
		}
		base
	}

	/// Validates text, reply URL and image; fails before any browser work.
	pub fn draft(&self) -> twpost::Result<TweetDraft> {
		let mut draft = TweetDraft::new(self.text.as_str())?;
		if let Some(url) = &self.reply {
			draft = draft.reply_to(url)?;
		}
		if let Some(image) = &self.image {
			draft = draft.with_attachment(image)?;
		}
		Ok(draft)
	}
}
