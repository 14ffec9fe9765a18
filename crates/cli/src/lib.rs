//! `twpost` command-line front end.

pub mod cli;
pub mod logging;
pub mod output;
pub mod run;
