use clap::Parser;
use twpost_cli::cli::Cli;
use twpost_cli::{logging, output, run};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	match run::run(&cli).await {
		Ok(report) => output::print_success(&report, format),
		Err(err) => {
			output::print_failure(&err, format);
			std::process::exit(err.exit_code());
		}
	}
}
