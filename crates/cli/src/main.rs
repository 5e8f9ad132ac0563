use clap::Parser;
use inbox_pilot::{app, cli::Cli, logging, settings};

fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let cwd = match std::env::current_dir() {
		Ok(cwd) => cwd,
		Err(err) => {
			eprintln!("Error: cannot determine working directory: {err}");
			std::process::exit(1);
		}
	};

	let result = match app::block_on(app::run(settings::build_settings(&cli, &cwd)), app::SHUTDOWN_GRACE) {
		Ok(result) => result,
		Err(err) => {
			eprintln!("Error: failed to start async runtime: {err}");
			std::process::exit(1);
		}
	};

	if let Err(err) = result {
		tracing::error!(target = "pilot", "{err:#}");
		eprintln!("Error: {err:#}");
		std::process::exit(1);
	}
}
