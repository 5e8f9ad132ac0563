use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter used when `RUST_LOG` is unset.
///
/// The bot is meant to be watched, so the default already shows progress.
pub fn default_filter(verbosity: u8) -> &'static str {
	// 0 = progress messages only, browser driver kept quiet
	// 1 (-v) = debug for our crates
	// 2+ (-vv) = trace for everything, including CDP traffic
	match verbosity {
		0 => "info,chromiumoxide=off",
		1 => "info,pilot=debug,inbox_pilot=debug,chromiumoxide=warn",
		_ => "trace",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
