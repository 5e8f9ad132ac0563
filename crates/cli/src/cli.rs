use std::path::PathBuf;

use clap::Parser;
use pilot::settings::{DEFAULT_INBOX_URL, DEFAULT_LIVENESS_PORT, DEFAULT_LOGIN_URL};

/// Unattended WATI team-inbox bot.
///
/// Every option can also come from the environment, which is how the hosted
/// deployment is configured.
#[derive(Parser, Debug)]
#[command(name = "inbox-pilot")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Run as the hosted deployment (platform paths, profile archive restore)
	#[arg(
		long,
		env = "RENDER",
		action = clap::ArgAction::Set,
		num_args = 0..=1,
		default_value = "false",
		default_missing_value = "true",
		value_parser = parse_render
	)]
	pub hosted: bool,

	/// Port of the liveness endpoint
	#[arg(long, env = "PORT", default_value_t = DEFAULT_LIVENESS_PORT)]
	pub port: u16,

	/// Login email for the scripted login
	#[arg(long, env = "WATI_EMAIL", value_name = "EMAIL")]
	pub email: Option<String>,

	/// Login password for the scripted login
	#[arg(long, env = "WATI_PASSWORD", value_name = "PASSWORD", hide_env_values = true)]
	pub password: Option<String>,

	/// Tenant id for the scripted login
	#[arg(long, env = "WATI_TENANT_ID", value_name = "ID")]
	pub tenant_id: Option<String>,

	/// Team inbox address
	#[arg(long, env = "WATI_INBOX_URL", default_value = DEFAULT_INBOX_URL, value_parser = parse_url)]
	pub inbox_url: String,

	/// Login page opened for manual login
	#[arg(long, env = "WATI_LOGIN_URL", default_value = DEFAULT_LOGIN_URL, value_parser = parse_url)]
	pub login_url: String,

	/// Run the browser without a window
	#[arg(long, env = "INBOX_PILOT_HEADLESS")]
	pub headless: bool,

	/// Exit instead of polling when no login could be established
	#[arg(long, env = "INBOX_PILOT_HALT_ON_AUTH_FAILURE")]
	pub halt_on_auth_failure: bool,

	/// Seconds to wait between polling cycles
	#[arg(long, env = "INBOX_PILOT_POLL_INTERVAL", value_name = "SECONDS", default_value_t = 180)]
	pub poll_interval: u64,

	/// Directory local paths are resolved against (defaults to the current directory)
	#[arg(long, env = "INBOX_PILOT_WORKDIR", value_name = "DIR")]
	pub workdir: Option<PathBuf>,

	/// Command that installs Chromium when it is missing
	#[arg(long, env = "INBOX_PILOT_INSTALL_COMMAND", value_name = "COMMAND")]
	pub install_command: Option<String>,
}

/// The hosting platform exports `RENDER=true`; any other value means local.
pub(crate) fn parse_render(value: &str) -> Result<bool, String> {
	Ok(value == "true")
}

fn parse_url(value: &str) -> Result<String, String> {
	url::Url::parse(value).map(|_| value.to_string()).map_err(|e| format!("invalid URL {value:?}: {e}"))
}
