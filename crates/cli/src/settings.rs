//! Turns parsed arguments into [`pilot::Settings`].

use std::path::Path;
use std::time::Duration;

use pilot::{Credentials, Deployment, InstallCommand, Settings};
use tracing::warn;

use crate::cli::Cli;

/// Builds the process configuration, resolving local paths against `cwd`
/// unless `--workdir` overrides it.
pub fn build_settings(cli: &Cli, cwd: &Path) -> Settings {
	let deployment = if cli.hosted { Deployment::Hosted } else { Deployment::Local };
	let root = cli.workdir.as_deref().unwrap_or(cwd);

	let mut settings = Settings::for_deployment(deployment, root);
	settings.liveness_port = cli.port;
	settings.headless = cli.headless;
	settings.halt_on_auth_failure = cli.halt_on_auth_failure;
	settings.inbox.inbox_url = cli.inbox_url.clone();
	settings.inbox.login_url = cli.login_url.clone();
	settings.inbox.poll_interval = Duration::from_secs(cli.poll_interval);
	settings.credentials = credentials(cli);

	if let Some(command) = cli.install_command.as_deref() {
		match parse_install_command(command) {
			Some(install) => settings.install = install,
			None => warn!(target = "pilot", "empty install command ignored, keeping the default"),
		}
	}

	settings
}

/// Scripted login needs all three values; a partial set is reported and dropped.
fn credentials(cli: &Cli) -> Option<Credentials> {
	match (&cli.email, &cli.password, &cli.tenant_id) {
		(Some(email), Some(password), Some(tenant_id)) => Some(Credentials {
			email: email.clone(),
			password: password.clone(),
			tenant_id: tenant_id.clone(),
		}),
		(None, None, None) => None,
		_ => {
			warn!(target = "pilot", "incomplete login credentials: email, password and tenant id are all required");
			None
		}
	}
}

fn parse_install_command(command: &str) -> Option<InstallCommand> {
	let mut words = command.split_whitespace().map(str::to_string);
	let program = words.next()?;
	Some(InstallCommand {
		program,
		args: words.collect(),
	})
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use clap::Parser;

	use super::*;

	fn parse(args: &[&str]) -> Cli {
		let mut argv = vec!["inbox-pilot"];
		argv.extend_from_slice(args);
		Cli::try_parse_from(argv).unwrap()
	}

	#[test]
	fn hosted_flag_selects_platform_paths() {
		let settings = build_settings(&parse(&["--hosted"]), Path::new("/srv/app"));

		assert_eq!(settings.deployment, Deployment::Hosted);
		assert_eq!(settings.paths.profile_dir, PathBuf::from("/opt/render/project/src/wati_profile"));
		assert_eq!(settings.paths.archive_path, PathBuf::from("/srv/app/wati_profile.zip"));
	}

	#[test]
	fn workdir_overrides_cwd() {
		let settings = build_settings(&parse(&["--workdir", "/data/bot"]), Path::new("/srv/app"));

		assert_eq!(settings.paths.profile_dir, PathBuf::from("/data/bot/wati_profile"));
		assert_eq!(settings.paths.browsers_dir, PathBuf::from("/data/bot/playwright_browsers"));
	}

	#[test]
	fn complete_credentials_are_kept() {
		let settings = build_settings(
			&parse(&["--email", "a@b.c", "--password", "pw", "--tenant-id", "7"]),
			Path::new("/srv/app"),
		);

		let credentials = settings.credentials.unwrap();
		assert_eq!(credentials.form_fields(), [("email", "a@b.c"), ("password", "pw"), ("tenantId", "7")]);
	}

	#[test]
	fn partial_credentials_are_dropped() {
		let settings = build_settings(&parse(&["--email", "a@b.c", "--password", "pw", "--tenant-id", "7"]), Path::new("/"));
		assert!(settings.credentials.is_some());

		let cli = Cli {
			tenant_id: None,
			..parse(&["--email", "a@b.c", "--password", "pw"])
		};
		assert!(build_settings(&cli, Path::new("/")).credentials.is_none());
	}

	#[test]
	fn poll_interval_and_port_are_applied() {
		let settings = build_settings(&parse(&["--poll-interval", "5", "--port", "9000"]), Path::new("/"));

		assert_eq!(settings.inbox.poll_interval, Duration::from_secs(5));
		assert_eq!(settings.liveness_port, 9000);
	}

	#[test]
	fn install_command_is_split_on_whitespace() {
		let settings = build_settings(&parse(&["--install-command", "playwright install  chromium"]), Path::new("/"));

		assert_eq!(settings.install.program, "playwright");
		assert_eq!(settings.install.args, vec!["install", "chromium"]);
	}

	#[test]
	fn blank_install_command_keeps_default() {
		let settings = build_settings(&parse(&["--install-command", "   "]), Path::new("/"));
		assert_eq!(settings.install, InstallCommand::default());
	}
}
