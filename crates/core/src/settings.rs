//! Process-wide configuration.
//!
//! Built once at process entry and passed by reference into every component;
//! nothing below this module reads the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::locator::Locator;

pub const DEFAULT_INBOX_URL: &str = "https://live.wati.io/1037246/teamInbox/";
pub const DEFAULT_LOGIN_URL: &str = "https://auth.wati.io/login";
pub const DEFAULT_LIVENESS_PORT: u16 = 10000;

const PROFILE_DIR_NAME: &str = "wati_profile";
const ARCHIVE_NAME: &str = "wati_profile.zip";
const HOSTED_PROFILE_DIR: &str = "/opt/render/project/src/wati_profile";
const HOSTED_BROWSERS_DIR: &str = "/tmp/playwright-browsers";
const LOCAL_BROWSERS_DIR: &str = "playwright_browsers";
const CHROMIUM_REVISION_PATH: &str = "chromium-1117/chrome-linux/chrome";

/// Where the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
	/// Developer machine: archives the profile after login for later upload.
	#[default]
	Local,
	/// Hosting platform: restores the profile from the archive at startup.
	Hosted,
}

impl Deployment {
	pub fn is_hosted(self) -> bool {
		self == Deployment::Hosted
	}
}

impl fmt::Display for Deployment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Deployment::Local => f.write_str("local"),
			Deployment::Hosted => f.write_str("hosted"),
		}
	}
}

/// Filesystem locations derived from the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
	/// Browser runtime install root (`PLAYWRIGHT_BROWSERS_PATH`).
	pub browsers_dir: PathBuf,
	/// Persistent browser profile (the Session Store).
	pub profile_dir: PathBuf,
	/// Portable archive of the profile directory.
	pub archive_path: PathBuf,
}

impl Paths {
	pub fn for_deployment(deployment: Deployment, cwd: &Path) -> Self {
		let (browsers_dir, profile_dir) = match deployment {
			Deployment::Hosted => (PathBuf::from(HOSTED_BROWSERS_DIR), PathBuf::from(HOSTED_PROFILE_DIR)),
			Deployment::Local => (cwd.join(LOCAL_BROWSERS_DIR), cwd.join(PROFILE_DIR_NAME)),
		};

		Self {
			browsers_dir,
			profile_dir,
			archive_path: cwd.join(ARCHIVE_NAME),
		}
	}

	/// Expected browser executable inside [`browsers_dir`](Self::browsers_dir).
	pub fn chromium_executable(&self) -> PathBuf {
		self.browsers_dir.join(CHROMIUM_REVISION_PATH)
	}
}

/// Credentials for the scripted login strategy.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	pub email: String,
	pub password: String,
	pub tenant_id: String,
}

impl Credentials {
	/// Field name/value pairs in the order they are filled into the login form.
	pub fn form_fields(&self) -> [(&'static str, &str); 3] {
		[
			("email", self.email.as_str()),
			("password", self.password.as_str()),
			("tenantId", self.tenant_id.as_str()),
		]
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("tenant_id", &self.tenant_id)
			.finish()
	}
}

/// URLs, element locators and timing of the inbox automation.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxSettings {
	pub inbox_url: String,
	pub login_url: String,

	/// Proves the inbox view loaded and the session is authenticated.
	pub inbox_marker: Locator,
	pub unread_indicator: Locator,
	pub action_control: Locator,
	pub follow_up_control: Locator,
	pub submit_button: Locator,

	pub navigation_timeout: Duration,
	/// Pause after the first navigation before looking for the marker.
	pub initial_settle: Duration,
	pub existing_session_timeout: Duration,
	pub login_timeout: Duration,
	pub unread_timeout: Duration,
	pub action_timeout: Duration,

	/// Idle backoff between poll cycles.
	pub poll_interval: Duration,
	/// Delay for the conversation pane to render after opening an item.
	pub item_settle: Duration,
	/// Delay between items.
	pub item_gap: Duration,
}

impl Default for InboxSettings {
	fn default() -> Self {
		Self {
			inbox_url: DEFAULT_INBOX_URL.to_string(),
			login_url: DEFAULT_LOGIN_URL.to_string(),
			inbox_marker: Locator::text("Team Inbox"),
			unread_indicator: Locator::css("div.conversation-item__unread-count"),
			action_control: Locator::css("#mainTeamInbox div.chat-side-content div span.chat-input__icon-option"),
			follow_up_control: Locator::css("#flow-nav-68ff67df4f393f0757f108d8"),
			submit_button: Locator::css(r#"form button[type="submit"]"#),
			navigation_timeout: Duration::from_secs(60),
			initial_settle: Duration::from_secs(3),
			existing_session_timeout: Duration::from_secs(60),
			login_timeout: Duration::from_secs(30),
			unread_timeout: Duration::from_secs(10),
			action_timeout: Duration::from_secs(10),
			poll_interval: Duration::from_secs(180),
			item_settle: Duration::from_millis(2500),
			item_gap: Duration::from_secs(2),
		}
	}
}

/// External command that installs the browser runtime when it is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
	pub program: String,
	pub args: Vec<String>,
}

impl Default for InstallCommand {
	fn default() -> Self {
		Self {
			program: "npx".to_string(),
			args: vec!["playwright".into(), "install".into(), "chromium".into()],
		}
	}
}

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
	pub deployment: Deployment,
	pub paths: Paths,
	pub inbox: InboxSettings,
	pub credentials: Option<Credentials>,
	pub install: InstallCommand,
	pub headless: bool,
	/// Stop instead of polling when every authentication strategy failed.
	pub halt_on_auth_failure: bool,
	pub liveness_port: u16,
}

impl Settings {
	pub fn for_deployment(deployment: Deployment, cwd: &Path) -> Self {
		Self {
			deployment,
			paths: Paths::for_deployment(deployment, cwd),
			inbox: InboxSettings::default(),
			credentials: None,
			install: InstallCommand::default(),
			headless: false,
			halt_on_auth_failure: false,
			liveness_port: DEFAULT_LIVENESS_PORT,
		}
	}
}
