use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// A bounded wait elapsed. This is the only failure signal the UI gives us:
	/// a missing element, a slow network and an empty inbox all look the same.
	#[error("timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	#[error("element not found: {selector}")]
	ElementNotFound { selector: String },

	#[error("navigation failed: {url}")]
	Navigation {
		url: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	#[error("browser error: {0}")]
	Browser(String),

	#[error("javascript evaluation failed: {0}")]
	JsEval(String),

	#[error("an authentication attempt is already in flight")]
	AuthInFlight,

	#[error("all authentication strategies exhausted")]
	AuthenticationFailed,

	#[error("archive error: {0}")]
	Archive(#[from] zip::result::ZipError),

	#[error("archive entry escapes destination: {}", .0.display())]
	UnsafeArchiveEntry(PathBuf),

	#[error("operation cancelled")]
	Cancelled,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn timeout(timeout: std::time::Duration, condition: impl Into<String>) -> Self {
		Error::Timeout {
			ms: timeout.as_millis() as u64,
			condition: condition.into(),
		}
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}
}
