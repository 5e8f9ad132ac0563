//! Cookie and storage state types for session persistence.
//!
//! A [`StorageState`] is the explicit snapshot of an authenticated browser
//! context. The persistent profile directory already carries this data in the
//! browser's own format; the snapshot is written next to it after a
//! human-assisted login so the session can be inspected or re-seeded.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
	#[serde(rename = "None")]
	None,
	#[default]
	#[serde(rename = "Lax")]
	Lax,
	#[serde(rename = "Strict")]
	Strict,
}

/// A browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
	pub name: String,
	pub value: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	/// Unix timestamp in seconds (-1 means session cookie)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub http_only: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub secure: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl Cookie {
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: Some(domain.into()),
			path: Some("/".to_string()),
			expires: None,
			http_only: None,
			secure: None,
			same_site: None,
		}
	}
}

/// A localStorage entry within an origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageEntry {
	pub name: String,
	pub value: String,
}

/// Storage state for a single origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
	pub origin: String,
	pub local_storage: Vec<LocalStorageEntry>,
}

/// Complete browser storage state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
	pub cookies: Vec<Cookie>,
	pub origins: Vec<OriginState>,
}

impl StorageState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads storage state from a JSON file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let content = std::fs::read_to_string(path)?;
		Ok(serde_json::from_str(&content)?)
	}

	/// Saves storage state to a JSON file, creating the parent directory if needed.
	pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)?;
			}
		}
		std::fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}
}
