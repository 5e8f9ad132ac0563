//! On-disk Session Store and its portable archive form.
//!
//! The store is the persistent browser profile directory. It can be packaged
//! into a single zip so a session captured on a developer machine can be
//! shipped to the hosting platform, where it is unpacked once at startup.
//!
//! Archive layout: every entry is prefixed with the profile directory's name
//! (`wati_profile/Default/Cookies`, ...). Extraction strips that first
//! component and writes into the configured profile directory, so the names of
//! the two profile directories don't have to agree.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::settings::{Deployment, Paths};
use crate::storage_state::StorageState;

/// Path fragments of profile files that are bound to one machine or one
/// running browser and must not travel inside the archive.
pub const TRANSIENT_MARKERS: &[&str] = &["Singleton", "RunningChromeVersion"];

const STORAGE_STATE_FILE: &str = "storage.json";

/// Result of [`SessionStore::bootstrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
	/// Archive was unpacked into the empty store location.
	Restored { files: usize },
	/// A live store already exists; the archive was not touched.
	StoreExists,
	/// Hosted deployment without an archive to restore from.
	NoArchive,
	/// Local deployments never restore.
	NotHosted,
}

/// Result of [`SessionStore::pack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveReport {
	pub files: usize,
	pub skipped: usize,
}

/// Persisted browser profile plus the location of its archive.
#[derive(Debug, Clone)]
pub struct SessionStore {
	profile_dir: PathBuf,
	archive_path: PathBuf,
}

impl SessionStore {
	pub fn new(profile_dir: impl Into<PathBuf>, archive_path: impl Into<PathBuf>) -> Self {
		Self {
			profile_dir: profile_dir.into(),
			archive_path: archive_path.into(),
		}
	}

	pub fn from_paths(paths: &Paths) -> Self {
		Self::new(&paths.profile_dir, &paths.archive_path)
	}

	pub fn profile_dir(&self) -> &Path {
		&self.profile_dir
	}

	pub fn archive_path(&self) -> &Path {
		&self.archive_path
	}

	pub fn exists(&self) -> bool {
		self.profile_dir.is_dir()
	}

	/// A missing or empty profile directory means "not authenticated".
	pub fn is_populated(&self) -> bool {
		fs::read_dir(&self.profile_dir)
			.map(|mut entries| entries.next().is_some())
			.unwrap_or(false)
	}

	pub fn storage_state_path(&self) -> PathBuf {
		self.profile_dir.join(STORAGE_STATE_FILE)
	}

	/// Writes an explicit storage-state snapshot into the store.
	pub fn persist_state(&self, state: &StorageState) -> Result<PathBuf> {
		let path = self.storage_state_path();
		state.to_file(&path)?;
		debug!(target = "pilot", path = %path.display(), cookies = state.cookies.len(), "storage state written");
		Ok(path)
	}

	/// Reads the snapshot written by [`persist_state`](Self::persist_state), if any.
	pub fn load_state(&self) -> Result<Option<StorageState>> {
		let path = self.storage_state_path();
		if !path.is_file() {
			return Ok(None);
		}
		StorageState::from_file(&path).map(Some)
	}

	/// Runs [`restore`](Self::restore) on hosted deployments only.
	pub fn bootstrap(&self, deployment: Deployment) -> Result<RestoreOutcome> {
		if !deployment.is_hosted() {
			info!(target = "pilot", "ℹ️ Running locally, unzip not required.");
			return Ok(RestoreOutcome::NotHosted);
		}
		self.restore()
	}

	/// Unpacks the archive into the profile directory unless a populated store
	/// already exists.
	///
	/// Extraction goes to a sibling staging directory that is renamed into
	/// place only once every entry is written, so a failed restore leaves no
	/// half-filled store behind.
	pub fn restore(&self) -> Result<RestoreOutcome> {
		if self.is_populated() {
			info!(target = "pilot", path = %self.profile_dir.display(), "✅ Existing login folder detected, skipping unzip.");
			return Ok(RestoreOutcome::StoreExists);
		}
		if !self.archive_path.is_file() {
			info!(target = "pilot", archive = %self.archive_path.display(), "ℹ️ No saved login archive found.");
			return Ok(RestoreOutcome::NoArchive);
		}

		info!(target = "pilot", archive = %self.archive_path.display(), "📦 Extracting saved login...");
		let staging = self.staging_dir();
		if staging.exists() {
			fs::remove_dir_all(&staging)?;
		}
		let files = match self.extract_staged(&staging) {
			Ok(files) => files,
			Err(err) => {
				let _ = fs::remove_dir_all(&staging);
				return Err(err);
			}
		};
		info!(target = "pilot", files, "✅ Login data extracted successfully!");
		Ok(RestoreOutcome::Restored { files })
	}

	fn staging_dir(&self) -> PathBuf {
		self.profile_dir.with_extension("restoring")
	}

	fn extract_staged(&self, staging: &Path) -> Result<usize> {
		let files = extract_archive(&self.archive_path, staging)?;
		// Only an empty directory can be in the way here.
		if self.exists() {
			fs::remove_dir(&self.profile_dir)?;
		}
		fs::rename(staging, &self.profile_dir)?;
		Ok(files)
	}

	/// Packages the profile directory into the archive, skipping transient files.
	///
	/// The archive is written to a sibling temp file and renamed into place, so
	/// an interrupted run never leaves a truncated archive behind.
	pub fn pack(&self) -> Result<ArchiveReport> {
		if !self.exists() {
			return Err(Error::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("profile directory missing: {}", self.profile_dir.display()),
			)));
		}

		let root_name = self
			.profile_dir
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "profile".to_string());

		if let Some(parent) = self.archive_path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}
		let tmp_path = self.archive_path.with_extension("zip.partial");

		match self.write_archive(&root_name, &tmp_path) {
			Ok(report) => Ok(report),
			Err(err) => {
				let _ = fs::remove_file(&tmp_path);
				Err(err)
			}
		}
	}

	fn write_archive(&self, root_name: &str, tmp_path: &Path) -> Result<ArchiveReport> {
		let mut report = ArchiveReport::default();
		let mut zip = ZipWriter::new(File::create(tmp_path)?);
		let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

		for entry in WalkDir::new(&self.profile_dir).sort_by_file_name() {
			let entry = entry.map_err(|e| Error::Io(io::Error::other(e)))?;
			if !entry.file_type().is_file() {
				continue;
			}
			let relative = entry
				.path()
				.strip_prefix(&self.profile_dir)
				.map_err(|e| Error::Io(io::Error::other(e)))?;
			if is_transient(relative) {
				report.skipped += 1;
				continue;
			}

			let name = archive_entry_name(root_name, relative);
			zip.start_file(name, options)?;
			let data = fs::read(entry.path())?;
			zip.write_all(&data)?;
			report.files += 1;
		}

		zip.finish()?;
		fs::rename(tmp_path, &self.archive_path)?;
		Ok(report)
	}

	/// [`pack`](Self::pack) on the blocking pool.
	pub async fn pack_async(&self) -> Result<ArchiveReport> {
		let store = self.clone();
		tokio::task::spawn_blocking(move || store.pack())
			.await
			.map_err(|e| Error::Io(io::Error::other(e)))?
	}

	/// [`bootstrap`](Self::bootstrap) on the blocking pool.
	pub async fn bootstrap_async(&self, deployment: Deployment) -> Result<RestoreOutcome> {
		let store = self.clone();
		tokio::task::spawn_blocking(move || store.bootstrap(deployment))
			.await
			.map_err(|e| Error::Io(io::Error::other(e)))?
	}
}

/// Whether a profile-relative path is machine-bound and excluded from archives.
pub fn is_transient(path: &Path) -> bool {
	let text = path.to_string_lossy();
	TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker))
}

fn archive_entry_name(root: &str, relative: &Path) -> String {
	let mut name = root.to_string();
	for component in relative.components() {
		if let Component::Normal(part) = component {
			name.push('/');
			name.push_str(&part.to_string_lossy());
		}
	}
	name
}

fn extract_archive(archive_path: &Path, dest: &Path) -> Result<usize> {
	let mut archive = ZipArchive::new(File::open(archive_path)?)?;
	fs::create_dir_all(dest)?;

	let mut files = 0;
	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)?;
		let enclosed = entry
			.enclosed_name()
			.ok_or_else(|| Error::UnsafeArchiveEntry(PathBuf::from(entry.name())))?;

		// Strip the top-level profile directory name.
		let relative: PathBuf = enclosed.components().skip(1).collect();
		if relative.as_os_str().is_empty() {
			continue;
		}
		let out_path = dest.join(&relative);

		if entry.is_dir() {
			fs::create_dir_all(&out_path)?;
			continue;
		}
		if let Some(parent) = out_path.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut out = File::create(&out_path)?;
		io::copy(&mut entry, &mut out)?;
		files += 1;
	}
	Ok(files)
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;
	use crate::storage_state::Cookie;

	fn seed_profile(dir: &Path) {
		fs::create_dir_all(dir.join("Default/Local Storage")).unwrap();
		fs::write(dir.join("Default/Cookies"), b"cookie-db").unwrap();
		fs::write(dir.join("Default/Local Storage/000003.log"), b"ls").unwrap();
		fs::write(dir.join("Local State"), b"{}").unwrap();
		fs::write(dir.join("SingletonLock"), b"host-123").unwrap();
		fs::write(dir.join("SingletonCookie"), b"x").unwrap();
		fs::write(dir.join("RunningChromeVersion"), b"124").unwrap();
	}

	#[test]
	fn transient_markers_match_anywhere_in_path() {
		assert!(is_transient(Path::new("SingletonLock")));
		assert!(is_transient(Path::new("Default/SingletonSocket")));
		assert!(is_transient(Path::new("RunningChromeVersion")));
		assert!(!is_transient(Path::new("Default/Cookies")));
	}

	#[test]
	fn pack_then_restore_reproduces_store_without_transient_files() {
		let local = TempDir::new().unwrap();
		let profile = local.path().join("wati_profile");
		seed_profile(&profile);
		let archive = local.path().join("wati_profile.zip");

		let report = SessionStore::new(&profile, &archive).pack().unwrap();
		assert_eq!(report.files, 3);
		assert_eq!(report.skipped, 3);
		assert!(archive.is_file());
		assert!(!archive.with_extension("zip.partial").exists());

		let hosted = TempDir::new().unwrap();
		let restored = hosted.path().join("src").join("wati_profile");
		let store = SessionStore::new(&restored, &archive);
		assert_eq!(store.restore().unwrap(), RestoreOutcome::Restored { files: 3 });

		assert_eq!(fs::read(restored.join("Default/Cookies")).unwrap(), b"cookie-db");
		assert_eq!(fs::read(restored.join("Default/Local Storage/000003.log")).unwrap(), b"ls");
		assert!(restored.join("Local State").is_file());
		assert!(!restored.join("SingletonLock").exists());
		assert!(!restored.join("RunningChromeVersion").exists());
	}

	#[test]
	fn archive_entries_are_prefixed_with_profile_name() {
		let tmp = TempDir::new().unwrap();
		let profile = tmp.path().join("wati_profile");
		seed_profile(&profile);
		let archive = tmp.path().join("out.zip");
		SessionStore::new(&profile, &archive).pack().unwrap();

		let zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
		let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
		names.sort();
		assert_eq!(
			names,
			vec!["wati_profile/Default/Cookies", "wati_profile/Default/Local Storage/000003.log", "wati_profile/Local State",]
		);
	}

	#[test]
	fn existing_store_wins_over_archive() {
		let tmp = TempDir::new().unwrap();
		let profile = tmp.path().join("wati_profile");
		seed_profile(&profile);
		let archive = tmp.path().join("wati_profile.zip");
		SessionStore::new(&profile, &archive).pack().unwrap();

		fs::write(profile.join("Default/Cookies"), b"newer").unwrap();
		let outcome = SessionStore::new(&profile, &archive).restore().unwrap();
		assert_eq!(outcome, RestoreOutcome::StoreExists);
		assert_eq!(fs::read(profile.join("Default/Cookies")).unwrap(), b"newer");
	}

	#[test]
	fn bootstrap_only_restores_when_hosted() {
		let tmp = TempDir::new().unwrap();
		let store = SessionStore::new(tmp.path().join("wati_profile"), tmp.path().join("missing.zip"));
		assert_eq!(store.bootstrap(Deployment::Local).unwrap(), RestoreOutcome::NotHosted);
		assert_eq!(store.bootstrap(Deployment::Hosted).unwrap(), RestoreOutcome::NoArchive);
		assert!(!store.exists());
	}

	#[test]
	fn pack_fails_without_profile() {
		let tmp = TempDir::new().unwrap();
		let store = SessionStore::new(tmp.path().join("nope"), tmp.path().join("a.zip"));
		assert!(matches!(store.pack(), Err(Error::Io(_))));
	}

	#[test]
	fn failed_restore_leaves_no_store_behind() {
		let tmp = TempDir::new().unwrap();
		let archive = tmp.path().join("wati_profile.zip");
		let mut zip = ZipWriter::new(File::create(&archive).unwrap());
		let options = SimpleFileOptions::default();
		zip.start_file("wati_profile/Default/Cookies", options).unwrap();
		zip.write_all(b"cookie-db").unwrap();
		zip.start_file("wati_profile/../../evil", options).unwrap();
		zip.write_all(b"x").unwrap();
		zip.finish().unwrap();

		let store = SessionStore::new(tmp.path().join("wati_profile"), &archive);
		assert!(matches!(store.restore(), Err(Error::UnsafeArchiveEntry(_))));
		assert!(!store.exists());
		assert!(!tmp.path().join("wati_profile.restoring").exists());

		// Nothing was mistaken for a live store, so the next start retries.
		assert!(matches!(store.restore(), Err(Error::UnsafeArchiveEntry(_))));
	}

	#[test]
	fn empty_profile_directory_is_restored_over() {
		let tmp = TempDir::new().unwrap();
		let source = tmp.path().join("source").join("wati_profile");
		seed_profile(&source);
		let archive = tmp.path().join("wati_profile.zip");
		SessionStore::new(&source, &archive).pack().unwrap();

		let store = SessionStore::new(tmp.path().join("wati_profile"), &archive);
		fs::create_dir_all(store.profile_dir()).unwrap();

		assert_eq!(store.restore().unwrap(), RestoreOutcome::Restored { files: 3 });
		assert_eq!(fs::read(store.profile_dir().join("Default/Cookies")).unwrap(), b"cookie-db");
	}

	#[test]
	fn stale_staging_directory_is_replaced() {
		let tmp = TempDir::new().unwrap();
		let source = tmp.path().join("source").join("wati_profile");
		seed_profile(&source);
		let archive = tmp.path().join("wati_profile.zip");
		SessionStore::new(&source, &archive).pack().unwrap();

		let store = SessionStore::new(tmp.path().join("wati_profile"), &archive);
		let stale = tmp.path().join("wati_profile.restoring");
		fs::create_dir_all(&stale).unwrap();
		fs::write(stale.join("leftover"), b"old").unwrap();

		store.restore().unwrap();
		assert!(!store.profile_dir().join("leftover").exists());
		assert!(!stale.exists());
	}

	#[test]
	fn failed_pack_removes_partial_archive() {
		let tmp = TempDir::new().unwrap();
		let profile = tmp.path().join("wati_profile");
		seed_profile(&profile);
		// A non-empty directory at the target makes the final rename fail.
		let archive = tmp.path().join("out.zip");
		fs::create_dir_all(archive.join("occupied")).unwrap();

		assert!(SessionStore::new(&profile, &archive).pack().is_err());
		assert!(!tmp.path().join("out.zip.partial").exists());
	}

	#[test]
	fn empty_store_is_not_populated() {
		let tmp = TempDir::new().unwrap();
		let store = SessionStore::new(tmp.path().join("wati_profile"), tmp.path().join("a.zip"));
		assert!(!store.is_populated());
		fs::create_dir_all(store.profile_dir()).unwrap();
		assert!(store.exists());
		assert!(!store.is_populated());
		fs::write(store.profile_dir().join("Local State"), b"{}").unwrap();
		assert!(store.is_populated());
	}

	#[test]
	fn persisted_state_survives_reload() {
		let tmp = TempDir::new().unwrap();
		let store = SessionStore::new(tmp.path().join("wati_profile"), tmp.path().join("a.zip"));
		assert!(store.load_state().unwrap().is_none());

		let state = StorageState {
			cookies: vec![Cookie::new("wati", "1", ".wati.io")],
			origins: vec![],
		};
		let path = store.persist_state(&state).unwrap();
		assert!(path.ends_with("wati_profile/storage.json"));
		assert_eq!(store.load_state().unwrap(), Some(state));
	}
}
