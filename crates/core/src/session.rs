//! Session acquisition: reuse, scripted login, human-assisted login.
//!
//! Strategies run in a fixed order and the first one to observe the inbox
//! marker within its bound wins:
//!
//! 1. [`AuthStrategy::ExistingSession`] - the persistent profile is still logged in.
//! 2. [`AuthStrategy::Scripted`] - credentials are injected into the login form.
//! 3. [`AuthStrategy::Manual`] - an operator logs in and acknowledges on the terminal.
//!
//! Only the manual path writes an explicit storage-state snapshot; the others
//! rely on the persistent context flushing its own profile files.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::page::{InboxPage, WaitUntil};
use crate::settings::{Credentials, InboxSettings};
use crate::store::SessionStore;

/// Out-of-band acknowledgment that a manual login finished.
#[async_trait]
pub trait LoginConfirmation: Send + Sync {
	/// Suspends until the operator confirms. Must not block the executor thread.
	async fn wait_for_ack(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
	ExistingSession,
	Scripted,
	Manual,
}

impl fmt::Display for AuthStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthStrategy::ExistingSession => f.write_str("existing-session"),
			AuthStrategy::Scripted => f.write_str("scripted"),
			AuthStrategy::Manual => f.write_str("manual"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
	Authenticated(AuthStrategy),
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
	#[default]
	Unauthenticated,
	Authenticating,
	Authenticated(AuthStrategy),
}

/// Runs the authentication strategies against one page.
///
/// Holds the session's [`AuthStatus`]: a second [`acquire`](Self::acquire)
/// while one is running fails with [`Error::AuthInFlight`], and once
/// authenticated the session is never re-authenticated.
pub struct SessionAcquirer<'a, C: ?Sized> {
	inbox: &'a InboxSettings,
	credentials: Option<&'a Credentials>,
	store: &'a SessionStore,
	confirmation: &'a C,
	status: Mutex<AuthStatus>,
}

impl<'a, C> SessionAcquirer<'a, C>
where
	C: LoginConfirmation + ?Sized,
{
	pub fn new(inbox: &'a InboxSettings, credentials: Option<&'a Credentials>, store: &'a SessionStore, confirmation: &'a C) -> Self {
		Self {
			inbox,
			credentials,
			store,
			confirmation,
			status: Mutex::new(AuthStatus::Unauthenticated),
		}
	}

	pub fn status(&self) -> AuthStatus {
		*self.status.lock()
	}

	pub async fn acquire<P: InboxPage>(&self, page: &P) -> Result<AuthOutcome> {
		{
			let mut status = self.status.lock();
			match *status {
				AuthStatus::Authenticating => return Err(Error::AuthInFlight),
				AuthStatus::Authenticated(strategy) => return Ok(AuthOutcome::Authenticated(strategy)),
				AuthStatus::Unauthenticated => *status = AuthStatus::Authenticating,
			}
		}
		let mut guard = AttemptGuard {
			status: &self.status,
			settled: false,
		};

		let outcome = self.run_strategies(page).await;

		*self.status.lock() = match outcome {
			AuthOutcome::Authenticated(strategy) => AuthStatus::Authenticated(strategy),
			AuthOutcome::Failed => AuthStatus::Unauthenticated,
		};
		guard.settled = true;
		Ok(outcome)
	}

	async fn run_strategies<P: InboxPage>(&self, page: &P) -> AuthOutcome {
		if attempt(AuthStrategy::ExistingSession, self.existing_session(page)).await {
			info!(target = "pilot", "✅ Logged in, session active!");
			return AuthOutcome::Authenticated(AuthStrategy::ExistingSession);
		}

		match self.credentials {
			Some(credentials) => {
				if attempt(AuthStrategy::Scripted, self.scripted_login(page, credentials)).await {
					info!(target = "pilot", "✅ Automatic login successful!");
					return AuthOutcome::Authenticated(AuthStrategy::Scripted);
				}
				info!(target = "pilot", "❌ Automatic login failed.");
			}
			None => warn!(target = "pilot", "🔑 No credentials configured, skipping automatic login"),
		}

		info!(target = "pilot", "ℹ️ Falling back to manual login...");
		if attempt(AuthStrategy::Manual, self.manual_login(page)).await {
			return AuthOutcome::Authenticated(AuthStrategy::Manual);
		}

		error!(target = "pilot", "🚨 Login was not detected. All authentication strategies failed.");
		AuthOutcome::Failed
	}

	async fn existing_session<P: InboxPage>(&self, page: &P) -> Result<()> {
		info!(target = "pilot", url = %self.inbox.inbox_url, "🌍 Navigating to WATI Inbox...");
		page.goto(&self.inbox.inbox_url, WaitUntil::Load, self.inbox.navigation_timeout).await?;
		tokio::time::sleep(self.inbox.initial_settle).await;
		page.wait_for(&self.inbox.inbox_marker, self.inbox.existing_session_timeout).await
	}

	async fn scripted_login<P: InboxPage>(&self, page: &P, credentials: &Credentials) -> Result<()> {
		info!(target = "pilot", "🔑 Attempting automatic login...");
		for (field, value) in credentials.form_fields() {
			if !page.fill_and_notify(field, value).await? {
				debug!(target = "pilot", field, "login field not present");
			}
		}

		match page.query(&self.inbox.submit_button).await? {
			Some(button) => page.click_item(&button).await?,
			None => debug!(target = "pilot", selector = %self.inbox.submit_button, "submit button not present"),
		}

		page.wait_for(&self.inbox.inbox_marker, self.inbox.login_timeout).await
	}

	async fn manual_login<P: InboxPage>(&self, page: &P) -> Result<()> {
		info!(target = "pilot", "🟢 MANUAL LOGIN REQUIRED");
		info!(target = "pilot", "➡️ Complete your WATI login in the opened browser.");
		info!(target = "pilot", "➡️ Once 'Team Inbox' is visible, press ENTER to save session.");

		if let Err(err) = page.goto(&self.inbox.login_url, WaitUntil::NetworkIdle, self.inbox.navigation_timeout).await {
			warn!(target = "pilot", url = %self.inbox.login_url, error = %err, "login page did not settle, waiting for operator anyway");
		}

		self.confirmation.wait_for_ack().await?;

		page.goto(&self.inbox.inbox_url, WaitUntil::Load, self.inbox.navigation_timeout).await?;
		page.wait_for(&self.inbox.inbox_marker, self.inbox.login_timeout).await?;
		info!(target = "pilot", "✅ Login detected! Saving session...");

		match self.persist(page).await {
			Ok(path) => info!(target = "pilot", path = %path.display(), "✅ Session saved successfully"),
			// The persistent profile still holds the session on disk.
			Err(err) => error!(target = "pilot", error = %err, "failed to write storage state snapshot"),
		}
		Ok(())
	}

	async fn persist<P: InboxPage>(&self, page: &P) -> Result<std::path::PathBuf> {
		let state = page.storage_state().await?;
		self.store.persist_state(&state)
	}
}

/// Runs one strategy, folding any error into "this strategy failed".
async fn attempt(strategy: AuthStrategy, fut: impl Future<Output = Result<()>>) -> bool {
	match fut.await {
		Ok(()) => true,
		Err(err) if err.is_timeout() => {
			debug!(target = "pilot", %strategy, error = %err, "strategy timed out");
			false
		}
		Err(err) => {
			warn!(target = "pilot", %strategy, error = %err, "strategy failed");
			false
		}
	}
}

/// Resets the status if an acquisition is dropped before it settles.
struct AttemptGuard<'s> {
	status: &'s Mutex<AuthStatus>,
	settled: bool,
}

impl Drop for AttemptGuard<'_> {
	fn drop(&mut self) {
		if !self.settled {
			*self.status.lock() = AuthStatus::Unauthenticated;
		}
	}
}
