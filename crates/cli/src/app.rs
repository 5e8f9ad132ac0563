//! Process wiring: startup, the bot task and the liveness task.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use pilot::{AuthOutcome, Error, InboxPage, LoginConfirmation, RestoreOutcome, SessionAcquirer, SessionStore, Settings, WorkPoller};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::ChromiumSession;
use crate::confirm::StdinConfirmation;
use crate::{install, liveness};

/// How long shutdown waits for blocking work, such as a pending terminal
/// read, before the runtime is torn down anyway.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runs `future` on a fresh multi-threaded runtime.
///
/// An abandoned login prompt leaves a blocking stdin read behind, so the
/// runtime waits at most `grace` for blocking work before it is dropped.
pub fn block_on<F: Future>(future: F, grace: Duration) -> std::io::Result<F::Output> {
	let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
	let output = runtime.block_on(future);
	runtime.shutdown_timeout(grace);
	Ok(output)
}

/// Runs until Ctrl-C, or until both tasks have stopped.
pub async fn run(settings: Settings) -> Result<()> {
	let settings = Arc::new(settings);
	let shutdown = CancellationToken::new();

	let signal = shutdown.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!(target = "pilot", "shutdown requested");
			signal.cancel();
		}
	});

	let executable = prepare(&settings).await?;

	info!(target = "pilot", "🚀 Starting bot and web server...");
	let bot = tokio::spawn(run_bot(settings.clone(), executable, shutdown.clone()));
	let web = tokio::spawn(liveness::serve(settings.liveness_port, shutdown.clone()));

	let (bot, web) = tokio::join!(settle("bot", bot), settle("web server", web));
	supervise(bot, web)
}

/// Restores the Session Store and provisions the browser. Runs before any
/// authentication attempt so the restored profile is what the browser opens.
async fn prepare(settings: &Settings) -> Result<Option<PathBuf>> {
	info!(target = "pilot", deployment = %settings.deployment, "🚀 Initializing environment...");

	let store = SessionStore::from_paths(&settings.paths);
	match store.bootstrap_async(settings.deployment).await.context("failed to restore session store")? {
		RestoreOutcome::Restored { files } => info!(target = "pilot", files, "✅ Login session restored."),
		RestoreOutcome::NoArchive => warn!(
			target = "pilot",
			archive = %settings.paths.archive_path.display(),
			"⚠️ No saved login archive found, a fresh login will be needed"
		),
		RestoreOutcome::StoreExists | RestoreOutcome::NotHosted => {}
	}

	install::ensure_browser(&settings.paths, &settings.install).await
}

async fn run_bot(settings: Arc<Settings>, executable: Option<PathBuf>, shutdown: CancellationToken) -> Result<()> {
	info!(target = "pilot", "🌐 Launching WATI automation with persistent browser...");
	let session = ChromiumSession::launch(&settings, executable).await?;
	let store = SessionStore::from_paths(&settings.paths);
	let result = drive(&settings, session.page(), &store, &StdinConfirmation, &shutdown).await;
	session.close().await;
	result
}

/// Authenticates, archives a fresh local login, then polls until shutdown.
async fn drive<P, C>(settings: &Settings, page: &P, store: &SessionStore, confirmation: &C, shutdown: &CancellationToken) -> Result<()>
where
	P: InboxPage,
	C: LoginConfirmation,
{
	let acquirer = SessionAcquirer::new(&settings.inbox, settings.credentials.as_ref(), store, confirmation);

	let outcome = tokio::select! {
		_ = shutdown.cancelled() => return Ok(()),
		outcome = acquirer.acquire(page) => outcome?,
	};

	match outcome {
		AuthOutcome::Authenticated(strategy) => {
			info!(target = "pilot", %strategy, "session acquired");
			if !settings.deployment.is_hosted() {
				archive_profile(store).await;
			}
		}
		AuthOutcome::Failed if settings.halt_on_auth_failure => {
			shutdown.cancel();
			return Err(Error::AuthenticationFailed.into());
		}
		AuthOutcome::Failed => warn!(target = "pilot", "continuing without a confirmed login"),
	}

	WorkPoller::new(&settings.inbox).run(page, shutdown).await?;
	Ok(())
}

/// Packs the profile for upload to the hosted deployment. Failure only
/// costs the archive, never the running session.
async fn archive_profile(store: &SessionStore) {
	info!(target = "pilot", archive = %store.archive_path().display(), "📦 Creating profile archive for deployment...");
	match store.pack_async().await {
		Ok(report) => info!(
			target = "pilot",
			files = report.files,
			skipped = report.skipped,
			"✅ Profile archive created."
		),
		Err(err) => warn!(target = "pilot", error = %err, "profile archive failed"),
	}
}

async fn settle(name: &'static str, handle: JoinHandle<Result<()>>) -> Result<()> {
	let result = match handle.await {
		Ok(result) => result,
		Err(join) => Err(anyhow!("{name} task panicked: {join}")),
	};
	match &result {
		Ok(()) => info!(target = "pilot", task = name, "task stopped"),
		Err(err) => error!(target = "pilot", task = name, error = %format!("{err:#}"), "task failed"),
	}
	result
}

/// The process fails only when neither task survived, or when the bot
/// halted on a failed login and took the web server down with it.
pub fn supervise(bot: Result<()>, web: Result<()>) -> Result<()> {
	match (bot, web) {
		(Err(bot), Err(web)) => Err(anyhow!("bot failed: {bot:#}; web server failed: {web:#}")),
		(Err(bot), Ok(())) if is_halt(&bot) => Err(bot),
		_ => Ok(()),
	}
}

fn is_halt(err: &anyhow::Error) -> bool {
	matches!(err.downcast_ref::<Error>(), Some(Error::AuthenticationFailed))
}
