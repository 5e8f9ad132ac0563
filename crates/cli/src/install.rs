//! Browser runtime provisioning.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use pilot::{InstallCommand, Paths};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Makes sure a Chromium build exists under the browsers directory and
/// returns its executable, or `None` when the install left it somewhere else.
///
/// Runs the install command only when the expected executable is missing.
/// A failed install is fatal: the bot cannot do anything without a browser.
pub async fn ensure_browser(paths: &Paths, install: &InstallCommand) -> Result<Option<PathBuf>> {
	tokio::fs::create_dir_all(&paths.browsers_dir)
		.await
		.with_context(|| format!("failed to create {}", paths.browsers_dir.display()))?;

	let executable = paths.chromium_executable();
	if executable.exists() {
		info!(target = "pilot", path = %executable.display(), "✅ Chromium already installed.");
		return Ok(Some(executable));
	}

	info!(target = "pilot", "🧩 Installing Chromium...");
	run_install(install, &paths.browsers_dir).await?;

	info!(target = "pilot", "✅ Chromium installed successfully!");
	if !executable.exists() {
		// Newer installers use a different revision directory; the driver
		// falls back to searching for a Chromium build itself.
		warn!(target = "pilot", expected = %executable.display(), "installed build not at the expected path");
		return Ok(None);
	}
	Ok(Some(executable))
}

/// Runs `install` with `PLAYWRIGHT_BROWSERS_PATH` pointing at `browsers_dir`,
/// forwarding its output line by line.
pub async fn run_install(install: &InstallCommand, browsers_dir: &Path) -> Result<()> {
	let program = which::which(&install.program).with_context(|| format!("install program not found: {}", install.program))?;

	let mut child = Command::new(&program)
		.args(&install.args)
		.env("PLAYWRIGHT_BROWSERS_PATH", browsers_dir)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true)
		.spawn()
		.with_context(|| format!("failed to start {}", program.display()))?;

	let stdout = child.stdout.take();
	let stderr = child.stderr.take();
	let (status, (), ()) = tokio::join!(child.wait(), forward_lines(stdout, "stdout"), forward_lines(stderr, "stderr"));

	let status = status.context("install command did not run to completion")?;
	if !status.success() {
		bail!("browser install failed ({status}): {} {}", install.program, install.args.join(" "));
	}
	Ok(())
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, stream: &'static str) {
	let Some(reader) = reader else {
		return;
	};
	let mut lines = BufReader::new(reader).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		info!(target = "install", stream, "{line}");
	}
}
