//! Terminal acknowledgment for the manual login.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use pilot::{Error, LoginConfirmation, Result};
use tracing::debug;

const PROMPT: &str = "👉 Press ENTER after login is complete... ";

/// Waits for the operator to press Enter on the controlling terminal.
///
/// The read happens on the blocking pool, so the liveness endpoint keeps
/// answering while the operator logs in.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmation;

#[async_trait]
impl LoginConfirmation for StdinConfirmation {
	async fn wait_for_ack(&self) -> Result<()> {
		let mut stderr = io::stderr();
		let _ = write!(stderr, "{PROMPT}");
		let _ = stderr.flush();

		tokio::task::spawn_blocking(|| read_ack(&mut io::stdin().lock()))
			.await
			.map_err(|e| Error::Io(io::Error::other(e)))??;
		debug!(target = "pilot", "operator acknowledged login");
		Ok(())
	}
}

/// Consumes one line. End of input means nobody is there to acknowledge.
fn read_ack(reader: &mut impl BufRead) -> io::Result<()> {
	let mut line = String::new();
	match reader.read_line(&mut line)? {
		0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed before login was acknowledged")),
		_ => Ok(()),
	}
}
