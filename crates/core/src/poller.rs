//! Unread-conversation polling loop.
//!
//! One cycle is scan → act → wait → reload. Nothing is carried between
//! cycles: the reload at the end of every cycle is what surfaces newly
//! arrived conversations, and anything left unread is simply found again.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::page::InboxPage;
use crate::processor::{BatchReport, ConversationProcessor};
use crate::settings::InboxSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
	/// No unread indicator appeared within the bound.
	Idle,
	Processed(BatchReport),
}

pub struct WorkPoller<'a> {
	inbox: &'a InboxSettings,
	processor: ConversationProcessor<'a>,
}

impl<'a> WorkPoller<'a> {
	pub fn new(inbox: &'a InboxSettings) -> Self {
		Self {
			inbox,
			processor: ConversationProcessor::new(inbox),
		}
	}

	/// Snapshot of the unread indicators currently on the page.
	///
	/// A timeout, a scan error and an empty snapshot all mean "no work".
	pub async fn poll_once<P: InboxPage>(&self, page: &P) -> Vec<P::Item> {
		info!(target = "pilot", "🔎 Checking for unread chats...");
		if let Err(err) = page.wait_for(&self.inbox.unread_indicator, self.inbox.unread_timeout).await {
			if !err.is_timeout() {
				warn!(target = "pilot", error = %err, "unread scan failed");
			}
			return Vec::new();
		}

		match page.query_all(&self.inbox.unread_indicator).await {
			Ok(items) => items,
			Err(err) => {
				warn!(target = "pilot", error = %err, "unread snapshot failed");
				Vec::new()
			}
		}
	}

	/// Runs one full cycle, including the idle backoff and the reload.
	pub async fn run_cycle<P: InboxPage>(&self, page: &P) -> CycleOutcome {
		let items = self.poll_once(page).await;

		let outcome = if items.is_empty() {
			info!(target = "pilot", "😴 No unread chats. Waiting 3 mins...");
			CycleOutcome::Idle
		} else {
			info!(target = "pilot", count = items.len(), "💬 Found {} unread chat(s).", items.len());
			CycleOutcome::Processed(self.processor.process(page, &items).await)
		};

		tokio::time::sleep(self.inbox.poll_interval).await;
		if let Err(err) = page.reload().await {
			warn!(target = "pilot", error = %err, "inbox reload failed");
		}
		outcome
	}

	/// Polls until `cancel` fires. There is no other exit.
	pub async fn run<P: InboxPage>(&self, page: &P, cancel: &CancellationToken) -> Result<()> {
		info!(target = "pilot", "🤖 Starting main automation loop...");
		let mut cycles: u64 = 0;
		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					info!(target = "pilot", cycles, "polling stopped");
					return Ok(());
				}
				outcome = self.run_cycle(page) => {
					cycles += 1;
					debug!(target = "pilot", cycles, ?outcome, "cycle finished");
				}
			}
		}
	}

	/// Runs exactly `n` cycles unless cancelled first.
	pub async fn run_cycles<P: InboxPage>(&self, page: &P, n: usize, cancel: &CancellationToken) -> Result<Vec<CycleOutcome>> {
		let mut outcomes = Vec::with_capacity(n);
		for _ in 0..n {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				outcome = self.run_cycle(page) => outcomes.push(outcome),
			}
		}
		Ok(outcomes)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::testing::{MockAction, MockPage};

	#[tokio::test(start_paused = true)]
	async fn empty_inbox_sleeps_interval_and_reloads_once() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		let poller = WorkPoller::new(&inbox);

		let start = tokio::time::Instant::now();
		let outcome = poller.run_cycle(&page).await;

		assert_eq!(outcome, CycleOutcome::Idle);
		assert_eq!(start.elapsed(), inbox.unread_timeout + inbox.poll_interval);
		assert_eq!(page.reloads(), 1);
		assert!(page.clicked_items(&inbox.unread_indicator).is_empty());
		assert!(!page.actions().iter().any(|a| matches!(a, MockAction::QueryAll { .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn three_unread_items_are_all_attempted_despite_a_failure() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 3);
		page.show(&inbox.action_control, 1);
		page.fail_item(2);

		let outcome = WorkPoller::new(&inbox).run_cycle(&page).await;

		let CycleOutcome::Processed(report) = outcome else {
			panic!("expected processed cycle, got {outcome:?}");
		};
		assert_eq!(report.attempted, 3);
		assert_eq!(report.failed, vec![2]);
		assert_eq!(page.clicked_items(&inbox.unread_indicator), vec![1, 3]);
		assert_eq!(page.reloads(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn reload_follows_processing() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 1);
		page.show(&inbox.action_control, 1);

		WorkPoller::new(&inbox).run_cycle(&page).await;

		let actions = page.actions();
		let last_click = actions.iter().rposition(|a| matches!(a, MockAction::Click { .. })).unwrap();
		let reload = actions.iter().position(|a| matches!(a, MockAction::Reload)).unwrap();
		assert!(reload > last_click);
		assert_eq!(actions.last(), Some(&MockAction::Reload));
	}

	#[tokio::test(start_paused = true)]
	async fn snapshot_empty_after_successful_wait_is_idle() {
		// A locator that satisfies the wait but yields nothing from the snapshot
		// can only be simulated by hiding the element between the two calls.
		struct Racing {
			inner: MockPage,
			inbox: InboxSettings,
		}

		#[async_trait::async_trait]
		impl InboxPage for Racing {
			type Item = crate::testing::MockItem;

			async fn goto(&self, url: &str, w: crate::page::WaitUntil, t: Duration) -> Result<()> {
				self.inner.goto(url, w, t).await
			}
			async fn wait_for(&self, l: &crate::Locator, t: Duration) -> Result<()> {
				let res = self.inner.wait_for(l, t).await;
				self.inner.hide(&self.inbox.unread_indicator);
				res
			}
			async fn query_all(&self, l: &crate::Locator) -> Result<Vec<Self::Item>> {
				self.inner.query_all(l).await
			}
			async fn query(&self, l: &crate::Locator) -> Result<Option<Self::Item>> {
				self.inner.query(l).await
			}
			async fn scroll_into_view(&self, i: &Self::Item) -> Result<()> {
				self.inner.scroll_into_view(i).await
			}
			async fn click_item(&self, i: &Self::Item) -> Result<()> {
				self.inner.click_item(i).await
			}
			async fn click(&self, l: &crate::Locator, t: Duration) -> Result<()> {
				self.inner.click(l, t).await
			}
			async fn fill_and_notify(&self, f: &str, v: &str) -> Result<bool> {
				self.inner.fill_and_notify(f, v).await
			}
			async fn reload(&self) -> Result<()> {
				self.inner.reload().await
			}
			async fn storage_state(&self) -> Result<crate::StorageState> {
				self.inner.storage_state().await
			}
		}

		let inbox = InboxSettings::default();
		let page = Racing {
			inner: MockPage::new(),
			inbox: inbox.clone(),
		};
		page.inner.show(&inbox.unread_indicator, 2);

		let start = tokio::time::Instant::now();
		let outcome = WorkPoller::new(&inbox).run_cycle(&page).await;

		assert_eq!(outcome, CycleOutcome::Idle);
		assert_eq!(start.elapsed(), inbox.poll_interval);
		assert_eq!(page.inner.reloads(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn reload_failure_does_not_stop_polling() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.fail_reloads(1);

		let outcomes = WorkPoller::new(&inbox).run_cycles(&page, 2, &CancellationToken::new()).await.unwrap();

		assert_eq!(outcomes, vec![CycleOutcome::Idle, CycleOutcome::Idle]);
		assert_eq!(page.reloads(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn cycles_rediscover_items_from_scratch() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 2);
		page.show(&inbox.action_control, 1);

		let outcomes = WorkPoller::new(&inbox).run_cycles(&page, 2, &CancellationToken::new()).await.unwrap();

		assert_eq!(outcomes.len(), 2);
		assert_eq!(page.clicked_items(&inbox.unread_indicator), vec![1, 2, 1, 2]);
	}

	#[tokio::test(start_paused = true)]
	async fn cancellation_stops_the_loop_during_backoff() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		let cancel = CancellationToken::new();
		let poller = WorkPoller::new(&inbox);

		let trigger = cancel.clone();
		let canceller = async move {
			tokio::time::sleep(inbox_backoff_midpoint()).await;
			trigger.cancel();
		};
		let (result, ()) = tokio::join!(poller.run(&page, &cancel), canceller);

		assert!(result.is_ok());
		assert_eq!(page.reloads(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn run_cycles_reports_cancellation() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		let cancel = CancellationToken::new();
		cancel.cancel();

		let result = WorkPoller::new(&inbox).run_cycles(&page, 1, &cancel).await;
		assert!(matches!(result, Err(Error::Cancelled)));
		assert!(page.actions().is_empty());
	}

	fn inbox_backoff_midpoint() -> Duration {
		let inbox = InboxSettings::default();
		inbox.unread_timeout + inbox.poll_interval / 2
	}
}
