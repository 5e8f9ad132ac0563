//! Per-conversation UI interaction sequence.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::page::InboxPage;
use crate::settings::InboxSettings;

/// Outcome of one [`ConversationProcessor::process`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
	pub attempted: usize,
	pub succeeded: usize,
	/// 1-based snapshot positions of the items that failed.
	pub failed: Vec<usize>,
}

/// Opens each unread conversation and triggers the configured flow.
///
/// Items are handled strictly in snapshot order, one at a time: every step
/// mutates the single on-screen view. A failure is logged with the item's
/// position and the batch moves on; a half-handled conversation is left as is.
pub struct ConversationProcessor<'a> {
	inbox: &'a InboxSettings,
}

impl<'a> ConversationProcessor<'a> {
	pub fn new(inbox: &'a InboxSettings) -> Self {
		Self { inbox }
	}

	pub async fn process<P: InboxPage>(&self, page: &P, items: &[P::Item]) -> BatchReport {
		let total = items.len();
		let mut report = BatchReport {
			attempted: 0,
			succeeded: 0,
			failed: Vec::new(),
		};

		for (index, item) in items.iter().enumerate() {
			let position = index + 1;
			report.attempted += 1;
			match self.process_one(page, item).await {
				Ok(()) => {
					info!(target = "pilot", position, total, "✅ Processed chat {position}/{total}");
					report.succeeded += 1;
					tokio::time::sleep(self.inbox.item_gap).await;
				}
				Err(err) => {
					warn!(target = "pilot", position, error = %err, "⚠️ Error chat {position}: {err}");
					report.failed.push(position);
				}
			}
		}

		report
	}

	async fn process_one<P: InboxPage>(&self, page: &P, item: &P::Item) -> Result<()> {
		page.scroll_into_view(item).await?;
		page.click_item(item).await?;
		tokio::time::sleep(self.inbox.item_settle).await;

		// May land on the wrong control if the UI shifted; there is no way to tell.
		page.click(&self.inbox.action_control, self.inbox.action_timeout).await?;

		match page.query(&self.inbox.follow_up_control).await? {
			Some(control) => page.click_item(&control).await?,
			None => debug!(target = "pilot", selector = %self.inbox.follow_up_control, "follow-up control absent"),
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{MockAction, MockPage};

	#[tokio::test(start_paused = true)]
	async fn processes_every_item_in_snapshot_order() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 3);
		page.show(&inbox.action_control, 1);
		page.show(&inbox.follow_up_control, 1);

		let items = page.query_all(&inbox.unread_indicator).await.unwrap();
		let report = ConversationProcessor::new(&inbox).process(&page, &items).await;

		assert_eq!(report, BatchReport { attempted: 3, succeeded: 3, failed: vec![] });
		assert_eq!(page.clicked_items(&inbox.unread_indicator), vec![1, 2, 3]);
		assert_eq!(page.clicked_items(&inbox.follow_up_control), vec![1, 1, 1]);
		assert_eq!(page.clicks(&inbox.action_control), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn failure_on_one_item_does_not_skip_the_rest() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 3);
		page.show(&inbox.action_control, 1);
		page.fail_item(2);

		let items = page.query_all(&inbox.unread_indicator).await.unwrap();
		let report = ConversationProcessor::new(&inbox).process(&page, &items).await;

		assert_eq!(report.attempted, 3);
		assert_eq!(report.succeeded, 2);
		assert_eq!(report.failed, vec![2]);
		let scrolled: Vec<_> = page
			.actions()
			.into_iter()
			.filter_map(|a| match a {
				MockAction::ScrollIntoView { position, .. } => Some(position),
				_ => None,
			})
			.collect();
		assert_eq!(scrolled, vec![1, 2, 3]);
		assert_eq!(page.clicked_items(&inbox.unread_indicator), vec![1, 3]);
	}

	#[tokio::test(start_paused = true)]
	async fn missing_follow_up_control_is_not_an_error() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 1);
		page.show(&inbox.action_control, 1);

		let items = page.query_all(&inbox.unread_indicator).await.unwrap();
		let report = ConversationProcessor::new(&inbox).process(&page, &items).await;

		assert_eq!(report.succeeded, 1);
		assert!(page.clicked_items(&inbox.follow_up_control).is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn missing_action_control_times_out_the_item() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 2);

		let items = page.query_all(&inbox.unread_indicator).await.unwrap();
		let start = tokio::time::Instant::now();
		let report = ConversationProcessor::new(&inbox).process(&page, &items).await;

		assert_eq!(report.failed, vec![1, 2]);
		assert_eq!(start.elapsed(), (inbox.item_settle + inbox.action_timeout) * 2);
	}

	#[tokio::test(start_paused = true)]
	async fn settles_after_opening_and_pauses_between_items() {
		let inbox = InboxSettings::default();
		let page = MockPage::new();
		page.show(&inbox.unread_indicator, 2);
		page.show(&inbox.action_control, 1);

		let items = page.query_all(&inbox.unread_indicator).await.unwrap();
		let start = tokio::time::Instant::now();
		ConversationProcessor::new(&inbox).process(&page, &items).await;

		assert_eq!(start.elapsed(), (inbox.item_settle + inbox.item_gap) * 2);
	}
}
