//! Test doubles for the inbox automation.
//!
//! [`MockPage`] implements [`InboxPage`] without a browser. Element presence
//! is scripted per [`Locator`], every call is recorded as a [`MockAction`],
//! and bounded waits on absent elements sleep for their full timeout before
//! failing, so tests under `#[tokio::test(start_paused = true)]` can assert
//! exact elapsed time.
//!
//! ```ignore
//! let page = MockPage::new();
//! page.show(&Locator::css("div.unread"), 3);
//! page.fail_item(2);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::locator::Locator;
use crate::page::{InboxPage, WaitUntil};
use crate::session::LoginConfirmation;
use crate::storage_state::StorageState;

/// Element handle returned by [`MockPage`]: the locator it was found by and its
/// 1-based position in the result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockItem {
	pub locator: Locator,
	pub position: usize,
}

/// Call recorded by [`MockPage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAction {
	Goto { url: String },
	WaitFor { locator: Locator },
	QueryAll { locator: Locator },
	Query { locator: Locator },
	ScrollIntoView { locator: Locator, position: usize },
	ClickItem { locator: Locator, position: usize },
	Click { locator: Locator },
	Fill { field: String, value: String },
	Reload,
	StorageState,
}

#[derive(Default)]
pub struct MockPage {
	counts: Mutex<HashMap<Locator, usize>>,
	fields: Mutex<HashSet<String>>,
	reveal_on_click: Mutex<HashMap<Locator, Locator>>,
	failing_items: Mutex<HashSet<usize>>,
	failing_gotos: Mutex<HashMap<String, usize>>,
	failing_reloads: Mutex<usize>,
	storage: Mutex<StorageState>,
	actions: Mutex<Vec<MockAction>>,
}

impl MockPage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes `count` elements match `locator` (0 hides it).
	pub fn show(&self, locator: &Locator, count: usize) {
		self.counts.lock().insert(locator.clone(), count);
	}

	pub fn hide(&self, locator: &Locator) {
		self.counts.lock().remove(locator);
	}

	/// Registers named inputs that [`InboxPage::fill_and_notify`] can find.
	pub fn add_fields(&self, names: &[&str]) {
		self.fields.lock().extend(names.iter().map(|n| n.to_string()));
	}

	/// Clicking an element found by `clicked` makes `revealed` appear.
	pub fn reveal_on_click(&self, clicked: &Locator, revealed: &Locator) {
		self.reveal_on_click.lock().insert(clicked.clone(), revealed.clone());
	}

	/// Scrolling or clicking the item at 1-based `position` fails.
	pub fn fail_item(&self, position: usize) {
		self.failing_items.lock().insert(position);
	}

	/// The next `times` navigations to `url` fail.
	pub fn fail_goto(&self, url: &str, times: usize) {
		self.failing_gotos.lock().insert(url.to_string(), times);
	}

	pub fn fail_reloads(&self, times: usize) {
		*self.failing_reloads.lock() = times;
	}

	pub fn set_storage_state(&self, state: StorageState) {
		*self.storage.lock() = state;
	}

	pub fn actions(&self) -> Vec<MockAction> {
		self.actions.lock().clone()
	}

	pub fn gotos(&self) -> Vec<String> {
		self.actions
			.lock()
			.iter()
			.filter_map(|a| match a {
				MockAction::Goto { url } => Some(url.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn reloads(&self) -> usize {
		self.actions.lock().iter().filter(|a| matches!(a, MockAction::Reload)).count()
	}

	/// Positions of items clicked via [`InboxPage::click_item`] for `locator`.
	pub fn clicked_items(&self, locator: &Locator) -> Vec<usize> {
		self.actions
			.lock()
			.iter()
			.filter_map(|a| match a {
				MockAction::ClickItem { locator: l, position } if l == locator => Some(*position),
				_ => None,
			})
			.collect()
	}

	pub fn clicks(&self, locator: &Locator) -> usize {
		self.actions
			.lock()
			.iter()
			.filter(|a| matches!(a, MockAction::Click { locator: l } if l == locator))
			.count()
	}

	fn record(&self, action: MockAction) {
		self.actions.lock().push(action);
	}

	fn count(&self, locator: &Locator) -> usize {
		self.counts.lock().get(locator).copied().unwrap_or(0)
	}

	fn after_click(&self, locator: &Locator) {
		let revealed = self.reveal_on_click.lock().get(locator).cloned();
		if let Some(revealed) = revealed {
			self.show(&revealed, 1);
		}
	}

	fn check_item(&self, item: &MockItem) -> Result<()> {
		if self.failing_items.lock().contains(&item.position) {
			return Err(Error::Browser(format!("element {} detached from DOM", item.position)));
		}
		Ok(())
	}
}

#[async_trait]
impl InboxPage for MockPage {
	type Item = MockItem;

	async fn goto(&self, url: &str, _wait_until: WaitUntil, _timeout: Duration) -> Result<()> {
		self.record(MockAction::Goto { url: url.to_string() });
		let mut failing = self.failing_gotos.lock();
		if let Some(remaining) = failing.get_mut(url) {
			if *remaining > 0 {
				*remaining -= 1;
				return Err(Error::Browser(format!("net::ERR_CONNECTION_RESET at {url}")));
			}
		}
		Ok(())
	}

	async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
		self.record(MockAction::WaitFor { locator: locator.clone() });
		if self.count(locator) > 0 {
			return Ok(());
		}
		tokio::time::sleep(timeout).await;
		if self.count(locator) > 0 {
			return Ok(());
		}
		Err(Error::timeout(timeout, locator.to_string()))
	}

	async fn query_all(&self, locator: &Locator) -> Result<Vec<MockItem>> {
		self.record(MockAction::QueryAll { locator: locator.clone() });
		Ok((1..=self.count(locator))
			.map(|position| MockItem {
				locator: locator.clone(),
				position,
			})
			.collect())
	}

	async fn query(&self, locator: &Locator) -> Result<Option<MockItem>> {
		self.record(MockAction::Query { locator: locator.clone() });
		Ok((self.count(locator) > 0).then(|| MockItem {
			locator: locator.clone(),
			position: 1,
		}))
	}

	async fn scroll_into_view(&self, item: &MockItem) -> Result<()> {
		self.record(MockAction::ScrollIntoView {
			locator: item.locator.clone(),
			position: item.position,
		});
		self.check_item(item)
	}

	async fn click_item(&self, item: &MockItem) -> Result<()> {
		self.record(MockAction::ClickItem {
			locator: item.locator.clone(),
			position: item.position,
		});
		self.check_item(item)?;
		self.after_click(&item.locator);
		Ok(())
	}

	async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()> {
		self.wait_for(locator, timeout).await?;
		self.record(MockAction::Click { locator: locator.clone() });
		self.after_click(locator);
		Ok(())
	}

	async fn fill_and_notify(&self, field: &str, value: &str) -> Result<bool> {
		self.record(MockAction::Fill {
			field: field.to_string(),
			value: value.to_string(),
		});
		Ok(self.fields.lock().contains(field))
	}

	async fn reload(&self) -> Result<()> {
		self.record(MockAction::Reload);
		let mut failing = self.failing_reloads.lock();
		if *failing > 0 {
			*failing -= 1;
			return Err(Error::Browser("reload failed".into()));
		}
		Ok(())
	}

	async fn storage_state(&self) -> Result<StorageState> {
		self.record(MockAction::StorageState);
		Ok(self.storage.lock().clone())
	}
}

/// Scripted operator acknowledgment.
pub struct MockConfirmation {
	acks: AtomicUsize,
	action: Option<Box<dyn Fn() + Send + Sync>>,
}

impl MockConfirmation {
	/// Acknowledges immediately without changing anything.
	pub fn new() -> Self {
		Self { acks: AtomicUsize::new(0), action: None }
	}

	/// Runs `action` (e.g. revealing the inbox marker) on each acknowledgment.
	pub fn with_action(action: impl Fn() + Send + Sync + 'static) -> Self {
		Self {
			acks: AtomicUsize::new(0),
			action: Some(Box::new(action)),
		}
	}

	pub fn acks(&self) -> usize {
		self.acks.load(Ordering::SeqCst)
	}
}

impl Default for MockConfirmation {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl LoginConfirmation for MockConfirmation {
	async fn wait_for_ack(&self) -> Result<()> {
		self.acks.fetch_add(1, Ordering::SeqCst);
		if let Some(action) = &self.action {
			action();
		}
		Ok(())
	}
}
