//! Browser-automation capability used by the core.
//!
//! [`InboxPage`] is the seam between the session/polling logic and a concrete
//! browser driver. The binary crate implements it over a Chromium DevTools
//! connection; tests use [`crate::testing::MockPage`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::locator::Locator;
use crate::storage_state::StorageState;

/// When a navigation is considered finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
	#[default]
	Load,
	/// No network activity for a short quiet period.
	NetworkIdle,
}

/// A single page of a persistent browser context.
///
/// Every method is an await point. Bounded waits report expiry as
/// [`Error::Timeout`](crate::Error::Timeout) and never block the executor thread.
#[async_trait]
pub trait InboxPage: Send + Sync {
	/// Handle to an element captured by [`query_all`](Self::query_all) or
	/// [`query`](Self::query). Only meaningful until the next reload.
	type Item: Send + Sync;

	/// Navigates to `url`, failing if the navigation does not settle within `timeout`.
	async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()>;

	/// Resolves once at least one element matches `locator`.
	async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()>;

	/// Snapshot of every element currently matching `locator`, in document order.
	async fn query_all(&self, locator: &Locator) -> Result<Vec<Self::Item>>;

	/// First element matching `locator`, if any.
	async fn query(&self, locator: &Locator) -> Result<Option<Self::Item>>;

	async fn scroll_into_view(&self, item: &Self::Item) -> Result<()>;

	async fn click_item(&self, item: &Self::Item) -> Result<()>;

	/// Waits up to `timeout` for `locator` and clicks the first match.
	async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()>;

	/// Sets the value of the input named `field` and notifies the page's
	/// reactive framework of the change. Returns `false` when no such input exists.
	async fn fill_and_notify(&self, field: &str, value: &str) -> Result<bool>;

	async fn reload(&self) -> Result<()>;

	/// Captures cookies and localStorage of the browser context.
	async fn storage_state(&self) -> Result<StorageState>;
}
