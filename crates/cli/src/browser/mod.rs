//! Chromium-backed [`InboxPage`] over the DevTools protocol.
//!
//! One browser, one persistent profile directory, one page. The profile
//! directory is the Session Store: cookies and local storage written by the
//! browser survive restarts without any snapshotting on our side.

pub mod js;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{Cookie as CdpCookie, CookieSameSite};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use pilot::{Cookie, Error, InboxPage, Locator, OriginState, Result, SameSite, Settings, StorageState, WaitUntil};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn browser_error(err: CdpError) -> Error {
	Error::Browser(err.to_string())
}

/// Running browser plus the single page the bot drives.
pub struct ChromiumSession {
	browser: Browser,
	page: ChromiumPage,
	handler: JoinHandle<()>,
}

impl ChromiumSession {
	/// Launches Chromium on the configured profile directory.
	///
	/// `executable` is the installed runtime; `None` lets the driver look for
	/// a system Chromium.
	pub async fn launch(settings: &Settings, executable: Option<PathBuf>) -> Result<Self> {
		let mut args = vec!["--no-first-run", "--no-default-browser-check", "--disable-dev-shm-usage"];
		if settings.deployment.is_hosted() {
			// Platform containers run as root without user namespaces.
			args.push("--no-sandbox");
		}

		let mut builder = BrowserConfig::builder()
			.user_data_dir(&settings.paths.profile_dir)
			.request_timeout(settings.inbox.navigation_timeout)
			.args(args);
		if let Some(executable) = &executable {
			builder = builder.chrome_executable(executable);
		}
		if !settings.headless {
			builder = builder.with_head();
		}
		let config = builder.build().map_err(Error::Browser)?;

		info!(
			target = "pilot",
			profile = %settings.paths.profile_dir.display(),
			executable = ?executable,
			headless = settings.headless,
			"launching chromium"
		);
		let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;

		let handler = tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if let Err(err) = event {
					warn!(target = "pilot", error = %err, "chromium event loop exited");
					break;
				}
			}
		});

		let page = browser.new_page("about:blank").await.map_err(browser_error)?;
		Ok(Self {
			browser,
			page: ChromiumPage::new(page),
			handler,
		})
	}

	pub fn page(&self) -> &ChromiumPage {
		&self.page
	}

	/// Closes the browser so the profile is flushed to disk.
	pub async fn close(mut self) {
		if let Err(err) = self.browser.close().await {
			warn!(target = "pilot", error = %err, "browser close failed");
		}
		if let Err(err) = self.browser.wait().await {
			debug!(target = "pilot", error = %err, "browser process wait failed");
		}
		self.handler.abort();
	}
}

/// [`InboxPage`] over a DevTools page.
pub struct ChromiumPage {
	page: Page,
	next_token: AtomicU64,
}

impl ChromiumPage {
	pub fn new(page: Page) -> Self {
		Self {
			page,
			next_token: AtomicU64::new(0),
		}
	}

	async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
		let result = self.page.evaluate(script).await.map_err(|e| Error::JsEval(e.to_string()))?;
		result.into_value::<T>().map_err(|e| Error::JsEval(e.to_string()))
	}

	async fn is_visible(&self, locator: &Locator) -> Result<bool> {
		self.eval(js::is_visible(locator)).await
	}

	async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>> {
		match locator {
			Locator::Css(selector) => self.page.find_elements(selector.as_str()).await.map_err(browser_error),
			Locator::Text(_) => {
				// The CSS engine cannot match text, so matches are tagged first
				// and looked up by the tag.
				let token = self.next_token.fetch_add(1, Ordering::Relaxed).to_string();
				let count: usize = self.eval(js::tag_matches(locator, &token)).await?;
				if count == 0 {
					return Ok(Vec::new());
				}
				self.page.find_elements(js::tagged_selector(&token)).await.map_err(browser_error)
			}
		}
	}
}

#[async_trait]
impl InboxPage for ChromiumPage {
	type Item = Element;

	async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		match tokio::time::timeout(timeout, self.page.goto(url)).await {
			Err(_) => return Err(Error::timeout(timeout, format!("navigation to {url}"))),
			Ok(Err(err)) => {
				return Err(Error::Navigation {
					url: url.to_string(),
					source: err.to_string().into(),
				});
			}
			Ok(Ok(_)) => {}
		}

		if wait_until == WaitUntil::NetworkIdle {
			let remaining = deadline.saturating_duration_since(Instant::now());
			let idle: bool = self.eval(js::network_idle(remaining)).await?;
			if !idle {
				return Err(Error::timeout(timeout, format!("network idle at {url}")));
			}
		}
		Ok(())
	}

	async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
		if poll_until(timeout, move || self.is_visible(locator)).await {
			Ok(())
		} else {
			Err(Error::timeout(timeout, locator.to_string()))
		}
	}

	async fn query_all(&self, locator: &Locator) -> Result<Vec<Element>> {
		self.find_all(locator).await
	}

	async fn query(&self, locator: &Locator) -> Result<Option<Element>> {
		Ok(self.find_all(locator).await?.into_iter().next())
	}

	async fn scroll_into_view(&self, item: &Element) -> Result<()> {
		item.scroll_into_view().await.map_err(browser_error)?;
		Ok(())
	}

	async fn click_item(&self, item: &Element) -> Result<()> {
		item.click().await.map_err(browser_error)?;
		Ok(())
	}

	async fn click(&self, locator: &Locator, timeout: Duration) -> Result<()> {
		self.wait_for(locator, timeout).await?;
		let element = self.query(locator).await?.ok_or_else(|| Error::ElementNotFound {
			selector: locator.to_string(),
		})?;
		self.click_item(&element).await
	}

	async fn fill_and_notify(&self, field: &str, value: &str) -> Result<bool> {
		self.eval(js::fill_and_notify(field, value)).await
	}

	async fn reload(&self) -> Result<()> {
		self.page.execute(ReloadParams::default()).await.map_err(browser_error)?;
		self.page.wait_for_navigation().await.map_err(browser_error)?;
		Ok(())
	}

	async fn storage_state(&self) -> Result<StorageState> {
		let cookies = self.page.get_cookies().await.map_err(browser_error)?;
		let origin: OriginState = self.eval(js::LOCAL_STORAGE_SNAPSHOT.to_string()).await?;

		let mut state = StorageState::new();
		state.cookies = cookies.into_iter().map(convert_cookie).collect();
		if origin.origin != "null" {
			state.origins.push(origin);
		}
		Ok(state)
	}
}

/// Re-runs `check` every [`POLL_INTERVAL`] until it yields `true`, giving up
/// at `timeout`. A check still pending at the deadline is abandoned.
async fn poll_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<bool>>,
{
	let deadline = Instant::now() + timeout;
	loop {
		let remaining = deadline.saturating_duration_since(Instant::now());
		match tokio::time::timeout(remaining, check()).await {
			Ok(Ok(true)) => return true,
			Ok(Ok(false)) | Err(_) => {}
			// The execution context is torn down while a page loads.
			Ok(Err(err)) => debug!(target = "pilot", error = %err, "visibility check failed"),
		}
		let now = Instant::now();
		if now >= deadline {
			return false;
		}
		tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
	}
}

fn convert_cookie(cookie: CdpCookie) -> Cookie {
	let same_site = cookie.same_site.map(|s| match s {
		CookieSameSite::Strict => SameSite::Strict,
		CookieSameSite::Lax => SameSite::Lax,
		CookieSameSite::None => SameSite::None,
	});
	Cookie {
		name: cookie.name,
		value: cookie.value,
		domain: Some(cookie.domain),
		path: Some(cookie.path),
		// DevTools reports session cookies with a negative expiry.
		expires: (!cookie.session && cookie.expires >= 0.0).then_some(cookie.expires),
		http_only: Some(cookie.http_only),
		secure: Some(cookie.secure),
		same_site,
	}
}
