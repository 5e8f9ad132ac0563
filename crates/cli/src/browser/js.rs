//! JavaScript evaluated in the inbox page.
//!
//! Every user-supplied string is embedded as a JSON literal, never spliced
//! into the source as-is.

use std::time::Duration;

use pilot::Locator;

/// Attribute used to hand text-located elements back to the CSS engine.
pub const MATCH_ATTRIBUTE: &str = "data-inbox-pilot-match";

fn literal(value: &str) -> String {
	serde_json::Value::from(value).to_string()
}

/// Expression evaluating to an array of the elements `locator` matches.
///
/// Text locators match elements whose own text contains the value, after
/// whitespace normalisation, innermost elements only.
fn elements(locator: &Locator) -> String {
	match locator {
		Locator::Css(selector) => format!("Array.from(document.querySelectorAll({}))", literal(selector)),
		Locator::Text(text) => format!(
			r#"(() => {{
				const needle = {needle};
				const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
				const out = [];
				const walker = document.createTreeWalker(document.body || document.documentElement, NodeFilter.SHOW_ELEMENT);
				for (let el = walker.currentNode; el; el = walker.nextNode()) {{
					if (!(el instanceof Element) || !norm(el.textContent).includes(needle)) continue;
					const childMatches = Array.from(el.children).some((c) => norm(c.textContent).includes(needle));
					if (!childMatches) out.push(el);
				}}
				return out;
			}})()"#,
			needle = literal(text.trim()),
		),
	}
}

/// `true` once at least one match is rendered with a non-empty box.
pub fn is_visible(locator: &Locator) -> String {
	format!(
		"(() => {}.some((el) => el.getClientRects().length > 0 && getComputedStyle(el).visibility !== 'hidden'))()",
		elements(locator)
	)
}

/// Tags every match with [`MATCH_ATTRIBUTE`]`=token` and returns the count.
pub fn tag_matches(locator: &Locator, token: &str) -> String {
	format!(
		r#"(() => {{
			const attr = {attr};
			document.querySelectorAll('[' + attr + ']').forEach((el) => el.removeAttribute(attr));
			const found = {elements};
			found.forEach((el) => el.setAttribute(attr, {token}));
			return found.length;
		}})()"#,
		attr = literal(MATCH_ATTRIBUTE),
		elements = elements(locator),
		token = literal(token),
	)
}

/// CSS selector for elements tagged by [`tag_matches`].
pub fn tagged_selector(token: &str) -> String {
	format!("[{MATCH_ATTRIBUTE}={}]", literal(token))
}

/// Sets an `<input name=field>` value through the native setter and fires a
/// bubbling `input` event, so framework-managed inputs see the change.
/// Evaluates to `false` when no such input exists.
pub fn fill_and_notify(field: &str, value: &str) -> String {
	format!(
		r#"(() => {{
			const input = Array.from(document.getElementsByName({field})).find((el) => el instanceof HTMLInputElement);
			if (!input) return false;
			const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set;
			setter.call(input, {value});
			input.dispatchEvent(new Event('input', {{ bubbles: true }}));
			return true;
		}})()"#,
		field = literal(field),
		value = literal(value),
	)
}

/// Snapshot of the current origin's localStorage as `{ origin, localStorage: [{ name, value }] }`.
pub const LOCAL_STORAGE_SNAPSHOT: &str = r#"(() => {
	const entries = [];
	try {
		for (let i = 0; i < localStorage.length; i++) {
			const name = localStorage.key(i);
			entries.push({ name, value: localStorage.getItem(name) ?? '' });
		}
	} catch (_) {}
	return { origin: location.origin, localStorage: entries };
})()"#;

/// Resolves once `document.readyState` is complete and the resource-timing
/// count has been stable for one second, or after `timeout`.
pub fn network_idle(timeout: Duration) -> String {
	let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
	format!(
		r#"(async () => {{
			const timeoutMs = {timeout_ms};
			const idleMs = 1000;
			const interval = 250;
			const start = Date.now();
			const count = () => {{ try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return 0; }} }};
			let last = count();
			let stable = 0;
			while (Date.now() - start < timeoutMs) {{
				await new Promise((r) => setTimeout(r, interval));
				const cur = count();
				if (document.readyState === 'complete' && cur === last) {{
					stable += interval;
					if (stable >= idleMs) return true;
				}} else {{
					stable = 0;
				}}
				last = cur;
			}}
			return false;
		}})()"#
	)
}
