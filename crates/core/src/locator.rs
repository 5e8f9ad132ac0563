//! Element addressing for the inbox UI.

use std::fmt;

/// How an element on the inbox page is found.
///
/// The inbox marker is only reliably identified by its visible text, while every
/// other control has a stable CSS selector, so both forms are supported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
	/// CSS selector passed to `querySelector`/`querySelectorAll`.
	Css(String),
	/// Element whose text content contains the given string.
	Text(String),
}

impl Locator {
	pub fn css(selector: impl Into<String>) -> Self {
		Locator::Css(selector.into())
	}

	pub fn text(text: impl Into<String>) -> Self {
		Locator::Text(text.into())
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Locator::Css(selector) => f.write_str(selector),
			Locator::Text(text) => write!(f, "text={text}"),
		}
	}
}
