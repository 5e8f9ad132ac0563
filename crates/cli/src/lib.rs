//! Binary-side pieces of the inbox bot: argument parsing, the Chromium
//! driver, browser provisioning, the liveness endpoint and task supervision.

pub mod app;
pub mod browser;
pub mod cli;
pub mod confirm;
pub mod install;
pub mod liveness;
pub mod logging;
pub mod settings;
