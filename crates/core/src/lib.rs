//! Session lifecycle and unread-conversation automation for a browser-driven
//! team inbox.
//!
//! The crate is browser-agnostic: everything drives an [`InboxPage`], which
//! the binary implements over Chromium and tests implement with
//! [`testing::MockPage`].
//!
//! Control flow at runtime:
//!
//! 1. [`SessionStore::bootstrap`] unpacks a shipped profile archive (hosted only).
//! 2. [`SessionAcquirer::acquire`] authenticates once.
//! 3. [`WorkPoller::run`] loops forever, handing each snapshot of unread
//!    conversations to the [`ConversationProcessor`].

pub mod error;
pub mod locator;
pub mod page;
pub mod poller;
pub mod processor;
pub mod session;
pub mod settings;
pub mod storage_state;
pub mod store;
pub mod testing;

pub use error::{Error, Result};
pub use locator::Locator;
pub use page::{InboxPage, WaitUntil};
pub use poller::{CycleOutcome, WorkPoller};
pub use processor::{BatchReport, ConversationProcessor};
pub use session::{AuthOutcome, AuthStatus, AuthStrategy, LoginConfirmation, SessionAcquirer};
pub use settings::{Credentials, Deployment, InboxSettings, InstallCommand, Paths, Settings};
pub use storage_state::{Cookie, LocalStorageEntry, OriginState, SameSite, StorageState};
pub use store::{ArchiveReport, RestoreOutcome, SessionStore};
