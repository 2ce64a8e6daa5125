//! Google Calendar session, token storage and event fetching.
//!
//! - [`google::SessionManager`] - OAuth sign-in, restore, refresh and sign-out
//! - [`google::CalendarFetcher`] - one list-events call for a time window
//! - [`google::CalendarService`] - today's events as an [`EventSource`]
//! - [`TokenStore`] - keychain, file and in-memory token persistence
//!
//! ```text
//! ┌───────────────┐   tokens   ┌────────────────┐
//! │  TokenStore   │◄──────────►│ SessionManager │
//! └───────────────┘            └───────┬────────┘
//!                                      │ valid_access_token()
//!                                      ▼
//!                              ┌────────────────┐    GET events
//!                              │CalendarService │───────────────► Google
//!                              └───────┬────────┘
//!                                      │ EventSource
//!                                      ▼
//!                              Vec<CalendarEvent>
//! ```

pub mod error;
pub mod google;
pub mod source;
pub mod store;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use source::{BoxFuture, EventSource, StaticSource};
#[cfg(feature = "keychain")]
pub use store::KeyringTokenStore;
pub use store::{DEFAULT_SERVICE, FileTokenStore, MemoryTokenStore, StoreError, TokenKind, TokenStore};
