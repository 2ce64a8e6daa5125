//! Google Calendar access.
//!
//! # Authentication Flow
//!
//! 1. The user registers their own desktop OAuth client (ID and secret)
//! 2. [`SessionManager::sign_in`] listens on `localhost:51280`
//! 3. The browser opens Google's consent page with a random `state`
//! 4. Google redirects to `/callback?code=..&state=..`
//! 5. The code is exchanged for access and refresh tokens
//! 6. Tokens are saved in the [`TokenStore`](crate::TokenStore) and restored
//!    on the next launch
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use timedonut_providers::KeyringTokenStore;
//! use timedonut_providers::google::{CalendarService, GoogleConfig, OAuthCredentials, SessionManager};
//!
//! let config = GoogleConfig::new(OAuthCredentials::new(client_id, client_secret));
//! let session = Arc::new(SessionManager::new(config, Arc::new(KeyringTokenStore::default()))?);
//! if !session.restore_session().await? {
//!     session.sign_in().await?;
//! }
//! let events = CalendarService::new(session)?.fetch_today().await?;
//! ```

mod callback;
mod client;
mod config;
mod oauth;
mod service;
mod session;

pub use callback::CallbackServer;
pub use client::CalendarFetcher;
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{OAuthClient, TokenGrant};
pub use service::CalendarService;
pub use session::{AuthState, REFRESH_MARGIN, Session, SessionManager, SystemOpener, UrlOpener};
