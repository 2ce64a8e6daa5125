//! The signed-in Google session and its lifecycle.
//!
//! [`SessionManager`] owns the in-memory session and mirrors the tokens into
//! a [`TokenStore`] so the next launch can restore them:
//!
//! ```text
//! SignedOut --sign_in--> SignedIn --(expiry - now <= 5 min)--> Expiring
//!     ^                     ^                                     |
//!     |                     +-------------refresh ok-------------+
//!     +--------sign_out / refresh rejected (valid_access_token)--+
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::store::{TokenKind, TokenStore};

use super::callback::CallbackServer;
use super::config::GoogleConfig;
use super::oauth::{OAuthClient, TokenGrant};

/// An access token within this margin of its expiry is refreshed.
pub const REFRESH_MARGIN: Duration = Duration::minutes(5);

/// Tokens and profile of the signed-in account.
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    /// Absent only when the provider never issued one.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub email: Option<String>,
}

impl Session {
    /// True when `expires_at - now <= 5 minutes`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= REFRESH_MARGIN
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("email", &self.email)
            .finish()
    }
}

/// A secret-free view of the session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub email: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl AuthState {
    pub fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            email: None,
            token_expires_at: None,
        }
    }

    /// A missing expiry counts as expired.
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_none_or(|expires_at| now >= expires_at)
    }
}

/// Opens the consent page for the user.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> ProviderResult<()>;
}

/// Opens URLs in the system default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> ProviderResult<()> {
        open::that(url).map_err(|e| {
            ProviderError::internal(format!("failed to open browser: {}", e)).with_source(e)
        })
    }
}

/// Drives sign-in, restore, refresh and sign-out for one Google account.
pub struct SessionManager {
    config: GoogleConfig,
    oauth: OAuthClient,
    store: Arc<dyn TokenStore>,
    opener: Arc<dyn UrlOpener>,
    session: RwLock<Option<Session>>,
    sign_in_guard: Mutex<()>,
    refresh_guard: Mutex<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(config: GoogleConfig, store: Arc<dyn TokenStore>) -> ProviderResult<Self> {
        let oauth = OAuthClient::new(&config)?;
        Ok(Self {
            config,
            oauth,
            store,
            opener: Arc::new(SystemOpener),
            session: RwLock::new(None),
            sign_in_guard: Mutex::new(()),
            refresh_guard: Mutex::new(()),
        })
    }

    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// A copy of the current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn auth_state(&self) -> AuthState {
        match self.session() {
            Some(session) => AuthState {
                is_authenticated: true,
                email: session.email,
                token_expires_at: Some(session.expires_at),
            },
            None => AuthState::signed_out(),
        }
    }

    /// Loads stored tokens and validates them with an eager refresh.
    ///
    /// Returns `Ok(false)` when there is nothing to restore or the provider
    /// rejected the stored refresh token; in the latter case the store is
    /// wiped. A transient failure keeps the session so the next refresh can
    /// retry.
    pub async fn restore_session(&self) -> ProviderResult<bool> {
        let access_token = self.store.retrieve(TokenKind::AccessToken)?;
        let refresh_token = self.store.retrieve(TokenKind::RefreshToken)?;
        let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
            debug!("no stored session");
            return Ok(false);
        };
        let email = self.store.retrieve(TokenKind::UserEmail)?;

        // Expiry is not persisted, so the restored token is treated as stale.
        let now = Utc::now();
        self.install(Session {
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: now - Duration::seconds(1),
            email,
        });

        match self.refresh_access_token_if_needed_at(now).await {
            Ok(_) => {
                info!("restored session");
                Ok(true)
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "could not validate restored session, keeping it");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "stored session is no longer valid");
                self.sign_out()?;
                Ok(false)
            }
        }
    }

    /// Runs the browser authorization-code flow.
    ///
    /// Only one sign-in may run at a time; a concurrent call fails at once.
    /// On success every stored entry is replaced by the new grant.
    pub async fn sign_in(&self) -> ProviderResult<AuthState> {
        let _guard = self
            .sign_in_guard
            .try_lock()
            .map_err(|_| ProviderError::authentication("sign-in already in progress"))?;

        let server =
            CallbackServer::bind(self.config.callback_port, self.config.callback_path.clone())
                .await?;
        let redirect_uri = self.config.redirect_uri(server.local_addr()?.port());
        let state = OAuthClient::generate_state();
        let url = self.oauth.authorization_url(&redirect_uri, &state)?;

        info!(%redirect_uri, "waiting for Google sign-in in the browser");
        if let Err(e) = self.opener.open(&url) {
            warn!(error = %e, %url, "could not open the browser, open the URL manually");
        }

        let code = server.wait(&state, self.config.callback_timeout).await?;
        let grant = self.oauth.exchange_code(&code, &redirect_uri).await?;
        if grant.refresh_token.is_none() {
            warn!("token response carried no refresh token");
        }

        let email = match self.oauth.fetch_email(&grant.access_token).await {
            Ok(email) => Some(email),
            Err(e) => {
                debug!(error = %e, "could not fetch account email");
                None
            }
        };

        // Nothing from a previous account may outlive the new grant.
        self.store.delete_all()?;
        self.persist(&grant, email.as_deref())?;
        self.install(Session {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.clone(),
            expires_at: grant.expires_at(Utc::now()),
            email,
        });

        let state = self.auth_state();
        info!(email = ?state.email, "signed in");
        Ok(state)
    }

    /// Refreshes the access token when it is within five minutes of expiry.
    pub async fn refresh_access_token_if_needed(&self) -> ProviderResult<bool> {
        self.refresh_access_token_if_needed_at(Utc::now()).await
    }

    /// Same as [`Self::refresh_access_token_if_needed`] against an explicit
    /// clock. Returns whether a refresh happened.
    ///
    /// A rejected refresh leaves the session as it was.
    pub async fn refresh_access_token_if_needed_at(&self, now: DateTime<Utc>) -> ProviderResult<bool> {
        let _guard = self.refresh_guard.lock().await;

        let Some(session) = self.session() else {
            return Err(ProviderError::authentication("not signed in"));
        };
        if !session.needs_refresh(now) {
            return Ok(false);
        }
        let Some(refresh_token) = session.refresh_token else {
            return Err(ProviderError::authentication("no refresh token available"));
        };

        let grant = self.oauth.refresh(&refresh_token).await?;

        {
            let mut slot = self.session.write().unwrap_or_else(PoisonError::into_inner);
            let Some(current) = slot.as_mut() else {
                debug!("signed out during refresh, discarding new token");
                return Err(ProviderError::authentication("not signed in"));
            };
            current.access_token = grant.access_token.clone();
            current.expires_at = grant.expires_at(now);
            if let Some(ref rotated) = grant.refresh_token {
                current.refresh_token = Some(rotated.clone());
            }
        }
        self.persist(&grant, None)?;

        debug!(expires_in = ?grant.expires_in, "access token refreshed");
        Ok(true)
    }

    /// A usable access token, refreshed if needed.
    ///
    /// Signs out when the provider rejects the refresh token.
    pub async fn valid_access_token(&self) -> ProviderResult<String> {
        if let Err(e) = self.refresh_access_token_if_needed().await {
            if e.is_authentication() && self.is_signed_in() {
                warn!(error = %e, "refresh rejected, signing out");
                self.sign_out()?;
            }
            return Err(e);
        }
        self.session()
            .map(|s| s.access_token)
            .ok_or_else(|| ProviderError::authentication("not signed in"))
    }

    /// Forgets the session and every stored token. Idempotent.
    pub fn sign_out(&self) -> ProviderResult<()> {
        let had_session = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        self.store.delete_all()?;
        if had_session {
            info!("signed out");
        }
        Ok(())
    }

    fn install(&self, session: Session) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    fn persist(&self, grant: &TokenGrant, email: Option<&str>) -> ProviderResult<()> {
        self.store.save(TokenKind::AccessToken, &grant.access_token)?;
        if let Some(ref refresh_token) = grant.refresh_token {
            self.store.save(TokenKind::RefreshToken, refresh_token)?;
        }
        if let Some(email) = email {
            self.store.save(TokenKind::UserEmail, email)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorCode;
    use crate::google::OAuthCredentials;
    use crate::store::MemoryTokenStore;
    use chrono::TimeZone;
    use mockito::Matcher;
    use std::collections::HashMap;
    use std::time::Duration as StdDuration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use url::Url;

    fn config(base: &str) -> GoogleConfig {
        GoogleConfig::new(OAuthCredentials::new("c.apps.googleusercontent.com", "shh"))
            .with_base_url(base)
            .with_callback_port(0)
            .with_callback_timeout(StdDuration::from_secs(5))
    }

    fn manager(base: &str) -> (SessionManager, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(config(base), store.clone()).unwrap();
        (manager, store)
    }

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            access_token: "ya29.old".to_string(),
            refresh_token: Some("1//r".to_string()),
            expires_at,
            email: Some("me@example.com".to_string()),
        }
    }

    fn seed(store: &MemoryTokenStore) {
        store.save(TokenKind::AccessToken, "ya29.stored").unwrap();
        store.save(TokenKind::RefreshToken, "1//stored").unwrap();
        store.save(TokenKind::UserEmail, "me@example.com").unwrap();
    }

    /// Follows the consent URL the way a browser would after approval.
    struct ApprovingBrowser;

    impl UrlOpener for ApprovingBrowser {
        fn open(&self, url: &str) -> ProviderResult<()> {
            let params: HashMap<String, String> =
                Url::parse(url).unwrap().query_pairs().into_owned().collect();
            let redirect = Url::parse(&params["redirect_uri"]).unwrap();
            let port = redirect.port().unwrap();
            let request = format!(
                "GET {}?code=4%2Fcode&state={} HTTP/1.1\r\nHost: localhost\r\n\r\n",
                redirect.path(),
                params["state"]
            );
            tokio::spawn(async move {
                let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut page = Vec::new();
                let _ = stream.read_to_end(&mut page).await;
            });
            Ok(())
        }
    }

    /// A browser the user never finishes.
    struct IdleBrowser;

    impl UrlOpener for IdleBrowser {
        fn open(&self, _url: &str) -> ProviderResult<()> {
            Ok(())
        }
    }

    #[test]
    fn refresh_margin_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap();
        assert!(session(now + Duration::minutes(5)).needs_refresh(now));
        assert!(session(now + Duration::seconds(299)).needs_refresh(now));
        assert!(!session(now + Duration::seconds(301)).needs_refresh(now));
        assert!(session(now - Duration::hours(1)).needs_refresh(now));
    }

    #[test]
    fn session_debug_redacts_tokens() {
        let debug = format!("{:?}", session(Utc::now()));
        assert!(!debug.contains("ya29"));
        assert!(!debug.contains("1//r"));
    }

    #[test]
    fn auth_state_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap();
        assert!(AuthState::signed_out().is_token_expired(now));
        let state = AuthState {
            is_authenticated: true,
            email: None,
            token_expires_at: Some(now + Duration::minutes(1)),
        };
        assert!(!state.is_token_expired(now));
        assert!(state.is_token_expired(now + Duration::minutes(1)));
    }

    #[tokio::test]
    async fn restore_without_tokens() {
        let (manager, _) = manager("http://127.0.0.1:1");
        assert!(!manager.restore_session().await.unwrap());
        assert!(!manager.auth_state().is_authenticated);
    }

    #[tokio::test]
    async fn restore_refreshes_stored_tokens() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "1//stored".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.fresh","expires_in":3600}"#)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        seed(&store);

        assert!(manager.restore_session().await.unwrap());
        mock.assert_async().await;

        let session = manager.session().unwrap();
        assert_eq!(session.access_token, "ya29.fresh");
        assert_eq!(session.refresh_token.as_deref(), Some("1//stored"));
        assert_eq!(session.email.as_deref(), Some("me@example.com"));
        assert_eq!(
            store.retrieve(TokenKind::AccessToken).unwrap().as_deref(),
            Some("ya29.fresh")
        );
        assert!(!manager.auth_state().is_token_expired(Utc::now()));
    }

    #[tokio::test]
    async fn restore_with_revoked_token_clears_store() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        seed(&store);

        assert!(!manager.restore_session().await.unwrap());
        assert!(!manager.is_signed_in());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn restore_keeps_session_when_offline() {
        let (manager, store) = manager("http://127.0.0.1:1");
        seed(&store);

        assert!(manager.restore_session().await.unwrap());
        assert_eq!(manager.session().unwrap().access_token, "ya29.stored");
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn refresh_is_skipped_while_token_is_fresh() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/token").expect(0).create_async().await;

        let (manager, _) = manager(&server.url());
        let now = Utc::now();
        manager.install(session(now + Duration::minutes(30)));

        assert!(!manager.refresh_access_token_if_needed_at(now).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_persists_rotated_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.new","refresh_token":"1//rotated","expires_in":3599}"#)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        let now = Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap();
        manager.install(session(now + Duration::minutes(4)));

        assert!(manager.refresh_access_token_if_needed_at(now).await.unwrap());
        let session = manager.session().unwrap();
        assert_eq!(session.access_token, "ya29.new");
        assert_eq!(session.refresh_token.as_deref(), Some("1//rotated"));
        assert_eq!(session.expires_at, now + Duration::seconds(3599));
        assert_eq!(
            store.retrieve(TokenKind::RefreshToken).unwrap().as_deref(),
            Some("1//rotated")
        );
    }

    #[tokio::test]
    async fn rejected_refresh_leaves_session_untouched() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let (manager, _) = manager(&server.url());
        let now = Utc::now();
        manager.install(session(now));

        let err = manager.refresh_access_token_if_needed_at(now).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(manager.session().unwrap().access_token, "ya29.old");
    }

    #[tokio::test]
    async fn refresh_without_session_is_authentication_error() {
        let (manager, _) = manager("http://127.0.0.1:1");
        let err = manager.refresh_access_token_if_needed().await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn valid_access_token_signs_out_on_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        seed(&store);
        manager.install(session(Utc::now()));

        assert!(manager.valid_access_token().await.unwrap_err().is_authentication());
        assert!(!manager.is_signed_in());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn valid_access_token_returns_current_token() {
        let (manager, _) = manager("http://127.0.0.1:1");
        manager.install(session(Utc::now() + Duration::hours(1)));
        assert_eq!(manager.valid_access_token().await.unwrap(), "ya29.old");
    }

    #[test]
    fn sign_out_clears_every_entry() {
        let (manager, store) = manager("http://127.0.0.1:1");
        store.save(TokenKind::RefreshToken, "1//only").unwrap();

        manager.sign_out().unwrap();
        assert!(store.is_empty());
        manager.sign_out().unwrap();
    }

    #[tokio::test]
    async fn sign_in_exchanges_code_and_stores_tokens() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "4/code".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.a","refresh_token":"1//b","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/oauth2/v2/userinfo")
            .match_header("authorization", "Bearer ya29.a")
            .with_status(200)
            .with_body(r#"{"email":"me@example.com"}"#)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        let manager = manager.with_opener(Arc::new(ApprovingBrowser));

        let state = manager.sign_in().await.unwrap();
        token.assert_async().await;

        assert!(state.is_authenticated);
        assert_eq!(state.email.as_deref(), Some("me@example.com"));
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.retrieve(TokenKind::RefreshToken).unwrap().as_deref(),
            Some("1//b")
        );
    }

    #[tokio::test]
    async fn sign_in_tolerates_missing_profile() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.a","refresh_token":"1//b","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/oauth2/v2/userinfo")
            .with_status(500)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        let manager = manager.with_opener(Arc::new(ApprovingBrowser));

        let state = manager.sign_in().await.unwrap();
        assert!(state.is_authenticated);
        assert_eq!(state.email, None);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn sign_in_again_drops_previous_account() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.new","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/oauth2/v2/userinfo")
            .with_status(500)
            .create_async()
            .await;

        let (manager, store) = manager(&server.url());
        store.save(TokenKind::AccessToken, "ya29.alice").unwrap();
        store.save(TokenKind::RefreshToken, "1//alice").unwrap();
        store.save(TokenKind::UserEmail, "alice@example.com").unwrap();
        let manager = manager.with_opener(Arc::new(ApprovingBrowser));

        let state = manager.sign_in().await.unwrap();
        assert_eq!(state.email, None);
        assert_eq!(
            store.retrieve(TokenKind::AccessToken).unwrap().as_deref(),
            Some("ya29.new")
        );
        assert_eq!(store.retrieve(TokenKind::UserEmail).unwrap(), None);
        assert_eq!(store.retrieve(TokenKind::RefreshToken).unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn sign_in_times_out() {
        let store = Arc::new(MemoryTokenStore::new());
        let config = config("http://127.0.0.1:1").with_callback_timeout(StdDuration::from_millis(50));
        let manager = SessionManager::new(config, store)
            .unwrap()
            .with_opener(Arc::new(IdleBrowser));

        let err = manager.sign_in().await.unwrap_err();
        assert!(err.is_authentication());
        assert!(err.message().contains("timed out"));
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn concurrent_sign_in_is_rejected() {
        let (manager, _) = manager("http://127.0.0.1:1");
        let manager = Arc::new(manager.with_opener(Arc::new(IdleBrowser)));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.sign_in().await }
        });
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        let err = manager.sign_in().await.unwrap_err();
        assert!(err.message().contains("already in progress"));
        first.abort();
    }
}
