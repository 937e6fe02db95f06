//! Top-level facade tying the session and services together.

use std::collections::HashSet;
use std::sync::Arc;

use crate::api::error::Result;
use crate::auth::{AuthSession, CallbackHandle, Token};
use crate::config::ClientConfig;
use crate::services::{AccountService, CatalogService, LockService};

/// A connected view of one LockCloud account.
///
/// Construction validates the credential invariant but performs no
/// network traffic; call [`login`](Self::login) to establish the
/// session. When the account demands a second factor, `login` returns
/// `ApiError::TwoFactorRequired` and the caller should collect a code
/// and call [`login_with_2fa`](Self::login_with_2fa).
pub struct Client {
    session: Arc<AuthSession>,
    catalog: Arc<CatalogService>,
    locks: LockService,
    account: AccountService,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client from a username/password pair, a previously
    /// issued token, or both (the token is adopted, the credentials
    /// kept for a potential second-factor exchange).
    pub fn new(
        config: ClientConfig,
        username: Option<String>,
        password: Option<String>,
        token: Option<Token>,
    ) -> Result<Self> {
        let session = Arc::new(AuthSession::new(config, username, password, token)?);
        let catalog = Arc::new(CatalogService::new(session.clone()));
        let locks = LockService::new(session.clone(), catalog.clone());
        let account = AccountService::new(session.clone());
        Ok(Self {
            session,
            catalog,
            locks,
            account,
        })
    }

    /// Establish the session: adopt-and-refresh an existing token, or
    /// perform a direct credential login.
    pub async fn login(&self) -> Result<Token> {
        self.session.login().await
    }

    /// Complete a pending two-factor challenge.
    pub async fn login_with_2fa(&self, verification_code: &str) -> Result<Token> {
        self.session.complete_two_factor(verification_code).await
    }

    /// Check whether a username/password pair can authenticate.
    pub async fn valid_login(
        config: ClientConfig,
        username: &str,
        password: &str,
    ) -> Result<bool> {
        let client = Client::new(
            config,
            Some(username.to_string()),
            Some(password.to_string()),
            None,
        )?;
        client.login().await?;
        Ok(!client.session.should_refresh().await)
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn locks(&self) -> &LockService {
        &self.locks
    }

    pub fn account(&self) -> &AccountService {
        &self.account
    }

    /// Register an observer invoked with a snapshot of the token after
    /// every login, two-factor completion, or refresh. This is the
    /// persistence hook: the library itself writes nothing to disk.
    pub async fn on_token_change<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(Token) -> futures::future::BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.session.on_token_change(callback).await
    }

    pub async fn remove_token_change(&self, handle: CallbackHandle) -> bool {
        self.session.remove_token_change(handle).await
    }

    /// Every device id known to the backend for this account.
    pub async fn unique_device_ids(&self) -> Result<HashSet<String>> {
        let devices = self.catalog.devices().await?;
        // Group records travel in the catalog without an identifier.
        Ok(devices
            .into_iter()
            .map(|d| d.mac)
            .filter(|mac| !mac.is_empty())
            .collect())
    }

    pub async fn notifications_enabled(&self) -> Result<bool> {
        self.account.notifications_enabled().await
    }

    pub async fn enable_notifications(&self) -> Result<()> {
        self.account.set_push_info(true).await
    }

    pub async fn disable_notifications(&self) -> Result<()> {
        self.account.set_push_info(false).await
    }
}
