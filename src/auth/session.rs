//! Authenticated session management: login, two-factor completion,
//! token refresh, and the signed HTTP verbs every service uses.
//!
//! The session owns the credentials and the current [`Token`]. The
//! token is renewed in place under a write lock, and a dedicated
//! refresh mutex serializes concurrent refresh attempts: when many
//! callers observe an expired token at once, exactly one network
//! refresh happens (double-checked locking), and the rest proceed with
//! the renewed credential.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::api::classify::check_standard;
use crate::api::error::{ApiError, Result};
use crate::auth::token::Token;
use crate::config::{
    ClientConfig, API_KEY, APP_ID, APP_INFO, APP_NAME, APP_VER, APP_VERSION, PHONE_ID,
    PHONE_SYSTEM_TYPE, SC, SV, UNIQUE_ID,
};
use crate::crypto::{app_signature, md5_hex, SigningPayload};

/// Payload/header fields whose values never appear in logs
const SANITIZE_FIELDS: &[&str] = &[
    "username",
    "password",
    "access_token",
    "refresh_token",
    "accessToken",
];
const SANITIZE_STRING: &str = "**sanitized**";

/// Async token-change observer. All observers are awaited in
/// registration order whenever login, two-factor completion, or
/// refresh installs or mutates the token.
pub type TokenCallback = Arc<dyn Fn(Token) -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque handle for deregistering a token-change observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TwoFactorKind {
    Totp,
    Sms,
}

#[derive(Debug, Clone)]
struct TwoFactorContext {
    kind: TwoFactorKind,
    verification_id: String,
}

pub struct AuthSession {
    http: reqwest::Client,
    config: ClientConfig,
    username: Option<String>,
    password: Option<String>,
    token: RwLock<Option<Token>>,
    /// Serializes concurrent refresh attempts (see `refresh_if_needed`)
    refresh_lock: Mutex<()>,
    two_factor: RwLock<Option<TwoFactorContext>>,
    callbacks: RwLock<Vec<(CallbackHandle, TokenCallback)>>,
    next_handle: AtomicU64,
}

impl AuthSession {
    /// Create a session from either a username/password pair or a
    /// previously issued token. Anything less is rejected up front.
    pub fn new(
        config: ClientConfig,
        username: Option<String>,
        password: Option<String>,
        token: Option<Token>,
    ) -> Result<Self> {
        let have_credentials = matches!(
            (&username, &password),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        );
        if token.is_none() && !have_credentials {
            return Err(ApiError::MissingCredentials);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            username,
            password,
            token: RwLock::new(token),
            refresh_lock: Mutex::new(()),
            two_factor: RwLock::new(None),
            callbacks: RwLock::new(Vec::new()),
            next_handle: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ===== Login =====

    /// Establish the session. An adopted token is refreshed first if
    /// its deadline has passed; otherwise a direct credential login is
    /// performed.
    ///
    /// Returns `ApiError::TwoFactorRequired` when the account demands a
    /// second factor; the caller should prompt for a code and call
    /// [`complete_two_factor`](Self::complete_two_factor).
    pub async fn login(&self) -> Result<Token> {
        let adopted = self.token.read().await.is_some();
        if adopted {
            self.refresh_if_needed().await?;
            return self.current_token().await;
        }
        self.login_with_password().await
    }

    async fn login_with_password(&self) -> Result<Token> {
        let (username, password) = match (&self.username, &self.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => return Err(ApiError::MissingCredentials),
        };

        let url = format!("{}/user/login", self.config.api_base_url);
        let payload = json!({
            "loginType": 1,
            "password": md5_hex(&password),
            "platId": 2,
            "uniqueid": UNIQUE_ID,
            "username": username,
        });

        let response = self
            .post_json(&url, Some(Self::login_headers()), &payload)
            .await?;

        if let Some(context) = Self::two_factor_challenge(&response) {
            debug!("login answered with a second-factor challenge");
            *self.two_factor.write().await = Some(context);
            return Err(ApiError::TwoFactorRequired);
        }

        if response.get("errorCode").is_some_and(|v| !v.is_null()) {
            error!(response = %response, "login rejected");
            return Err(ApiError::UnknownApi(response));
        }

        let access_token = response
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnknownApi(response.clone()))?;

        let mut token = Token::new(access_token);
        if let Some(refresh) = response.get("refreshToken").and_then(Value::as_str) {
            token.set_refresh_token(refresh);
        }
        token.user_id = response
            .get("userId")
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()));

        self.install_token(token.clone()).await;
        Ok(token)
    }

    /// Submit the stored verification context plus the user's code.
    pub async fn complete_two_factor(&self, verification_code: &str) -> Result<Token> {
        let context = self
            .two_factor
            .read()
            .await
            .clone()
            .ok_or(ApiError::NoPendingTwoFactor)?;
        let (username, password) = match (&self.username, &self.password) {
            (Some(u), Some(p)) => (u.clone(), p.clone()),
            _ => return Err(ApiError::MissingCredentials),
        };

        let mfa_type = match context.kind {
            TwoFactorKind::Totp => "TotpVerificationCode",
            TwoFactorKind::Sms => "PrimaryPhone",
        };
        let payload = json!({
            "email": username,
            "password": password,
            "mfa_type": mfa_type,
            "verification_id": context.verification_id,
            "verification_code": verification_code,
        });

        let url = format!("{}/user/login", self.config.auth_base_url);
        let response = self
            .post_json(&url, Some(Self::login_headers()), &payload)
            .await?;

        let access_token = response
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnknownApi(response.clone()))?;
        let mut token = Token::new(access_token);
        if let Some(refresh) = response.get("refresh_token").and_then(Value::as_str) {
            token.set_refresh_token(refresh);
        }

        *self.two_factor.write().await = None;
        self.install_token(token.clone()).await;
        Ok(token)
    }

    fn two_factor_challenge(response: &Value) -> Option<TwoFactorContext> {
        let options = response.get("mfa_options")?;
        if options.is_null() {
            return None;
        }
        if let Some(id) = response
            .pointer("/mfa_details/totp_verification_id")
            .and_then(Value::as_str)
        {
            return Some(TwoFactorContext {
                kind: TwoFactorKind::Totp,
                verification_id: id.to_string(),
            });
        }
        let session_id = response.get("sms_session_id").and_then(Value::as_str)?;
        Some(TwoFactorContext {
            kind: TwoFactorKind::Sms,
            verification_id: session_id.to_string(),
        })
    }

    // ===== Refresh =====

    /// True once the token's refresh deadline has passed. False when no
    /// token is held yet.
    pub async fn should_refresh(&self) -> bool {
        self.token
            .read()
            .await
            .as_ref()
            .map(Token::is_expired)
            .unwrap_or(false)
    }

    /// Refresh the token if its deadline has passed. The predicate is
    /// re-checked inside the lock so that N concurrent callers
    /// observing an expired token produce exactly one refresh call.
    pub async fn refresh_if_needed(&self) -> Result<()> {
        if self.should_refresh().await {
            let _guard = self.refresh_lock.lock().await;
            if self.should_refresh().await {
                debug!("token past its refresh deadline, refreshing");
                self.refresh().await?;
            }
        }
        Ok(())
    }

    /// Exchange the refresh credential for a new access token, mutating
    /// the held token in place and notifying observers.
    pub async fn refresh(&self) -> Result<()> {
        let refresh_token = self
            .token
            .read()
            .await
            .as_ref()
            .and_then(|t| t.refresh_token().map(str::to_string));
        let Some(refresh_token) = refresh_token else {
            warn!("no refresh credential held, cannot refresh");
            return Err(ApiError::AccessToken);
        };

        let payload = json!({
            "phone_id": PHONE_ID,
            "app_name": APP_NAME,
            "app_version": APP_VERSION,
            "sc": SC,
            "sv": SV,
            "phone_system_type": PHONE_SYSTEM_TYPE,
            "app_ver": APP_VER,
            "ts": Utc::now().timestamp(),
            "refresh_token": refresh_token,
        });
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static(API_KEY));

        let url = format!("{}/app/user/refresh_token", self.config.device_api_base_url);
        let response = self.post_json(&url, Some(headers), &payload).await?;
        check_standard(&response)?;

        let access = response
            .pointer("/data/access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnknownApi(response.clone()))?;
        let refresh = response
            .pointer("/data/refresh_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnknownApi(response.clone()))?;

        {
            let mut guard = self.token.write().await;
            let token = guard.as_mut().ok_or(ApiError::AccessToken)?;
            token.set_access_token(access);
            token.set_refresh_token(refresh);
        }

        self.notify_token_changed().await;
        Ok(())
    }

    // ===== Token access and observers =====

    pub async fn current_token(&self) -> Result<Token> {
        self.token.read().await.clone().ok_or(ApiError::AccessToken)
    }

    pub async fn access_token(&self) -> Result<String> {
        Ok(self.current_token().await?.access_token().to_string())
    }

    async fn install_token(&self, token: Token) {
        *self.token.write().await = Some(token);
        self.notify_token_changed().await;
    }

    /// Register an observer called with a snapshot of the token after
    /// every install or renewal. Observers run in registration order
    /// and each is awaited before the next.
    pub async fn on_token_change<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(Token) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let handle = CallbackHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().await.push((handle, Arc::new(callback)));
        handle
    }

    /// Deregister an observer. Returns false when the handle is unknown.
    pub async fn remove_token_change(&self, handle: CallbackHandle) -> bool {
        let mut callbacks = self.callbacks.write().await;
        let before = callbacks.len();
        callbacks.retain(|(h, _)| *h != handle);
        callbacks.len() != before
    }

    async fn notify_token_changed(&self) {
        let token = match self.token.read().await.clone() {
            Some(token) => token,
            None => return,
        };
        let callbacks: Vec<TokenCallback> = self
            .callbacks
            .read()
            .await
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(token.clone()).await;
        }
    }

    // ===== Header builders =====

    fn login_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("phone-id", HeaderValue::from_static(PHONE_ID));
        headers.insert(USER_AGENT, HeaderValue::from_static(APP_INFO));
        headers.insert("x-api-key", HeaderValue::from_static(API_KEY));
        headers
    }

    /// Bearer headers for the lock/gateway API family.
    pub async fn bearer_headers(&self) -> Result<HeaderMap> {
        let token = self.current_token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.access_token()))?,
        );
        Self::merge_token_headers(&mut headers, &token)?;
        Ok(headers)
    }

    /// Scheme-A signed header bundle for device-cloud endpoints: the
    /// payload digest travels in `signature2` alongside the app
    /// identity.
    pub async fn signed_headers(&self, payload: &BTreeMap<String, String>) -> Result<HeaderMap> {
        let token = self.current_token().await?;
        let signature = app_signature(SigningPayload::Fields(payload), token.access_token());

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(APP_INFO));
        headers.insert("appid", HeaderValue::from_static(APP_ID));
        headers.insert("appinfo", HeaderValue::from_static(APP_INFO));
        headers.insert("phoneid", HeaderValue::from_static(PHONE_ID));
        headers.insert("access_token", HeaderValue::from_str(token.access_token())?);
        headers.insert("signature2", HeaderValue::from_str(&signature)?);
        Self::merge_token_headers(&mut headers, &token)?;
        Ok(headers)
    }

    fn merge_token_headers(headers: &mut HeaderMap, token: &Token) -> Result<()> {
        if let Some(extra) = &token.headers {
            for (name, value) in extra {
                headers.insert(
                    HeaderName::from_bytes(name.as_bytes())?,
                    HeaderValue::from_str(value)?,
                );
            }
        }
        Ok(())
    }

    // ===== Low-level verbs =====
    //
    // Every service goes through these. The body is decoded as JSON;
    // a decode failure on a delivered response is logged and yields
    // null rather than an error.

    pub async fn post_json(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        body: &Value,
    ) -> Result<Value> {
        debug!(url, body = %sanitize(body), "POST");
        let mut request = self.http.post(url);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        let response = request.json(body).send().await?;
        self.decode(url, response).await
    }

    pub async fn post_form(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        form: &BTreeMap<String, String>,
    ) -> Result<Value> {
        debug!(url, "POST (form)");
        let mut request = self.http.post(url);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        let response = request.form(form).send().await?;
        self.decode(url, response).await
    }

    pub async fn get(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        query: Option<&BTreeMap<String, String>>,
    ) -> Result<Value> {
        debug!(url, "GET");
        let mut request = self.http.get(url);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.send().await?;
        self.decode(url, response).await
    }

    pub async fn patch(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        query: Option<&BTreeMap<String, String>>,
        body: &Value,
    ) -> Result<Value> {
        debug!(url, body = %sanitize(body), "PATCH");
        let mut request = self.http.patch(url);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        if let Some(query) = query {
            request = request.query(query);
        }
        let response = request.json(body).send().await?;
        self.decode(url, response).await
    }

    pub async fn delete(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        body: &Value,
    ) -> Result<Value> {
        debug!(url, body = %sanitize(body), "DELETE");
        let mut request = self.http.delete(url);
        if let Some(headers) = headers {
            request = request.headers(headers);
        }
        let response = request.json(body).send().await?;
        self.decode(url, response).await
    }

    async fn decode(&self, url: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(url, %status, %err, "response body was not JSON, continuing with null");
                Ok(Value::Null)
            }
        }
    }
}

/// Copy of a payload with credential fields blanked, for debug logs
fn sanitize(value: &Value) -> Value {
    let mut copy = value.clone();
    if let Some(object) = copy.as_object_mut() {
        for field in SANITIZE_FIELDS {
            if object.contains_key(*field) {
                object.insert(field.to_string(), Value::String(SANITIZE_STRING.into()));
            }
        }
    }
    copy
}
