use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long an access token is trusted before a refresh is forced.
/// The backend honors tokens for 216,000 seconds (60 hours); 48 hours
/// is a comfortable refresh interval inside that window.
pub const REFRESH_INTERVAL_SECS: i64 = 172_800;

/// A live access credential plus its expiry bookkeeping.
///
/// The owning session mutates the token in place on refresh rather
/// than replacing it, so every registered token-change observer sees
/// the renewal without re-fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    access_token: String,
    refresh_token: Option<String>,
    refresh_at: DateTime<Utc>,
    /// Account identifier, when the login response carries one
    pub user_id: Option<String>,
    /// Extra headers tied to this credential, sent on every signed call
    pub headers: Option<HashMap<String, String>>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            refresh_at: Utc::now() + Duration::seconds(REFRESH_INTERVAL_SECS),
            user_id: None,
            headers: None,
        }
    }

    /// Build a token with an explicit refresh deadline, for callers
    /// restoring a persisted session. A deadline in the past triggers
    /// one refresh before the session is usable.
    pub fn with_refresh_at(access_token: impl Into<String>, refresh_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            refresh_at,
            user_id: None,
            headers: None,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn refresh_at(&self) -> DateTime<Utc> {
        self.refresh_at
    }

    /// Install a new access credential. Always resets the refresh
    /// deadline to now + the fixed interval, regardless of the prior
    /// deadline.
    pub fn set_access_token(&mut self, access_token: impl Into<String>) {
        self.access_token = access_token.into();
        self.refresh_at = Utc::now() + Duration::seconds(REFRESH_INTERVAL_SECS);
    }

    pub fn set_refresh_token(&mut self, refresh_token: impl Into<String>) {
        self.refresh_token = Some(refresh_token.into());
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.refresh_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_not_expired() {
        let token = Token::new("abc");
        assert!(!token.is_expired());
        assert_eq!(token.access_token(), "abc");
        assert!(token.refresh_token().is_none());
    }

    #[test]
    fn test_set_access_token_resets_refresh_deadline() {
        let past = Utc::now() - Duration::seconds(10);
        let mut token = Token::with_refresh_at("old", past);
        assert!(token.is_expired());

        token.set_access_token("new");

        assert!(!token.is_expired());
        assert_eq!(token.access_token(), "new");
        // The deadline landed within a second of now + the fixed interval.
        let expected = Utc::now() + Duration::seconds(REFRESH_INTERVAL_SECS);
        let drift = (expected - token.refresh_at()).num_seconds().abs();
        assert!(drift <= 1, "refresh deadline drifted by {}s", drift);
    }

    #[test]
    fn test_explicit_refresh_deadline_in_future() {
        let later = Utc::now() + Duration::seconds(60);
        let token = Token::with_refresh_at("abc", later);
        assert!(!token.is_expired());
    }
}
