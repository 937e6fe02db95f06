//! Account-level operations: push notification settings and the user
//! profile. Profile reads go through the Scheme-A signed header bundle.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::api::classify::{check_hms, check_standard};
use crate::api::error::Result;
use crate::auth::AuthSession;
use crate::config::{APP_NAME, APP_VER, APP_VERSION, PHONE_ID, PHONE_SYSTEM_TYPE, SC, SV};

pub struct AccountService {
    session: Arc<AuthSession>,
}

impl AccountService {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    /// Toggle push notifications for the account.
    pub async fn set_push_info(&self, on: bool) -> Result<()> {
        self.session.refresh_if_needed().await?;

        let url = format!(
            "{}/app/user/set_push_info",
            self.session.config().device_api_base_url
        );
        let payload = json!({
            "phone_system_type": PHONE_SYSTEM_TYPE,
            "app_version": APP_VERSION,
            "app_ver": APP_VER,
            "push_switch": if on { "1" } else { "2" },
            "sc": SC,
            "ts": Utc::now().timestamp(),
            "sv": SV,
            "access_token": self.session.access_token().await?,
            "phone_id": PHONE_ID,
            "app_name": APP_NAME,
        });

        let response = self.session.post_json(&url, None, &payload).await?;
        check_standard(&response)?;
        Ok(())
    }

    /// Fetch the account profile through the signed header bundle.
    pub async fn user_profile(&self) -> Result<Value> {
        self.session.refresh_if_needed().await?;

        let mut query = BTreeMap::new();
        query.insert("keys".to_string(), String::new());
        query.insert(
            "nonce".to_string(),
            Utc::now().timestamp_millis().to_string(),
        );

        let headers = self.session.signed_headers(&query).await?;
        let url = format!(
            "{}/app/v2/platform/get_user_profile",
            self.session.config().device_api_base_url
        );

        let response = self.session.get(&url, Some(headers), Some(&query)).await?;
        check_hms(&response)?;
        Ok(response)
    }

    /// True when the account has push notifications enabled.
    pub async fn notifications_enabled(&self) -> Result<bool> {
        let profile = self.user_profile().await?;
        let notification = profile.pointer("/data/notification");
        Ok(match notification {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        })
    }
}
