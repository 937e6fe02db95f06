//! Lock control: list locks, refresh live status, lock and unlock.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::api::classify::{check_lock, check_standard};
use crate::api::error::{ApiError, Result};
use crate::auth::AuthSession;
use crate::config::CLIENT_ID;
use crate::crypto::lock_control_signature;
use crate::models::{Device, DeviceType};
use crate::services::catalog::CatalogService;

#[derive(Debug, Clone, Copy)]
enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    fn path(self) -> &'static str {
        match self {
            LockAction::Lock => "/v3/lock/lock",
            LockAction::Unlock => "/v3/lock/unlock",
        }
    }
}

/// Boolean-as-integer flags from the lock info response
fn flag_set(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

fn lock_id(device: &Device) -> Result<String> {
    match device.raw.get("lockId") {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ApiError::Parameter(json!({
            "error": "device record carries no lockId",
            "mac": device.mac,
        }))),
    }
}

/// Overwrite the normalized status flags from a lock info response,
/// folding the live fields into the retained raw map.
fn apply_lock_info(lock: &mut Device, response: &Value) {
    let info: Option<&Map<String, Value>> = response
        .get("device")
        .or_else(|| response.pointer("/data/device"))
        .and_then(Value::as_object);
    let Some(info) = info else {
        warn!(mac = %lock.mac, "lock info response carried no device object");
        return;
    };

    for (key, value) in info {
        lock.raw.insert(key.clone(), value.clone());
    }

    lock.available = flag_set(info.get("available"));
    lock.door_open = flag_set(info.get("door_open"));
    lock.trash_mode = flag_set(info.get("trash_mode"));
    lock.unlocked = flag_set(info.get("unlocked"));
}

pub struct LockService {
    session: Arc<AuthSession>,
    catalog: Arc<CatalogService>,
}

impl LockService {
    pub fn new(session: Arc<AuthSession>, catalog: Arc<CatalogService>) -> Self {
        Self { session, catalog }
    }

    /// Catalog entries whose discriminated type is `Lock`.
    pub async fn list_locks(&self) -> Result<Vec<Device>> {
        let devices = self.catalog.devices().await?;
        Ok(devices
            .into_iter()
            .filter(|d| d.device_type() == DeviceType::Lock)
            .collect())
    }

    /// Fetch the lock's live info and overwrite its status flags.
    pub async fn refresh_status(&self, lock: &mut Device) -> Result<()> {
        self.session.refresh_if_needed().await?;

        let url = format!(
            "{}/v3/lock/getLockInfo",
            self.session.config().api_base_url
        );
        let mut form = BTreeMap::new();
        form.insert("lockId".to_string(), lock_id(lock)?);

        let headers = self.session.bearer_headers().await?;
        let response = self.session.post_form(&url, Some(headers), &form).await?;
        check_standard(&response)?;

        apply_lock_info(lock, &response);
        Ok(())
    }

    pub async fn lock(&self, device: &Device) -> Result<Value> {
        self.control(device, LockAction::Lock).await
    }

    pub async fn unlock(&self, device: &Device) -> Result<Value> {
        self.control(device, LockAction::Unlock).await
    }

    /// Scheme-B-signed control request against the lock control
    /// gateway. The signature covers the exact payload fields and
    /// travels alongside them as `sign`.
    async fn control(&self, device: &Device, action: LockAction) -> Result<Value> {
        self.session.refresh_if_needed().await?;

        let mut fields = BTreeMap::new();
        fields.insert("clientId".to_string(), CLIENT_ID.to_string());
        fields.insert("accessToken".to_string(), self.session.access_token().await?);
        fields.insert("lockId".to_string(), lock_id(device)?);
        fields.insert("date".to_string(), Utc::now().timestamp_millis().to_string());

        let path = action.path();
        let sign = lock_control_signature("post", path, &fields);

        let mut payload = Map::new();
        for (key, value) in &fields {
            payload.insert(key.clone(), Value::String(value.clone()));
        }
        payload.insert("sign".to_string(), Value::String(sign));

        let url = format!("{}{}", self.session.config().lock_api_base_url, path);
        let response = self
            .session
            .post_json(&url, None, &Value::Object(payload))
            .await?;
        check_lock(&response)?;
        Ok(response)
    }
}
