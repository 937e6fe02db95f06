//! Device catalog: gateways, locks, and lock-groups for an account.
//!
//! The listing endpoints disagree on envelope shape (`{list, total}`
//! vs `{data: {list, total}}`) and on which key carries the device
//! identifier, so every record is normalized here: a synthetic
//! `product_type` tag and a unified `mac` copied from the
//! vendor-specific key.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::api::classify::check_standard;
use crate::api::error::Result;
use crate::auth::AuthSession;
use crate::config::PAGE_SIZE;
use crate::models::{Device, Group};

/// One page of a paginated listing response
#[derive(Debug, Default, Deserialize)]
struct ListPage {
    #[serde(default)]
    list: Vec<Map<String, Value>>,
    #[serde(default)]
    total: u64,
}

/// The two envelope shapes the listing endpoints return. Untagged:
/// the nested form is tried first, then the flat form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Nested { data: ListPage },
    Flat(ListPage),
}

impl ListEnvelope {
    fn into_page(self) -> ListPage {
        match self {
            ListEnvelope::Nested { data } => data,
            ListEnvelope::Flat(page) => page,
        }
    }
}

/// Shape-detect a listing response. Unparseable envelopes degrade to
/// an empty page.
fn parse_page(response: &Value) -> ListPage {
    match serde_json::from_value::<ListEnvelope>(response.clone()) {
        Ok(envelope) => envelope.into_page(),
        Err(err) => {
            warn!(%err, "unrecognized list envelope, treating as empty");
            ListPage::default()
        }
    }
}

/// Gateways arrive without a `mac` field; copy the network identifier
/// into the unified key and tag the record.
fn normalize_gateway(mut raw: Map<String, Value>) -> Device {
    let mac = raw
        .get("networkMac")
        .or_else(|| raw.get("gatewayMac"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    raw.insert("mac".into(), Value::String(mac));
    raw.insert("product_type".into(), Value::String("gateway".into()));
    Device::from_raw(raw)
}

/// Group records travel in the same merged sequence as gateways and
/// locks. They carry no device identifier; only the synthetic type tag
/// is added.
fn normalize_group_record(mut raw: Map<String, Value>) -> Device {
    raw.insert("product_type".into(), Value::String("group".into()));
    Device::from_raw(raw)
}

fn normalize_lock(mut raw: Map<String, Value>) -> Device {
    let mac = raw
        .get("lockMac")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    raw.insert("mac".into(), Value::String(mac));
    raw.insert("product_type".into(), Value::String("Lock".into()));
    Device::from_raw(raw)
}

/// Fetches and normalizes the account's device catalog. Owns an
/// explicit device cache, replaced on every `list_devices` call.
pub struct CatalogService {
    session: Arc<AuthSession>,
    devices: RwLock<Option<Vec<Device>>>,
}

impl CatalogService {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self {
            session,
            devices: RwLock::new(None),
        }
    }

    /// Fetch gateways, then the sync data (group records and the locks
    /// of group 0), sequentially: the backend paginates statefully.
    /// The results merge gateways-first into one sequence. Replaces the
    /// cache.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let gateway_url = format!("{}/v3/gateway/list", self.session.config().api_base_url);
        let mut devices: Vec<Device> = self
            .fetch_pages(&gateway_url, 0)
            .await?
            .into_iter()
            .map(normalize_gateway)
            .collect();

        let group_records = self.fetch_group_records().await?;
        devices.extend(group_records.into_iter().map(normalize_group_record));

        devices.extend(self.fetch_locks(0).await?);
        debug!(count = devices.len(), "device catalog fetched");

        *self.devices.write().await = Some(devices.clone());
        Ok(devices)
    }

    /// Cached catalog, or a fresh fetch when none is held.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        if let Some(devices) = self.devices.read().await.clone() {
            return Ok(devices);
        }
        self.list_devices().await
    }

    pub async fn invalidate(&self) {
        *self.devices.write().await = None;
    }

    pub async fn get_groups(&self) -> Result<Vec<Group>> {
        let records = self.fetch_group_records().await?;
        Ok(records.into_iter().map(Group::from_raw).collect())
    }

    async fn fetch_group_records(&self) -> Result<Vec<Map<String, Value>>> {
        let url = format!(
            "{}/v3/lock/getGroupByForLock",
            self.session.config().api_base_url
        );
        self.fetch_pages(&url, 0).await
    }

    pub async fn get_locks_by_group(&self, group_id: i64) -> Result<Vec<Device>> {
        self.fetch_locks(group_id).await
    }

    async fn fetch_locks(&self, group_id: i64) -> Result<Vec<Device>> {
        let url = format!(
            "{}/v3/lock/getLockByGroupId",
            self.session.config().api_base_url
        );
        let records = self.fetch_pages(&url, group_id).await?;
        Ok(records.into_iter().map(normalize_lock).collect())
    }

    /// Walk a paginated listing endpoint until the reported total is
    /// collected. The token is re-checked before every page, and the
    /// bearer headers rebuilt, in case a refresh happened mid-walk.
    async fn fetch_pages(&self, url: &str, group_id: i64) -> Result<Vec<Map<String, Value>>> {
        let mut records = Vec::new();
        let mut page_no = 1u32;
        loop {
            self.session.refresh_if_needed().await?;
            let headers = self.session.bearer_headers().await?;

            let mut form = BTreeMap::new();
            form.insert("groupId".to_string(), group_id.to_string());
            form.insert("pageNo".to_string(), page_no.to_string());
            form.insert("pageSize".to_string(), PAGE_SIZE.to_string());

            let response = self.session.post_form(url, Some(headers), &form).await?;
            check_standard(&response)?;

            let page = parse_page(&response);
            let fetched = page.list.len();
            records.extend(page.list);

            if fetched == 0 || records.len() as u64 >= page.total {
                break;
            }
            page_no += 1;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::auth::Token;
    use crate::models::DeviceType;
    use crate::test_support::{spawn_stub, stub_config};

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_parse_page_flat_shape() {
        let page = parse_page(&json!({"list": [{"a": 1}], "total": 1}));
        assert_eq!(page.list.len(), 1);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_parse_page_nested_shape() {
        let page = parse_page(&json!({"data": {"list": [{"a": 1}, {"b": 2}], "total": 9}}));
        assert_eq!(page.list.len(), 2);
        assert_eq!(page.total, 9);
    }

    #[test]
    fn test_parse_page_garbage_is_empty() {
        let page = parse_page(&json!(null));
        assert!(page.list.is_empty());
        let page = parse_page(&json!({"data": 5}));
        assert!(page.list.is_empty());
    }

    #[test]
    fn test_gateway_normalization() {
        let device = normalize_gateway(raw(json!({"networkMac": "AA:BB", "gatewayName": "g"})));
        assert_eq!(device.mac, "AA:BB");
        assert_eq!(device.device_type(), DeviceType::Gateway);
    }

    #[test]
    fn test_gateway_mac_fallback_key() {
        let device = normalize_gateway(raw(json!({"gatewayMac": "CC:DD"})));
        assert_eq!(device.mac, "CC:DD");
    }

    #[test]
    fn test_group_record_normalization() {
        let device = normalize_group_record(raw(json!({"groupId": 3, "groupName": "Home"})));
        assert_eq!(device.device_type(), DeviceType::LockGroup);
        assert_eq!(device.mac, "");
        assert_eq!(device.raw.get("groupId"), Some(&json!(3)));
    }

    #[test]
    fn test_lock_normalization() {
        let device = normalize_lock(raw(json!({"lockMac": "EE:FF", "lockId": 42})));
        assert_eq!(device.mac, "EE:FF");
        assert_eq!(device.device_type(), DeviceType::Lock);
    }

    const CATALOG_BODY: &str = r#"{"data":{"list":[{"networkMac":"AA:BB","lockMac":"AA:BB","lockId":42}],"total":1}}"#;

    #[tokio::test]
    async fn test_list_devices_merges_gateways_first() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = spawn_stub(CATALOG_BODY, hits.clone()).await;
        let session = Arc::new(
            AuthSession::new(stub_config(&base), None, None, Some(Token::new("t"))).unwrap(),
        );
        let catalog = CatalogService::new(session);

        let devices = catalog.list_devices().await.unwrap();

        // Gateway, group, and lock fetches, one page each.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].device_type(), DeviceType::Gateway);
        assert_eq!(devices[1].device_type(), DeviceType::LockGroup);
        assert_eq!(devices[2].device_type(), DeviceType::Lock);
        assert_eq!(devices[0].mac, "AA:BB");

        // The cache answers without another fetch; invalidation clears it.
        let cached = catalog.devices().await.unwrap();
        assert_eq!(cached.len(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        catalog.invalidate().await;
        catalog.devices().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_get_groups() {
        let hits = Arc::new(AtomicUsize::new(0));
        let body = r#"{"data":{"list":[{"groupId":3,"groupName":"Home"}],"total":1}}"#;
        let base = spawn_stub(body, hits).await;
        let session = Arc::new(
            AuthSession::new(stub_config(&base), None, None, Some(Token::new("t"))).unwrap(),
        );
        let catalog = CatalogService::new(session);

        let groups = catalog.get_groups().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, 3);
        assert_eq!(groups[0].name, "Home");
    }
}
