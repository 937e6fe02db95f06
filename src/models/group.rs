use serde_json::{Map, Value};

/// A lock-group membership record. Same retained-raw-map pattern as
/// `Device`, lighter: the backend only guarantees an id and a name.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub raw: Map<String, Value>,
}

impl Group {
    pub fn from_raw(raw: Map<String, Value>) -> Self {
        let id = match raw.get("groupId") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.parse().unwrap_or_default(),
            _ => 0,
        };
        let name = raw
            .get("groupName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { id, name, raw }
    }
}
