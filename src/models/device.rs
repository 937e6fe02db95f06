use serde_json::{Map, Value};

/// Raw attribute key carrying the device type tag
const TYPE_KEY: &str = "product_type";
/// Raw attribute key carrying the unified device identifier
const MAC_KEY: &str = "mac";

/// Device type tag, mapped from the raw vendor string. The vendor adds
/// models without notice, so unrecognized strings map to `Unknown`
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Lock,
    Gateway,
    GatewayV2,
    /// Lock-group record traveling in the merged catalog sequence
    LockGroup,
    Keypad,
    Camera,
    ContactSensor,
    MotionSensor,
    Thermostat,
    Common,
    Unknown,
}

impl DeviceType {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "Lock" => DeviceType::Lock,
            "gateway" => DeviceType::Gateway,
            "GateWay" => DeviceType::GatewayV2,
            "group" => DeviceType::LockGroup,
            "Keypad" => DeviceType::Keypad,
            "Camera" => DeviceType::Camera,
            "ContactSensor" => DeviceType::ContactSensor,
            "MotionSensor" => DeviceType::MotionSensor,
            "Thermostat" => DeviceType::Thermostat,
            "Common" => DeviceType::Common,
            _ => DeviceType::Unknown,
        }
    }
}

/// A vendor-side physical unit (gateway or lock).
///
/// The vendor schema differs between endpoints, so every field the
/// backend returned is retained in `raw`; the struct models only the
/// normalized convenience attributes. Instances are ephemeral: a
/// catalog fetch or status refresh replaces them wholesale rather than
/// reconciling field by field.
#[derive(Debug, Clone)]
pub struct Device {
    /// MAC-like unique identifier, normalized from the vendor-specific key
    pub mac: String,
    pub available: bool,
    pub door_open: bool,
    pub trash_mode: bool,
    pub unlocked: bool,
    /// Every field the backend returned for this record
    pub raw: Map<String, Value>,
}

impl Device {
    pub fn from_raw(raw: Map<String, Value>) -> Self {
        let mac = raw
            .get(MAC_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            mac,
            available: false,
            door_open: false,
            trash_mode: false,
            unlocked: false,
            raw,
        }
    }

    /// Derived from the raw map on every call so it can never diverge
    /// from `raw`.
    pub fn device_type(&self) -> DeviceType {
        self.raw
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .map(DeviceType::from_raw)
            .unwrap_or(DeviceType::Unknown)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.raw.get("nickname").and_then(Value::as_str)
    }
}
