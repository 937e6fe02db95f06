//! Endpoint configuration and vendor constants.
//!
//! The LockCloud backend is split across several host families: the
//! lock/gateway API, the device cloud (token refresh, push settings),
//! the auth service (two-factor completion), and the lock control
//! gateway. Each base URL can be overridden, which is also what the
//! test suite uses to point the client at a local stub server.

use std::time::Duration;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default base URL for the lock/gateway listing API
const API_BASE_URL: &str = "https://pro-server.lockcloudapp.com";

/// Default base URL for the device cloud (refresh, push settings, profile)
const DEVICE_API_BASE_URL: &str = "https://api.lockcloudiot.com";

/// Default base URL for the auth service (two-factor completion)
const AUTH_BASE_URL: &str = "https://auth-prod.lockcloudiot.com";

/// Default base URL for the lock control gateway
const LOCK_API_BASE_URL: &str = "https://saas-toc.lockcloudiot.com";

// App identity constants. The backend rejects requests whose payloads
// do not carry the identity of a known app build, so every signed
// payload includes these.
pub const PHONE_ID: &str = "bc151f39-787b-4871-be27-5a20fd0a3c56";
pub const UNIQUE_ID: &str = "65BDFAFE-56FF-42FE-AAA2-DD8A484CFC58";
pub const APP_NAME: &str = "com.lockcloud.app";
pub const APP_VERSION: &str = "2.19.14";
pub const APP_VER: &str = "com.lockcloud.app___2.19.14";
pub const APP_INFO: &str = "lockcloud_android_2.19.14";
pub const APP_ID: &str = "9319141212m2ik44";
pub const API_KEY: &str = "RckMFKbsds5p6QY3COEXc2ABwNTYY0q18ziEiSEm";
pub const SC: &str = "9f275790cab94a72bd206c8876429f3c";
pub const SV: &str = "9d74946e652647e9b6c9d59326aef104";
pub const PHONE_SYSTEM_TYPE: i64 = 1;

/// Client id carried by lock control payloads
pub const CLIENT_ID: &str = "mls7xbd9024ahqfz";

/// Secret mixed into the Scheme A derived signing key
pub const SIGNING_SECRET: &str = "kvf93j2xdq18pcz7";

/// App secret appended to the Scheme B signing string
pub const APP_SECRET: &str = "cbc362ba6dad4c609fa0b7fca7a0cc53";

/// Page size for paginated listing endpoints
pub const PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub device_api_base_url: String,
    pub auth_base_url: String,
    pub lock_api_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: API_BASE_URL.to_string(),
            device_api_base_url: DEVICE_API_BASE_URL.to_string(),
            auth_base_url: AUTH_BASE_URL.to_string(),
            lock_api_base_url: LOCK_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}
