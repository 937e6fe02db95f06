//! Response classification for the backend's inconsistent error shapes.
//!
//! The backend families disagree on how errors are reported: the
//! standard shape uses a `code` field, the lock control gateway uses
//! `ErrNo` with a secondary `code`, the thermostat family uses a bare
//! numeric `code`, and the notification/HMS family signals a dead token
//! by omitting `message`. Every call site funnels its decoded response
//! through exactly one of these checks immediately after decoding.
//!
//! All checks are defensive about absent or malformed fields: a missing
//! key means "cannot classify as this shape's error," never a panic.

use serde_json::Value;
use tracing::debug;

use super::error::{ApiError, Result};

/// Success sentinel for the standard response shape
const CODE_SUCCESS: &str = "200";
/// Success sentinel for the thermostat response shape
const CODE_SUCCESS_THERMOSTAT: &str = "1";

const CODE_PARAMETER_ERROR: &str = "1001";
const CODE_ACCESS_TOKEN_ERROR: &str = "2001";
const CODE_DEVICE_OFFLINE: &str = "3019";

/// The backend sends sentinel codes as JSON numbers on some endpoints
/// and strings on others; match either form.
fn code_matches(code: &Value, sentinel: &str) -> bool {
    match code {
        Value::String(s) => s == sentinel,
        Value::Number(n) => n
            .as_i64()
            .map_or(false, |v| v.to_string() == sentinel),
        _ => false,
    }
}

/// Standard shape: `code` absent or 200 is success; device-offline is
/// swallowed as non-fatal.
pub fn check_standard(response: &Value) -> Result<()> {
    let Some(code) = response.get("code") else {
        return Ok(());
    };
    if code_matches(code, CODE_SUCCESS) {
        return Ok(());
    }
    if code_matches(code, CODE_PARAMETER_ERROR) {
        return Err(ApiError::Parameter(response.clone()));
    }
    if code_matches(code, CODE_ACCESS_TOKEN_ERROR) {
        return Err(ApiError::AccessToken);
    }
    if code_matches(code, CODE_DEVICE_OFFLINE) {
        debug!("device reported offline, continuing");
        return Ok(());
    }
    Err(ApiError::UnknownApi(response.clone()))
}

/// Lock control shape: `ErrNo` zero (or absent) is success; nonzero
/// defers to the secondary `code` field. Like the sentinel codes,
/// `ErrNo` arrives as either a number or a numeric string.
pub fn check_lock(response: &Value) -> Result<()> {
    let err_no = match response.get("ErrNo") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    };
    if err_no == 0 {
        return Ok(());
    }
    if let Some(code) = response.get("code") {
        if code_matches(code, CODE_PARAMETER_ERROR) {
            return Err(ApiError::Parameter(response.clone()));
        }
        if code_matches(code, CODE_ACCESS_TOKEN_ERROR) {
            return Err(ApiError::AccessToken);
        }
    }
    Err(ApiError::UnknownApi(response.clone()))
}

/// Thermostat shape: anything other than a literal `code` of 1 is an error.
pub fn check_thermostat(response: &Value) -> Result<()> {
    match response.get("code") {
        Some(code) if code_matches(code, CODE_SUCCESS_THERMOSTAT) => Ok(()),
        _ => Err(ApiError::UnknownApi(response.clone())),
    }
}

/// Notification/HMS shape: a missing or null `message` means the token
/// was rejected.
pub fn check_hms(response: &Value) -> Result<()> {
    match response.get("message") {
        Some(message) if !message.is_null() => Ok(()),
        _ => Err(ApiError::AccessToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_success_and_missing_code() {
        assert!(check_standard(&json!({"code": 200})).is_ok());
        assert!(check_standard(&json!({"code": "200"})).is_ok());
        assert!(check_standard(&json!({"data": {}})).is_ok());
    }

    #[test]
    fn test_standard_parameter_error() {
        let err = check_standard(&json!({"code": 1001})).unwrap_err();
        assert!(matches!(err, ApiError::Parameter(_)));
        let err = check_standard(&json!({"code": "1001"})).unwrap_err();
        assert!(matches!(err, ApiError::Parameter(_)));
    }

    #[test]
    fn test_standard_access_token_error() {
        let err = check_standard(&json!({"code": 2001})).unwrap_err();
        assert!(matches!(err, ApiError::AccessToken));
    }

    #[test]
    fn test_standard_device_offline_swallowed() {
        assert!(check_standard(&json!({"code": 3019})).is_ok());
        assert!(check_standard(&json!({"code": "3019"})).is_ok());
    }

    #[test]
    fn test_standard_unknown_code() {
        let err = check_standard(&json!({"code": "other"})).unwrap_err();
        assert!(matches!(err, ApiError::UnknownApi(_)));
        let err = check_standard(&json!({"code": [1, 2]})).unwrap_err();
        assert!(matches!(err, ApiError::UnknownApi(_)));
    }

    #[test]
    fn test_lock_success() {
        assert!(check_lock(&json!({"ErrNo": 0})).is_ok());
        assert!(check_lock(&json!({"anything": "else"})).is_ok());
    }

    #[test]
    fn test_lock_nonzero_with_sentinel_code() {
        let err = check_lock(&json!({"ErrNo": 5, "code": 1001})).unwrap_err();
        assert!(matches!(err, ApiError::Parameter(_)));
        let err = check_lock(&json!({"ErrNo": 5, "code": "2001"})).unwrap_err();
        assert!(matches!(err, ApiError::AccessToken));
    }

    #[test]
    fn test_lock_string_err_no() {
        let err = check_lock(&json!({"ErrNo": "5", "code": 1001})).unwrap_err();
        assert!(matches!(err, ApiError::Parameter(_)));
        assert!(check_lock(&json!({"ErrNo": "0"})).is_ok());
        assert!(check_lock(&json!({"ErrNo": "junk"})).is_ok());
    }

    #[test]
    fn test_lock_nonzero_without_code_is_unknown() {
        let err = check_lock(&json!({"ErrNo": 5})).unwrap_err();
        assert!(matches!(err, ApiError::UnknownApi(_)));
    }

    #[test]
    fn test_thermostat_literal_one() {
        assert!(check_thermostat(&json!({"code": 1})).is_ok());
        assert!(check_thermostat(&json!({"code": "1"})).is_ok());
        assert!(check_thermostat(&json!({"code": 200})).is_err());
        assert!(check_thermostat(&json!({})).is_err());
    }

    #[test]
    fn test_hms_missing_message() {
        assert!(check_hms(&json!({"message": "ok"})).is_ok());
        let err = check_hms(&json!({"message": null})).unwrap_err();
        assert!(matches!(err, ApiError::AccessToken));
        let err = check_hms(&json!({})).unwrap_err();
        assert!(matches!(err, ApiError::AccessToken));
    }
}
