//! Request signing for the two LockCloud backend signing schemes.
//!
//! Scheme A (`app_signature`) signs device-cloud requests: the payload
//! is canonicalized into a sorted `key=value&` body, a per-token secret
//! is derived by hashing the access token with a fixed signing secret,
//! and the body is HMAC-MD5'd under that derived secret. The result
//! travels in the `signature2` header.
//!
//! Scheme B (`lock_control_signature`) signs lock-control requests:
//! the HTTP method, URL path, sorted payload pairs and a fixed app
//! secret are concatenated, percent-encoded with space as `+`, and
//! MD5'd. The result travels in the payload's `sign` field.
//!
//! Both schemes are pure functions; the backend compares digests
//! byte-for-byte, so the canonicalization here must not change.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};

use crate::config::{APP_SECRET, SIGNING_SECRET};

type HmacMd5 = Hmac<Md5>;

/// Payload forms accepted by Scheme A. Pre-serialized bodies (JSON
/// strings) are signed verbatim; field maps are canonicalized first.
pub enum SigningPayload<'a> {
    Fields(&'a BTreeMap<String, String>),
    Raw(&'a str),
}

/// Hex MD5 of a string. Also the password hash for the direct login flow.
pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sorted `key=value&` concatenation with the trailing `&` dropped.
/// BTreeMap iteration order is the lexicographic key order the backend
/// expects.
fn canonical_body(fields: &BTreeMap<String, String>) -> String {
    let mut body = String::new();
    for (key, value) in fields {
        body.push_str(key);
        body.push('=');
        body.push_str(value);
        body.push('&');
    }
    body.pop();
    body
}

/// Scheme A: keyed HMAC-MD5 with a secret derived from the access token.
pub fn app_signature(payload: SigningPayload<'_>, access_token: &str) -> String {
    let body = match payload {
        SigningPayload::Fields(fields) => canonical_body(fields),
        SigningPayload::Raw(raw) => raw.to_string(),
    };

    let secret = md5_hex(&format!("{}{}", access_token, SIGNING_SECRET));

    // HMAC-MD5 accepts keys of any length, so new_from_slice cannot fail
    // for a hex string key.
    let mut mac = HmacMd5::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-MD5 accepts any key length"));
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Percent-encode with the quote-plus convention the lock control
/// backend uses: unreserved characters pass through, space becomes `+`.
fn quote_plus(input: &str) -> String {
    urlencoding::encode(input).replace("%20", "+")
}

/// Scheme B: URL-encoded MD5 over method + path + sorted fields + app secret.
pub fn lock_control_signature(
    method: &str,
    url_path: &str,
    fields: &BTreeMap<String, String>,
) -> String {
    let mut buf = String::new();
    buf.push_str(method);
    buf.push_str(url_path);
    for (key, value) in fields {
        buf.push_str(key);
        buf.push('=');
        buf.push_str(value);
        buf.push('&');
    }
    buf.pop();
    buf.push_str(APP_SECRET);

    md5_hex(&quote_plus(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_md5_hex_password_hash() {
        assert_eq!(
            md5_hex("correct horse"),
            "3cb4e732631f47e6eb961f34554b7cde"
        );
    }

    #[test]
    fn test_app_signature_field_map() {
        let payload = fields(&[("nonce", "1623000000000"), ("keys", "")]);
        assert_eq!(
            app_signature(SigningPayload::Fields(&payload), "an.access.token"),
            "ab08c4cbc2863fcf1cf93ed9f52af350"
        );
    }

    #[test]
    fn test_app_signature_raw_string() {
        let raw = r#"{"did":"GW3U.AABB","keys":"temperature"}"#;
        assert_eq!(
            app_signature(SigningPayload::Raw(raw), "an.access.token"),
            "a66d1272f3d76f1e675fa4b4b11b2a4d"
        );
    }

    #[test]
    fn test_app_signature_independent_of_insertion_order() {
        let mut forward = BTreeMap::new();
        forward.insert("alpha".to_string(), "1".to_string());
        forward.insert("beta".to_string(), "2".to_string());
        forward.insert("gamma".to_string(), "3".to_string());

        let mut reverse = BTreeMap::new();
        reverse.insert("gamma".to_string(), "3".to_string());
        reverse.insert("beta".to_string(), "2".to_string());
        reverse.insert("alpha".to_string(), "1".to_string());

        assert_eq!(
            app_signature(SigningPayload::Fields(&forward), "tok"),
            app_signature(SigningPayload::Fields(&reverse), "tok"),
        );
    }

    #[test]
    fn test_canonical_body_drops_trailing_separator() {
        let payload = fields(&[("b", "2"), ("a", "1")]);
        assert_eq!(canonical_body(&payload), "a=1&b=2");
        assert_eq!(canonical_body(&BTreeMap::new()), "");
    }

    #[test]
    fn test_lock_control_signature_known_vector() {
        let payload = fields(&[
            ("clientId", "cid"),
            ("accessToken", "tok"),
            ("date", "1623000000000"),
            ("lockId", "42"),
        ]);
        assert_eq!(
            lock_control_signature("post", "/v3/lock/lock", &payload),
            "dabef3b4b946de59b9124d9edcfb4cea"
        );
    }

    #[test]
    fn test_lock_control_signature_encodes_space_as_plus() {
        let payload = fields(&[("note", "a b&c"), ("id", "7")]);
        assert_eq!(
            lock_control_signature("post", "/v3/lock/unlock", &payload),
            "5690b7e9316dfddc0a755adc015f6d8f"
        );
    }

    #[test]
    fn test_quote_plus_safe_set() {
        assert_eq!(quote_plus("a b&c~x_.-/"), "a+b%26c~x_.-%2F");
    }
}
