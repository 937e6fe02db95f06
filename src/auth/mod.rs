//! Authentication: token lifecycle and session management.
//!
//! This module provides:
//! - `Token`: the live access credential plus expiry bookkeeping
//! - `AuthSession`: login, two-factor completion, double-check-locked
//!   refresh, token-change notification, and the signed HTTP verbs

pub mod session;
pub mod token;

pub use session::{AuthSession, CallbackHandle, TokenCallback};
pub use token::{Token, REFRESH_INTERVAL_SECS};
