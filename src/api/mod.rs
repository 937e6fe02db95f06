//! Error taxonomy and response classification for the LockCloud API.
//!
//! The backend reports failures in several mutually inconsistent
//! shapes; `classify` normalizes them all into the `ApiError` taxonomy
//! in `error`.

pub mod classify;
pub mod error;

pub use classify::{check_hms, check_lock, check_standard, check_thermostat};
pub use error::{ApiError, Result};
