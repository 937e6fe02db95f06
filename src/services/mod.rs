//! Services built atop the authenticated session.
//!
//! - `catalog`: gateway/lock/group discovery and normalization
//! - `lock`: lock/unlock control and live status
//! - `account`: push settings and the user profile

pub mod account;
pub mod catalog;
pub mod lock;

pub use account::AccountService;
pub use catalog::CatalogService;
pub use lock::LockService;
