//! Async client library for the LockCloud smart-lock cloud API.
//!
//! The library authenticates a user (direct login, two-factor
//! completion, or an existing token), keeps the access token fresh
//! behind a double-check-locked refresh, signs requests for each of the
//! backend's signing schemes, discovers the gateways, locks, and
//! lock-groups bound to the account, and issues lock control commands.
//!
//! ```no_run
//! use lockcloud::{Client, ClientConfig};
//!
//! # async fn run() -> lockcloud::Result<()> {
//! let client = Client::new(
//!     ClientConfig::default(),
//!     Some("user@example.com".into()),
//!     Some("hunter2".into()),
//!     None,
//! )?;
//! client.login().await?;
//! for lock in client.locks().list_locks().await? {
//!     println!("{} ({:?})", lock.mac, lock.device_type());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Tokens live in process memory only. Register a token-change
//! observer via [`Client::on_token_change`] to persist credentials
//! across runs.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod models;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiError, Result};
pub use auth::{AuthSession, CallbackHandle, Token, TokenCallback};
pub use client::Client;
pub use config::ClientConfig;
pub use models::{Device, DeviceType, Group};
pub use services::{AccountService, CatalogService, LockService};
