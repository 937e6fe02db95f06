//! Data models for LockCloud entities.
//!
//! Records from the backend keep their full raw key/value maps because
//! the vendor schema is inconsistent across endpoints; the structs here
//! model only the normalized attributes callers rely on.

pub mod device;
pub mod group;

pub use device::{Device, DeviceType};
pub use group::Group;
