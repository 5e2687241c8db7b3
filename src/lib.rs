//! adboard core: slot booking availability, ad lifecycle, impression
//! analytics and polled notifications for an advertising marketplace.
//!
//! The HTTP layer is an external consumer of this crate; everything here is
//! an internal service interface over an injected SQLite pool.

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod sweeper;
