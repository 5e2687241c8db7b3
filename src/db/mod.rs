//! Database module: entity view models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: input and view structs flowing in and out of queries.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `adboard::db` — we re-export the
//! repository API and commonly used models for convenience.

pub mod model;
pub mod repo;

// Re-export the repository API at `crate::db::*`.
pub use repo::*;

// Surface the view models used by callers (lifecycle, sweeper, tests).
pub use model::{
    period_starts, AdAnalytics, AdPatch, AdWithAnalytics, AdWithSlots, BookedRange, NewAd,
    NewAdSlot, PeriodStarts, Statistics,
};
