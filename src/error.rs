//! Error taxonomy for the storage and lifecycle layers.
//!
//! Store-level failures propagate unmodified to the caller; the (external)
//! HTTP layer is responsible for mapping them to user-facing messages.

use crate::model::AdStatus;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write path referenced a row that does not exist. Read paths return
    /// `Option`/empty collections instead of this.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    Validation(String),

    /// The conflict error: the requested range overlaps an existing booking
    /// whose parent ad still holds the slot.
    #[error("slot {slot_id} is already booked within {start}..{end}")]
    SlotUnavailable {
        slot_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition { from: AdStatus, to: AdStatus },

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
