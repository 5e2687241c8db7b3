//! Notification delivery seam.
//!
//! The lifecycle layer only talks to [`NotificationSink`], so the polling
//! store-backed delivery can later be swapped for a push channel without
//! touching lifecycle code.

use crate::db::{self, Pool};
use crate::error::Result;
use crate::model::Notification;
use async_trait::async_trait;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        pool: &Pool,
        user_id: &str,
        title: &str,
        message: &str,
        ad_id: Option<&str>,
    ) -> Result<Notification>;
}

/// Writes notification rows that clients pick up by polling. There is no
/// delivery guarantee beyond the row's existence and no ack protocol.
#[derive(Debug, Clone, Default)]
pub struct DbNotificationSink;

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn deliver(
        &self,
        pool: &Pool,
        user_id: &str,
        title: &str,
        message: &str,
        ad_id: Option<&str>,
    ) -> Result<Notification> {
        db::create_notification(pool, user_id, title, message, ad_id).await
    }
}
