//! Background completion pass for running campaigns.

use crate::db::Pool;
use crate::error::Result;
use crate::model::AdStatus;
use crate::notify::NotificationSink;
use chrono::NaiveDate;
use sqlx::Row;
use tracing::{info, instrument};

/// One sweep over active and paused ads: campaigns whose end date has passed,
/// or whose view target has been reached, move to `completed` through the
/// regular state machine, and the advertiser is notified. Returns how many
/// ads were completed.
#[instrument(skip_all)]
pub async fn complete_finished_ads(
    pool: &Pool,
    sink: &dyn NotificationSink,
    today: NaiveDate,
) -> Result<usize> {
    let rows = sqlx::query(
        "SELECT id FROM ads \
         WHERE status IN ('active', 'paused') \
           AND (end_date < ? \
                OR (target_views IS NOT NULL AND current_views >= target_views))",
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    let mut completed = 0usize;
    for row in &rows {
        let ad_id: String = row.get("id");
        let ad =
            crate::lifecycle::change_ad_status(pool, sink, &ad_id, AdStatus::Completed, None)
                .await?;
        info!(ad_id = %ad.id, "ad completed by sweeper");
        completed += 1;
    }
    if completed > 0 {
        info!(completed, "completion sweep finished");
    }
    Ok(completed)
}
