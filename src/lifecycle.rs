//! Ad lifecycle orchestration: submission, review and status changes, with
//! notifications fanned out on every status-changing event.

use crate::db::{self, NewAd, Pool};
use crate::error::{Result, StoreError};
use crate::model::{Ad, AdStatus};
use crate::notify::NotificationSink;
use tracing::{info, instrument, warn};

/// Validate and create a campaign with one booking per requested slot, then
/// tell every admin there is something to review.
///
/// Availability is probed up front so obvious conflicts fail fast, and
/// re-validated inside the creation transaction so a concurrent submission
/// cannot slip between the check and the insert. Notification failures are
/// logged and do not fail the submission; there is no delivery guarantee.
#[instrument(skip_all)]
pub async fn submit_ad(
    pool: &Pool,
    sink: &dyn NotificationSink,
    new_ad: NewAd,
    slot_ids: &[String],
) -> Result<Ad> {
    if new_ad.title.trim().is_empty() {
        return Err(StoreError::Validation("title must be non-empty".into()));
    }
    if new_ad.start_date > new_ad.end_date {
        return Err(StoreError::Validation(
            "start_date must not be after end_date".into(),
        ));
    }
    if slot_ids.is_empty() {
        return Err(StoreError::Validation(
            "at least one slot must be selected".into(),
        ));
    }
    if new_ad.budget <= 0.0 {
        return Err(StoreError::Validation("budget must be positive".into()));
    }

    // Advisory pre-check; the authoritative check runs inside create_ad's
    // transaction.
    for slot_id in slot_ids {
        if !db::check_slot_availability(pool, slot_id, new_ad.start_date, new_ad.end_date).await? {
            return Err(StoreError::SlotUnavailable {
                slot_id: slot_id.clone(),
                start: new_ad.start_date,
                end: new_ad.end_date,
            });
        }
    }

    let ad = db::create_ad(pool, &new_ad, slot_ids).await?;
    info!(ad_id = %ad.id, slots = slot_ids.len(), "ad submitted");

    for admin in db::get_admins(pool).await? {
        if let Err(err) = sink
            .deliver(
                pool,
                &admin.id,
                "New ad pending review",
                &format!("\"{}\" is waiting for approval.", ad.title),
                Some(&ad.id),
            )
            .await
        {
            warn!(?err, admin_id = %admin.id, "failed to notify admin");
        }
    }
    Ok(ad)
}

/// Drive one status transition through the state machine and notify the
/// advertiser of the outcome. `reason` is required when rejecting and ignored
/// otherwise.
#[instrument(skip_all)]
pub async fn change_ad_status(
    pool: &Pool,
    sink: &dyn NotificationSink,
    ad_id: &str,
    next: AdStatus,
    reason: Option<&str>,
) -> Result<Ad> {
    let ad = db::update_ad_status(pool, ad_id, next, reason).await?;
    info!(ad_id = %ad.id, status = %next, "ad status changed");

    let (title, message) = match next {
        AdStatus::Approved => (
            "Ad approved",
            format!("\"{}\" was approved and can go live.", ad.title),
        ),
        AdStatus::Rejected => (
            "Ad rejected",
            format!(
                "\"{}\" was rejected: {}",
                ad.title,
                ad.rejection_reason.as_deref().unwrap_or("no reason given")
            ),
        ),
        AdStatus::Active => ("Ad live", format!("\"{}\" is now running.", ad.title)),
        AdStatus::Paused => ("Ad paused", format!("\"{}\" was paused.", ad.title)),
        AdStatus::Completed => (
            "Ad completed",
            format!("\"{}\" finished its run.", ad.title),
        ),
        AdStatus::Pending => ("Ad updated", format!("\"{}\" is pending.", ad.title)),
    };
    if let Err(err) = sink
        .deliver(pool, &ad.advertiser_id, title, &message, Some(&ad.id))
        .await
    {
        warn!(?err, ad_id = %ad.id, "failed to notify advertiser");
    }
    Ok(ad)
}
