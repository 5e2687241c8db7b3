use super::model::{
    period_starts, AdAnalytics, AdPatch, AdWithAnalytics, AdWithSlots, BookedRange, NewAd,
    NewAdSlot, Statistics,
};
use crate::error::{Result, StoreError};
use crate::model::{
    Ad, AdSlot, AdStatus, AdType, AdView, Notification, PaymentType, SlotPosition, User, UserRole,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

/// Statuses that hold a slot against new bookings, as a SQL list. Derived
/// from [`AdStatus::blocks_slot`] so the rule has a single owner.
fn blocking_statuses_sql() -> String {
    let quoted: Vec<String> = AdStatus::ALL
        .iter()
        .filter(|s| s.blocks_slot())
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!("({})", quoted.join(", "))
}

const AD_USER_COLS: &str = "a.id, a.advertiser_id, a.title, a.ad_type_id, a.payment_type, \
     a.budget, a.target_views, a.current_views, a.estimated_cost, a.actual_cost, \
     a.start_date, a.end_date, a.status, a.rejection_reason, a.created_at, a.updated_at, \
     u.id AS u_id, u.email AS u_email, u.first_name AS u_first_name, \
     u.last_name AS u_last_name, u.role AS u_role, u.created_at AS u_created_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    // In-memory SQLite gives every connection its own database; pin the pool
    // to a single connection so migrations and queries see the same store.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(opts)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// =============================================================================
//  Users
// =============================================================================

#[instrument(skip_all)]
pub async fn upsert_user(
    pool: &Pool,
    id: &str,
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
    role: UserRole,
) -> Result<User> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
             email = excluded.email, first_name = excluded.first_name, \
             last_name = excluded.last_name, role = excluded.role, \
             updated_at = excluded.updated_at",
    )
    .bind(id)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    get_user(pool, id).await?.ok_or(StoreError::NotFound("user"))
}

pub async fn get_user(pool: &Pool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, first_name, last_name, role, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_admins(pool: &Pool) -> Result<Vec<User>> {
    let rows = sqlx::query(
        "SELECT id, email, first_name, last_name, role, created_at FROM users \
         WHERE role = 'admin'",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(user_from_row).collect()
}

// =============================================================================
//  Ad types
// =============================================================================

#[instrument(skip_all)]
pub async fn create_ad_type(
    pool: &Pool,
    name: &str,
    description: Option<&str>,
    preview_image: Option<&str>,
) -> Result<AdType> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO ad_types (id, name, description, preview_image, is_active, created_at) \
         VALUES (?, ?, ?, ?, 1, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(description)
    .bind(preview_image)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(AdType {
        id,
        name: name.to_string(),
        description: description.map(str::to_owned),
        preview_image: preview_image.map(str::to_owned),
        is_active: true,
        created_at: now,
    })
}

pub async fn get_ad_types(pool: &Pool) -> Result<Vec<AdType>> {
    let rows = sqlx::query(
        "SELECT id, name, description, preview_image, is_active, created_at FROM ad_types \
         WHERE is_active = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(ad_type_from_row).collect()
}

/// Soft delete: historic ads keep referencing the category.
#[instrument(skip_all)]
pub async fn delete_ad_type(pool: &Pool, id: &str) -> Result<()> {
    let res = sqlx::query("UPDATE ad_types SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("ad type"));
    }
    Ok(())
}

// =============================================================================
//  Ad slots
// =============================================================================

#[instrument(skip_all)]
pub async fn create_ad_slot(pool: &Pool, slot: &NewAdSlot) -> Result<AdSlot> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO ad_slots (id, name, location, position, price_per_day, price_per_view, \
                               ad_type_id, is_available, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&id)
    .bind(&slot.name)
    .bind(&slot.location)
    .bind(slot.position.as_str())
    .bind(slot.price_per_day)
    .bind(slot.price_per_view)
    .bind(&slot.ad_type_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(AdSlot {
        id,
        name: slot.name.clone(),
        location: slot.location.clone(),
        position: slot.position,
        price_per_day: slot.price_per_day,
        price_per_view: slot.price_per_view,
        ad_type_id: slot.ad_type_id.clone(),
        is_available: true,
        created_at: now,
    })
}

#[instrument(skip_all)]
pub async fn update_ad_slot(pool: &Pool, id: &str, slot: &NewAdSlot) -> Result<AdSlot> {
    let res = sqlx::query(
        "UPDATE ad_slots SET name = ?, location = ?, position = ?, price_per_day = ?, \
                             price_per_view = ?, ad_type_id = ? \
         WHERE id = ?",
    )
    .bind(&slot.name)
    .bind(&slot.location)
    .bind(slot.position.as_str())
    .bind(slot.price_per_day)
    .bind(slot.price_per_view)
    .bind(&slot.ad_type_id)
    .bind(id)
    .execute(pool)
    .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("ad slot"));
    }
    get_ad_slot_by_id(pool, id)
        .await?
        .ok_or(StoreError::NotFound("ad slot"))
}

#[instrument(skip_all)]
pub async fn set_slot_availability(pool: &Pool, id: &str, available: bool) -> Result<()> {
    let res = sqlx::query("UPDATE ad_slots SET is_available = ? WHERE id = ?")
        .bind(available)
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("ad slot"));
    }
    Ok(())
}

/// A slot with booking history is never referentially deleted; it is
/// soft-disabled instead. Slots nothing ever booked are removed outright.
#[instrument(skip_all)]
pub async fn delete_ad_slot(pool: &Pool, id: &str) -> Result<()> {
    let bookings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM ad_slot_bookings WHERE slot_id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
    let res = if bookings > 0 {
        sqlx::query("UPDATE ad_slots SET is_available = 0 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?
    } else {
        sqlx::query("DELETE FROM ad_slots WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?
    };
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("ad slot"));
    }
    Ok(())
}

pub async fn get_ad_slots(pool: &Pool) -> Result<Vec<AdSlot>> {
    let rows = sqlx::query(
        "SELECT id, name, location, position, price_per_day, price_per_view, ad_type_id, \
                is_available, created_at \
         FROM ad_slots ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(slot_from_row).collect()
}

pub async fn get_available_ad_slots(pool: &Pool) -> Result<Vec<AdSlot>> {
    let rows = sqlx::query(
        "SELECT id, name, location, position, price_per_day, price_per_view, ad_type_id, \
                is_available, created_at \
         FROM ad_slots WHERE is_available = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(slot_from_row).collect()
}

pub async fn get_ad_slot_by_id(pool: &Pool, id: &str) -> Result<Option<AdSlot>> {
    let row = sqlx::query(
        "SELECT id, name, location, position, price_per_day, price_per_view, ad_type_id, \
                is_available, created_at \
         FROM ad_slots WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(slot_from_row).transpose()
}

// =============================================================================
//  Booking conflicts
// =============================================================================

/// Closed-interval overlap against every booking whose parent ad still holds
/// the slot. Two ranges overlap iff `existing.start <= new.end AND
/// existing.end >= new.start`; back-to-back ranges on distinct days pass.
/// `exclude_ad` ignores that ad's own bookings, for moving an existing ad.
async fn count_conflicts<'e, E>(
    executor: E,
    slot_id: &str,
    start: NaiveDate,
    end: NaiveDate,
    exclude_ad: Option<&str>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut sql = format!(
        "SELECT COUNT(*) FROM ad_slot_bookings b \
         JOIN ads a ON a.id = b.ad_id \
         WHERE b.slot_id = ? \
           AND a.status IN {} \
           AND a.start_date <= ? AND a.end_date >= ?",
        blocking_statuses_sql()
    );
    if exclude_ad.is_some() {
        sql.push_str(" AND a.id <> ?");
    }
    let mut query = sqlx::query_scalar(&sql).bind(slot_id).bind(end).bind(start);
    if let Some(ad_id) = exclude_ad {
        query = query.bind(ad_id);
    }
    let n: i64 = query.fetch_one(executor).await?;
    Ok(n)
}

/// Read-only availability probe. Advisory: callers that go on to create an ad
/// are re-checked inside the creation transaction.
#[instrument(skip_all)]
pub async fn check_slot_availability(
    pool: &Pool,
    slot_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bool> {
    Ok(count_conflicts(pool, slot_id, start, end, None).await? == 0)
}

/// The same blocking-status filter without the overlap test, for calendar UIs.
pub async fn booked_dates_for_slot(pool: &Pool, slot_id: &str) -> Result<Vec<BookedRange>> {
    let sql = format!(
        "SELECT a.id AS ad_id, a.start_date, a.end_date \
         FROM ad_slot_bookings b \
         JOIN ads a ON a.id = b.ad_id \
         WHERE b.slot_id = ? AND a.status IN {} \
         ORDER BY a.start_date",
        blocking_statuses_sql()
    );
    let rows = sqlx::query(&sql)
        .bind(slot_id)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| {
            Ok(BookedRange {
                ad_id: row.try_get("ad_id")?,
                start_date: row.try_get("start_date")?,
                end_date: row.try_get("end_date")?,
            })
        })
        .collect()
}

// =============================================================================
//  Ads
// =============================================================================

/// Insert the ad and one booking per slot as a single transaction.
/// Availability is re-validated per slot inside the transaction, so two
/// concurrent submissions for the same range cannot both commit.
#[instrument(skip_all)]
pub async fn create_ad(pool: &Pool, new_ad: &NewAd, slot_ids: &[String]) -> Result<Ad> {
    if new_ad.start_date > new_ad.end_date {
        return Err(StoreError::Validation(
            "start_date must not be after end_date".into(),
        ));
    }
    let mut tx = pool.begin().await?;
    for slot_id in slot_ids {
        if count_conflicts(&mut *tx, slot_id, new_ad.start_date, new_ad.end_date, None).await? > 0 {
            return Err(StoreError::SlotUnavailable {
                slot_id: slot_id.clone(),
                start: new_ad.start_date,
                end: new_ad.end_date,
            });
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO ads (id, advertiser_id, title, ad_type_id, payment_type, budget, \
                          target_views, current_views, estimated_cost, start_date, end_date, \
                          status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(&new_ad.advertiser_id)
    .bind(&new_ad.title)
    .bind(&new_ad.ad_type_id)
    .bind(new_ad.payment_type.as_str())
    .bind(new_ad.budget)
    .bind(new_ad.target_views)
    .bind(new_ad.estimated_cost)
    .bind(new_ad.start_date)
    .bind(new_ad.end_date)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for slot_id in slot_ids {
        sqlx::query(
            "INSERT INTO ad_slot_bookings (id, ad_id, slot_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(slot_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(Ad {
        id,
        advertiser_id: new_ad.advertiser_id.clone(),
        title: new_ad.title.clone(),
        ad_type_id: new_ad.ad_type_id.clone(),
        payment_type: new_ad.payment_type,
        budget: new_ad.budget,
        target_views: new_ad.target_views,
        current_views: 0,
        estimated_cost: new_ad.estimated_cost,
        actual_cost: None,
        start_date: new_ad.start_date,
        end_date: new_ad.end_date,
        status: AdStatus::Pending,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_ad(pool: &Pool, id: &str) -> Result<Option<Ad>> {
    let row = sqlx::query(
        "SELECT id, advertiser_id, title, ad_type_id, payment_type, budget, target_views, \
                current_views, estimated_cost, actual_cost, start_date, end_date, status, \
                rejection_reason, created_at, updated_at \
         FROM ads WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(ad_from_row).transpose()
}

pub async fn get_ad_by_id(pool: &Pool, id: &str) -> Result<Option<AdWithSlots>> {
    let mut ads = list_ads_where(pool, "WHERE a.id = ?", Some(id)).await?;
    Ok(ads.pop())
}

pub async fn get_ads_by_advertiser(pool: &Pool, advertiser_id: &str) -> Result<Vec<AdWithSlots>> {
    list_ads_where(pool, "WHERE a.advertiser_id = ?", Some(advertiser_id)).await
}

pub async fn get_pending_ads(pool: &Pool) -> Result<Vec<AdWithSlots>> {
    list_ads_where(pool, "WHERE a.status = 'pending'", None).await
}

pub async fn get_active_ads(pool: &Pool) -> Result<Vec<AdWithSlots>> {
    list_ads_where(pool, "WHERE a.status = 'active'", None).await
}

pub async fn get_all_ads(pool: &Pool) -> Result<Vec<AdWithSlots>> {
    list_ads_where(pool, "", None).await
}

async fn list_ads_where(
    pool: &Pool,
    where_sql: &str,
    bind: Option<&str>,
) -> Result<Vec<AdWithSlots>> {
    let sql = format!(
        "SELECT {AD_USER_COLS} FROM ads a \
         JOIN users u ON u.id = a.advertiser_id \
         {where_sql} ORDER BY datetime(a.created_at) DESC"
    );
    let mut query = sqlx::query(&sql);
    if let Some(value) = bind {
        query = query.bind(value);
    }
    let rows = query.fetch_all(pool).await?;

    let ad_ids: Vec<String> = rows.iter().map(|row| row.get("id")).collect();
    let mut slots_by_ad = slots_for_ads(pool, &ad_ids).await?;

    rows.iter()
        .map(|row| {
            let ad = ad_from_row(row)?;
            let advertiser = user_from_joined_row(row)?;
            let slots = slots_by_ad.remove(&ad.id).unwrap_or_default();
            Ok(AdWithSlots {
                ad,
                advertiser,
                slots,
            })
        })
        .collect()
}

/// One batched query for the slot lists of many ads, so listings stay free of
/// per-ad follow-up queries.
async fn slots_for_ads(pool: &Pool, ad_ids: &[String]) -> Result<HashMap<String, Vec<AdSlot>>> {
    if ad_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ad_ids.len()].join(", ");
    let sql = format!(
        "SELECT b.ad_id AS booking_ad_id, s.id, s.name, s.location, s.position, \
                s.price_per_day, s.price_per_view, s.ad_type_id, s.is_available, s.created_at \
         FROM ad_slot_bookings b \
         JOIN ad_slots s ON s.id = b.slot_id \
         WHERE b.ad_id IN ({placeholders}) \
         ORDER BY s.name"
    );
    let mut query = sqlx::query(&sql);
    for id in ad_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    let mut by_ad: HashMap<String, Vec<AdSlot>> = HashMap::new();
    for row in &rows {
        let ad_id: String = row.try_get("booking_ad_id")?;
        by_ad.entry(ad_id).or_default().push(slot_from_row(row)?);
    }
    Ok(by_ad)
}

/// Partial update. A patch that moves `start_date`/`end_date` re-validates
/// availability on every slot the ad is booked into (ignoring the ad's own
/// bookings) inside the same transaction, so a date change cannot land on
/// top of another blocking booking.
#[instrument(skip_all)]
pub async fn update_ad(pool: &Pool, id: &str, patch: &AdPatch) -> Result<Ad> {
    let mut tx = pool.begin().await?;
    let res = sqlx::query(
        "UPDATE ads SET \
             title = COALESCE(?, title), \
             budget = COALESCE(?, budget), \
             target_views = COALESCE(?, target_views), \
             estimated_cost = COALESCE(?, estimated_cost), \
             actual_cost = COALESCE(?, actual_cost), \
             start_date = COALESCE(?, start_date), \
             end_date = COALESCE(?, end_date), \
             updated_at = ? \
         WHERE id = ?",
    )
    .bind(&patch.title)
    .bind(patch.budget)
    .bind(patch.target_views)
    .bind(patch.estimated_cost)
    .bind(patch.actual_cost)
    .bind(patch.start_date)
    .bind(patch.end_date)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *tx)
    .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("ad"));
    }

    let row = sqlx::query(
        "SELECT id, advertiser_id, title, ad_type_id, payment_type, budget, target_views, \
                current_views, estimated_cost, actual_cost, start_date, end_date, status, \
                rejection_reason, created_at, updated_at \
         FROM ads WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    let ad = ad_from_row(&row)?;
    if ad.start_date > ad.end_date {
        // Dropping the transaction rolls the patch back.
        return Err(StoreError::Validation(
            "start_date must not be after end_date".into(),
        ));
    }

    let dates_moved = patch.start_date.is_some() || patch.end_date.is_some();
    if dates_moved && ad.status.blocks_slot() {
        let slot_ids: Vec<String> =
            sqlx::query_scalar("SELECT slot_id FROM ad_slot_bookings WHERE ad_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        for slot_id in &slot_ids {
            if count_conflicts(&mut *tx, slot_id, ad.start_date, ad.end_date, Some(id)).await? > 0
            {
                return Err(StoreError::SlotUnavailable {
                    slot_id: slot_id.clone(),
                    start: ad.start_date,
                    end: ad.end_date,
                });
            }
        }
    }
    tx.commit().await?;
    Ok(ad)
}

/// Drives the status state machine. A rejection needs a non-empty reason;
/// every other transition clears the stored reason.
#[instrument(skip_all)]
pub async fn update_ad_status(
    pool: &Pool,
    id: &str,
    next: AdStatus,
    rejection_reason: Option<&str>,
) -> Result<Ad> {
    let mut tx = pool.begin().await?;
    let current: Option<String> = sqlx::query_scalar("SELECT status FROM ads WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(current) = current else {
        return Err(StoreError::NotFound("ad"));
    };
    let from = AdStatus::parse_status(&current).ok_or_else(|| decode_err("status", &current))?;
    if !from.can_transition_to(next) {
        return Err(StoreError::InvalidTransition { from, to: next });
    }

    let reason = match next {
        AdStatus::Rejected => {
            let reason = rejection_reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    StoreError::Validation("rejection requires a non-empty reason".into())
                })?;
            Some(reason.to_string())
        }
        _ => None,
    };

    sqlx::query("UPDATE ads SET status = ?, rejection_reason = ?, updated_at = ? WHERE id = ?")
        .bind(next.as_str())
        .bind(&reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    get_ad(pool, id).await?.ok_or(StoreError::NotFound("ad"))
}

// =============================================================================
//  View tracking & analytics
// =============================================================================

/// Append one immutable impression row and bump the ad's counter in place
/// (`current_views = current_views + 1`, no read-modify-write) within one
/// transaction. Every call counts; there is no dedup by IP or session.
#[instrument(skip_all)]
pub async fn track_ad_view(
    pool: &Pool,
    ad_id: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
    referrer: Option<&str>,
) -> Result<AdView> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let res = sqlx::query("UPDATE ads SET current_views = current_views + 1 WHERE id = ?")
        .bind(ad_id)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("ad"));
    }
    sqlx::query(
        "INSERT INTO ad_views (id, ad_id, ip_address, user_agent, referrer, viewed_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(ad_id)
    .bind(ip_address)
    .bind(user_agent)
    .bind(referrer)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(AdView {
        id,
        ad_id: ad_id.to_string(),
        ip_address: ip_address.map(str::to_owned),
        user_agent: user_agent.map(str::to_owned),
        referrer: referrer.map(str::to_owned),
        viewed_at: now,
    })
}

async fn count_views_since(
    pool: &Pool,
    ad_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<i64> {
    let count: i64 = match since {
        Some(since) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM ad_views \
                 WHERE ad_id = ? AND datetime(viewed_at) >= datetime(?)",
            )
            .bind(ad_id)
            .bind(since)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM ad_views WHERE ad_id = ?")
                .bind(ad_id)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}

/// Four independent filtered counts over the impression log. Boundaries are
/// local calendar starts (midnight / most recent Sunday / the 1st).
#[instrument(skip_all)]
pub async fn get_ad_analytics(pool: &Pool, ad_id: &str) -> Result<AdAnalytics> {
    let periods = period_starts(Local::now());
    Ok(AdAnalytics {
        total_views: count_views_since(pool, ad_id, None).await?,
        views_today: count_views_since(pool, ad_id, Some(periods.today)).await?,
        views_this_week: count_views_since(pool, ad_id, Some(periods.week)).await?,
        views_this_month: count_views_since(pool, ad_id, Some(periods.month)).await?,
    })
}

/// Dashboard listing: total and today view counts per ad in one grouped pass,
/// slots attached afterwards from one batched query.
#[instrument(skip_all)]
pub async fn get_advertiser_ads_with_analytics(
    pool: &Pool,
    advertiser_id: &str,
) -> Result<Vec<AdWithAnalytics>> {
    let today = period_starts(Local::now()).today;
    let sql = format!(
        "SELECT {AD_USER_COLS}, COUNT(v.id) AS view_count, \
                COALESCE(SUM(CASE WHEN datetime(v.viewed_at) >= datetime(?) THEN 1 ELSE 0 END), 0) \
                    AS views_today \
         FROM ads a \
         JOIN users u ON u.id = a.advertiser_id \
         LEFT JOIN ad_views v ON v.ad_id = a.id \
         WHERE a.advertiser_id = ? \
         GROUP BY a.id \
         ORDER BY datetime(a.created_at) DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(today)
        .bind(advertiser_id)
        .fetch_all(pool)
        .await?;

    let ad_ids: Vec<String> = rows.iter().map(|row| row.get("id")).collect();
    let mut slots_by_ad = slots_for_ads(pool, &ad_ids).await?;

    rows.iter()
        .map(|row| {
            let ad = ad_from_row(row)?;
            let advertiser = user_from_joined_row(row)?;
            let slots = slots_by_ad.remove(&ad.id).unwrap_or_default();
            Ok(AdWithAnalytics {
                ad,
                advertiser,
                slots,
                view_count: row.try_get("view_count")?,
                views_today: row.try_get("views_today")?,
            })
        })
        .collect()
}

/// Admin overview counters. Monthly revenue sums `actual_cost` of active ads
/// created since the 1st, local midnight.
#[instrument(skip_all)]
pub async fn get_statistics(pool: &Pool) -> Result<Statistics> {
    let pending_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE status = 'pending'")
            .fetch_one(pool)
            .await?;
    let active_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads WHERE status = 'active'")
        .fetch_one(pool)
        .await?;
    let advertiser_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'advertiser'")
            .fetch_one(pool)
            .await?;
    let month_start = period_starts(Local::now()).month;
    let monthly_revenue: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(actual_cost), 0.0) FROM ads \
         WHERE status = 'active' AND datetime(created_at) >= datetime(?)",
    )
    .bind(month_start)
    .fetch_one(pool)
    .await?;
    Ok(Statistics {
        pending_count,
        active_count,
        advertiser_count,
        monthly_revenue,
    })
}

// =============================================================================
//  Notifications
// =============================================================================

#[instrument(skip_all)]
pub async fn create_notification(
    pool: &Pool,
    user_id: &str,
    title: &str,
    message: &str,
    ad_id: Option<&str>,
) -> Result<Notification> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO notifications (id, user_id, title, message, ad_id, is_read, created_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(ad_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(Notification {
        id,
        user_id: user_id.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        ad_id: ad_id.map(str::to_owned),
        is_read: false,
        created_at: now,
    })
}

pub async fn get_notifications(pool: &Pool, user_id: &str) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT id, user_id, title, message, ad_id, is_read, created_at FROM notifications \
         WHERE user_id = ? ORDER BY datetime(created_at) DESC, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(notification_from_row).collect()
}

#[instrument(skip_all)]
pub async fn mark_notification_read(pool: &Pool, id: &str) -> Result<()> {
    let res = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound("notification"));
    }
    Ok(())
}

/// Idempotent: re-running against already-read rows is a no-op.
#[instrument(skip_all)]
pub async fn mark_all_notifications_read(pool: &Pool, user_id: &str) -> Result<()> {
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
//  Row mapping
// =============================================================================

fn decode_err(column: &str, value: &str) -> StoreError {
    StoreError::Db(sqlx::Error::ColumnDecode {
        index: column.into(),
        source: format!("unrecognized value '{value}'").into(),
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role_str: String = row.try_get("role")?;
    let role = UserRole::parse_role(&role_str).ok_or_else(|| decode_err("role", &role_str))?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role,
        created_at: row.try_get("created_at")?,
    })
}

/// Advertiser columns of a joined ads/users row (aliased with a `u_` prefix).
fn user_from_joined_row(row: &SqliteRow) -> Result<User> {
    let role_str: String = row.try_get("u_role")?;
    let role = UserRole::parse_role(&role_str).ok_or_else(|| decode_err("u_role", &role_str))?;
    Ok(User {
        id: row.try_get("u_id")?,
        email: row.try_get("u_email")?,
        first_name: row.try_get("u_first_name")?,
        last_name: row.try_get("u_last_name")?,
        role,
        created_at: row.try_get("u_created_at")?,
    })
}

fn ad_type_from_row(row: &SqliteRow) -> Result<AdType> {
    Ok(AdType {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        preview_image: row.try_get("preview_image")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn slot_from_row(row: &SqliteRow) -> Result<AdSlot> {
    let position_str: String = row.try_get("position")?;
    let position = SlotPosition::parse_position(&position_str)
        .ok_or_else(|| decode_err("position", &position_str))?;
    Ok(AdSlot {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        position,
        price_per_day: row.try_get("price_per_day")?,
        price_per_view: row.try_get("price_per_view")?,
        ad_type_id: row.try_get("ad_type_id")?,
        is_available: row.try_get("is_available")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ad_from_row(row: &SqliteRow) -> Result<Ad> {
    let status_str: String = row.try_get("status")?;
    let status =
        AdStatus::parse_status(&status_str).ok_or_else(|| decode_err("status", &status_str))?;
    let payment_str: String = row.try_get("payment_type")?;
    let payment_type = PaymentType::parse_payment_type(&payment_str)
        .ok_or_else(|| decode_err("payment_type", &payment_str))?;
    Ok(Ad {
        id: row.try_get("id")?,
        advertiser_id: row.try_get("advertiser_id")?,
        title: row.try_get("title")?,
        ad_type_id: row.try_get("ad_type_id")?,
        payment_type,
        budget: row.try_get("budget")?,
        target_views: row.try_get("target_views")?,
        current_views: row.try_get("current_views")?,
        estimated_cost: row.try_get("estimated_cost")?,
        actual_cost: row.try_get("actual_cost")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        ad_id: row.try_get("ad_id")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}
