use adboard::db::{self, AdPatch, NewAd, NewAdSlot, Pool};
use adboard::error::StoreError;
use adboard::model::{AdStatus, PaymentType, SlotPosition, UserRole};
use chrono::NaiveDate;

async fn setup_pool() -> Pool {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed_advertiser(pool: &Pool, id: &str) -> String {
    db::upsert_user(pool, id, None, Some("Ada"), None, UserRole::Advertiser)
        .await
        .unwrap()
        .id
}

async fn seed_slot(pool: &Pool, name: &str) -> String {
    db::create_ad_slot(
        pool,
        &NewAdSlot {
            name: name.into(),
            location: "homepage".into(),
            position: SlotPosition::Top,
            price_per_day: 10.0,
            price_per_view: 0.01,
            ad_type_id: None,
        },
    )
    .await
    .unwrap()
    .id
}

fn campaign(advertiser: &str, title: &str, start: NaiveDate, end: NaiveDate) -> NewAd {
    NewAd {
        advertiser_id: advertiser.into(),
        title: title.into(),
        ad_type_id: None,
        payment_type: PaymentType::PerPeriod,
        budget: 100.0,
        target_views: None,
        estimated_cost: None,
        start_date: start,
        end_date: end,
    }
}

#[tokio::test]
async fn homepage_banner_scenario() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Homepage Banner").await;

    let ad = db::create_ad(
        &pool,
        &campaign(&advertiser, "June promo", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();
    db::update_ad_status(&pool, &ad.id, AdStatus::Approved, None)
        .await
        .unwrap();
    db::update_ad_status(&pool, &ad.id, AdStatus::Active, None)
        .await
        .unwrap();

    // Overlapping request must be refused.
    assert!(
        !db::check_slot_availability(&pool, &slot, date(2024, 6, 5), date(2024, 6, 15))
            .await
            .unwrap()
    );
    // Contiguous start the day after the booking ends is allowed.
    assert!(
        db::check_slot_availability(&pool, &slot, date(2024, 6, 11), date(2024, 6, 20))
            .await
            .unwrap()
    );
    db::create_ad(
        &pool,
        &campaign(&advertiser, "Follow-up", date(2024, 6, 11), date(2024, 6, 20)),
        &[slot.clone()],
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn pending_ads_block_the_slot() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Sidebar").await;

    db::create_ad(
        &pool,
        &campaign(&advertiser, "Unreviewed", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();

    assert!(
        !db::check_slot_availability(&pool, &slot, date(2024, 6, 10), date(2024, 6, 12))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn rejected_and_completed_ads_free_the_slot() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Banner").await;

    let ad = db::create_ad(
        &pool,
        &campaign(&advertiser, "First try", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();
    db::update_ad_status(&pool, &ad.id, AdStatus::Rejected, Some("off brand"))
        .await
        .unwrap();
    assert!(
        db::check_slot_availability(&pool, &slot, date(2024, 6, 1), date(2024, 6, 10))
            .await
            .unwrap()
    );

    let ad2 = db::create_ad(
        &pool,
        &campaign(&advertiser, "Second try", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();
    db::update_ad_status(&pool, &ad2.id, AdStatus::Approved, None)
        .await
        .unwrap();
    db::update_ad_status(&pool, &ad2.id, AdStatus::Active, None)
        .await
        .unwrap();
    db::update_ad_status(&pool, &ad2.id, AdStatus::Completed, None)
        .await
        .unwrap();
    assert!(
        db::check_slot_availability(&pool, &slot, date(2024, 6, 1), date(2024, 6, 10))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn zero_length_range_still_conflicts() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Popup").await;

    db::create_ad(
        &pool,
        &campaign(&advertiser, "One day", date(2024, 6, 1), date(2024, 6, 1)),
        &[slot.clone()],
    )
    .await
    .unwrap();

    assert!(
        !db::check_slot_availability(&pool, &slot, date(2024, 6, 1), date(2024, 6, 1))
            .await
            .unwrap()
    );
    assert!(
        db::check_slot_availability(&pool, &slot, date(2024, 6, 2), date(2024, 6, 2))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn sharing_a_day_conflicts_but_back_to_back_does_not() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Inline").await;

    db::create_ad(
        &pool,
        &campaign(&advertiser, "Base", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();

    // New range starting on the booking's last day shares that day.
    assert!(
        !db::check_slot_availability(&pool, &slot, date(2024, 6, 10), date(2024, 6, 12))
            .await
            .unwrap()
    );
    // Starting the next day is a valid back-to-back booking.
    assert!(
        db::check_slot_availability(&pool, &slot, date(2024, 6, 11), date(2024, 6, 12))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn create_ad_revalidates_inside_the_transaction() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Banner").await;

    db::create_ad(
        &pool,
        &campaign(&advertiser, "Holder", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();

    // Calling create_ad directly (skipping the advisory pre-check) must
    // still be refused by the in-transaction check.
    let err = db::create_ad(
        &pool,
        &campaign(&advertiser, "Racer", date(2024, 6, 8), date(2024, 6, 12)),
        &[slot.clone()],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::SlotUnavailable { .. }));

    let ads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads")
        .fetch_one(&pool)
        .await
        .unwrap();
    let bookings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ad_slot_bookings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(ads, 1);
    assert_eq!(bookings, 1);
}

#[tokio::test]
async fn update_ad_cannot_move_onto_another_booking() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Banner").await;

    db::create_ad(
        &pool,
        &campaign(&advertiser, "Holder", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();
    let mover = db::create_ad(
        &pool,
        &campaign(&advertiser, "Mover", date(2024, 7, 1), date(2024, 7, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();

    // Patching the dates onto the other booking's range must be refused.
    let err = db::update_ad(
        &pool,
        &mover.id,
        &AdPatch {
            start_date: Some(date(2024, 6, 5)),
            end_date: Some(date(2024, 6, 15)),
            ..AdPatch::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::SlotUnavailable { .. }));

    // The refused patch left the dates untouched.
    let current = db::get_ad(&pool, &mover.id).await.unwrap().unwrap();
    assert_eq!(current.start_date, date(2024, 7, 1));
    assert_eq!(current.end_date, date(2024, 7, 10));

    // A move overlapping only the ad's own booking does not self-conflict.
    let moved = db::update_ad(
        &pool,
        &mover.id,
        &AdPatch {
            start_date: Some(date(2024, 7, 5)),
            end_date: Some(date(2024, 7, 15)),
            ..AdPatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.start_date, date(2024, 7, 5));

    // Once the ad no longer holds the slot, its dates can move freely.
    db::update_ad_status(&pool, &mover.id, AdStatus::Rejected, Some("duplicate"))
        .await
        .unwrap();
    db::update_ad(
        &pool,
        &mover.id,
        &AdPatch {
            start_date: Some(date(2024, 6, 5)),
            end_date: Some(date(2024, 6, 15)),
            ..AdPatch::default()
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn booked_dates_lists_blocking_bookings_only() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let slot = seed_slot(&pool, "Banner").await;

    let kept = db::create_ad(
        &pool,
        &campaign(&advertiser, "Kept", date(2024, 6, 1), date(2024, 6, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();
    let dropped = db::create_ad(
        &pool,
        &campaign(&advertiser, "Dropped", date(2024, 7, 1), date(2024, 7, 10)),
        &[slot.clone()],
    )
    .await
    .unwrap();
    db::update_ad_status(&pool, &dropped.id, AdStatus::Rejected, Some("duplicate"))
        .await
        .unwrap();

    let ranges = db::booked_dates_for_slot(&pool, &slot).await.unwrap();
    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0].ad_id, kept.id);
    assert_eq!(ranges[0].start_date, date(2024, 6, 1));
    assert_eq!(ranges[0].end_date, date(2024, 6, 10));
}

#[tokio::test]
async fn slot_with_bookings_is_soft_disabled_not_deleted() {
    let pool = setup_pool().await;
    let advertiser = seed_advertiser(&pool, "adv1").await;
    let booked = seed_slot(&pool, "Booked").await;
    let unused = seed_slot(&pool, "Unused").await;

    db::create_ad(
        &pool,
        &campaign(&advertiser, "Campaign", date(2024, 6, 1), date(2024, 6, 10)),
        &[booked.clone()],
    )
    .await
    .unwrap();

    db::delete_ad_slot(&pool, &booked).await.unwrap();
    db::delete_ad_slot(&pool, &unused).await.unwrap();

    // Booked slot survives, just no longer purchasable.
    let remaining = db::get_ad_slots(&pool).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, booked);
    assert!(!remaining[0].is_available);
    assert!(db::get_available_ad_slots(&pool).await.unwrap().is_empty());
    assert!(db::get_ad_slot_by_id(&pool, &unused).await.unwrap().is_none());
}

#[tokio::test]
async fn slot_update_and_availability_toggle() {
    let pool = setup_pool().await;
    let slot = seed_slot(&pool, "Old name").await;

    let updated = db::update_ad_slot(
        &pool,
        &slot,
        &NewAdSlot {
            name: "New name".into(),
            location: "article page".into(),
            position: SlotPosition::Middle,
            price_per_day: 25.0,
            price_per_view: 0.05,
            ad_type_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "New name");
    assert_eq!(updated.position, SlotPosition::Middle);

    db::set_slot_availability(&pool, &slot, false).await.unwrap();
    assert!(db::get_available_ad_slots(&pool).await.unwrap().is_empty());

    let err = db::set_slot_availability(&pool, "missing", true)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound("ad slot")));
}
