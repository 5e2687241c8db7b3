use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ad campaign status. Transitions are driven either by an admin decision
/// (approve/reject), by the advertiser (pause/resume), or by the system
/// (end of period or view target reached).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Pending,
    Approved,
    Active,
    Rejected,
    Paused,
    Completed,
}

impl AdStatus {
    /// Every status, for exhaustive iteration.
    pub const ALL: [AdStatus; 6] = [
        AdStatus::Pending,
        AdStatus::Approved,
        AdStatus::Active,
        AdStatus::Rejected,
        AdStatus::Paused,
        AdStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdStatus::Pending => "pending",
            AdStatus::Approved => "approved",
            AdStatus::Active => "active",
            AdStatus::Rejected => "rejected",
            AdStatus::Paused => "paused",
            AdStatus::Completed => "completed",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AdStatus::Pending),
            "approved" => Some(AdStatus::Approved),
            "active" => Some(AdStatus::Active),
            "rejected" => Some(AdStatus::Rejected),
            "paused" => Some(AdStatus::Paused),
            "completed" => Some(AdStatus::Completed),
            _ => None,
        }
    }

    /// An ad in one of these states holds its slot bookings against new ads.
    /// Rejected, paused and completed campaigns free the slot immediately.
    pub fn blocks_slot(&self) -> bool {
        matches!(self, AdStatus::Pending | AdStatus::Approved | AdStatus::Active)
    }

    /// The single place that knows which transitions are legal.
    pub fn can_transition_to(&self, next: AdStatus) -> bool {
        use AdStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Paused, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AdStatus::Rejected | AdStatus::Completed)
    }
}

impl fmt::Display for AdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an ad is billed: a flat rate over the booked period, or per impression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    PerPeriod,
    PerView,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::PerPeriod => "per_period",
            PaymentType::PerView => "per_view",
        }
    }

    pub fn parse_payment_type(s: &str) -> Option<Self> {
        match s {
            "per_period" => Some(PaymentType::PerPeriod),
            "per_view" => Some(PaymentType::PerView),
            _ => None,
        }
    }
}

/// Placement of a slot on the page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotPosition {
    Top,
    Bottom,
    Right,
    Middle,
}

impl SlotPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotPosition::Top => "top",
            SlotPosition::Bottom => "bottom",
            SlotPosition::Right => "right",
            SlotPosition::Middle => "middle",
        }
    }

    pub fn parse_position(s: &str) -> Option<Self> {
        match s {
            "top" => Some(SlotPosition::Top),
            "bottom" => Some(SlotPosition::Bottom),
            "right" => Some(SlotPosition::Right),
            "middle" => Some(SlotPosition::Middle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Advertiser,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Advertiser => "advertiser",
        }
    }

    pub fn parse_role(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "advertiser" => Some(UserRole::Advertiser),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Slot category (banner, sidebar, inline, popup, ...). Soft-deleted via
/// `is_active` so historic ads keep their category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub preview_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A purchasable advertising placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSlot {
    pub id: String,
    pub name: String,
    pub location: String,
    pub position: SlotPosition,
    pub price_per_day: f64,
    pub price_per_view: f64,
    pub ad_type_id: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// An ad campaign. The booked calendar range lives here; slot links live in
/// `ad_slot_bookings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub advertiser_id: String,
    pub title: String,
    pub ad_type_id: Option<String>,
    pub payment_type: PaymentType,
    pub budget: f64,
    pub target_views: Option<i64>,
    pub current_views: i64,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: AdStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Join row linking one ad to one slot. Many slots per ad, many ads per slot
/// over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSlotBooking {
    pub id: String,
    pub ad_id: String,
    pub slot_id: String,
    pub created_at: DateTime<Utc>,
}

/// One recorded impression. Append-only; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdView {
    pub id: String,
    pub ad_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub ad_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in AdStatus::ALL {
            assert_eq!(AdStatus::parse_status(s.as_str()), Some(s));
        }
        assert_eq!(AdStatus::parse_status("bogus"), None);
    }

    #[test]
    fn transition_table() {
        use AdStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Paused.can_transition_to(Completed));

        // No skipping ahead and no leaving terminal states.
        assert!(!Pending.can_transition_to(Active));
        assert!(!Approved.can_transition_to(Paused));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn blocking_statuses() {
        use AdStatus::*;
        assert!(Pending.blocks_slot());
        assert!(Approved.blocks_slot());
        assert!(Active.blocks_slot());
        assert!(!Rejected.blocks_slot());
        assert!(!Paused.blocks_slot());
        assert!(!Completed.blocks_slot());
    }
}
