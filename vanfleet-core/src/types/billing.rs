//! Plans and fleet subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::persistence::Entity;

/// How often a plan is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

/// A subscription plan defining the van quota of a fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    /// ISO 4217 code
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub duration_in_months: u32,
    /// Plan offered to new fleets
    pub is_default: bool,
    pub max_vans: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_by_user_id: Option<Uuid>,
}

impl Entity for Plan {
    const KIND: &'static str = "Plan";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Binds a fleet to a plan for a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSubscription {
    pub id: Uuid,
    pub fleet_id: Uuid,
    pub plan_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

impl FleetSubscription {
    /// Active and not yet past its end date.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date > now
    }
}

impl Entity for FleetSubscription {
    const KIND: &'static str = "FleetSubscription";

    fn id(&self) -> Uuid {
        self.id
    }
}
