//! Fleet subscription rules and plan quotas.

use chrono::{DateTime, Duration, Utc};
use vanfleet_core::types::{Fleet, FleetSubscription, Plan};

use crate::context::SubscriptionScope;
use crate::subjects::Subject;

pub const EXPIRING_SOON_DAYS: i64 = 7;
pub const RENEWAL_GRACE_DAYS: i64 = 30;

fn owns(subject: &Subject, subscription: &SubscriptionScope) -> bool {
    subject.roles.is_fleet_owner() && subscription.fleet.owner_user_id == subject.id()
}

pub fn can_access_subscription(subject: &Subject, subscription: &SubscriptionScope) -> bool {
    subject.roles.is_admin() || owns(subject, subscription)
}

/// Subscribe, renew and cancel.
pub fn can_manage_subscription(subject: &Subject, subscription: &SubscriptionScope) -> bool {
    subject.roles.is_admin() || owns(subject, subscription)
}

pub fn can_delete_subscription(subject: &Subject) -> bool {
    subject.roles.is_admin()
}

/// A fleet owner may open another fleet when none of their fleets is active
/// yet, or when at least one of them has been subscribed.
pub fn can_create_fleet(owned_fleets: &[Fleet], subscriptions: &[FleetSubscription]) -> bool {
    if !owned_fleets.iter().any(|fleet| fleet.is_active) {
        return true;
    }
    owned_fleets.iter().any(|fleet| {
        subscriptions
            .iter()
            .any(|subscription| subscription.fleet_id == fleet.id)
    })
}

fn has_current_plan(
    fleet: &Fleet,
    plan: &Plan,
    subscription: Option<&FleetSubscription>,
    now: DateTime<Utc>,
) -> bool {
    fleet.is_active
        && plan.is_active
        && subscription.is_some_and(|s| s.fleet_id == fleet.id && s.is_current(now))
}

/// The plan's van quota is exclusive: `max_vans` vans fill the fleet.
pub fn can_add_van(
    fleet: &Fleet,
    plan: &Plan,
    subscription: Option<&FleetSubscription>,
    van_count: usize,
    now: DateTime<Utc>,
) -> bool {
    has_current_plan(fleet, plan, subscription, now) && van_count < plan.max_vans as usize
}

pub fn can_add_driver(
    fleet: &Fleet,
    plan: &Plan,
    subscription: Option<&FleetSubscription>,
    now: DateTime<Utc>,
) -> bool {
    has_current_plan(fleet, plan, subscription, now)
}

pub fn can_add_route(
    fleet: &Fleet,
    plan: &Plan,
    subscription: Option<&FleetSubscription>,
    now: DateTime<Utc>,
) -> bool {
    has_current_plan(fleet, plan, subscription, now)
}

/// Still running, with a week or less left.
pub fn is_expiring_soon(subscription: &FleetSubscription, now: DateTime<Utc>) -> bool {
    subscription.is_current(now)
        && subscription.end_date - now <= Duration::days(EXPIRING_SOON_DAYS)
}

/// Running, or ended at most thirty days ago.
pub fn can_renew(subscription: &FleetSubscription, now: DateTime<Utc>) -> bool {
    subscription.is_current(now)
        || now - subscription.end_date <= Duration::days(RENEWAL_GRACE_DAYS)
}
