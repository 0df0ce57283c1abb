//! Fleet subscriptions: subscribe, renew, cancel.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{Fleet, FleetSubscription, Plan};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::SubscriptionScope;
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::subscription as rules;

use super::{Request, RequestContext, RequestHandler};

/// The running subscription of a fleet and its plan, if any.
pub(crate) async fn current_plan(
    ctx: &RequestContext,
    fleet_id: Uuid,
) -> Result<Option<(FleetSubscription, Plan)>> {
    let now = ctx.now();
    let current = ctx
        .uow
        .find::<FleetSubscription>(|s| s.fleet_id == fleet_id && s.is_current(now))
        .await?
        .into_iter()
        .max_by_key(|s| s.end_date);
    let Some(subscription) = current else {
        return Ok(None);
    };
    let plan = ctx.uow.get_by_id::<Plan>(subscription.plan_id).await?;
    Ok(plan.map(|plan| (subscription, plan)))
}

/// Apply `check` to the fleet's current plan; no plan means no.
pub(crate) async fn plan_allows(
    ctx: &RequestContext,
    fleet: &Fleet,
    check: impl Fn(&Fleet, &Plan, Option<&FleetSubscription>, DateTime<Utc>) -> bool,
) -> Result<bool> {
    let now = ctx.now();
    Ok(match current_plan(ctx, fleet.id).await? {
        Some((subscription, plan)) => check(fleet, &plan, Some(&subscription), now),
        None => false,
    })
}

fn add_months(from: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    from.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::validation("Subscription end date is out of range"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscribe {
    pub fleet_id: Uuid,
    pub plan_id: Uuid,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewSubscription {
    #[serde(default)]
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelSubscription {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteSubscription {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSubscriptionsByFleet {
    pub fleet_id: Uuid,
}

/// A subscription as listed for its fleet, flagged when a week or less is
/// left.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: FleetSubscription,
    pub expiring_soon: bool,
}

impl Request for Subscribe {
    type Response = FleetSubscription;
    const NAME: &'static str = "Subscribe";
}

impl Request for RenewSubscription {
    type Response = FleetSubscription;
    const NAME: &'static str = "RenewSubscription";
}

impl Request for CancelSubscription {
    type Response = FleetSubscription;
    const NAME: &'static str = "CancelSubscription";
}

impl Request for DeleteSubscription {
    type Response = ();
    const NAME: &'static str = "DeleteSubscription";
}

impl Request for GetSubscriptionsByFleet {
    type Response = Vec<SubscriptionView>;
    const NAME: &'static str = "GetSubscriptionsByFleet";
}

pub struct SubscriptionHandlers;

impl SubscriptionHandlers {
    async fn load(
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<(FleetSubscription, SubscriptionScope)> {
        let subscription = ctx.uow.require::<FleetSubscription>(id).await?;
        let scope = ctx.resolver().subscription(&subscription).await?;
        Ok((subscription, scope))
    }
}

#[async_trait]
impl RequestHandler<Subscribe> for SubscriptionHandlers {
    async fn handle(
        &self,
        request: Subscribe,
        ctx: &mut RequestContext,
    ) -> Result<FleetSubscription> {
        let subject = ctx.subject().await?;
        let fleet = ctx.resolver().fleet_by_id(request.fleet_id).await?;
        let scope = SubscriptionScope {
            subscription_id: Uuid::new_v4(),
            fleet,
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::FleetSubscription,
            Some(scope.subscription_id),
            rules::can_manage_subscription(&subject, &scope),
        )?;

        let plan = ctx.uow.require::<Plan>(request.plan_id).await?;
        if !plan.is_active {
            return Err(Error::validation("The selected plan is not available"));
        }
        if current_plan(ctx, request.fleet_id).await?.is_some() {
            return Err(Error::validation("The fleet already has an active subscription"));
        }

        let now = ctx.now();
        let subscription = FleetSubscription {
            id: scope.subscription_id,
            fleet_id: request.fleet_id,
            plan_id: plan.id,
            start_date: now,
            end_date: add_months(now, plan.duration_in_months)?,
            is_active: true,
            created_at: now,
            updated_at: None,
            cancellation_reason: None,
            cancelled_at: None,
            transaction_id: request.transaction_id,
            payment_method: request.payment_method,
            notes: request.notes,
        };
        ctx.uow.add(&subscription)?;
        ctx.save().await?;

        info!(
            actor = %subject.id(),
            fleet = %subscription.fleet_id,
            plan = %plan.name,
            "Fleet subscribed"
        );
        Ok(subscription)
    }
}

#[async_trait]
impl RequestHandler<RenewSubscription> for SubscriptionHandlers {
    async fn handle(
        &self,
        request: RenewSubscription,
        ctx: &mut RequestContext,
    ) -> Result<FleetSubscription> {
        let subject = ctx.subject().await?;
        let (mut subscription, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::FleetSubscription,
            Some(subscription.id),
            rules::can_manage_subscription(&subject, &scope),
        )?;

        let now = ctx.now();
        if !rules::can_renew(&subscription, now) {
            return Err(Error::validation(
                "The subscription ended too long ago to be renewed",
            ));
        }
        let plan = ctx.uow.require::<Plan>(subscription.plan_id).await?;
        if !plan.is_active {
            return Err(Error::validation("The subscribed plan is no longer available"));
        }

        let from = subscription.end_date.max(now);
        subscription.end_date = add_months(from, plan.duration_in_months)?;
        subscription.is_active = true;
        subscription.cancelled_at = None;
        subscription.cancellation_reason = None;
        subscription.updated_at = Some(now);
        ctx.uow.update(&subscription)?;
        ctx.save().await?;

        info!(actor = %subject.id(), subscription = %subscription.id, "Renewed subscription");
        Ok(subscription)
    }
}

#[async_trait]
impl RequestHandler<CancelSubscription> for SubscriptionHandlers {
    async fn handle(
        &self,
        request: CancelSubscription,
        ctx: &mut RequestContext,
    ) -> Result<FleetSubscription> {
        let subject = ctx.subject().await?;
        let (mut subscription, scope) = Self::load(ctx, request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::FleetSubscription,
            Some(subscription.id),
            rules::can_manage_subscription(&subject, &scope),
        )?;
        if !subscription.is_active {
            return Err(Error::validation("The subscription is already cancelled"));
        }

        let now = ctx.now();
        subscription.is_active = false;
        subscription.cancelled_at = Some(now);
        subscription.cancellation_reason = request.reason;
        subscription.updated_at = Some(now);
        ctx.uow.update(&subscription)?;
        ctx.save().await?;

        info!(actor = %subject.id(), subscription = %subscription.id, "Cancelled subscription");
        Ok(subscription)
    }
}

#[async_trait]
impl RequestHandler<DeleteSubscription> for SubscriptionHandlers {
    async fn handle(&self, request: DeleteSubscription, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let subscription = ctx.uow.require::<FleetSubscription>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::FleetSubscription,
            Some(subscription.id),
            rules::can_delete_subscription(&subject),
        )?;

        ctx.uow.delete(&subscription);
        ctx.save().await?;
        info!(actor = %subject.id(), subscription = %subscription.id, "Deleted subscription");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetSubscriptionsByFleet> for SubscriptionHandlers {
    async fn handle(
        &self,
        request: GetSubscriptionsByFleet,
        ctx: &mut RequestContext,
    ) -> Result<Vec<SubscriptionView>> {
        let subject = ctx.subject().await?;
        let fleet = ctx.resolver().fleet_by_id(request.fleet_id).await?;
        let scope = SubscriptionScope {
            subscription_id: Uuid::nil(),
            fleet,
        };
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::FleetSubscription,
            None,
            rules::can_access_subscription(&subject, &scope),
        )?;

        let mut subscriptions = ctx
            .uow
            .find::<FleetSubscription>(|s| s.fleet_id == request.fleet_id)
            .await?;
        subscriptions.sort_by_key(|s| s.start_date);
        let now = ctx.now();
        Ok(subscriptions
            .into_iter()
            .map(|subscription| SubscriptionView {
                expiring_soon: rules::is_expiring_soon(&subscription, now),
                subscription,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::Harness;
    use chrono::Duration;
    use vanfleet_core::Clock;

    #[tokio::test]
    async fn test_subscribe_renew_cancel() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        let plan = harness.plan(2);
        harness.put(&plan).await;

        let subscription = SubscriptionHandlers
            .handle(
                Subscribe {
                    fleet_id: fleet.id,
                    plan_id: plan.id,
                    payment_method: Some("pix".into()),
                    transaction_id: None,
                    notes: None,
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        assert!(subscription.is_current(harness.clock.now()));

        let again = SubscriptionHandlers
            .handle(
                Subscribe {
                    fleet_id: fleet.id,
                    plan_id: plan.id,
                    payment_method: None,
                    transaction_id: None,
                    notes: None,
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap_err();
        assert_eq!(again.status_code(), 400);

        let renewed = SubscriptionHandlers
            .handle(
                RenewSubscription { id: subscription.id },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        assert!(renewed.end_date > subscription.end_date);

        let cancelled = SubscriptionHandlers
            .handle(
                CancelSubscription {
                    id: subscription.id,
                    reason: Some("Closing".into()),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        assert!(!cancelled.is_active);
        assert!(cancelled.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_renewal_window_closes() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        let plan = harness.plan(2);
        harness.put(&plan).await;

        let subscription = SubscriptionHandlers
            .handle(
                Subscribe {
                    fleet_id: fleet.id,
                    plan_id: plan.id,
                    payment_method: None,
                    transaction_id: None,
                    notes: None,
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();

        harness.clock.advance(Duration::days(120));
        let err = SubscriptionHandlers
            .handle(
                RenewSubscription { id: subscription.id },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_listing_flags_subscriptions_about_to_end() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        let subscription = harness.subscribe(&fleet, 2).await;
        let list = || GetSubscriptionsByFleet { fleet_id: fleet.id };

        let listed = SubscriptionHandlers
            .handle(list(), &mut harness.as_user(&owner))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].subscription.id, subscription.id);
        assert!(!listed[0].expiring_soon);

        harness.clock.advance(Duration::days(25));
        let listed = SubscriptionHandlers
            .handle(list(), &mut harness.as_user(&owner))
            .await
            .unwrap();
        assert!(listed[0].expiring_soon);
        let json = serde_json::to_value(&listed[0]).unwrap();
        assert_eq!(json["expiringSoon"], true);
        assert_eq!(json["fleetId"], fleet.id.to_string());

        harness.clock.advance(Duration::days(10));
        let listed = SubscriptionHandlers
            .handle(list(), &mut harness.as_user(&owner))
            .await
            .unwrap();
        assert!(!listed[0].expiring_soon);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_subscribe_fleet() {
        let harness = Harness::new();
        let (_, fleet) = harness.owned_fleet().await;
        let (intruder, _) = harness.owned_fleet().await;
        let plan = harness.plan(2);
        harness.put(&plan).await;

        let err = SubscriptionHandlers
            .handle(
                Subscribe {
                    fleet_id: fleet.id,
                    plan_id: plan.id,
                    payment_method: None,
                    transaction_id: None,
                    notes: None,
                },
                &mut harness.as_user(&intruder),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden));

        let listing = SubscriptionHandlers
            .handle(
                GetSubscriptionsByFleet { fleet_id: fleet.id },
                &mut harness.as_user(&intruder),
            )
            .await;
        assert!(matches!(listing, Err(Error::Forbidden)));
    }
}
