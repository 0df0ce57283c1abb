//! Subscription plans.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{BillingCycle, FleetSubscription, Plan};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::access;

use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub duration_in_months: u32,
    pub max_vans: u32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_currency() -> String {
    "BRL".to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlan {
    #[serde(flatten)]
    pub plan: PlanInput,
}

#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub id: Uuid,
    pub plan: PlanInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletePlan {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPlanById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetPlans;

impl Request for CreatePlan {
    type Response = Plan;
    const NAME: &'static str = "CreatePlan";
}

impl Request for UpdatePlan {
    type Response = Plan;
    const NAME: &'static str = "UpdatePlan";
}

impl Request for DeletePlan {
    type Response = ();
    const NAME: &'static str = "DeletePlan";
}

impl Request for GetPlanById {
    type Response = Plan;
    const NAME: &'static str = "GetPlanById";
}

impl Request for GetPlans {
    type Response = Vec<Plan>;
    const NAME: &'static str = "GetPlans";
}

fn validate(input: &PlanInput) -> Result<()> {
    require_text("Name", &input.name)?;
    require_text("Currency", &input.currency)?;
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(Error::validation("Price must be zero or more"));
    }
    if input.duration_in_months == 0 {
        return Err(Error::validation("Duration must be at least one month"));
    }
    if input.max_vans == 0 {
        return Err(Error::validation("A plan must allow at least one van"));
    }
    Ok(())
}

fn apply(plan: &mut Plan, input: PlanInput) {
    plan.name = input.name.trim().to_string();
    plan.description = input.description;
    plan.price = input.price;
    plan.currency = input.currency.trim().to_uppercase();
    plan.billing_cycle = input.billing_cycle;
    plan.duration_in_months = input.duration_in_months;
    plan.max_vans = input.max_vans;
    plan.is_default = input.is_default;
    plan.is_active = input.is_active;
}

/// Only one plan is the default at a time.
async fn clear_other_defaults(ctx: &mut RequestContext, keep: Uuid) -> Result<()> {
    let defaults = ctx
        .uow
        .find::<Plan>(|plan| plan.is_default && plan.id != keep)
        .await?;
    for mut plan in defaults {
        plan.is_default = false;
        ctx.uow.update(&plan)?;
    }
    Ok(())
}

pub struct PlanHandlers;

#[async_trait]
impl RequestHandler<CreatePlan> for PlanHandlers {
    async fn handle(&self, request: CreatePlan, ctx: &mut RequestContext) -> Result<Plan> {
        let subject = ctx.subject().await?;
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::Plan,
            None,
            access::can_manage_plan(&subject),
        )?;
        validate(&request.plan)?;

        let mut plan = Plan {
            id: Uuid::new_v4(),
            name: String::new(),
            description: None,
            price: 0.0,
            currency: String::new(),
            billing_cycle: request.plan.billing_cycle,
            duration_in_months: 1,
            is_default: false,
            max_vans: 1,
            is_active: true,
            created_at: ctx.now(),
            updated_at: None,
            created_by_user_id: Some(subject.id()),
            updated_by_user_id: None,
        };
        apply(&mut plan, request.plan);
        if plan.is_default {
            clear_other_defaults(ctx, plan.id).await?;
        }
        ctx.uow.add(&plan)?;
        ctx.save().await?;

        info!(actor = %subject.id(), plan = %plan.id, name = %plan.name, "Created plan");
        Ok(plan)
    }
}

#[async_trait]
impl RequestHandler<UpdatePlan> for PlanHandlers {
    async fn handle(&self, request: UpdatePlan, ctx: &mut RequestContext) -> Result<Plan> {
        let subject = ctx.subject().await?;
        let mut plan = ctx.uow.require::<Plan>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::Plan,
            Some(plan.id),
            access::can_manage_plan(&subject),
        )?;
        validate(&request.plan)?;

        apply(&mut plan, request.plan);
        plan.updated_at = Some(ctx.now());
        plan.updated_by_user_id = Some(subject.id());
        if plan.is_default {
            clear_other_defaults(ctx, plan.id).await?;
        }
        ctx.uow.update(&plan)?;
        ctx.save().await?;

        info!(actor = %subject.id(), plan = %plan.id, "Updated plan");
        Ok(plan)
    }
}

#[async_trait]
impl RequestHandler<DeletePlan> for PlanHandlers {
    async fn handle(&self, request: DeletePlan, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let plan = ctx.uow.require::<Plan>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::Plan,
            Some(plan.id),
            access::can_delete_plan(&subject),
        )?;
        let in_use = ctx
            .uow
            .find::<FleetSubscription>(|s| s.plan_id == plan.id)
            .await?;
        if !in_use.is_empty() {
            return Err(Error::validation(
                "Plans with subscriptions cannot be deleted; deactivate them instead",
            ));
        }

        ctx.uow.delete(&plan);
        ctx.save().await?;

        info!(actor = %subject.id(), plan = %plan.id, "Deleted plan");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetPlanById> for PlanHandlers {
    async fn handle(&self, request: GetPlanById, ctx: &mut RequestContext) -> Result<Plan> {
        let subject = ctx.subject().await?;
        let plan = ctx.uow.require::<Plan>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Plan,
            Some(plan.id),
            access::can_access_plan(&subject),
        )?;
        Ok(plan)
    }
}

#[async_trait]
impl RequestHandler<GetPlans> for PlanHandlers {
    async fn handle(&self, _: GetPlans, ctx: &mut RequestContext) -> Result<Vec<Plan>> {
        let subject = ctx.subject().await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Plan,
            None,
            access::can_access_plan(&subject),
        )?;
        // Retired plans are only listed for admins
        let admin = subject.roles.is_admin();
        let mut plans = ctx
            .uow
            .find::<Plan>(|plan| admin || plan.is_active)
            .await?;
        plans.sort_by(|a, b| a.price.total_cmp(&b.price));
        Ok(plans)
    }
}
