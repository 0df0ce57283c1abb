//! Van commands and queries, including driver assignment.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use vanfleet_core::types::{Fleet, User, Van};
use vanfleet_core::{Error, Result};
use vanfleet_rbac::context::VanRef;
use vanfleet_rbac::permissions::{Action, ResourceKind};
use vanfleet_rbac::rules::{access, subscription};

use super::subscriptions::plan_allows;
use super::{Request, RequestContext, RequestHandler, require_text};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VanInput {
    pub plate_number: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub capacity: u32,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVan {
    pub fleet_id: Uuid,
    #[serde(flatten)]
    pub van: VanInput,
}

#[derive(Debug, Clone)]
pub struct UpdateVan {
    pub id: Uuid,
    pub van: VanInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteVan {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetVanById {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetVans;

impl Request for CreateVan {
    type Response = Van;
    const NAME: &'static str = "CreateVan";
}

impl Request for UpdateVan {
    type Response = Van;
    const NAME: &'static str = "UpdateVan";
}

impl Request for DeleteVan {
    type Response = ();
    const NAME: &'static str = "DeleteVan";
}

impl Request for GetVanById {
    type Response = Van;
    const NAME: &'static str = "GetVanById";
}

impl Request for GetVans {
    type Response = Vec<Van>;
    const NAME: &'static str = "GetVans";
}

fn validate(input: &VanInput) -> Result<()> {
    require_text("Plate number", &input.plate_number)?;
    if input.capacity == 0 {
        return Err(Error::validation("Capacity must be at least one seat"));
    }
    Ok(())
}

async fn ensure_unique_plate(ctx: &RequestContext, plate: &str, van_id: Uuid) -> Result<()> {
    let plate = plate.trim().to_uppercase();
    let taken = ctx
        .uow
        .find::<Van>(|van| van.id != van_id && van.plate_number == plate)
        .await?;
    if !taken.is_empty() {
        return Err(Error::conflict(format!("Plate {plate} is already registered")));
    }
    Ok(())
}

/// Point both sides of the driver assignment at each other, releasing the
/// driver's previous van.
async fn assign_driver(ctx: &mut RequestContext, van: &mut Van, driver_id: Uuid) -> Result<()> {
    let mut driver = ctx.uow.require::<User>(driver_id).await?;
    if !driver.roles.is_driver() {
        return Err(Error::validation("The assigned user is not a driver"));
    }
    if driver.fleet_id.is_some_and(|fleet_id| fleet_id != van.fleet_id) {
        return Err(Error::validation("The driver works for another fleet"));
    }

    if let Some(previous) = driver.van_id.filter(|id| *id != van.id) {
        if let Some(mut old) = ctx.uow.get_by_id::<Van>(previous).await? {
            if old.driver_id == Some(driver.id) {
                old.driver_id = None;
                ctx.uow.update(&old)?;
            }
        }
    }

    driver.van_id = Some(van.id);
    driver.fleet_id = Some(van.fleet_id);
    ctx.uow.update(&driver)?;
    van.driver_id = Some(driver.id);
    Ok(())
}

/// Clear the driver's side of the assignment to `van`.
async fn release_driver(ctx: &mut RequestContext, van: &Van) -> Result<()> {
    let Some(driver_id) = van.driver_id else {
        return Ok(());
    };
    if let Some(mut driver) = ctx.uow.get_by_id::<User>(driver_id).await? {
        if driver.van_id == Some(van.id) {
            driver.van_id = None;
            ctx.uow.update(&driver)?;
        }
    }
    Ok(())
}

pub struct VanHandlers;

#[async_trait]
impl RequestHandler<CreateVan> for VanHandlers {
    async fn handle(&self, request: CreateVan, ctx: &mut RequestContext) -> Result<Van> {
        let subject = ctx.subject().await?;
        let fleet = ctx.uow.require::<Fleet>(request.fleet_id).await?;
        let input = request.van;
        let mut van = Van {
            id: Uuid::new_v4(),
            plate_number: input.plate_number.trim().to_uppercase(),
            model: input.model.clone(),
            brand: input.brand.clone(),
            capacity: input.capacity,
            is_active: input.is_active,
            fleet_id: fleet.id,
            driver_id: None,
            created_at: ctx.now(),
            updated_at: None,
        };
        ctx.enforce(
            &subject,
            Action::Create,
            ResourceKind::Van,
            Some(van.id),
            access::can_manage_van(&subject, &VanRef::from(&van)),
        )?;
        validate(&input)?;
        ensure_unique_plate(ctx, &van.plate_number, van.id).await?;

        let van_count = ctx.uow.find::<Van>(|v| v.fleet_id == fleet.id).await?.len();
        let within_quota = plan_allows(ctx, &fleet, |fleet, plan, sub, now| {
            subscription::can_add_van(fleet, plan, sub, van_count, now)
        })
        .await?;
        if !within_quota {
            return Err(Error::validation(
                "The fleet's subscription does not allow another van",
            ));
        }

        if let Some(driver_id) = input.driver_id {
            if !plan_allows(ctx, &fleet, subscription::can_add_driver).await? {
                return Err(Error::validation(
                    "The fleet's subscription does not allow assigning drivers",
                ));
            }
            assign_driver(ctx, &mut van, driver_id).await?;
        }

        ctx.uow.add(&van)?;
        ctx.save().await?;

        info!(actor = %subject.id(), van = %van.id, fleet = %fleet.id, "Created van");
        Ok(van)
    }
}

#[async_trait]
impl RequestHandler<UpdateVan> for VanHandlers {
    async fn handle(&self, request: UpdateVan, ctx: &mut RequestContext) -> Result<Van> {
        let subject = ctx.subject().await?;
        let mut van = ctx.uow.require::<Van>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Manage,
            ResourceKind::Van,
            Some(van.id),
            access::can_manage_van(&subject, &VanRef::from(&van)),
        )?;
        let input = request.van;
        validate(&input)?;
        ensure_unique_plate(ctx, &input.plate_number, van.id).await?;

        if input.driver_id != van.driver_id {
            release_driver(ctx, &van).await?;
            van.driver_id = None;
            if let Some(driver_id) = input.driver_id {
                let fleet = ctx.uow.require::<Fleet>(van.fleet_id).await?;
                if !plan_allows(ctx, &fleet, subscription::can_add_driver).await? {
                    return Err(Error::validation(
                        "The fleet's subscription does not allow assigning drivers",
                    ));
                }
                assign_driver(ctx, &mut van, driver_id).await?;
            }
        }

        van.plate_number = input.plate_number.trim().to_uppercase();
        van.model = input.model;
        van.brand = input.brand;
        van.capacity = input.capacity;
        van.is_active = input.is_active;
        van.updated_at = Some(ctx.now());
        ctx.uow.update(&van)?;
        ctx.save().await?;

        info!(actor = %subject.id(), van = %van.id, "Updated van");
        Ok(van)
    }
}

#[async_trait]
impl RequestHandler<DeleteVan> for VanHandlers {
    async fn handle(&self, request: DeleteVan, ctx: &mut RequestContext) -> Result<()> {
        let subject = ctx.subject().await?;
        let van = ctx.uow.require::<Van>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Delete,
            ResourceKind::Van,
            Some(van.id),
            access::can_delete_van(&subject, &VanRef::from(&van)),
        )?;

        release_driver(ctx, &van).await?;
        ctx.uow.delete(&van);
        ctx.save().await?;

        info!(actor = %subject.id(), van = %van.id, "Deleted van");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<GetVanById> for VanHandlers {
    async fn handle(&self, request: GetVanById, ctx: &mut RequestContext) -> Result<Van> {
        let subject = ctx.subject().await?;
        let van = ctx.uow.require::<Van>(request.id).await?;
        ctx.enforce(
            &subject,
            Action::Access,
            ResourceKind::Van,
            Some(van.id),
            access::can_access_van(&subject, &VanRef::from(&van)),
        )?;
        Ok(van)
    }
}

#[async_trait]
impl RequestHandler<GetVans> for VanHandlers {
    async fn handle(&self, _: GetVans, ctx: &mut RequestContext) -> Result<Vec<Van>> {
        let subject = ctx.subject().await?;
        let mut vans = ctx
            .uow
            .find::<Van>(|van| access::can_access_van(&subject, &VanRef::from(van)))
            .await?;
        vans.sort_by(|a, b| a.plate_number.cmp(&b.plate_number));
        Ok(vans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::Harness;
    use vanfleet_core::types::Role;

    fn input(plate: &str, driver_id: Option<Uuid>) -> VanInput {
        VanInput {
            plate_number: plate.into(),
            model: Some("Sprinter".into()),
            brand: Some("Mercedes".into()),
            capacity: 15,
            driver_id,
            is_active: true,
        }
    }

    fn create(fleet_id: Uuid, plate: &str) -> CreateVan {
        CreateVan {
            fleet_id,
            van: input(plate, None),
        }
    }

    #[tokio::test]
    async fn test_van_quota_enforced() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;

        let unsubscribed = VanHandlers
            .handle(create(fleet.id, "AAA1A11"), &mut harness.as_user(&owner))
            .await
            .unwrap_err();
        assert_eq!(unsubscribed.status_code(), 400);

        harness.subscribe(&fleet, 1).await;
        VanHandlers
            .handle(create(fleet.id, "AAA1A11"), &mut harness.as_user(&owner))
            .await
            .unwrap();
        let over_quota = VanHandlers
            .handle(create(fleet.id, "BBB2B22"), &mut harness.as_user(&owner))
            .await
            .unwrap_err();
        assert_eq!(over_quota.status_code(), 400);
    }

    #[tokio::test]
    async fn test_owner_of_other_fleet_forbidden() {
        let harness = Harness::new();
        let (_, fleet) = harness.owned_fleet().await;
        let (stranger, _) = harness.owned_fleet().await;
        harness.subscribe(&fleet, 5).await;

        let err = VanHandlers
            .handle(create(fleet.id, "CCC3C33"), &mut harness.as_user(&stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden));
    }

    #[tokio::test]
    async fn test_driver_assignment_links_both_sides() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        harness.subscribe(&fleet, 5).await;
        let driver = harness.user(&[Role::Driver], None, None).await;

        let first = VanHandlers
            .handle(
                CreateVan {
                    fleet_id: fleet.id,
                    van: input("DDD4D44", Some(driver.id)),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        let linked = harness.get::<User>(driver.id).await.unwrap();
        assert_eq!(linked.van_id, Some(first.id));
        assert_eq!(linked.fleet_id, Some(fleet.id));

        let second = VanHandlers
            .handle(
                CreateVan {
                    fleet_id: fleet.id,
                    van: input("EEE5E55", Some(driver.id)),
                },
                &mut harness.as_user(&owner),
            )
            .await
            .unwrap();
        let released = harness.get::<Van>(first.id).await.unwrap();
        assert_eq!(released.driver_id, None);
        let moved = harness.get::<User>(driver.id).await.unwrap();
        assert_eq!(moved.van_id, Some(second.id));

        let seen = VanHandlers
            .handle(GetVans, &mut harness.as_user(&moved))
            .await
            .unwrap();
        assert_eq!(seen.iter().map(|v| v.id).collect::<Vec<_>>(), vec![second.id]);
    }

    #[tokio::test]
    async fn test_delete_van_owner_only() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        harness.subscribe(&fleet, 5).await;
        let van = VanHandlers
            .handle(create(fleet.id, "FFF6F66"), &mut harness.as_user(&owner))
            .await
            .unwrap();

        let (stranger, _) = harness.owned_fleet().await;
        let denied = VanHandlers
            .handle(DeleteVan { id: van.id }, &mut harness.as_user(&stranger))
            .await
            .unwrap_err();
        assert!(matches!(denied, Error::Forbidden));

        VanHandlers
            .handle(DeleteVan { id: van.id }, &mut harness.as_user(&owner))
            .await
            .unwrap();
        assert!(harness.get::<Van>(van.id).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_plate_conflicts() {
        let harness = Harness::new();
        let (owner, fleet) = harness.owned_fleet().await;
        harness.subscribe(&fleet, 5).await;
        VanHandlers
            .handle(create(fleet.id, "ggg7g77"), &mut harness.as_user(&owner))
            .await
            .unwrap();
        let err = VanHandlers
            .handle(create(fleet.id, "GGG7G77"), &mut harness.as_user(&owner))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }
}
