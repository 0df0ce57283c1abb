//! Fleets, vans, routes and route stops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GeoPoint;
use crate::persistence::Entity;

/// A fleet of vans owned by one fleet owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fleet {
    pub id: Uuid,
    /// The fleet owner's user id
    pub owner_user_id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Fleet {
    const KIND: &'static str = "Fleet";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A van belonging to a fleet, optionally assigned to a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Van {
    pub id: Uuid,
    pub plate_number: String,
    pub model: Option<String>,
    pub brand: Option<String>,
    /// Seats available for students
    pub capacity: u32,
    pub is_active: bool,
    pub fleet_id: Uuid,
    /// User id of the assigned driver
    pub driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Van {
    const KIND: &'static str = "Van";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A route driven by one van.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub van_id: Uuid,
    pub description: String,
}

impl Entity for Route {
    const KIND: &'static str = "Route";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Whether a stop picks a student up or drops them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    Boarding,
    Dropoff,
}

/// A stop on a route where one student boards or leaves the van.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub id: Uuid,
    pub route_id: Uuid,
    pub student_id: Uuid,
    /// Scheduled time of the stop
    pub timestamp: DateTime<Utc>,
    pub kind: StopKind,
    pub location: GeoPoint,
}

impl Entity for RouteStop {
    const KIND: &'static str = "RouteStop";

    fn id(&self) -> Uuid {
        self.id
    }
}
