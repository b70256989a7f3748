// Collaborator seams
// Cross-service references are weak: an id plus one of these lookup traits.
// Callers must tolerate the referenced entity being absent or stale.

pub mod vehicle_client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RentalResult;
use crate::reservations::ReservationStatus;

pub use vehicle_client::HttpVehicleDirectory;

/// Availability status mirrored by the vehicle service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Available,
    Rented,
    Maintenance,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "AVAILABLE",
            VehicleStatus::Rented => "RENTED",
            VehicleStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vehicle as seen from the rental core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub license_plate: String,
    pub category: Option<String>,
    pub daily_price: Decimal,
    pub status: VehicleStatus,
}

/// Reservation as seen from the rental side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub vehicle_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_price: Decimal,
    pub status: ReservationStatus,
}

/// Vehicle collaborator operations
#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    /// `NotFound` when the vehicle does not exist
    async fn get_vehicle(&self, id: i64) -> RentalResult<VehicleSnapshot>;

    /// Idempotent: setting the current status again succeeds
    async fn set_vehicle_status(&self, id: i64, status: VehicleStatus) -> RentalResult<()>;
}

/// Reservation collaborator operations
#[async_trait]
pub trait ReservationGateway: Send + Sync {
    async fn get_reservation(&self, id: i64) -> RentalResult<ReservationSnapshot>;

    /// Mirror update driven by rental transitions
    ///
    /// Idempotent: a reservation already in `status` is left as is.
    async fn set_reservation_status(&self, id: i64, status: ReservationStatus) -> RentalResult<()>;
}
