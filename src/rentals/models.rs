use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::fmt;
use validator::Validate;

use crate::orchestrator::SagaRecord;
use crate::rentals::{AdditionalCharges, ChargeLine};

/// Rental lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalStatus {
    Pending,
    CheckedOut,
    Active,
    CheckedIn,
    Completed,
    Cancelled,
}

impl RentalStatus {
    pub const ALL: [RentalStatus; 6] = [
        RentalStatus::Pending,
        RentalStatus::CheckedOut,
        RentalStatus::Active,
        RentalStatus::CheckedIn,
        RentalStatus::Completed,
        RentalStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Pending => "PENDING",
            RentalStatus::CheckedOut => "CHECKED_OUT",
            RentalStatus::Active => "ACTIVE",
            RentalStatus::CheckedIn => "CHECKED_IN",
            RentalStatus::Completed => "COMPLETED",
            RentalStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fuel gauge reading, ordered from empty to full
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuelLevel {
    Empty,
    Quarter,
    Half,
    ThreeQuarters,
    Full,
}

impl FuelLevel {
    /// Position on the gauge, 0 (empty) to 4 (full)
    pub fn tier(&self) -> i64 {
        match self {
            FuelLevel::Empty => 0,
            FuelLevel::Quarter => 1,
            FuelLevel::Half => 2,
            FuelLevel::ThreeQuarters => 3,
            FuelLevel::Full => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionType {
    CheckOut,
    CheckIn,
}

/// Overall vehicle condition noted by the inspector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionGrade {
    APlus,
    A,
    B,
    C,
}

/// Rental record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rental {
    pub id: i64,
    pub reservation_id: i64,
    pub user_id: i64,
    pub vehicle_id: i64,
    pub employee_id: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub actual_start_date: Option<DateTime<Utc>>,
    pub actual_end_date: Option<DateTime<Utc>>,
    pub pickup_location: String,
    pub return_location: String,
    pub base_price: Decimal,
    pub additional_charges: Decimal,
    pub charge_lines: Json<Vec<ChargeLine>>,
    pub total_price: Decimal,
    pub deposit: Decimal,
    pub status: RentalStatus,
    pub start_kilometers: Option<i32>,
    pub end_kilometers: Option<i32>,
    pub start_fuel_level: Option<FuelLevel>,
    pub end_fuel_level: Option<FuelLevel>,
    pub checkout_notes: Option<String>,
    pub checkin_notes: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employee-witnessed vehicle inspection, immutable once stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VehicleInspection {
    pub id: i64,
    pub rental_id: i64,
    pub inspection_type: InspectionType,
    pub inspector_id: i64,
    pub kilometers: i32,
    pub fuel_level: FuelLevel,
    pub exterior_clean: bool,
    pub interior_clean: bool,
    pub tires_condition: bool,
    pub lights_working: bool,
    pub wipers_functional: bool,
    pub spare_wheel_present: bool,
    pub documents_present: bool,
    pub first_aid_kit_present: bool,
    pub warning_triangle_present: bool,
    pub overall_condition: ConditionGrade,
    pub damages_description: Option<String>,
    pub photo_urls: Vec<String>,
    pub notes: Option<String>,
    pub inspection_date: DateTime<Utc>,
}

/// Rental contract, signed at most once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RentalContract {
    pub id: i64,
    pub rental_id: i64,
    pub contract_number: String,
    pub content: String,
    /// SHA-256 of `content`, hex encoded
    pub content_hash: String,
    pub terms_and_conditions: String,
    pub is_signed: bool,
    pub client_signature: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by_ip: Option<String>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a rental created from a confirmed reservation
#[derive(Debug, Clone)]
pub struct NewRental {
    pub reservation_id: i64,
    pub user_id: i64,
    pub vehicle_id: i64,
    pub employee_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pickup_location: String,
    pub return_location: String,
    pub base_price: Decimal,
    pub deposit: Decimal,
}

/// Fields written by check-out
#[derive(Debug, Clone)]
pub struct CheckOutRecord {
    pub employee_id: i64,
    pub actual_start_date: DateTime<Utc>,
    pub start_kilometers: i32,
    pub start_fuel_level: FuelLevel,
    pub checkout_notes: Option<String>,
}

/// Fields written by check-in
#[derive(Debug, Clone)]
pub struct CheckInRecord {
    pub actual_end_date: DateTime<Utc>,
    pub end_kilometers: i32,
    pub end_fuel_level: FuelLevel,
    pub checkin_notes: Option<String>,
    pub additional_charges: Decimal,
    pub charge_lines: Vec<ChargeLine>,
    pub total_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewInspection {
    pub rental_id: i64,
    pub inspection_type: InspectionType,
    pub inspector_id: i64,
    pub kilometers: i32,
    pub fuel_level: FuelLevel,
    pub checklist: InspectionChecklist,
    pub overall_condition: ConditionGrade,
    pub damages_description: Option<String>,
    pub photo_urls: Vec<String>,
    pub notes: Option<String>,
    pub inspection_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContract {
    pub rental_id: i64,
    pub contract_number: String,
    pub content: String,
    pub content_hash: String,
    pub terms_and_conditions: String,
}

#[derive(Debug, Clone)]
pub struct ContractSignature {
    pub client_signature: String,
    pub signed_at: DateTime<Utc>,
    pub signed_by_ip: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Checklist items, each true when the item is in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionChecklist {
    #[serde(default = "default_true")]
    pub exterior_clean: bool,
    #[serde(default = "default_true")]
    pub interior_clean: bool,
    #[serde(default = "default_true")]
    pub tires_condition: bool,
    #[serde(default = "default_true")]
    pub lights_working: bool,
    #[serde(default = "default_true")]
    pub wipers_functional: bool,
    #[serde(default = "default_true")]
    pub spare_wheel_present: bool,
    #[serde(default = "default_true")]
    pub documents_present: bool,
    #[serde(default = "default_true")]
    pub first_aid_kit_present: bool,
    #[serde(default = "default_true")]
    pub warning_triangle_present: bool,
}

impl Default for InspectionChecklist {
    fn default() -> Self {
        Self {
            exterior_clean: true,
            interior_clean: true,
            tires_condition: true,
            lights_working: true,
            wipers_functional: true,
            spare_wheel_present: true,
            documents_present: true,
            first_aid_kit_present: true,
            warning_triangle_present: true,
        }
    }
}

impl InspectionChecklist {
    /// Items as (label, value) pairs in a stable order
    pub fn items(&self) -> [(&'static str, bool); 9] {
        [
            ("exterior_clean", self.exterior_clean),
            ("interior_clean", self.interior_clean),
            ("tires_condition", self.tires_condition),
            ("lights_working", self.lights_working),
            ("wipers_functional", self.wipers_functional),
            ("spare_wheel_present", self.spare_wheel_present),
            ("documents_present", self.documents_present),
            ("first_aid_kit_present", self.first_aid_kit_present),
            ("warning_triangle_present", self.warning_triangle_present),
        ]
    }
}

impl VehicleInspection {
    pub fn checklist(&self) -> InspectionChecklist {
        InspectionChecklist {
            exterior_clean: self.exterior_clean,
            interior_clean: self.interior_clean,
            tires_condition: self.tires_condition,
            lights_working: self.lights_working,
            wipers_functional: self.wipers_functional,
            spare_wheel_present: self.spare_wheel_present,
            documents_present: self.documents_present,
            first_aid_kit_present: self.first_aid_kit_present,
            warning_triangle_present: self.warning_triangle_present,
        }
    }
}

/// Inspection part of a check-out or check-in request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InspectionRequest {
    #[serde(flatten, default)]
    pub checklist: InspectionChecklist,

    pub overall_condition: ConditionGrade,

    #[validate(length(max = 2000, message = "Damage description cannot exceed 2000 characters"))]
    pub damages_description: Option<String>,

    #[serde(default)]
    pub photo_urls: Vec<String>,

    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

/// Request body for POST /api/rentals
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRentalRequest {
    #[validate(range(min = 1, message = "Reservation id must be positive"))]
    pub reservation_id: i64,

    pub deposit: Decimal,

    #[validate(length(min = 1, max = 255, message = "Pickup location is required"))]
    pub pickup_location: String,

    #[validate(length(min = 1, max = 255, message = "Return location is required"))]
    pub return_location: String,
}

/// Request body for POST /api/rentals/:id/check-out
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckOutRequest {
    #[validate(range(min = 0, message = "Kilometers cannot be negative"))]
    pub start_kilometers: i32,

    pub start_fuel_level: FuelLevel,

    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub checkout_notes: Option<String>,

    #[validate]
    pub inspection: InspectionRequest,
}

/// Request body for POST /api/rentals/:id/check-in
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckInRequest {
    #[validate(range(min = 0, message = "Kilometers cannot be negative"))]
    pub end_kilometers: i32,

    pub end_fuel_level: FuelLevel,

    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub checkin_notes: Option<String>,

    #[validate]
    pub inspection: InspectionRequest,
}

/// Request body for POST /api/rentals/:id/contract/sign
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignContractRequest {
    #[validate(length(min = 1, max = 10000, message = "Signature is required"))]
    pub client_signature: String,

    pub accept_terms: bool,
}

/// Rental after an orchestrated transition, with the saga outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalTransitionResponse {
    pub rental: Rental,
    pub orchestration: SagaRecord,
}

/// Rental after check-in, with the itemized charges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub rental: Rental,
    pub charges: AdditionalCharges,
}
