use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

use crate::pricing::{PricingBreakdown, SelectedOption};

/// Reservation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 5] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Active,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Default for ReservationStatus {
    fn default() -> Self {
        ReservationStatus::Pending
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reservation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: i64,
    pub confirmation_number: String,
    pub vehicle_id: i64,
    pub user_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub daily_price: Decimal,
    pub number_of_days: i32,
    pub base_price: Decimal,
    pub options_price: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
    pub status: ReservationStatus,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Option line of a reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReservationOption {
    pub id: i64,
    pub reservation_id: i64,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl From<ReservationOption> for SelectedOption {
    fn from(option: ReservationOption) -> Self {
        SelectedOption {
            name: option.name,
            price: option.price,
            quantity: option.quantity,
        }
    }
}

/// Values for a reservation about to be inserted, priced already
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub confirmation_number: String,
    pub vehicle_id: i64,
    pub user_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub pricing: PricingBreakdown,
    pub options: Vec<SelectedOption>,
    pub notes: Option<String>,
}

/// Request body for POST /api/reservations
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(range(min = 1, message = "Vehicle id must be positive"))]
    pub vehicle_id: i64,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[serde(default)]
    #[validate]
    pub options: Vec<SelectedOption>,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Request body for POST /api/reservations/:id/payment
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, max = 255, message = "Payment reference is required"))]
    pub payment_reference: String,
}

/// Reservation with its options, as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReservationResponse {
    pub id: i64,
    pub confirmation_number: String,
    pub vehicle_id: i64,
    pub user_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub options: Vec<SelectedOption>,
    pub daily_price: Decimal,
    pub number_of_days: i32,
    pub base_price: Decimal,
    pub options_price: Decimal,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
    pub status: ReservationStatus,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationResponse {
    pub fn from_parts(reservation: Reservation, options: Vec<ReservationOption>) -> Self {
        ReservationResponse {
            id: reservation.id,
            confirmation_number: reservation.confirmation_number,
            vehicle_id: reservation.vehicle_id,
            user_id: reservation.user_id,
            start_date: reservation.start_date,
            end_date: reservation.end_date,
            options: options.into_iter().map(SelectedOption::from).collect(),
            daily_price: reservation.daily_price,
            number_of_days: reservation.number_of_days,
            base_price: reservation.base_price,
            options_price: reservation.options_price,
            discount_percentage: reservation.discount_percentage,
            discount_amount: reservation.discount_amount,
            tax_amount: reservation.tax_amount,
            total_price: reservation.total_price,
            status: reservation.status,
            payment_reference: reservation.payment_reference,
            notes: reservation.notes,
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}

/// Result of a cancellation, with the refund owed for paid reservations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CancellationResponse {
    pub reservation: ReservationResponse,
    pub refund_percentage: Option<Decimal>,
    pub refund_amount: Option<Decimal>,
}
