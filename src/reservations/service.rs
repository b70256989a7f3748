use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{ReservationGateway, ReservationSnapshot, VehicleDirectory, VehicleStatus};
use crate::discounts::{DiscountEvaluator, DiscountRuleStore};
use crate::error::{RentalError, RentalResult};
use crate::pricing::{round_money, PriceCalculator, PricingBreakdown, PricingInput, SelectedOption};
use crate::reservations::{
    CancellationResponse, CreateReservationRequest, NewReservation, Reservation,
    ReservationResponse, ReservationStatus, ReservationStatusMachine, ReservationStore,
};

const CONFIRMATION_ATTEMPTS: usize = 10;

/// Whether `value` looks like a confirmation number (CONF- and five digits)
pub fn is_confirmation_number(value: &str) -> bool {
    value
        .strip_prefix("CONF-")
        .map(|digits| digits.len() == 5 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Share of the paid total returned when a confirmed reservation is
/// cancelled: 100% more than 48h before start, 75% from 24h, 50% after
pub fn refund_percentage(start_date: DateTime<Utc>, now: DateTime<Utc>) -> Decimal {
    let hours_until_start = (start_date - now).num_hours();
    if hours_until_start > 48 {
        Decimal::ONE_HUNDRED
    } else if hours_until_start >= 24 {
        Decimal::new(75, 0)
    } else {
        Decimal::new(50, 0)
    }
}

/// Reservation lifecycle and pricing
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    discount_rules: Arc<dyn DiscountRuleStore>,
    vehicles: Arc<dyn VehicleDirectory>,
    tax_rate: Decimal,
}

impl ReservationService {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        discount_rules: Arc<dyn DiscountRuleStore>,
        vehicles: Arc<dyn VehicleDirectory>,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            store,
            discount_rules,
            vehicles,
            tax_rate,
        }
    }

    /// Price a prospective rental for `user_id`, discount included
    pub async fn quote(
        &self,
        user_id: i64,
        vehicle_id: i64,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        options: Vec<SelectedOption>,
    ) -> RentalResult<PricingBreakdown> {
        let vehicle = self.vehicles.get_vehicle(vehicle_id).await?;

        let completed = self.completed_rental_count(user_id).await?;
        let rules = self.discount_rules.list_active().await?;
        let discount = DiscountEvaluator::applied_discount(&rules, completed);
        debug!(
            "Pricing vehicle {} for user {} ({} completed rentals, discount {:?})",
            vehicle_id, user_id, completed, discount
        );

        let input = PricingInput {
            vehicle_id,
            daily_price: vehicle.daily_price,
            start_date,
            end_date,
            options,
        };
        PriceCalculator::calculate(&input, self.tax_rate, discount.as_ref())
    }

    /// Completed reservations are the customer's completed rentals
    pub async fn completed_rental_count(&self, user_id: i64) -> RentalResult<i64> {
        self.store.count_completed_by_user(user_id).await
    }

    /// Create a PENDING reservation with its price computed
    pub async fn create_reservation(
        &self,
        user_id: i64,
        request: CreateReservationRequest,
    ) -> RentalResult<ReservationResponse> {
        let now = Utc::now();
        if request.start_date <= now {
            return Err(RentalError::Validation(
                "Start date must be in the future".to_string(),
            ));
        }
        if request.end_date <= request.start_date {
            return Err(RentalError::Validation(
                "End date must be after start date".to_string(),
            ));
        }

        let vehicle = self.vehicles.get_vehicle(request.vehicle_id).await?;
        if vehicle.status == VehicleStatus::Maintenance {
            return Err(RentalError::Conflict(format!(
                "Vehicle {} is under maintenance",
                vehicle.id
            )));
        }

        let pricing = self
            .quote(
                user_id,
                request.vehicle_id,
                request.start_date,
                request.end_date,
                request.options.clone(),
            )
            .await?;

        let confirmation_number = self.generate_confirmation_number().await?;

        let reservation = self
            .store
            .insert(NewReservation {
                confirmation_number,
                vehicle_id: request.vehicle_id,
                user_id,
                start_date: request.start_date,
                end_date: request.end_date,
                pricing,
                options: request.options,
                notes: request.notes,
            })
            .await?;

        info!(
            "Created reservation {} ({}) for user {} on vehicle {}, total {}",
            reservation.id,
            reservation.confirmation_number,
            user_id,
            reservation.vehicle_id,
            reservation.total_price
        );
        self.with_options(reservation).await
    }

    pub async fn get_reservation(&self, id: i64) -> RentalResult<ReservationResponse> {
        let reservation = self.find(id).await?;
        self.with_options(reservation).await
    }

    pub async fn get_by_confirmation_number(&self, number: &str) -> RentalResult<ReservationResponse> {
        if !is_confirmation_number(number) {
            return Err(RentalError::Validation(format!(
                "'{}' is not a confirmation number",
                number
            )));
        }
        let reservation = self
            .store
            .find_by_confirmation_number(number)
            .await?
            .ok_or_else(|| RentalError::not_found("Reservation", number))?;
        self.with_options(reservation).await
    }

    pub async fn list_for_user(&self, user_id: i64) -> RentalResult<Vec<ReservationResponse>> {
        let reservations = self.store.find_by_user(user_id).await?;
        let mut responses = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            responses.push(self.with_options(reservation).await?);
        }
        Ok(responses)
    }

    /// PENDING → CONFIRMED once the payment provider accepted the payment
    pub async fn confirm_payment(
        &self,
        id: i64,
        payment_reference: &str,
    ) -> RentalResult<ReservationResponse> {
        let payment_reference = payment_reference.trim();
        if payment_reference.is_empty() {
            return Err(RentalError::Validation(
                "Payment reference is required".to_string(),
            ));
        }

        let reservation = self.find(id).await?;
        ReservationStatusMachine::transition(id, reservation.status, ReservationStatus::Confirmed)?;
        if reservation.total_price <= Decimal::ZERO {
            return Err(RentalError::Validation(format!(
                "Reservation {} has no computed price",
                id
            )));
        }

        let updated = self
            .store
            .update_status(
                id,
                reservation.version,
                ReservationStatus::Confirmed,
                Some(payment_reference),
            )
            .await?;

        info!("Reservation {} confirmed with payment {}", id, payment_reference);
        self.with_options(updated).await
    }

    /// Cancel a PENDING or CONFIRMED reservation
    ///
    /// Paid reservations report the refund owed under the cancellation policy.
    pub async fn cancel_reservation(&self, id: i64) -> RentalResult<CancellationResponse> {
        let reservation = self.find(id).await?;
        ReservationStatusMachine::transition(id, reservation.status, ReservationStatus::Cancelled)?;

        let refund_percentage = match (&reservation.status, &reservation.payment_reference) {
            (ReservationStatus::Confirmed, Some(_)) => {
                Some(refund_percentage(reservation.start_date, Utc::now()))
            }
            _ => None,
        };
        let refund_amount = refund_percentage
            .map(|pct| round_money(reservation.total_price * pct / Decimal::ONE_HUNDRED));

        let updated = self
            .store
            .update_status(id, reservation.version, ReservationStatus::Cancelled, None)
            .await?;

        info!(
            "Reservation {} cancelled (refund: {:?})",
            id, refund_amount
        );
        Ok(CancellationResponse {
            reservation: self.with_options(updated).await?,
            refund_percentage,
            refund_amount,
        })
    }

    async fn find(&self, id: i64) -> RentalResult<Reservation> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RentalError::not_found("Reservation", id))
    }

    async fn with_options(&self, reservation: Reservation) -> RentalResult<ReservationResponse> {
        let options = self.store.find_options(reservation.id).await?;
        Ok(ReservationResponse::from_parts(reservation, options))
    }

    async fn generate_confirmation_number(&self) -> RentalResult<String> {
        for _ in 0..CONFIRMATION_ATTEMPTS {
            let candidate = format!("CONF-{:05}", rand::thread_rng().gen_range(0..100_000));
            if self.store.find_by_confirmation_number(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(RentalError::Conflict(
            "Could not allocate a unique confirmation number".to_string(),
        ))
    }
}

#[async_trait]
impl ReservationGateway for ReservationService {
    async fn get_reservation(&self, id: i64) -> RentalResult<ReservationSnapshot> {
        let reservation = self.find(id).await?;
        Ok(ReservationSnapshot {
            id: reservation.id,
            user_id: reservation.user_id,
            vehicle_id: reservation.vehicle_id,
            start_date: reservation.start_date,
            end_date: reservation.end_date,
            total_price: reservation.total_price,
            status: reservation.status,
        })
    }

    async fn set_reservation_status(&self, id: i64, status: ReservationStatus) -> RentalResult<()> {
        let reservation = self.find(id).await?;
        if reservation.status == status {
            debug!("Reservation {} already {}", id, status);
            return Ok(());
        }

        ReservationStatusMachine::transition(id, reservation.status, status)?;
        self.store
            .update_status(id, reservation.version, status, None)
            .await
            .map_err(|e| {
                warn!("Mirror update of reservation {} to {} failed: {}", id, status, e);
                e
            })?;

        info!("Reservation {} moved to {}", id, status);
        Ok(())
    }
}
