use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::{ReservationGateway, VehicleDirectory, VehicleStatus};
use crate::error::{RentalError, RentalResult};
use crate::orchestrator::{Orchestrator, SagaKind, SagaStatus};
use crate::rentals::{
    contract, inspection, ChargeCalculator, ChargeInput, ChargeRates, CheckInRecord,
    CheckInRequest, CheckInResponse, CheckOutRecord, CheckOutRequest, ContractSignature,
    CreateRentalRequest, InspectionComparison, InspectionRequest, InspectionType, NewInspection,
    NewRental, Rental, RentalContract, RentalStatus, RentalStatusMachine, RentalStore,
    RentalTransitionResponse, SignContractRequest, VehicleInspection,
};
use crate::reservations::ReservationStatus;

/// Configured behaviour of the rental lifecycle
#[derive(Debug, Clone, Default)]
pub struct RentalSettings {
    pub charge_rates: ChargeRates,
    /// Refuse completion while the contract is unsigned
    pub contract_signature_required: bool,
}

/// Rental lifecycle: check-out, check-in, completion and contracts
pub struct RentalService {
    store: Arc<dyn RentalStore>,
    reservations: Arc<dyn ReservationGateway>,
    vehicles: Arc<dyn VehicleDirectory>,
    orchestrator: Arc<Orchestrator>,
    settings: RentalSettings,
}

impl RentalService {
    pub fn new(
        store: Arc<dyn RentalStore>,
        reservations: Arc<dyn ReservationGateway>,
        vehicles: Arc<dyn VehicleDirectory>,
        orchestrator: Arc<Orchestrator>,
        settings: RentalSettings,
    ) -> Self {
        Self {
            store,
            reservations,
            vehicles,
            orchestrator,
            settings,
        }
    }

    /// Open a PENDING rental for a CONFIRMED reservation
    pub async fn create_rental(
        &self,
        employee_id: i64,
        request: CreateRentalRequest,
    ) -> RentalResult<Rental> {
        if request.deposit < Decimal::ZERO {
            return Err(RentalError::Validation(
                "Deposit cannot be negative".to_string(),
            ));
        }

        let reservation = self.reservations.get_reservation(request.reservation_id).await?;
        if reservation.status != ReservationStatus::Confirmed {
            return Err(RentalError::Conflict(format!(
                "Reservation {} is {}, only CONFIRMED reservations can be rented",
                reservation.id, reservation.status
            )));
        }

        let rental = self
            .store
            .insert(NewRental {
                reservation_id: reservation.id,
                user_id: reservation.user_id,
                vehicle_id: reservation.vehicle_id,
                employee_id,
                start_date: reservation.start_date,
                end_date: reservation.end_date,
                pickup_location: request.pickup_location,
                return_location: request.return_location,
                base_price: reservation.total_price,
                deposit: request.deposit,
            })
            .await?;

        info!(
            "Created rental {} for reservation {} (user {}, vehicle {})",
            rental.id, rental.reservation_id, rental.user_id, rental.vehicle_id
        );
        Ok(rental)
    }

    pub async fn get_rental(&self, id: i64) -> RentalResult<Rental> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RentalError::not_found("Rental", id))
    }

    pub async fn list_for_user(&self, user_id: i64) -> RentalResult<Vec<Rental>> {
        self.store.find_by_user(user_id).await
    }

    /// Rentals past their planned end and not yet checked in
    pub async fn list_overdue(&self) -> RentalResult<Vec<Rental>> {
        let overdue = self.store.find_overdue(Utc::now()).await?;
        debug!("{} overdue rentals", overdue.len());
        Ok(overdue)
    }

    /// PENDING → CHECKED_OUT → ACTIVE
    ///
    /// The reservation must still be CONFIRMED. The check-out, its
    /// inspection and the contract are committed together. The vehicle and
    /// reservation are then updated through the orchestrator; the rental
    /// becomes ACTIVE whatever the saga outcome.
    pub async fn check_out(
        &self,
        id: i64,
        employee_id: i64,
        request: CheckOutRequest,
    ) -> RentalResult<RentalTransitionResponse> {
        let rental = self.get_rental(id).await?;
        RentalStatusMachine::transition(id, rental.status, RentalStatus::CheckedOut)?;

        let reservation = self.reservations.get_reservation(rental.reservation_id).await?;
        if reservation.status != ReservationStatus::Confirmed {
            return Err(RentalError::Conflict(format!(
                "Reservation {} is {}, rental {} cannot be checked out",
                reservation.id, reservation.status, id
            )));
        }

        let vehicle = self.vehicles.get_vehicle(rental.vehicle_id).await?;
        if vehicle.status == VehicleStatus::Maintenance {
            return Err(RentalError::Conflict(format!(
                "Vehicle {} is under maintenance",
                vehicle.id
            )));
        }

        let now = Utc::now();
        let contract = contract::generate(&rental, &vehicle, &self.settings.charge_rates, now);
        let inspection = new_inspection(
            id,
            InspectionType::CheckOut,
            employee_id,
            request.start_kilometers,
            request.start_fuel_level,
            request.inspection,
        );

        let checked_out = self
            .store
            .commit_check_out(
                id,
                rental.version,
                CheckOutRecord {
                    employee_id,
                    actual_start_date: now,
                    start_kilometers: request.start_kilometers,
                    start_fuel_level: request.start_fuel_level,
                    checkout_notes: request.checkout_notes,
                },
                inspection,
                contract,
            )
            .await?;
        info!(
            "Rental {} checked out by employee {} at {} km",
            id, employee_id, request.start_kilometers
        );

        let saga = self
            .orchestrator
            .run(
                SagaKind::CheckOut,
                id,
                checked_out.vehicle_id,
                checked_out.reservation_id,
            )
            .await?;

        RentalStatusMachine::transition(id, checked_out.status, RentalStatus::Active)?;
        let active = self
            .store
            .update_status(id, checked_out.version, RentalStatus::Active)
            .await?;

        if saga.status == SagaStatus::PartiallyApplied {
            warn!(
                "Rental {} is ACTIVE but saga {} is partially applied",
                id, saga.id
            );
        }
        Ok(RentalTransitionResponse {
            rental: active,
            orchestration: saga,
        })
    }

    /// ACTIVE → CHECKED_IN with the itemized additional charges
    pub async fn check_in(
        &self,
        id: i64,
        employee_id: i64,
        request: CheckInRequest,
    ) -> RentalResult<CheckInResponse> {
        let rental = self.get_rental(id).await?;
        RentalStatusMachine::transition(id, rental.status, RentalStatus::CheckedIn)?;

        let (start_kilometers, start_fuel_level) =
            match (rental.start_kilometers, rental.start_fuel_level) {
                (Some(km), Some(fuel)) => (km, fuel),
                _ => {
                    return Err(RentalError::Internal(format!(
                        "Rental {} has no check-out readings",
                        id
                    )))
                }
            };

        let now = Utc::now();
        let charges = ChargeCalculator::calculate(
            &ChargeInput {
                planned_start: rental.start_date,
                planned_end: rental.end_date,
                actual_end: now,
                base_price: rental.base_price,
                start_kilometers,
                end_kilometers: request.end_kilometers,
                start_fuel_level,
                end_fuel_level: request.end_fuel_level,
            },
            &self.settings.charge_rates,
        )?;

        let inspection = new_inspection(
            id,
            InspectionType::CheckIn,
            employee_id,
            request.end_kilometers,
            request.end_fuel_level,
            request.inspection,
        );

        let checked_in = self
            .store
            .commit_check_in(
                id,
                rental.version,
                CheckInRecord {
                    actual_end_date: now,
                    end_kilometers: request.end_kilometers,
                    end_fuel_level: request.end_fuel_level,
                    checkin_notes: request.checkin_notes,
                    additional_charges: charges.total,
                    charge_lines: charges.lines.clone(),
                    total_price: rental.base_price + charges.total,
                },
                inspection,
            )
            .await?;

        info!(
            "Rental {} checked in at {} km, additional charges {}, total {}",
            id, request.end_kilometers, charges.total, checked_in.total_price
        );
        Ok(CheckInResponse {
            rental: checked_in,
            charges,
        })
    }

    /// CHECKED_IN → COMPLETED, then release the vehicle and close the
    /// reservation
    pub async fn complete(&self, id: i64) -> RentalResult<RentalTransitionResponse> {
        let rental = self.get_rental(id).await?;
        RentalStatusMachine::transition(id, rental.status, RentalStatus::Completed)?;

        if self.settings.contract_signature_required {
            let contract = self.get_contract(id).await?;
            if !contract.is_signed {
                return Err(RentalError::Conflict(format!(
                    "Contract {} must be signed before rental {} is completed",
                    contract.contract_number, id
                )));
            }
        }

        let completed = self
            .store
            .commit_completion(id, rental.version, Utc::now())
            .await?;
        info!("Rental {} completed, total {}", id, completed.total_price);

        let saga = self
            .orchestrator
            .run(
                SagaKind::Completion,
                id,
                completed.vehicle_id,
                completed.reservation_id,
            )
            .await?;

        Ok(RentalTransitionResponse {
            rental: completed,
            orchestration: saga,
        })
    }

    /// PENDING → CANCELLED
    pub async fn cancel(&self, id: i64) -> RentalResult<Rental> {
        let rental = self.get_rental(id).await?;
        RentalStatusMachine::transition(id, rental.status, RentalStatus::Cancelled)?;

        let cancelled = self
            .store
            .update_status(id, rental.version, RentalStatus::Cancelled)
            .await?;
        info!("Rental {} cancelled", id);
        Ok(cancelled)
    }

    pub async fn inspections(&self, id: i64) -> RentalResult<Vec<VehicleInspection>> {
        self.get_rental(id).await?;
        self.store.find_inspections(id).await
    }

    /// Compare the check-out inspection with the check-in one
    pub async fn compare_inspections(&self, id: i64) -> RentalResult<InspectionComparison> {
        let inspections = self.inspections(id).await?;
        let find = |kind: InspectionType| {
            inspections
                .iter()
                .find(|i| i.inspection_type == kind)
                .ok_or_else(|| RentalError::not_found("Inspection", format!("{:?} of rental {}", kind, id)))
        };

        let check_out = find(InspectionType::CheckOut)?;
        let check_in = find(InspectionType::CheckIn)?;
        inspection::compare(check_out, check_in)
    }

    pub async fn get_contract(&self, id: i64) -> RentalResult<RentalContract> {
        self.store
            .find_contract(id)
            .await?
            .ok_or_else(|| RentalError::not_found("RentalContract", id))
    }

    /// Sign the contract of rental `id`; a contract is signed at most once
    pub async fn sign_contract(
        &self,
        id: i64,
        request: SignContractRequest,
        signed_by_ip: Option<String>,
    ) -> RentalResult<RentalContract> {
        if !request.accept_terms {
            return Err(RentalError::Validation(
                "Terms and conditions must be accepted".to_string(),
            ));
        }

        let contract = self.get_contract(id).await?;
        if contract.is_signed {
            return Err(RentalError::invalid_transition(
                "RentalContract",
                id,
                "SIGNED",
                "SIGNED",
            ));
        }

        let signed = self
            .store
            .sign_contract(
                id,
                ContractSignature {
                    client_signature: request.client_signature,
                    signed_at: Utc::now(),
                    signed_by_ip,
                },
            )
            .await?;

        info!("Contract {} signed", signed.contract_number);
        Ok(signed)
    }
}

fn new_inspection(
    rental_id: i64,
    inspection_type: InspectionType,
    inspector_id: i64,
    kilometers: i32,
    fuel_level: crate::rentals::FuelLevel,
    request: InspectionRequest,
) -> NewInspection {
    NewInspection {
        rental_id,
        inspection_type,
        inspector_id,
        kilometers,
        fuel_level,
        checklist: request.checklist,
        overall_condition: request.overall_condition,
        damages_description: request.damages_description,
        photo_urls: request.photo_urls,
        notes: request.notes,
        inspection_date: Utc::now(),
    }
}
