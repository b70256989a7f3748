// In-memory stores and fake collaborators for service and HTTP tests

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clients::{
    ReservationGateway, ReservationSnapshot, VehicleDirectory, VehicleSnapshot, VehicleStatus,
};
use crate::discounts::{DiscountEvaluator, DiscountRule, DiscountRuleStore, NewDiscountRule};
use crate::error::{RentalError, RentalResult};
use crate::orchestrator::{SagaLog, SagaRecord};
use crate::rentals::{
    CheckInRecord, CheckOutRecord, ContractSignature, InspectionType, NewContract, NewInspection,
    NewRental, Rental, RentalContract, RentalStatus, RentalStatusMachine, RentalStore,
    VehicleInspection,
};
use crate::reservations::{
    NewReservation, Reservation, ReservationOption, ReservationStatus, ReservationStatusMachine,
    ReservationStore,
};

/// Rental in PENDING status, as created from a reservation
pub(crate) fn rental(id: i64, vehicle_id: i64, user_id: i64) -> Rental {
    let now = Utc::now();
    let start = now + ChronoDuration::days(1);
    Rental {
        id,
        reservation_id: 3,
        user_id,
        vehicle_id,
        employee_id: Some(2),
        start_date: start,
        end_date: start + ChronoDuration::days(3),
        actual_start_date: None,
        actual_end_date: None,
        pickup_location: "Airport".to_string(),
        return_location: "Airport".to_string(),
        base_price: Decimal::new(18880, 2),
        additional_charges: Decimal::ZERO,
        charge_lines: Json(Vec::new()),
        total_price: Decimal::new(18880, 2),
        deposit: Decimal::new(30000, 2),
        status: RentalStatus::Pending,
        start_kilometers: None,
        end_kilometers: None,
        start_fuel_level: None,
        end_fuel_level: None,
        checkout_notes: None,
        checkin_notes: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ReservationTables {
    reservations: Vec<Reservation>,
    options: Vec<ReservationOption>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryReservationStore {
    tables: Mutex<ReservationTables>,
}

impl InMemoryReservationStore {
    /// Add `count` completed reservations for `user_id`
    pub async fn seed_completed(&self, user_id: i64, count: usize) {
        let mut tables = self.tables.lock().await;
        for _ in 0..count {
            tables.next_id += 1;
            let id = tables.next_id;
            let end = Utc::now() - ChronoDuration::days(30 + id);
            tables.reservations.push(Reservation {
                id,
                confirmation_number: format!("CONF-9{:04}", id),
                vehicle_id: 900,
                user_id,
                start_date: end - ChronoDuration::days(2),
                end_date: end,
                daily_price: Decimal::new(5000, 2),
                number_of_days: 2,
                base_price: Decimal::new(10000, 2),
                options_price: Decimal::ZERO,
                discount_percentage: Decimal::ZERO,
                discount_amount: Decimal::ZERO,
                tax_amount: Decimal::new(1800, 2),
                total_price: Decimal::new(11800, 2),
                status: ReservationStatus::Completed,
                payment_reference: Some(format!("pi_{}", id)),
                notes: None,
                version: 3,
                created_at: end,
                updated_at: end,
            });
        }
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn insert(&self, new: NewReservation) -> RentalResult<Reservation> {
        let mut tables = self.tables.lock().await;

        let overlapping = tables.reservations.iter().any(|r| {
            r.vehicle_id == new.vehicle_id
                && matches!(
                    r.status,
                    ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::Active
                )
                && r.start_date < new.end_date
                && r.end_date > new.start_date
        });
        if overlapping {
            return Err(RentalError::Conflict(format!(
                "Vehicle {} is already reserved for an overlapping period",
                new.vehicle_id
            )));
        }
        if tables
            .reservations
            .iter()
            .any(|r| r.confirmation_number == new.confirmation_number)
        {
            return Err(RentalError::Conflict("Duplicate confirmation number".to_string()));
        }

        tables.next_id += 1;
        let id = tables.next_id;
        let now = Utc::now();
        let reservation = Reservation {
            id,
            confirmation_number: new.confirmation_number,
            vehicle_id: new.vehicle_id,
            user_id: new.user_id,
            start_date: new.start_date,
            end_date: new.end_date,
            daily_price: new.pricing.daily_price,
            number_of_days: new.pricing.number_of_days as i32,
            base_price: new.pricing.base_price,
            options_price: new.pricing.options_price,
            discount_percentage: new.pricing.discount_percentage,
            discount_amount: new.pricing.discount_amount,
            tax_amount: new.pricing.tax_amount,
            total_price: new.pricing.total_price,
            status: ReservationStatus::Pending,
            payment_reference: None,
            notes: new.notes,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.reservations.push(reservation.clone());

        for option in new.options {
            let option_id = tables.options.len() as i64 + 1;
            tables.options.push(ReservationOption {
                id: option_id,
                reservation_id: id,
                name: option.name,
                price: option.price,
                quantity: option.quantity,
            });
        }

        Ok(reservation)
    }

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<Reservation>> {
        let tables = self.tables.lock().await;
        Ok(tables.reservations.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_confirmation_number(&self, number: &str) -> RentalResult<Option<Reservation>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .iter()
            .find(|r| r.confirmation_number == number)
            .cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> RentalResult<Vec<Reservation>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Reservation> = tables
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_options(&self, reservation_id: i64) -> RentalResult<Vec<ReservationOption>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .options
            .iter()
            .filter(|o| o.reservation_id == reservation_id)
            .cloned()
            .collect())
    }

    async fn count_completed_by_user(&self, user_id: i64) -> RentalResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id && r.status == ReservationStatus::Completed)
            .count() as i64)
    }

    async fn update_status(
        &self,
        id: i64,
        expected_version: i32,
        status: ReservationStatus,
        payment_reference: Option<&str>,
    ) -> RentalResult<Reservation> {
        let mut tables = self.tables.lock().await;
        let reservation = tables
            .reservations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RentalError::not_found("Reservation", id))?;

        if reservation.version != expected_version {
            return Err(RentalError::Conflict(format!(
                "Reservation {} was modified concurrently",
                id
            )));
        }

        reservation.status = status;
        if let Some(reference) = payment_reference {
            reservation.payment_reference = Some(reference.to_string());
        }
        reservation.version += 1;
        reservation.updated_at = Utc::now();
        Ok(reservation.clone())
    }
}

// ---------------------------------------------------------------------------
// Discount rules
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryDiscountRuleStore {
    rules: Mutex<Vec<DiscountRule>>,
}

impl InMemoryDiscountRuleStore {
    pub async fn seed(&self, rule: DiscountRule) {
        self.rules.lock().await.push(rule);
    }
}

#[async_trait]
impl DiscountRuleStore for InMemoryDiscountRuleStore {
    async fn list_all(&self) -> RentalResult<Vec<DiscountRule>> {
        let mut rules = self.rules.lock().await.clone();
        rules.sort_by_key(|r| (r.min_completed_rentals, r.id));
        Ok(rules)
    }

    async fn list_active(&self) -> RentalResult<Vec<DiscountRule>> {
        let rules = self.list_all().await?;
        Ok(rules.into_iter().filter(|r| r.is_active).collect())
    }

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<DiscountRule>> {
        let rules = self.rules.lock().await;
        Ok(rules.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, rule: NewDiscountRule) -> RentalResult<DiscountRule> {
        let mut rules = self.rules.lock().await;
        if rules.iter().any(|r| r.rule_name == rule.rule_name) {
            return Err(RentalError::Conflict(format!(
                "Discount rule '{}' already exists",
                rule.rule_name
            )));
        }
        let active: Vec<DiscountRule> = rules.iter().filter(|r| r.is_active).cloned().collect();
        DiscountEvaluator::check_insert(&active, &rule)?;

        let now = Utc::now();
        let created = DiscountRule {
            id: rules.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            rule_name: rule.rule_name,
            min_completed_rentals: rule.min_completed_rentals,
            discount_percentage: rule.discount_percentage,
            is_active: rule.is_active,
            created_at: now,
            updated_at: now,
        };
        rules.push(created.clone());
        Ok(created)
    }

    async fn update(&self, rule: &DiscountRule) -> RentalResult<DiscountRule> {
        let mut rules = self.rules.lock().await;
        if rules
            .iter()
            .any(|r| r.id != rule.id && r.rule_name == rule.rule_name)
        {
            return Err(RentalError::Conflict(format!(
                "Discount rule '{}' already exists",
                rule.rule_name
            )));
        }
        let active: Vec<DiscountRule> = rules.iter().filter(|r| r.is_active).cloned().collect();
        DiscountEvaluator::check_update(&active, rule)?;

        let stored = rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or_else(|| RentalError::not_found("DiscountRule", rule.id))?;
        *stored = DiscountRule {
            updated_at: Utc::now(),
            ..rule.clone()
        };
        Ok(stored.clone())
    }
}

// ---------------------------------------------------------------------------
// Rentals
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RentalTables {
    rentals: Vec<Rental>,
    inspections: Vec<VehicleInspection>,
    contracts: Vec<RentalContract>,
    next_id: i64,
}

impl RentalTables {
    /// Index of rental `id` if its version still matches
    fn versioned(&self, id: i64, expected_version: i32) -> RentalResult<usize> {
        let index = self
            .rentals
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RentalError::not_found("Rental", id))?;
        if self.rentals[index].version != expected_version {
            return Err(RentalError::Conflict(format!(
                "Rental {} was modified concurrently",
                id
            )));
        }
        Ok(index)
    }

    fn add_inspection(&mut self, new: NewInspection) -> RentalResult<()> {
        if self
            .inspections
            .iter()
            .any(|i| i.rental_id == new.rental_id && i.inspection_type == new.inspection_type)
        {
            return Err(RentalError::Conflict(format!(
                "Rental {} already has a {:?} inspection",
                new.rental_id, new.inspection_type
            )));
        }

        let checklist = new.checklist;
        self.inspections.push(VehicleInspection {
            id: self.inspections.len() as i64 + 1,
            rental_id: new.rental_id,
            inspection_type: new.inspection_type,
            inspector_id: new.inspector_id,
            kilometers: new.kilometers,
            fuel_level: new.fuel_level,
            exterior_clean: checklist.exterior_clean,
            interior_clean: checklist.interior_clean,
            tires_condition: checklist.tires_condition,
            lights_working: checklist.lights_working,
            wipers_functional: checklist.wipers_functional,
            spare_wheel_present: checklist.spare_wheel_present,
            documents_present: checklist.documents_present,
            first_aid_kit_present: checklist.first_aid_kit_present,
            warning_triangle_present: checklist.warning_triangle_present,
            overall_condition: new.overall_condition,
            damages_description: new.damages_description,
            photo_urls: new.photo_urls,
            notes: new.notes,
            inspection_date: new.inspection_date,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRentalStore {
    tables: Mutex<RentalTables>,
}

impl InMemoryRentalStore {
    /// Store a rental as is, keeping its id and status
    pub async fn seed(&self, rental: Rental) {
        let mut tables = self.tables.lock().await;
        tables.next_id = tables.next_id.max(rental.id);
        tables.rentals.push(rental);
    }
}

#[async_trait]
impl RentalStore for InMemoryRentalStore {
    async fn insert(&self, new: NewRental) -> RentalResult<Rental> {
        let mut tables = self.tables.lock().await;
        if tables
            .rentals
            .iter()
            .any(|r| r.reservation_id == new.reservation_id)
        {
            return Err(RentalError::Conflict(format!(
                "Reservation {} already has a rental",
                new.reservation_id
            )));
        }

        tables.next_id += 1;
        let now = Utc::now();
        let created = Rental {
            id: tables.next_id,
            reservation_id: new.reservation_id,
            user_id: new.user_id,
            vehicle_id: new.vehicle_id,
            employee_id: Some(new.employee_id),
            start_date: new.start_date,
            end_date: new.end_date,
            actual_start_date: None,
            actual_end_date: None,
            pickup_location: new.pickup_location,
            return_location: new.return_location,
            base_price: new.base_price,
            additional_charges: Decimal::ZERO,
            charge_lines: Json(Vec::new()),
            total_price: new.base_price,
            deposit: new.deposit,
            status: RentalStatus::Pending,
            start_kilometers: None,
            end_kilometers: None,
            start_fuel_level: None,
            end_fuel_level: None,
            checkout_notes: None,
            checkin_notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.rentals.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<Rental>> {
        let tables = self.tables.lock().await;
        Ok(tables.rentals.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> RentalResult<Vec<Rental>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> RentalResult<Vec<Rental>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rentals
            .iter()
            .filter(|r| {
                RentalStatusMachine::is_in_progress(r.status) && r.end_date < now
            })
            .cloned()
            .collect())
    }

    async fn commit_check_out(
        &self,
        id: i64,
        expected_version: i32,
        record: CheckOutRecord,
        inspection: NewInspection,
        contract: NewContract,
    ) -> RentalResult<Rental> {
        let mut tables = self.tables.lock().await;
        let index = tables.versioned(id, expected_version)?;
        if tables.contracts.iter().any(|c| c.rental_id == id) {
            return Err(RentalError::Conflict(format!("Rental {} already has a contract", id)));
        }
        tables.add_inspection(inspection)?;

        let now = Utc::now();
        let contract_id = tables.contracts.len() as i64 + 1;
        tables.contracts.push(RentalContract {
            id: contract_id,
            rental_id: contract.rental_id,
            contract_number: contract.contract_number,
            content: contract.content,
            content_hash: contract.content_hash,
            terms_and_conditions: contract.terms_and_conditions,
            is_signed: false,
            client_signature: None,
            signed_at: None,
            signed_by_ip: None,
            finalized_at: None,
            created_at: now,
            updated_at: now,
        });

        let rental = &mut tables.rentals[index];
        rental.status = RentalStatus::CheckedOut;
        rental.employee_id = Some(record.employee_id);
        rental.actual_start_date = Some(record.actual_start_date);
        rental.start_kilometers = Some(record.start_kilometers);
        rental.start_fuel_level = Some(record.start_fuel_level);
        rental.checkout_notes = record.checkout_notes;
        rental.version += 1;
        rental.updated_at = now;
        Ok(rental.clone())
    }

    async fn commit_check_in(
        &self,
        id: i64,
        expected_version: i32,
        record: CheckInRecord,
        inspection: NewInspection,
    ) -> RentalResult<Rental> {
        let mut tables = self.tables.lock().await;
        let index = tables.versioned(id, expected_version)?;
        tables.add_inspection(inspection)?;

        let rental = &mut tables.rentals[index];
        rental.status = RentalStatus::CheckedIn;
        rental.actual_end_date = Some(record.actual_end_date);
        rental.end_kilometers = Some(record.end_kilometers);
        rental.end_fuel_level = Some(record.end_fuel_level);
        rental.checkin_notes = record.checkin_notes;
        rental.additional_charges = record.additional_charges;
        rental.charge_lines = Json(record.charge_lines);
        rental.total_price = record.total_price;
        rental.version += 1;
        rental.updated_at = Utc::now();
        Ok(rental.clone())
    }

    async fn commit_completion(
        &self,
        id: i64,
        expected_version: i32,
        finalized_at: DateTime<Utc>,
    ) -> RentalResult<Rental> {
        let mut tables = self.tables.lock().await;
        let index = tables.versioned(id, expected_version)?;

        if let Some(contract) = tables
            .contracts
            .iter_mut()
            .find(|c| c.rental_id == id && c.finalized_at.is_none())
        {
            contract.finalized_at = Some(finalized_at);
            contract.updated_at = finalized_at;
        }

        let rental = &mut tables.rentals[index];
        rental.status = RentalStatus::Completed;
        rental.version += 1;
        rental.updated_at = Utc::now();
        Ok(rental.clone())
    }

    async fn update_status(
        &self,
        id: i64,
        expected_version: i32,
        status: RentalStatus,
    ) -> RentalResult<Rental> {
        let mut tables = self.tables.lock().await;
        let index = tables.versioned(id, expected_version)?;

        let rental = &mut tables.rentals[index];
        rental.status = status;
        rental.version += 1;
        rental.updated_at = Utc::now();
        Ok(rental.clone())
    }

    async fn find_inspections(&self, rental_id: i64) -> RentalResult<Vec<VehicleInspection>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<VehicleInspection> = tables
            .inspections
            .iter()
            .filter(|i| i.rental_id == rental_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.inspection_type == InspectionType::CheckIn);
        Ok(found)
    }

    async fn find_contract(&self, rental_id: i64) -> RentalResult<Option<RentalContract>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contracts
            .iter()
            .find(|c| c.rental_id == rental_id)
            .cloned())
    }

    async fn sign_contract(
        &self,
        rental_id: i64,
        signature: ContractSignature,
    ) -> RentalResult<RentalContract> {
        let mut tables = self.tables.lock().await;
        let contract = tables
            .contracts
            .iter_mut()
            .find(|c| c.rental_id == rental_id)
            .ok_or_else(|| RentalError::not_found("RentalContract", rental_id))?;

        if contract.is_signed {
            return Err(RentalError::invalid_transition(
                "RentalContract",
                rental_id,
                "SIGNED",
                "SIGNED",
            ));
        }

        contract.is_signed = true;
        contract.client_signature = Some(signature.client_signature);
        contract.signed_at = Some(signature.signed_at);
        contract.signed_by_ip = signature.signed_by_ip;
        contract.updated_at = signature.signed_at;
        Ok(contract.clone())
    }
}

// ---------------------------------------------------------------------------
// Sagas
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySagaLog {
    sagas: Mutex<HashMap<Uuid, SagaRecord>>,
}

#[async_trait]
impl SagaLog for InMemorySagaLog {
    async fn insert(&self, saga: &SagaRecord) -> RentalResult<()> {
        let mut sagas = self.sagas.lock().await;
        if sagas.contains_key(&saga.id) {
            return Err(RentalError::Conflict(format!("Saga {} already exists", saga.id)));
        }
        sagas.insert(saga.id, saga.clone());
        Ok(())
    }

    async fn save(&self, saga: &SagaRecord) -> RentalResult<()> {
        let mut sagas = self.sagas.lock().await;
        match sagas.get_mut(&saga.id) {
            Some(stored) => {
                *stored = saga.clone();
                Ok(())
            }
            None => Err(RentalError::not_found("Saga", saga.id)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> RentalResult<Option<SagaRecord>> {
        Ok(self.sagas.lock().await.get(&id).cloned())
    }

    async fn find_pending(&self) -> RentalResult<Vec<SagaRecord>> {
        let sagas = self.sagas.lock().await;
        let mut pending: Vec<SagaRecord> = sagas
            .values()
            .filter(|s| !s.is_finished())
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.created_at);
        Ok(pending)
    }

    async fn find_unfinished_for_rental(&self, rental_id: i64) -> RentalResult<Vec<SagaRecord>> {
        let mut pending = self.find_pending().await?;
        pending.retain(|s| s.rental_id == rental_id);
        Ok(pending)
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Failures to inject into the next calls
#[derive(Default)]
struct InjectedFailures {
    remaining: u32,
    transient: bool,
}

impl InjectedFailures {
    fn take(&mut self, service: &'static str, operation: &str) -> RentalResult<()> {
        if self.remaining == 0 {
            return Ok(());
        }
        self.remaining -= 1;
        Err(RentalError::remote(
            service,
            operation,
            self.transient,
            "injected failure",
        ))
    }
}

#[derive(Default)]
struct VehicleState {
    vehicles: HashMap<i64, VehicleSnapshot>,
    failures: InjectedFailures,
    delay: Option<Duration>,
    status_calls: usize,
}

/// Vehicle service double
#[derive(Default)]
pub struct FakeVehicleDirectory {
    state: Mutex<VehicleState>,
}

impl FakeVehicleDirectory {
    pub fn with_vehicle(id: i64, daily_price: Decimal) -> Self {
        let mut state = VehicleState::default();
        state.vehicles.insert(
            id,
            VehicleSnapshot {
                id,
                brand: "Peugeot".to_string(),
                model: "208".to_string(),
                license_plate: format!("AB-{:03}-CD", id),
                category: Some("COMPACT".to_string()),
                daily_price,
                status: VehicleStatus::Available,
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn status_of(&self, id: i64) -> Option<VehicleStatus> {
        self.state.lock().await.vehicles.get(&id).map(|v| v.status)
    }

    pub async fn set_status(&self, id: i64, status: VehicleStatus) {
        if let Some(vehicle) = self.state.lock().await.vehicles.get_mut(&id) {
            vehicle.status = status;
        }
    }

    /// Fail the next `count` status updates
    pub async fn fail_next(&self, count: u32, transient: bool) {
        self.state.lock().await.failures = InjectedFailures {
            remaining: count,
            transient,
        };
    }

    /// Delay every status update by `delay`
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    /// Number of status updates attempted
    pub async fn calls(&self) -> usize {
        self.state.lock().await.status_calls
    }
}

#[async_trait]
impl VehicleDirectory for FakeVehicleDirectory {
    async fn get_vehicle(&self, id: i64) -> RentalResult<VehicleSnapshot> {
        self.state
            .lock()
            .await
            .vehicles
            .get(&id)
            .cloned()
            .ok_or_else(|| RentalError::not_found("Vehicle", id))
    }

    async fn set_vehicle_status(&self, id: i64, status: VehicleStatus) -> RentalResult<()> {
        let delay = {
            let mut state = self.state.lock().await;
            state.status_calls += 1;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        state.failures.take("vehicle", "set_vehicle_status")?;
        let vehicle = state
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| RentalError::not_found("Vehicle", id))?;
        vehicle.status = status;
        Ok(())
    }
}

#[derive(Default)]
struct GatewayState {
    reservations: HashMap<i64, ReservationSnapshot>,
    failures: InjectedFailures,
}

/// Reservation gateway double holding snapshots only
pub struct FakeReservationGateway {
    state: Mutex<GatewayState>,
    total_price: Decimal,
}

impl FakeReservationGateway {
    /// Reservation for user 7 starting tomorrow, three days long
    pub fn with_reservation(id: i64, vehicle_id: i64, status: ReservationStatus) -> Self {
        let total_price = Decimal::new(18880, 2);
        let start = Utc::now() + ChronoDuration::days(1);
        let mut state = GatewayState::default();
        state.reservations.insert(
            id,
            ReservationSnapshot {
                id,
                user_id: 7,
                vehicle_id,
                start_date: start,
                end_date: start + ChronoDuration::days(3),
                total_price,
                status,
            },
        );
        Self {
            state: Mutex::new(state),
            total_price,
        }
    }

    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    pub async fn status_of(&self, id: i64) -> Option<ReservationStatus> {
        self.state.lock().await.reservations.get(&id).map(|r| r.status)
    }

    pub async fn set_status(&self, id: i64, status: ReservationStatus) {
        if let Some(reservation) = self.state.lock().await.reservations.get_mut(&id) {
            reservation.status = status;
        }
    }

    /// Fail the next `count` status updates
    pub async fn fail_next(&self, count: u32, transient: bool) {
        self.state.lock().await.failures = InjectedFailures {
            remaining: count,
            transient,
        };
    }
}

#[async_trait]
impl ReservationGateway for FakeReservationGateway {
    async fn get_reservation(&self, id: i64) -> RentalResult<ReservationSnapshot> {
        self.state
            .lock()
            .await
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| RentalError::not_found("Reservation", id))
    }

    async fn set_reservation_status(&self, id: i64, status: ReservationStatus) -> RentalResult<()> {
        let mut state = self.state.lock().await;
        state.failures.take("reservation", "set_reservation_status")?;

        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or_else(|| RentalError::not_found("Reservation", id))?;
        if reservation.status != status {
            ReservationStatusMachine::transition(id, reservation.status, status)?;
            reservation.status = status;
        }
        Ok(())
    }
}
