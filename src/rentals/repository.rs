use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{RentalError, RentalResult};
use crate::rentals::{
    CheckInRecord, CheckOutRecord, ContractSignature, NewContract, NewInspection, NewRental,
    Rental, RentalContract, RentalStatus, RentalStatusMachine, VehicleInspection,
};

/// Storage of rentals, their inspections and contracts
///
/// Every status change is conditional on `expected_version`: a stale
/// version fails with `Conflict`, a missing row with `NotFound`.
#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Insert a PENDING rental; one rental per reservation
    async fn insert(&self, rental: NewRental) -> RentalResult<Rental>;

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<Rental>>;

    async fn find_by_user(&self, user_id: i64) -> RentalResult<Vec<Rental>>;

    /// Rentals out with the customer whose planned end is before `now`
    async fn find_overdue(&self, now: DateTime<Utc>) -> RentalResult<Vec<Rental>>;

    /// PENDING → CHECKED_OUT together with the check-out inspection and
    /// the contract, in one transaction
    async fn commit_check_out(
        &self,
        id: i64,
        expected_version: i32,
        record: CheckOutRecord,
        inspection: NewInspection,
        contract: NewContract,
    ) -> RentalResult<Rental>;

    /// ACTIVE → CHECKED_IN together with the check-in inspection
    async fn commit_check_in(
        &self,
        id: i64,
        expected_version: i32,
        record: CheckInRecord,
        inspection: NewInspection,
    ) -> RentalResult<Rental>;

    /// CHECKED_IN → COMPLETED, finalizing the contract
    async fn commit_completion(
        &self,
        id: i64,
        expected_version: i32,
        finalized_at: DateTime<Utc>,
    ) -> RentalResult<Rental>;

    /// Plain status change with no side records
    async fn update_status(
        &self,
        id: i64,
        expected_version: i32,
        status: RentalStatus,
    ) -> RentalResult<Rental>;

    async fn find_inspections(&self, rental_id: i64) -> RentalResult<Vec<VehicleInspection>>;

    async fn find_contract(&self, rental_id: i64) -> RentalResult<Option<RentalContract>>;

    /// Sign an unsigned contract; a signed one fails with
    /// `InvalidStateTransition`
    async fn sign_contract(
        &self,
        rental_id: i64,
        signature: ContractSignature,
    ) -> RentalResult<RentalContract>;
}

/// PostgreSQL-backed rental store
#[derive(Clone)]
pub struct PgRentalStore {
    pool: PgPool,
}

impl PgRentalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a versioned update matched no row
    async fn version_miss(&self, id: i64) -> RentalError {
        match self.find_by_id(id).await {
            Ok(Some(_)) => RentalError::Conflict(format!("Rental {} was modified concurrently", id)),
            Ok(None) => RentalError::not_found("Rental", id),
            Err(e) => e,
        }
    }

    async fn insert_inspection(
        tx: &mut Transaction<'_, Postgres>,
        inspection: &NewInspection,
    ) -> RentalResult<()> {
        let checklist = &inspection.checklist;
        sqlx::query(
            r#"
            INSERT INTO vehicle_inspections (
                rental_id, inspection_type, inspector_id, kilometers, fuel_level,
                exterior_clean, interior_clean, tires_condition, lights_working,
                wipers_functional, spare_wheel_present, documents_present,
                first_aid_kit_present, warning_triangle_present, overall_condition,
                damages_description, photo_urls, notes, inspection_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(inspection.rental_id)
        .bind(inspection.inspection_type)
        .bind(inspection.inspector_id)
        .bind(inspection.kilometers)
        .bind(inspection.fuel_level)
        .bind(checklist.exterior_clean)
        .bind(checklist.interior_clean)
        .bind(checklist.tires_condition)
        .bind(checklist.lights_working)
        .bind(checklist.wipers_functional)
        .bind(checklist.spare_wheel_present)
        .bind(checklist.documents_present)
        .bind(checklist.first_aid_kit_present)
        .bind(checklist.warning_triangle_present)
        .bind(inspection.overall_condition)
        .bind(&inspection.damages_description)
        .bind(&inspection.photo_urls)
        .bind(&inspection.notes)
        .bind(inspection.inspection_date)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

const RENTAL_COLUMNS: &str = r#"
    id, reservation_id, user_id, vehicle_id, employee_id, start_date, end_date,
    actual_start_date, actual_end_date, pickup_location, return_location,
    base_price, additional_charges, charge_lines, total_price, deposit, status,
    start_kilometers, end_kilometers, start_fuel_level, end_fuel_level,
    checkout_notes, checkin_notes, version, created_at, updated_at
"#;

const INSPECTION_COLUMNS: &str = r#"
    id, rental_id, inspection_type, inspector_id, kilometers, fuel_level,
    exterior_clean, interior_clean, tires_condition, lights_working,
    wipers_functional, spare_wheel_present, documents_present,
    first_aid_kit_present, warning_triangle_present, overall_condition,
    damages_description, photo_urls, notes, inspection_date
"#;

const CONTRACT_COLUMNS: &str = r#"
    id, rental_id, contract_number, content, content_hash, terms_and_conditions,
    is_signed, client_signature, signed_at, signed_by_ip, finalized_at,
    created_at, updated_at
"#;

#[async_trait]
impl RentalStore for PgRentalStore {
    async fn insert(&self, new: NewRental) -> RentalResult<Rental> {
        let rental = sqlx::query_as::<_, Rental>(&format!(
            r#"
            INSERT INTO rentals (
                reservation_id, user_id, vehicle_id, employee_id, start_date, end_date,
                pickup_location, return_location, base_price, total_price, deposit, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, $11)
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        ))
        .bind(new.reservation_id)
        .bind(new.user_id)
        .bind(new.vehicle_id)
        .bind(new.employee_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(&new.pickup_location)
        .bind(&new.return_location)
        .bind(new.base_price)
        .bind(new.deposit)
        .bind(RentalStatus::Pending)
        .fetch_one(&self.pool)
        .await?;

        Ok(rental)
    }

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<Rental>> {
        let rental = sqlx::query_as::<_, Rental>(&format!(
            "SELECT {} FROM rentals WHERE id = $1",
            RENTAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rental)
    }

    async fn find_by_user(&self, user_id: i64) -> RentalResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(&format!(
            "SELECT {} FROM rentals WHERE user_id = $1 ORDER BY created_at DESC",
            RENTAL_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rentals)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> RentalResult<Vec<Rental>> {
        // stored as snake_case text
        let out_statuses: Vec<String> = RentalStatus::ALL
            .into_iter()
            .filter(|status| RentalStatusMachine::is_in_progress(*status))
            .map(|status| status.as_str().to_lowercase())
            .collect();

        let rentals = sqlx::query_as::<_, Rental>(&format!(
            r#"
            SELECT {} FROM rentals
            WHERE status = ANY($1) AND end_date < $2
            ORDER BY end_date
            "#,
            RENTAL_COLUMNS
        ))
        .bind(&out_statuses)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rentals)
    }

    async fn commit_check_out(
        &self,
        id: i64,
        expected_version: i32,
        record: CheckOutRecord,
        inspection: NewInspection,
        contract: NewContract,
    ) -> RentalResult<Rental> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Rental>(&format!(
            r#"
            UPDATE rentals
            SET status = $1,
                employee_id = $2,
                actual_start_date = $3,
                start_kilometers = $4,
                start_fuel_level = $5,
                checkout_notes = $6,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $7 AND version = $8
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        ))
        .bind(RentalStatus::CheckedOut)
        .bind(record.employee_id)
        .bind(record.actual_start_date)
        .bind(record.start_kilometers)
        .bind(record.start_fuel_level)
        .bind(&record.checkout_notes)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(rental) = updated else {
            tx.rollback().await?;
            return Err(self.version_miss(id).await);
        };

        Self::insert_inspection(&mut tx, &inspection).await?;

        sqlx::query(
            r#"
            INSERT INTO rental_contracts (
                rental_id, contract_number, content, content_hash, terms_and_conditions
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(contract.rental_id)
        .bind(&contract.contract_number)
        .bind(&contract.content)
        .bind(&contract.content_hash)
        .bind(&contract.terms_and_conditions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rental)
    }

    async fn commit_check_in(
        &self,
        id: i64,
        expected_version: i32,
        record: CheckInRecord,
        inspection: NewInspection,
    ) -> RentalResult<Rental> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Rental>(&format!(
            r#"
            UPDATE rentals
            SET status = $1,
                actual_end_date = $2,
                end_kilometers = $3,
                end_fuel_level = $4,
                checkin_notes = $5,
                additional_charges = $6,
                charge_lines = $7,
                total_price = $8,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $9 AND version = $10
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        ))
        .bind(RentalStatus::CheckedIn)
        .bind(record.actual_end_date)
        .bind(record.end_kilometers)
        .bind(record.end_fuel_level)
        .bind(&record.checkin_notes)
        .bind(record.additional_charges)
        .bind(Json(&record.charge_lines))
        .bind(record.total_price)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(rental) = updated else {
            tx.rollback().await?;
            return Err(self.version_miss(id).await);
        };

        Self::insert_inspection(&mut tx, &inspection).await?;

        tx.commit().await?;
        Ok(rental)
    }

    async fn commit_completion(
        &self,
        id: i64,
        expected_version: i32,
        finalized_at: DateTime<Utc>,
    ) -> RentalResult<Rental> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Rental>(&format!(
            r#"
            UPDATE rentals
            SET status = $1, version = version + 1, updated_at = NOW()
            WHERE id = $2 AND version = $3
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        ))
        .bind(RentalStatus::Completed)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(rental) = updated else {
            tx.rollback().await?;
            return Err(self.version_miss(id).await);
        };

        sqlx::query(
            r#"
            UPDATE rental_contracts
            SET finalized_at = $1, updated_at = NOW()
            WHERE rental_id = $2 AND finalized_at IS NULL
            "#,
        )
        .bind(finalized_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rental)
    }

    async fn update_status(
        &self,
        id: i64,
        expected_version: i32,
        status: RentalStatus,
    ) -> RentalResult<Rental> {
        let updated = sqlx::query_as::<_, Rental>(&format!(
            r#"
            UPDATE rentals
            SET status = $1, version = version + 1, updated_at = NOW()
            WHERE id = $2 AND version = $3
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        ))
        .bind(status)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(rental) => Ok(rental),
            None => Err(self.version_miss(id).await),
        }
    }

    async fn find_inspections(&self, rental_id: i64) -> RentalResult<Vec<VehicleInspection>> {
        let inspections = sqlx::query_as::<_, VehicleInspection>(&format!(
            "SELECT {} FROM vehicle_inspections WHERE rental_id = $1 ORDER BY inspection_date",
            INSPECTION_COLUMNS
        ))
        .bind(rental_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(inspections)
    }

    async fn find_contract(&self, rental_id: i64) -> RentalResult<Option<RentalContract>> {
        let contract = sqlx::query_as::<_, RentalContract>(&format!(
            "SELECT {} FROM rental_contracts WHERE rental_id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(rental_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contract)
    }

    async fn sign_contract(
        &self,
        rental_id: i64,
        signature: ContractSignature,
    ) -> RentalResult<RentalContract> {
        let signed = sqlx::query_as::<_, RentalContract>(&format!(
            r#"
            UPDATE rental_contracts
            SET is_signed = TRUE,
                client_signature = $1,
                signed_at = $2,
                signed_by_ip = $3,
                updated_at = NOW()
            WHERE rental_id = $4 AND is_signed = FALSE
            RETURNING {}
            "#,
            CONTRACT_COLUMNS
        ))
        .bind(&signature.client_signature)
        .bind(signature.signed_at)
        .bind(&signature.signed_by_ip)
        .bind(rental_id)
        .fetch_optional(&self.pool)
        .await?;

        match signed {
            Some(contract) => Ok(contract),
            None => match self.find_contract(rental_id).await? {
                Some(_) => Err(RentalError::invalid_transition(
                    "RentalContract",
                    rental_id,
                    "SIGNED",
                    "SIGNED",
                )),
                None => Err(RentalError::not_found("RentalContract", rental_id)),
            },
        }
    }
}
