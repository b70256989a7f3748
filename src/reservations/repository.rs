use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{RentalError, RentalResult};
use crate::reservations::{NewReservation, Reservation, ReservationOption, ReservationStatus};

/// Storage of reservations and their option lines
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a priced reservation with its options
    ///
    /// Fails with `Conflict` when another PENDING, CONFIRMED or ACTIVE
    /// reservation holds the vehicle over an overlapping period. The check
    /// and the insert are atomic per vehicle.
    async fn insert(&self, reservation: NewReservation) -> RentalResult<Reservation>;

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<Reservation>>;

    async fn find_by_confirmation_number(&self, number: &str) -> RentalResult<Option<Reservation>>;

    async fn find_by_user(&self, user_id: i64) -> RentalResult<Vec<Reservation>>;

    async fn find_options(&self, reservation_id: i64) -> RentalResult<Vec<ReservationOption>>;

    async fn count_completed_by_user(&self, user_id: i64) -> RentalResult<i64>;

    /// Conditional status update
    ///
    /// Applies only when the stored version still equals `expected_version`;
    /// otherwise fails with `Conflict`, or `NotFound` if the row is gone.
    async fn update_status(
        &self,
        id: i64,
        expected_version: i32,
        status: ReservationStatus,
        payment_reference: Option<&str>,
    ) -> RentalResult<Reservation>;
}

/// PostgreSQL-backed reservation store
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RESERVATION_COLUMNS: &str = r#"
    id, confirmation_number, vehicle_id, user_id, start_date, end_date,
    daily_price, number_of_days, base_price, options_price, discount_percentage,
    discount_amount, tax_amount, total_price, status, payment_reference, notes,
    version, created_at, updated_at
"#;

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn insert(&self, new: NewReservation) -> RentalResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        // Serialize bookings of one vehicle for the overlap check
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(new.vehicle_id)
            .execute(&mut *tx)
            .await?;

        let overlapping: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE vehicle_id = $1
                  AND status IN ('pending', 'confirmed', 'active')
                  AND start_date < $3
                  AND end_date > $2
            )
            "#,
        )
        .bind(new.vehicle_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .fetch_one(&mut *tx)
        .await?;

        if overlapping {
            return Err(RentalError::Conflict(format!(
                "Vehicle {} is already reserved for an overlapping period",
                new.vehicle_id
            )));
        }

        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            INSERT INTO reservations (
                confirmation_number, vehicle_id, user_id, start_date, end_date,
                daily_price, number_of_days, base_price, options_price, discount_percentage,
                discount_amount, tax_amount, total_price, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(&new.confirmation_number)
        .bind(new.vehicle_id)
        .bind(new.user_id)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.pricing.daily_price)
        .bind(new.pricing.number_of_days as i32)
        .bind(new.pricing.base_price)
        .bind(new.pricing.options_price)
        .bind(new.pricing.discount_percentage)
        .bind(new.pricing.discount_amount)
        .bind(new.pricing.tax_amount)
        .bind(new.pricing.total_price)
        .bind(ReservationStatus::Pending)
        .bind(&new.notes)
        .fetch_one(&mut *tx)
        .await?;

        for option in &new.options {
            sqlx::query(
                r#"
                INSERT INTO reservation_options (reservation_id, name, price, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(reservation.id)
            .bind(&option.name)
            .bind(option.price)
            .bind(option.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(reservation)
    }

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    async fn find_by_confirmation_number(&self, number: &str) -> RentalResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE confirmation_number = $1",
            RESERVATION_COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservation)
    }

    async fn find_by_user(&self, user_id: i64) -> RentalResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
            RESERVATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reservations)
    }

    async fn find_options(&self, reservation_id: i64) -> RentalResult<Vec<ReservationOption>> {
        let options = sqlx::query_as::<_, ReservationOption>(
            r#"
            SELECT id, reservation_id, name, price, quantity
            FROM reservation_options
            WHERE reservation_id = $1
            ORDER BY id
            "#,
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(options)
    }

    async fn count_completed_by_user(&self, user_id: i64) -> RentalResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reservations WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(ReservationStatus::Completed)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn update_status(
        &self,
        id: i64,
        expected_version: i32,
        status: ReservationStatus,
        payment_reference: Option<&str>,
    ) -> RentalResult<Reservation> {
        let updated = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            UPDATE reservations
            SET status = $1,
                payment_reference = COALESCE($2, payment_reference),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $3 AND version = $4
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(status)
        .bind(payment_reference)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(reservation) => Ok(reservation),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(RentalError::Conflict(format!(
                    "Reservation {} was modified concurrently",
                    id
                ))),
                None => Err(RentalError::not_found("Reservation", id)),
            },
        }
    }
}
