use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::{ReservationGateway, VehicleDirectory, VehicleStatus};
use crate::error::{RentalError, RentalResult};
use crate::orchestrator::{
    CallPolicy, SagaKind, SagaLog, SagaRecord, SagaStatus, SagaStep, StepState,
};
use crate::reservations::ReservationStatus;

/// Runs the cross-service steps that follow a committed rental transition
///
/// Steps run in order and stop at the first failure. Nothing local is
/// rolled back: the saga is left PARTIALLY_APPLIED and can be resumed
/// from its first step not DONE.
pub struct Orchestrator {
    vehicles: Arc<dyn VehicleDirectory>,
    reservations: Arc<dyn ReservationGateway>,
    log: Arc<dyn SagaLog>,
    policy: CallPolicy,
}

impl Orchestrator {
    pub fn new(
        vehicles: Arc<dyn VehicleDirectory>,
        reservations: Arc<dyn ReservationGateway>,
        log: Arc<dyn SagaLog>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            vehicles,
            reservations,
            log,
            policy,
        }
    }

    /// Record and run a new saga
    ///
    /// A completion saga supersedes any check-out saga of the same rental
    /// still pending, so a later reconcile cannot mark the returned vehicle
    /// RENTED again. A reservation step the check-out never finished runs
    /// first, since a reservation only reaches COMPLETED from ACTIVE.
    pub async fn run(
        &self,
        kind: SagaKind,
        rental_id: i64,
        vehicle_id: i64,
        reservation_id: i64,
    ) -> RentalResult<SagaRecord> {
        let leading = match kind {
            SagaKind::Completion => self.supersede_check_out(rental_id).await?,
            SagaKind::CheckOut => Vec::new(),
        };
        let saga =
            SagaRecord::with_leading_steps(kind, rental_id, vehicle_id, reservation_id, &leading);
        self.log.insert(&saga).await?;
        debug!("Started {:?} saga {} for rental {}", kind, saga.id, rental_id);
        self.execute(saga).await
    }

    /// Continue a saga from its first step not DONE
    pub async fn resume(&self, id: Uuid) -> RentalResult<SagaRecord> {
        let saga = self
            .log
            .find_by_id(id)
            .await?
            .ok_or_else(|| RentalError::not_found("Saga", id))?;

        if saga.is_finished() {
            debug!("Saga {} already {:?}", id, saga.status);
            return Ok(saga);
        }
        info!("Resuming saga {} for rental {}", id, saga.rental_id);
        self.execute(saga).await
    }

    /// Sagas still waiting for reconciliation
    pub async fn pending(&self) -> RentalResult<Vec<SagaRecord>> {
        self.log.find_pending().await
    }

    /// Resume every pending saga, returning their new state
    ///
    /// A saga that fails again stays PARTIALLY_APPLIED and does not stop
    /// the others.
    pub async fn reconcile_pending(&self) -> RentalResult<Vec<SagaRecord>> {
        let pending = self.log.find_pending().await?;
        let mut results = Vec::with_capacity(pending.len());
        for saga in pending {
            results.push(self.execute(saga).await?);
        }

        let completed = results.iter().filter(|s| s.is_complete()).count();
        info!(
            "Reconciled {} of {} pending sagas",
            completed,
            results.len()
        );
        Ok(results)
    }

    /// Mark pending check-out sagas of a rental SUPERSEDED and return the
    /// reservation steps they left undone
    async fn supersede_check_out(&self, rental_id: i64) -> RentalResult<Vec<SagaStep>> {
        let mut carried = Vec::new();
        for mut saga in self.log.find_unfinished_for_rental(rental_id).await? {
            if saga.kind != SagaKind::CheckOut {
                continue;
            }
            let activate_pending = saga
                .steps
                .iter()
                .any(|s| s.step == SagaStep::MarkReservationActive && s.state != StepState::Done);
            if activate_pending && !carried.contains(&SagaStep::MarkReservationActive) {
                carried.push(SagaStep::MarkReservationActive);
            }

            saga.status = SagaStatus::Superseded;
            saga.updated_at = Utc::now();
            self.log.save(&saga).await?;
            info!(
                "Saga {} for rental {} superseded by completion",
                saga.id, rental_id
            );
        }
        Ok(carried)
    }

    async fn execute(&self, mut saga: SagaRecord) -> RentalResult<SagaRecord> {
        let start = saga.next_step().unwrap_or(saga.steps.len());
        saga.status = SagaStatus::InProgress;

        for index in start..saga.steps.len() {
            let step = saga.steps[index].step;
            let (result, attempts) = self.call_with_retry(step, &saga).await;

            let record = &mut saga.steps[index];
            record.attempts += attempts;
            record.updated_at = Some(Utc::now());

            match result {
                Ok(()) => {
                    record.state = StepState::Done;
                    record.last_error = None;
                    debug!("Saga {} step {} done", saga.id, step);
                }
                Err(e) => {
                    record.state = StepState::Failed;
                    record.last_error = Some(e.to_string());
                    warn!(
                        "Saga {} for rental {} stopped at {}: {}",
                        saga.id, saga.rental_id, step, e
                    );
                    saga.status = SagaStatus::PartiallyApplied;
                    saga.updated_at = Utc::now();
                    self.log.save(&saga).await?;
                    return Ok(saga);
                }
            }
        }

        saga.status = SagaStatus::Completed;
        saga.updated_at = Utc::now();
        self.log.save(&saga).await?;
        info!(
            "Saga {} ({:?}) for rental {} completed",
            saga.id, saga.kind, saga.rental_id
        );
        Ok(saga)
    }

    /// One attempt, plus a second one after the backoff when the first
    /// failure is transient
    async fn call_with_retry(&self, step: SagaStep, saga: &SagaRecord) -> (RentalResult<()>, u32) {
        match self.call(step, saga).await {
            Ok(()) => (Ok(()), 1),
            Err(e) if e.is_transient() => {
                warn!(
                    "Saga {} step {} failed transiently, retrying: {}",
                    saga.id, step, e
                );
                tokio::time::sleep(self.policy.retry_backoff).await;
                (self.call(step, saga).await, 2)
            }
            Err(e) => (Err(e), 1),
        }
    }

    async fn call(&self, step: SagaStep, saga: &SagaRecord) -> RentalResult<()> {
        let (service, call) = match step {
            SagaStep::MarkVehicleRented => (
                "vehicle",
                self.vehicles
                    .set_vehicle_status(saga.vehicle_id, VehicleStatus::Rented),
            ),
            SagaStep::MarkVehicleAvailable => (
                "vehicle",
                self.vehicles
                    .set_vehicle_status(saga.vehicle_id, VehicleStatus::Available),
            ),
            SagaStep::MarkReservationActive => (
                "reservation",
                self.reservations
                    .set_reservation_status(saga.reservation_id, ReservationStatus::Active),
            ),
            SagaStep::MarkReservationCompleted => (
                "reservation",
                self.reservations
                    .set_reservation_status(saga.reservation_id, ReservationStatus::Completed),
            ),
        };

        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RentalError::remote(
                service,
                step.to_string(),
                true,
                format!("timed out after {} ms", self.policy.timeout.as_millis()),
            )),
        }
    }
}
