use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Which rental transition a saga follows up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaKind {
    CheckOut,
    Completion,
}

impl SagaKind {
    /// Ordered steps run after the local commit
    pub fn steps(&self) -> [SagaStep; 2] {
        match self {
            SagaKind::CheckOut => [SagaStep::MarkVehicleRented, SagaStep::MarkReservationActive],
            SagaKind::Completion => [
                SagaStep::MarkVehicleAvailable,
                SagaStep::MarkReservationCompleted,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    MarkVehicleRented,
    MarkReservationActive,
    MarkVehicleAvailable,
    MarkReservationCompleted,
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaStep::MarkVehicleRented => "MARK_VEHICLE_RENTED",
            SagaStep::MarkReservationActive => "MARK_RESERVATION_ACTIVE",
            SagaStep::MarkVehicleAvailable => "MARK_VEHICLE_AVAILABLE",
            SagaStep::MarkReservationCompleted => "MARK_RESERVATION_COMPLETED",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    Done,
    Failed,
}

/// Outcome of one step, including its latest error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: SagaStep,
    pub state: StepState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    fn pending(step: SagaStep) -> Self {
        Self {
            step,
            state: StepState::Pending,
            attempts: 0,
            last_error: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    InProgress,
    Completed,
    PartiallyApplied,
    /// Left behind when a later saga for the same rental took over its
    /// remaining steps
    Superseded,
}

/// Persisted saga with its per-step outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SagaRecord {
    pub id: Uuid,
    pub kind: SagaKind,
    pub rental_id: i64,
    pub vehicle_id: i64,
    pub reservation_id: i64,
    pub status: SagaStatus,
    pub steps: Json<Vec<StepRecord>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord {
    pub fn new(kind: SagaKind, rental_id: i64, vehicle_id: i64, reservation_id: i64) -> Self {
        Self::with_leading_steps(kind, rental_id, vehicle_id, reservation_id, &[])
    }

    /// A saga that first runs `leading`, then the steps of `kind`
    pub fn with_leading_steps(
        kind: SagaKind,
        rental_id: i64,
        vehicle_id: i64,
        reservation_id: i64,
        leading: &[SagaStep],
    ) -> Self {
        let now = Utc::now();
        let steps = leading
            .iter()
            .copied()
            .chain(kind.steps())
            .map(StepRecord::pending)
            .collect();
        Self {
            id: Uuid::new_v4(),
            kind,
            rental_id,
            vehicle_id,
            reservation_id,
            status: SagaStatus::InProgress,
            steps: Json(steps),
            created_at: now,
            updated_at: now,
        }
    }

    /// Index of the first step not yet DONE
    pub fn next_step(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.state != StepState::Done)
    }

    pub fn is_complete(&self) -> bool {
        self.status == SagaStatus::Completed
    }

    /// Completed or superseded: nothing left to reconcile
    pub fn is_finished(&self) -> bool {
        matches!(self.status, SagaStatus::Completed | SagaStatus::Superseded)
    }

    /// The failed step and its error, if the saga stopped on one
    pub fn failure(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.state == StepState::Failed)
    }
}

/// Timeout and retry settings for collaborator calls
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            retry_backoff: Duration::from_millis(250),
        }
    }
}
