// HTTP handlers for saga reconciliation

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::auth::{policy, AuthenticatedUser, Operation};
use crate::error::RentalError;
use crate::orchestrator::SagaRecord;
use crate::AppState;

/// Handler for GET /api/orchestrations/pending
pub async fn list_pending_sagas_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<SagaRecord>>, RentalError> {
    policy::authorize(&user, Operation::ReconcileOrchestration)?;

    let sagas = state.orchestrator.pending().await?;
    Ok(Json(sagas))
}

/// Handler for POST /api/orchestrations/:id/resume
pub async fn resume_saga_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SagaRecord>, RentalError> {
    policy::authorize(&user, Operation::ReconcileOrchestration)?;

    let saga = state.orchestrator.resume(id).await?;
    Ok(Json(saga))
}

/// Handler for POST /api/orchestrations/reconcile
/// Resumes every saga left PARTIALLY_APPLIED
pub async fn reconcile_sagas_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<SagaRecord>>, RentalError> {
    policy::authorize(&user, Operation::ReconcileOrchestration)?;

    let sagas = state.orchestrator.reconcile_pending().await?;
    Ok(Json(sagas))
}
