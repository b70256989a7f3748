// HTTP handlers for rental endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use validator::Validate;

use crate::auth::{policy, AuthenticatedUser, Operation};
use crate::error::RentalError;
use crate::orchestrator::SagaStatus;
use crate::rentals::{
    CheckInRequest, CheckInResponse, CheckOutRequest, CreateRentalRequest, InspectionComparison,
    Rental, RentalContract, RentalTransitionResponse, SignContractRequest, VehicleInspection,
};
use crate::AppState;

/// 200 when every follow-up step ran, 202 when the saga is left for
/// reconciliation
fn transition_response(outcome: RentalTransitionResponse) -> Response {
    let status = match outcome.orchestration.status {
        SagaStatus::Completed => StatusCode::OK,
        _ => StatusCode::ACCEPTED,
    };
    (status, Json(outcome)).into_response()
}

/// Handler for POST /api/rentals
pub async fn create_rental_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateRentalRequest>,
) -> Result<(StatusCode, Json<Rental>), RentalError> {
    policy::authorize(&user, Operation::CreateRental)?;
    request.validate()?;

    let rental = state.rental_service.create_rental(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// Handler for GET /api/rentals
/// Lists the authenticated user's rentals
pub async fn list_rentals_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Rental>>, RentalError> {
    policy::authorize(&user, Operation::ViewRental)?;

    let rentals = state.rental_service.list_for_user(user.user_id).await?;
    Ok(Json(rentals))
}

/// Handler for GET /api/rentals/overdue
pub async fn list_overdue_rentals_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Rental>>, RentalError> {
    policy::authorize(&user, Operation::ListOverdueRentals)?;

    let rentals = state.rental_service.list_overdue().await?;
    Ok(Json(rentals))
}

/// Handler for GET /api/rentals/:id
pub async fn get_rental_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Rental>, RentalError> {
    policy::authorize(&user, Operation::ViewRental)?;

    let rental = state.rental_service.get_rental(id).await?;
    policy::ensure_owner_or_staff(&user, rental.user_id, "rental")?;

    Ok(Json(rental))
}

/// Handler for POST /api/rentals/:id/check-out
pub async fn check_out_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<CheckOutRequest>,
) -> Result<Response, RentalError> {
    policy::authorize(&user, Operation::CheckOutRental)?;
    request.validate()?;

    let outcome = state.rental_service.check_out(id, user.user_id, request).await?;
    Ok(transition_response(outcome))
}

/// Handler for POST /api/rentals/:id/check-in
pub async fn check_in_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, RentalError> {
    policy::authorize(&user, Operation::CheckInRental)?;
    request.validate()?;

    let outcome = state.rental_service.check_in(id, user.user_id, request).await?;
    Ok(Json(outcome))
}

/// Handler for POST /api/rentals/:id/complete
pub async fn complete_rental_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, RentalError> {
    policy::authorize(&user, Operation::CompleteRental)?;

    let outcome = state.rental_service.complete(id).await?;
    Ok(transition_response(outcome))
}

/// Handler for POST /api/rentals/:id/cancel
pub async fn cancel_rental_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Rental>, RentalError> {
    policy::authorize(&user, Operation::CancelRental)?;

    let rental = state.rental_service.cancel(id).await?;
    Ok(Json(rental))
}

/// Handler for GET /api/rentals/:id/inspections
pub async fn list_inspections_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<VehicleInspection>>, RentalError> {
    policy::authorize(&user, Operation::ViewRental)?;

    let rental = state.rental_service.get_rental(id).await?;
    policy::ensure_owner_or_staff(&user, rental.user_id, "rental")?;

    let inspections = state.rental_service.inspections(id).await?;
    Ok(Json(inspections))
}

/// Handler for GET /api/rentals/:id/inspections/comparison
pub async fn compare_inspections_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<InspectionComparison>, RentalError> {
    policy::authorize(&user, Operation::ViewRental)?;

    let rental = state.rental_service.get_rental(id).await?;
    policy::ensure_owner_or_staff(&user, rental.user_id, "rental")?;

    let comparison = state.rental_service.compare_inspections(id).await?;
    Ok(Json(comparison))
}

/// Handler for GET /api/rentals/:id/contract
pub async fn get_contract_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<RentalContract>, RentalError> {
    policy::authorize(&user, Operation::ViewRental)?;

    let rental = state.rental_service.get_rental(id).await?;
    policy::ensure_owner_or_staff(&user, rental.user_id, "rental")?;

    let contract = state.rental_service.get_contract(id).await?;
    Ok(Json(contract))
}

/// Handler for POST /api/rentals/:id/contract/sign
/// Only the renter signs their own contract
pub async fn sign_contract_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<SignContractRequest>,
) -> Result<Json<RentalContract>, RentalError> {
    policy::authorize(&user, Operation::SignContract)?;
    request.validate()?;

    let rental = state.rental_service.get_rental(id).await?;
    if rental.user_id != user.user_id {
        return Err(RentalError::Forbidden(format!(
            "Rental {} belongs to another customer",
            id
        )));
    }

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    let contract = state
        .rental_service
        .sign_contract(id, request, client_ip)
        .await?;
    Ok(Json(contract))
}
