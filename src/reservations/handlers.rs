// HTTP handlers for reservation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::auth::{policy, AuthenticatedUser, Operation};
use crate::error::RentalError;
use crate::reservations::{
    CancellationResponse, ConfirmPaymentRequest, CreateReservationRequest, ReservationResponse,
};
use crate::AppState;

/// Handler for POST /api/reservations
/// Creates a PENDING reservation for the authenticated user
#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ReservationResponse),
        (status = 400, description = "Invalid dates or options"),
        (status = 404, description = "Vehicle not found"),
        (status = 409, description = "Vehicle already reserved for the period")
    ),
    security(("bearer" = [])),
    tag = "reservations"
)]
pub async fn create_reservation_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), RentalError> {
    policy::authorize(&user, Operation::CreateReservation)?;
    request.validate()?;

    let reservation = state
        .reservation_service
        .create_reservation(user.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Handler for GET /api/reservations
/// Lists the authenticated user's reservations
#[utoipa::path(
    get,
    path = "/api/reservations",
    responses(
        (status = 200, description = "Reservations of the caller", body = Vec<ReservationResponse>)
    ),
    security(("bearer" = [])),
    tag = "reservations"
)]
pub async fn list_reservations_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ReservationResponse>>, RentalError> {
    policy::authorize(&user, Operation::ViewReservation)?;

    let reservations = state.reservation_service.list_for_user(user.user_id).await?;
    Ok(Json(reservations))
}

/// Handler for GET /api/reservations/:id
#[utoipa::path(
    get,
    path = "/api/reservations/{id}",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation found", body = ReservationResponse),
        (status = 403, description = "Reservation belongs to another customer"),
        (status = 404, description = "Reservation not found")
    ),
    security(("bearer" = [])),
    tag = "reservations"
)]
pub async fn get_reservation_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ReservationResponse>, RentalError> {
    policy::authorize(&user, Operation::ViewReservation)?;

    let reservation = state.reservation_service.get_reservation(id).await?;
    policy::ensure_owner_or_staff(&user, reservation.user_id, "reservation")?;

    Ok(Json(reservation))
}

/// Handler for GET /api/reservations/confirmation/:number
pub async fn get_reservation_by_confirmation_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(number): Path<String>,
) -> Result<Json<ReservationResponse>, RentalError> {
    policy::authorize(&user, Operation::ViewReservation)?;

    let reservation = state
        .reservation_service
        .get_by_confirmation_number(&number)
        .await?;
    policy::ensure_owner_or_staff(&user, reservation.user_id, "reservation")?;

    Ok(Json(reservation))
}

/// Handler for POST /api/reservations/:id/payment
/// Records the payment reference and confirms the reservation
#[utoipa::path(
    post,
    path = "/api/reservations/{id}/payment",
    params(("id" = i64, Path, description = "Reservation id")),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Reservation confirmed", body = ReservationResponse),
        (status = 409, description = "Reservation is not PENDING")
    ),
    security(("bearer" = [])),
    tag = "reservations"
)]
pub async fn confirm_payment_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<ReservationResponse>, RentalError> {
    policy::authorize(&user, Operation::ConfirmPayment)?;
    request.validate()?;

    let reservation = state.reservation_service.get_reservation(id).await?;
    policy::ensure_owner_or_staff(&user, reservation.user_id, "reservation")?;

    let confirmed = state
        .reservation_service
        .confirm_payment(id, &request.payment_reference)
        .await?;
    Ok(Json(confirmed))
}

/// Handler for POST /api/reservations/:id/cancel
#[utoipa::path(
    post,
    path = "/api/reservations/{id}/cancel",
    params(("id" = i64, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation cancelled", body = CancellationResponse),
        (status = 409, description = "Reservation is ACTIVE or already terminal")
    ),
    security(("bearer" = [])),
    tag = "reservations"
)]
pub async fn cancel_reservation_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CancellationResponse>, RentalError> {
    policy::authorize(&user, Operation::CancelReservation)?;

    let reservation = state.reservation_service.get_reservation(id).await?;
    policy::ensure_owner_or_staff(&user, reservation.user_id, "reservation")?;

    let outcome = state.reservation_service.cancel_reservation(id).await?;
    Ok(Json(outcome))
}
