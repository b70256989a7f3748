// HTTP handler for price quotes

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{policy, AuthenticatedUser, Operation};
use crate::error::RentalError;
use crate::pricing::{PricingBreakdown, SelectedOption};
use crate::AppState;

/// Request body for POST /api/pricing/quote
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    #[validate(range(min = 1, message = "Vehicle id must be positive"))]
    pub vehicle_id: i64,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[serde(default)]
    #[validate]
    pub options: Vec<SelectedOption>,
}

/// Handler for POST /api/pricing/quote
/// Prices a prospective rental, loyalty discount included
#[utoipa::path(
    post,
    path = "/api/pricing/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Price breakdown", body = PricingBreakdown),
        (status = 400, description = "Invalid dates, price or options"),
        (status = 404, description = "Vehicle not found"),
        (status = 502, description = "Vehicle service unavailable")
    ),
    security(("bearer" = [])),
    tag = "pricing"
)]
pub async fn quote_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<PricingBreakdown>, RentalError> {
    policy::authorize(&user, Operation::QuotePrice)?;
    request.validate()?;

    let breakdown = state
        .reservation_service
        .quote(
            user.user_id,
            request.vehicle_id,
            request.start_date,
            request.end_date,
            request.options,
        )
        .await?;

    Ok(Json(breakdown))
}
