// HTTP handlers for discount rule administration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::auth::{policy, AuthenticatedUser, Operation};
use crate::discounts::{CreateDiscountRuleRequest, DiscountRule, UpdateDiscountRuleRequest};
use crate::error::RentalError;
use crate::AppState;

/// Handler for GET /api/discount-rules
pub async fn list_discount_rules_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<DiscountRule>>, RentalError> {
    policy::authorize(&user, Operation::ManageDiscountRules)?;

    let rules = state.discount_service.list_rules().await?;
    Ok(Json(rules))
}

/// Handler for POST /api/discount-rules
pub async fn create_discount_rule_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateDiscountRuleRequest>,
) -> Result<(StatusCode, Json<DiscountRule>), RentalError> {
    policy::authorize(&user, Operation::ManageDiscountRules)?;
    request.validate()?;

    let rule = state.discount_service.create_rule(request).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Handler for PUT /api/discount-rules/:id
pub async fn update_discount_rule_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateDiscountRuleRequest>,
) -> Result<Json<DiscountRule>, RentalError> {
    policy::authorize(&user, Operation::ManageDiscountRules)?;
    request.validate()?;

    let rule = state.discount_service.update_rule(id, request).await?;
    Ok(Json(rule))
}
