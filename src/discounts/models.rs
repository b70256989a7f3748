use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Loyalty discount keyed on a customer's completed-rental count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DiscountRule {
    pub id: i64,
    pub rule_name: String,
    pub min_completed_rentals: i32,
    /// Percentage in (0, 100]
    pub discount_percentage: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a rule about to be inserted
#[derive(Debug, Clone)]
pub struct NewDiscountRule {
    pub rule_name: String,
    pub min_completed_rentals: i32,
    pub discount_percentage: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountRuleRequest {
    #[validate(length(min = 1, max = 100, message = "Rule name must be 1-100 characters"))]
    pub rule_name: String,

    #[validate(range(min = 1, message = "Minimum completed rentals must be at least 1"))]
    pub min_completed_rentals: i32,

    pub discount_percentage: Decimal,

    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateDiscountRuleRequest {
    #[validate(length(min = 1, max = 100, message = "Rule name must be 1-100 characters"))]
    pub rule_name: Option<String>,

    #[validate(range(min = 1, message = "Minimum completed rentals must be at least 1"))]
    pub min_completed_rentals: Option<i32>,

    pub discount_percentage: Option<Decimal>,

    pub is_active: Option<bool>,
}
