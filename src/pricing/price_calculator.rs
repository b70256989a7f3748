use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{RentalError, RentalResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Round a monetary amount to cents, half-up
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Number of billable days between two instants
///
/// Partial days count as a full day and the minimum is one day.
/// Fails when `end` is not after `start`.
pub fn rental_days(start: DateTime<Utc>, end: DateTime<Utc>) -> RentalResult<i64> {
    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return Err(RentalError::Validation(
            "End date must be after start date".to_string(),
        ));
    }
    Ok(((seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY).max(1))
}

/// An extra selected on top of the vehicle (GPS, child seat, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct SelectedOption {
    #[validate(length(min = 1, max = 100, message = "Option name must be 1-100 characters"))]
    pub name: String,
    pub price: Decimal,
    #[validate(range(min = 0, message = "Option quantity cannot be negative"))]
    pub quantity: i32,
}

/// Everything the engine needs to price a rental
#[derive(Debug, Clone)]
pub struct PricingInput {
    pub vehicle_id: i64,
    pub daily_price: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub options: Vec<SelectedOption>,
}

/// Discount chosen by the rule evaluator for one pricing request
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDiscount {
    pub rule_name: String,
    /// Percentage in (0, 100]
    pub percentage: Decimal,
}

/// Structured decomposition of a rental's cost
///
/// Every monetary field is rounded to cents from unrounded intermediate
/// values, so rounding never compounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingBreakdown {
    pub vehicle_id: i64,
    pub daily_price: Decimal,
    pub number_of_days: i64,
    pub base_price: Decimal,
    pub options_price: Decimal,
    pub subtotal: Decimal,
    pub discount_rule: Option<String>,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub discounted_subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
}

/// Pure price computation, safe to call concurrently
pub struct PriceCalculator;

impl PriceCalculator {
    /// Price a rental request
    ///
    /// # Arguments
    /// * `input` - daily rate, date range and options
    /// * `tax_rate` - fraction applied after the discount (0.18 = 18%)
    /// * `discount` - rule selected by the discount evaluator, if any
    ///
    /// # Errors
    /// `Validation` when the date range is empty or inverted, the daily
    /// price is not positive, an option has a negative price or quantity,
    /// or an amount does not fit in a decimal.
    pub fn calculate(
        input: &PricingInput,
        tax_rate: Decimal,
        discount: Option<&AppliedDiscount>,
    ) -> RentalResult<PricingBreakdown> {
        if input.daily_price <= Decimal::ZERO {
            return Err(RentalError::Validation(
                "Daily price must be greater than zero".to_string(),
            ));
        }
        if tax_rate < Decimal::ZERO {
            return Err(RentalError::Validation(
                "Tax rate cannot be negative".to_string(),
            ));
        }
        let number_of_days = rental_days(input.start_date, input.end_date)?;

        let base_price = Self::calculate_base_price(input.daily_price, number_of_days)?;
        let options_price = Self::calculate_options_price(&input.options)?;
        let subtotal = checked(base_price.checked_add(options_price), "Subtotal")?;

        let discount_percentage = discount.map(|d| d.percentage).unwrap_or(Decimal::ZERO);
        let discounted_subtotal =
            subtotal * (Decimal::ONE - discount_percentage / Decimal::ONE_HUNDRED);
        let discount_amount = subtotal - discounted_subtotal;

        let tax_amount = checked(discounted_subtotal.checked_mul(tax_rate), "Tax amount")?;
        let total_price = checked(
            discounted_subtotal.checked_add(tax_amount),
            "Total price",
        )?;

        Ok(PricingBreakdown {
            vehicle_id: input.vehicle_id,
            daily_price: input.daily_price,
            number_of_days,
            base_price: round_money(base_price),
            options_price: round_money(options_price),
            subtotal: round_money(subtotal),
            discount_rule: discount.map(|d| d.rule_name.clone()),
            discount_percentage,
            discount_amount: round_money(discount_amount),
            discounted_subtotal: round_money(discounted_subtotal),
            tax_rate,
            tax_amount: round_money(tax_amount),
            total_price: round_money(total_price),
        })
    }

    /// Daily rate times billable days
    pub fn calculate_base_price(daily_price: Decimal, number_of_days: i64) -> RentalResult<Decimal> {
        checked(
            daily_price.checked_mul(Decimal::from(number_of_days)),
            "Base price",
        )
    }

    /// Sum of price times quantity over all options
    pub fn calculate_options_price(options: &[SelectedOption]) -> RentalResult<Decimal> {
        options.iter().try_fold(Decimal::ZERO, |total, option| {
            if option.quantity < 0 {
                return Err(RentalError::Validation(format!(
                    "Option '{}' has a negative quantity",
                    option.name
                )));
            }
            if option.price < Decimal::ZERO {
                return Err(RentalError::Validation(format!(
                    "Option '{}' has a negative price",
                    option.name
                )));
            }
            let line = checked(
                option.price.checked_mul(Decimal::from(option.quantity)),
                "Options price",
            )?;
            checked(total.checked_add(line), "Options price")
        })
    }
}

/// Amounts beyond the decimal range are rejected rather than wrapped
fn checked(amount: Option<Decimal>, what: &str) -> RentalResult<Decimal> {
    amount.ok_or_else(|| RentalError::Validation(format!("{} is out of range", what)))
}
