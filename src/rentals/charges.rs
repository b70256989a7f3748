// Additional charges settled at check-in

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RentalError, RentalResult};
use crate::pricing::{rental_days, round_money};
use crate::rentals::FuelLevel;

const SECONDS_PER_DAY: i64 = 86_400;

/// Configured rates for check-in charges
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRates {
    pub included_km_per_day: i32,
    pub extra_km_rate: Decimal,
    pub fuel_tier_surcharge: Decimal,
    pub late_fee_multiplier: Decimal,
}

impl Default for ChargeRates {
    fn default() -> Self {
        Self {
            included_km_per_day: 200,
            extra_km_rate: Decimal::new(30, 2),
            fuel_tier_surcharge: Decimal::new(2000, 2),
            late_fee_multiplier: Decimal::new(15, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeKind {
    Mileage,
    Fuel,
    Late,
}

/// One itemized charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub kind: ChargeKind,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Itemized charges, only non-zero lines are kept
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdditionalCharges {
    pub lines: Vec<ChargeLine>,
    pub total: Decimal,
}

/// Readings and dates the charges are computed from
#[derive(Debug, Clone)]
pub struct ChargeInput {
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub actual_end: DateTime<Utc>,
    pub base_price: Decimal,
    pub start_kilometers: i32,
    pub end_kilometers: i32,
    pub start_fuel_level: FuelLevel,
    pub end_fuel_level: FuelLevel,
}

pub struct ChargeCalculator;

impl ChargeCalculator {
    /// Compute mileage, fuel and lateness charges
    ///
    /// Fails when the odometer went backwards.
    pub fn calculate(input: &ChargeInput, rates: &ChargeRates) -> RentalResult<AdditionalCharges> {
        if input.end_kilometers < input.start_kilometers {
            return Err(RentalError::Validation(format!(
                "End kilometers ({}) cannot be less than start kilometers ({})",
                input.end_kilometers, input.start_kilometers
            )));
        }

        let days = rental_days(input.planned_start, input.planned_end)?;
        let mut lines = Vec::new();

        let driven = i64::from(input.end_kilometers) - i64::from(input.start_kilometers);
        let allowance = i64::from(rates.included_km_per_day.max(0)) * days;
        let extra_km = (driven - allowance).max(0);
        if extra_km > 0 {
            lines.push(ChargeLine {
                kind: ChargeKind::Mileage,
                description: format!(
                    "{} km over the {} km allowance",
                    extra_km, allowance
                ),
                quantity: extra_km,
                unit_price: rates.extra_km_rate,
                amount: round_money(Decimal::from(extra_km) * rates.extra_km_rate),
            });
        }

        let tiers_lost = (input.start_fuel_level.tier() - input.end_fuel_level.tier()).max(0);
        if tiers_lost > 0 {
            lines.push(ChargeLine {
                kind: ChargeKind::Fuel,
                description: format!(
                    "Fuel returned at {:?}, taken at {:?}",
                    input.end_fuel_level, input.start_fuel_level
                ),
                quantity: tiers_lost,
                unit_price: rates.fuel_tier_surcharge,
                amount: round_money(Decimal::from(tiers_lost) * rates.fuel_tier_surcharge),
            });
        }

        let days_late = Self::days_late(input.planned_end, input.actual_end);
        if days_late > 0 {
            let daily_rate = round_money(input.base_price / Decimal::from(days));
            let unit_price = round_money(daily_rate * rates.late_fee_multiplier);
            lines.push(ChargeLine {
                kind: ChargeKind::Late,
                description: format!("Returned {} day(s) late", days_late),
                quantity: days_late,
                unit_price,
                amount: round_money(daily_rate * Decimal::from(days_late) * rates.late_fee_multiplier),
            });
        }

        let total = lines.iter().map(|line| line.amount).sum();
        Ok(AdditionalCharges { lines, total })
    }

    /// Whole days late, at least one once the planned end has passed
    pub fn days_late(planned_end: DateTime<Utc>, actual_end: DateTime<Utc>) -> i64 {
        if actual_end <= planned_end {
            return 0;
        }
        let seconds = (actual_end - planned_end).num_seconds();
        (seconds / SECONDS_PER_DAY).max(1)
    }
}
