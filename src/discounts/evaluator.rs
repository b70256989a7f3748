use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::discounts::{DiscountRule, NewDiscountRule};
use crate::error::{RentalError, RentalResult};
use crate::pricing::AppliedDiscount;

/// Selects the loyalty discount for a customer
///
/// Pure and read-only over the rule set.
pub struct DiscountEvaluator;

impl DiscountEvaluator {
    /// Pick the active rule with the highest threshold the customer reaches;
    /// ties on threshold go to the greatest percentage
    pub fn select(rules: &[DiscountRule], completed_rentals: i64) -> Option<&DiscountRule> {
        rules
            .iter()
            .filter(|rule| rule.is_active && i64::from(rule.min_completed_rentals) <= completed_rentals)
            .max_by(|a, b| {
                a.min_completed_rentals
                    .cmp(&b.min_completed_rentals)
                    .then(a.discount_percentage.cmp(&b.discount_percentage))
            })
    }

    /// The selected rule in the form the price calculator consumes
    pub fn applied_discount(rules: &[DiscountRule], completed_rentals: i64) -> Option<AppliedDiscount> {
        Self::select(rules, completed_rentals).map(|rule| AppliedDiscount {
            rule_name: rule.rule_name.clone(),
            percentage: rule.discount_percentage,
        })
    }

    /// Reject active rule sets where reaching a higher threshold would
    /// lower the discount
    pub fn check_monotonic(rules: &[DiscountRule]) -> RentalResult<()> {
        // best percentage per threshold, which is what `select` would pick
        let mut best: BTreeMap<i32, &DiscountRule> = BTreeMap::new();
        for rule in rules.iter().filter(|r| r.is_active) {
            best.entry(rule.min_completed_rentals)
                .and_modify(|current| {
                    if rule.discount_percentage > current.discount_percentage {
                        *current = rule;
                    }
                })
                .or_insert(rule);
        }

        let mut previous: Option<&DiscountRule> = None;
        for rule in best.values() {
            if let Some(lower) = previous {
                if rule.discount_percentage < lower.discount_percentage {
                    return Err(RentalError::Validation(format!(
                        "Rule '{}' ({} rentals, {}%) grants less than rule '{}' ({} rentals, {}%)",
                        rule.rule_name,
                        rule.min_completed_rentals,
                        rule.discount_percentage,
                        lower.rule_name,
                        lower.min_completed_rentals,
                        lower.discount_percentage
                    )));
                }
            }
            previous = Some(rule);
        }
        Ok(())
    }

    /// Check the active set that would result from inserting `rule`
    pub fn check_insert(active: &[DiscountRule], rule: &NewDiscountRule) -> RentalResult<()> {
        if !rule.is_active {
            return Ok(());
        }
        let now = chrono::Utc::now();
        let mut candidate = active.to_vec();
        candidate.push(DiscountRule {
            id: 0,
            rule_name: rule.rule_name.clone(),
            min_completed_rentals: rule.min_completed_rentals,
            discount_percentage: rule.discount_percentage,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        Self::check_monotonic(&candidate)
    }

    /// Check the active set that would result from overwriting `rule`
    pub fn check_update(active: &[DiscountRule], rule: &DiscountRule) -> RentalResult<()> {
        if !rule.is_active {
            return Ok(());
        }
        let mut candidate: Vec<DiscountRule> =
            active.iter().filter(|r| r.id != rule.id).cloned().collect();
        candidate.push(rule.clone());
        Self::check_monotonic(&candidate)
    }

    /// Percentage must lie in (0, 100]
    pub fn check_percentage(percentage: Decimal) -> RentalResult<()> {
        if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
            return Err(RentalError::Validation(
                "Discount percentage must be greater than 0 and at most 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn rule(id: i64, min: i32, percentage: Decimal, active: bool) -> DiscountRule {
    let now = chrono::Utc::now();
    DiscountRule {
        id,
        rule_name: format!("rule-{}", id),
        min_completed_rentals: min,
        discount_percentage: percentage,
        is_active: active,
        created_at: now,
        updated_at: now,
    }
}

/// Percentage granted, zero when no rule qualifies
#[cfg(test)]
fn percentage_for(rules: &[DiscountRule], completed_rentals: i64) -> Decimal {
    DiscountEvaluator::select(rules, completed_rentals)
        .map(|rule| rule.discount_percentage)
        .unwrap_or(Decimal::ZERO)
}
