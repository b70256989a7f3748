use std::sync::Arc;
use tracing::{debug, info};

use crate::discounts::{
    CreateDiscountRuleRequest, DiscountEvaluator, DiscountRule, DiscountRuleStore, NewDiscountRule,
    UpdateDiscountRuleRequest,
};
use crate::error::{RentalError, RentalResult};

/// Administration of the loyalty discount rules
#[derive(Clone)]
pub struct DiscountRuleService {
    store: Arc<dyn DiscountRuleStore>,
}

impl DiscountRuleService {
    pub fn new(store: Arc<dyn DiscountRuleStore>) -> Self {
        Self { store }
    }

    pub async fn list_rules(&self) -> RentalResult<Vec<DiscountRule>> {
        self.store.list_all().await
    }

    /// Create a rule; the active set must stay monotonic
    pub async fn create_rule(&self, request: CreateDiscountRuleRequest) -> RentalResult<DiscountRule> {
        DiscountEvaluator::check_percentage(request.discount_percentage)?;

        let new_rule = NewDiscountRule {
            rule_name: request.rule_name.trim().to_string(),
            min_completed_rentals: request.min_completed_rentals,
            discount_percentage: request.discount_percentage,
            is_active: request.is_active.unwrap_or(true),
        };

        let rule = self.store.insert(new_rule).await?;
        info!(
            "Created discount rule '{}': {} rentals -> {}%",
            rule.rule_name, rule.min_completed_rentals, rule.discount_percentage
        );
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        id: i64,
        request: UpdateDiscountRuleRequest,
    ) -> RentalResult<DiscountRule> {
        let mut rule = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RentalError::not_found("DiscountRule", id))?;

        if let Some(name) = request.rule_name {
            rule.rule_name = name.trim().to_string();
        }
        if let Some(min) = request.min_completed_rentals {
            rule.min_completed_rentals = min;
        }
        if let Some(percentage) = request.discount_percentage {
            DiscountEvaluator::check_percentage(percentage)?;
            rule.discount_percentage = percentage;
        }
        if let Some(active) = request.is_active {
            rule.is_active = active;
        }

        debug!("Updating discount rule {}", id);
        let updated = self.store.update(&rule).await?;
        info!(
            "Updated discount rule {} '{}' (active: {})",
            updated.id, updated.rule_name, updated.is_active
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryDiscountRuleStore;
    use rust_decimal_macros::dec;

    fn service() -> (DiscountRuleService, Arc<InMemoryDiscountRuleStore>) {
        let store = Arc::new(InMemoryDiscountRuleStore::default());
        (DiscountRuleService::new(store.clone()), store)
    }

    fn create(name: &str, min: i32, pct: rust_decimal::Decimal) -> CreateDiscountRuleRequest {
        CreateDiscountRuleRequest {
            rule_name: name.to_string(),
            min_completed_rentals: min,
            discount_percentage: pct,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn test_create_rule_defaults_to_active() {
        let (service, store) = service();
        let rule = service.create_rule(create("Fidelity 5", 5, dec!(10))).await.unwrap();
        assert!(rule.is_active);
        assert_eq!(store.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rule_rejects_bad_percentage() {
        let (service, _) = service();
        let err = service.create_rule(create("Too much", 5, dec!(150))).await.unwrap_err();
        assert!(matches!(err, RentalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rule_rejects_non_monotonic_set() {
        let (service, _) = service();
        service.create_rule(create("Silver", 5, dec!(20))).await.unwrap();
        let err = service.create_rule(create("Gold", 10, dec!(10))).await.unwrap_err();
        assert!(matches!(err, RentalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_set_monotonic() {
        let (service, store) = service();
        let (silver, gold) = tokio::join!(
            service.create_rule(create("Silver", 5, dec!(20))),
            service.create_rule(create("Gold", 10, dec!(10))),
        );

        assert_eq!(silver.is_ok() as u8 + gold.is_ok() as u8, 1);
        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(DiscountEvaluator::check_monotonic(&active).is_ok());
    }

    #[tokio::test]
    async fn test_update_rejects_lowering_higher_tier() {
        let (service, _) = service();
        service.create_rule(create("Silver", 5, dec!(10))).await.unwrap();
        let gold = service.create_rule(create("Gold", 10, dec!(15))).await.unwrap();

        let err = service
            .update_rule(
                gold.id,
                UpdateDiscountRuleRequest {
                    rule_name: None,
                    min_completed_rentals: None,
                    discount_percentage: Some(dec!(5)),
                    is_active: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RentalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let (service, _) = service();
        service.create_rule(create("Silver", 5, dec!(10))).await.unwrap();
        let err = service.create_rule(create("Silver", 8, dec!(15))).await.unwrap_err();
        assert!(matches!(err, RentalError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_deactivate_rule() {
        let (service, store) = service();
        let rule = service.create_rule(create("Silver", 5, dec!(10))).await.unwrap();
        let updated = service
            .update_rule(
                rule.id,
                UpdateDiscountRuleRequest {
                    rule_name: None,
                    min_completed_rentals: None,
                    discount_percentage: None,
                    is_active: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(!updated.is_active);
        assert!(store.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_rule() {
        let (service, _) = service();
        let err = service
            .update_rule(
                99,
                UpdateDiscountRuleRequest {
                    rule_name: None,
                    min_completed_rentals: None,
                    discount_percentage: Some(dec!(5)),
                    is_active: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RentalError::NotFound { .. }));
    }
}
