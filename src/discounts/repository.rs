use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::discounts::{DiscountEvaluator, DiscountRule, NewDiscountRule};
use crate::error::{RentalError, RentalResult};

/// Storage of discount rules
#[async_trait]
pub trait DiscountRuleStore: Send + Sync {
    async fn list_all(&self) -> RentalResult<Vec<DiscountRule>>;

    async fn list_active(&self) -> RentalResult<Vec<DiscountRule>>;

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<DiscountRule>>;

    /// Fails with `Conflict` when the rule name is taken, and with
    /// `Validation` when the active set would stop being monotonic.
    /// The check and the write are atomic across concurrent writers.
    async fn insert(&self, rule: NewDiscountRule) -> RentalResult<DiscountRule>;

    /// Persist every mutable field of `rule`, under the same checks as
    /// `insert`
    async fn update(&self, rule: &DiscountRule) -> RentalResult<DiscountRule>;
}

/// PostgreSQL-backed discount rule store
#[derive(Clone)]
pub struct PgDiscountRuleStore {
    pool: PgPool,
}

impl PgDiscountRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Take the rule-set lock and read the active rules inside `tx`
    async fn lock_active(tx: &mut Transaction<'_, Postgres>) -> RentalResult<Vec<DiscountRule>> {
        // two-key form, apart from the per-vehicle reservation locks
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('discount_rules'), 0)")
            .execute(&mut **tx)
            .await?;

        let rules = sqlx::query_as::<_, DiscountRule>(&format!(
            "SELECT {} FROM discount_rules WHERE is_active = TRUE ORDER BY min_completed_rentals, id",
            RULE_COLUMNS
        ))
        .fetch_all(&mut **tx)
        .await?;

        Ok(rules)
    }
}

const RULE_COLUMNS: &str =
    "id, rule_name, min_completed_rentals, discount_percentage, is_active, created_at, updated_at";

#[async_trait]
impl DiscountRuleStore for PgDiscountRuleStore {
    async fn list_all(&self) -> RentalResult<Vec<DiscountRule>> {
        let rules = sqlx::query_as::<_, DiscountRule>(&format!(
            "SELECT {} FROM discount_rules ORDER BY min_completed_rentals, id",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    async fn list_active(&self) -> RentalResult<Vec<DiscountRule>> {
        let rules = sqlx::query_as::<_, DiscountRule>(&format!(
            "SELECT {} FROM discount_rules WHERE is_active = TRUE ORDER BY min_completed_rentals, id",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    async fn find_by_id(&self, id: i64) -> RentalResult<Option<DiscountRule>> {
        let rule = sqlx::query_as::<_, DiscountRule>(&format!(
            "SELECT {} FROM discount_rules WHERE id = $1",
            RULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    async fn insert(&self, rule: NewDiscountRule) -> RentalResult<DiscountRule> {
        let mut tx = self.pool.begin().await?;
        let active = Self::lock_active(&mut tx).await?;
        DiscountEvaluator::check_insert(&active, &rule)?;

        let created = sqlx::query_as::<_, DiscountRule>(&format!(
            r#"
            INSERT INTO discount_rules (rule_name, min_completed_rentals, discount_percentage, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(&rule.rule_name)
        .bind(rule.min_completed_rentals)
        .bind(rule.discount_percentage)
        .bind(rule.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update(&self, rule: &DiscountRule) -> RentalResult<DiscountRule> {
        let mut tx = self.pool.begin().await?;
        let active = Self::lock_active(&mut tx).await?;
        DiscountEvaluator::check_update(&active, rule)?;

        let updated = sqlx::query_as::<_, DiscountRule>(&format!(
            r#"
            UPDATE discount_rules
            SET rule_name = $1, min_completed_rentals = $2, discount_percentage = $3,
                is_active = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            RULE_COLUMNS
        ))
        .bind(&rule.rule_name)
        .bind(rule.min_completed_rentals)
        .bind(rule.discount_percentage)
        .bind(rule.is_active)
        .bind(rule.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RentalError::not_found("DiscountRule", rule.id))?;

        tx.commit().await?;
        Ok(updated)
    }
}
