use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::Database;

/// The event's budget record. The table is keyed by id so the aggregate is
/// addressed explicitly, but a deployment tracks a single event and the API
/// operates on the earliest-created row.
#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    pub total_budget: Decimal,
    pub amount_spent: Decimal,
    pub remaining: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub async fn find(db: &Database) -> Result<Option<Budget>, sqlx::Error> {
        sqlx::query_as::<_, Budget>(
            "SELECT id, total_budget, amount_spent, remaining, created_by, created_at
             FROM budgets ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(db)
        .await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub total_budget: Decimal,
    pub amount_spent: Decimal,
    pub remaining: Decimal,
    pub percentage_used: Decimal,
}

impl BudgetSummary {
    /// Summary from the stored aggregate (dashboards).
    pub fn from_stored(budget: &Budget) -> Self {
        Self {
            total_budget: budget.total_budget,
            amount_spent: budget.amount_spent,
            remaining: budget.remaining,
            percentage_used: percentage_used(budget.amount_spent, budget.total_budget),
        }
    }

    /// Summary recomputed from a live sum over approved expenses
    /// (`GET /api/budget/summary` read path).
    pub fn from_live_total(budget: &Budget, total_spent: Decimal) -> Self {
        Self {
            total_budget: budget.total_budget,
            amount_spent: total_spent,
            remaining: budget.total_budget - total_spent,
            percentage_used: percentage_used(total_spent, budget.total_budget),
        }
    }
}

pub fn percentage_used(amount_spent: Decimal, total_budget: Decimal) -> Decimal {
    if total_budget > Decimal::ZERO {
        (amount_spent / total_budget * Decimal::from(100)).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(percentage_used(dec!(200), dec!(1000)), dec!(20.00));
        assert_eq!(percentage_used(dec!(1), dec!(3)), dec!(33.33));
    }

    #[test]
    fn percentage_of_zero_budget_is_zero() {
        assert_eq!(percentage_used(dec!(50), dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn live_summary_allows_negative_remaining() {
        let budget = Budget {
            id: Uuid::new_v4(),
            total_budget: dec!(1000),
            amount_spent: dec!(0),
            remaining: dec!(1000),
            created_by: None,
            created_at: Utc::now(),
        };

        let summary = BudgetSummary::from_live_total(&budget, dec!(1200));
        assert_eq!(summary.remaining, dec!(-200));
        assert_eq!(summary.percentage_used, dec!(120.00));
    }
}
