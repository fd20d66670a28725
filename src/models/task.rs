use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub estimated_cost: Decimal,
    pub status: TaskStatus,
    pub actual_cost: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Where a task sits relative to its estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetStatus {
    OverBudget,
    UnderBudget,
    OnTrack,
}

/// Pure derivation over (actual, estimated); recomputed on every read,
/// never persisted. Under-budget is a strict `<` against 90% of the
/// estimate, so exactly 90% still counts as on-track.
pub fn budget_status(actual_cost: Decimal, estimated_cost: Decimal) -> BudgetStatus {
    let under_threshold = estimated_cost * Decimal::new(9, 1);
    if actual_cost > estimated_cost {
        BudgetStatus::OverBudget
    } else if actual_cost < under_threshold {
        BudgetStatus::UnderBudget
    } else {
        BudgetStatus::OnTrack
    }
}

/// Task row joined with the live sum of its approved expenses.
#[derive(Debug, FromRow)]
pub struct TaskCostRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub estimated_cost: Decimal,
    pub status: TaskStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub actual_cost: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub estimated_cost: Decimal,
    pub status: TaskStatus,
    pub actual_cost: Decimal,
    pub budget_status: BudgetStatus,
    pub difference: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<TaskCostRow> for TaskReport {
    fn from(row: TaskCostRow) -> Self {
        Self {
            budget_status: budget_status(row.actual_cost, row.estimated_cost),
            difference: row.actual_cost - row.estimated_cost,
            id: row.id,
            name: row.name,
            description: row.description,
            estimated_cost: row.estimated_cost,
            status: row.status,
            actual_cost: row.actual_cost,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn over_budget_when_actual_exceeds_estimate() {
        assert_eq!(
            budget_status(dec!(101), dec!(100)),
            BudgetStatus::OverBudget
        );
        assert_eq!(
            budget_status(dec!(100.01), dec!(100)),
            BudgetStatus::OverBudget
        );
    }

    #[test]
    fn under_budget_below_ninety_percent() {
        assert_eq!(
            budget_status(dec!(85), dec!(100)),
            BudgetStatus::UnderBudget
        );
        assert_eq!(budget_status(dec!(0), dec!(100)), BudgetStatus::UnderBudget);
    }

    #[test]
    fn on_track_within_ninety_to_hundred_percent() {
        assert_eq!(budget_status(dec!(95), dec!(100)), BudgetStatus::OnTrack);
        assert_eq!(budget_status(dec!(100), dec!(100)), BudgetStatus::OnTrack);
    }

    #[test]
    fn exactly_ninety_percent_is_on_track() {
        // The under-budget comparison is strict.
        assert_eq!(budget_status(dec!(90), dec!(100)), BudgetStatus::OnTrack);
    }

    #[test]
    fn report_carries_difference() {
        let row = TaskCostRow {
            id: Uuid::new_v4(),
            name: "Catering".to_string(),
            description: None,
            estimated_cost: dec!(500),
            status: TaskStatus::Pending,
            created_by: None,
            created_at: chrono::Utc::now(),
            actual_cost: dec!(200),
        };

        let report = TaskReport::from(row);
        assert_eq!(report.difference, dec!(-300));
        assert_eq!(report.budget_status, BudgetStatus::UnderBudget);
    }
}
