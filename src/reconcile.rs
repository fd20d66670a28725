//! Reconciliation engine.
//!
//! Derived aggregates (`budgets.amount_spent`/`remaining` and
//! `tasks.actual_cost`) are always recomputed as full sums over the approved
//! expenses, never adjusted incrementally. A recomputation is therefore
//! idempotent and cannot drift even if a previous run was skipped or failed.
//! Each aggregate write is a single UPDATE against a sum taken in the same
//! statement.

use log::{error, warn};
use uuid::Uuid;

use crate::{
    database::Database,
    models::{Budget, Expense},
};

/// Recompute `amount_spent` and `remaining` for the given budget from the
/// full set of approved expenses.
pub async fn recompute_budget(db: &Database, budget_id: Uuid) -> Result<Budget, sqlx::Error> {
    sqlx::query_as::<_, Budget>(
        r#"
        UPDATE budgets
        SET amount_spent = totals.spent,
            remaining = total_budget - totals.spent
        FROM (
            SELECT COALESCE(SUM(amount), 0) AS spent
            FROM expenses
            WHERE status = 'approved'
        ) AS totals
        WHERE id = $1
        RETURNING budgets.id, budgets.total_budget, budgets.amount_spent,
                  budgets.remaining, budgets.created_by, budgets.created_at
        "#,
    )
    .bind(budget_id)
    .fetch_one(db)
    .await
}

/// Recompute `actual_cost` for one task from its approved expenses.
pub async fn recompute_task(db: &Database, task_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE tasks
        SET actual_cost = COALESCE((
            SELECT SUM(amount)
            FROM expenses
            WHERE expenses.task_id = tasks.id AND status = 'approved'
        ), 0)
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .execute(db)
    .await?;

    Ok(())
}

/// Inline reconciliation entry, invoked exactly once right after an expense
/// is newly set to approved (auto-approve on create or explicit approval).
///
/// Failures here are logged and swallowed: the status change has already
/// been persisted and stays valid, and the aggregates can be repaired at any
/// time with [`reconcile_all`].
pub async fn reconcile_expense(db: &Database, expense: &Expense) {
    match Budget::find(db).await {
        Ok(Some(budget)) => {
            if let Err(err) = recompute_budget(db, budget.id).await {
                error!(
                    "budget recompute failed after approving expense {}: {}",
                    expense.id, err
                );
            }
        }
        Ok(None) => {
            warn!(
                "no budget configured; expense {} approved without a budget recompute",
                expense.id
            );
        }
        Err(err) => {
            error!("failed to load budget for reconciliation: {}", err);
        }
    }

    if let Err(err) = recompute_task(db, expense.task_id).await {
        error!(
            "task recompute failed after approving expense {}: {}",
            expense.id, err
        );
    }
}

/// Standalone repair: re-derive every aggregate from the expense ledger.
/// Safe to run at any time.
pub async fn reconcile_all(db: &Database) -> Result<(), sqlx::Error> {
    if let Some(budget) = Budget::find(db).await? {
        recompute_budget(db, budget.id).await?;
    } else {
        warn!("no budget configured; repairing task aggregates only");
    }

    sqlx::query(
        r#"
        UPDATE tasks
        SET actual_cost = COALESCE((
            SELECT SUM(amount)
            FROM expenses
            WHERE expenses.task_id = tasks.id AND status = 'approved'
        ), 0)
        "#,
    )
    .execute(db)
    .await?;

    Ok(())
}
