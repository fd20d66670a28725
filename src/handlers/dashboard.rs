use axum::{extract::State, http::HeaderMap, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    handlers::expenses::EXPENSE_DETAIL_SELECT,
    handlers::tasks::TASK_COST_SELECT,
    middleware::current_user,
    models::{
        percentage_used, Budget, BudgetStatus, BudgetSummary, ExpenseDetail, Role, TaskCostRow,
        TaskReport, TaskStatus,
    },
    policy::{authorize, Action},
};

#[derive(Debug, FromRow)]
struct ExpenseCounts {
    total: i64,
    pending: i64,
    approved: i64,
    rejected: i64,
}

#[derive(Debug, FromRow)]
struct UserExpenseCounts {
    total: i64,
    pending: i64,
    approved: i64,
    rejected: i64,
    total_submitted: Decimal,
    total_approved: Decimal,
}

#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownRow {
    task_id: Uuid,
    task_name: String,
    estimated_cost: Decimal,
    actual_cost: Decimal,
    expense_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownEntry {
    task_id: Uuid,
    task_name: String,
    estimated_cost: Decimal,
    actual_cost: Decimal,
    expense_count: i64,
    percentage: Decimal,
}

#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserStat {
    user_id: Uuid,
    mobile: String,
    role: Role,
    total_expenses: i64,
    approved_expenses: i64,
    total_amount: Decimal,
}

#[derive(Debug, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonthlySpend {
    year: i32,
    month: i32,
    total_amount: Decimal,
    count: i64,
}

async fn task_reports(db: &Database) -> Result<Vec<TaskReport>, sqlx::Error> {
    let reports = sqlx::query_as::<_, TaskCostRow>(&format!(
        "{} ORDER BY t.created_at DESC",
        TASK_COST_SELECT
    ))
    .fetch_all(db)
    .await?
    .into_iter()
    .map(TaskReport::from)
    .collect();

    Ok(reports)
}

pub async fn admin_dashboard(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ViewAdminDashboard)?;

    let budget = Budget::find(&db)
        .await?
        .map(|budget| BudgetSummary::from_stored(&budget));

    let tasks = task_reports(&db).await?;

    let total_estimated: Decimal = tasks.iter().map(|t| t.estimated_cost).sum();
    let total_actual: Decimal = tasks.iter().map(|t| t.actual_cost).sum();
    let completed_tasks = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();

    let counts = sqlx::query_as::<_, ExpenseCounts>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'approved') AS approved,
            COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
        FROM expenses
        "#,
    )
    .fetch_one(&db)
    .await?;

    let over_budget_tasks: Vec<&TaskReport> = tasks
        .iter()
        .filter(|t| t.budget_status == BudgetStatus::OverBudget)
        .collect();

    let recent = sqlx::query_as::<_, ExpenseDetail>(&format!(
        "{} ORDER BY e.created_at DESC LIMIT 10",
        EXPENSE_DETAIL_SELECT
    ))
    .fetch_all(&db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "dashboard": {
            "budget": budget,
            "tasksSummary": {
                "totalTasks": tasks.len(),
                "completedTasks": completed_tasks,
                "totalEstimated": total_estimated,
                "totalActual": total_actual,
                "difference": total_actual - total_estimated,
            },
            "tasks": tasks,
            "expenses": {
                "total": counts.total,
                "pending": counts.pending,
                "approved": counts.approved,
                "rejected": counts.rejected,
            },
            "alerts": {
                "overBudgetTasks": over_budget_tasks,
                "pendingApprovals": counts.pending,
            },
            "recentActivities": recent,
        },
    })))
}

pub async fn user_dashboard(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;

    let counts = sqlx::query_as::<_, UserExpenseCounts>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'approved') AS approved,
            COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
            COALESCE(SUM(amount), 0) AS total_submitted,
            COALESCE(SUM(amount) FILTER (WHERE status = 'approved'), 0) AS total_approved
        FROM expenses
        WHERE submitted_by = $1
        "#,
    )
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    let recent = sqlx::query_as::<_, ExpenseDetail>(&format!(
        "{} WHERE e.submitted_by = $1 ORDER BY e.created_at DESC LIMIT 10",
        EXPENSE_DETAIL_SELECT
    ))
    .bind(user.id)
    .fetch_all(&db)
    .await?;

    let budget = Budget::find(&db)
        .await?
        .map(|budget| BudgetSummary::from_stored(&budget));

    Ok(Json(json!({
        "success": true,
        "dashboard": {
            "budget": budget,
            "myExpenses": {
                "total": counts.total,
                "pending": counts.pending,
                "approved": counts.approved,
                "rejected": counts.rejected,
                "totalSubmitted": counts.total_submitted,
                "totalApproved": counts.total_approved,
            },
            "recentExpenses": recent,
        },
    })))
}

/// Approved spend per task with each task's share of the overall actual.
pub async fn expense_breakdown(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    current_user(&headers, &db).await?;

    let rows = sqlx::query_as::<_, BreakdownRow>(
        r#"
        SELECT
            t.id AS task_id,
            t.name AS task_name,
            t.estimated_cost,
            COALESCE(SUM(e.amount) FILTER (WHERE e.status = 'approved'), 0) AS actual_cost,
            COUNT(e.id) FILTER (WHERE e.status = 'approved') AS expense_count
        FROM tasks t
        LEFT JOIN expenses e ON e.task_id = t.id
        GROUP BY t.id, t.name, t.estimated_cost
        ORDER BY t.name
        "#,
    )
    .fetch_all(&db)
    .await?;

    let total_actual: Decimal = rows.iter().map(|r| r.actual_cost).sum();

    let breakdown: Vec<BreakdownEntry> = rows
        .into_iter()
        .map(|row| BreakdownEntry {
            percentage: percentage_used(row.actual_cost, total_actual),
            task_id: row.task_id,
            task_name: row.task_name,
            estimated_cost: row.estimated_cost,
            actual_cost: row.actual_cost,
            expense_count: row.expense_count,
        })
        .collect();

    Ok(Json(json!({ "success": true, "breakdown": breakdown })))
}

pub async fn analytics(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ViewAdminDashboard)?;

    let budget = Budget::find(&db).await?;

    let total_tasks = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
        .fetch_one(&db)
        .await?;
    let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&db)
        .await?;
    let total_expenses = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM expenses")
        .fetch_one(&db)
        .await?;

    let user_stats = sqlx::query_as::<_, UserStat>(
        r#"
        SELECT
            u.id AS user_id,
            u.mobile,
            u.role,
            COUNT(e.id) AS total_expenses,
            COUNT(e.id) FILTER (WHERE e.status = 'approved') AS approved_expenses,
            COALESCE(SUM(e.amount) FILTER (WHERE e.status = 'approved'), 0) AS total_amount
        FROM users u
        LEFT JOIN expenses e ON e.submitted_by = u.id
        GROUP BY u.id, u.mobile, u.role
        ORDER BY u.mobile
        "#,
    )
    .fetch_all(&db)
    .await?;

    let monthly = sqlx::query_as::<_, MonthlySpend>(
        r#"
        SELECT
            EXTRACT(YEAR FROM expense_date)::INT AS year,
            EXTRACT(MONTH FROM expense_date)::INT AS month,
            SUM(amount) AS total_amount,
            COUNT(*) AS count
        FROM expenses
        WHERE status = 'approved'
          AND expense_date >= (CURRENT_DATE - INTERVAL '6 months')
        GROUP BY 1, 2
        ORDER BY 1, 2
        "#,
    )
    .fetch_all(&db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "analytics": {
            "overview": {
                "totalBudget": budget.as_ref().map(|b| b.total_budget).unwrap_or(Decimal::ZERO),
                "totalSpent": budget.as_ref().map(|b| b.amount_spent).unwrap_or(Decimal::ZERO),
                "remaining": budget.as_ref().map(|b| b.remaining).unwrap_or(Decimal::ZERO),
                "totalTasks": total_tasks,
                "totalUsers": total_users,
                "totalExpenses": total_expenses,
            },
            "userStats": user_stats,
            "monthlyExpenses": monthly,
        },
    })))
}
