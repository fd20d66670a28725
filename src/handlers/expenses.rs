use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    middleware::current_user,
    models::{Expense, ExpenseDetail, ExpenseStatus},
    policy::{authorize, Action},
    reconcile,
};

/// Expense rows joined with task and submitter for API responses.
pub(crate) const EXPENSE_DETAIL_SELECT: &str = r#"
SELECT
    e.id,
    e.task_id,
    t.name AS task_name,
    t.estimated_cost AS task_estimated_cost,
    e.description,
    e.amount,
    e.expense_date,
    e.submitted_by,
    u.mobile AS submitter_mobile,
    u.role AS submitter_role,
    e.receipt_url,
    e.status,
    e.created_at
FROM expenses e
JOIN tasks t ON e.task_id = t.id
JOIN users u ON e.submitted_by = u.id
"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseRequest {
    task: Option<Uuid>,
    description: Option<String>,
    amount: Option<Decimal>,
    date: Option<NaiveDate>,
    receipt_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseRequest {
    task: Option<Uuid>,
    description: Option<String>,
    amount: Option<Decimal>,
    date: Option<NaiveDate>,
    receipt_url: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseFilters {
    status: Option<String>,
    task: Option<String>,
    submitted_by: Option<String>,
}

async fn load_expense(db: &Database, expense_id: Uuid) -> Result<Expense, ApiError> {
    sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE id = $1")
        .bind(expense_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))
}

async fn load_detail(db: &Database, expense_id: Uuid) -> Result<ExpenseDetail, ApiError> {
    let detail = sqlx::query_as::<_, ExpenseDetail>(&format!(
        "{} WHERE e.id = $1",
        EXPENSE_DETAIL_SELECT
    ))
    .bind(expense_id)
    .fetch_one(db)
    .await?;

    Ok(detail)
}

async fn task_exists(db: &Database, task_id: Uuid) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

pub async fn create_expense(
    State(db): State<Database>,
    headers: HeaderMap,
    Json(body): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::CreateExpense)?;

    let (task_id, amount, date) = match (body.task, body.amount, body.date) {
        (Some(t), Some(a), Some(d)) => (t, a, d),
        _ => {
            return Err(ApiError::Validation(
                "Please provide task, amount, and date".to_string(),
            ))
        }
    };

    if amount <= Decimal::ZERO {
        return Err(ApiError::Validation("Amount must be positive".to_string()));
    }

    if !task_exists(&db, task_id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let status = ExpenseStatus::initial_for(user.role);

    let expense = sqlx::query_as::<_, Expense>(
        r#"
        INSERT INTO expenses (task_id, description, amount, expense_date, submitted_by, receipt_url, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(&body.description)
    .bind(amount)
    .bind(date)
    .bind(user.id)
    .bind(&body.receipt_url)
    .bind(status)
    .fetch_one(&db)
    .await?;

    // Auto-approved submissions count immediately.
    if expense.status == ExpenseStatus::Approved {
        reconcile::reconcile_expense(&db, &expense).await;
    }

    let detail = load_detail(&db, expense.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "expense": detail })),
    ))
}

pub async fn expenses_list(
    State(db): State<Database>,
    Query(filters): Query<ExpenseFilters>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;

    let status = match filters.status.as_deref() {
        Some(raw) => Some(raw.parse::<ExpenseStatus>().map_err(|_| {
            ApiError::Validation("Status must be pending, approved, or rejected".to_string())
        })?),
        None => None,
    };

    let task = match filters.task.as_deref() {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| ApiError::Validation("Invalid task id".to_string()))?,
        ),
        None => None,
    };

    // Non-admin callers only ever see their own records.
    let submitted_by = if user.is_admin() {
        match filters.submitted_by.as_deref() {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| ApiError::Validation("Invalid submitter id".to_string()))?,
            ),
            None => None,
        }
    } else {
        Some(user.id)
    };

    let mut conditions = Vec::new();
    let mut bind_count = 1;

    if status.is_some() {
        conditions.push(format!("e.status = ${}", bind_count));
        bind_count += 1;
    }
    if task.is_some() {
        conditions.push(format!("e.task_id = ${}", bind_count));
        bind_count += 1;
    }
    if submitted_by.is_some() {
        conditions.push(format!("e.submitted_by = ${}", bind_count));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let query_sql = format!(
        "{} {} ORDER BY e.created_at DESC",
        EXPENSE_DETAIL_SELECT, where_clause
    );

    let mut query = sqlx::query_as::<_, ExpenseDetail>(&query_sql);
    if let Some(status) = status {
        query = query.bind(status);
    }
    if let Some(task_id) = task {
        query = query.bind(task_id);
    }
    if let Some(submitter) = submitted_by {
        query = query.bind(submitter);
    }

    let expenses = query.fetch_all(&db).await?;

    Ok(Json(json!({
        "success": true,
        "count": expenses.len(),
        "expenses": expenses,
    })))
}

pub async fn get_expense(
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;

    let detail = sqlx::query_as::<_, ExpenseDetail>(&format!(
        "{} WHERE e.id = $1",
        EXPENSE_DETAIL_SELECT
    ))
    .bind(expense_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;

    authorize(
        &user,
        Action::ViewExpense {
            owner: detail.submitted_by,
        },
    )?;

    Ok(Json(json!({ "success": true, "expense": detail })))
}

pub async fn update_expense(
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateExpenseRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;

    let expense = load_expense(&db, expense_id).await?;

    if !expense.is_editable() {
        return Err(ApiError::State(
            "Cannot update non-pending expenses".to_string(),
        ));
    }

    authorize(
        &user,
        Action::UpdateExpense {
            owner: expense.submitted_by,
        },
    )?;

    if let Some(amount) = body.amount {
        if amount <= Decimal::ZERO {
            return Err(ApiError::Validation("Amount must be positive".to_string()));
        }
    }

    let task_id = match body.task {
        Some(new_task) => {
            if !task_exists(&db, new_task).await? {
                return Err(ApiError::NotFound("Task not found".to_string()));
            }
            new_task
        }
        None => expense.task_id,
    };

    let description = body.description.or(expense.description);
    let amount = body.amount.unwrap_or(expense.amount);
    let date = body.date.unwrap_or(expense.expense_date);
    let receipt_url = body.receipt_url.or(expense.receipt_url);

    // The amount is not yet counted anywhere, so no reconciliation runs
    // here.
    sqlx::query(
        r#"
        UPDATE expenses
        SET task_id = $1, description = $2, amount = $3, expense_date = $4, receipt_url = $5
        WHERE id = $6
        "#,
    )
    .bind(task_id)
    .bind(&description)
    .bind(amount)
    .bind(date)
    .bind(&receipt_url)
    .bind(expense_id)
    .execute(&db)
    .await?;

    let detail = load_detail(&db, expense_id).await?;

    Ok(Json(json!({ "success": true, "expense": detail })))
}

pub async fn update_expense_status(
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<StatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ReviewExpenses)?;

    let next = body
        .status
        .as_deref()
        .and_then(|raw| raw.parse::<ExpenseStatus>().ok())
        .filter(|status| *status != ExpenseStatus::Pending)
        .ok_or_else(|| {
            ApiError::Validation("Status must be either approved or rejected".to_string())
        })?;

    let expense = load_expense(&db, expense_id).await?;

    if !expense.status.can_transition_to(next) {
        return Err(ApiError::State(
            "Can only approve/reject pending expenses".to_string(),
        ));
    }

    let expense = sqlx::query_as::<_, Expense>(
        "UPDATE expenses SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(next)
    .bind(expense_id)
    .fetch_one(&db)
    .await?;

    // Rejection never counted the amount, so only approval reconciles.
    if expense.status == ExpenseStatus::Approved {
        reconcile::reconcile_expense(&db, &expense).await;
    }

    let detail = load_detail(&db, expense_id).await?;

    Ok(Json(json!({ "success": true, "expense": detail })))
}

pub async fn delete_expense(
    State(db): State<Database>,
    Path(expense_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;

    let expense = load_expense(&db, expense_id).await?;

    if !expense.is_deletable() {
        return Err(ApiError::State(
            "Cannot delete approved expenses".to_string(),
        ));
    }

    authorize(
        &user,
        Action::DeleteExpense {
            owner: expense.submitted_by,
        },
    )?;

    sqlx::query("DELETE FROM expenses WHERE id = $1")
        .bind(expense_id)
        .execute(&db)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Expense deleted successfully",
    })))
}
