use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    handlers::expenses::EXPENSE_DETAIL_SELECT,
    models::{ExpenseDetail, Task, TaskCostRow, TaskReport, TaskStatus},
    middleware::current_user,
    policy::{authorize, Action},
};

/// Tasks joined with the live sum of their approved expenses.
pub(crate) const TASK_COST_SELECT: &str = r#"
SELECT
    t.id,
    t.name,
    t.description,
    t.estimated_cost,
    t.status,
    t.created_by,
    t.created_at,
    COALESCE(s.total, 0) AS actual_cost
FROM tasks t
LEFT JOIN (
    SELECT task_id, SUM(amount) AS total
    FROM expenses
    WHERE status = 'approved'
    GROUP BY task_id
) s ON s.task_id = t.id
"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    name: Option<String>,
    estimated_cost: Option<Decimal>,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    name: Option<String>,
    estimated_cost: Option<Decimal>,
    description: Option<String>,
    status: Option<TaskStatus>,
}

pub async fn create_task(
    State(db): State<Database>,
    headers: HeaderMap,
    Json(body): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageTasks)?;

    let (name, estimated_cost) = match (body.name, body.estimated_cost) {
        (Some(n), Some(c)) => (n, c),
        _ => {
            return Err(ApiError::Validation(
                "Please provide task name and estimated cost".to_string(),
            ))
        }
    };

    if estimated_cost <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "Estimated cost must be positive".to_string(),
        ));
    }

    let task = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (name, estimated_cost, description, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(estimated_cost)
    .bind(&body.description)
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "task": task })),
    ))
}

pub async fn tasks_list(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    current_user(&headers, &db).await?;

    let tasks: Vec<TaskReport> = sqlx::query_as::<_, TaskCostRow>(&format!(
        "{} ORDER BY t.created_at DESC",
        TASK_COST_SELECT
    ))
    .fetch_all(&db)
    .await?
    .into_iter()
    .map(TaskReport::from)
    .collect();

    Ok(Json(json!({
        "success": true,
        "count": tasks.len(),
        "tasks": tasks,
    })))
}

pub async fn get_task(
    State(db): State<Database>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    current_user(&headers, &db).await?;

    let task = sqlx::query_as::<_, TaskCostRow>(&format!("{} WHERE t.id = $1", TASK_COST_SELECT))
        .bind(task_id)
        .fetch_optional(&db)
        .await?
        .map(TaskReport::from)
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    let expenses = sqlx::query_as::<_, ExpenseDetail>(&format!(
        "{} WHERE e.task_id = $1 ORDER BY e.created_at DESC",
        EXPENSE_DETAIL_SELECT
    ))
    .bind(task_id)
    .fetch_all(&db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "task": task,
        "expenses": expenses,
    })))
}

pub async fn update_task(
    State(db): State<Database>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageTasks)?;

    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_optional(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if let Some(estimate) = body.estimated_cost {
        if estimate <= Decimal::ZERO {
            return Err(ApiError::Validation(
                "Estimated cost must be positive".to_string(),
            ));
        }
    }

    let name = body.name.unwrap_or(task.name);
    let estimated_cost = body.estimated_cost.unwrap_or(task.estimated_cost);
    let description = body.description.or(task.description);
    let status = body.status.unwrap_or(task.status);

    let task = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET name = $1, estimated_cost = $2, description = $3, status = $4
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(estimated_cost)
    .bind(&description)
    .bind(status)
    .bind(task_id)
    .fetch_one(&db)
    .await?;

    Ok(Json(json!({ "success": true, "task": task })))
}

pub async fn delete_task(
    State(db): State<Database>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageTasks)?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE id = $1")
        .bind(task_id)
        .fetch_one(&db)
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let approved = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM expenses WHERE task_id = $1 AND status = 'approved'",
    )
    .bind(task_id)
    .fetch_one(&db)
    .await?;
    if approved > 0 {
        return Err(ApiError::State(
            "Cannot delete task with approved expenses".to_string(),
        ));
    }

    // Remaining expenses under the task are pending or rejected; they go
    // with it.
    sqlx::query("DELETE FROM expenses WHERE task_id = $1")
        .bind(task_id)
        .execute(&db)
        .await?;

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(&db)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Task deleted successfully",
    })))
}
