use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::{
    database::Database,
    error::ApiError,
    middleware::current_user,
    models::{Budget, BudgetSummary},
    policy::{authorize, Action},
    reconcile,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    total_budget: Option<Decimal>,
}

/// Create the budget record, or update the total if one already exists.
pub async fn create_or_update_budget(
    State(db): State<Database>,
    headers: HeaderMap,
    Json(body): Json<BudgetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageBudget)?;

    let total_budget = body
        .total_budget
        .filter(|total| *total > Decimal::ZERO)
        .ok_or_else(|| ApiError::Validation("Please provide a valid total budget".to_string()))?;

    if let Some(existing) = Budget::find(&db).await? {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets
            SET total_budget = $1,
                remaining = $1 - amount_spent
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(total_budget)
        .bind(existing.id)
        .fetch_one(&db)
        .await?;

        Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Budget updated successfully",
                "budget": budget,
            })),
        ))
    } else {
        let budget = sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budgets (total_budget, amount_spent, remaining, created_by)
            VALUES ($1, 0, $1, $2)
            RETURNING *
            "#,
        )
        .bind(total_budget)
        .bind(user.id)
        .fetch_one(&db)
        .await?;

        Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Budget created successfully",
                "budget": budget,
            })),
        ))
    }
}

pub async fn get_budget(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    current_user(&headers, &db).await?;

    let budget = Budget::find(&db).await?.ok_or_else(|| {
        ApiError::NotFound("No budget found. Please create one first.".to_string())
    })?;

    Ok(Json(json!({ "success": true, "budget": budget })))
}

/// Summary recomputed live from approved expenses, independent of the
/// stored aggregate, so reads stay consistent even if an inline
/// reconciliation was lost.
pub async fn budget_summary(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    current_user(&headers, &db).await?;

    let budget = Budget::find(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No budget found".to_string()))?;

    let total_spent = approved_total(&db).await?;

    Ok(Json(json!({
        "success": true,
        "summary": BudgetSummary::from_live_total(&budget, total_spent),
    })))
}

/// Drift repair: re-derive the budget and every task aggregate from the
/// expense ledger. Idempotent; exposed so operators do not have to wait for
/// the next approval to heal a missed reconciliation.
pub async fn reconcile_budget(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageBudget)?;

    reconcile::reconcile_all(&db).await?;

    let summary = match Budget::find(&db).await? {
        Some(budget) => Some(BudgetSummary::from_stored(&budget)),
        None => None,
    };

    Ok(Json(json!({
        "success": true,
        "message": "Aggregates reconciled",
        "summary": summary,
    })))
}

pub async fn approved_total(db: &Database) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE status = 'approved'",
    )
    .fetch_one(db)
    .await
}
