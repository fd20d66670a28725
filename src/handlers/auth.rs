use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    middleware::current_user,
    models::{Role, User, UserResponse},
    policy::{authorize, Action},
    utils::{create_token, hash_pin, is_valid_pin, verify_pin},
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    mobile: Option<String>,
    pin: Option<String>,
    role: Option<Role>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    mobile: Option<String>,
    pin: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPinRequest {
    new_pin: Option<String>,
}

pub async fn register(
    State(db): State<Database>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (mobile, pin) = match (body.mobile, body.pin) {
        (Some(m), Some(p)) => (m, p),
        _ => {
            return Err(ApiError::Validation(
                "Please provide mobile number and PIN".to_string(),
            ))
        }
    };

    if !is_valid_pin(&pin) {
        return Err(ApiError::Validation(
            "PIN must be exactly 4 digits".to_string(),
        ));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE mobile = $1")
        .bind(&mobile)
        .fetch_one(&db)
        .await?;
    if existing > 0 {
        return Err(ApiError::Validation(
            "Mobile number already registered".to_string(),
        ));
    }

    let pin_hash = hash_pin(&pin)?;
    let role = body.role.unwrap_or(Role::User);

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (mobile, pin_hash, role)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&mobile)
    .bind(&pin_hash)
    .bind(role)
    .fetch_one(&db)
    .await?;

    let token = create_token(user.id, user.mobile.clone())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": token,
            "user": UserResponse::from(user),
        })),
    ))
}

pub async fn login(
    State(db): State<Database>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (mobile, pin) = match (body.mobile, body.pin) {
        (Some(m), Some(p)) => (m, p),
        _ => {
            return Err(ApiError::Validation(
                "Please provide mobile number and PIN".to_string(),
            ))
        }
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE mobile = $1")
        .bind(&mobile)
        .fetch_optional(&db)
        .await?
        .ok_or_else(|| ApiError::Authentication("Invalid credentials".to_string()))?;

    if !verify_pin(&pin, &user.pin_hash).unwrap_or(false) {
        return Err(ApiError::Authentication("Invalid credentials".to_string()));
    }

    let token = create_token(user.id, user.mobile.clone())?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": UserResponse::from(user),
    })))
}

pub async fn me(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;

    let record = sqlx::query_as::<_, UserResponse>(
        "SELECT id, mobile, role, created_at FROM users WHERE id = $1",
    )
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    Ok(Json(json!({ "success": true, "user": record })))
}

pub async fn users_list(
    State(db): State<Database>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageUsers)?;

    let users = sqlx::query_as::<_, UserResponse>(
        "SELECT id, mobile, role, created_at FROM users ORDER BY created_at",
    )
    .fetch_all(&db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "users": users,
    })))
}

pub async fn reset_pin(
    State(db): State<Database>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<ResetPinRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageUsers)?;

    let new_pin = body
        .new_pin
        .filter(|pin| is_valid_pin(pin))
        .ok_or_else(|| ApiError::Validation("PIN must be exactly 4 digits".to_string()))?;

    let pin_hash = hash_pin(&new_pin)?;

    let updated = sqlx::query("UPDATE users SET pin_hash = $1 WHERE id = $2")
        .bind(&pin_hash)
        .bind(user_id)
        .execute(&db)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "PIN reset successfully",
    })))
}

pub async fn delete_user(
    State(db): State<Database>,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = current_user(&headers, &db).await?;
    authorize(&user, Action::ManageUsers)?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&db)
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    // Expense rows reference their submitter; deleting the user out from
    // under them would orphan approved history.
    let submitted = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM expenses WHERE submitted_by = $1",
    )
    .bind(user_id)
    .fetch_one(&db)
    .await?;
    if submitted > 0 {
        return Err(ApiError::State(
            "Cannot delete user with submitted expenses".to_string(),
        ));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&db)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}
