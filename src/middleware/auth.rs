use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::{
    database::Database,
    error::ApiError,
    models::{Role, User},
    utils::verify_token,
};

/// The authenticated caller, resolved fresh from the database on every
/// request so revoked users fail immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub mobile: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub async fn current_user(headers: &HeaderMap, db: &Database) -> Result<CurrentUser, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Authentication("Not authorized, no token".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Authentication("Not authorized, no token".to_string()))?;

    let claims = verify_token(token)
        .map_err(|_| ApiError::Authentication("Not authorized, token failed".to_string()))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Authentication("Not authorized, token failed".to_string()))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::Authentication("User no longer exists".to_string()))?;

    Ok(CurrentUser {
        id: user.id,
        mobile: user.mobile,
        role: user.role,
    })
}
