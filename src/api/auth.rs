use crate::auth::{create_jwt, hash_password, verify_password, Claims};
use crate::errors::ApiError;
use crate::models::user::{self, Entity as User};
use axum::{extract::State, http::StatusCode, Json};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    responses(
        (status = 201, description = "User registered, token issued"),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn register(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = payload.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Please provide a username".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))?;

    let new_user = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(password_hash),
        role: Set("user".to_string()),
        created_at: Set(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    };

    let model = new_user.insert(&db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ApiError::Conflict("Username already taken".to_string())
        }
        _ => ApiError::Internal(e.to_string()),
    })?;

    tracing::info!("Registered user: {}", model.username);

    let token = create_jwt(model.id, &model.username, &model.role)
        .map_err(|e| ApiError::Internal(format!("Failed to issue token: {}", e)))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "token": token } })),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("Login attempt for user: {}", payload.username);

    let user = User::find()
        .filter(user::Column::Username.eq(&payload.username))
        .one(&db)
        .await?
        .ok_or_else(|| {
            tracing::warn!("User not found: {}", payload.username);
            ApiError::Unauthorized("Invalid credentials".to_string())
        })?;

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {
            let token = create_jwt(user.id, &user.username, &user.role)
                .map_err(|e| ApiError::Internal(format!("Failed to issue token: {}", e)))?;
            Ok(Json(json!({ "success": true, "data": { "token": token } })))
        }
        _ => {
            tracing::warn!("Password verification failed for user: {}", user.username);
            Err(ApiError::Unauthorized("Invalid credentials".to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated user"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<Json<Value>, ApiError> {
    let user = User::find_by_id(claims.uid)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": user.id,
            "username": user.username,
            "role": user.role,
            "createdAt": user.created_at
        }
    })))
}
