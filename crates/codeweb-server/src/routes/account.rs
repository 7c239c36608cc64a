//! Account registration and login

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bson::{doc, Document as BsonDocument};
use codeweb_common::CodewebError;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::auth::{email_exists, hash_password, verify_password, Claims};
use crate::error::{AppError, AppResult};
use crate::models::{
    CollectionName, DatabaseName, LoginResponse, MessageResponse, RegisterResponse, UserCreate,
    UserLogin, UserRole, UserStatus,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

async fn register(
    State(state): State<AppState>,
    Json(user): Json<UserCreate>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    user.validate()?;

    if email_exists(&state.store, &user.email, None).await? {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let password_hash = hash_password(&user.password)?;
    let user_id = state
        .store
        .insert_one(
            DatabaseName::Account.as_str(),
            CollectionName::User.as_str(),
            user.into_document(password_hash),
        )
        .await?;

    info!(user_id = %user_id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user_id,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<UserLogin>,
) -> AppResult<Json<LoginResponse>> {
    let user = state
        .store
        .find_one(
            DatabaseName::Account.as_str(),
            CollectionName::User.as_str(),
            doc! { "name": credentials.name.as_str() },
        )
        .await?
        .ok_or_else(|| AppError::invalid_credentials("login", "unknown user"))?;

    let hash = user.get_str("password").unwrap_or_default();
    if !verify_password(hash, &credentials.password) {
        return Err(AppError::invalid_credentials("login", "password mismatch"));
    }

    let status: UserStatus = stored_field(&user, "status")?;
    if !status.can_login() {
        return Err(AppError::Forbidden(format!("Account is {}", status.as_str())));
    }
    let role: UserRole = stored_field(&user, "role")?;

    let claims = Claims {
        user_id: user.get_str("_id").unwrap_or_default().to_string(),
        name: credentials.name,
        role,
    };
    let token = state.tokens.issue(&claims)?;

    info!(user_id = %claims.user_id, "user logged in");
    Ok(Json(LoginResponse { token }))
}

/// Decode a field of a stored user record. Missing or unknown values are an
/// internal error, never a default.
fn stored_field<T: DeserializeOwned>(user: &BsonDocument, field: &str) -> AppResult<T> {
    let value = user.get(field).cloned().ok_or_else(|| {
        CodewebError::Internal(format!("user record has no {}", field))
    })?;
    bson::from_bson(value).map_err(|e| {
        AppError::from(CodewebError::Internal(format!(
            "user record has invalid {}: {}",
            field, e
        )))
    })
}

async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new("Logged out"))
}
