use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use bson::{DateTime, doc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use super::user_id;
use crate::auth::{AuthUser, hash_password, issue_token, verify_password};
use crate::database::is_duplicate_key;
use crate::error::AppError;
use crate::state::AppState;
use crate::user::{User, UserProfile, UserType};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2-100 characters"))]
    name: String,
    #[validate(email(message = "Please enter a valid email"))]
    email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
    user_type: UserType,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = payload.email.to_lowercase();
    if state.users().find_one(doc! { "email": &email }).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let mut user = User::new(
        payload.name,
        email,
        hash_password(&payload.password)?,
        payload.user_type,
        DateTime::now(),
    );

    // A concurrent registration with the same email loses against the
    // unique index even though the lookup above missed it.
    let result = state.users().insert_one(&user).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::Conflict("Email already registered".to_string())
        } else {
            e.into()
        }
    })?;
    user.id = result.inserted_id.as_object_id();

    let token = issue_token(&user_id(&user)?, &state.config)?;
    info!("Registered user {}", user.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "token": token,
            "user": UserProfile::from(&user),
            "profileCompletion": user.profile_completion(),
        })),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let mut user = state
        .users()
        .find_one(doc! { "email": payload.email.to_lowercase() })
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated.".to_string()));
    }

    let now = DateTime::now();
    state
        .users()
        .update_one(
            doc! { "_id": user_id(&user)? },
            doc! { "$set": { "lastActive": now } },
        )
        .await?;
    user.last_active = now;

    let token = issue_token(&user_id(&user)?, &state.config)?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": UserProfile::from(&user),
        "profileCompletion": user.profile_completion(),
    })))
}

async fn me(AuthUser(user): AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user": UserProfile::from(&user),
        "profileCompletion": user.profile_completion(),
    }))
}
