//! Handlers for the `/auth` resource (register, login, me).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use curbside_core::error::CoreError;
use curbside_core::roles::Role;
use curbside_db::models::user::{CreateUser, User, UserResponse};
use curbside_db::UserDirectory;
use curbside_events::bus::{ENTITY_USER, EVENT_USER_REGISTERED};
use curbside_events::PlatformEvent;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::error::{AppError, AppResult};
use crate::handlers::validation_message;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 120, message = "Please enter your name."))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: String,
    /// Defaults to `requester`. Legacy names (`resident`, `cleaner`) are accepted.
    pub role: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful authentication response returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account and sign it in. Returns 409 if the email is taken.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let input = RegisterRequest {
        name: input.name.trim().to_string(),
        email: normalize_email(&input.email),
        ..input
    };
    input
        .validate()
        .map_err(|e| CoreError::Validation(validation_message(&e)))?;

    let role = match input.role.as_deref() {
        Some(name) => name.parse::<Role>()?,
        None => Role::Requester,
    };

    if state.store.find_user_by_email(&input.email).await?.is_some() {
        return Err(CoreError::Conflict("An account with this email already exists".into()).into());
    }

    let password_hash = hash_password_blocking(input.password).await?;
    let user = state
        .store
        .create_user(&CreateUser {
            name: input.name,
            email: input.email,
            password_hash,
            role: role.as_str().to_string(),
        })
        .await?;

    tracing::info!(user_id = user.id, role = %role, "Account registered");
    state.event_bus.publish(
        PlatformEvent::new(EVENT_USER_REGISTERED)
            .with_source(ENTITY_USER, user.id)
            .with_actor(user.id)
            .with_payload(serde_json::json!({ "role": role.as_str() })),
    );

    Ok((StatusCode::CREATED, Json(auth_response(&state, &user)?)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid email or password".into()));

    let user = state
        .store
        .find_user_by_email(&normalize_email(&input.email))
        .await?
        .ok_or_else(invalid)?;

    if !verify_password_blocking(input.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = user.id, "Failed login attempt");
        return Err(invalid());
    }

    Ok(Json(auth_response(&state, &user)?))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("Account no longer exists".into()))?;
    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn auth_response(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let access_token = generate_access_token(user.id, &user.role, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
    Ok(AuthResponse {
        access_token,
        expires_in: state.config.jwt.expires_in_secs(),
        user: UserResponse::from(user),
    })
}
