//! JWT-based authentication extractors for Axum handlers.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use curbside_core::error::CoreError;
use curbside_core::roles::Role;
use curbside_core::types::DbId;
use serde::Deserialize;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's id (from `claims.sub`).
    pub user_id: DbId,
    /// The role name carried by the token.
    pub role: String,
}

impl AuthUser {
    /// The typed role. Tokens naming a role this server does not know are
    /// rejected with 403.
    pub fn role(&self) -> Result<Role, AppError> {
        Role::from_name(&self.role).ok_or_else(|| {
            AppError::Core(CoreError::Forbidden(format!(
                "Unknown role '{}'",
                self.role
            )))
        })
    }

    fn from_token(token: &str, state: &AppState) -> Result<Self, AppError> {
        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;
        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        AuthUser::from_token(token, state)
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Authenticated user for WebSocket upgrades.
///
/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// come from a `?token=` query parameter. A Bearer header is still accepted.
#[derive(Debug, Clone)]
pub struct WsAuthUser(pub AuthUser);

impl FromRequestParts<AppState> for WsAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty());
        match token {
            Some(token) => Ok(WsAuthUser(AuthUser::from_token(&token, state)?)),
            None => Ok(WsAuthUser(
                AuthUser::from_request_parts(parts, state).await?,
            )),
        }
    }
}
