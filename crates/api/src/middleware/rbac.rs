//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! match. Roles are disjoint: an administrator does not pass
//! [`RequireWorker`], for example.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use curbside_core::error::CoreError;
use curbside_core::roles::Role;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    role: Role,
    message: &str,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if Role::from_name(&user.role) != Some(role) {
        return Err(AppError::Core(CoreError::Forbidden(message.into())));
    }
    Ok(user)
}

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin, "Admin role required")
            .await
            .map(RequireAdmin)
    }
}

/// Requires the `worker` role.
pub struct RequireWorker(pub AuthUser);

impl FromRequestParts<AppState> for RequireWorker {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Worker, "Worker role required")
            .await
            .map(RequireWorker)
    }
}

/// Requires the `requester` role.
pub struct RequireRequester(pub AuthUser);

impl FromRequestParts<AppState> for RequireRequester {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Requester, "Requester role required")
            .await
            .map(RequireRequester)
    }
}

/// Requires any authenticated user with a known role.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.role()?;
        Ok(RequireAuth(user))
    }
}
