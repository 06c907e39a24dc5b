//! Authentication extractors.
//!
//! Provides extractors for requiring an authenticated (or admin) caller
//! in route handlers. Token parsing happens here; everything past the
//! extractor works with an already-authenticated [`CurrentUser`].

pub mod jwt;

pub use jwt::{JwtError, JwtService};

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};

use zagros_core::{Phone, UserId, UserRole};

use crate::state::AppState;

/// The authenticated caller, loaded fresh from the user store.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub phone: Phone,
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether the caller has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Extractor that additionally requires the admin role.
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when authentication fails.
#[derive(Debug, Clone, Copy)]
pub enum AuthRejection {
    /// No usable bearer token.
    MissingToken,
    /// Token failed validation.
    InvalidToken,
    /// Token expired.
    ExpiredToken,
    /// Token was fine but the account is gone or deactivated.
    AccountUnavailable,
    /// Caller is authenticated but not an admin.
    AdminOnly,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "unauthorized", "missing token"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", "invalid token"),
            Self::ExpiredToken => (StatusCode::UNAUTHORIZED, "token_expired", "token expired"),
            Self::AccountUnavailable => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "account unavailable",
            ),
            Self::AdminOnly => (StatusCode::FORBIDDEN, "forbidden", "admin access required"),
        };
        let body = axum::Json(serde_json::json!({ "code": code, "message": message }));
        (status, body).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;

        let (user_id, _) = state.jwt().verify_access(token).map_err(|e| match e {
            JwtError::Expired => AuthRejection::ExpiredToken,
            _ => AuthRejection::InvalidToken,
        })?;

        // Re-load the account so deactivation and role changes take
        // effect immediately, not at token expiry.
        let user = state
            .users()
            .get_by_id(user_id)
            .await
            .map_err(|_| AuthRejection::AccountUnavailable)?
            .ok_or(AuthRejection::AccountUnavailable)?;

        if !user.is_active {
            return Err(AuthRejection::AccountUnavailable);
        }

        Ok(Self {
            id: user.id,
            name: user.name,
            phone: user.phone,
            role: user.role,
        })
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AuthRejection::AdminOnly);
        }
        Ok(Self(user))
    }
}
