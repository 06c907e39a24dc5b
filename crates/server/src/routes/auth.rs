//! Authentication and account route handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zagros_core::{Phone, UserId, UserRole};

use crate::auth::CurrentUser;
use crate::error::{AppError, Result};
use crate::middleware::{login_rate_limiter, sms_rate_limiter};
use crate::models::User;
use crate::models::user::SavedAddress;
use crate::state::AppState;

/// Build the auth subrouter with its rate limits.
pub fn routes() -> Router<AppState> {
    // Everything that triggers an SMS send shares the strict budget.
    let sms_routes = Router::new()
        .route("/send-sms-code", post(send_sms_code))
        .route("/verify-sms-code", post(verify_sms_code))
        .route("/resend-sms-code", post(resend_sms_code))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset-code", post(verify_reset_code))
        .route("/reset-password", post(reset_password))
        .layer(sms_rate_limiter());

    let login_routes = Router::new()
        .route("/login", post(login))
        .layer(login_rate_limiter());

    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .merge(sms_routes)
        .merge(login_routes)
}

// =============================================================================
// Wire types
// =============================================================================

/// Public view of a user account.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub last_name: String,
    pub phone: Phone,
    pub phone_verified: bool,
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<SavedAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            last_name: user.last_name,
            phone: user.phone,
            phone_verified: user.phone_verified,
            role: user.role,
            is_active: user.is_active,
            address: user.address,
            postal_code: user.postal_code,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendSmsCodeRequest {
    name: String,
    last_name: String,
    password: String,
    phone: String,
}

#[derive(Debug, Deserialize)]
struct VerifySmsCodeRequest {
    phone: String,
    code: String,
}

#[derive(Debug, Deserialize)]
struct PhoneOnlyRequest {
    phone: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    phone: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    reset_token: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    name: Option<String>,
    last_name: Option<String>,
    address: Option<SavedAddress>,
    postal_code: Option<String>,
}

// =============================================================================
// Validation helpers
// =============================================================================

fn parse_phone(raw: &str) -> Result<Phone> {
    Phone::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn check_name(value: &str, field: &str) -> Result<()> {
    if value.trim().len() < 2 {
        return Err(AppError::BadRequest(format!(
            "{field} must be at least 2 characters"
        )));
    }
    Ok(())
}

fn check_code_shape(code: &str) -> Result<()> {
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::BadRequest(
            "verification code must be 6 digits".to_owned(),
        ));
    }
    Ok(())
}

fn check_postal_code(value: &str) -> Result<()> {
    if value.len() != 10 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::BadRequest(
            "postal code must be 10 digits".to_owned(),
        ));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/auth/send-sms-code` - stage a registration and text a code.
async fn send_sms_code(
    State(state): State<AppState>,
    Json(body): Json<SendSmsCodeRequest>,
) -> Result<impl IntoResponse> {
    check_name(&body.name, "name")?;
    check_name(&body.last_name, "last name")?;
    let phone = parse_phone(&body.phone)?;

    let issued = state
        .accounts()
        .start_registration(
            body.name.trim().to_owned(),
            body.last_name.trim().to_owned(),
            phone,
            &body.password,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Verification code sent to your phone",
        "expiresIn": issued.expires_in,
    })))
}

/// `POST /api/auth/verify-sms-code` - complete a registration.
async fn verify_sms_code(
    State(state): State<AppState>,
    Json(body): Json<VerifySmsCodeRequest>,
) -> Result<impl IntoResponse> {
    let phone = parse_phone(&body.phone)?;
    check_code_shape(&body.code)?;

    let tokens = state
        .accounts()
        .complete_registration(phone, &body.code)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Registration completed",
            "accessToken": tokens.access_token,
            "refreshToken": tokens.refresh_token,
            "user": UserView::from(tokens.user),
        })),
    ))
}

/// `POST /api/auth/resend-sms-code` - re-send a pending registration code.
async fn resend_sms_code(
    State(state): State<AppState>,
    Json(body): Json<PhoneOnlyRequest>,
) -> Result<impl IntoResponse> {
    let phone = parse_phone(&body.phone)?;
    let issued = state.accounts().resend_registration_code(&phone).await?;

    Ok(Json(serde_json::json!({
        "message": "Verification code re-sent to your phone",
        "expiresIn": issued.expires_in,
    })))
}

/// `POST /api/auth/login`
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let phone = parse_phone(&body.phone)?;
    let tokens = state.accounts().login(&phone, &body.password).await?;

    Ok(Json(serde_json::json!({
        "message": "Login successful",
        "accessToken": tokens.access_token,
        "refreshToken": tokens.refresh_token,
        "user": UserView::from(tokens.user),
    })))
}

/// `POST /api/auth/refresh` - exchange a refresh token for a new access token.
async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let (access_token, user) = state.accounts().refresh(&body.refresh_token).await?;

    Ok(Json(serde_json::json!({
        "accessToken": access_token,
        "user": UserView::from(user),
    })))
}

/// `POST /api/auth/logout` - revoke the presented refresh token.
async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<LogoutRequest>,
) -> Result<impl IntoResponse> {
    if let Some(token) = body.refresh_token {
        state.accounts().logout(user.id, &token).await?;
    }
    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}

/// `GET /api/auth/me`
async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse> {
    let account = state.accounts().me(user.id).await?;
    Ok(Json(serde_json::json!({ "user": UserView::from(account) })))
}

/// `PUT /api/auth/profile` - partial profile update; phone is immutable.
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse> {
    if let Some(name) = &body.name {
        check_name(name, "name")?;
    }
    if let Some(last_name) = &body.last_name {
        check_name(last_name, "last name")?;
    }
    if let Some(postal_code) = &body.postal_code
        && !postal_code.is_empty()
    {
        check_postal_code(postal_code)?;
    }

    let update = crate::models::ProfileUpdate {
        name: body.name.map(|n| n.trim().to_owned()),
        last_name: body.last_name.map(|n| n.trim().to_owned()),
        address: body.address,
        postal_code: body
            .postal_code
            .map(|p| if p.is_empty() { None } else { Some(p) }),
    };

    let updated = state.accounts().update_profile(user.id, update).await?;

    Ok(Json(serde_json::json!({
        "message": "Profile updated",
        "user": UserView::from(updated),
    })))
}

/// `POST /api/auth/forgot-password` - text a reset code.
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<PhoneOnlyRequest>,
) -> Result<impl IntoResponse> {
    let phone = parse_phone(&body.phone)?;
    let requested = state.accounts().forgot_password(&phone).await?;

    Ok(Json(serde_json::json!({
        "message": "Verification code sent to your phone",
        "phone": requested.phone,
        "expiresIn": requested.expires_in,
    })))
}

/// `POST /api/auth/verify-reset-code` - check the code, mint a reset token.
async fn verify_reset_code(
    State(state): State<AppState>,
    Json(body): Json<VerifySmsCodeRequest>,
) -> Result<impl IntoResponse> {
    let phone = parse_phone(&body.phone)?;
    check_code_shape(&body.code)?;

    let reset_token = state.accounts().verify_reset_code(&phone, &body.code).await?;

    Ok(Json(serde_json::json!({
        "message": "Code verified",
        "resetToken": reset_token,
    })))
}

/// `POST /api/auth/reset-password` - set a new password with a reset token.
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse> {
    state
        .accounts()
        .reset_password(&body.reset_token, &body.new_password)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Password changed" })))
}
