use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::guard::AuthUser;
use crate::auth::password::MIN_PASSWORD_LENGTH;
use crate::auth::profile::{apply_profile_update, ProfileUpdate};
use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::models::user::{normalize_email, Role, User, UserId};
use crate::state::AppState;
use crate::store::DUPLICATE_EMAIL;
use crate::validation::{is_valid_email, FieldErrors};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<Role, AppError> {
        let mut errors = FieldErrors::new();
        errors.check(is_valid_email(&self.email), "email", "Must be a valid email");
        errors.check(
            self.password.chars().count() >= MIN_PASSWORD_LENGTH,
            "password",
            "Password must be at least 6 characters",
        );
        errors.check(
            self.confirm_password == self.password,
            "confirmPassword",
            "Passwords do not match",
        );
        let role = self.role.parse::<Role>().ok();
        errors.check(role.is_some(), "role", "Role must be student or business");
        errors.into_result()?;
        role.ok_or_else(|| AppError::BadRequest("Role must be student or business".to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// The caller's own account, as returned by the profile endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub notifications: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub profile_complete: bool,
    pub missing_fields: Vec<&'static str>,
    pub profile: Value,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        AccountView {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            is_active: user.is_active,
            email_verified: user.email_verified,
            notifications: user.notifications,
            last_login: user.last_login,
            profile_complete: user.is_profile_complete(),
            missing_fields: user.missing_profile_fields(),
            profile: user.profile_json(),
            created_at: user.created_at,
        }
    }
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let role = req.validate()?;
    let email = normalize_email(&req.email);

    if state.store.user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
    }

    let hash = state.passwords.hash(&req.password).await?;
    let user = User::new(&email, hash, role, Utc::now());
    state.store.insert_user(&user).await?;
    let token = state.tokens.issue(&user).map_err(anyhow::Error::from)?;

    info!(user_id = %user.id, role = %user.role, "Registered account");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "token": token,
            "user": {
                "id": user.id,
                "email": user.email,
                "role": user.role,
                "isActive": user.is_active,
                "profileComplete": user.is_profile_complete(),
            }
        })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let mut errors = FieldErrors::new();
    errors.check(is_valid_email(&req.email), "email", "Must be a valid email");
    errors.check(!req.password.is_empty(), "password", "Password is required");
    errors.into_result()?;

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let mut user = state
        .store
        .user_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;
    if !state.passwords.verify(&req.password, &user.password_hash).await? {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account deactivated".to_string()));
    }

    let now = Utc::now();
    state.store.touch_last_login(user.id, now).await?;
    user.last_login = Some(now);
    let token = state.tokens.issue(&user).map_err(anyhow::Error::from)?;

    info!(user_id = %user.id, "Login");

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": {
            "id": user.id,
            "email": user.email,
            "role": user.role,
            "isActive": user.is_active,
            "profileComplete": user.is_profile_complete(),
        }
    })))
}

/// GET /api/auth/profile
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let now = Utc::now();
    state.store.touch_last_login(user.id, now).await?;
    user.last_login = Some(now);
    Ok(Json(json!({ "user": AccountView::from(&user) })))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, AppError> {
    apply_profile_update(&mut user, update.clone()).into_result()?;

    let now = Utc::now();
    let mut merge = |fresh: &mut User| {
        apply_profile_update(fresh, update.clone());
        fresh.updated_at = now;
    };
    let user = state.store.modify_user(user.id, &mut merge).await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": AccountView::from(&user),
    })))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let mut errors = FieldErrors::new();
    errors.check(
        !req.current_password.is_empty(),
        "currentPassword",
        "Current password is required",
    );
    errors.check(
        req.new_password.chars().count() >= MIN_PASSWORD_LENGTH,
        "newPassword",
        "New password must be at least 6 characters",
    );
    errors.check(
        req.confirm_password == req.new_password,
        "confirmPassword",
        "Passwords do not match",
    );
    errors.into_result()?;

    if !state
        .passwords
        .verify(&req.current_password, &user.password_hash)
        .await?
    {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }

    let password_hash = state.passwords.hash(&req.new_password).await?;
    let now = Utc::now();
    let mut set_password = |fresh: &mut User| {
        fresh.password_hash = password_hash.clone();
        fresh.updated_at = now;
    };
    state.store.modify_user(user.id, &mut set_password).await?;

    info!(user_id = %user.id, "Password changed");
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// POST /api/auth/verify-token
pub async fn verify_token(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({
        "valid": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "role": user.role,
        }
    }))
}
