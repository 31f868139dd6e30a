use axum::{
    extract::{Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::applications::handlers::{compose, Include};
use crate::applications::stats::{ApplicationStats, JobStats};
use crate::auth::guard::AuthUser;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::jobs::handlers::listings;
use crate::models::user::{normalize_email, Role, User, UserId};
use crate::pagination::{Page, PaginationMeta};
use crate::state::AppState;
use crate::store::{ApplicationScope, StudentQuery, DUPLICATE_EMAIL};
use crate::users::cv_storage::CvStorage;
use crate::users::recommend::{categories_for_skills, skill_tags};
use crate::validation::{clean, is_valid_email, FieldErrors};

pub const DASHBOARD_LIMIT: u32 = 5;
const DEFAULT_PER_PAGE: u32 = 10;

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// POST /api/users/upload-cv
pub async fn upload_cv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Student {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    let mut upload: Option<(Option<String>, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("cv") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((content_type, bytes));
        break;
    }
    let (content_type, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("No file was provided".to_string()))?;

    let file_name = state
        .cvs
        .save(user.id, content_type.as_deref(), &bytes)
        .await?;

    let now = Utc::now();
    let mut previous = None;
    let mut set_cv = |fresh: &mut User| {
        previous = fresh.student_info.cv_path.replace(file_name.clone());
        fresh.updated_at = now;
    };
    if let Err(e) = state.store.modify_user(user.id, &mut set_cv).await {
        state.cvs.remove(&file_name).await.ok();
        return Err(e.into());
    }
    if let Some(old) = previous.filter(|old| *old != file_name) {
        if let Err(e) = state.cvs.remove(&old).await {
            warn!(user_id = %user.id, file = %old, "Could not remove previous CV: {e}");
        }
    }

    info!(user_id = %user.id, file = %file_name, size = bytes.len(), "CV uploaded");
    Ok(Json(json!({
        "message": "CV uploaded successfully",
        "cvPath": file_name,
        "filename": file_name,
    })))
}

/// GET /api/users/cv/:filename
pub async fn download_cv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(file_name): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    state.cvs.resolve(&file_name)?;
    let owner = CvStorage::owner_of(&file_name)
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let allowed = match user.role {
        Role::Student => {
            owner == user.id && user.student_info.cv_path.as_deref() == Some(file_name.as_str())
        }
        Role::Business => state.store.has_applied_to_company(user.id, owner).await?,
    };
    if !allowed {
        return Err(AppError::Forbidden(
            "You do not have permission to access this file".to_string(),
        ));
    }

    let bytes = state.cvs.read(&file_name).await?;
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}

/// DELETE /api/users/cv
pub async fn delete_cv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Student {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }
    if user.student_info.cv_path.is_none() {
        return Err(AppError::NotFound("No CV to delete".to_string()));
    }

    let now = Utc::now();
    let mut removed = None;
    let mut clear_cv = |fresh: &mut User| {
        removed = fresh.student_info.cv_path.take();
        fresh.updated_at = now;
    };
    state.store.modify_user(user.id, &mut clear_cv).await?;
    let file_name = removed.ok_or_else(|| AppError::NotFound("No CV to delete".to_string()))?;
    state.cvs.remove(&file_name).await?;

    info!(user_id = %user.id, file = %file_name, "CV deleted");
    Ok(Json(json!({ "message": "CV deleted successfully" })))
}

/// GET /api/users/profile/:id
pub async fn public_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<Value>, AppError> {
    let user = state
        .store
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(json!({ "user": user.public_profile() })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsRequest {
    pub email: Option<String>,
    pub notifications: Option<bool>,
    pub is_active: Option<bool>,
}

/// PUT /api/users/settings
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<SettingsRequest>,
) -> Result<Json<Value>, AppError> {
    let email = clean(req.email);
    if let Some(email) = &email {
        let mut errors = FieldErrors::new();
        errors.check(is_valid_email(email), "email", "Must be a valid email");
        errors.into_result()?;
    }

    let email = email
        .map(|e| normalize_email(&e))
        .filter(|e| *e != user.email);
    if let Some(email) = &email {
        let taken = state
            .store
            .user_by_email(email)
            .await?
            .is_some_and(|other| other.id != user.id);
        if taken {
            return Err(AppError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
    }
    let is_active = req.is_active.filter(|_| user.role == Role::Business);

    let now = Utc::now();
    let mut apply = |fresh: &mut User| {
        if let Some(email) = &email {
            fresh.email = email.clone();
        }
        if let Some(notifications) = req.notifications {
            fresh.notifications = notifications;
        }
        if let Some(active) = is_active {
            fresh.is_active = active;
        }
        fresh.updated_at = now;
    };
    let user = state.store.modify_user(user.id, &mut apply).await?;

    info!(user_id = %user.id, "Account settings updated");
    Ok(Json(json!({
        "message": "Settings updated successfully",
        "user": {
            "id": user.id,
            "email": user.email,
            "role": user.role,
            "isActive": user.is_active,
            "notifications": user.notifications,
        },
    })))
}

/// POST /api/users/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let now = Utc::now();
    let mut deactivate = |fresh: &mut User| {
        fresh.is_active = false;
        fresh.updated_at = now;
    };
    state.store.modify_user(user.id, &mut deactivate).await?;

    info!(user_id = %user.id, "Account deactivated");
    Ok(Json(json!({ "message": "Account deactivated successfully" })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StudentSearchParams {
    pub q: Option<String>,
    pub career: Option<String>,
    pub skills: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl StudentSearchParams {
    fn parse(self) -> Result<(StudentQuery, Page), AppError> {
        let mut errors = FieldErrors::new();
        let page = Page::parse(
            self.page.as_deref(),
            self.limit.as_deref(),
            DEFAULT_PER_PAGE,
            &mut errors,
        );
        errors.into_result()?;

        let skills = self
            .skills
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let query = StudentQuery {
            text: clean(self.q),
            career: clean(self.career),
            skills,
        };
        Ok((query, page))
    }
}

/// GET /api/users/search
pub async fn search_students(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<StudentSearchParams>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;
    let (query, page) = params.parse()?;

    let found = state.store.search_students(&query, page).await?;
    let users: Vec<_> = found.items.iter().map(|u| u.public_profile()).collect();

    Ok(Json(json!({
        "users": users,
        "pagination": PaginationMeta::new(page, found.total, "totalUsers"),
    })))
}

/// GET /api/users/dashboard-stats
pub async fn dashboard_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let stats = match user.role {
        Role::Student => {
            let counts = state
                .store
                .application_status_counts(ApplicationScope::Applicant(user.id))
                .await?;

            let skills = &user.student_info.skills;
            let recommended = if skills.is_empty() {
                Vec::new()
            } else {
                let jobs = state
                    .store
                    .recommended_jobs(
                        &skill_tags(skills),
                        &categories_for_skills(skills),
                        Utc::now(),
                        DASHBOARD_LIMIT,
                    )
                    .await?;
                listings(state.store.as_ref(), &jobs).await?
            };

            json!({
                "applications": ApplicationStats::from_counts(&counts),
                "profileComplete": user.is_profile_complete(),
                "missingFields": user.missing_profile_fields(),
                "recommendedJobs": recommended,
            })
        }
        Role::Business => {
            let scope = ApplicationScope::Company(user.id);
            let totals = state.store.company_job_totals(user.id).await?;
            let counts = state.store.application_status_counts(scope).await?;
            let recent = state
                .store
                .list_applications(scope, None, Page::new(1, DASHBOARD_LIMIT))
                .await?;
            let include = Include {
                job: true,
                applicant: true,
                company: false,
            };
            let recent = compose(state.store.as_ref(), &recent.items, include).await?;

            json!({
                "jobs": JobStats::from(totals),
                "applications": ApplicationStats::from_counts(&counts),
                "profileComplete": user.is_profile_complete(),
                "missingFields": user.missing_profile_fields(),
                "recentApplications": recent,
            })
        }
    };

    Ok(Json(json!({ "stats": stats })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_split_skills() {
        let params = StudentSearchParams {
            q: Some("  ana ".into()),
            skills: Some("python, ,Sales".into()),
            ..StudentSearchParams::default()
        };
        let (query, page) = params.parse().unwrap();
        assert_eq!(query.text.as_deref(), Some("ana"));
        assert_eq!(query.skills, vec!["python".to_string(), "Sales".to_string()]);
        assert_eq!(query.career, None);
        assert_eq!(page, Page::new(1, DEFAULT_PER_PAGE));
    }

    #[test]
    fn test_search_params_reject_bad_limit() {
        let params = StudentSearchParams {
            limit: Some("500".into()),
            ..StudentSearchParams::default()
        };
        assert!(matches!(params.parse(), Err(AppError::Validation(_))));
    }
}
