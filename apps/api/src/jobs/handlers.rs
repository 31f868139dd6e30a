use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::guard::{AuthUser, MaybeUser};
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::jobs::payload::JobPayload;
use crate::jobs::search::RawJobQuery;
use crate::models::job::{Job, JobCategory, JobId, JobStatus, PublicJob};
use crate::models::user::{CompanySummary, Role, User, UserId};
use crate::pagination::{Page, PaginationMeta};
use crate::state::AppState;
use crate::store::{JobQuery, Store};
use crate::validation::FieldErrors;

pub const FEATURED_LIMIT: u32 = 6;

/// A public posting with the name and verification badge of its company.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    #[serde(flatten)]
    pub job: PublicJob,
    pub company: Option<CompanyBadge>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyBadge {
    pub id: UserId,
    pub company_name: Option<String>,
    pub verified: bool,
}

impl From<&User> for CompanyBadge {
    fn from(user: &User) -> Self {
        CompanyBadge {
            id: user.id,
            company_name: user.business_info.company_name.clone(),
            verified: user.business_info.verified,
        }
    }
}

/// Attaches company badges with one batch lookup.
pub(crate) async fn listings(store: &dyn Store, jobs: &[Job]) -> Result<Vec<JobListing>, AppError> {
    let mut ids: Vec<UserId> = jobs.iter().map(|j| j.company).collect();
    ids.sort();
    ids.dedup();
    let companies: HashMap<UserId, CompanyBadge> = store
        .users_by_ids(&ids)
        .await?
        .iter()
        .map(|u| (u.id, CompanyBadge::from(u)))
        .collect();
    Ok(jobs
        .iter()
        .map(|job| JobListing {
            job: job.public_info(),
            company: companies.get(&job.company).cloned(),
        })
        .collect())
}

async fn owned_job(state: &AppState, user: &AuthUser, id: JobId, action: &str) -> Result<Job, AppError> {
    let job = state
        .store
        .job_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    user.require_owner(job.company, &format!("You do not have permission to {action} this job"))?;
    Ok(job)
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    ApiQuery(raw): ApiQuery<RawJobQuery>,
) -> Result<Json<Value>, AppError> {
    let (query, page) = raw.parse()?;
    let found = state.store.search_jobs(&query, Utc::now(), page).await?;
    let jobs = listings(state.store.as_ref(), &found.items).await?;

    Ok(Json(json!({
        "jobs": jobs,
        "pagination": PaginationMeta::new(page, found.total, "totalJobs"),
    })))
}

/// GET /api/jobs/featured
pub async fn featured_jobs(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let query = JobQuery {
        featured_only: true,
        ..JobQuery::default()
    };
    let found = state
        .store
        .search_jobs(&query, Utc::now(), Page::new(1, FEATURED_LIMIT))
        .await?;
    let jobs = listings(state.store.as_ref(), &found.items).await?;
    Ok(Json(json!({ "jobs": jobs })))
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub value: JobCategory,
    pub label: &'static str,
    pub count: i64,
}

/// GET /api/jobs/categories
pub async fn categories(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let categories: Vec<CategoryCount> = state
        .store
        .category_counts(Utc::now())
        .await?
        .into_iter()
        .map(|(category, count)| CategoryCount {
            value: category,
            label: category.label(),
            count,
        })
        .collect();
    Ok(Json(json!({ "categories": categories })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MyJobsQuery {
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/jobs/my-jobs
pub async fn my_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<MyJobsQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;

    let mut errors = FieldErrors::new();
    let status = crate::validation::clean(params.status).and_then(|raw| {
        let parsed = raw.parse::<JobStatus>().ok();
        errors.check(parsed.is_some(), "status", "Invalid job status");
        parsed
    });
    let page = Page::parse(params.page.as_deref(), params.limit.as_deref(), 10, &mut errors);
    errors.into_result()?;

    let found = state.store.jobs_by_company(user.id(), status, page).await?;
    let jobs: Vec<_> = found.items.iter().map(Job::owner_view).collect();

    Ok(Json(json!({
        "jobs": jobs,
        "pagination": PaginationMeta::new(page, found.total, "totalJobs"),
    })))
}

/// GET /api/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    ApiPath(id): ApiPath<JobId>,
) -> Result<Json<Value>, AppError> {
    let mut job = state
        .store
        .job_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    state.store.record_job_view(id).await?;
    job.views += 1;

    let company: Option<CompanySummary> = state
        .store
        .user_by_id(job.company)
        .await?
        .map(|u| u.company_summary());

    let has_applied = match &viewer {
        Some(viewer) => state.store.find_application(id, viewer.id).await?.is_some(),
        None => false,
    };

    let body = match viewer {
        Some(viewer) if job.is_owned_by(viewer.id) => json!(job.owner_view()),
        _ => json!(job.public_info()),
    };

    Ok(Json(json!({
        "job": body,
        "company": company,
        "hasApplied": has_applied,
    })))
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<JobPayload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_role(Role::Business)?;
    user.require_complete_profile()?;

    let job = payload
        .into_job(user.id(), Utc::now())
        .map_err(|errors| AppError::Validation(errors.into_vec()))?;
    state.store.insert_job(&job).await?;

    info!(job_id = %job.id, company = %job.company, "Job created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Job created successfully",
            "job": job.owner_view(),
        })),
    ))
}

/// PUT /api/jobs/:id
pub async fn update_job(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<JobId>,
    ApiJson(payload): ApiJson<JobPayload>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;
    let mut job = owned_job(&state, &user, id, "edit").await?;

    payload.apply_to(&mut job, Utc::now()).into_result()?;
    state.store.update_job(&job).await?;

    // Counters may have moved since the read.
    let job = state.store.job_by_id(id).await?.unwrap_or(job);

    info!(job_id = %id, "Job updated");
    Ok(Json(json!({
        "message": "Job updated successfully",
        "job": job.owner_view(),
    })))
}

/// DELETE /api/jobs/:id
pub async fn delete_job(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<JobId>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;
    owned_job(&state, &user, id, "delete").await?;

    let removed = state.store.delete_job(id).await?;

    info!(job_id = %id, applications_removed = removed, "Job deleted");
    Ok(Json(json!({ "message": "Job deleted successfully" })))
}
