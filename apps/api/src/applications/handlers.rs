use std::collections::HashMap;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::applications::stats::{ApplicationStats, JobStats};
use crate::applications::workflow::{apply_employer_transition, apply_withdrawal};
use crate::auth::guard::AuthUser;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::application::{Application, ApplicationId, ApplicationStatus};
use crate::models::job::{JobId, JobSummary};
use crate::models::user::{ApplicantSummary, CompanySummary, Role, UserId};
use crate::pagination::{Page, PaginationMeta};
use crate::state::AppState;
use crate::store::{ApplicationScope, Store};
use crate::validation::{clean, FieldError, FieldErrors};

pub const MAX_COVER_LETTER: usize = 1000;
pub const MAX_EMPLOYER_NOTES: usize = 500;
const DEFAULT_PER_PAGE: u32 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateApplicationRequest {
    pub job_id: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationListQuery {
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ApplicationListQuery {
    fn parse(self) -> Result<(Option<ApplicationStatus>, Page), AppError> {
        let mut errors = FieldErrors::new();
        let status = clean(self.status).and_then(|raw| {
            let parsed = raw.parse::<ApplicationStatus>().ok();
            errors.check(parsed.is_some(), "status", "Invalid application status");
            parsed
        });
        let page = Page::parse(
            self.page.as_deref(),
            self.limit.as_deref(),
            DEFAULT_PER_PAGE,
            &mut errors,
        );
        errors.into_result()?;
        Ok((status, page))
    }
}

/// An application with whichever related records the caller may see.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub employer_notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub interview_scheduled_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant: Option<ApplicantSummary>,
}

impl ApplicationView {
    fn bare(application: &Application) -> Self {
        ApplicationView {
            id: application.id,
            status: application.status,
            cover_letter: application.cover_letter.clone(),
            employer_notes: application.employer_notes.clone(),
            applied_at: application.applied_at,
            reviewed_at: application.reviewed_at,
            interview_scheduled_at: application.interview_scheduled_at,
            responded_at: application.responded_at,
            withdrawn_at: application.withdrawn_at,
            job: None,
            company: None,
            applicant: None,
        }
    }
}

/// Which related records to attach to each view.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Include {
    pub job: bool,
    pub company: bool,
    pub applicant: bool,
}

fn distinct<T: Ord + Copy>(ids: impl Iterator<Item = T>) -> Vec<T> {
    let mut ids: Vec<T> = ids.collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Builds views with one batch lookup per related table.
pub(crate) async fn compose(
    store: &dyn Store,
    applications: &[Application],
    include: Include,
) -> Result<Vec<ApplicationView>, AppError> {
    let jobs: HashMap<JobId, JobSummary> = if include.job {
        let ids = distinct(applications.iter().map(|a| a.job));
        store
            .jobs_by_ids(&ids)
            .await?
            .iter()
            .map(|job| (job.id, job.summary()))
            .collect()
    } else {
        HashMap::new()
    };

    let mut user_ids = Vec::new();
    if include.company {
        user_ids.extend(applications.iter().map(|a| a.company));
    }
    if include.applicant {
        user_ids.extend(applications.iter().map(|a| a.applicant));
    }
    let users: HashMap<UserId, _> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .users_by_ids(&distinct(user_ids.into_iter()))
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect()
    };

    Ok(applications
        .iter()
        .map(|application| {
            let mut view = ApplicationView::bare(application);
            if include.job {
                view.job = jobs.get(&application.job).cloned();
            }
            if include.company {
                view.company = users.get(&application.company).map(|u| u.company_summary());
            }
            if include.applicant {
                view.applicant = users
                    .get(&application.applicant)
                    .map(|u| u.applicant_summary());
            }
            view
        })
        .collect())
}

/// Client address as reported by the reverse proxy, if any.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real = headers.get("x-real-ip").and_then(|v| v.to_str().ok());
    forwarded
        .or(real)
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

async fn load_application(state: &AppState, id: ApplicationId) -> Result<Application, AppError> {
    state
        .store
        .application_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
}

/// POST /api/applications
pub async fn create_application(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    user.require_role(Role::Student)?;
    user.require_complete_profile()?;

    let mut errors = FieldErrors::new();
    let job_id = match clean(req.job_id) {
        Some(raw) => {
            let parsed = raw.parse::<Uuid>().ok();
            errors.check(parsed.is_some(), "jobId", "Valid job ID is required");
            parsed
        }
        None => {
            errors.push("jobId", "Valid job ID is required");
            None
        }
    };
    let cover_letter = clean(req.cover_letter);
    if let Some(letter) = &cover_letter {
        errors.check(
            letter.chars().count() <= MAX_COVER_LETTER,
            "coverLetter",
            "Cover letter cannot exceed 1000 characters",
        );
    }
    errors.into_result()?;
    let job_id = job_id.ok_or_else(|| AppError::BadRequest("Valid job ID is required".to_string()))?;

    let job = state
        .store
        .job_by_id(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    if job.is_owned_by(user.id()) {
        return Err(AppError::BadRequest("You cannot apply to your own job".to_string()));
    }
    if job.requires_cover_letter && cover_letter.is_none() {
        return Err(AppError::Validation(vec![FieldError::new(
            "coverLetter",
            "This job requires a cover letter",
        )]));
    }

    let now = Utc::now();
    let application = Application::new(&job, user.id(), cover_letter, client_ip(&headers), now);
    state.store.create_application(&application, now).await?;

    info!(
        application_id = %application.id,
        job_id = %job.id,
        applicant = %application.applicant,
        "Application submitted"
    );

    let company = state.store.user_by_id(job.company).await?.map(|c| c.company_summary());
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Application submitted successfully",
            "application": {
                "id": application.id,
                "status": application.status,
                "appliedAt": application.applied_at,
                "job": job.summary(),
                "company": company,
            },
        })),
    ))
}

/// GET /api/applications/my-applications
pub async fn my_applications(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ApplicationListQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Student)?;
    let (status, page) = params.parse()?;

    let found = state
        .store
        .list_applications(ApplicationScope::Applicant(user.id()), status, page)
        .await?;
    let include = Include {
        job: true,
        company: true,
        applicant: false,
    };
    let applications = compose(state.store.as_ref(), &found.items, include).await?;

    Ok(Json(json!({
        "applications": applications,
        "pagination": PaginationMeta::new(page, found.total, "totalApplications"),
    })))
}

/// GET /api/applications/job/:job_id
pub async fn job_applications(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(job_id): ApiPath<JobId>,
    ApiQuery(params): ApiQuery<ApplicationListQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;
    let job = state
        .store
        .job_by_id(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    user.require_owner(
        job.company,
        "You do not have permission to view applications for this job",
    )?;
    let (status, page) = params.parse()?;

    let found = state
        .store
        .list_applications(ApplicationScope::Job(job_id), status, page)
        .await?;
    let include = Include {
        applicant: true,
        ..Include::default()
    };
    let applications = compose(state.store.as_ref(), &found.items, include).await?;

    Ok(Json(json!({
        "job": {
            "id": job.id,
            "title": job.title,
            "location": job.location,
            "employmentType": job.employment_type,
        },
        "applications": applications,
        "pagination": PaginationMeta::new(page, found.total, "totalApplications"),
    })))
}

/// GET /api/applications/all
pub async fn company_applications(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ApplicationListQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;
    let (status, page) = params.parse()?;

    let found = state
        .store
        .list_applications(ApplicationScope::Company(user.id()), status, page)
        .await?;
    let include = Include {
        job: true,
        applicant: true,
        company: false,
    };
    let applications = compose(state.store.as_ref(), &found.items, include).await?;

    Ok(Json(json!({
        "applications": applications,
        "pagination": PaginationMeta::new(page, found.total, "totalApplications"),
    })))
}

/// GET /api/applications/stats
pub async fn stats(State(state): State<AppState>, user: AuthUser) -> Result<Json<Value>, AppError> {
    let scope = match user.0.role {
        Role::Student => ApplicationScope::Applicant(user.id()),
        Role::Business => ApplicationScope::Company(user.id()),
    };
    let counts = state.store.application_status_counts(scope).await?;
    let mut body = json!(ApplicationStats::from_counts(&counts));

    if user.0.role == Role::Business {
        let totals = state.store.company_job_totals(user.id()).await?;
        body["jobs"] = json!(JobStats::from(totals));
    }

    Ok(Json(json!({ "stats": body })))
}

/// PUT /api/applications/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<ApplicationId>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Business)?;

    let mut errors = FieldErrors::new();
    let status = clean(req.status).and_then(|raw| raw.parse::<ApplicationStatus>().ok());
    errors.check(status.is_some(), "status", "Invalid status");
    if let Some(notes) = &req.notes {
        errors.check(
            notes.chars().count() <= MAX_EMPLOYER_NOTES,
            "notes",
            "Notes cannot exceed 500 characters",
        );
    }
    errors.into_result()?;
    let status = status.ok_or_else(|| AppError::BadRequest("Invalid status".to_string()))?;

    let mut application = load_application(&state, id).await?;
    user.require_owner(
        application.company,
        "You do not have permission to update this application",
    )?;

    let previous = application.status;
    apply_employer_transition(&mut application, status, req.notes, Utc::now())?;
    state
        .store
        .update_application(&application, previous)
        .await?;

    info!(application_id = %id, from = %previous, to = %status, "Application status updated");

    Ok(Json(json!({
        "message": "Application status updated successfully",
        "application": {
            "id": application.id,
            "status": application.status,
            "employerNotes": application.employer_notes,
            "reviewedAt": application.reviewed_at,
            "interviewScheduledAt": application.interview_scheduled_at,
            "respondedAt": application.responded_at,
        },
    })))
}

/// DELETE /api/applications/:id
pub async fn withdraw_application(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<ApplicationId>,
) -> Result<Json<Value>, AppError> {
    user.require_role(Role::Student)?;

    let mut application = load_application(&state, id).await?;
    user.require_owner(
        application.applicant,
        "You do not have permission to withdraw this application",
    )?;

    apply_withdrawal(&mut application, Utc::now())?;
    state.store.withdraw_application(&application).await?;

    info!(application_id = %id, job_id = %application.job, "Application withdrawn");
    Ok(Json(json!({ "message": "Application withdrawn successfully" })))
}
