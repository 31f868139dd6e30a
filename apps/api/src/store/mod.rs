//! Persistence seam. Handlers only see `dyn Store`; `PgStore` backs production
//! and `MemoryStore` backs local demos and the test suite.
//!
//! Every method is a single atomic operation from the caller's point of view.
//! In particular `create_application` performs the duplicate check, the
//! capacity check and the counter increment as one unit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::application::{Application, ApplicationId, ApplicationStatus};
use crate::models::job::{EmploymentType, Job, JobCategory, JobId, JobStatus};
use crate::models::user::{User, UserId};
use crate::pagination::{Page, Paged};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("job is not accepting applications")]
    JobClosed,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub const DUPLICATE_EMAIL: &str = "An account with this email already exists";
pub const DUPLICATE_APPLICATION: &str = "You have already applied to this job";
pub const STALE_APPLICATION: &str =
    "Application status changed in the meantime, reload it and try again";

/// In-place edit applied by `Store::modify_user` to the freshly read record.
pub type UserEdit<'a> = &'a mut (dyn FnMut(&mut User) + Send);

/// Public board filters. Every job returned is also open (see `Job::is_open`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    pub search: Option<String>,
    pub category: Option<JobCategory>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
    pub min_salary: Option<f64>,
    pub featured_only: bool,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl JobQuery {
    pub fn matches(&self, job: &Job, now: DateTime<Utc>) -> bool {
        if !job.is_open(now) {
            return false;
        }
        if self.featured_only && !job.is_featured {
            return false;
        }
        if let Some(text) = &self.search {
            let hit = contains_ci(&job.title, text)
                || contains_ci(&job.description, text)
                || contains_ci(&job.location.city, text);
            if !hit {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if !contains_ci(&job.location.city, city) {
                return false;
            }
        }
        if let Some(state) = &self.state {
            if !contains_ci(&job.location.state, state) {
                return false;
            }
        }
        if self.category.is_some_and(|c| c != job.category) {
            return false;
        }
        if self.employment_type.is_some_and(|t| t != job.employment_type) {
            return false;
        }
        if self.remote.is_some_and(|r| r != job.location.is_remote) {
            return false;
        }
        if let Some(min) = self.min_salary {
            if !job.salary.min.is_some_and(|s| s >= min) {
                return false;
            }
        }
        true
    }
}

/// Business-side search over active student accounts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentQuery {
    /// Matches first name, last name, career or university.
    pub text: Option<String>,
    pub career: Option<String>,
    /// Any-of match against the student's skills (case-insensitive).
    pub skills: Vec<String>,
}

impl StudentQuery {
    pub fn matches(&self, user: &User) -> bool {
        if user.role != crate::models::user::Role::Student || !user.is_active {
            return false;
        }
        let info = &user.student_info;
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        if let Some(text) = &self.text {
            let hit = [&info.first_name, &info.last_name, &info.career, &info.university]
                .into_iter()
                .any(|v| contains_ci(&field(v), text));
            if !hit {
                return false;
            }
        }
        if let Some(career) = &self.career {
            if !contains_ci(&field(&info.career), career) {
                return false;
            }
        }
        if !self.skills.is_empty() {
            let hit = info
                .skills
                .iter()
                .any(|s| self.skills.iter().any(|w| w.eq_ignore_ascii_case(s)));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Whose applications to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    Applicant(UserId),
    Company(UserId),
    Job(JobId),
}

impl ApplicationScope {
    pub fn includes(&self, application: &Application) -> bool {
        match *self {
            ApplicationScope::Applicant(id) => application.applicant == id,
            ApplicationScope::Company(id) => application.company == id,
            ApplicationScope::Job(id) => application.job == id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JobTotals {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub total_views: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ── users ────────────────────────────────────────────────────────────────
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>>;
    /// Re-reads the user under a lock, applies `edit` and writes the result
    /// back, so concurrent edits of different fields do not clobber each
    /// other. Fails with `Conflict` when the edited email is taken.
    async fn modify_user(&self, id: UserId, edit: UserEdit<'_>) -> StoreResult<User>;
    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()>;
    /// Newest first.
    async fn all_users(&self) -> StoreResult<Vec<User>>;
    /// Newest first.
    async fn search_students(&self, query: &StudentQuery, page: Page) -> StoreResult<Paged<User>>;

    // ── jobs ─────────────────────────────────────────────────────────────────
    async fn insert_job(&self, job: &Job) -> StoreResult<()>;
    async fn job_by_id(&self, id: JobId) -> StoreResult<Option<Job>>;
    async fn jobs_by_ids(&self, ids: &[JobId]) -> StoreResult<Vec<Job>>;
    /// Writes the owner-editable fields. `views` and `applications_count`
    /// are left untouched so concurrent counter updates are never lost.
    async fn update_job(&self, job: &Job) -> StoreResult<()>;
    /// Removes the job and every application to it. Returns the number of
    /// applications removed.
    async fn delete_job(&self, id: JobId) -> StoreResult<u64>;
    async fn record_job_view(&self, id: JobId) -> StoreResult<()>;
    /// Featured first, then newest.
    async fn search_jobs(
        &self,
        query: &JobQuery,
        now: DateTime<Utc>,
        page: Page,
    ) -> StoreResult<Paged<Job>>;
    /// Newest first.
    async fn jobs_by_company(
        &self,
        company: UserId,
        status: Option<JobStatus>,
        page: Page,
    ) -> StoreResult<Paged<Job>>;
    /// Newest first.
    async fn all_jobs(&self) -> StoreResult<Vec<Job>>;
    /// Open-job counts per category, largest first.
    async fn category_counts(&self, now: DateTime<Utc>) -> StoreResult<Vec<(JobCategory, i64)>>;
    async fn company_job_totals(&self, company: UserId) -> StoreResult<JobTotals>;
    /// Open jobs whose tags intersect `tags` or whose category is in
    /// `categories`. Featured first, then newest.
    async fn recommended_jobs(
        &self,
        tags: &[String],
        categories: &[JobCategory],
        now: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<Job>>;

    // ── applications ─────────────────────────────────────────────────────────
    /// Atomically: job must exist (`NotFound`) and accept applications
    /// (`JobClosed`), the (job, applicant) pair must be new (`Conflict`),
    /// and the job's `applications_count` is incremented.
    async fn create_application(
        &self,
        application: &Application,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn application_by_id(&self, id: ApplicationId) -> StoreResult<Option<Application>>;
    async fn find_application(
        &self,
        job: JobId,
        applicant: UserId,
    ) -> StoreResult<Option<Application>>;
    /// Whether `applicant` has ever applied to any job of `company`.
    async fn has_applied_to_company(&self, company: UserId, applicant: UserId) -> StoreResult<bool>;
    /// Persists status, timestamps and employer notes if the stored status is
    /// still `expected`; fails with `Conflict` otherwise.
    async fn update_application(
        &self,
        application: &Application,
        expected: ApplicationStatus,
    ) -> StoreResult<()>;
    /// Persists the withdrawal of a still-pending application and releases
    /// its slot on the job counter. Fails with `Conflict` when the stored
    /// application is no longer pending.
    async fn withdraw_application(&self, application: &Application) -> StoreResult<()>;
    /// Most recently applied first.
    async fn list_applications(
        &self,
        scope: ApplicationScope,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> StoreResult<Paged<Application>>;
    /// Most recently applied first.
    async fn all_applications(&self) -> StoreResult<Vec<Application>>;
    async fn application_status_counts(
        &self,
        scope: ApplicationScope,
    ) -> StoreResult<Vec<(ApplicationStatus, i64)>>;
}
