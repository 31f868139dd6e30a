use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::application::{Application, ApplicationId, ApplicationStatus};
use crate::models::job::{Job, JobCategory, JobId, JobStatus};
use crate::models::user::{User, UserId};
use crate::pagination::{Page, Paged};
use crate::store::{
    ApplicationScope, JobQuery, JobTotals, Store, StoreError, StoreResult, StudentQuery, UserEdit,
    DUPLICATE_APPLICATION, DUPLICATE_EMAIL, STALE_APPLICATION,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    jobs: HashMap<JobId, Job>,
    applications: HashMap<ApplicationId, Application>,
}

/// Process-local store. One lock over all tables, so each trait method is
/// atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paged<T: Clone>(items: Vec<T>, page: Page) -> Paged<T> {
    Paged {
        total: items.len() as u64,
        items: page.slice(&items),
    }
}

fn sort_newest_jobs(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

fn sort_featured_jobs(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| {
        b.is_featured
            .cmp(&a.is_featured)
            .then(b.created_at.cmp(&a.created_at))
            .then(a.id.cmp(&b.id))
    });
}

fn sort_recent_applications(applications: &mut [Application]) {
    applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn modify_user(&self, id: UserId, edit: UserEdit<'_>) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let mut user = tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))?;
        edit(&mut user);
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn all_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn search_students(&self, query: &StudentQuery, page: Page) -> StoreResult<Paged<User>> {
        let mut users: Vec<User> = {
            let tables = self.tables.read().await;
            tables
                .users
                .values()
                .filter(|u| query.matches(u))
                .cloned()
                .collect()
        };
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paged(users, page))
    }

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        self.tables.write().await.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn job_by_id(&self, id: JobId) -> StoreResult<Option<Job>> {
        Ok(self.tables.read().await.jobs.get(&id).cloned())
    }

    async fn jobs_by_ids(&self, ids: &[JobId]) -> StoreResult<Vec<Job>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.jobs.get(id).cloned()).collect())
    }

    async fn update_job(&self, job: &Job) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::NotFound(format!("Job {}", job.id)))?;
        *slot = Job {
            views: slot.views,
            applications_count: slot.applications_count,
            ..job.clone()
        };
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        if tables.jobs.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("Job {id}")));
        }
        let before = tables.applications.len();
        tables.applications.retain(|_, a| a.job != id);
        Ok((before - tables.applications.len()) as u64)
    }

    async fn record_job_view(&self, id: JobId) -> StoreResult<()> {
        if let Some(job) = self.tables.write().await.jobs.get_mut(&id) {
            job.views += 1;
        }
        Ok(())
    }

    async fn search_jobs(
        &self,
        query: &JobQuery,
        now: DateTime<Utc>,
        page: Page,
    ) -> StoreResult<Paged<Job>> {
        let mut jobs: Vec<Job> = {
            let tables = self.tables.read().await;
            tables
                .jobs
                .values()
                .filter(|j| query.matches(j, now))
                .cloned()
                .collect()
        };
        sort_featured_jobs(&mut jobs);
        Ok(paged(jobs, page))
    }

    async fn jobs_by_company(
        &self,
        company: UserId,
        status: Option<JobStatus>,
        page: Page,
    ) -> StoreResult<Paged<Job>> {
        let mut jobs: Vec<Job> = {
            let tables = self.tables.read().await;
            tables
                .jobs
                .values()
                .filter(|j| j.company == company && status.map_or(true, |s| j.status == s))
                .cloned()
                .collect()
        };
        sort_newest_jobs(&mut jobs);
        Ok(paged(jobs, page))
    }

    async fn all_jobs(&self) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.tables.read().await.jobs.values().cloned().collect();
        sort_newest_jobs(&mut jobs);
        Ok(jobs)
    }

    async fn category_counts(&self, now: DateTime<Utc>) -> StoreResult<Vec<(JobCategory, i64)>> {
        let mut counts: HashMap<JobCategory, i64> = HashMap::new();
        for job in self.tables.read().await.jobs.values() {
            if job.is_open(now) {
                *counts.entry(job.category).or_default() += 1;
            }
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));
        Ok(counts)
    }

    async fn company_job_totals(&self, company: UserId) -> StoreResult<JobTotals> {
        let tables = self.tables.read().await;
        let mut totals = JobTotals::default();
        for job in tables.jobs.values().filter(|j| j.company == company) {
            totals.total_jobs += 1;
            if job.status == JobStatus::Active {
                totals.active_jobs += 1;
            }
            totals.total_views += job.views;
        }
        Ok(totals)
    }

    async fn recommended_jobs(
        &self,
        tags: &[String],
        categories: &[JobCategory],
        now: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<Job>> {
        let mut jobs: Vec<Job> = {
            let tables = self.tables.read().await;
            tables
                .jobs
                .values()
                .filter(|j| j.is_open(now))
                .filter(|j| {
                    categories.contains(&j.category)
                        || j.tags
                            .iter()
                            .any(|t| tags.iter().any(|w| w.eq_ignore_ascii_case(t)))
                })
                .cloned()
                .collect()
        };
        sort_featured_jobs(&mut jobs);
        jobs.truncate(limit as usize);
        Ok(jobs)
    }

    async fn create_application(
        &self,
        application: &Application,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let job = tables
            .jobs
            .get_mut(&application.job)
            .ok_or_else(|| StoreError::NotFound(format!("Job {}", application.job)))?;
        if !job.is_accepting_applications(now) {
            return Err(StoreError::JobClosed);
        }
        let duplicate = tables
            .applications
            .values()
            .any(|a| a.job == application.job && a.applicant == application.applicant);
        if duplicate {
            return Err(StoreError::Conflict(DUPLICATE_APPLICATION.to_string()));
        }
        job.applications_count += 1;
        tables.applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn application_by_id(&self, id: ApplicationId) -> StoreResult<Option<Application>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn find_application(
        &self,
        job: JobId,
        applicant: UserId,
    ) -> StoreResult<Option<Application>> {
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .values()
            .find(|a| a.job == job && a.applicant == applicant)
            .cloned())
    }

    async fn has_applied_to_company(&self, company: UserId, applicant: UserId) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .values()
            .any(|a| a.company == company && a.applicant == applicant))
    }

    async fn update_application(
        &self,
        application: &Application,
        expected: ApplicationStatus,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .applications
            .get_mut(&application.id)
            .ok_or_else(|| StoreError::NotFound(format!("Application {}", application.id)))?;
        if slot.status != expected {
            return Err(StoreError::Conflict(STALE_APPLICATION.to_string()));
        }
        *slot = application.clone();
        Ok(())
    }

    async fn withdraw_application(&self, application: &Application) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let slot = tables
            .applications
            .get_mut(&application.id)
            .ok_or_else(|| StoreError::NotFound(format!("Application {}", application.id)))?;
        if slot.status != ApplicationStatus::Pending {
            return Err(StoreError::Conflict(STALE_APPLICATION.to_string()));
        }
        *slot = application.clone();
        if let Some(job) = tables.jobs.get_mut(&application.job) {
            job.applications_count = (job.applications_count - 1).max(0);
        }
        Ok(())
    }

    async fn list_applications(
        &self,
        scope: ApplicationScope,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> StoreResult<Paged<Application>> {
        let mut applications: Vec<Application> = {
            let tables = self.tables.read().await;
            tables
                .applications
                .values()
                .filter(|a| scope.includes(a) && status.map_or(true, |s| a.status == s))
                .cloned()
                .collect()
        };
        sort_recent_applications(&mut applications);
        Ok(paged(applications, page))
    }

    async fn all_applications(&self) -> StoreResult<Vec<Application>> {
        let mut applications: Vec<Application> = self
            .tables
            .read()
            .await
            .applications
            .values()
            .cloned()
            .collect();
        sort_recent_applications(&mut applications);
        Ok(applications)
    }

    async fn application_status_counts(
        &self,
        scope: ApplicationScope,
    ) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let mut counts: HashMap<ApplicationStatus, i64> = HashMap::new();
        for application in self.tables.read().await.applications.values() {
            if scope.includes(application) {
                *counts.entry(application.status).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }
}
