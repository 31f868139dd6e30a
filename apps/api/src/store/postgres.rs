use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::application::{Application, ApplicationId, ApplicationStatus};
use crate::models::job::{Job, JobCategory, JobId, JobStatus, Location, Salary, Schedule};
use crate::models::user::{BusinessInfo, StudentInfo, User, UserId};
use crate::models::UnknownVariant;
use crate::pagination::{Page, Paged};
use crate::store::{
    ApplicationScope, JobQuery, JobTotals, Store, StoreError, StoreResult, StudentQuery, UserEdit,
    DUPLICATE_APPLICATION, DUPLICATE_EMAIL, STALE_APPLICATION,
};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    student_info: Json<StudentInfo>,
    business_info: Json<BusinessInfo>,
    is_active: bool,
    email_verified: bool,
    notifications: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    company_id: Uuid,
    title: String,
    description: String,
    requirements: Vec<String>,
    responsibilities: Vec<String>,
    benefits: Vec<String>,
    address: String,
    city: String,
    state: String,
    zip_code: Option<String>,
    is_remote: bool,
    is_hybrid: bool,
    employment_type: String,
    schedule: Json<Schedule>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    salary_currency: String,
    salary_period: String,
    salary_negotiable: bool,
    category: String,
    tags: Vec<String>,
    status: String,
    application_deadline: Option<DateTime<Utc>>,
    start_date: Option<DateTime<Utc>>,
    views: i64,
    applications_count: i64,
    is_featured: bool,
    allow_applications: bool,
    max_applications: i64,
    requires_cover_letter: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ApplicationRow {
    id: Uuid,
    job_id: Uuid,
    applicant_id: Uuid,
    company_id: Uuid,
    status: String,
    cover_letter: Option<String>,
    employer_notes: Option<String>,
    applied_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    interview_scheduled_at: Option<DateTime<Utc>>,
    responded_at: Option<DateTime<Utc>>,
    withdrawn_at: Option<DateTime<Utc>>,
    source: String,
    ip_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse<T: FromStr<Err = UnknownVariant>>(raw: &str) -> StoreResult<T> {
    raw.parse()
        .map_err(|e: UnknownVariant| StoreError::Corrupt(e.to_string()))
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role: parse(&row.role)?,
            student_info: row.student_info.0,
            business_info: row.business_info.0,
            is_active: row.is_active,
            email_verified: row.email_verified,
            notifications: row.notifications,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        Ok(Job {
            id: row.id,
            company: row.company_id,
            title: row.title,
            description: row.description,
            requirements: row.requirements,
            responsibilities: row.responsibilities,
            benefits: row.benefits,
            location: Location {
                address: row.address,
                city: row.city,
                state: row.state,
                zip_code: row.zip_code,
                is_remote: row.is_remote,
                is_hybrid: row.is_hybrid,
            },
            employment_type: parse(&row.employment_type)?,
            schedule: row.schedule.0,
            salary: Salary {
                min: row.salary_min,
                max: row.salary_max,
                currency: parse(&row.salary_currency)?,
                period: parse(&row.salary_period)?,
                is_negotiable: row.salary_negotiable,
            },
            category: parse(&row.category)?,
            tags: row.tags,
            status: parse(&row.status)?,
            application_deadline: row.application_deadline,
            start_date: row.start_date,
            views: row.views,
            applications_count: row.applications_count,
            is_featured: row.is_featured,
            allow_applications: row.allow_applications,
            max_applications: row.max_applications,
            requires_cover_letter: row.requires_cover_letter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StoreError;

    fn try_from(row: ApplicationRow) -> StoreResult<Self> {
        Ok(Application {
            id: row.id,
            job: row.job_id,
            applicant: row.applicant_id,
            company: row.company_id,
            status: parse(&row.status)?,
            cover_letter: row.cover_letter,
            employer_notes: row.employer_notes,
            applied_at: row.applied_at,
            reviewed_at: row.reviewed_at,
            interview_scheduled_at: row.interview_scheduled_at,
            responded_at: row.responded_at,
            withdrawn_at: row.withdrawn_at,
            source: parse(&row.source)?,
            ip_address: row.ip_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Maps a unique-constraint violation to `Conflict(message)`.
fn unique_violation(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(message.to_string())
        }
        _ => StoreError::Database(err),
    }
}

/// `%needle%` with LIKE metacharacters escaped (backslash is the default escape).
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_open_job(qb: &mut QueryBuilder<'_, Postgres>, now: DateTime<Utc>) {
    qb.push("status = 'active' AND allow_applications AND (application_deadline IS NULL OR application_deadline > ")
        .push_bind(now)
        .push(")");
}

fn push_job_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &JobQuery, now: DateTime<Utc>) {
    push_open_job(qb, now);
    if query.featured_only {
        qb.push(" AND is_featured");
    }
    if let Some(text) = &query.search {
        let pattern = like_pattern(text);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR city ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(city) = &query.city {
        qb.push(" AND city ILIKE ").push_bind(like_pattern(city));
    }
    if let Some(state) = &query.state {
        qb.push(" AND state ILIKE ").push_bind(like_pattern(state));
    }
    if let Some(category) = query.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(kind) = query.employment_type {
        qb.push(" AND employment_type = ").push_bind(kind.as_str());
    }
    if let Some(remote) = query.remote {
        qb.push(" AND is_remote = ").push_bind(remote);
    }
    if let Some(min) = query.min_salary {
        qb.push(" AND salary_min >= ").push_bind(min);
    }
}

fn push_student_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &StudentQuery) {
    qb.push("role = 'student' AND is_active");
    if let Some(text) = &query.text {
        let pattern = like_pattern(text);
        qb.push(" AND (");
        for (i, key) in ["firstName", "lastName", "career", "university"].iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(format!("student_info->>'{key}' ILIKE "))
                .push_bind(pattern.clone());
        }
        qb.push(")");
    }
    if let Some(career) = &query.career {
        qb.push(" AND student_info->>'career' ILIKE ")
            .push_bind(like_pattern(career));
    }
    if !query.skills.is_empty() {
        let skills: Vec<String> = query.skills.iter().map(|s| s.to_lowercase()).collect();
        qb.push(" AND EXISTS (SELECT 1 FROM jsonb_array_elements_text(student_info->'skills') s WHERE lower(s) = ANY(")
            .push_bind(skills)
            .push("))");
    }
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: ApplicationScope) {
    let (column, id) = match scope {
        ApplicationScope::Applicant(id) => ("applicant_id", id),
        ApplicationScope::Company(id) => ("company_id", id),
        ApplicationScope::Job(id) => ("job_id", id),
    };
    qb.push(column).push(" = ").push_bind(id);
}

fn push_scoped_applications(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: ApplicationScope,
    status: Option<ApplicationStatus>,
) {
    push_scope(qb, scope);
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_company_jobs(qb: &mut QueryBuilder<'_, Postgres>, company: UserId, status: Option<JobStatus>) {
    qb.push("company_id = ").push_bind(company);
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, page: Page) {
    qb.push(" LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(page.offset() as i64);
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, password_hash, role, student_info, business_info,
                 is_active, email_verified, notifications, last_login, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(Json(&user.student_info))
        .bind(Json(&user.business_info))
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.notifications)
        .bind(user.last_login)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, DUPLICATE_EMAIL))?;
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn modify_user(&self, id: UserId, edit: UserEdit<'_>) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut user = row
            .map(User::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))?;
        edit(&mut user);

        sqlx::query(
            r#"
            UPDATE users SET
                email = $2, password_hash = $3, student_info = $4, business_info = $5,
                is_active = $6, email_verified = $7, notifications = $8,
                last_login = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Json(&user.student_info))
        .bind(Json(&user.business_info))
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.notifications)
        .bind(user.last_login)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, DUPLICATE_EMAIL))?;
        tx.commit().await?;
        Ok(user)
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn all_users(&self) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC, id")
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn search_students(&self, query: &StudentQuery, page: Page) -> StoreResult<Paged<User>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE ");
        push_student_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM users WHERE ");
        push_student_filters(&mut select, query);
        select.push(" ORDER BY created_at DESC, id");
        push_window(&mut select, page);
        let rows: Vec<UserRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Paged {
            items: convert(rows)?,
            total: total as u64,
        })
    }

    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, company_id, title, description, requirements, responsibilities, benefits,
                 address, city, state, zip_code, is_remote, is_hybrid, employment_type, schedule,
                 salary_min, salary_max, salary_currency, salary_period, salary_negotiable,
                 category, tags, status, application_deadline, start_date, views,
                 applications_count, is_featured, allow_applications, max_applications,
                 requires_cover_letter, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33)
            "#,
        )
        .bind(job.id)
        .bind(job.company)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(&job.responsibilities)
        .bind(&job.benefits)
        .bind(&job.location.address)
        .bind(&job.location.city)
        .bind(&job.location.state)
        .bind(&job.location.zip_code)
        .bind(job.location.is_remote)
        .bind(job.location.is_hybrid)
        .bind(job.employment_type.as_str())
        .bind(Json(&job.schedule))
        .bind(job.salary.min)
        .bind(job.salary.max)
        .bind(job.salary.currency.as_str())
        .bind(job.salary.period.as_str())
        .bind(job.salary.is_negotiable)
        .bind(job.category.as_str())
        .bind(&job.tags)
        .bind(job.status.as_str())
        .bind(job.application_deadline)
        .bind(job.start_date)
        .bind(job.views)
        .bind(job.applications_count)
        .bind(job.is_featured)
        .bind(job.allow_applications)
        .bind(job.max_applications)
        .bind(job.requires_cover_letter)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn job_by_id(&self, id: JobId) -> StoreResult<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn jobs_by_ids(&self, ids: &[JobId]) -> StoreResult<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn update_job(&self, job: &Job) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                title = $2, description = $3, requirements = $4, responsibilities = $5,
                benefits = $6, address = $7, city = $8, state = $9, zip_code = $10,
                is_remote = $11, is_hybrid = $12, employment_type = $13, schedule = $14,
                salary_min = $15, salary_max = $16, salary_currency = $17, salary_period = $18,
                salary_negotiable = $19, category = $20, tags = $21, status = $22,
                application_deadline = $23, start_date = $24, is_featured = $25,
                allow_applications = $26, max_applications = $27, requires_cover_letter = $28,
                updated_at = $29
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(&job.responsibilities)
        .bind(&job.benefits)
        .bind(&job.location.address)
        .bind(&job.location.city)
        .bind(&job.location.state)
        .bind(&job.location.zip_code)
        .bind(job.location.is_remote)
        .bind(job.location.is_hybrid)
        .bind(job.employment_type.as_str())
        .bind(Json(&job.schedule))
        .bind(job.salary.min)
        .bind(job.salary.max)
        .bind(job.salary.currency.as_str())
        .bind(job.salary.period.as_str())
        .bind(job.salary.is_negotiable)
        .bind(job.category.as_str())
        .bind(&job.tags)
        .bind(job.status.as_str())
        .bind(job.application_deadline)
        .bind(job.start_date)
        .bind(job.is_featured)
        .bind(job.allow_applications)
        .bind(job.max_applications)
        .bind(job.requires_cover_letter)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Job {}", job.id)));
        }
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM applications WHERE job_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("Job {id}")));
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn record_job_view(&self, id: JobId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_jobs(
        &self,
        query: &JobQuery,
        now: DateTime<Utc>,
        page: Page,
    ) -> StoreResult<Paged<Job>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE ");
        push_job_filters(&mut count, query, now);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM jobs WHERE ");
        push_job_filters(&mut select, query, now);
        select.push(" ORDER BY is_featured DESC, created_at DESC, id");
        push_window(&mut select, page);
        let rows: Vec<JobRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Paged {
            items: convert(rows)?,
            total: total as u64,
        })
    }

    async fn jobs_by_company(
        &self,
        company: UserId,
        status: Option<JobStatus>,
        page: Page,
    ) -> StoreResult<Paged<Job>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE ");
        push_company_jobs(&mut count, company, status);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM jobs WHERE ");
        push_company_jobs(&mut select, company, status);
        select.push(" ORDER BY created_at DESC, id");
        push_window(&mut select, page);
        let rows: Vec<JobRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Paged {
            items: convert(rows)?,
            total: total as u64,
        })
    }

    async fn all_jobs(&self) -> StoreResult<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC, id")
            .fetch_all(&self.pool)
            .await?;
        convert(rows)
    }

    async fn category_counts(&self, now: DateTime<Utc>) -> StoreResult<Vec<(JobCategory, i64)>> {
        let mut qb = QueryBuilder::new("SELECT category, COUNT(*) FROM jobs WHERE ");
        push_open_job(&mut qb, now);
        qb.push(" GROUP BY category ORDER BY COUNT(*) DESC, category");
        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(category, count)| Ok((parse(&category)?, count)))
            .collect()
    }

    async fn company_job_totals(&self, company: UserId) -> StoreResult<JobTotals> {
        let (total_jobs, active_jobs, total_views): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'active'),
                   COALESCE(SUM(views), 0)::BIGINT
            FROM jobs WHERE company_id = $1
            "#,
        )
        .bind(company)
        .fetch_one(&self.pool)
        .await?;
        Ok(JobTotals {
            total_jobs,
            active_jobs,
            total_views,
        })
    }

    async fn recommended_jobs(
        &self,
        tags: &[String],
        categories: &[JobCategory],
        now: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<Job>> {
        let tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        let categories: Vec<String> = categories.iter().map(|c| c.as_str().to_string()).collect();

        let mut qb = QueryBuilder::new("SELECT * FROM jobs WHERE ");
        push_open_job(&mut qb, now);
        qb.push(" AND (EXISTS (SELECT 1 FROM unnest(tags) t WHERE lower(t) = ANY(")
            .push_bind(tags)
            .push(")) OR category = ANY(")
            .push_bind(categories)
            .push(")) ORDER BY is_featured DESC, created_at DESC, id LIMIT ")
            .push_bind(i64::from(limit));
        let rows: Vec<JobRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        convert(rows)
    }

    async fn create_application(
        &self,
        application: &Application,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Row lock serialises concurrent applicants against the capacity check.
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(application.job)
            .fetch_optional(&mut *tx)
            .await?;
        let job = row
            .map(Job::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("Job {}", application.job)))?;
        if !job.is_accepting_applications(now) {
            return Err(StoreError::JobClosed);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO applications
                (id, job_id, applicant_id, company_id, status, cover_letter, employer_notes,
                 applied_at, reviewed_at, interview_scheduled_at, responded_at, withdrawn_at,
                 source, ip_address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (job_id, applicant_id) DO NOTHING
            "#,
        )
        .bind(application.id)
        .bind(application.job)
        .bind(application.applicant)
        .bind(application.company)
        .bind(application.status.as_str())
        .bind(&application.cover_letter)
        .bind(&application.employer_notes)
        .bind(application.applied_at)
        .bind(application.reviewed_at)
        .bind(application.interview_scheduled_at)
        .bind(application.responded_at)
        .bind(application.withdrawn_at)
        .bind(application.source.as_str())
        .bind(&application.ip_address)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Err(StoreError::Conflict(DUPLICATE_APPLICATION.to_string()));
        }

        sqlx::query("UPDATE jobs SET applications_count = applications_count + 1 WHERE id = $1")
            .bind(application.job)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn application_by_id(&self, id: ApplicationId) -> StoreResult<Option<Application>> {
        let row: Option<ApplicationRow> = sqlx::query_as("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Application::try_from).transpose()
    }

    async fn find_application(
        &self,
        job: JobId,
        applicant: UserId,
    ) -> StoreResult<Option<Application>> {
        let row: Option<ApplicationRow> =
            sqlx::query_as("SELECT * FROM applications WHERE job_id = $1 AND applicant_id = $2")
                .bind(job)
                .bind(applicant)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Application::try_from).transpose()
    }

    async fn has_applied_to_company(&self, company: UserId, applicant: UserId) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM applications WHERE company_id = $1 AND applicant_id = $2)",
        )
        .bind(company)
        .bind(applicant)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn update_application(
        &self,
        application: &Application,
        expected: ApplicationStatus,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE applications SET
                status = $2, employer_notes = $3, reviewed_at = $4,
                interview_scheduled_at = $5, responded_at = $6, withdrawn_at = $7,
                updated_at = $8
            WHERE id = $1 AND status = $9
            "#,
        )
        .bind(application.id)
        .bind(application.status.as_str())
        .bind(&application.employer_notes)
        .bind(application.reviewed_at)
        .bind(application.interview_scheduled_at)
        .bind(application.responded_at)
        .bind(application.withdrawn_at)
        .bind(application.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(STALE_APPLICATION.to_string()));
        }
        Ok(())
    }

    async fn withdraw_application(&self, application: &Application) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE applications SET status = $2, withdrawn_at = $3, updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(application.id)
        .bind(application.status.as_str())
        .bind(application.withdrawn_at)
        .bind(application.updated_at)
        .bind(ApplicationStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(STALE_APPLICATION.to_string()));
        }
        sqlx::query(
            "UPDATE jobs SET applications_count = GREATEST(applications_count - 1, 0) WHERE id = $1",
        )
        .bind(application.job)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_applications(
        &self,
        scope: ApplicationScope,
        status: Option<ApplicationStatus>,
        page: Page,
    ) -> StoreResult<Paged<Application>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM applications WHERE ");
        push_scoped_applications(&mut count, scope, status);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM applications WHERE ");
        push_scoped_applications(&mut select, scope, status);
        select.push(" ORDER BY applied_at DESC, id");
        push_window(&mut select, page);
        let rows: Vec<ApplicationRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Paged {
            items: convert(rows)?,
            total: total as u64,
        })
    }

    async fn all_applications(&self) -> StoreResult<Vec<Application>> {
        let rows: Vec<ApplicationRow> =
            sqlx::query_as("SELECT * FROM applications ORDER BY applied_at DESC, id")
                .fetch_all(&self.pool)
                .await?;
        convert(rows)
    }

    async fn application_status_counts(
        &self,
        scope: ApplicationScope,
    ) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let mut qb = QueryBuilder::new("SELECT status, COUNT(*) FROM applications WHERE ");
        push_scope(&mut qb, scope);
        qb.push(" GROUP BY status");
        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(status, count)| Ok((parse(&status)?, count)))
            .collect()
    }
}
