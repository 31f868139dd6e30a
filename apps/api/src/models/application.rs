use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::job::{Job, JobId};
use crate::models::user::UserId;

pub type ApplicationId = Uuid;

text_enum! {
    pub enum ApplicationStatus {
        Pending => "pending",
        Reviewing => "reviewing",
        Shortlisted => "shortlisted",
        Interview => "interview",
        Accepted => "accepted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

text_enum! {
    pub enum ApplicationSource {
        Website => "website",
        Mobile => "mobile",
        Api => "api",
    }
}

/// A student's submission against a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: ApplicationId,
    pub job: JobId,
    pub applicant: UserId,
    pub company: UserId,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub employer_notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub interview_scheduled_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub source: ApplicationSource,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        job: &Job,
        applicant: UserId,
        cover_letter: Option<String>,
        ip_address: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Application {
            id: Uuid::new_v4(),
            job: job.id,
            applicant,
            company: job.company,
            status: ApplicationStatus::Pending,
            cover_letter,
            employer_notes: None,
            applied_at: now,
            reviewed_at: None,
            interview_scheduled_at: None,
            responded_at: None,
            withdrawn_at: None,
            source: ApplicationSource::Website,
            ip_address,
            created_at: now,
            updated_at: now,
        }
    }
}
