use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserId;

pub type JobId = Uuid;

text_enum! {
    pub enum EmploymentType {
        PartTime => "part-time",
        FullTime => "full-time",
        Internship => "internship",
        Contract => "contract",
        Temporary => "temporary",
    }
}

text_enum! {
    pub enum JobCategory {
        Technology => "technology",
        CustomerService => "customer-service",
        Retail => "retail",
        FoodService => "food-service",
        Marketing => "marketing",
        Sales => "sales",
        Administration => "administration",
        Education => "education",
        Healthcare => "healthcare",
        Tutoring => "tutoring",
        Delivery => "delivery",
        Cleaning => "cleaning",
        Security => "security",
        Other => "other",
    }
}

impl JobCategory {
    pub fn label(&self) -> &'static str {
        match self {
            JobCategory::Technology => "Technology",
            JobCategory::CustomerService => "Customer Service",
            JobCategory::Retail => "Retail",
            JobCategory::FoodService => "Food Service",
            JobCategory::Marketing => "Marketing",
            JobCategory::Sales => "Sales",
            JobCategory::Administration => "Administration",
            JobCategory::Education => "Education",
            JobCategory::Healthcare => "Healthcare",
            JobCategory::Tutoring => "Tutoring",
            JobCategory::Delivery => "Delivery",
            JobCategory::Cleaning => "Cleaning",
            JobCategory::Security => "Security",
            JobCategory::Other => "Other",
        }
    }
}

text_enum! {
    pub enum JobStatus {
        Active => "active",
        Paused => "paused",
        Closed => "closed",
        Draft => "draft",
    }
}

text_enum! {
    pub enum Currency {
        Mxn => "MXN",
        Usd => "USD",
    }
}

text_enum! {
    pub enum SalaryPeriod {
        Hourly => "hourly",
        Weekly => "weekly",
        Monthly => "monthly",
        Yearly => "yearly",
    }
}

text_enum! {
    pub enum Weekday {
        Monday => "monday",
        Tuesday => "tuesday",
        Wednesday => "wednesday",
        Thursday => "thursday",
        Friday => "friday",
        Saturday => "saturday",
        Sunday => "sunday",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: Option<String>,
    pub is_remote: bool,
    pub is_hybrid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Schedule {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub days: Vec<Weekday>,
    pub flexible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Salary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Currency,
    pub period: SalaryPeriod,
    pub is_negotiable: bool,
}

impl Default for Salary {
    fn default() -> Self {
        Salary {
            min: None,
            max: None,
            currency: Currency::Mxn,
            period: SalaryPeriod::Hourly,
            is_negotiable: false,
        }
    }
}

pub const DEFAULT_MAX_APPLICATIONS: i64 = 100;

/// A posting owned by a business account.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub company: UserId,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub benefits: Vec<String>,
    pub location: Location,
    pub employment_type: EmploymentType,
    pub schedule: Schedule,
    pub salary: Salary,
    pub category: JobCategory,
    pub tags: Vec<String>,
    pub status: JobStatus,
    pub application_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub views: i64,
    pub applications_count: i64,
    pub is_featured: bool,
    pub allow_applications: bool,
    pub max_applications: i64,
    pub requires_cover_letter: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Listed on the public board: active, taking applications, deadline not passed.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Active
            && self.allow_applications
            && self.application_deadline.map_or(true, |deadline| deadline > now)
    }

    /// Open and still below its application cap.
    pub fn is_accepting_applications(&self, now: DateTime<Utc>) -> bool {
        self.is_open(now) && self.applications_count < self.max_applications
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.company == user
    }

    /// Projection safe for anonymous readers. Owner-only fields (status,
    /// counters other than views, application settings, owner id) are left out.
    pub fn public_info(&self) -> PublicJob {
        PublicJob {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            requirements: self.requirements.clone(),
            responsibilities: self.responsibilities.clone(),
            benefits: self.benefits.clone(),
            location: self.location.clone(),
            employment_type: self.employment_type,
            schedule: self.schedule.clone(),
            salary: self.salary.clone(),
            category: self.category,
            tags: self.tags.clone(),
            application_deadline: self.application_deadline,
            start_date: self.start_date,
            views: self.views,
            is_featured: self.is_featured,
            requires_cover_letter: self.requires_cover_letter,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Everything, for the owning business.
    pub fn owner_view(&self) -> OwnerJob {
        OwnerJob {
            public: self.public_info(),
            status: self.status,
            applications_count: self.applications_count,
            allow_applications: self.allow_applications,
            max_applications: self.max_applications,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            title: self.title.clone(),
            location: self.location.clone(),
            employment_type: self.employment_type,
            category: self.category,
            salary: self.salary.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicJob {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub benefits: Vec<String>,
    pub location: Location,
    pub employment_type: EmploymentType,
    pub schedule: Schedule,
    pub salary: Salary,
    pub category: JobCategory,
    pub tags: Vec<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub views: i64,
    pub is_featured: bool,
    pub requires_cover_letter: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerJob {
    #[serde(flatten)]
    pub public: PublicJob,
    pub status: JobStatus,
    pub applications_count: i64,
    pub allow_applications: bool,
    pub max_applications: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub title: String,
    pub location: Location,
    pub employment_type: EmploymentType,
    pub category: JobCategory,
    pub salary: Salary,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn open_job(company: UserId) -> Job {
        let now = Utc::now();
        Job {
            id: Uuid::new_v4(),
            company,
            title: "Barista de medio tiempo".to_string(),
            description: "Prepare drinks, keep the bar clean and help customers during the afternoon shift.".to_string(),
            requirements: vec!["Friendly attitude".to_string()],
            responsibilities: vec![],
            benefits: vec![],
            location: Location {
                address: "Av. Reforma 1".to_string(),
                city: "CDMX".to_string(),
                state: "Ciudad de México".to_string(),
                zip_code: None,
                is_remote: false,
                is_hybrid: false,
            },
            employment_type: EmploymentType::PartTime,
            schedule: Schedule::default(),
            salary: Salary {
                min: Some(80.0),
                max: Some(120.0),
                ..Salary::default()
            },
            category: JobCategory::FoodService,
            tags: vec!["coffee".to_string()],
            status: JobStatus::Active,
            application_deadline: None,
            start_date: None,
            views: 0,
            applications_count: 0,
            is_featured: false,
            allow_applications: true,
            max_applications: DEFAULT_MAX_APPLICATIONS,
            requires_cover_letter: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::fixtures::open_job;
    use super::*;

    #[test]
    fn test_active_job_accepts_applications() {
        let job = open_job(Uuid::new_v4());
        assert!(job.is_accepting_applications(Utc::now()));
    }

    #[test]
    fn test_inactive_statuses_reject_applications() {
        for status in [JobStatus::Paused, JobStatus::Closed, JobStatus::Draft] {
            let mut job = open_job(Uuid::new_v4());
            job.status = status;
            assert!(!job.is_accepting_applications(Utc::now()), "{status}");
        }
    }

    #[test]
    fn test_passed_deadline_rejects_applications() {
        let now = Utc::now();
        let mut job = open_job(Uuid::new_v4());
        job.application_deadline = Some(now - Duration::hours(1));
        assert!(!job.is_open(now));
        job.application_deadline = Some(now + Duration::hours(1));
        assert!(job.is_open(now));
    }

    #[test]
    fn test_full_job_is_open_but_not_accepting() {
        let now = Utc::now();
        let mut job = open_job(Uuid::new_v4());
        job.max_applications = 2;
        job.applications_count = 2;
        assert!(job.is_open(now));
        assert!(!job.is_accepting_applications(now));
    }

    #[test]
    fn test_disabled_applications_close_job() {
        let mut job = open_job(Uuid::new_v4());
        job.allow_applications = false;
        assert!(!job.is_open(Utc::now()));
    }

    #[test]
    fn test_public_info_omits_owner_only_fields() {
        let value = serde_json::to_value(open_job(Uuid::new_v4()).public_info()).unwrap();
        let object = value.as_object().unwrap();
        for hidden in [
            "status",
            "applicationsCount",
            "allowApplications",
            "maxApplications",
            "company",
        ] {
            assert!(!object.contains_key(hidden), "{hidden} leaked");
        }
        assert_eq!(value["employmentType"], "part-time");
        assert_eq!(value["salary"]["currency"], "MXN");
    }

    #[test]
    fn test_owner_view_includes_settings() {
        let value = serde_json::to_value(open_job(Uuid::new_v4()).owner_view()).unwrap();
        assert_eq!(value["status"], "active");
        assert_eq!(value["maxApplications"], 100);
        assert_eq!(value["title"], "Barista de medio tiempo");
    }
}
