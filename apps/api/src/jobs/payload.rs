//! Request bodies for creating and editing postings.
//!
//! Enum-valued fields arrive as plain strings so that an unknown value is
//! reported against its field instead of failing the whole body.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::job::{
    EmploymentType, Job, JobCategory, JobStatus, Location, Salary, Schedule,
    DEFAULT_MAX_APPLICATIONS,
};
use crate::models::user::UserId;
use crate::validation::{char_len_between, FieldErrors};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationPayload {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub is_remote: Option<bool>,
    pub is_hybrid: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalaryPayload {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub period: Option<String>,
    pub is_negotiable: Option<bool>,
}

/// Body of `POST /api/jobs` and `PUT /api/jobs/:id`. On update every field
/// is optional and only the ones present change.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub responsibilities: Option<Vec<String>>,
    pub benefits: Option<Vec<String>>,
    pub location: Option<LocationPayload>,
    pub employment_type: Option<String>,
    pub schedule: Option<Schedule>,
    pub salary: Option<SalaryPayload>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub is_featured: Option<bool>,
    pub allow_applications: Option<bool>,
    pub max_applications: Option<i64>,
    pub requires_cover_letter: Option<bool>,
}

fn parse_enum<T: FromStr>(
    raw: Option<String>,
    field: &str,
    message: &str,
    errors: &mut FieldErrors,
) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(field, message);
            None
        }
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Lowercased, first occurrence wins.
fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    clean_list(tags)
        .into_iter()
        .map(|t| t.to_lowercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

impl JobPayload {
    /// Builds a new posting owned by `company`. Required fields missing from
    /// the body are reported together with any other invalid field.
    pub fn into_job(self, company: UserId, now: DateTime<Utc>) -> Result<Job, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(self.title.is_some(), "title", "Title is required");
        errors.check(self.description.is_some(), "description", "Description is required");
        errors.check(self.category.is_some(), "category", "Category is required");
        errors.check(
            self.employment_type.is_some(),
            "employmentType",
            "Employment type is required",
        );
        errors.check(self.location.is_some(), "location", "Location is required");

        let mut job = Job {
            id: Uuid::new_v4(),
            company,
            title: String::new(),
            description: String::new(),
            requirements: Vec::new(),
            responsibilities: Vec::new(),
            benefits: Vec::new(),
            location: Location::default(),
            employment_type: EmploymentType::PartTime,
            schedule: Schedule::default(),
            salary: Salary::default(),
            category: JobCategory::Other,
            tags: Vec::new(),
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
        };
        self.apply_fields(&mut job, &mut errors);
        validate_job(&job, &mut errors);

        if errors.is_empty() {
            Ok(job)
        } else {
            Err(errors)
        }
    }

    /// Applies a partial update in place. `views`, `applications_count`,
    /// ownership and creation time are never touched.
    pub fn apply_to(self, job: &mut Job, now: DateTime<Utc>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        self.apply_fields(job, &mut errors);
        validate_job(job, &mut errors);
        job.updated_at = now;
        errors
    }

    fn apply_fields(self, job: &mut Job, errors: &mut FieldErrors) {
        if let Some(title) = self.title {
            job.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            job.description = description.trim().to_string();
        }
        if let Some(requirements) = self.requirements {
            job.requirements = clean_list(requirements);
        }
        if let Some(responsibilities) = self.responsibilities {
            job.responsibilities = clean_list(responsibilities);
        }
        if let Some(benefits) = self.benefits {
            job.benefits = clean_list(benefits);
        }
        if let Some(location) = self.location {
            let current = &mut job.location;
            if let Some(address) = location.address {
                current.address = address.trim().to_string();
            }
            if let Some(city) = location.city {
                current.city = city.trim().to_string();
            }
            if let Some(state) = location.state {
                current.state = state.trim().to_string();
            }
            if location.zip_code.is_some() {
                current.zip_code = crate::validation::clean(location.zip_code);
            }
            if let Some(remote) = location.is_remote {
                current.is_remote = remote;
            }
            if let Some(hybrid) = location.is_hybrid {
                current.is_hybrid = hybrid;
            }
        }
        if let Some(kind) = parse_enum(
            self.employment_type,
            "employmentType",
            "Invalid employment type",
            errors,
        ) {
            job.employment_type = kind;
        }
        if let Some(schedule) = self.schedule {
            job.schedule = schedule;
        }
        if let Some(salary) = self.salary {
            if salary.min.is_some() {
                job.salary.min = salary.min;
            }
            if salary.max.is_some() {
                job.salary.max = salary.max;
            }
            if let Some(currency) =
                parse_enum(salary.currency, "salary.currency", "Currency must be MXN or USD", errors)
            {
                job.salary.currency = currency;
            }
            if let Some(period) =
                parse_enum(salary.period, "salary.period", "Invalid salary period", errors)
            {
                job.salary.period = period;
            }
            if let Some(negotiable) = salary.is_negotiable {
                job.salary.is_negotiable = negotiable;
            }
        }
        if let Some(category) = parse_enum(self.category, "category", "Invalid category", errors) {
            job.category = category;
        }
        if let Some(tags) = self.tags {
            job.tags = clean_tags(tags);
        }
        if let Some(status) = parse_enum(self.status, "status", "Invalid job status", errors) {
            job.status = status;
        }
        if self.application_deadline.is_some() {
            job.application_deadline = self.application_deadline;
        }
        if self.start_date.is_some() {
            job.start_date = self.start_date;
        }
        if let Some(featured) = self.is_featured {
            job.is_featured = featured;
        }
        if let Some(allow) = self.allow_applications {
            job.allow_applications = allow;
        }
        if let Some(max) = self.max_applications {
            job.max_applications = max;
        }
        if let Some(required) = self.requires_cover_letter {
            job.requires_cover_letter = required;
        }
    }
}

/// Field rules every stored posting satisfies.
pub fn validate_job(job: &Job, errors: &mut FieldErrors) {
    errors.check(
        char_len_between(&job.title, 5, 100),
        "title",
        "Title must be between 5 and 100 characters",
    );
    errors.check(
        char_len_between(&job.description, 50, 2000),
        "description",
        "Description must be between 50 and 2000 characters",
    );
    errors.check(
        !job.requirements.is_empty(),
        "requirements",
        "Include at least one requirement",
    );
    errors.check(!job.location.address.is_empty(), "location.address", "Address is required");
    errors.check(!job.location.city.is_empty(), "location.city", "City is required");
    errors.check(!job.location.state.is_empty(), "location.state", "State is required");
    errors.check(
        job.salary.min.map_or(true, |v| v >= 0.0),
        "salary.min",
        "Minimum salary cannot be negative",
    );
    errors.check(
        job.salary.max.map_or(true, |v| v >= 0.0),
        "salary.max",
        "Maximum salary cannot be negative",
    );
    if let (Some(min), Some(max)) = (job.salary.min, job.salary.max) {
        errors.check(min <= max, "salary", "Minimum salary cannot exceed maximum salary");
    }
    errors.check(
        job.max_applications >= 1,
        "maxApplications",
        "maxApplications must be at least 1",
    );
}
