//! Flat tables for the spreadsheet export and the xlsx writer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::models::application::Application;
use crate::models::job::{Job, JobId};
use crate::models::user::{Role, User, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<Cell>>,
}

fn yes_no(flag: bool) -> Cell {
    Cell::from(if flag { "Yes" } else { "No" })
}

fn text(value: &Option<String>) -> Cell {
    Cell::from(value.clone().unwrap_or_default())
}

fn or_na(value: Option<String>) -> Cell {
    Cell::from(value.unwrap_or_else(|| "N/A".to_string()))
}

fn timestamp(value: Option<DateTime<Utc>>) -> Cell {
    Cell::from(
        value
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default(),
    )
}

fn optional_number(value: Option<f64>) -> Cell {
    value.map(Cell::Number).unwrap_or_else(|| Cell::from(""))
}

pub const USER_HEADERS: &[&str] = &[
    "ID",
    "Email",
    "Role",
    "Active",
    "Email Verified",
    "Last Login",
    "Created At",
    "Updated At",
    "First Name",
    "Last Name",
    "Age",
    "Career",
    "University",
    "Semester",
    "Skills",
    "Availability",
    "Preferred Location",
    "CV Path",
    "Experience",
    "Company Name",
    "Contact Name",
    "Phone",
    "Address",
    "City",
    "State",
    "Zip Code",
    "Business Type",
    "Website",
    "Description",
    "Verified",
];

/// One row per account; the profile columns of the other role stay blank.
pub fn users_sheet(users: &[User]) -> Sheet {
    let rows = users
        .iter()
        .map(|user| {
            let mut row = vec![
                Cell::from(user.id.to_string()),
                Cell::from(user.email.as_str()),
                Cell::from(user.role.as_str()),
                yes_no(user.is_active),
                yes_no(user.email_verified),
                user.last_login
                    .map(|t| timestamp(Some(t)))
                    .unwrap_or_else(|| Cell::from("Never")),
                timestamp(Some(user.created_at)),
                timestamp(Some(user.updated_at)),
            ];

            let student = &user.student_info;
            let business = &user.business_info;
            let mut student_cells = vec![Cell::from(""); 11];
            let mut business_cells = vec![Cell::from(""); 11];
            match user.role {
                Role::Student => {
                    student_cells = vec![
                        text(&student.first_name),
                        text(&student.last_name),
                        optional_number(student.age.map(f64::from)),
                        text(&student.career),
                        text(&student.university),
                        text(&student.semester),
                        Cell::from(student.skills.join(", ")),
                        Cell::from(student.availability.as_str()),
                        text(&student.preferred_location),
                        text(&student.cv_path),
                        Cell::from(
                            student
                                .experience
                                .iter()
                                .map(|e| format!("{} at {} ({})", e.position, e.company, e.duration))
                                .collect::<Vec<_>>()
                                .join("; "),
                        ),
                    ];
                }
                Role::Business => {
                    business_cells = vec![
                        text(&business.company_name),
                        text(&business.contact_name),
                        text(&business.phone),
                        text(&business.address),
                        text(&business.city),
                        text(&business.state),
                        text(&business.zip_code),
                        text(&business.business_type),
                        text(&business.website),
                        text(&business.description),
                        yes_no(business.verified),
                    ];
                }
            }
            row.extend(student_cells);
            row.extend(business_cells);
            row
        })
        .collect();

    Sheet {
        name: "Users",
        headers: USER_HEADERS,
        rows,
    }
}

pub const JOB_HEADERS: &[&str] = &[
    "ID",
    "Title",
    "Description",
    "Company",
    "Company City",
    "Category",
    "Employment Type",
    "Status",
    "Requirements",
    "Responsibilities",
    "Benefits",
    "Address",
    "City",
    "State",
    "Zip Code",
    "Remote",
    "Hybrid",
    "Schedule Days",
    "Start Time",
    "End Time",
    "Flexible Schedule",
    "Salary Min",
    "Salary Max",
    "Salary Currency",
    "Salary Period",
    "Salary Negotiable",
    "Tags",
    "Views",
    "Applications Count",
    "Featured",
    "Application Deadline",
    "Start Date",
    "Created At",
    "Updated At",
];

pub fn jobs_sheet(jobs: &[Job], companies: &HashMap<UserId, User>) -> Sheet {
    let rows = jobs
        .iter()
        .map(|job| {
            let company = companies.get(&job.company).map(|u| &u.business_info);
            let days: Vec<&str> = job.schedule.days.iter().map(|d| d.as_str()).collect();
            vec![
                Cell::from(job.id.to_string()),
                Cell::from(job.title.as_str()),
                Cell::from(job.description.as_str()),
                or_na(company.and_then(|c| c.company_name.clone())),
                or_na(company.and_then(|c| c.city.clone())),
                Cell::from(job.category.as_str()),
                Cell::from(job.employment_type.as_str()),
                Cell::from(job.status.as_str()),
                Cell::from(job.requirements.join("; ")),
                Cell::from(job.responsibilities.join("; ")),
                Cell::from(job.benefits.join("; ")),
                Cell::from(job.location.address.as_str()),
                Cell::from(job.location.city.as_str()),
                Cell::from(job.location.state.as_str()),
                text(&job.location.zip_code),
                yes_no(job.location.is_remote),
                yes_no(job.location.is_hybrid),
                Cell::from(days.join(", ")),
                text(&job.schedule.start_time),
                text(&job.schedule.end_time),
                yes_no(job.schedule.flexible),
                optional_number(job.salary.min),
                optional_number(job.salary.max),
                Cell::from(job.salary.currency.as_str()),
                Cell::from(job.salary.period.as_str()),
                yes_no(job.salary.is_negotiable),
                Cell::from(job.tags.join(", ")),
                Cell::Number(job.views as f64),
                Cell::Number(job.applications_count as f64),
                yes_no(job.is_featured),
                timestamp(job.application_deadline),
                timestamp(job.start_date),
                timestamp(Some(job.created_at)),
                timestamp(Some(job.updated_at)),
            ]
        })
        .collect();

    Sheet {
        name: "Jobs",
        headers: JOB_HEADERS,
        rows,
    }
}

pub const APPLICATION_HEADERS: &[&str] = &[
    "ID",
    "Job Title",
    "Job Category",
    "Job Type",
    "Job City",
    "Applicant Email",
    "Applicant Name",
    "Applicant Career",
    "Applicant University",
    "Company",
    "Status",
    "Cover Letter",
    "Employer Notes",
    "Applied At",
    "Reviewed At",
    "Interview Scheduled At",
    "Responded At",
    "Withdrawn At",
    "Source",
    "IP Address",
    "Created At",
    "Updated At",
];

pub fn applications_sheet(
    applications: &[Application],
    jobs: &HashMap<JobId, Job>,
    users: &HashMap<UserId, User>,
) -> Sheet {
    let rows = applications
        .iter()
        .map(|app| {
            let job = jobs.get(&app.job);
            let applicant = users.get(&app.applicant);
            let company = users.get(&app.company);
            let name = applicant
                .map(|a| a.full_name())
                .filter(|n| !n.is_empty());
            vec![
                Cell::from(app.id.to_string()),
                or_na(job.map(|j| j.title.clone())),
                or_na(job.map(|j| j.category.as_str().to_string())),
                or_na(job.map(|j| j.employment_type.as_str().to_string())),
                or_na(job.map(|j| j.location.city.clone())),
                or_na(applicant.map(|a| a.email.clone())),
                or_na(name),
                text(&applicant.and_then(|a| a.student_info.career.clone())),
                text(&applicant.and_then(|a| a.student_info.university.clone())),
                or_na(company.and_then(|c| c.business_info.company_name.clone())),
                Cell::from(app.status.as_str()),
                text(&app.cover_letter),
                text(&app.employer_notes),
                timestamp(Some(app.applied_at)),
                timestamp(app.reviewed_at),
                timestamp(app.interview_scheduled_at),
                timestamp(app.responded_at),
                timestamp(app.withdrawn_at),
                Cell::from(app.source.as_str()),
                text(&app.ip_address),
                timestamp(Some(app.created_at)),
                timestamp(Some(app.updated_at)),
            ]
        })
        .collect();

    Sheet {
        name: "Applications",
        headers: APPLICATION_HEADERS,
        rows,
    }
}

/// Serializes `sheets` into one workbook, one worksheet each, with a bold
/// frozen header row.
/// Longest string a single xlsx cell can hold.
pub const MAX_CELL_CHARS: usize = 32_767;

fn fit_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

pub fn write_workbook(sheets: &[Sheet]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name)?;
        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        for (i, row) in sheet.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(value) if value.is_empty() => {}
                    Cell::Text(value) => {
                        worksheet.write_string(r, col as u16, fit_cell(value))?;
                    }
                    Cell::Number(value) => {
                        worksheet.write_number(r, col as u16, *value)?;
                    }
                }
            }
        }
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::job::fixtures::open_job;
    use crate::models::user::fixtures::{business, student};

    #[test]
    fn test_user_rows_match_headers() {
        let sheet = users_sheet(&[student("ana@uni.mx"), business("cafe@central.mx")]);
        assert_eq!(sheet.rows.len(), 2);
        for row in &sheet.rows {
            assert_eq!(row.len(), USER_HEADERS.len());
        }
        let company_col = USER_HEADERS.iter().position(|h| *h == "Company Name").unwrap();
        assert_eq!(sheet.rows[0][company_col], Cell::from(""));
        assert_eq!(sheet.rows[1][company_col], Cell::from("Café Central"));
    }

    #[test]
    fn test_oversized_text_is_cut_to_cell_limit() {
        let long = "ñ".repeat(MAX_CELL_CHARS + 10);
        assert_eq!(fit_cell(&long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(fit_cell("short"), "short");

        let mut user = student("ana@uni.mx");
        user.student_info.skills = vec!["x".repeat(40_000)];
        let bytes = write_workbook(&[users_sheet(&[user])]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_job_rows_fall_back_when_company_is_missing() {
        let job = open_job(Uuid::new_v4());
        let sheet = jobs_sheet(&[job], &HashMap::new());
        assert_eq!(sheet.rows[0].len(), JOB_HEADERS.len());
        assert_eq!(sheet.rows[0][3], Cell::from("N/A"));
    }

    #[test]
    fn test_application_rows_join_related_records() {
        let company = business("cafe@central.mx");
        let applicant = student("ana@uni.mx");
        let job = open_job(company.id);
        let app = Application::new(&job, applicant.id, None, None, Utc::now());

        let jobs = HashMap::from([(job.id, job.clone())]);
        let users = HashMap::from([(company.id, company), (applicant.id, applicant)]);
        let sheet = applications_sheet(&[app], &jobs, &users);

        let row = &sheet.rows[0];
        assert_eq!(row.len(), APPLICATION_HEADERS.len());
        assert_eq!(row[1], Cell::from("Barista de medio tiempo"));
        assert_eq!(row[6], Cell::from("Ana López"));
        assert_eq!(row[9], Cell::from("Café Central"));
    }

    #[test]
    fn test_workbook_is_a_zip_container() {
        let sheets = [
            users_sheet(&[student("ana@uni.mx")]),
            jobs_sheet(&[], &HashMap::new()),
        ];
        let bytes = write_workbook(&sheets).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
