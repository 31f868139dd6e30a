//! Partial profile updates. Only fields that are present and non-empty
//! overwrite the stored value; everything else is kept.

use serde::Deserialize;

use crate::models::user::{Availability, BusinessInfo, Experience, Role, StudentInfo, User};
use crate::validation::{char_len_between, clean, FieldErrors};

pub const MIN_AGE: i32 = 16;
pub const MAX_AGE: i32 = 35;
pub const MAX_BUSINESS_DESCRIPTION: usize = 500;
pub const MAX_SKILL_LENGTH: usize = 100;
pub const MAX_EXPERIENCE_FIELD: usize = 500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub career: Option<String>,
    pub university: Option<String>,
    pub semester: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience: Option<Vec<Experience>>,
    pub availability: Option<Availability>,
    pub preferred_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessProfileUpdate {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub business_type: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
}

/// Body of `PUT /api/auth/profile`; the half matching the caller's role applies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(flatten)]
    pub student: StudentProfileUpdate,
    #[serde(flatten)]
    pub business: BusinessProfileUpdate,
}

fn merge(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = clean(value) {
        *slot = Some(value);
    }
}

fn merge_student(info: &mut StudentInfo, update: StudentProfileUpdate, errors: &mut FieldErrors) {
    merge(&mut info.first_name, update.first_name);
    merge(&mut info.last_name, update.last_name);
    merge(&mut info.career, update.career);
    merge(&mut info.university, update.university);
    merge(&mut info.semester, update.semester);
    merge(&mut info.preferred_location, update.preferred_location);
    if let Some(age) = update.age {
        if (MIN_AGE..=MAX_AGE).contains(&age) {
            info.age = Some(age);
        } else {
            errors.push("age", format!("Age must be between {MIN_AGE} and {MAX_AGE}"));
        }
    }
    if let Some(skills) = update.skills.filter(|s| !s.is_empty()) {
        let skills: Vec<String> = skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if skills.iter().all(|s| s.chars().count() <= MAX_SKILL_LENGTH) {
            info.skills = skills;
        } else {
            errors.push(
                "skills",
                format!("Each skill cannot exceed {MAX_SKILL_LENGTH} characters"),
            );
        }
    }
    if let Some(experience) = update.experience.filter(|e| !e.is_empty()) {
        let fits = experience.iter().all(|e| {
            [&e.company, &e.position, &e.duration, &e.description]
                .iter()
                .all(|field| field.chars().count() <= MAX_EXPERIENCE_FIELD)
        });
        if fits {
            info.experience = experience;
        } else {
            errors.push(
                "experience",
                format!("Experience entries cannot exceed {MAX_EXPERIENCE_FIELD} characters per field"),
            );
        }
    }
    if let Some(availability) = update.availability {
        info.availability = availability;
    }
}

fn merge_business(info: &mut BusinessInfo, update: BusinessProfileUpdate, errors: &mut FieldErrors) {
    merge(&mut info.company_name, update.company_name);
    merge(&mut info.contact_name, update.contact_name);
    merge(&mut info.phone, update.phone);
    merge(&mut info.address, update.address);
    merge(&mut info.city, update.city);
    merge(&mut info.state, update.state);
    merge(&mut info.zip_code, update.zip_code);
    merge(&mut info.business_type, update.business_type);
    merge(&mut info.website, update.website);
    if let Some(description) = clean(update.description) {
        if char_len_between(&description, 1, MAX_BUSINESS_DESCRIPTION) {
            info.description = Some(description);
        } else {
            errors.push(
                "description",
                format!("Description cannot exceed {MAX_BUSINESS_DESCRIPTION} characters"),
            );
        }
    }
}

/// Merges `update` into the role-specific profile of `user`.
pub fn apply_profile_update(user: &mut User, update: ProfileUpdate) -> FieldErrors {
    let mut errors = FieldErrors::new();
    match user.role {
        Role::Student => merge_student(&mut user.student_info, update.student, &mut errors),
        Role::Business => merge_business(&mut user.business_info, update.business, &mut errors),
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::fixtures::{business, student};

    fn update(json: &str) -> ProfileUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_only_non_empty_fields_overwrite() {
        let mut user = student("ana@example.com");
        let errors = apply_profile_update(
            &mut user,
            update(r#"{"firstName":"Ana María","lastName":"","career":"   ","skills":[]}"#),
        );
        assert!(errors.is_empty());
        assert_eq!(user.student_info.first_name.as_deref(), Some("Ana María"));
        assert_eq!(user.student_info.last_name.as_deref(), Some("López"));
        assert_eq!(user.student_info.career.as_deref(), Some("Computer Science"));
        assert_eq!(user.student_info.skills, vec!["python", "sales"]);
    }

    #[test]
    fn test_fields_of_other_role_are_ignored() {
        let mut user = student("ana@example.com");
        apply_profile_update(&mut user, update(r#"{"companyName":"Acme"}"#));
        assert_eq!(user.business_info.company_name, None);

        let mut user = business("shop@example.com");
        apply_profile_update(&mut user, update(r#"{"firstName":"Luis","city":"Puebla"}"#));
        assert_eq!(user.student_info.first_name, None);
        assert_eq!(user.business_info.city.as_deref(), Some("Puebla"));
    }

    #[test]
    fn test_age_out_of_range_is_rejected() {
        let mut user = student("ana@example.com");
        let errors = apply_profile_update(&mut user, update(r#"{"age":40}"#));
        assert_eq!(errors.into_vec()[0].field, "age");
        assert_eq!(user.student_info.age, Some(21));
    }

    #[test]
    fn test_long_business_description_is_rejected() {
        let mut user = business("shop@example.com");
        let body = serde_json::json!({ "description": "x".repeat(501) }).to_string();
        let errors = apply_profile_update(&mut user, update(&body));
        assert_eq!(errors.into_vec()[0].field, "description");
    }

    #[test]
    fn test_oversized_skill_and_experience_are_rejected() {
        let mut user = student("ana@example.com");
        let body = serde_json::json!({
            "skills": ["rust", "x".repeat(MAX_SKILL_LENGTH + 1)],
            "experience": [{ "company": "Café Central", "description": "y".repeat(40_000) }],
        })
        .to_string();
        let errors = apply_profile_update(&mut user, update(&body));
        let fields: Vec<String> = errors.into_vec().into_iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["skills", "experience"]);
        assert_eq!(user.student_info.skills, vec!["python", "sales"]);
        assert!(user.student_info.experience.is_empty());
    }

    #[test]
    fn test_unknown_availability_fails_to_parse() {
        assert!(serde_json::from_str::<ProfileUpdate>(r#"{"availability":"never"}"#).is_err());
    }
}
