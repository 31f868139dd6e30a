use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

text_enum! {
    pub enum Role {
        Student => "student",
        Business => "business",
    }
}

text_enum! {
    pub enum Availability {
        Morning => "morning",
        Afternoon => "afternoon",
        Evening => "evening",
        Weekend => "weekend",
        Flexible => "flexible",
    }
}

impl Default for Availability {
    fn default() -> Self {
        Availability::Flexible
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub company: String,
    pub position: String,
    pub duration: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub career: Option<String>,
    pub university: Option<String>,
    pub semester: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<Experience>,
    pub cv_path: Option<String>,
    pub availability: Availability,
    pub preferred_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessInfo {
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
    pub verified: bool,
}

/// An account. Both profile blobs are always present; only the one matching
/// `role` is meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub student_info: StudentInfo,
    pub business_info: BusinessInfo,
    pub is_active: bool,
    pub email_verified: bool,
    pub notifications: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl User {
    pub fn new(email: &str, password_hash: String, role: Role, now: DateTime<Utc>) -> Self {
        User {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            role,
            student_info: StudentInfo::default(),
            business_info: BusinessInfo::default(),
            is_active: true,
            email_verified: false,
            notifications: true,
            last_login: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        match self.role {
            Role::Student => {
                let first = self.student_info.first_name.as_deref().unwrap_or("");
                let last = self.student_info.last_name.as_deref().unwrap_or("");
                format!("{first} {last}").trim().to_string()
            }
            Role::Business => self.business_info.company_name.clone().unwrap_or_default(),
        }
    }

    /// Names of the profile fields that still block posting or applying.
    pub fn missing_profile_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.role {
            Role::Student => {
                let info = &self.student_info;
                if !filled(&info.first_name) {
                    missing.push("firstName");
                }
                if !filled(&info.last_name) {
                    missing.push("lastName");
                }
                if info.age.is_none() {
                    missing.push("age");
                }
                if !filled(&info.career) {
                    missing.push("career");
                }
            }
            Role::Business => {
                let info = &self.business_info;
                if !filled(&info.company_name) {
                    missing.push("companyName");
                }
                if !filled(&info.contact_name) {
                    missing.push("contactName");
                }
                if !filled(&info.phone) {
                    missing.push("phone");
                }
                if !filled(&info.address) {
                    missing.push("address");
                }
                if !filled(&info.city) {
                    missing.push("city");
                }
            }
        }
        missing
    }

    pub fn is_profile_complete(&self) -> bool {
        self.missing_profile_fields().is_empty()
    }

    /// The role-specific profile blob as JSON.
    pub fn profile_json(&self) -> serde_json::Value {
        let value = match self.role {
            Role::Student => serde_json::to_value(&self.student_info),
            Role::Business => serde_json::to_value(&self.business_info),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// What anyone may see about this account: no email, no credentials.
    pub fn public_profile(&self) -> PublicProfile {
        match self.role {
            Role::Student => PublicProfile::Student {
                id: self.id,
                student_info: self.student_info.clone(),
            },
            Role::Business => PublicProfile::Business {
                id: self.id,
                business_info: PublicBusinessInfo {
                    company_name: self.business_info.company_name.clone(),
                    business_type: self.business_info.business_type.clone(),
                    city: self.business_info.city.clone(),
                    verified: self.business_info.verified,
                },
            },
        }
    }

    pub fn company_summary(&self) -> CompanySummary {
        CompanySummary {
            id: self.id,
            company_name: self.business_info.company_name.clone(),
            contact_name: self.business_info.contact_name.clone(),
            phone: self.business_info.phone.clone(),
            city: self.business_info.city.clone(),
            verified: self.business_info.verified,
        }
    }

    pub fn applicant_summary(&self) -> ApplicantSummary {
        let info = &self.student_info;
        ApplicantSummary {
            id: self.id,
            email: self.email.clone(),
            first_name: info.first_name.clone(),
            last_name: info.last_name.clone(),
            career: info.career.clone(),
            university: info.university.clone(),
            skills: info.skills.clone(),
            experience: info.experience.clone(),
            cv_path: info.cv_path.clone(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicBusinessInfo {
    pub company_name: Option<String>,
    pub business_type: Option<String>,
    pub city: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PublicProfile {
    #[serde(rename_all = "camelCase")]
    Student { id: UserId, student_info: StudentInfo },
    #[serde(rename_all = "camelCase")]
    Business {
        id: UserId,
        business_info: PublicBusinessInfo,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub id: UserId,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub career: Option<String>,
    pub university: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<Experience>,
    pub cv_path: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{business, student};
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new("  Ana@Example.COM ", "h".into(), Role::Student, Utc::now());
        assert_eq!(user.email, "ana@example.com");
        assert!(user.is_active);
        assert!(!user.email_verified);
    }

    #[test]
    fn test_fresh_student_profile_is_incomplete() {
        let user = User::new("a@b.co", "h".into(), Role::Student, Utc::now());
        assert_eq!(
            user.missing_profile_fields(),
            vec!["firstName", "lastName", "age", "career"]
        );
        assert!(!user.is_profile_complete());
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let mut user = business("b@b.co");
        user.business_info.phone = Some("   ".to_string());
        assert_eq!(user.missing_profile_fields(), vec!["phone"]);
    }

    #[test]
    fn test_complete_profiles() {
        assert!(student("s@x.co").is_profile_complete());
        assert!(business("b@x.co").is_profile_complete());
    }

    #[test]
    fn test_full_name_per_role() {
        assert_eq!(student("s@x.co").full_name(), "Ana López");
        assert_eq!(business("b@x.co").full_name(), "Café Central");
    }

    #[test]
    fn test_public_profile_hides_email_and_contact() {
        let value = serde_json::to_value(business("b@x.co").public_profile()).unwrap();
        assert_eq!(value["role"], "business");
        assert_eq!(value["businessInfo"]["companyName"], "Café Central");
        assert!(value.get("email").is_none());
        assert!(value["businessInfo"].get("phone").is_none());

        let value = serde_json::to_value(student("s@x.co").public_profile()).unwrap();
        assert_eq!(value["role"], "student");
        assert!(value.get("email").is_none());
        assert!(value.get("passwordHash").is_none());
    }

    #[test]
    fn test_student_info_deserializes_partial_json() {
        let info: StudentInfo = serde_json::from_str(r#"{"firstName":"Ana"}"#).unwrap();
        assert_eq!(info.first_name.as_deref(), Some("Ana"));
        assert_eq!(info.availability, Availability::Flexible);
        assert!(info.skills.is_empty());
    }
}
