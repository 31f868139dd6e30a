use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::{EmploymentType, JobCategory};
use crate::pagination::Page;
use crate::store::JobQuery;
use crate::validation::{clean, FieldErrors};

pub const DEFAULT_JOBS_PER_PAGE: u32 = 12;

/// Query string of `GET /api/jobs`, exactly as received.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawJobQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub employment_type: Option<String>,
    pub remote: Option<String>,
    pub min_salary: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl RawJobQuery {
    /// Validates every parameter, reporting all bad ones at once.
    pub fn parse(self) -> Result<(JobQuery, Page), AppError> {
        let mut errors = FieldErrors::new();

        let category = clean(self.category).and_then(|raw| match raw.parse::<JobCategory>() {
            Ok(category) => Some(category),
            Err(_) => {
                errors.push("category", "Invalid category");
                None
            }
        });
        let employment_type =
            clean(self.employment_type).and_then(|raw| match raw.parse::<EmploymentType>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    errors.push("employmentType", "Invalid employment type");
                    None
                }
            });
        let remote = clean(self.remote).and_then(|raw| match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => {
                errors.push("remote", "remote must be true or false");
                None
            }
        });
        let min_salary = clean(self.min_salary).and_then(|raw| match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                errors.push("minSalary", "minSalary must be numeric");
                None
            }
        });
        let page = Page::parse(
            self.page.as_deref(),
            self.limit.as_deref(),
            DEFAULT_JOBS_PER_PAGE,
            &mut errors,
        );
        errors.into_result()?;

        let query = JobQuery {
            search: clean(self.search),
            category,
            city: clean(self.city),
            state: clean(self.state),
            employment_type,
            remote,
            min_salary,
            featured_only: false,
        };
        Ok((query, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawJobQuery {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
            .collect();
        serde_json::from_value(map.into()).unwrap()
    }

    #[test]
    fn test_empty_query_uses_defaults() {
        let (query, page) = RawJobQuery::default().parse().unwrap();
        assert_eq!(query, JobQuery::default());
        assert_eq!(page, Page::new(1, DEFAULT_JOBS_PER_PAGE));
    }

    #[test]
    fn test_filters_are_parsed() {
        let (query, page) = raw(&[
            ("search", " barista "),
            ("category", "food-service"),
            ("employmentType", "part-time"),
            ("remote", "false"),
            ("minSalary", "75.5"),
            ("page", "2"),
            ("limit", "20"),
        ])
        .parse()
        .unwrap();
        assert_eq!(query.search.as_deref(), Some("barista"));
        assert_eq!(query.category, Some(JobCategory::FoodService));
        assert_eq!(query.employment_type, Some(EmploymentType::PartTime));
        assert_eq!(query.remote, Some(false));
        assert_eq!(query.min_salary, Some(75.5));
        assert_eq!(page, Page::new(2, 20));
    }

    #[test]
    fn test_invalid_values_are_reported_together() {
        let err = raw(&[
            ("category", "gardening"),
            ("remote", "maybe"),
            ("minSalary", "lots"),
            ("limit", "500"),
        ])
        .parse()
        .unwrap_err();
        match err {
            AppError::Validation(fields) => {
                let names: Vec<_> = fields.into_iter().map(|f| f.field).collect();
                assert_eq!(names, vec!["category", "remote", "minSalary", "limit"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let (query, _) = raw(&[("city", "  "), ("category", "")]).parse().unwrap();
        assert_eq!(query.city, None);
        assert_eq!(query.category, None);
    }
}
