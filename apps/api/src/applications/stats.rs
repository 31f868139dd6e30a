use serde::Serialize;

use crate::models::application::ApplicationStatus;
use crate::store::JobTotals;

/// Per-status application counts plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub pending: i64,
    pub reviewing: i64,
    pub shortlisted: i64,
    pub interview: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub withdrawn: i64,
}

impl ApplicationStats {
    pub fn from_counts(counts: &[(ApplicationStatus, i64)]) -> Self {
        let mut stats = ApplicationStats::default();
        for &(status, count) in counts {
            let slot = match status {
                ApplicationStatus::Pending => &mut stats.pending,
                ApplicationStatus::Reviewing => &mut stats.reviewing,
                ApplicationStatus::Shortlisted => &mut stats.shortlisted,
                ApplicationStatus::Interview => &mut stats.interview,
                ApplicationStatus::Accepted => &mut stats.accepted,
                ApplicationStatus::Rejected => &mut stats.rejected,
                ApplicationStatus::Withdrawn => &mut stats.withdrawn,
            };
            *slot += count;
            stats.total += count;
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub total_views: i64,
}

impl From<JobTotals> for JobStats {
    fn from(totals: JobTotals) -> Self {
        JobStats {
            total_jobs: totals.total_jobs,
            active_jobs: totals.active_jobs,
            total_views: totals.total_views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_are_summed() {
        let stats = ApplicationStats::from_counts(&[
            (ApplicationStatus::Pending, 3),
            (ApplicationStatus::Rejected, 1),
            (ApplicationStatus::Accepted, 2),
        ]);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.interview, 0);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(ApplicationStats::default()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 8);
        let value = serde_json::to_value(JobStats::from(JobTotals {
            total_jobs: 2,
            active_jobs: 1,
            total_views: 40,
        }))
        .unwrap();
        assert_eq!(value["totalViews"], 40);
    }
}
