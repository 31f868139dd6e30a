//! Application status rules.
//!
//! Employers move an application forward along
//! `pending < reviewing < shortlisted < interview < accepted` (stages may be
//! skipped) or reject it from any open state. Applicants may withdraw while
//! it is still pending. `accepted`, `rejected` and `withdrawn` are final.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::errors::AppError;
use crate::models::application::{Application, ApplicationStatus};
use crate::validation::clean;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error("Application is already {0} and can no longer change")]
    Closed(ApplicationStatus),

    #[error("Cannot move an application from {from} back to {to}")]
    Backward {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Only the applicant can withdraw an application")]
    EmployerWithdrawal,

    #[error("Only pending applications can be withdrawn")]
    NotWithdrawable,
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

pub fn is_final(status: ApplicationStatus) -> bool {
    matches!(
        status,
        ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
    )
}

/// Position on the forward ladder; `None` for rejected and withdrawn.
fn stage(status: ApplicationStatus) -> Option<u8> {
    match status {
        ApplicationStatus::Pending => Some(0),
        ApplicationStatus::Reviewing => Some(1),
        ApplicationStatus::Shortlisted => Some(2),
        ApplicationStatus::Interview => Some(3),
        ApplicationStatus::Accepted => Some(4),
        ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => None,
    }
}

pub fn check_employer_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), TransitionError> {
    if is_final(from) {
        return Err(TransitionError::Closed(from));
    }
    match to {
        ApplicationStatus::Withdrawn => Err(TransitionError::EmployerWithdrawal),
        ApplicationStatus::Rejected => Ok(()),
        _ => match (stage(from), stage(to)) {
            (Some(a), Some(b)) if b >= a => Ok(()),
            _ => Err(TransitionError::Backward { from, to }),
        },
    }
}

/// Moves `application` to `to` on behalf of the employer, stamping the
/// matching timestamps. Blank notes leave the stored notes alone.
pub fn apply_employer_transition(
    application: &mut Application,
    to: ApplicationStatus,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    check_employer_transition(application.status, to)?;

    application.status = to;
    application.responded_at = Some(now);
    match to {
        ApplicationStatus::Reviewing => application.reviewed_at = Some(now),
        ApplicationStatus::Interview => application.interview_scheduled_at = Some(now),
        _ => {}
    }
    if let Some(notes) = clean(notes) {
        application.employer_notes = Some(notes);
    }
    application.updated_at = now;
    Ok(())
}

pub fn apply_withdrawal(application: &mut Application, now: DateTime<Utc>) -> Result<(), TransitionError> {
    if application.status != ApplicationStatus::Pending {
        return Err(TransitionError::NotWithdrawable);
    }
    application.status = ApplicationStatus::Withdrawn;
    application.withdrawn_at = Some(now);
    application.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::job::fixtures::open_job;
    use crate::models::application::ApplicationStatus::*;

    fn pending() -> Application {
        Application::new(&open_job(Uuid::new_v4()), Uuid::new_v4(), None, None, Utc::now())
    }

    #[test]
    fn test_pending_to_accepted_stamps_responded_at() {
        let mut application = pending();
        let now = Utc::now();
        apply_employer_transition(&mut application, Accepted, None, now).unwrap();
        assert_eq!(application.status, Accepted);
        assert_eq!(application.responded_at, Some(now));
        assert_eq!(application.reviewed_at, None);
    }

    #[test]
    fn test_interview_stamps_interview_scheduled_at() {
        let mut application = pending();
        let now = Utc::now();
        apply_employer_transition(&mut application, Interview, None, now).unwrap();
        assert_eq!(application.interview_scheduled_at, Some(now));
        assert_eq!(application.responded_at, Some(now));
    }

    #[test]
    fn test_reviewing_stamps_reviewed_at_and_keeps_notes() {
        let mut application = pending();
        let now = Utc::now();
        apply_employer_transition(&mut application, Reviewing, Some("Call Monday".into()), now)
            .unwrap();
        assert_eq!(application.reviewed_at, Some(now));
        apply_employer_transition(&mut application, Shortlisted, Some("  ".into()), now).unwrap();
        assert_eq!(application.employer_notes.as_deref(), Some("Call Monday"));
    }

    #[test]
    fn test_ladder_only_moves_forward() {
        assert!(check_employer_transition(Pending, Interview).is_ok());
        assert!(check_employer_transition(Shortlisted, Shortlisted).is_ok());
        assert_eq!(
            check_employer_transition(Interview, Reviewing),
            Err(TransitionError::Backward { from: Interview, to: Reviewing })
        );
    }

    #[test]
    fn test_reject_from_any_open_state() {
        for from in [Pending, Reviewing, Shortlisted, Interview] {
            assert!(check_employer_transition(from, Rejected).is_ok(), "{from}");
        }
    }

    #[test]
    fn test_final_states_are_closed() {
        for from in [Accepted, Rejected, Withdrawn] {
            assert_eq!(
                check_employer_transition(from, Reviewing),
                Err(TransitionError::Closed(from))
            );
        }
    }

    #[test]
    fn test_employer_cannot_withdraw() {
        assert_eq!(
            check_employer_transition(Pending, Withdrawn),
            Err(TransitionError::EmployerWithdrawal)
        );
    }

    #[test]
    fn test_withdrawal_only_from_pending() {
        let now = Utc::now();
        let mut application = pending();
        apply_withdrawal(&mut application, now).unwrap();
        assert_eq!(application.status, Withdrawn);
        assert_eq!(application.withdrawn_at, Some(now));

        let mut reviewed = pending();
        reviewed.status = Reviewing;
        assert_eq!(apply_withdrawal(&mut reviewed, now), Err(TransitionError::NotWithdrawable));
    }
}
