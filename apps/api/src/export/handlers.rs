use std::collections::HashMap;

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use crate::auth::guard::AuthUser;
use crate::errors::AppError;
use crate::export::sheets::{applications_sheet, jobs_sheet, users_sheet, write_workbook, Sheet};
use crate::models::job::{Job, JobId};
use crate::models::user::{User, UserId};
use crate::state::AppState;
use crate::store::Store;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Users,
    Jobs,
    Applications,
    All,
}

impl ExportKind {
    pub fn file_prefix(self) -> &'static str {
        match self {
            ExportKind::Users => "users",
            ExportKind::Jobs => "jobs",
            ExportKind::Applications => "applications",
            ExportKind::All => "all_data",
        }
    }

    pub fn file_name(self, millis: i64) -> String {
        format!("{}_export_{millis}.xlsx", self.file_prefix())
    }
}

async fn users_by_id(store: &dyn Store) -> Result<(Vec<User>, HashMap<UserId, User>), AppError> {
    let users = store.all_users().await?;
    let by_id = users.iter().map(|u| (u.id, u.clone())).collect();
    Ok((users, by_id))
}

/// Loads everything `kind` needs and flattens it into sheets.
async fn build_sheets(store: &dyn Store, kind: ExportKind) -> Result<Vec<Sheet>, AppError> {
    let (users, users_by_id) = users_by_id(store).await?;
    let mut sheets = Vec::new();

    if matches!(kind, ExportKind::Users | ExportKind::All) {
        sheets.push(users_sheet(&users));
    }
    if matches!(kind, ExportKind::Jobs | ExportKind::All | ExportKind::Applications) {
        let jobs = store.all_jobs().await?;
        if kind != ExportKind::Applications {
            sheets.push(jobs_sheet(&jobs, &users_by_id));
        }
        if kind != ExportKind::Jobs {
            let jobs_by_id: HashMap<JobId, Job> = jobs.into_iter().map(|j| (j.id, j)).collect();
            let applications = store.all_applications().await?;
            sheets.push(applications_sheet(&applications, &jobs_by_id, &users_by_id));
        }
    }
    Ok(sheets)
}

async fn export(state: &AppState, user: &AuthUser, kind: ExportKind) -> Result<impl IntoResponse, AppError> {
    let sheets = build_sheets(state.store.as_ref(), kind).await?;
    let rows: usize = sheets.iter().map(|s| s.rows.len()).sum();

    let bytes = tokio::task::spawn_blocking(move || write_workbook(&sheets))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)?;

    let file_name = kind.file_name(Utc::now().timestamp_millis());
    info!(user_id = %user.id(), file = %file_name, rows, "Export generated");

    Ok((
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename={file_name}")),
        ],
        bytes,
    ))
}

/// GET /api/export/users
pub async fn export_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    export(&state, &user, ExportKind::Users).await
}

/// GET /api/export/jobs
pub async fn export_jobs(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    export(&state, &user, ExportKind::Jobs).await
}

/// GET /api/export/applications
pub async fn export_applications(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    export(&state, &user, ExportKind::Applications).await
}

/// GET /api/export/all
pub async fn export_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    export(&state, &user, ExportKind::All).await
}
