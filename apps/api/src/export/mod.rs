//! Spreadsheet export of users, jobs and applications.

pub mod handlers;
pub mod sheets;
