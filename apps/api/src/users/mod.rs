//! Account endpoints beyond sign-in: CV files, public profiles, settings,
//! student search and dashboards.

pub mod cv_storage;
pub mod handlers;
pub mod recommend;
