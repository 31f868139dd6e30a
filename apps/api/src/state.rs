use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenKeys;
use crate::config::Config;
use crate::store::Store;
use crate::users::cv_storage::CvStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres or in-memory, chosen by `STORAGE_BACKEND`.
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub tokens: TokenKeys,
    pub passwords: PasswordHasher,
    pub cvs: CvStorage,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        AppState {
            store,
            tokens: TokenKeys::new(&config.jwt_secret, config.jwt_expire_hours),
            passwords: PasswordHasher::new(config.bcrypt_cost),
            cvs: CvStorage::new(&config.upload_dir, config.max_file_size),
            config,
        }
    }
}
