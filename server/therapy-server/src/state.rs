use std::sync::Arc;
use std::time::Instant;

use therapy_progress::{ExerciseLibrary, TherapyService};

use crate::auth::JwtVerifier;
use crate::config::ServerConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub therapy: Arc<TherapyService>,
    /// Writer for the catalog `therapy` reads from
    pub exercises: Arc<ExerciseLibrary>,
    pub jwt: Arc<JwtVerifier>,
    /// `memory` or `postgres`, reported by the health check
    pub storage_backend: &'static str,
    pub max_upload_bytes: usize,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(therapy: TherapyService, exercises: ExerciseLibrary, config: &ServerConfig) -> Self {
        Self {
            therapy: Arc::new(therapy),
            exercises: Arc::new(exercises),
            jwt: Arc::new(JwtVerifier::new(&config.jwt_secret)),
            storage_backend: config.storage.backend_name(),
            max_upload_bytes: config.max_upload_bytes,
            started_at: Instant::now(),
        }
    }
}
