use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{admin, catalog, exercises, health, progress, trials};
use crate::state::AppState;

/// Room for the non-audio multipart fields and boundaries
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}

/// Trial submission and history
pub fn trial_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/trials",
            post(trials::submit_trial)
                .get(trials::list_trials)
                .layer(DefaultBodyLimit::max(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES))),
        )
        .route("/receptive/answers", post(trials::submit_receptive_answer))
}

/// Progress reads
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(progress::get_all_progress))
        .route("/progress/:module", get(progress::get_module_progress))
        .route("/patients/:user_id/progress", get(progress::get_patient_progress))
}

/// Exercise catalog
pub fn exercise_routes() -> Router<AppState> {
    Router::new()
        .route("/exercises/:module/:level", get(exercises::list_exercises))
        .route("/articulation/sounds", get(exercises::list_sounds))
}

/// Therapist exercise management
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/catalog/exercises",
            get(catalog::list_catalog)
                .post(catalog::create_exercise)
                .delete(catalog::delete_all_exercises),
        )
        .route(
            "/catalog/exercises/:exercise_id",
            put(catalog::update_exercise).delete(catalog::delete_exercise),
        )
        .route("/catalog/exercises/:exercise_id/toggle", put(catalog::toggle_exercise))
        .route("/catalog/seed", post(catalog::seed_exercises))
}

/// Admin-only maintenance
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/users/:user_id/data", delete(admin::delete_user_data))
}

/// Create all routes
pub fn create_routes(max_upload_bytes: usize) -> Router<AppState> {
    let api_v1 = Router::new()
        .merge(trial_routes(max_upload_bytes))
        .merge(progress_routes())
        .merge(exercise_routes())
        .merge(catalog_routes())
        .merge(admin_routes());

    Router::new()
        .merge(health_routes())
        .nest("/api/v1", api_v1)
}
