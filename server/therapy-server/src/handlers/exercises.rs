use axum::{
    extract::{Path, Query, State},
    Json,
};
use therapy_progress::ExerciseDefinition;

use crate::auth::{AuthContext, Role};
use crate::error::{api_success, ApiResponse, ApiResult};
use crate::handlers::{module_key, ModuleQuery};
use crate::state::AppState;

/// Exercises of one level in display order. Inactive items are visible to
/// therapists and admins only.
pub async fn list_exercises(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((module, level)): Path<(String, u32)>,
    Query(query): Query<ModuleQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ExerciseDefinition>>>> {
    let key = module_key(&module, query.sub_mode.as_deref())?;
    let include_inactive = !auth.has_role(Role::Patient);
    let exercises = state.therapy.exercises(&key, level, include_inactive)?;
    Ok(Json(api_success(exercises)))
}

/// Target sounds that currently have articulation exercises
pub async fn list_sounds(State(state): State<AppState>, _auth: AuthContext) -> Json<ApiResponse<Vec<String>>> {
    Json(api_success(state.therapy.catalog().sounds()))
}
