use axum::{
    extract::{Path, Query, State},
    Json,
};
use therapy_progress::ProgressView;

use crate::auth::AuthContext;
use crate::error::{api_success, ApiResponse, ApiResult};
use crate::handlers::{module_key, ModuleQuery};
use crate::state::AppState;

/// Every module the caller has started
pub async fn get_all_progress(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ApiResponse<Vec<ProgressView>>>> {
    let views = state.therapy.get_all_progress(&auth.user_id).await?;
    Ok(Json(api_success(views)))
}

/// The caller's progress in one module; an unstarted module reads as level 1
pub async fn get_module_progress(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(module): Path<String>,
    Query(query): Query<ModuleQuery>,
) -> ApiResult<Json<ApiResponse<ProgressView>>> {
    let key = module_key(&module, query.sub_mode.as_deref())?;
    let view = state.therapy.get_progress(&auth.user_id, &key).await?;
    Ok(Json(api_success(view)))
}

/// Therapist view of one patient's progress
pub async fn get_patient_progress(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<ProgressView>>>> {
    auth.require_view(&user_id)?;
    let views = state.therapy.get_all_progress(&user_id).await?;
    Ok(Json(api_success(views)))
}
