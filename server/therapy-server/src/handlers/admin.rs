use axum::{
    extract::{Path, State},
    Json,
};
use therapy_progress::DeletionSummary;
use tracing::info;

use crate::auth::{AuthContext, Role};
use crate::error::{api_success, ApiResponse, ApiResult};
use crate::state::AppState;

/// Erase every progress record and trial of a user
pub async fn delete_user_data(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> ApiResult<Json<ApiResponse<DeletionSummary>>> {
    auth.require_role(Role::Admin)?;

    let summary = state.therapy.delete_user_data(&user_id).await?;
    info!(
        admin_id = %auth.user_id,
        user_id = %user_id,
        progress_records = summary.progress_records,
        trials = summary.trials,
        "Admin deleted user therapy data"
    );

    Ok(Json(api_success(summary)))
}
