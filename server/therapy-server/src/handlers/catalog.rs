//! Therapist-facing exercise management
//!
//! Every route here requires a therapist or admin token; wiping a whole
//! module requires admin.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use therapy_progress::{ExerciseDefinition, ExerciseUpdate, ModuleKey, ModuleType};
use tracing::info;
use validator::Validate;

use crate::auth::{AuthContext, Role};
use crate::error::{api_success, ApiResponse, ApiResult};
use crate::handlers::module_key;
use crate::state::AppState;

/// `?module=` filter on catalog-wide routes
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub module: Option<String>,
}

impl CatalogQuery {
    fn module_type(&self) -> ApiResult<Option<ModuleType>> {
        Ok(self.module.as_deref().map(str::parse::<ModuleType>).transpose()?)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExerciseRequest {
    #[validate(length(min = 1, max = 64, message = "exercise_id must be 1-64 characters"))]
    pub exercise_id: String,
    pub module: String,
    pub sub_mode: Option<String>,
    #[validate(range(min = 1, message = "level starts at 1"))]
    pub level: u32,
    pub item_index: u32,
    /// Defaults to `item_index + 1`
    pub order: Option<u32>,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub instruction: String,
    #[validate(length(min = 1, max = 1000, message = "target must be 1-1000 characters"))]
    pub target: String,
    #[serde(default)]
    pub expected_keywords: Vec<String>,
    pub min_words: Option<u32>,
    pub active: Option<bool>,
}

impl CreateExerciseRequest {
    fn into_definition(self, module: ModuleKey) -> ExerciseDefinition {
        ExerciseDefinition {
            exercise_id: self.exercise_id,
            module,
            level: self.level,
            item_index: self.item_index,
            order: self.order.unwrap_or(self.item_index + 1),
            instruction: self.instruction,
            target: self.target,
            expected_keywords: self.expected_keywords,
            min_words: self.min_words,
            active: self.active.unwrap_or(true),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExerciseRequest {
    #[validate(range(min = 1, message = "level starts at 1"))]
    pub level: Option<u32>,
    pub item_index: Option<u32>,
    pub order: Option<u32>,
    #[validate(length(max = 500))]
    pub instruction: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "target must be 1-1000 characters"))]
    pub target: Option<String>,
    pub expected_keywords: Option<Vec<String>>,
    pub min_words: Option<u32>,
    pub active: Option<bool>,
}

impl From<UpdateExerciseRequest> for ExerciseUpdate {
    fn from(request: UpdateExerciseRequest) -> Self {
        ExerciseUpdate {
            level: request.level,
            item_index: request.item_index,
            order: request.order,
            instruction: request.instruction,
            target: request.target,
            expected_keywords: request.expected_keywords,
            min_words: request.min_words,
            active: request.active,
        }
    }
}

/// Result of a bulk catalog operation
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogChange {
    pub module: Option<ModuleType>,
    pub count: u64,
}

/// Every exercise, active or not, optionally of one module type
pub async fn list_catalog(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ExerciseDefinition>>>> {
    auth.require_staff()?;
    Ok(Json(api_success(state.exercises.list(query.module_type()?))))
}

pub async fn create_exercise(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateExerciseRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ExerciseDefinition>>)> {
    auth.require_staff()?;
    request.validate()?;

    let module = module_key(&request.module, request.sub_mode.as_deref())?;
    let created = state.exercises.create(request.into_definition(module)).await?;
    info!(staff_id = %auth.user_id, exercise_id = %created.exercise_id, "Catalog exercise created");

    Ok((StatusCode::CREATED, Json(api_success(created))))
}

pub async fn update_exercise(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(exercise_id): Path<String>,
    Json(request): Json<UpdateExerciseRequest>,
) -> ApiResult<Json<ApiResponse<ExerciseDefinition>>> {
    auth.require_staff()?;
    request.validate()?;

    let updated = state.exercises.update(&exercise_id, request.into()).await?;
    info!(staff_id = %auth.user_id, exercise_id = %exercise_id, "Catalog exercise updated");

    Ok(Json(api_success(updated)))
}

/// Show or hide an exercise for patients
pub async fn toggle_exercise(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(exercise_id): Path<String>,
) -> ApiResult<Json<ApiResponse<ExerciseDefinition>>> {
    auth.require_staff()?;

    let toggled = state.exercises.toggle_active(&exercise_id).await?;
    info!(staff_id = %auth.user_id, exercise_id = %exercise_id, active = toggled.active, "Catalog exercise toggled");

    Ok(Json(api_success(toggled)))
}

/// Remove one exercise. Progress already recorded against its slot is kept.
pub async fn delete_exercise(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(exercise_id): Path<String>,
) -> ApiResult<Json<ApiResponse<ExerciseDefinition>>> {
    auth.require_staff()?;

    let removed = state.exercises.delete(&exercise_id).await?;
    info!(staff_id = %auth.user_id, exercise_id = %exercise_id, "Catalog exercise deleted");

    Ok(Json(api_success(removed)))
}

pub async fn delete_all_exercises(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<ApiResponse<CatalogChange>>> {
    auth.require_role(Role::Admin)?;

    let module = query.module_type()?;
    let count = state.exercises.delete_all(module).await?;
    info!(admin_id = %auth.user_id, removed = count, "Catalog exercises deleted");

    Ok(Json(api_success(CatalogChange { module, count })))
}

/// Put back built-in exercises whose id and slot are free
pub async fn seed_exercises(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<ApiResponse<CatalogChange>>> {
    auth.require_staff()?;

    let module = query.module_type()?;
    let count = state.exercises.seed_defaults(module).await?;
    info!(staff_id = %auth.user_id, inserted = count, "Built-in exercises restored");

    Ok(Json(api_success(CatalogChange { module, count })))
}
