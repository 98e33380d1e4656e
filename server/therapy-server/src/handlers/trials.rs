//! Trial submission and history

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::Deserialize;
use therapy_progress::{Trial, TrialOutcome, TrialQuery, TrialSubmission};
use tracing::info;
use validator::Validate;

use crate::auth::AuthContext;
use crate::error::{api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::module_key;
use crate::state::AppState;

const MAX_TRIAL_PAGE: usize = 200;

/// Fields of a `multipart/form-data` trial upload
#[derive(Debug, Default)]
struct TrialUploadForm {
    audio: Option<Vec<u8>>,
    module: Option<String>,
    sub_mode: Option<String>,
    level: Option<String>,
    item_index: Option<String>,
    reference_text: Option<String>,
    expected_keywords: Option<String>,
    min_words: Option<String>,
}

impl TrialUploadForm {
    async fn read(mut multipart: Multipart, max_audio_bytes: usize) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };

            if name == "audio" {
                let bytes = field.bytes().await?;
                if bytes.len() > max_audio_bytes {
                    return Err(ApiError::PayloadTooLarge {
                        message: format!("audio is {} bytes, limit is {max_audio_bytes}", bytes.len()),
                    });
                }
                form.audio = Some(bytes.to_vec());
                continue;
            }

            let value = field.text().await?;
            let slot = match name.as_str() {
                "module" => &mut form.module,
                "sub_mode" => &mut form.sub_mode,
                "level" => &mut form.level,
                "item_index" => &mut form.item_index,
                "reference_text" => &mut form.reference_text,
                "expected_keywords" => &mut form.expected_keywords,
                "min_words" => &mut form.min_words,
                // unknown fields are ignored
                _ => continue,
            };
            *slot = Some(value);
        }

        Ok(form)
    }

    fn into_submission(self, user_id: String) -> ApiResult<TrialSubmission> {
        let module = required(self.module, "module")?;
        let module = module_key(&module, self.sub_mode.as_deref())?;

        let expected_keywords = match self.expected_keywords.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                serde_json::from_str::<Vec<String>>(raw)
                    .map_err(|_| ApiError::validation("expected_keywords must be a JSON array of strings"))?,
            ),
        };

        Ok(TrialSubmission {
            user_id,
            module,
            level: parse_number(&required(self.level, "level")?, "level")?,
            item_index: parse_number(&required(self.item_index, "item_index")?, "item_index")?,
            audio: self.audio.ok_or_else(|| ApiError::validation("audio file is required"))?,
            reference_text: self.reference_text.unwrap_or_default(),
            expected_keywords,
            min_words: self
                .min_words
                .as_deref()
                .map(|raw| parse_number(raw, "min_words"))
                .transpose()?,
        })
    }
}

fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

fn parse_number(raw: &str, field: &str) -> ApiResult<u32> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::validation(format!("{field} must be a non-negative integer")))
}

/// Upload one recorded attempt for the caller
pub async fn submit_trial(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> ApiResult<Json<ApiResponse<TrialOutcome>>> {
    let form = TrialUploadForm::read(multipart, state.max_upload_bytes).await?;
    let submission = form.into_submission(auth.user_id)?;

    let outcome = state.therapy.submit_trial(submission).await?;
    info!(
        trial_id = %outcome.trial_id,
        module = %outcome.module,
        level = outcome.level,
        item_index = outcome.item_index,
        fallback = outcome.fallback,
        passed = outcome.passed,
        "Trial recorded"
    );

    Ok(Json(api_success(outcome)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReceptiveAnswerRequest {
    #[validate(range(min = 1, message = "level starts at 1"))]
    pub level: u32,
    pub item_index: u32,
    pub correct: bool,
}

/// Record a receptive-language answer for the caller
pub async fn submit_receptive_answer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ReceptiveAnswerRequest>,
) -> ApiResult<Json<ApiResponse<TrialOutcome>>> {
    request.validate()?;

    let outcome = state
        .therapy
        .submit_receptive_answer(&auth.user_id, request.level, request.item_index, request.correct)
        .await?;

    Ok(Json(api_success(outcome)))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrialListParams {
    pub module: Option<String>,
    pub sub_mode: Option<String>,
    pub limit: Option<usize>,
}

impl TrialListParams {
    fn into_query(self) -> ApiResult<TrialQuery> {
        let module_type = self.module.as_deref().map(str::parse).transpose()?;
        let sub_mode = self
            .sub_mode
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty());
        let limit = self
            .limit
            .unwrap_or(TrialQuery::default().limit)
            .clamp(1, MAX_TRIAL_PAGE);

        Ok(TrialQuery {
            module_type,
            sub_mode,
            limit,
        })
    }
}

/// The caller's own trial history, newest first
pub async fn list_trials(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<TrialListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Trial>>>> {
    let query = params.into_query()?;
    let trials = state.therapy.list_trials(&auth.user_id, &query).await?;
    Ok(Json(api_success(trials)))
}
