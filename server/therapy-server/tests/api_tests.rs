//! Router-level tests against in-memory storage and stub assessors
//!
//! Tokens are minted here with the same shared secret the app verifies with.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use speech_assessment::{
    providers::unconfigured::UnconfiguredProvider, sub_scores, AssessmentFailure, AssessmentProvider,
    AssessmentResult, AssessmentResultOf,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use therapy_progress::{
    ExerciseLibrary, InMemoryCatalog, InMemoryExerciseStore, InMemoryProgressStore, InMemoryTrialLog, TherapyService,
};
use therapy_server::{
    auth::{Claims, Role},
    create_app, AppState, ServerConfig,
};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret-integration-test";
const BOUNDARY: &str = "speechcare-test-boundary";

/// Returns the same outcome for every recording
struct StubProvider {
    outcome: Result<AssessmentResult, AssessmentFailure>,
}

#[async_trait]
impl AssessmentProvider for StubProvider {
    async fn assess(&self, _audio: &[u8], _reference_text: &str) -> AssessmentResultOf<AssessmentResult> {
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

fn scored(score: f64, transcription: &str) -> Arc<dyn AssessmentProvider> {
    let sub_scores = [
        sub_scores::PRONUNCIATION,
        sub_scores::ACCURACY,
        sub_scores::COMPLETENESS,
        sub_scores::FLUENCY,
    ]
    .into_iter()
    .map(|name| (name.to_string(), score))
    .collect::<BTreeMap<_, _>>();

    Arc::new(StubProvider {
        outcome: Ok(AssessmentResult {
            sub_scores,
            transcription: transcription.to_string(),
            words: Vec::new(),
            phonemes: Vec::new(),
            audio_duration_ms: None,
            provider: "stub".to_string(),
        }),
    })
}

fn failing(failure: AssessmentFailure) -> Arc<dyn AssessmentProvider> {
    Arc::new(StubProvider { outcome: Err(failure) })
}

async fn app(provider: Arc<dyn AssessmentProvider>) -> Router {
    let catalog = Arc::new(InMemoryCatalog::default());
    let exercises = ExerciseLibrary::open(catalog.clone(), Arc::new(InMemoryExerciseStore::new()))
        .await
        .unwrap();
    let service = TherapyService::new(
        provider,
        catalog,
        Arc::new(InMemoryProgressStore::new()),
        Arc::new(InMemoryTrialLog::new()),
    );
    let config = ServerConfig::for_testing(SECRET);
    create_app(AppState::new(service, exercises, &config), &config.cors_origins)
}

fn token(user_id: &str, role: Role) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn multipart_body(fields: &[(&str, &str)], audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"trial.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn trial_request(user_token: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/trials")
        .header(header::AUTHORIZATION, format!("Bearer {user_token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(fields, b"RIFF-not-really-a-wav")))
        .unwrap()
}

fn get(uri: &str, user_token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(t) = user_token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, user_token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {user_token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn targets(body: &Value) -> Vec<&str> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["target"].as_str())
        .collect()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

const ARTICULATION_S_1_0: &[(&str, &str)] = &[
    ("module", "articulation"),
    ("sub_mode", "s"),
    ("level", "1"),
    ("item_index", "0"),
    ("reference_text", "s"),
];

#[tokio::test]
async fn test_health_reports_collaborators() {
    let app = app(scored(0.9, "s")).await;
    let (status, body) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["assessment_provider"], "stub");
    assert_eq!(body["checks"]["storage"], "memory");
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = app(scored(0.9, "s")).await;

    let (status, body) = send(&app, get("/api/v1/progress", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_type"], "authentication_error");
    assert_eq!(body["retryable"], false);
    assert!(body["error_id"].is_string());

    let (status, _) = send(&app, get("/api/v1/progress", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_articulation_trial_updates_progress() {
    let app = app(scored(0.95, "s")).await;
    let patient = token("patient-1", Role::Patient);

    let (status, body) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let outcome = &body["data"];
    assert_eq!(outcome["fallback"], false);
    assert_eq!(outcome["passed"], false, "one trial of three is not enough");
    assert!(outcome["composite_score"].as_f64().unwrap() > 0.9);
    assert_eq!(outcome["next_position"]["level"], 1);

    for _ in 0..2 {
        let (status, _) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get("/api/v1/progress/articulation?sub_mode=s", Some(&patient))).await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["data"];
    assert_eq!(view["module_type"], "articulation");
    assert_eq!(view["sub_mode"], "s");
    assert_eq!(view["levels"]["1"]["items"]["0"]["completed"], true);
    assert_eq!(view["current_level"], 2);

    let (status, body) = send(&app, get("/api/v1/trials?module=articulation", Some(&patient))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_unconfigured_provider_records_fallback() {
    let app = app(Arc::new(UnconfiguredProvider::new("no key"))).await;
    let patient = token("patient-1", Role::Patient);

    let (status, body) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fallback"], true);
    assert_eq!(body["data"]["composite_score"], 0.75);

    let (_, health) = send(&app, get("/health", None)).await;
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_no_speech_records_nothing() {
    let app = app(failing(AssessmentFailure::NoSpeechDetected)).await;
    let patient = token("patient-1", Role::Patient);

    let (status, body) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_type"], "no_speech_detected");
    assert_eq!(body["retryable"], false);

    let (_, trials) = send(&app, get("/api/v1/trials", Some(&patient))).await;
    assert_eq!(trials["data"], json!([]));
}

#[tokio::test]
async fn test_provider_outage_is_retryable_503() {
    let app = app(failing(AssessmentFailure::ServiceUnavailable("timed out".to_string()))).await;
    let patient = token("patient-1", Role::Patient);

    let (status, body) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_out_of_range_item_is_rejected() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);

    let fields = [
        ("module", "articulation"),
        ("sub_mode", "s"),
        ("level", "9"),
        ("item_index", "0"),
        ("reference_text", "s"),
    ];
    let (status, body) = send(&app, trial_request(&patient, &fields)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "validation_error");
}

#[tokio::test]
async fn test_receptive_answer_and_validation() {
    let app = app(scored(0.9, "")).await;
    let patient = token("patient-1", Role::Patient);

    let answer = |payload: Value| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/receptive/answers")
            .header(header::AUTHORIZATION, format!("Bearer {patient}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    };

    let (status, body) = send(&app, answer(json!({"level": 1, "item_index": 0, "correct": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["composite_score"], 1.0);
    assert_eq!(body["data"]["passed"], true);

    let (status, body) = send(&app, answer(json!({"level": 0, "item_index": 0, "correct": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["level"].is_array());
}

#[tokio::test]
async fn test_patient_visibility() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);
    let other = token("patient-2", Role::Patient);
    let therapist = token("therapist-1", Role::Therapist);

    let (status, _) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/api/v1/patients/patient-1/progress", Some(&other))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_type"], "authorization_error");

    let (status, body) = send(&app, get("/api/v1/patients/patient-1/progress", Some(&therapist))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = send(&app, get("/api/v1/progress", Some(&other))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_exercise_listing() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);

    let (status, body) = send(&app, get("/api/v1/exercises/articulation/3?sub_mode=r", Some(&patient))).await;
    assert_eq!(status, StatusCode::OK);
    let targets: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["target"].as_str())
        .collect();
    assert_eq!(targets, vec!["rabbit", "red", "run"]);

    let (status, _) = send(&app, get("/api/v1/exercises/fluency/42", Some(&patient))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_delete_cascades() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);
    let admin = token("admin-1", Role::Admin);

    let (status, _) = send(&app, trial_request(&patient, ARTICULATION_S_1_0)).await;
    assert_eq!(status, StatusCode::OK);

    let delete = |user_token: &str| {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/admin/users/patient-1/data")
            .header(header::AUTHORIZATION, format!("Bearer {user_token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete(&patient)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, delete(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["progress_records"], 1);
    assert_eq!(body["data"]["trials"], 1);

    let (_, body) = send(&app, get("/api/v1/progress", Some(&patient))).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_articulation_sounds() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);

    let (status, body) = send(&app, get("/api/v1/articulation/sounds", Some(&patient))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["k", "l", "r", "s", "th"]));
}

#[tokio::test]
async fn test_deactivated_exercise_hidden_from_patients() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);
    let therapist = token("therapist-1", Role::Therapist);
    let level = "/api/v1/exercises/articulation/3?sub_mode=r";

    let (status, body) = send(&app, json_request("PUT", "/api/v1/catalog/exercises/r-3-2/toggle", &therapist, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], false);

    let (_, body) = send(&app, get(level, Some(&patient))).await;
    assert_eq!(targets(&body), vec!["rabbit", "run"]);
    let (_, body) = send(&app, get(level, Some(&therapist))).await;
    assert_eq!(targets(&body), vec!["rabbit", "red", "run"]);

    let (status, body) = send(&app, json_request("PUT", "/api/v1/catalog/exercises/r-3-2/toggle", &therapist, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active"], true);
    let (_, body) = send(&app, get(level, Some(&patient))).await;
    assert_eq!(targets(&body), vec!["rabbit", "red", "run"]);
}

#[tokio::test]
async fn test_catalog_management_requires_staff() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);
    let therapist = token("therapist-1", Role::Therapist);

    let (status, body) = send(&app, json_request("PUT", "/api/v1/catalog/exercises/r-3-2/toggle", &patient, json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_type"], "authorization_error");

    let (status, _) = send(&app, get("/api/v1/catalog/exercises", Some(&patient))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let wipe = json_request("DELETE", "/api/v1/catalog/exercises?module=fluency", &therapist, Value::Null);
    let (status, _) = send(&app, wipe).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // nothing changed for patients
    let (_, body) = send(&app, get("/api/v1/exercises/articulation/3?sub_mode=r", Some(&patient))).await;
    assert_eq!(targets(&body), vec!["rabbit", "red", "run"]);
}

#[tokio::test]
async fn test_therapist_creates_updates_and_deletes_exercise() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);
    let therapist = token("therapist-1", Role::Therapist);
    let new_exercise = json!({
        "exercise_id": "r-3-4",
        "module": "articulation",
        "sub_mode": "R",
        "level": 3,
        "item_index": 3,
        "instruction": "Say the word clearly",
        "target": "rocket",
    });

    let (status, body) = send(&app, json_request("POST", "/api/v1/catalog/exercises", &therapist, new_exercise.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["sub_mode"], "r");
    assert_eq!(body["data"]["order"], 4);

    let (status, body) = send(&app, json_request("POST", "/api/v1/catalog/exercises", &therapist, new_exercise)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_type"], "conflict");

    let level = "/api/v1/exercises/articulation/3?sub_mode=r";
    let (_, body) = send(&app, get(level, Some(&patient))).await;
    assert_eq!(targets(&body), vec!["rabbit", "red", "run", "rocket"]);

    let edit = json!({ "target": "robot", "order": 0 });
    let (status, body) = send(&app, json_request("PUT", "/api/v1/catalog/exercises/r-3-4", &therapist, edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target"], "robot");
    let (_, body) = send(&app, get(level, Some(&patient))).await;
    assert_eq!(targets(&body), vec!["robot", "rabbit", "red", "run"]);

    let (status, _) = send(&app, json_request("DELETE", "/api/v1/catalog/exercises/r-3-4", &therapist, Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, json_request("DELETE", "/api/v1/catalog/exercises/r-3-4", &therapist, Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], "not_found");

    let (_, body) = send(&app, get(level, Some(&patient))).await;
    assert_eq!(targets(&body), vec!["rabbit", "red", "run"]);
}

#[tokio::test]
async fn test_admin_wipes_and_reseeds_module() {
    let app = app(scored(0.9, "s")).await;
    let patient = token("patient-1", Role::Patient);
    let therapist = token("therapist-1", Role::Therapist);
    let admin = token("admin-1", Role::Admin);

    let (status, body) = send(&app, json_request("DELETE", "/api/v1/catalog/exercises?module=fluency", &admin, Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 21);

    let (_, body) = send(&app, get("/api/v1/catalog/exercises?module=fluency", Some(&therapist))).await;
    assert_eq!(body["data"], json!([]));
    let (_, body) = send(&app, get("/api/v1/exercises/fluency/1", Some(&patient))).await;
    assert_eq!(body["data"], json!([]));

    let (status, body) = send(&app, json_request("POST", "/api/v1/catalog/seed?module=fluency", &therapist, Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 21);
    assert_eq!(body["data"]["module"], "fluency");

    let (_, body) = send(&app, get("/api/v1/exercises/fluency/1", Some(&patient))).await;
    assert_eq!(targets(&body), vec!["Hello", "Morning", "Welcome", "Sunshine", "Beautiful"]);
}
