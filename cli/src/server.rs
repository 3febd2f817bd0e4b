use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use sated_core::civil::local_date;
use sated_core::clock::Clock;
use sated_core::db::Database;
use sated_core::error::AdherenceError;
use sated_core::models::{
    CalendarDay, CompletionPayload, DailyStatus, DayDetail, Reminder, StreakSummary, User,
};
use sated_core::reminder::StatusChange;
use sated_core::service::SatedService;

const BODY_LIMIT: usize = 64 * 1024; // 64 KB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    tz: Tz,
    clock: Arc<dyn Clock>,
    api_key: Option<String>,
}

impl AppState {
    fn lock_db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct PostponeRequest {
    minutes: i64,
}

#[derive(Deserialize)]
struct StreakQuery {
    #[serde(default)]
    strict: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<AdherenceError> for ApiError {
    fn from(err: AdherenceError) -> Self {
        match err {
            AdherenceError::NotFound(_) => Self::NotFound(err.to_string()),
            AdherenceError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            AdherenceError::InvalidPayload(msg) => Self::BadRequest(msg),
            AdherenceError::UpstreamUnavailable(inner) => Self::Internal(inner),
        }
    }
}

fn parse_day(date_str: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{date_str}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.lock_db().list_users()?;
    Ok(Json(users))
}

async fn get_reminders(
    State(state): State<AppState>,
    Path((user_id, date_str)): Path<(i64, String)>,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    let day = parse_day(&date_str)?;
    let db = state.lock_db();
    let reminders = SatedService::new(&db, state.tz).reminders(user_id, day)?;
    Ok(Json(reminders))
}

async fn set_reminder_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Reminder>, ApiError> {
    let now = state.clock.now();
    let db = state.lock_db();
    let reminder = SatedService::new(&db, state.tz).set_reminder_status(id, &change, now)?;
    Ok(Json(reminder))
}

async fn complete_reminder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CompletionPayload>,
) -> Result<Json<Reminder>, ApiError> {
    let now = state.clock.now();
    let db = state.lock_db();
    let reminder = SatedService::new(&db, state.tz).complete_reminder(id, &payload, now)?;
    Ok(Json(reminder))
}

async fn postpone_reminder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<PostponeRequest>,
) -> Result<Json<Reminder>, ApiError> {
    let now = state.clock.now();
    let db = state.lock_db();
    let reminder = SatedService::new(&db, state.tz).postpone_reminder(id, body.minutes, now)?;
    Ok(Json(reminder))
}

async fn skip_reminder(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Reminder>, ApiError> {
    let now = state.clock.now();
    let db = state.lock_db();
    let reminder = SatedService::new(&db, state.tz).skip_reminder(id, now)?;
    Ok(Json(reminder))
}

async fn get_day(
    State(state): State<AppState>,
    Path((user_id, date_str)): Path<(i64, String)>,
) -> Result<Json<DayDetail>, ApiError> {
    let day = parse_day(&date_str)?;
    let db = state.lock_db();
    let detail = SatedService::new(&db, state.tz).day_detail(user_id, day)?;
    Ok(Json(detail))
}

async fn toggle_day(
    State(state): State<AppState>,
    Path((user_id, date_str)): Path<(i64, String)>,
) -> Result<Json<DailyStatus>, ApiError> {
    let day = parse_day(&date_str)?;
    let now = state.clock.now();
    let db = state.lock_db();
    let status = SatedService::new(&db, state.tz).toggle_day(user_id, day, now)?;
    Ok(Json(status))
}

async fn get_streak(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<StreakQuery>,
) -> Result<Json<StreakSummary>, ApiError> {
    let today = local_date(state.clock.now(), state.tz);
    let db = state.lock_db();
    let summary = SatedService::new(&db, state.tz).streak(user_id, today, query.strict)?;
    Ok(Json(summary))
}

async fn get_calendar(
    State(state): State<AppState>,
    Path((user_id, year, month)): Path<(i64, i32, u32)>,
) -> Result<Json<Vec<CalendarDay>>, ApiError> {
    let db = state.lock_db();
    let days = SatedService::new(&db, state.tz).calendar(user_id, year, month)?;
    Ok(Json(days))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/{user_id}/reminders/{date}", get(get_reminders))
        .route("/api/reminders/{id}/status", post(set_reminder_status))
        .route("/api/reminders/{id}/complete", post(complete_reminder))
        .route("/api/reminders/{id}/postpone", post(postpone_reminder))
        .route("/api/reminders/{id}/skip", post(skip_reminder))
        .route("/api/users/{user_id}/days/{date}", get(get_day))
        .route("/api/users/{user_id}/days/{date}/toggle", post(toggle_day))
        .route("/api/users/{user_id}/streak", get(get_streak))
        .route(
            "/api/users/{user_id}/calendar/{year}/{month}",
            get(get_calendar),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: Arc<Mutex<Database>>,
    tz: Tz,
    clock: Arc<dyn Clock>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        db,
        tz,
        clock,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        warn!("Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(
            "Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!(timezone = %tz, "Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::{DateTime, TimeZone, Utc};
    use http_body_util::BodyExt;
    use sated_core::clock::ManualClock;
    use sated_core::models::{NewFood, ReminderType};
    use sated_core::schedule::SleepAwarePlanner;
    use tower::ServiceExt;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
    }

    /// One user ("ana", id 1) with today's schedule and one food (id 1).
    fn test_state(api_key: Option<String>) -> AppState {
        let db = Database::open_in_memory().unwrap();
        let user = db.add_user("ana").unwrap();
        db.insert_food(&NewFood {
            name: "Rice".to_string(),
            calories_per_100g: 130.0,
            protein_per_100g: Some(2.7),
        })
        .unwrap();
        SatedService::new(&db, chrono_tz::UTC)
            .regenerate_day(user.id, now().date_naive(), &SleepAwarePlanner)
            .unwrap();
        AppState {
            db: Arc::new(Mutex::new(db)),
            tz: chrono_tz::UTC,
            clock: Arc::new(ManualClock::new(now())),
            api_key,
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key))
    }

    fn reminder_id(state: &AppState, ty: ReminderType) -> i64 {
        let db = state.lock_db();
        SatedService::new(&db, state.tz)
            .reminders(1, now().date_naive())
            .unwrap()
            .into_iter()
            .find(|r| r.reminder_type == ty)
            .unwrap()
            .id
    }

    fn post_json(uri: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_wrong_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users")
                    .header("Authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["name"], "ana");
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app(Some("secret".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app(None);

        let big_body = vec![b' '; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/reminders/1/complete")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::from(AdherenceError::UpstreamUnavailable(anyhow::anyhow!(
            "secret database path /home/user/.local/share/sated/sated.db"
        )));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn list_reminders_for_day() {
        let app = test_app(None);

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/1/reminders/2024-05-06")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let reminders = json.as_array().unwrap();
        assert_eq!(reminders.len(), 11);
        assert_eq!(reminders[0]["reminder_type"], "ai_morning");
        assert_eq!(reminders[0]["scheduled_time"], "07:00");
        assert_eq!(reminders[0]["status"], "pending");
    }

    #[tokio::test]
    async fn reminders_unknown_user_returns_404() {
        let app = test_app(None);
        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/99/reminders/2024-05-06")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reminders_invalid_date_returns_400() {
        let app = test_app(None);
        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/1/reminders/05-06-2024")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn complete_meal_then_repeat_conflicts() {
        let state = test_state(None);
        let id = reminder_id(&state, ReminderType::Meal);
        let app = build_router(state);

        let uri = format!("/api/reminders/{id}/complete");
        let response = app
            .clone()
            .oneshot(post_json(&uri, r#"{"food_id": 1, "amount": 250}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "completed");
        assert!(json["log_id"].is_number());

        let response = app
            .oneshot(post_json(&uri, r#"{"food_id": 1, "amount": 250}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn complete_meal_without_food_returns_400() {
        let state = test_state(None);
        let id = reminder_id(&state, ReminderType::Meal);
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                &format!("/api/reminders/{id}/complete"),
                r#"{"amount": 250}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn postpone_bounds_enforced() {
        let state = test_state(None);
        let id = reminder_id(&state, ReminderType::Water);
        let app = build_router(state);
        let uri = format!("/api/reminders/{id}/postpone");

        let response = app
            .clone()
            .oneshot(post_json(&uri, r#"{"minutes": 181}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(&uri, r#"{"minutes": 30}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "postponed");
        assert_eq!(json["delayed_until"], "2024-05-06T12:30:00Z");
    }

    #[tokio::test]
    async fn skip_then_status_change_conflicts() {
        let state = test_state(None);
        let id = reminder_id(&state, ReminderType::AiMorning);
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/reminders/{id}/skip"), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                &format!("/api/reminders/{id}/status"),
                r#"{"status": "delayed", "minutes": 10}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn status_endpoint_delays_pending_reminder() {
        let state = test_state(None);
        let id = reminder_id(&state, ReminderType::AiEvening);
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                &format!("/api/reminders/{id}/status"),
                r#"{"status": "delayed", "minutes": 15}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "delayed");
        assert_eq!(json["delayed_until"], "2024-05-06T12:15:00Z");
    }

    #[tokio::test]
    async fn unknown_reminder_returns_404() {
        let app = test_app(None);
        let response = app
            .oneshot(post_json("/api/reminders/999/skip", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn toggle_day_and_streak() {
        let app = test_app(None);

        let response = app
            .clone()
            .oneshot(post_json("/api/users/1/days/2024-05-06/toggle", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["completed"], true);
        assert_eq!(json["autodone_reason"], "manual");

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::get("/api/users/1/streak?strict=false")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["streak"], 1);
        assert_eq!(json["as_of"], "2024-05-06");

        let response = app
            .oneshot(post_json("/api/users/1/days/2024-05-07/toggle", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn day_detail_lists_intake_and_reminders() {
        let app = test_app(None);
        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/1/days/2024-05-06")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["intake"]["kcal"], 0.0);
        assert!(json["status"].is_null());
        assert_eq!(json["reminders"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn calendar_month() {
        let app = test_app(None);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::get("/api/users/1/calendar/2024/2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 29);

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/1/calendar/2024/13")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
