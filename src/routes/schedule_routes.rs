// src/routes/schedule_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState},
    routes::{appointment_routes::load_booked, shift_minutes},
    scheduling::{DurationOption, ProposedBooking, SchedulingError, Slot, WorkingHoursConfig},
};

const DEFAULT_SEARCH_DAYS: u32 = 14;
const MAX_SEARCH_DAYS: u32 = 60;
const MINUTES_PER_DAY: i64 = 24 * 60;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule/working_hours", get(get_working_hours))
        .route("/schedule/durations", get(get_durations))
        .route("/schedule/slots", get(get_slots))
        .route("/schedule/next_available", get(get_next_available))
        .route("/schedule/availability", get(get_availability))
}

async fn ensure_dentist(state: &AppState, dentist_id: Uuid) -> Result<(), ApiError> {
    let found: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT dentist_id
        FROM dentist
        WHERE dentist_id = $1
        "#,
    )
    .bind(dentist_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    found.map(|_| ()).ok_or_else(|| ApiError::not_found("dentist"))
}

/// Longest visit; anything stored that far before a window can reach into it.
fn lookback_minutes(state: &AppState) -> i64 {
    i64::from(state.policy.durations().longest())
}

/* ============================================================
   GET /schedule/working_hours
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct WorkingHoursData {
    pub hours: WorkingHoursConfig,
    pub slot_granularity: String,
}

pub async fn get_working_hours(
    State(state): State<AppState>,
) -> Json<ApiOk<WorkingHoursData>> {
    let config = state.policy.config();
    Json(ApiOk {
        data: WorkingHoursData {
            hours: config.working_hours.to_config(),
            slot_granularity: config.granularity.to_string(),
        },
    })
}

/* ============================================================
   GET /schedule/durations
   ============================================================ */

pub async fn get_durations(State(state): State<AppState>) -> Json<ApiOk<Vec<DurationOption>>> {
    Json(ApiOk {
        data: state.policy.durations().options(),
    })
}

/* ============================================================
   GET /schedule/slots
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub dentist_id: Option<Uuid>,
}

pub async fn get_slots(
    State(state): State<AppState>,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<ApiOk<Vec<Slot>>>, ApiError> {
    let duration = state.policy.durations().validate(q.duration_minutes)?;

    let Some(dentist_id) = q.dentist_id else {
        let slots: Vec<Slot> = state.policy.slot_generator().slots(q.date, duration).collect();
        return Ok(Json(ApiOk { data: slots }));
    };

    let day_start = q.date.and_time(NaiveTime::MIN);
    let window_start = shift_minutes(day_start, -lookback_minutes(&state))?;
    let window_end = shift_minutes(day_start, MINUTES_PER_DAY)?;

    ensure_dentist(&state, dentist_id).await?;
    let existing = load_booked(&state.db, dentist_id, window_start, window_end).await?;

    let slots = state
        .policy
        .available_slots(dentist_id, q.date, duration, &existing)?;
    Ok(Json(ApiOk { data: slots }))
}

/* ============================================================
   GET /schedule/next_available
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct NextAvailableQuery {
    pub dentist_id: Uuid,
    pub from: NaiveDateTime,
    pub duration_minutes: u32,
    pub search_days: Option<u32>,
}

pub async fn get_next_available(
    State(state): State<AppState>,
    Query(q): Query<NextAvailableQuery>,
) -> Result<Json<ApiOk<Option<Slot>>>, ApiError> {
    let duration = state.policy.durations().validate(q.duration_minutes)?;
    let search_days = q.search_days.unwrap_or(DEFAULT_SEARCH_DAYS);
    if search_days == 0 || search_days > MAX_SEARCH_DAYS {
        return Err(ApiError::validation(format!(
            "search_days must be between 1 and {MAX_SEARCH_DAYS}"
        )));
    }

    let day_start = q.from.date().and_time(NaiveTime::MIN);
    let window_start = shift_minutes(day_start, -lookback_minutes(&state))?;
    let window_end = shift_minutes(day_start, i64::from(search_days) * MINUTES_PER_DAY)?;

    ensure_dentist(&state, q.dentist_id).await?;
    let existing = load_booked(&state.db, q.dentist_id, window_start, window_end).await?;

    let slot = state
        .policy
        .next_available(q.dentist_id, q.from, duration, &existing, search_days)?;

    if slot.is_none() {
        tracing::debug!(dentist_id = %q.dentist_id, search_days, "no free slot in window");
    }

    Ok(Json(ApiOk { data: slot }))
}

/* ============================================================
   GET /schedule/availability
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub dentist_id: Uuid,
    pub start_at: NaiveDateTime,
    pub duration_minutes: u32,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityData {
    pub available: bool,
    pub code: Option<&'static str>,
    pub reason: Option<String>,
}

impl From<Result<(), SchedulingError>> for AvailabilityData {
    fn from(outcome: Result<(), SchedulingError>) -> Self {
        match outcome {
            Ok(()) => AvailabilityData {
                available: true,
                code: None,
                reason: None,
            },
            Err(e) => AvailabilityData {
                available: false,
                code: Some(e.code()),
                reason: Some(e.to_string()),
            },
        }
    }
}

/// Answers whether a booking would be accepted, without booking it.
pub async fn get_availability(
    State(state): State<AppState>,
    Query(q): Query<AvailabilityQuery>,
) -> Result<Json<ApiOk<AvailabilityData>>, ApiError> {
    let proposed = ProposedBooking::new(q.dentist_id, q.start_at, q.duration_minutes);

    if let Err(e) = state.policy.check_hours(&proposed) {
        return Ok(Json(ApiOk { data: Err::<(), _>(e).into() }));
    }

    let window_start = shift_minutes(proposed.start_at, -lookback_minutes(&state))?;

    ensure_dentist(&state, q.dentist_id).await?;
    let existing =
        load_booked(&state.db, q.dentist_id, window_start, proposed.end_at()).await?;

    Ok(Json(ApiOk {
        data: state.policy.validate(&proposed, &existing).into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{get, offline_app};

    #[tokio::test]
    async fn slots_without_dentist_follow_working_hours() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/slots?date=2024-06-03&duration_minutes=30",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let starts: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["start"].as_str().unwrap())
            .collect();
        assert_eq!(
            starts,
            vec![
                "08:00:00", "09:00:00", "10:00:00", "11:00:00", "13:00:00", "14:00:00",
                "15:00:00", "16:00:00", "17:00:00",
            ]
        );
        assert_eq!(body["data"][0]["end"], "08:30:00");
    }

    #[tokio::test]
    async fn sunday_has_no_slots() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/slots?date=2024-06-09&duration_minutes=60",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn slots_reject_unknown_duration() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/slots?date=2024-06-03&duration_minutes=45",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_DURATION");
    }

    #[tokio::test]
    async fn durations_are_listed_with_labels() {
        let (status, body) = get(offline_app(), "/api/v1/schedule/durations").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!([
                { "minutes": 20, "label": "20 minutes" },
                { "minutes": 30, "label": "30 minutes" },
                { "minutes": 60, "label": "1 hour" },
                { "minutes": 120, "label": "2 hours" },
                { "minutes": 180, "label": "3 hours" },
            ])
        );
    }

    #[tokio::test]
    async fn working_hours_report_default_calendar() {
        let (status, body) = get(offline_app(), "/api/v1/schedule/working_hours").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["slot_granularity"], "60");
        assert_eq!(
            body["data"]["hours"]["monday"],
            json!([
                { "open": "08:00", "close": "12:00" },
                { "open": "13:00", "close": "18:00" },
            ])
        );
        assert_eq!(body["data"]["hours"]["sunday"], json!([]));
    }

    #[tokio::test]
    async fn availability_reports_closed_period_without_lookup() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/availability?dentist_id=5b0e5e2c-6f43-4f7e-9d0c-2f6f7d7b8c01\
             &start_at=2024-06-03T12:00:00&duration_minutes=30",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["available"], false);
        assert_eq!(body["data"]["code"], "CLOSED_PERIOD");
    }

    #[tokio::test]
    async fn next_available_rejects_oversized_window() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/next_available?dentist_id=5b0e5e2c-6f43-4f7e-9d0c-2f6f7d7b8c01\
             &from=2024-06-03T08:00:00&duration_minutes=60&search_days=365",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn availability_at_the_end_of_the_calendar_is_closed() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/availability?dentist_id=5b0e5e2c-6f43-4f7e-9d0c-2f6f7d7b8c01\
             &start_at=%2B262142-12-31T23:30:00&duration_minutes=60",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["available"], false);
        assert_eq!(body["data"]["code"], "CLOSED_PERIOD");
    }

    #[tokio::test]
    async fn next_available_past_the_calendar_is_a_validation_error() {
        let (status, body) = get(
            offline_app(),
            "/api/v1/schedule/next_available?dentist_id=5b0e5e2c-6f43-4f7e-9d0c-2f6f7d7b8c01\
             &from=%2B262142-12-31T08:00:00&duration_minutes=60",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
