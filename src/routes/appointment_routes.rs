// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, AppointmentDetailRow, AppointmentDto, BookedRow, OkData},
    routes::{clean_text, deserialize_double_option, shift_minutes},
    scheduling::{Appointment, AppointmentStatus, ProposedBooking},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(patch_appointment)
                .delete(delete_appointment),
        )
        .route("/appointments/{appointment_id}/confirm", post(confirm_appointment))
        .route("/appointments/{appointment_id}/complete", post(complete_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
}

const DETAIL_SELECT: &str = r#"
    SELECT
      a.appointment_id,
      a.start_at,
      a.duration_minutes,
      a.status,
      a.description,
      a.notes,
      a.created_at,
      a.updated_at,
      p.patient_id,
      p.name AS patient_name,
      d.dentist_id,
      d.name AS dentist_name
    FROM appointment a
    LEFT JOIN patient p ON p.patient_id = a.patient_id
    JOIN dentist d ON d.dentist_id = a.dentist_id
"#;

/* ============================================================
   Shared lookups
   ============================================================ */

pub(crate) async fn fetch_detail<'e, E>(exec: E, appointment_id: Uuid) -> Result<AppointmentDto, ApiError>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!("{DETAIL_SELECT} WHERE a.appointment_id = $1");
    let row: AppointmentDetailRow = sqlx::query_as::<_, AppointmentDetailRow>(&sql)
        .bind(appointment_id)
        .fetch_optional(exec)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    Ok(row.into())
}

/// Live (scheduled/confirmed) appointments of a dentist starting in `[from, to)`.
pub(crate) async fn load_booked<'e, E>(
    exec: E,
    dentist_id: Uuid,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<Appointment>, ApiError>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows: Vec<BookedRow> = sqlx::query_as::<_, BookedRow>(
        r#"
        SELECT appointment_id, dentist_id, patient_id, start_at, duration_minutes, status, notes
        FROM appointment
        WHERE dentist_id = $1
          AND status IN ($2, $3)
          AND start_at >= $4
          AND start_at <  $5
        ORDER BY start_at ASC
        "#,
    )
    .bind(dentist_id)
    .bind(AppointmentStatus::Scheduled)
    .bind(AppointmentStatus::Confirmed)
    .bind(from)
    .bind(to)
    .fetch_all(exec)
    .await
    .map_err(ApiError::db)?;

    Ok(rows.into_iter().map(Appointment::from).collect())
}

/// Row-locks the dentist so concurrent bookings for them serialize.
async fn lock_dentist(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    dentist_id: Uuid,
) -> Result<(), ApiError> {
    let active: bool = sqlx::query_scalar(
        r#"
        SELECT active
        FROM dentist
        WHERE dentist_id = $1
        FOR UPDATE
        "#,
    )
    .bind(dentist_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("dentist"))?;

    if !active {
        return Err(ApiError::BadRequest(
            "DENTIST_INACTIVE",
            "dentist is not taking appointments".into(),
        ));
    }
    Ok(())
}

/// Loads what could overlap `proposed`: anything starting before it ends and
/// no earlier than the longest allowed visit before it starts.
async fn conflict_candidates(
    state: &AppState,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    proposed: &ProposedBooking,
) -> Result<Vec<Appointment>, ApiError> {
    let lookback = i64::from(state.policy.durations().longest());
    load_booked(
        &mut **tx,
        proposed.dentist_id,
        shift_minutes(proposed.start_at, -lookback)?,
        proposed.end_at(),
    )
    .await
}

/* ============================================================
   GET /appointments
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub dentist_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    /// first day included
    pub from: Option<NaiveDate>,
    /// last day included
    pub to: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 500;

/// Ordered by start time; pages through `limit`/`offset`.
pub async fn list_appointments(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    if let (Some(from), Some(to)) = (q.from, q.to) {
        if to < from {
            return Err(ApiError::validation("to must not be before from"));
        }
    }

    let limit = q.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    let offset = q.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::validation("offset cannot be negative"));
    }

    let from_ts = q.from.map(|d| d.and_time(NaiveTime::MIN));
    let to_ts = q
        .to
        .map(|d| {
            d.succ_opt()
                .map(|next| next.and_time(NaiveTime::MIN))
                .ok_or_else(|| ApiError::validation("to is outside the supported range"))
        })
        .transpose()?;

    let sql = format!(
        r#"{DETAIL_SELECT}
        WHERE ($1::uuid IS NULL OR a.dentist_id = $1)
          AND ($2::uuid IS NULL OR a.patient_id = $2)
          AND ($3::timestamp IS NULL OR a.start_at >= $3)
          AND ($4::timestamp IS NULL OR a.start_at <  $4)
          AND ($5::smallint IS NULL OR a.status = $5)
        ORDER BY a.start_at ASC, a.appointment_id ASC
        LIMIT $6 OFFSET $7
        "#
    );

    let rows: Vec<AppointmentDetailRow> = sqlx::query_as::<_, AppointmentDetailRow>(&sql)
        .bind(q.dentist_id)
        .bind(q.patient_id)
        .bind(from_ts)
        .bind(to_ts)
        .bind(q.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(AppointmentDto::from).collect(),
    }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    Ok(Json(ApiOk {
        data: fetch_detail(&state.db, appointment_id).await?,
    }))
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub dentist_id: Uuid,
    pub patient_id: Uuid,
    pub start_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub description: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<AppointmentDto>>), ApiError> {
    let proposed = ProposedBooking::new(req.dentist_id, req.start_at, req.duration_minutes);

    // cheap checks first, no transaction needed
    state.policy.check_hours(&proposed)?;

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    lock_dentist(&mut tx, req.dentist_id).await?;

    let patient: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT patient_id
        FROM patient
        WHERE patient_id = $1
        "#,
    )
    .bind(req.patient_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?;
    if patient.is_none() {
        return Err(ApiError::not_found("patient"));
    }

    let existing = conflict_candidates(&state, &mut tx, &proposed).await?;
    state.policy.validate(&proposed, &existing)?;

    let appointment_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO appointment (
          dentist_id,
          patient_id,
          start_at,
          duration_minutes,
          status,
          description,
          notes
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING appointment_id
        "#,
    )
    .bind(req.dentist_id)
    .bind(req.patient_id)
    .bind(req.start_at)
    .bind(req.duration_minutes as i32)
    .bind(AppointmentStatus::INITIAL)
    .bind(clean_text(req.description))
    .bind(clean_text(req.notes))
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(
        %appointment_id,
        dentist_id = %req.dentist_id,
        start_at = %req.start_at,
        "appointment booked"
    );

    let dto = fetch_detail(&state.db, appointment_id).await?;
    Ok((StatusCode::CREATED, Json(ApiOk { data: dto })))
}

/* ============================================================
   PATCH /appointments/{id}  (reschedule / edit text)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PatchAppointmentRequest {
    pub dentist_id: Option<Uuid>,
    pub start_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, sqlx::FromRow)]
struct CurrentRow {
    dentist_id: Uuid,
    start_at: NaiveDateTime,
    duration_minutes: i32,
    status: AppointmentStatus,
    description: Option<String>,
    notes: Option<String>,
}

impl CurrentRow {
    fn booking(&self, appointment_id: Uuid) -> ProposedBooking {
        let minutes = u32::try_from(self.duration_minutes).unwrap_or(0);
        ProposedBooking::new(self.dentist_id, self.start_at, minutes).replacing(appointment_id)
    }

    /// The booking `req` asks for, or `None` when dentist, start and duration
    /// all stay as stored. Fields echoed back unchanged do not count as a move.
    fn requested_move(
        &self,
        appointment_id: Uuid,
        req: &PatchAppointmentRequest,
    ) -> Result<Option<ProposedBooking>, ApiError> {
        let stored = self.booking(appointment_id);
        let target = ProposedBooking::new(
            req.dentist_id.unwrap_or(stored.dentist_id),
            req.start_at.unwrap_or(stored.start_at),
            req.duration_minutes.unwrap_or(stored.duration_minutes),
        )
        .replacing(appointment_id);

        if target == stored {
            return Ok(None);
        }
        if self.status.is_terminal() {
            return Err(ApiError::Conflict(
                "NOT_RESCHEDULABLE",
                format!("a {} appointment cannot be rescheduled", self.status),
            ));
        }
        Ok(Some(target))
    }
}

pub async fn patch_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<PatchAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    if let Some(minutes) = req.duration_minutes {
        state.policy.durations().validate(minutes)?;
    }

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let current: CurrentRow = sqlx::query_as::<_, CurrentRow>(
        r#"
        SELECT dentist_id, start_at, duration_minutes, status, description, notes
        FROM appointment
        WHERE appointment_id = $1
        FOR UPDATE
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    let moved = current.requested_move(appointment_id, &req)?;
    if let Some(proposed) = &moved {
        state.policy.check_hours(proposed)?;
        lock_dentist(&mut tx, proposed.dentist_id).await?;
        let existing = conflict_candidates(&state, &mut tx, proposed).await?;
        state.policy.validate(proposed, &existing)?;
    }
    let target = moved.unwrap_or_else(|| current.booking(appointment_id));

    let description = match req.description {
        None => current.description,
        Some(v) => clean_text(v),
    };
    let notes = match req.notes {
        None => current.notes,
        Some(v) => clean_text(v),
    };

    sqlx::query(
        r#"
        UPDATE appointment
        SET dentist_id = $2,
            start_at = $3,
            duration_minutes = $4,
            description = $5,
            notes = $6,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(target.dentist_id)
    .bind(target.start_at)
    .bind(target.duration_minutes as i32)
    .bind(description)
    .bind(notes)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    if moved.is_some() {
        tracing::info!(
            %appointment_id,
            dentist_id = %target.dentist_id,
            start_at = %target.start_at,
            "appointment rescheduled"
        );
    }

    Ok(Json(ApiOk {
        data: fetch_detail(&state.db, appointment_id).await?,
    }))
}

/* ============================================================
   DELETE /appointments/{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let result = sqlx::query(r#"DELETE FROM appointment WHERE appointment_id = $1"#)
        .bind(appointment_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("appointment"));
    }

    tracing::info!(%appointment_id, "appointment deleted");
    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

/* ============================================================
   Status transitions
   ============================================================ */

pub async fn confirm_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    transition(&state, appointment_id, AppointmentStatus::Confirmed).await
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    transition(&state, appointment_id, AppointmentStatus::Completed).await
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    transition(&state, appointment_id, AppointmentStatus::Cancelled).await
}

async fn transition(
    state: &AppState,
    appointment_id: Uuid,
    target: AppointmentStatus,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let current: AppointmentStatus = sqlx::query_scalar(
        r#"
        SELECT status
        FROM appointment
        WHERE appointment_id = $1
        FOR UPDATE
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("appointment"))?;

    let next = current.transition(target).inspect_err(|e| {
        tracing::warn!(%appointment_id, "rejected status change: {e}");
    })?;

    sqlx::query(
        r#"
        UPDATE appointment
        SET status = $2,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(next)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%appointment_id, from = %current, to = %next, "appointment status changed");

    Ok(Json(ApiOk {
        data: fetch_detail(&state.db, appointment_id).await?,
    }))
}
