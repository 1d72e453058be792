// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, OkData},
    routes::{clean_text, deserialize_double_option},
    scheduling::AppointmentStatus,
};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub name: String,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

const PATIENT_COLUMNS: &str = "patient_id, name, cpf, phone, email, birth_date, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(search_patients).post(create_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
}

/// Strips punctuation from a CPF; blank becomes `None`, anything but 11
/// digits is rejected.
fn normalize_cpf(raw: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(raw) = clean_text(raw) else {
        return Ok(None);
    };
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let only_format_chars = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | ' '));

    if digits.len() != 11 || !only_format_chars {
        return Err(ApiError::validation("cpf must have 11 digits"));
    }
    Ok(Some(digits))
}

fn validate_birth_date(date: Option<NaiveDate>) -> Result<(), ApiError> {
    match date {
        Some(d) if d > chrono::Local::now().date_naive() => {
            Err(ApiError::validation("birth_date cannot be in the future"))
        }
        _ => Ok(()),
    }
}

/* ============================================================
   GET /patients
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn search_patients(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientRow>>>, ApiError> {
    let query = q.query.unwrap_or_default().trim().to_string();

    if query.is_empty() {
        // default: most recent
        let sql = format!(
            r#"
            SELECT {PATIENT_COLUMNS}
            FROM patient
            ORDER BY created_at DESC
            LIMIT 50
            "#
        );
        let rows: Vec<PatientRow> = sqlx::query_as::<_, PatientRow>(&sql)
            .fetch_all(&state.db)
            .await
            .map_err(ApiError::db)?;
        return Ok(Json(ApiOk { data: rows }));
    }

    let like = format!("%{query}%");
    let digits: String = query.chars().filter(char::is_ascii_digit).collect();
    let sql = format!(
        r#"
        SELECT {PATIENT_COLUMNS}
        FROM patient
        WHERE name ILIKE $1
           OR ($2 <> '' AND cpf LIKE $2 || '%')
        ORDER BY name ASC
        LIMIT 50
        "#
    );
    let rows: Vec<PatientRow> = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(like)
        .bind(digits)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /patients/{id}
   ============================================================ */

pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_id = $1");
    let row: PatientRow = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(patient_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   POST /patients
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

pub async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<ApiOk<PatientRow>>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let cpf = normalize_cpf(req.cpf)?;
    validate_birth_date(req.birth_date)?;

    let sql = format!(
        r#"
        INSERT INTO patient (name, cpf, phone, email, birth_date)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING {PATIENT_COLUMNS}
        "#
    );
    let row: PatientRow = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(name)
        .bind(cpf)
        .bind(clean_text(req.phone))
        .bind(clean_text(req.email))
        .bind(req.birth_date)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;

    tracing::info!(patient_id = %row.patient_id, "patient created");
    Ok((StatusCode::CREATED, Json(ApiOk { data: row })))
}

/* ============================================================
   PATCH /patients/{id}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub cpf: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
}

pub async fn update_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<PatientRow>>, ApiError> {
    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("name cannot be empty")),
        other => other.map(str::to_string),
    };

    let cpf_set = req.cpf.is_some();
    let cpf = normalize_cpf(req.cpf.flatten())?;
    let birth_set = req.birth_date.is_some();
    let birth_date = req.birth_date.flatten();
    validate_birth_date(birth_date)?;

    let sql = format!(
        r#"
        UPDATE patient
        SET name       = COALESCE($2, name),
            cpf        = CASE WHEN $3 THEN $4 ELSE cpf END,
            phone      = CASE WHEN $5 THEN $6 ELSE phone END,
            email      = CASE WHEN $7 THEN $8 ELSE email END,
            birth_date = CASE WHEN $9 THEN $10 ELSE birth_date END
        WHERE patient_id = $1
        RETURNING {PATIENT_COLUMNS}
        "#
    );
    let row: PatientRow = sqlx::query_as::<_, PatientRow>(&sql)
        .bind(patient_id)
        .bind(name)
        .bind(cpf_set)
        .bind(cpf)
        .bind(req.phone.is_some())
        .bind(clean_text(req.phone.flatten()))
        .bind(req.email.is_some())
        .bind(clean_text(req.email.flatten()))
        .bind(birth_set)
        .bind(birth_date)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("patient"))?;

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   DELETE /patients/{id}
   ============================================================ */

/// Deletes the patient. Their appointments stay on record without a patient;
/// the ones still scheduled or confirmed are cancelled so the time frees up.
pub async fn delete_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let cancelled = sqlx::query(
        r#"
        UPDATE appointment
        SET status = $2,
            updated_at = now()
        WHERE patient_id = $1
          AND status IN ($3, $4)
        "#,
    )
    .bind(patient_id)
    .bind(AppointmentStatus::Cancelled)
    .bind(AppointmentStatus::Scheduled)
    .bind(AppointmentStatus::Confirmed)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db)?
    .rows_affected();

    let result = sqlx::query(r#"DELETE FROM patient WHERE patient_id = $1"#)
        .bind(patient_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("patient"));
    }

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%patient_id, cancelled, "patient deleted");
    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{offline_app, post_json};

    #[test]
    fn cpf_is_reduced_to_digits() {
        assert_eq!(
            normalize_cpf(Some("123.456.789-09".into())).unwrap(),
            Some("12345678909".to_string())
        );
        assert_eq!(normalize_cpf(Some("  ".into())).unwrap(), None);
        assert_eq!(normalize_cpf(None).unwrap(), None);
        assert!(normalize_cpf(Some("123.456".into())).is_err());
        assert!(normalize_cpf(Some("123a456b789c09".into())).is_err());
    }

    #[tokio::test]
    async fn create_rejects_malformed_cpf() {
        let (status, body) = post_json(
            offline_app(),
            "/api/v1/patients",
            json!({ "name": "Maria Lima", "cpf": "999" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn create_requires_name() {
        let (status, _) = post_json(offline_app(), "/api/v1/patients", json!({ "name": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
