// src/routes/dentist_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{ApiOk, AppState, OkData},
    routes::{clean_text, deserialize_double_option},
};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DentistRow {
    pub dentist_id: Uuid,
    pub name: String,
    pub cro: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

const DENTIST_COLUMNS: &str =
    "dentist_id, name, cro, specialty, phone, email, active, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dentists", get(list_dentists).post(create_dentist))
        .route(
            "/dentists/{dentist_id}",
            get(get_dentist).patch(update_dentist).delete(delete_dentist),
        )
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

/* ============================================================
   GET /dentists
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_dentists(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<DentistRow>>>, ApiError> {
    let sql = format!(
        r#"
        SELECT {DENTIST_COLUMNS}
        FROM dentist
        WHERE ($1 = FALSE OR active)
        ORDER BY name ASC
        "#
    );
    let rows: Vec<DentistRow> = sqlx::query_as::<_, DentistRow>(&sql)
        .bind(q.active_only)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /dentists/{id}
   ============================================================ */

pub async fn get_dentist(
    State(state): State<AppState>,
    Path(dentist_id): Path<Uuid>,
) -> Result<Json<ApiOk<DentistRow>>, ApiError> {
    let sql = format!("SELECT {DENTIST_COLUMNS} FROM dentist WHERE dentist_id = $1");
    let row: DentistRow = sqlx::query_as::<_, DentistRow>(&sql)
        .bind(dentist_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("dentist"))?;

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   POST /dentists
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateDentistRequest {
    pub name: String,
    pub cro: String,
    pub specialty: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

pub async fn create_dentist(
    State(state): State<AppState>,
    Json(req): Json<CreateDentistRequest>,
) -> Result<(StatusCode, Json<ApiOk<DentistRow>>), ApiError> {
    let name = required(&req.name, "name")?;
    let cro = required(&req.cro, "cro")?;

    let sql = format!(
        r#"
        INSERT INTO dentist (name, cro, specialty, phone, email, active)
        VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING {DENTIST_COLUMNS}
        "#
    );
    let row: DentistRow = sqlx::query_as::<_, DentistRow>(&sql)
        .bind(name)
        .bind(cro)
        .bind(clean_text(req.specialty))
        .bind(clean_text(req.phone))
        .bind(clean_text(req.email))
        .bind(req.active.unwrap_or(true))
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::db)?;

    tracing::info!(dentist_id = %row.dentist_id, "dentist created");
    Ok((StatusCode::CREATED, Json(ApiOk { data: row })))
}

/* ============================================================
   PATCH /dentists/{id}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateDentistRequest {
    pub name: Option<String>,
    pub cro: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub specialty: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub email: Option<Option<String>>,
    pub active: Option<bool>,
}

pub async fn update_dentist(
    State(state): State<AppState>,
    Path(dentist_id): Path<Uuid>,
    Json(req): Json<UpdateDentistRequest>,
) -> Result<Json<ApiOk<DentistRow>>, ApiError> {
    let name = req.name.as_deref().map(|v| required(v, "name")).transpose()?;
    let cro = req.cro.as_deref().map(|v| required(v, "cro")).transpose()?;

    // boolean flags tell "leave as is" apart from "clear"
    let sql = format!(
        r#"
        UPDATE dentist
        SET name      = COALESCE($2, name),
            cro       = COALESCE($3, cro),
            specialty = CASE WHEN $4 THEN $5 ELSE specialty END,
            phone     = CASE WHEN $6 THEN $7 ELSE phone END,
            email     = CASE WHEN $8 THEN $9 ELSE email END,
            active    = COALESCE($10, active)
        WHERE dentist_id = $1
        RETURNING {DENTIST_COLUMNS}
        "#
    );
    let row: DentistRow = sqlx::query_as::<_, DentistRow>(&sql)
        .bind(dentist_id)
        .bind(name)
        .bind(cro)
        .bind(req.specialty.is_some())
        .bind(clean_text(req.specialty.flatten()))
        .bind(req.phone.is_some())
        .bind(clean_text(req.phone.flatten()))
        .bind(req.email.is_some())
        .bind(clean_text(req.email.flatten()))
        .bind(req.active)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("dentist"))?;

    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   DELETE /dentists/{id}
   ============================================================ */

/// Removes the dentist together with their appointments.
pub async fn delete_dentist(
    State(state): State<AppState>,
    Path(dentist_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let result = sqlx::query(r#"DELETE FROM dentist WHERE dentist_id = $1"#)
        .bind(dentist_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("dentist"));
    }

    tracing::info!(%dentist_id, "dentist deleted");
    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}
