use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::scheduling::{Appointment, AppointmentStatus, BookingPolicy};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub policy: Arc<BookingPolicy>,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct PersonBrief {
    pub id: Uuid,
    pub display: String,
}

/* -------------------------
   DB Row Models
--------------------------*/

/// Columns the scheduler needs for conflict checks.
#[derive(Debug, Clone, FromRow)]
pub struct BookedRow {
    pub appointment_id: Uuid,
    pub dentist_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl From<BookedRow> for Appointment {
    fn from(r: BookedRow) -> Self {
        Appointment {
            appointment_id: r.appointment_id,
            dentist_id: r.dentist_id,
            patient_id: r.patient_id,
            start_at: r.start_at,
            // CHECK constraint keeps this in the catalog
            duration_minutes: u32::try_from(r.duration_minutes).unwrap_or(0),
            status: r.status,
            notes: r.notes,
        }
    }
}

/// Appointment joined with patient and dentist names. Patient columns are
/// `None` when the patient was deleted.
#[derive(Debug, Clone, FromRow)]
pub struct AppointmentDetailRow {
    pub appointment_id: Uuid,
    pub start_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub dentist_id: Uuid,
    pub dentist_name: String,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub appointment_id: Uuid,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub duration_label: String,
    pub status: AppointmentStatus,
    pub allowed_transitions: Vec<AppointmentStatus>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub patient: Option<PersonBrief>,
    pub dentist: PersonBrief,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentDetailRow> for AppointmentDto {
    fn from(r: AppointmentDetailRow) -> Self {
        AppointmentDto {
            appointment_id: r.appointment_id,
            start_at: r.start_at,
            end_at: r
                .start_at
                .checked_add_signed(Duration::minutes(i64::from(r.duration_minutes)))
                .unwrap_or(NaiveDateTime::MAX),
            duration_minutes: r.duration_minutes,
            duration_label: duration_label(r.duration_minutes),
            status: r.status,
            allowed_transitions: r.status.allowed_transitions().to_vec(),
            description: r.description,
            notes: r.notes,
            patient: r.patient_id.map(|id| PersonBrief {
                id,
                display: r.patient_name.unwrap_or_default(),
            }),
            dentist: PersonBrief {
                id: r.dentist_id,
                display: r.dentist_name,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/* -------------------------
   Helpers
--------------------------*/

/// "1 hour", "2 hours", "20 minutes"; falls back to "<n> min" for legacy rows.
pub fn duration_label(minutes: i32) -> String {
    u32::try_from(minutes)
        .ok()
        .and_then(|m| crate::scheduling::DurationCatalog::standard().label(m).ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{minutes} min"))
}
