use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use super::status::AppointmentStatus;

/// Recoverable, user-facing scheduling failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error("{minutes} minutes is not an allowed consultation duration")]
    InvalidDuration { minutes: u32 },

    #[error("cannot change appointment status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("dentist already has appointment {appointment_id} from {start_at} to {end_at}")]
    SchedulingConflict {
        appointment_id: Uuid,
        start_at: NaiveDateTime,
        end_at: NaiveDateTime,
    },

    #[error("the clinic is closed between {start_at} and {end_at}")]
    ClosedPeriod {
        start_at: NaiveDateTime,
        end_at: NaiveDateTime,
    },
}

impl SchedulingError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulingError::InvalidDuration { .. } => "INVALID_DURATION",
            SchedulingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            SchedulingError::SchedulingConflict { .. } => "SCHEDULING_CONFLICT",
            SchedulingError::ClosedPeriod { .. } => "CLOSED_PERIOD",
        }
    }
}
