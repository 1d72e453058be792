use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::AppointmentStatus;

/// The slice of an appointment record that scheduling decisions need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub dentist_id: Uuid,
    /// `None` once the patient record has been deleted.
    pub patient_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl Appointment {
    pub fn end_at(&self) -> NaiveDateTime {
        self.start_at
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
            .unwrap_or(NaiveDateTime::MAX)
    }
}

/// A booking that has not been written yet: a new appointment, or the new
/// time of an existing one being rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposedBooking {
    pub dentist_id: Uuid,
    pub start_at: NaiveDateTime,
    pub duration_minutes: u32,
    /// Appointment being moved; its current record never conflicts with itself.
    pub replaces: Option<Uuid>,
}

impl ProposedBooking {
    pub fn new(dentist_id: Uuid, start_at: NaiveDateTime, duration_minutes: u32) -> Self {
        Self {
            dentist_id,
            start_at,
            duration_minutes,
            replaces: None,
        }
    }

    pub fn replacing(mut self, appointment_id: Uuid) -> Self {
        self.replaces = Some(appointment_id);
        self
    }

    /// `None` when the end falls outside the representable calendar.
    pub fn checked_end_at(&self) -> Option<NaiveDateTime> {
        self.start_at
            .checked_add_signed(Duration::minutes(i64::from(self.duration_minutes)))
    }

    /// End of a booking that already passed `BookingPolicy::check_hours`.
    pub fn end_at(&self) -> NaiveDateTime {
        self.checked_end_at().unwrap_or(NaiveDateTime::MAX)
    }
}

impl From<&Appointment> for ProposedBooking {
    fn from(a: &Appointment) -> Self {
        ProposedBooking::new(a.dentist_id, a.start_at, a.duration_minutes)
    }
}
