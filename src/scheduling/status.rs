use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SchedulingError;

/// Appointment lifecycle, stored as smallint:
/// 0 scheduled, 1 confirmed, 2 completed, 3 cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    Confirmed = 1,
    Completed = 2,
    Cancelled = 3,
}

impl AppointmentStatus {
    #[allow(dead_code)]
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Status every new appointment starts in.
    pub const INITIAL: AppointmentStatus = AppointmentStatus::Scheduled;

    pub fn allowed_transitions(self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Scheduled => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => {
                &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Returns the new status, or `InvalidTransition` naming both ends.
    pub fn transition(self, next: AppointmentStatus) -> Result<AppointmentStatus, SchedulingError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SchedulingError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Only live bookings block the dentist's time.
    pub fn blocks_time(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_appointments_start_scheduled() {
        assert_eq!(AppointmentStatus::INITIAL, AppointmentStatus::Scheduled);
    }

    #[test]
    fn happy_path_goes_through_confirmed() {
        let confirmed = AppointmentStatus::Scheduled
            .transition(AppointmentStatus::Confirmed)
            .unwrap();
        let completed = confirmed.transition(AppointmentStatus::Completed).unwrap();
        assert_eq!(completed, AppointmentStatus::Completed);
    }

    #[test]
    fn scheduled_cannot_jump_to_completed() {
        let err = AppointmentStatus::Scheduled
            .transition(AppointmentStatus::Completed)
            .unwrap_err();
        assert_eq!(
            err,
            SchedulingError::InvalidTransition {
                from: AppointmentStatus::Scheduled,
                to: AppointmentStatus::Completed,
            }
        );
        assert_eq!(
            err.to_string(),
            "cannot change appointment status from scheduled to completed"
        );
    }

    #[test]
    fn either_live_status_can_be_cancelled() {
        for from in [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed] {
            assert_eq!(
                from.transition(AppointmentStatus::Cancelled),
                Ok(AppointmentStatus::Cancelled)
            );
        }
    }

    #[test]
    fn terminal_statuses_reject_every_transition() {
        for from in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
            assert!(from.is_terminal());
            for to in AppointmentStatus::ALL {
                assert!(
                    matches!(
                        from.transition(to),
                        Err(SchedulingError::InvalidTransition { .. })
                    ),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for s in AppointmentStatus::ALL {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn only_live_statuses_block_time() {
        assert!(AppointmentStatus::Scheduled.blocks_time());
        assert!(AppointmentStatus::Confirmed.blocks_time());
        assert!(!AppointmentStatus::Completed.blocks_time());
        assert!(!AppointmentStatus::Cancelled.blocks_time());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&AppointmentStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
        let back: AppointmentStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(back, AppointmentStatus::Cancelled);
    }
}
