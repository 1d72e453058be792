use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use tracing::debug;
use uuid::Uuid;

use super::{
    appointment::{Appointment, ProposedBooking},
    duration::DurationCatalog,
    error::SchedulingError,
    overlap,
    slots::{Slot, SlotGenerator, SlotGranularity},
    working_hours::WorkingHours,
};

/// Everything the clinic configures about its schedule, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub working_hours: WorkingHours,
    pub durations: DurationCatalog,
    pub granularity: SlotGranularity,
}

/// Booking rules applied before an appointment is written or moved.
///
/// Checks run in a fixed order: duration, opening hours, then overlap with the
/// dentist's live appointments. Callers pass the dentist's appointments for
/// the affected day and are expected to hold a lock on that dentist while the
/// check and the write happen.
#[derive(Debug, Clone, Default)]
pub struct BookingPolicy {
    config: ScheduleConfig,
}

impl BookingPolicy {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    #[allow(dead_code)]
    pub fn working_hours(&self) -> &WorkingHours {
        &self.config.working_hours
    }

    pub fn durations(&self) -> &DurationCatalog {
        &self.config.durations
    }

    pub fn slot_generator(&self) -> SlotGenerator<'_> {
        SlotGenerator::new(&self.config.working_hours, self.config.granularity)
    }

    /// Duration and opening-hours checks; needs no stored appointments.
    pub fn check_hours(&self, proposed: &ProposedBooking) -> Result<(), SchedulingError> {
        self.config.durations.validate(proposed.duration_minutes)?;

        let start = proposed.start_at;
        let Some(end) = proposed.checked_end_at() else {
            debug!(%start, "booking ends past the last representable date");
            return Err(SchedulingError::ClosedPeriod {
                start_at: start,
                end_at: NaiveDateTime::MAX,
            });
        };

        let inside = start.date() == end.date()
            && self
                .config
                .working_hours
                .contains(start.weekday(), start.time(), end.time());

        if inside {
            Ok(())
        } else {
            debug!(%start, %end, "booking falls outside working hours");
            Err(SchedulingError::ClosedPeriod {
                start_at: start,
                end_at: end,
            })
        }
    }

    pub fn validate(
        &self,
        proposed: &ProposedBooking,
        existing: &[Appointment],
    ) -> Result<(), SchedulingError> {
        self.check_hours(proposed)?;

        match overlap::find_conflict(proposed, existing) {
            Some(hit) => {
                debug!(
                    dentist_id = %proposed.dentist_id,
                    conflicting = %hit.appointment_id,
                    "booking overlaps an existing appointment"
                );
                Err(SchedulingError::SchedulingConflict {
                    appointment_id: hit.appointment_id,
                    start_at: hit.start_at,
                    end_at: hit.end_at(),
                })
            }
            None => Ok(()),
        }
    }

    /// Generated slots for `date` that the dentist can still take.
    pub fn available_slots(
        &self,
        dentist_id: Uuid,
        date: NaiveDate,
        duration_minutes: u32,
        existing: &[Appointment],
    ) -> Result<Vec<Slot>, SchedulingError> {
        self.config.durations.validate(duration_minutes)?;

        Ok(self
            .slot_generator()
            .slots(date, duration_minutes)
            .filter(|slot| {
                let proposed = ProposedBooking::new(dentist_id, slot.start_at(), duration_minutes);
                !overlap::has_conflict(&proposed, existing)
            })
            .collect())
    }

    /// First free slot starting at or after `from`, looking at most
    /// `search_days` calendar days ahead (the day of `from` included).
    pub fn next_available(
        &self,
        dentist_id: Uuid,
        from: NaiveDateTime,
        duration_minutes: u32,
        existing: &[Appointment],
        search_days: u32,
    ) -> Result<Option<Slot>, SchedulingError> {
        self.config.durations.validate(duration_minutes)?;

        let generator = self.slot_generator();
        for offset in 0..search_days {
            let Some(date) = from.date().checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };
            let found = generator
                .slots(date, duration_minutes)
                .filter(|slot| slot.start_at() >= from)
                .find(|slot| {
                    let proposed =
                        ProposedBooking::new(dentist_id, slot.start_at(), duration_minutes);
                    !overlap::has_conflict(&proposed, existing)
                });
            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }
}
