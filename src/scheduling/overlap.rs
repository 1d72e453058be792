use chrono::NaiveDateTime;

use super::appointment::{Appointment, ProposedBooking};

/// Half-open overlap: `[s1, e1)` and `[s2, e2)` intersect iff `s1 < e2 && s2 < e1`.
/// Back-to-back ranges (one ends when the other starts) do not overlap.
pub fn overlaps(
    s1: NaiveDateTime,
    e1: NaiveDateTime,
    s2: NaiveDateTime,
    e2: NaiveDateTime,
) -> bool {
    s1 < e2 && s2 < e1
}

/// First existing appointment that blocks `proposed`.
///
/// `existing` may hold any dentist's appointments: records for other dentists,
/// the appointment being rescheduled, and completed or cancelled visits are
/// skipped here rather than trusted to the caller.
pub fn find_conflict<'a>(
    proposed: &ProposedBooking,
    existing: &'a [Appointment],
) -> Option<&'a Appointment> {
    let start = proposed.start_at;
    let end = proposed.end_at();

    existing
        .iter()
        .filter(|a| a.dentist_id == proposed.dentist_id)
        .filter(|a| Some(a.appointment_id) != proposed.replaces)
        .filter(|a| a.status.blocks_time())
        .find(|a| overlaps(start, end, a.start_at, a.end_at()))
}

pub fn has_conflict(proposed: &ProposedBooking, existing: &[Appointment]) -> bool {
    find_conflict(proposed, existing).is_some()
}
