//! Appointment scheduling rules: clinic hours, allowed durations, slot
//! generation, double-booking detection and the status lifecycle.
//!
//! Everything here is pure computation over caller-supplied values.

pub mod appointment;
pub mod booking;
pub mod duration;
pub mod error;
pub mod overlap;
pub mod slots;
pub mod status;
pub mod working_hours;

pub use appointment::{Appointment, ProposedBooking};
pub use booking::{BookingPolicy, ScheduleConfig};
pub use duration::{DurationCatalog, DurationOption};
pub use error::SchedulingError;
pub use slots::{Slot, SlotGranularity};
pub use status::AppointmentStatus;
pub use working_hours::{WorkingHours, WorkingHoursConfig};
