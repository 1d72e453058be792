use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use super::working_hours::{OpenInterval, WorkingHours};

/// Step between consecutive candidate starts inside an open interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotGranularity {
    /// Every N minutes regardless of the booked duration.
    Fixed(u32),
    /// Back-to-back: the step equals the booked duration.
    DurationAligned,
}

impl Default for SlotGranularity {
    /// Hourly starts.
    fn default() -> Self {
        SlotGranularity::Fixed(60)
    }
}

impl SlotGranularity {
    fn step(self, duration_minutes: u32) -> u32 {
        let step = match self {
            SlotGranularity::Fixed(minutes) => minutes,
            SlotGranularity::DurationAligned => duration_minutes,
        };
        step.max(1)
    }
}

impl fmt::Display for SlotGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotGranularity::Fixed(minutes) => write!(f, "{minutes}"),
            SlotGranularity::DurationAligned => f.write_str("duration"),
        }
    }
}

impl FromStr for SlotGranularity {
    type Err = String;

    /// Accepts `duration` or a positive minute count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("duration") {
            return Ok(SlotGranularity::DurationAligned);
        }
        match s.parse::<u32>() {
            Ok(minutes) if (1..=24 * 60).contains(&minutes) => Ok(SlotGranularity::Fixed(minutes)),
            _ => Err(format!(
                "slot granularity must be \"duration\" or minutes in 1..=1440, got {s:?}"
            )),
        }
    }
}

/// A candidate booking window. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Slot {
    fn from_minutes(date: NaiveDate, start: u32, duration: u32) -> Option<Self> {
        Some(Self {
            date,
            start: NaiveTime::from_num_seconds_from_midnight_opt(start * 60, 0)?,
            end: NaiveTime::from_num_seconds_from_midnight_opt((start + duration) * 60, 0)?,
        })
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    #[allow(dead_code)]
    pub fn end_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end)
    }
}

pub struct SlotGenerator<'a> {
    hours: &'a WorkingHours,
    granularity: SlotGranularity,
}

impl<'a> SlotGenerator<'a> {
    pub fn new(hours: &'a WorkingHours, granularity: SlotGranularity) -> Self {
        Self { hours, granularity }
    }

    /// Ascending candidate slots for `date`. Each slot lies fully inside one
    /// open interval; intervals shorter than the duration yield nothing.
    pub fn slots(&self, date: NaiveDate, duration_minutes: u32) -> Slots<'a> {
        Slots {
            date,
            intervals: self.hours.intervals_for(date.weekday()).iter(),
            current: None,
            duration: duration_minutes,
            step: self.granularity.step(duration_minutes),
        }
    }
}

/// Lazy slot sequence; clone it to restart from the same point.
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    date: NaiveDate,
    intervals: std::slice::Iter<'a, OpenInterval>,
    // (next candidate start, interval close), both in minutes from midnight
    current: Option<(u32, u32)>,
    duration: u32,
    step: u32,
}

impl Iterator for Slots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            let (start, close) = match self.current {
                Some(cursor) => cursor,
                None => {
                    let interval = self.intervals.next()?;
                    (minutes_of(interval.open), minutes_of(interval.close))
                }
            };

            if start + self.duration <= close {
                self.current = Some((start + self.step, close));
                return Slot::from_minutes(self.date, start, self.duration);
            }
            self.current = None;
        }
    }
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::working_hours::WorkingHoursConfig;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2024-06-03 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn starts(slots: Slots<'_>) -> Vec<NaiveTime> {
        slots.map(|s| s.start).collect()
    }

    fn monday_morning_only() -> WorkingHours {
        WorkingHours::new(WorkingHoursConfig {
            monday: vec![OpenInterval::new(t(8, 0), t(12, 0))],
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn hourly_slots_for_a_morning() {
        let hours = monday_morning_only();
        let generator = SlotGenerator::new(&hours, SlotGranularity::Fixed(60));
        assert_eq!(
            starts(generator.slots(monday(), 60)),
            vec![t(8, 0), t(9, 0), t(10, 0), t(11, 0)]
        );
    }

    #[test]
    fn default_granularity_is_hourly_even_for_short_visits() {
        assert_eq!(SlotGranularity::default(), SlotGranularity::Fixed(60));

        let hours = monday_morning_only();
        let generator = SlotGenerator::new(&hours, SlotGranularity::default());
        let slots: Vec<Slot> = generator.slots(monday(), 30).collect();
        assert_eq!(
            slots.iter().map(|s| s.start).collect::<Vec<_>>(),
            vec![t(8, 0), t(9, 0), t(10, 0), t(11, 0)]
        );
        assert_eq!(slots[0].end, t(8, 30));
    }

    #[test]
    fn duration_aligned_packs_back_to_back() {
        let hours = monday_morning_only();
        let generator = SlotGenerator::new(&hours, SlotGranularity::DurationAligned);
        let got = starts(generator.slots(monday(), 30));
        assert_eq!(got.len(), 8);
        assert_eq!(got.first(), Some(&t(8, 0)));
        assert_eq!(got.last(), Some(&t(11, 30)));
    }

    #[test]
    fn long_visits_do_not_spill_past_close() {
        let hours = WorkingHours::clinic_default();
        let generator = SlotGenerator::new(&hours, SlotGranularity::default());
        assert_eq!(
            starts(generator.slots(monday(), 180)),
            vec![t(8, 0), t(9, 0), t(13, 0), t(14, 0), t(15, 0)]
        );
    }

    #[test]
    fn interval_shorter_than_duration_yields_nothing() {
        let hours = WorkingHours::new(WorkingHoursConfig {
            monday: vec![OpenInterval::new(t(8, 0), t(9, 0))],
            ..Default::default()
        })
        .unwrap();
        let generator = SlotGenerator::new(&hours, SlotGranularity::default());
        assert_eq!(generator.slots(monday(), 120).count(), 0);
    }

    #[test]
    fn closed_days_are_empty() {
        let hours = WorkingHours::clinic_default();
        let generator = SlotGenerator::new(&hours, SlotGranularity::DurationAligned);
        let sunday = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        for duration in [20, 30, 60, 120, 180] {
            assert_eq!(generator.slots(sunday, duration).count(), 0);
        }
    }

    #[test]
    fn every_slot_sits_inside_its_interval() {
        let hours = WorkingHours::clinic_default();
        for granularity in [
            SlotGranularity::Fixed(60),
            SlotGranularity::Fixed(15),
            SlotGranularity::DurationAligned,
        ] {
            let generator = SlotGenerator::new(&hours, granularity);
            for day in 0..7 {
                let date = monday() + chrono::Duration::days(day);
                for duration in [20, 30, 60, 120, 180] {
                    let mut previous: Option<NaiveTime> = None;
                    for slot in generator.slots(date, duration) {
                        let fits = hours
                            .intervals_for(date.weekday())
                            .iter()
                            .any(|i| i.open <= slot.start && slot.end <= i.close);
                        assert!(fits, "{slot:?} escapes working hours");
                        assert_eq!(
                            (slot.end - slot.start).num_minutes(),
                            i64::from(duration)
                        );
                        if let Some(p) = previous {
                            assert!(p < slot.start, "slots must ascend");
                        }
                        previous = Some(slot.start);
                    }
                }
            }
        }
    }

    #[test]
    fn sequence_is_restartable() {
        let hours = WorkingHours::clinic_default();
        let generator = SlotGenerator::new(&hours, SlotGranularity::default());
        let mut slots = generator.slots(monday(), 60);
        slots.next();
        let replay = slots.clone();
        assert_eq!(slots.collect::<Vec<_>>(), replay.collect::<Vec<_>>());
        assert_eq!(
            generator.slots(monday(), 60).collect::<Vec<_>>(),
            generator.slots(monday(), 60).collect::<Vec<_>>()
        );
    }

    #[test]
    fn parses_granularity_setting() {
        assert_eq!("duration".parse::<SlotGranularity>(), Ok(SlotGranularity::DurationAligned));
        assert_eq!(" 30 ".parse::<SlotGranularity>(), Ok(SlotGranularity::Fixed(30)));
        assert!("0".parse::<SlotGranularity>().is_err());
        assert!("hourly".parse::<SlotGranularity>().is_err());
    }
}
