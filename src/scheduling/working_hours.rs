use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkingHoursError {
    #[error("{weekday}: interval {open}-{close} must open before it closes")]
    EmptyInterval {
        weekday: Weekday,
        open: NaiveTime,
        close: NaiveTime,
    },
    #[error("{weekday}: intervals {first} and {second} overlap")]
    Overlapping {
        weekday: Weekday,
        first: String,
        second: String,
    },
}

/// Half-open `[open, close)` window during which the clinic takes patients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenInterval {
    #[serde(with = "hhmm")]
    pub open: NaiveTime,
    #[serde(with = "hhmm")]
    pub close: NaiveTime,
}

impl OpenInterval {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    #[allow(dead_code)]
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.open <= time && time < self.close
    }

    pub fn contains_range(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.open <= start && start < end && end <= self.close
    }
}

impl std::fmt::Display for OpenInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.open.format("%H:%M"), self.close.format("%H:%M"))
    }
}

/// Wire shape of the clinic calendar: weekday name -> list of `{open, close}`
/// as "HH:mm" strings. Missing days are closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHoursConfig {
    #[serde(default)]
    pub monday: Vec<OpenInterval>,
    #[serde(default)]
    pub tuesday: Vec<OpenInterval>,
    #[serde(default)]
    pub wednesday: Vec<OpenInterval>,
    #[serde(default)]
    pub thursday: Vec<OpenInterval>,
    #[serde(default)]
    pub friday: Vec<OpenInterval>,
    #[serde(default)]
    pub saturday: Vec<OpenInterval>,
    #[serde(default)]
    pub sunday: Vec<OpenInterval>,
}

impl WorkingHoursConfig {
    fn into_days(self) -> [Vec<OpenInterval>; 7] {
        [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday,
        ]
    }
}

/// Validated per-weekday opening hours. Intervals are sorted and disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingHours {
    days: [Vec<OpenInterval>; 7],
}

impl WorkingHours {
    pub fn new(config: WorkingHoursConfig) -> Result<Self, WorkingHoursError> {
        let mut days = config.into_days();

        for (weekday, intervals) in WEEK.iter().zip(days.iter_mut()) {
            if let Some(bad) = intervals.iter().find(|i| i.open >= i.close) {
                return Err(WorkingHoursError::EmptyInterval {
                    weekday: *weekday,
                    open: bad.open,
                    close: bad.close,
                });
            }

            intervals.sort_by_key(|i| i.open);

            // touching windows (12:00-13:00 after 08:00-12:00) are fine
            for pair in intervals.windows(2) {
                if pair[1].open < pair[0].close {
                    return Err(WorkingHoursError::Overlapping {
                        weekday: *weekday,
                        first: pair[0].to_string(),
                        second: pair[1].to_string(),
                    });
                }
            }
        }

        Ok(Self { days })
    }

    /// Mon-Fri 08:00-12:00 and 13:00-18:00, Sat 08:00-12:00, Sun closed.
    pub fn clinic_default() -> Self {
        let morning = OpenInterval::new(hm(8, 0), hm(12, 0));
        let afternoon = OpenInterval::new(hm(13, 0), hm(18, 0));
        let weekday = vec![morning, afternoon];

        Self {
            days: [
                weekday.clone(),
                weekday.clone(),
                weekday.clone(),
                weekday.clone(),
                weekday,
                vec![morning],
                vec![],
            ],
        }
    }

    pub fn intervals_for(&self, weekday: Weekday) -> &[OpenInterval] {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    #[allow(dead_code)]
    pub fn is_open(&self, weekday: Weekday, time: NaiveTime) -> bool {
        self.intervals_for(weekday).iter().any(|i| i.contains(time))
    }

    #[allow(dead_code)]
    pub fn is_closed_all_day(&self, weekday: Weekday) -> bool {
        self.intervals_for(weekday).is_empty()
    }

    /// True when `[start, end)` fits inside a single open interval.
    pub fn contains(&self, weekday: Weekday, start: NaiveTime, end: NaiveTime) -> bool {
        self.intervals_for(weekday)
            .iter()
            .any(|i| i.contains_range(start, end))
    }

    pub fn to_config(&self) -> WorkingHoursConfig {
        let [monday, tuesday, wednesday, thursday, friday, saturday, sunday] = self.days.clone();
        WorkingHoursConfig {
            monday,
            tuesday,
            wednesday,
            thursday,
            friday,
            saturday,
            sunday,
        }
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self::clinic_default()
    }
}

impl TryFrom<WorkingHoursConfig> for WorkingHours {
    type Error = WorkingHoursError;

    fn try_from(config: WorkingHoursConfig) -> Result<Self, Self::Error> {
        Self::new(config)
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .map_err(|_| D::Error::custom(format!("expected HH:mm, got {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn default_calendar_matches_clinic_hours() {
        let hours = WorkingHours::clinic_default();
        assert_eq!(hours.intervals_for(Weekday::Wed).len(), 2);
        assert_eq!(
            hours.intervals_for(Weekday::Sat),
            &[OpenInterval::new(t(8, 0), t(12, 0))]
        );
        assert!(hours.is_closed_all_day(Weekday::Sun));
    }

    #[test]
    fn open_is_half_open() {
        let hours = WorkingHours::clinic_default();
        assert!(hours.is_open(Weekday::Mon, t(8, 0)));
        assert!(hours.is_open(Weekday::Mon, t(11, 59)));
        assert!(!hours.is_open(Weekday::Mon, t(12, 0)));
        assert!(!hours.is_open(Weekday::Mon, t(12, 30)));
        assert!(hours.is_open(Weekday::Mon, t(13, 0)));
        assert!(!hours.is_open(Weekday::Sun, t(10, 0)));
    }

    #[test]
    fn range_must_fit_one_interval() {
        let hours = WorkingHours::clinic_default();
        assert!(hours.contains(Weekday::Tue, t(11, 0), t(12, 0)));
        assert!(!hours.contains(Weekday::Tue, t(11, 30), t(13, 30)));
        assert!(!hours.contains(Weekday::Tue, t(17, 30), t(18, 30)));
    }

    #[test]
    fn intervals_are_sorted_on_construction() {
        let config = WorkingHoursConfig {
            monday: vec![
                OpenInterval::new(t(14, 0), t(18, 0)),
                OpenInterval::new(t(8, 0), t(12, 0)),
            ],
            ..Default::default()
        };
        let hours = WorkingHours::new(config).unwrap();
        let opens: Vec<_> = hours
            .intervals_for(Weekday::Mon)
            .iter()
            .map(|i| i.open)
            .collect();
        assert_eq!(opens, vec![t(8, 0), t(14, 0)]);
        assert!(hours.is_closed_all_day(Weekday::Tue));
    }

    #[test]
    fn rejects_overlapping_and_empty_intervals() {
        let overlapping = WorkingHoursConfig {
            friday: vec![
                OpenInterval::new(t(8, 0), t(12, 0)),
                OpenInterval::new(t(11, 0), t(15, 0)),
            ],
            ..Default::default()
        };
        assert!(matches!(
            WorkingHours::new(overlapping),
            Err(WorkingHoursError::Overlapping { weekday: Weekday::Fri, .. })
        ));

        let empty = WorkingHoursConfig {
            sunday: vec![OpenInterval::new(t(10, 0), t(10, 0))],
            ..Default::default()
        };
        assert!(matches!(
            WorkingHours::new(empty),
            Err(WorkingHoursError::EmptyInterval { .. })
        ));
    }

    #[test]
    fn parses_hh_mm_json() {
        let raw = r#"{
            "monday": [{"open": "08:00", "close": "12:00"}, {"open": "13:00", "close": "18:00"}],
            "saturday": [{"open": "09:00", "close": "11:30"}]
        }"#;
        let config: WorkingHoursConfig = serde_json::from_str(raw).unwrap();
        let hours = WorkingHours::try_from(config).unwrap();
        assert!(hours.is_open(Weekday::Sat, t(11, 0)));
        assert!(!hours.is_open(Weekday::Sat, t(11, 30)));
        assert!(hours.is_closed_all_day(Weekday::Wed));

        let bad = r#"{"monday": [{"open": "8h", "close": "12:00"}]}"#;
        assert!(serde_json::from_str::<WorkingHoursConfig>(bad).is_err());
    }

    #[test]
    fn serializes_back_to_hh_mm() {
        let json = serde_json::to_value(WorkingHours::clinic_default().to_config()).unwrap();
        assert_eq!(json["saturday"][0]["open"], "08:00");
        assert_eq!(json["saturday"][0]["close"], "12:00");
        assert_eq!(json["sunday"].as_array().map(Vec::len), Some(0));
    }
}
