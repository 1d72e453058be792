use serde::Serialize;

use super::error::SchedulingError;

/// Consultation lengths the clinic books, in minutes.
pub const STANDARD_DURATIONS: [u32; 5] = [20, 30, 60, 120, 180];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationOption {
    pub minutes: u32,
    pub label: &'static str,
}

/// Closed set of allowed appointment durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationCatalog {
    minutes: &'static [u32],
}

impl Default for DurationCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl DurationCatalog {
    pub fn standard() -> Self {
        Self {
            minutes: &STANDARD_DURATIONS,
        }
    }

    pub fn is_valid(&self, minutes: u32) -> bool {
        self.minutes.contains(&minutes)
    }

    /// Rejects anything outside the catalog; never rounds to a neighbour.
    pub fn validate(&self, minutes: u32) -> Result<u32, SchedulingError> {
        if self.is_valid(minutes) {
            Ok(minutes)
        } else {
            Err(SchedulingError::InvalidDuration { minutes })
        }
    }

    pub fn label(&self, minutes: u32) -> Result<&'static str, SchedulingError> {
        let label = match self.validate(minutes)? {
            20 => "20 minutes",
            30 => "30 minutes",
            60 => "1 hour",
            120 => "2 hours",
            180 => "3 hours",
            _ => return Err(SchedulingError::InvalidDuration { minutes }),
        };
        Ok(label)
    }

    pub fn options(&self) -> Vec<DurationOption> {
        self.minutes
            .iter()
            .filter_map(|&minutes| {
                self.label(minutes)
                    .ok()
                    .map(|label| DurationOption { minutes, label })
            })
            .collect()
    }

    pub fn longest(&self) -> u32 {
        self.minutes.iter().copied().max().unwrap_or(0)
    }
}
