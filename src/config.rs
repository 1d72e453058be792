use std::{env, fs, path::PathBuf};

use anyhow::Context;

use crate::scheduling::{
    DurationCatalog, ScheduleConfig, SlotGranularity, WorkingHours, WorkingHoursConfig,
};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub clinic_hours_file: Option<PathBuf>,
    pub slot_granularity: SlotGranularity,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);
        let clinic_hours_file = env::var("CLINIC_HOURS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let slot_granularity = match env::var("SLOT_GRANULARITY") {
            Ok(raw) => raw
                .parse::<SlotGranularity>()
                .map_err(anyhow::Error::msg)
                .context("invalid SLOT_GRANULARITY")?,
            Err(_) => SlotGranularity::default(),
        };

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            clinic_hours_file,
            slot_granularity,
        })
    }

    /// Reads the clinic calendar (if configured) and assembles the schedule.
    pub fn schedule(&self) -> anyhow::Result<ScheduleConfig> {
        let working_hours = match &self.clinic_hours_file {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                parse_working_hours(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => WorkingHours::clinic_default(),
        };

        Ok(ScheduleConfig {
            working_hours,
            durations: DurationCatalog::standard(),
            granularity: self.slot_granularity,
        })
    }
}

fn parse_working_hours(raw: &str) -> anyhow::Result<WorkingHours> {
    let config: WorkingHoursConfig = serde_json::from_str(raw)?;
    Ok(WorkingHours::new(config)?)
}
