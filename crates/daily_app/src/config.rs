use std::path::PathBuf;

use anyhow::Result;
use daily_core::calendar::Calendar;
use tracing::{info, warn};

pub const DEFAULT_TOP_HABITS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub utc_offset_minutes: Option<i32>,
    pub top_habits: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("DAILYTRACK_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(offset) = lookup("DAILYTRACK_UTC_OFFSET_MINUTES") {
            match offset.trim().parse::<i32>() {
                Ok(value) if Calendar::from_offset_minutes(value).is_some() => {
                    config.utc_offset_minutes = Some(value);
                }
                _ => warn!(value = %offset, "ignoring invalid DAILYTRACK_UTC_OFFSET_MINUTES"),
            }
        }
        if let Some(limit) = lookup("DAILYTRACK_TOP_HABITS") {
            match limit.trim().parse::<usize>() {
                Ok(value) if value > 0 => config.top_habits = value,
                _ => warn!(value = %limit, "ignoring invalid DAILYTRACK_TOP_HABITS"),
            }
        }
        info!(data_dir = %config.data_dir.display(), "configuration loaded");
        Ok(config)
    }

    pub fn calendar(&self) -> Calendar {
        self.utc_offset_minutes
            .and_then(Calendar::from_offset_minutes)
            .unwrap_or_else(Calendar::local)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("dailytrack"),
            utc_offset_minutes: None,
            top_habits: DEFAULT_TOP_HABITS,
        }
    }
}
