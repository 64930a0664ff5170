use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use daily_core::{
    habit_service::HabitReport,
    storage::FileStore,
    task::HabitFrequency,
    DailyTrack,
};
use tracing::info;

use crate::config::AppConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct StartupSummary {
    pub report: HabitReport,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub weekly_completion: f64,
    pub monthly_completion: f64,
    pub habits_by_frequency: Vec<(HabitFrequency, usize)>,
    pub top_habits: Vec<(String, u32)>,
    pub needs_attention: Vec<String>,
    pub achievements: Vec<String>,
}

/// Opens the store under `config.data_dir` and performs the start-up pass.
pub fn startup(config: &AppConfig, now: DateTime<Utc>) -> Result<StartupSummary> {
    fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;
    let store = Arc::new(FileStore::new(&config.data_dir));
    let track = DailyTrack::builder()
        .with_store(store)
        .with_calendar(config.calendar())
        .open(now);

    let streaks = track.streak_state();
    Ok(StartupSummary {
        report: track.habit_report(now),
        current_streak: streaks.current_streak,
        longest_streak: streaks.longest_streak,
        weekly_completion: streaks.weekly_completion,
        monthly_completion: streaks.monthly_completion,
        habits_by_frequency: HabitFrequency::ALL
            .iter()
            .map(|frequency| (*frequency, track.habits_by_frequency(*frequency).len()))
            .collect(),
        top_habits: track
            .top_habits(config.top_habits)
            .into_iter()
            .map(|habit| (habit.title.clone(), habit.habit_streak))
            .collect(),
        needs_attention: track
            .habits_needing_attention(now)
            .into_iter()
            .map(|habit| habit.title.clone())
            .collect(),
        achievements: track
            .achievements()
            .iter()
            .map(|achievement| format!("{} {}", achievement.icon, achievement.title))
            .collect(),
    })
}

pub fn run(config: AppConfig) -> Result<()> {
    info!("starting DailyTrack");
    let summary = startup(&config, Utc::now())?;
    let report = &summary.report;
    info!(
        total = report.total_habits,
        completed_today = report.completed_today,
        completion_rate = %report.formatted_completion_rate(),
        consistency = %report.formatted_consistency(),
        longest_habit_streak = report.longest_streak,
        needs_attention = report.needs_attention,
        "habit report"
    );
    info!(
        current = summary.current_streak,
        longest = summary.longest_streak,
        weekly = summary.weekly_completion,
        monthly = summary.monthly_completion,
        "day streak"
    );
    for (frequency, count) in &summary.habits_by_frequency {
        info!(frequency = frequency.description(), count, "habits by frequency");
    }
    for (title, streak) in &summary.top_habits {
        info!(%title, streak, "top habit");
    }
    for title in &summary.needs_attention {
        info!(%title, "habit needs attention");
    }
    for achievement in &summary.achievements {
        info!(%achievement, "achievement");
    }
    Ok(())
}
