use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    achievement::{self, Achievement},
    calendar::{days_in_month, month_start, week_start, Calendar},
    storage::{self, KeyValueStore, STREAK_DATA_KEY},
    task::Task,
};

/// The persisted part of the streak state, stored under [`STREAK_DATA_KEY`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    pub longest_streak: u32,
    pub achievements: Vec<Achievement>,
    pub streak_history: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub weekly_completion: f64,
    pub monthly_completion: f64,
    pub achievements: Vec<Achievement>,
    /// Distinct completion days, most recent first.
    pub streak_history: Vec<NaiveDate>,
}

impl StreakState {
    fn from_data(data: StreakData) -> Self {
        Self {
            longest_streak: data.longest_streak,
            achievements: data.achievements,
            streak_history: data.streak_history,
            ..Self::default()
        }
    }

    fn to_data(&self) -> StreakData {
        StreakData {
            longest_streak: self.longest_streak,
            achievements: self.achievements.clone(),
            streak_history: self.streak_history.clone(),
        }
    }
}

/// Global day streak across every task, plus achievement unlocking.
///
/// Owns its persisted blob; the task collection is read-only input.
pub struct StreakTracker {
    state: StreakState,
    calendar: Calendar,
    store: Arc<dyn KeyValueStore>,
}

impl StreakTracker {
    /// Reads the persisted blob once. A missing or unreadable blob yields
    /// the empty state.
    pub fn load(store: Arc<dyn KeyValueStore>, calendar: Calendar) -> Self {
        let data = match storage::load_json::<StreakData, _>(store.as_ref(), STREAK_DATA_KEY) {
            Ok(Some(data)) => data,
            Ok(None) => StreakData::default(),
            Err(err) => {
                warn!(%err, "discarding unreadable streak data");
                StreakData::default()
            }
        };
        Self {
            state: StreakState::from_data(data),
            calendar,
            store,
        }
    }

    pub fn state(&self) -> &StreakState {
        &self.state
    }

    pub fn current_streak(&self) -> u32 {
        self.state.current_streak
    }

    pub fn longest_streak(&self) -> u32 {
        self.state.longest_streak
    }

    pub fn weekly_completion(&self) -> f64 {
        self.state.weekly_completion
    }

    pub fn monthly_completion(&self) -> f64 {
        self.state.monthly_completion
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.state.achievements
    }

    /// Calendar days on which at least one completed task was stamped.
    pub fn completed_days(&self, tasks: &[Task]) -> BTreeSet<NaiveDate> {
        tasks
            .iter()
            .filter(|task| task.is_completed)
            .filter_map(|task| task.completed_at)
            .map(|at| self.calendar.day_of(at))
            .collect()
    }

    /// Counts consecutive completion days walking back from today. Today
    /// without a completion means a streak of zero.
    pub fn calculate_current_streak(&mut self, tasks: &[Task], now: DateTime<Utc>) -> u32 {
        let days = self.completed_days(tasks);
        self.state.streak_history = days.iter().rev().copied().collect();

        let mut streak = 0;
        let mut day = Some(self.calendar.day_of(now));
        while let Some(current) = day.filter(|current| days.contains(current)) {
            streak += 1;
            day = current.pred_opt();
        }

        self.state.current_streak = streak;
        self.state.longest_streak = self.state.longest_streak.max(streak);
        debug!(
            current = streak,
            longest = self.state.longest_streak,
            "recomputed day streak"
        );
        self.save();
        streak
    }

    pub fn calculate_weekly_completion(&mut self, tasks: &[Task], now: DateTime<Utc>) -> f64 {
        let today = self.calendar.day_of(now);
        let active = self.days_in_range(tasks, week_start(today), today);
        self.state.weekly_completion = active as f64 / 7.0;
        self.state.weekly_completion
    }

    pub fn calculate_monthly_completion(&mut self, tasks: &[Task], now: DateTime<Utc>) -> f64 {
        let today = self.calendar.day_of(now);
        let active = self.days_in_range(tasks, month_start(today), today);
        let month_length = days_in_month(today.year(), today.month());
        self.state.monthly_completion = active as f64 / f64::from(month_length);
        self.state.monthly_completion
    }

    /// Unlocks achievements against the current streak and weekly ratio.
    /// Returns only the ones unlocked by this call.
    pub fn check_achievements(&mut self, now: DateTime<Utc>) -> Vec<Achievement> {
        let unlocked = achievement::evaluate(
            &self.state.achievements,
            self.state.current_streak,
            self.state.weekly_completion,
            now,
        );
        if !unlocked.is_empty() {
            for item in &unlocked {
                info!(id = %item.id, title = %item.title, "achievement unlocked");
            }
            self.state.achievements.extend(unlocked.iter().cloned());
            self.save();
        }
        unlocked
    }

    /// Streak, then weekly and monthly ratios, then achievements.
    pub fn refresh_all_calculations(&mut self, tasks: &[Task], now: DateTime<Utc>) -> Vec<Achievement> {
        self.calculate_current_streak(tasks, now);
        self.calculate_weekly_completion(tasks, now);
        self.calculate_monthly_completion(tasks, now);
        self.check_achievements(now)
    }

    pub fn reset_streak_data(&mut self) {
        self.state = StreakState::default();
        if let Err(err) = self.store.remove(STREAK_DATA_KEY) {
            warn!(%err, "failed to remove streak data");
        }
    }

    fn days_in_range(&self, tasks: &[Task], first: NaiveDate, last: NaiveDate) -> usize {
        self.completed_days(tasks).range(first..=last).count()
    }

    fn save(&self) {
        if let Err(err) = storage::save_json(self.store.as_ref(), STREAK_DATA_KEY, &self.state.to_data()) {
            warn!(%err, "failed to persist streak data");
        }
    }
}
