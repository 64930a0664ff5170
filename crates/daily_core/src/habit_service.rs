use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    habit::StreakCalculator,
    task::{HabitFrequency, Task},
};

/// Aggregate view over the current habit set. Computed fresh on every call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HabitReport {
    pub total_habits: usize,
    pub completed_today: usize,
    pub average_consistency: f64,
    pub longest_streak: u32,
    pub needs_attention: usize,
}

impl HabitReport {
    pub fn completion_rate(&self) -> f64 {
        if self.total_habits == 0 {
            return 0.0;
        }
        self.completed_today as f64 / self.total_habits as f64
    }

    pub fn formatted_consistency(&self) -> String {
        format!("{:.1}%", self.average_consistency * 100.0)
    }

    pub fn formatted_completion_rate(&self) -> String {
        format!("{:.1}%", self.completion_rate() * 100.0)
    }
}

/// Habit queries over a cached copy of the habit subset.
///
/// The cache only changes through [`HabitService::update_habits`], which has
/// to run after every mutation of the task collection.
#[derive(Debug, Clone, Default)]
pub struct HabitService {
    habits: Vec<Task>,
    calculator: StreakCalculator,
}

impl HabitService {
    pub fn new(calculator: StreakCalculator) -> Self {
        Self {
            habits: Vec::new(),
            calculator,
        }
    }

    pub fn calculator(&self) -> &StreakCalculator {
        &self.calculator
    }

    pub fn habits(&self) -> &[Task] {
        &self.habits
    }

    pub fn filter_habits(tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|task| task.is_habit).cloned().collect()
    }

    pub fn update_habits(&mut self, tasks: &[Task]) {
        self.habits = Self::filter_habits(tasks);
        debug!(count = self.habits.len(), "habit cache refreshed");
    }

    /// Resets every habit whose period has turned over. Mutates `tasks` in
    /// place; persisting them is up to the caller. Returns how many changed.
    pub fn auto_renew_habits(&self, tasks: &mut [Task], now: DateTime<Utc>) -> usize {
        let mut renewed = 0;
        for task in tasks.iter_mut().filter(|task| task.is_habit) {
            if !self.calculator.should_auto_renew(task, now) {
                continue;
            }
            if self.calculator.reset_for_new_period(task, now) {
                info!(
                    task_id = %task.id,
                    title = %task.title,
                    frequency = ?task.habit_frequency,
                    streak = task.habit_streak,
                    "auto-renewed habit"
                );
                renewed += 1;
            }
        }
        renewed
    }

    /// Copies `completedAt` into `lastCompletionDate` for completed habits
    /// that predate streak tracking.
    pub fn update_habit_streaks(&self, tasks: &mut [Task]) -> usize {
        let mut updated = 0;
        for task in tasks.iter_mut().filter(|task| task.is_habit) {
            if task.is_completed && task.last_completion_date.is_none() && task.completed_at.is_some() {
                task.last_completion_date = task.completed_at;
                updated += 1;
            }
        }
        updated
    }

    /// Mean consistency across cached habits, each value capped at 1.0.
    pub fn overall_consistency(&self, now: DateTime<Utc>) -> f64 {
        if self.habits.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .habits
            .iter()
            .map(|habit| self.calculator.consistency_percentage(habit, now).min(1.0))
            .sum();
        total / self.habits.len() as f64
    }

    pub fn habits_by_frequency(&self, frequency: HabitFrequency) -> Vec<&Task> {
        self.habits
            .iter()
            .filter(|habit| habit.habit_frequency == frequency)
            .collect()
    }

    /// Highest streaks first; equal streaks keep their original order.
    pub fn top_habits_by_streak(&self, limit: usize) -> Vec<&Task> {
        let mut ranked: Vec<&Task> = self.habits.iter().collect();
        ranked.sort_by(|a, b| b.habit_streak.cmp(&a.habit_streak));
        ranked.truncate(limit);
        ranked
    }

    pub fn habits_needing_attention(&self, now: DateTime<Utc>) -> Vec<&Task> {
        self.habits
            .iter()
            .filter(|habit| {
                habit.habit_streak == 0 || self.calculator.consistency_percentage(habit, now) < 0.5
            })
            .collect()
    }

    pub fn generate_habit_report(&self, now: DateTime<Utc>) -> HabitReport {
        let calendar = self.calculator.calendar();
        let completed_today = self
            .habits
            .iter()
            .filter(|habit| habit.is_completed)
            .filter(|habit| {
                habit
                    .completed_at
                    .is_some_and(|at| calendar.is_same_day(at, now))
            })
            .count();

        HabitReport {
            total_habits: self.habits.len(),
            completed_today,
            average_consistency: self.overall_consistency(now),
            longest_streak: self
                .habits
                .iter()
                .map(|habit| habit.habit_streak)
                .max()
                .unwrap_or(0),
            needs_attention: self.habits_needing_attention(now).len(),
        }
    }
}
