use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    achievement::Achievement,
    calendar::Calendar,
    habit::StreakCalculator,
    habit_service::{HabitReport, HabitService},
    storage::{KeyValueStore, MemoryStore},
    streak::{StreakState, StreakTracker},
    task::{HabitFrequency, Task},
    task_list::TaskList,
};

/// Wires the task list, habit service and streak tracker to one store.
///
/// Every mutating method refreshes the habit cache, recomputes streaks and
/// persists both blobs before returning.
pub struct DailyTrack {
    store: Arc<dyn KeyValueStore>,
    tasks: TaskList,
    habits: HabitService,
    streaks: StreakTracker,
}

pub struct DailyTrackBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    calendar: Calendar,
}

impl DailyTrackBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            calendar: Calendar::local(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Loads persisted state and runs the start-up pass: backfill streak
    /// dates, auto-renew habits, refresh reports and streaks, save.
    pub fn open(self, now: DateTime<Utc>) -> DailyTrack {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let calculator = StreakCalculator::new(self.calendar);
        let mut track = DailyTrack {
            tasks: TaskList::load(store.as_ref()),
            habits: HabitService::new(calculator),
            streaks: StreakTracker::load(Arc::clone(&store), self.calendar),
            store,
        };
        let backfilled = track.habits.update_habit_streaks(track.tasks.tasks_mut());
        let renewed = track.renew(now);
        info!(
            tasks = track.tasks.len(),
            habits = track.habits.habits().len(),
            backfilled,
            renewed,
            streak = track.streaks.current_streak(),
            "daily track opened"
        );
        track
    }
}

impl Default for DailyTrackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DailyTrack {
    pub fn builder() -> DailyTrackBuilder {
        DailyTrackBuilder::new()
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn habit_service(&self) -> &HabitService {
        &self.habits
    }

    pub fn streak_state(&self) -> &StreakState {
        self.streaks.state()
    }

    pub fn achievements(&self) -> &[Achievement] {
        self.streaks.achievements()
    }

    pub fn add_task(&mut self, title: impl Into<String>, now: DateTime<Utc>) -> Uuid {
        let id = self.tasks.add_task(title, now);
        self.after_mutation(now);
        id
    }

    pub fn add_habit(
        &mut self,
        title: impl Into<String>,
        frequency: HabitFrequency,
        now: DateTime<Utc>,
    ) -> Uuid {
        let id = self.tasks.add_habit(title, frequency, now);
        self.after_mutation(now);
        id
    }

    pub fn delete_task(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        if !self.tasks.delete_task(id) {
            return false;
        }
        self.after_mutation(now);
        true
    }

    /// Returns the achievements unlocked by this toggle, or `None` for an
    /// unknown id.
    pub fn toggle_task(&mut self, id: Uuid, now: DateTime<Utc>) -> Option<Vec<Achievement>> {
        let calculator = *self.habits.calculator();
        if !self.tasks.toggle_completed(id, &calculator, now) {
            return None;
        }
        Some(self.after_mutation(now))
    }

    pub fn set_habit_frequency(&mut self, id: Uuid, frequency: HabitFrequency, now: DateTime<Utc>) -> bool {
        if !self.tasks.set_habit_frequency(id, frequency, now) {
            return false;
        }
        self.after_mutation(now);
        true
    }

    /// Auto-renews habits whose period has turned over and refreshes every
    /// derived value. Returns how many habits were renewed.
    pub fn renew(&mut self, now: DateTime<Utc>) -> usize {
        let renewed = self.habits.auto_renew_habits(self.tasks.tasks_mut(), now);
        self.after_mutation(now);
        renewed
    }

    pub fn habit_report(&self, now: DateTime<Utc>) -> HabitReport {
        self.habits.generate_habit_report(now)
    }

    pub fn top_habits(&self, limit: usize) -> Vec<&Task> {
        self.habits.top_habits_by_streak(limit)
    }

    pub fn habits_needing_attention(&self, now: DateTime<Utc>) -> Vec<&Task> {
        self.habits.habits_needing_attention(now)
    }

    pub fn habits_by_frequency(&self, frequency: HabitFrequency) -> Vec<&Task> {
        self.habits.habits_by_frequency(frequency)
    }

    pub fn reset_streak_data(&mut self) {
        self.streaks.reset_streak_data();
    }

    fn after_mutation(&mut self, now: DateTime<Utc>) -> Vec<Achievement> {
        self.tasks.save(self.store.as_ref());
        self.habits.update_habits(self.tasks.tasks());
        self.streaks.refresh_all_calculations(self.tasks.tasks(), now)
    }
}
