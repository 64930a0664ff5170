use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    habit::StreakCalculator,
    storage::{self, KeyValueStore, TASKS_BACKUP_KEY, TASKS_KEY},
    task::{HabitFrequency, Task},
};

/// The in-memory task collection, persisted as one blob under [`TASKS_KEY`].
///
/// Operations on an id that is not in the list do nothing and return `false`.
///
/// A blob that fails to decode is never overwritten by an untouched list. It
/// is copied to [`TASKS_BACKUP_KEY`] first; if that copy fails, the list
/// stops writing altogether.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList {
    tasks: Vec<Task>,
    guard: WriteGuard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum WriteGuard {
    #[default]
    Open,
    UntilModified,
    Closed,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            guard: WriteGuard::Open,
        }
    }

    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        match storage::load_json::<Vec<Task>, _>(store, TASKS_KEY) {
            Ok(Some(tasks)) => {
                debug!(count = tasks.len(), "loaded tasks");
                Self::from_tasks(tasks)
            }
            Ok(None) => Self::default(),
            Err(err) => {
                warn!(%err, "task list is unreadable, starting empty");
                Self {
                    tasks: Vec::new(),
                    guard: set_aside_unreadable(store),
                }
            }
        }
    }

    /// Writes the list unless doing so would clobber an unreadable blob.
    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &S) {
        match self.guard {
            WriteGuard::Open => {}
            WriteGuard::UntilModified => {
                debug!("task list unchanged since an unreadable load, not saving");
                return;
            }
            WriteGuard::Closed => {
                warn!("unreadable task list could not be backed up, not saving");
                return;
            }
        }
        if let Err(err) = storage::save_json(store, TASKS_KEY, &self.tasks) {
            warn!(%err, "failed to persist task list");
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn add_task(&mut self, title: impl Into<String>, now: DateTime<Utc>) -> Uuid {
        self.push(Task::new(title, now))
    }

    pub fn add_habit(
        &mut self,
        title: impl Into<String>,
        frequency: HabitFrequency,
        now: DateTime<Utc>,
    ) -> Uuid {
        self.push(Task::new_habit(title, frequency, now))
    }

    pub fn delete_task(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != id);
        let removed = before != self.tasks.len();
        if removed {
            self.modified();
        }
        removed
    }

    /// Flips completion. Completing a habit advances its streak; uncompleting
    /// a habit takes that completion back.
    pub fn toggle_completed(&mut self, id: Uuid, calculator: &StreakCalculator, now: DateTime<Utc>) -> bool {
        let Some(task) = self.find_mut(id) else {
            return false;
        };
        match (task.is_completed, task.is_habit) {
            (true, true) => calculator.undo_completion(task, now),
            (true, false) => task.uncomplete(now),
            (false, true) => calculator.increment_streak(task, now),
            (false, false) => task.complete(now),
        }
        self.modified();
        true
    }

    pub fn set_habit_frequency(&mut self, id: Uuid, frequency: HabitFrequency, now: DateTime<Utc>) -> bool {
        let Some(task) = self.find_mut(id).filter(|task| task.is_habit) else {
            return false;
        };
        task.habit_frequency = frequency;
        task.touch(now);
        self.modified();
        true
    }

    fn push(&mut self, task: Task) -> Uuid {
        let id = task.id;
        self.tasks.push(task);
        self.modified();
        id
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    fn modified(&mut self) {
        if self.guard == WriteGuard::UntilModified {
            self.guard = WriteGuard::Open;
        }
    }
}

fn set_aside_unreadable<S: KeyValueStore + ?Sized>(store: &S) -> WriteGuard {
    let copied = store.read(TASKS_KEY).and_then(|bytes| match bytes {
        Some(bytes) => store.write(TASKS_BACKUP_KEY, &bytes),
        None => Ok(()),
    });
    match copied {
        Ok(()) => {
            warn!(key = TASKS_BACKUP_KEY, "copied unreadable task list aside");
            WriteGuard::UntilModified
        }
        Err(err) => {
            warn!(%err, "failed to back up unreadable task list");
            WriteGuard::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 9, 7, 30, 0).unwrap()
    }

    #[test]
    fn toggling_plain_task_stamps_and_clears() {
        let calc = StreakCalculator::new(Calendar::utc());
        let mut list = TaskList::new();
        let id = list.add_task("Llamar a mamá", now());

        assert!(list.toggle_completed(id, &calc, now()));
        assert_eq!(list.get(id).and_then(|t| t.completed_at), Some(now()));
        assert!(list.toggle_completed(id, &calc, now()));
        assert!(list.get(id).is_some_and(|t| !t.is_completed && t.completed_at.is_none()));
    }

    #[test]
    fn completing_habit_advances_streak() {
        let calc = StreakCalculator::new(Calendar::utc());
        let mut list = TaskList::new();
        let id = list.add_habit("Caminar", HabitFrequency::Daily, now());
        list.toggle_completed(id, &calc, now());
        list.toggle_completed(id, &calc, now());
        list.toggle_completed(id, &calc, now() + Duration::days(1));
        let habit = list.get(id).expect("habit present");
        assert_eq!(habit.habit_streak, 2);
        assert_eq!(habit.habit_start_date, Some(now()));
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let calc = StreakCalculator::new(Calendar::utc());
        let mut list = TaskList::new();
        let plain = list.add_task("Plain", now());
        let missing = Uuid::new_v4();
        assert!(!list.toggle_completed(missing, &calc, now()));
        assert!(!list.delete_task(missing));
        assert!(!list.set_habit_frequency(missing, HabitFrequency::Weekly, now()));
        assert!(!list.set_habit_frequency(plain, HabitFrequency::Weekly, now()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn persists_through_store() {
        let store = MemoryStore::new();
        let mut list = TaskList::new();
        list.add_task("Uno", now());
        list.add_habit("Dos", HabitFrequency::Monthly, now());
        list.save(&store);

        let reloaded = TaskList::load(&store);
        assert_eq!(reloaded, list);
    }

    #[test]
    fn unreadable_blob_loads_empty() {
        let store = MemoryStore::new();
        store.write(TASKS_KEY, b"[{\"id\": 3}]").unwrap();
        assert!(TaskList::load(&store).is_empty());
    }

    #[test]
    fn unreadable_blob_survives_until_first_edit() {
        let store = MemoryStore::new();
        let original = b"[{\"id\": 3}]".to_vec();
        store.write(TASKS_KEY, &original).unwrap();

        let mut list = TaskList::load(&store);
        list.save(&store);
        assert_eq!(store.read(TASKS_KEY).unwrap(), Some(original.clone()));
        assert_eq!(store.read(TASKS_BACKUP_KEY).unwrap(), Some(original.clone()));

        list.add_task("Nueva", now());
        list.save(&store);
        assert_eq!(TaskList::load(&store).len(), 1);
        assert_eq!(store.read(TASKS_BACKUP_KEY).unwrap(), Some(original));
    }

    #[test]
    fn undoing_a_habit_completion_restores_its_streak() {
        let calc = StreakCalculator::new(Calendar::utc());
        let mut list = TaskList::new();
        let id = list.add_habit("Yoga", HabitFrequency::Daily, now());

        list.toggle_completed(id, &calc, now());
        list.toggle_completed(id, &calc, now() + Duration::minutes(1));
        list.toggle_completed(id, &calc, now() + Duration::days(1));
        let habit = list.get(id).expect("habit present");
        assert_eq!(habit.habit_streak, 1);
        assert_eq!(habit.last_completion_date, Some(now() + Duration::days(1)));
    }
}
