use chrono::{DateTime, Utc};

use crate::{
    calendar::Calendar,
    task::{HabitFrequency, StreakCheckpoint, Task},
};

/// Per-habit period logic: renewal, reset, streak increment and consistency.
///
/// Every decision is made in the calendar's reference time zone and against
/// an explicit `now`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakCalculator {
    calendar: Calendar,
}

impl StreakCalculator {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Whether the habit's completed flag belongs to the period containing `now`.
    /// A completed flag without any timestamp is taken at face value.
    pub fn is_completed_in_current_period(&self, task: &Task, now: DateTime<Utc>) -> bool {
        task.is_completed
            && completion_reference(task)
                .map_or(true, |at| self.calendar.same_period(at, now, task.habit_frequency))
    }

    pub fn should_auto_renew(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if !task.is_habit || self.is_completed_in_current_period(task, now) {
            return false;
        }
        match task.last_completion_date {
            None => true,
            Some(last) => !self.calendar.same_period(last, now, task.habit_frequency),
        }
    }

    /// Prepares the habit for a new period. Returns `true` when anything changed.
    pub fn reset_for_new_period(&self, task: &mut Task, now: DateTime<Utc>) -> bool {
        if !task.is_habit {
            return false;
        }
        let frequency = task.habit_frequency;
        let mut changed = false;

        if frequency == HabitFrequency::Daily {
            if let Some(last) = task.last_completion_date {
                let elapsed = self.calendar.periods_between(last, now, frequency);
                if elapsed > 1 && task.habit_streak != 0 {
                    task.habit_streak = 0;
                    changed = true;
                }
            }
        }

        let stale = completion_reference(task)
            .is_some_and(|at| !self.calendar.same_period(at, now, frequency));
        if task.is_completed && stale {
            task.uncomplete(now);
            changed = true;
        }

        changed
    }

    /// Records a completion of the habit at `now`.
    ///
    /// A second completion inside the same period leaves the streak alone.
    pub fn increment_streak(&self, task: &mut Task, now: DateTime<Utc>) {
        task.streak_checkpoint = Some(StreakCheckpoint {
            habit_streak: task.habit_streak,
            last_completion_date: task.last_completion_date,
        });
        match task.last_completion_date {
            None => task.habit_streak = 1,
            Some(last) => {
                let elapsed = self.calendar.periods_between(last, now, task.habit_frequency);
                if elapsed == 1 {
                    task.habit_streak = task.habit_streak.saturating_add(1);
                } else if elapsed > 1 {
                    task.habit_streak = 1;
                }
            }
        }
        task.last_completion_date = Some(now);
        task.complete(now);
    }

    /// Takes back a completion. Inside the period it was recorded in, the
    /// streak and `last_completion_date` return to their earlier values.
    pub fn undo_completion(&self, task: &mut Task, now: DateTime<Utc>) {
        let checkpoint = task.streak_checkpoint.take();
        let in_period = task
            .last_completion_date
            .is_some_and(|last| self.calendar.same_period(last, now, task.habit_frequency));
        if let Some(checkpoint) = checkpoint.filter(|_| in_period) {
            task.habit_streak = checkpoint.habit_streak;
            task.last_completion_date = checkpoint.last_completion_date;
        }
        task.uncomplete(now);
    }

    /// Streak length relative to the periods elapsed since the habit started.
    /// Not clamped: a streak can cover the partial period at either end.
    pub fn consistency_percentage(&self, task: &Task, now: DateTime<Utc>) -> f64 {
        if !task.is_habit {
            return 0.0;
        }
        let Some(start) = task.habit_start_date else {
            return 0.0;
        };
        let total_periods = self
            .calendar
            .periods_between(start, now, task.habit_frequency)
            .max(1);
        f64::from(task.habit_streak) / total_periods as f64
    }
}

fn completion_reference(task: &Task) -> Option<DateTime<Utc>> {
    task.last_completion_date.or(task.completed_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn calculator() -> StreakCalculator {
        StreakCalculator::new(Calendar::utc())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn daily_streak_grows_and_breaks() {
        let calc = calculator();
        let mut habit = Task::new_habit("Meditar", HabitFrequency::Daily, t0());

        calc.increment_streak(&mut habit, t0());
        assert_eq!(habit.habit_streak, 1);
        assert_eq!(habit.last_completion_date, Some(t0()));

        calc.increment_streak(&mut habit, t0() + Duration::days(1));
        assert_eq!(habit.habit_streak, 2);

        calc.increment_streak(&mut habit, t0() + Duration::days(3));
        assert_eq!(habit.habit_streak, 1);
        assert_eq!(habit.completed_at, Some(t0() + Duration::days(3)));
        assert!(habit.is_completed);
    }

    #[test]
    fn gap_of_three_days_restarts_streak() {
        let calc = calculator();
        let mut habit = Task::new_habit("Correr", HabitFrequency::Daily, t0());
        habit.habit_streak = 5;
        habit.last_completion_date = Some(t0());
        calc.increment_streak(&mut habit, t0() + Duration::days(3));
        assert_eq!(habit.habit_streak, 1);
    }

    #[test]
    fn same_period_completion_does_not_double_count() {
        let calc = calculator();
        let mut weekly = Task::new_habit("Limpiar", HabitFrequency::Weekly, t0());
        calc.increment_streak(&mut weekly, t0());
        calc.increment_streak(&mut weekly, t0() + Duration::days(4));
        assert_eq!(weekly.habit_streak, 1);

        let mut daily = Task::new_habit("Agua", HabitFrequency::Daily, t0());
        calc.increment_streak(&mut daily, t0());
        calc.increment_streak(&mut daily, t0() + Duration::hours(3));
        assert_eq!(daily.habit_streak, 1);
        assert_eq!(daily.last_completion_date, Some(t0() + Duration::hours(3)));
    }

    #[test]
    fn monthly_streak_counts_calendar_months() {
        let calc = calculator();
        let start = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        let mut habit = Task::new_habit("Presupuesto", HabitFrequency::Monthly, start);
        calc.increment_streak(&mut habit, start);
        calc.increment_streak(&mut habit, Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap());
        assert_eq!(habit.habit_streak, 2);
        calc.increment_streak(&mut habit, Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap());
        assert_eq!(habit.habit_streak, 1);
    }

    #[test]
    fn auto_renew_only_for_stale_habits() {
        let calc = calculator();
        let mut habit = Task::new_habit("Estirar", HabitFrequency::Daily, t0());
        assert!(calc.should_auto_renew(&habit, t0()), "never completed");

        calc.increment_streak(&mut habit, t0());
        assert!(!calc.should_auto_renew(&habit, t0() + Duration::hours(2)));
        assert!(calc.should_auto_renew(&habit, t0() + Duration::days(1)));

        let plain = Task::new("Correo", t0());
        assert!(!calc.should_auto_renew(&plain, t0()));
    }

    #[test]
    fn weekly_renewal_across_year_boundary() {
        let calc = calculator();
        let last = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let mut habit = Task::new_habit("Revisar", HabitFrequency::Weekly, last);
        calc.increment_streak(&mut habit, last);
        // Both dates sit in ISO week 1, one year apart.
        assert!(calc.should_auto_renew(&habit, now));
    }

    #[test]
    fn daily_reset_zeroes_broken_streak_and_clears_flag() {
        let calc = calculator();
        let mut habit = Task::new_habit("Leer", HabitFrequency::Daily, t0());
        calc.increment_streak(&mut habit, t0());
        calc.increment_streak(&mut habit, t0() + Duration::days(1));
        assert_eq!(habit.habit_streak, 2);

        let next_day = t0() + Duration::days(2);
        assert!(calc.reset_for_new_period(&mut habit, next_day));
        assert_eq!(habit.habit_streak, 2, "one day elapsed keeps the streak");
        assert!(!habit.is_completed);
        assert!(habit.completed_at.is_none());

        let much_later = t0() + Duration::days(5);
        assert!(calc.reset_for_new_period(&mut habit, much_later));
        assert_eq!(habit.habit_streak, 0);
        assert_eq!(habit.last_completion_date, Some(t0() + Duration::days(1)));
    }

    #[test]
    fn weekly_reset_keeps_streak() {
        let calc = calculator();
        let mut habit = Task::new_habit("Lavar auto", HabitFrequency::Weekly, t0());
        calc.increment_streak(&mut habit, t0());
        habit.habit_streak = 4;

        assert!(!calc.reset_for_new_period(&mut habit, t0() + Duration::days(3)));
        assert!(habit.is_completed);

        assert!(calc.reset_for_new_period(&mut habit, t0() + Duration::days(21)));
        assert!(!habit.is_completed);
        assert_eq!(habit.habit_streak, 4);
    }

    #[test]
    fn monthly_renewal_follows_calendar_months() {
        let calc = calculator();
        let end_of_january = Utc.with_ymd_and_hms(2025, 1, 31, 10, 0, 0).unwrap();
        let mut habit = Task::new_habit("Pagar renta", HabitFrequency::Monthly, end_of_january);
        calc.increment_streak(&mut habit, end_of_january);
        habit.habit_streak = 3;

        let same_evening = Utc.with_ymd_and_hms(2025, 1, 31, 22, 0, 0).unwrap();
        assert!(!calc.should_auto_renew(&habit, same_evening));
        assert!(!calc.reset_for_new_period(&mut habit.clone(), same_evening));

        let next_year = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        assert!(calc.should_auto_renew(&habit, next_year));

        let first_of_february = Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap();
        assert!(calc.should_auto_renew(&habit, first_of_february));
        assert!(calc.reset_for_new_period(&mut habit, first_of_february));
        assert!(!habit.is_completed);
        assert!(habit.completed_at.is_none());
        assert_eq!(habit.habit_streak, 3);
        assert_eq!(habit.last_completion_date, Some(end_of_january));

        // Still pending in January of the following year.
        assert!(calc.should_auto_renew(&habit, next_year));
    }

    #[test]
    fn undo_restores_streak_within_period() {
        let calc = calculator();
        let mut habit = Task::new_habit("Meditar", HabitFrequency::Daily, t0());

        calc.increment_streak(&mut habit, t0());
        calc.undo_completion(&mut habit, t0() + Duration::minutes(5));
        assert_eq!(habit.habit_streak, 0);
        assert!(habit.last_completion_date.is_none());
        assert!(!habit.is_completed);

        calc.increment_streak(&mut habit, t0() + Duration::days(1));
        assert_eq!(habit.habit_streak, 1, "undone day does not count");

        calc.increment_streak(&mut habit, t0() + Duration::days(2));
        calc.undo_completion(&mut habit, t0() + Duration::days(2) + Duration::hours(1));
        assert_eq!(habit.habit_streak, 1);
        assert_eq!(habit.last_completion_date, Some(t0() + Duration::days(1)));
        assert!(habit.streak_checkpoint.is_none());
    }

    #[test]
    fn undo_after_period_ended_keeps_streak() {
        let calc = calculator();
        let mut habit = Task::new_habit("Leer", HabitFrequency::Weekly, t0());
        calc.increment_streak(&mut habit, t0());
        habit.habit_streak = 4;

        calc.undo_completion(&mut habit, t0() + Duration::days(14));
        assert_eq!(habit.habit_streak, 4);
        assert_eq!(habit.last_completion_date, Some(t0()));
        assert!(!habit.is_completed);
    }

    #[test]
    fn reset_ignores_plain_tasks() {
        let calc = calculator();
        let mut task = Task::new("Plain", t0());
        task.complete(t0());
        assert!(!calc.reset_for_new_period(&mut task, t0() + Duration::days(10)));
        assert!(task.is_completed);
    }

    #[test]
    fn consistency_bounds() {
        let calc = calculator();
        let plain = Task::new("Plain", t0());
        assert_eq!(calc.consistency_percentage(&plain, t0()), 0.0);

        let mut no_start = Task::new_habit("Sin inicio", HabitFrequency::Daily, t0());
        no_start.habit_start_date = None;
        no_start.habit_streak = 3;
        assert_eq!(calc.consistency_percentage(&no_start, t0()), 0.0);

        let mut habit = Task::new_habit("Diario", HabitFrequency::Daily, t0());
        habit.habit_streak = 2;
        assert_eq!(calc.consistency_percentage(&habit, t0() + Duration::days(4)), 0.5);
        // Same day as start: the denominator is floored at one period.
        assert_eq!(calc.consistency_percentage(&habit, t0()), 2.0);
    }
}
