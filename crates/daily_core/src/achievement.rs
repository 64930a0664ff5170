use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unlocked milestone. Identity is the stable `id` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

impl PartialEq for Achievement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Achievement {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    CurrentStreak(u32),
    WeeklyCompletion(f64),
}

impl Threshold {
    fn is_met(self, current_streak: u32, weekly_completion: f64) -> bool {
        match self {
            Threshold::CurrentStreak(days) => current_streak >= days,
            Threshold::WeeklyCompletion(ratio) => weekly_completion >= ratio,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementRule {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub threshold: Threshold,
}

impl AchievementRule {
    fn unlock(&self, now: DateTime<Utc>) -> Achievement {
        Achievement {
            id: self.id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            unlocked_at: now,
        }
    }
}

pub const RULES: [AchievementRule; 5] = [
    AchievementRule {
        id: "first_streak",
        title: "¡Primer Paso!",
        description: "Completa tareas 1 día consecutivo",
        icon: "🎯",
        threshold: Threshold::CurrentStreak(1),
    },
    AchievementRule {
        id: "three_day_streak",
        title: "En Marcha",
        description: "3 días consecutivos de productividad",
        icon: "🔥",
        threshold: Threshold::CurrentStreak(3),
    },
    AchievementRule {
        id: "week_streak",
        title: "¡Racha Semanal!",
        description: "7 días consecutivos completando tareas",
        icon: "⭐",
        threshold: Threshold::CurrentStreak(7),
    },
    AchievementRule {
        id: "month_streak",
        title: "¡Leyenda!",
        description: "30 días consecutivos de consistencia",
        icon: "🏆",
        threshold: Threshold::CurrentStreak(30),
    },
    AchievementRule {
        id: "perfect_week",
        title: "Semana Perfecta",
        description: "Completa tareas todos los días de la semana",
        icon: "💫",
        threshold: Threshold::WeeklyCompletion(1.0),
    },
];

/// Returns the achievements whose thresholds are met and whose ids are not
/// already in `unlocked`, in rule-table order.
pub fn evaluate(
    unlocked: &[Achievement],
    current_streak: u32,
    weekly_completion: f64,
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    RULES
        .iter()
        .filter(|rule| rule.threshold.is_met(current_streak, weekly_completion))
        .filter(|rule| !unlocked.iter().any(|existing| existing.id == rule.id))
        .map(|rule| rule.unlock(now))
        .collect()
}
