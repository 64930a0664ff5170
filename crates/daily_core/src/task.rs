use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{week_start, Calendar};

pub const TASK_MODEL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HabitFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl HabitFrequency {
    pub const ALL: [HabitFrequency; 3] = [
        HabitFrequency::Daily,
        HabitFrequency::Weekly,
        HabitFrequency::Monthly,
    ];

    pub fn description(self) -> &'static str {
        match self {
            HabitFrequency::Daily => "Diario",
            HabitFrequency::Weekly => "Semanal",
            HabitFrequency::Monthly => "Mensual",
        }
    }
}

/// A to-do item. The habit fields are inert unless `is_habit` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub is_completed: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, with = "unix_seconds")]
    pub updated_at: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub is_habit: bool,
    #[serde(default)]
    pub habit_frequency: HabitFrequency,
    #[serde(default)]
    pub habit_streak: u32,
    #[serde(default, with = "timestamp::option")]
    pub last_completion_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub habit_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak_checkpoint: Option<StreakCheckpoint>,
}

/// Habit streak fields as they were before the latest completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreakCheckpoint {
    pub habit_streak: u32,
    pub last_completion_date: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    TASK_MODEL_VERSION
}

impl Task {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            is_completed: false,
            created_at: now,
            completed_at: None,
            updated_at: now.timestamp().to_string(),
            version: TASK_MODEL_VERSION,
            is_habit: false,
            habit_frequency: HabitFrequency::default(),
            habit_streak: 0,
            last_completion_date: None,
            habit_start_date: None,
            streak_checkpoint: None,
        }
    }

    pub fn new_habit(title: impl Into<String>, frequency: HabitFrequency, now: DateTime<Utc>) -> Self {
        let mut task = Self::new(title, now);
        task.mark_as_habit(frequency, now);
        task
    }

    /// Flags the task as a habit. The start date is only set the first time.
    pub fn mark_as_habit(&mut self, frequency: HabitFrequency, now: DateTime<Utc>) {
        self.is_habit = true;
        self.habit_frequency = frequency;
        self.habit_start_date.get_or_insert(now);
        self.touch(now);
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.is_completed = true;
        self.completed_at = Some(now);
        self.touch(now);
    }

    pub fn uncomplete(&mut self, now: DateTime<Utc>) {
        self.is_completed = false;
        self.completed_at = None;
        self.touch(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.timestamp().to_string();
    }

    pub fn completed_this_week(&self, calendar: &Calendar, now: DateTime<Utc>) -> bool {
        let Some(completed_at) = self.completed_at else {
            return false;
        };
        let day = calendar.day_of(completed_at);
        day >= week_start(calendar.day_of(now))
    }
}

/// Timestamps are written as RFC 3339 and read from RFC 3339 strings or
/// Unix seconds, which is what older task blobs contain.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Int(i64),
        Float(f64),
        Text(String),
    }

    impl RawTimestamp {
        fn into_datetime(self) -> Option<DateTime<Utc>> {
            match self {
                RawTimestamp::Int(secs) => DateTime::from_timestamp(secs, 0),
                RawTimestamp::Float(secs) => {
                    let whole = secs.floor();
                    let nanos = ((secs - whole) * 1e9) as u32;
                    DateTime::from_timestamp(whole as i64, nanos)
                }
                RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        RawTimestamp::deserialize(deserializer)?
            .into_datetime()
            .ok_or_else(|| D::Error::custom("unrecognised timestamp"))
    }

    pub mod option {
        use super::RawTimestamp;
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.serialize(serializer)
        }

        /// Unreadable optional timestamps decode as absent.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
            Ok(raw
                .and_then(|value| RawTimestamp::deserialize(value).ok())
                .and_then(RawTimestamp::into_datetime))
        }
    }
}

mod unix_seconds {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSeconds {
        Int(i64),
        Float(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match RawSeconds::deserialize(deserializer)? {
            RawSeconds::Int(secs) => Ok(secs.to_string()),
            RawSeconds::Float(secs) => Ok((secs as i64).to_string()),
            RawSeconds::Text(text) if !text.trim().is_empty() => Ok(text),
            RawSeconds::Text(_) => Err(D::Error::custom("empty updatedAt")),
        }
    }
}
