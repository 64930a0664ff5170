pub mod achievement;
pub mod calendar;
pub mod error;
pub mod habit;
pub mod habit_service;
pub mod service;
pub mod storage;
pub mod streak;
pub mod task;
pub mod task_list;

pub use crate::service::{DailyTrack, DailyTrackBuilder};
