use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::datetime::day_serde;

pub const PROGRESS_STEP: u8 = 10;
pub const PROGRESS_DONE: u8 = 100;

/// Field names match the stored task list so older records load as-is.
/// Fields added later default when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,

    pub title: String,

    #[serde(default)]
    pub completed_flg: bool,

    #[serde(default)]
    pub delete_flg: bool,

    #[serde(default)]
    pub progress_rate: u8,

    #[serde(default, with = "day_serde")]
    pub start_date: Option<NaiveDate>,

    #[serde(default, with = "day_serde")]
    pub scheduled_completion_date: Option<NaiveDate>,

    #[serde(default)]
    pub improvements: String,

    /// Image token -> `data:` URL, referenced from notes as `img:<token>`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,
}

impl Task {
    pub fn new(id: u64, title: String) -> Self {
        Self {
            id,
            title,
            completed_flg: false,
            delete_flg: false,
            progress_rate: 0,
            start_date: None,
            scheduled_completion_date: None,
            improvements: String::new(),
            images: BTreeMap::new(),
        }
    }

    /// Neither completed nor in the trash.
    pub fn is_active(&self) -> bool {
        !self.delete_flg && !self.completed_flg
    }

    /// Progress and dates are frozen once a task is completed or trashed.
    pub fn is_locked(&self) -> bool {
        self.completed_flg || self.delete_flg
    }

    pub fn title_locked(&self) -> bool {
        self.progress_rate == PROGRESS_DONE
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.start_date?, self.scheduled_completion_date?))
    }

    pub fn same_title(&self, other: &str) -> bool {
        self.title.trim().to_lowercase() == other.trim().to_lowercase()
    }
}

pub fn is_valid_progress(value: u8) -> bool {
    value <= PROGRESS_DONE && value % PROGRESS_STEP == 0
}
