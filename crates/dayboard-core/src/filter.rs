use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::task::{
  PROGRESS_DONE,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize
)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
  #[default]
  All,
  Completed,
  Unchecked,
  Delete
}

impl FilterMode {
  pub const ALL_MODES: [FilterMode; 4] = [
    FilterMode::All,
    FilterMode::Completed,
    FilterMode::Unchecked,
    FilterMode::Delete
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | FilterMode::All => "all",
      | FilterMode::Completed => {
        "completed"
      }
      | FilterMode::Unchecked => {
        "unchecked"
      }
      | FilterMode::Delete => "delete"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | FilterMode::All => "All Tasks",
      | FilterMode::Completed => {
        "Completed Tasks"
      }
      | FilterMode::Unchecked => {
        "Current Tasks"
      }
      | FilterMode::Delete => "Trash"
    }
  }

  /// The add form is only offered on
  /// the everyday views.
  pub fn allows_add(self) -> bool {
    matches!(
      self,
      FilterMode::All
        | FilterMode::Unchecked
    )
  }

  /// "Empty Trash" lives on the trash
  /// view only.
  pub fn allows_purge(self) -> bool {
    self == FilterMode::Delete
  }

  pub fn matches(
    self,
    task: &Task,
    reference: NaiveDate,
    today: NaiveDate
  ) -> bool {
    match self {
      | FilterMode::Completed => {
        task.completed_flg
          && !task.delete_flg
      }
      | FilterMode::Unchecked => {
        task.progress_rate
          < PROGRESS_DONE
          && !task.delete_flg
      }
      | FilterMode::Delete => {
        task.delete_flg
      }
      | FilterMode::All => {
        if reference == today {
          !task.delete_flg
        } else {
          task.start_date
            == Some(reference)
            && !task.delete_flg
        }
      }
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(FilterMode::All),
      | "completed" | "done" => {
        Ok(FilterMode::Completed)
      }
      | "unchecked" | "current" => {
        Ok(FilterMode::Unchecked)
      }
      | "delete" | "deleted"
      | "trash" => {
        Ok(FilterMode::Delete)
      }
      | other => {
        Err(anyhow!(
          "unknown filter: {other} \
           (expected all, completed, \
           unchecked or delete)"
        ))
      }
    }
  }
}

/// Visible subset for a day view, in
/// the store's ascending id order.
#[tracing::instrument(skip(
  tasks, reference, today
))]
pub fn visible<'a>(
  tasks: &'a [Task],
  mode: FilterMode,
  reference: NaiveDate,
  today: NaiveDate
) -> Vec<&'a Task> {
  let out: Vec<&Task> = tasks
    .iter()
    .filter(|task| {
      mode.matches(
        task, reference, today
      )
    })
    .collect();

  trace!(
    total = tasks.len(),
    visible = out.len(),
    mode = %mode,
    "applied filter"
  );
  out
}
