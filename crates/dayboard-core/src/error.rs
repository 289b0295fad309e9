use chrono::NaiveDate;
use thiserror::Error;

/// Validation failures surfaced to the user. None of these change state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task title cannot be empty")]
    EmptyTitle,

    #[error("a task titled \"{0}\" already exists")]
    DuplicateTitle(String),

    #[error("task {0} not found")]
    NotFound(u64),

    #[error("progress must be a multiple of 10 between 0 and 100, got {0}")]
    InvalidProgress(u8),

    #[error(
        "completion date {completion} must be on or after the start date {start}; \
         choose a date after the start date"
    )]
    CompletionBeforeStart {
        start: NaiveDate,
        completion: NaiveDate,
    },

    #[error("task {0} is completed or in the trash; reopen or restore it first")]
    Locked(u64),

    #[error("task {0} is at 100% progress; its title can no longer be edited")]
    TitleLocked(u64),

    #[error("task {id} has no checklist item \"{item}\"")]
    NoSuchChecklistItem { id: u64, item: String },

    #[error("only image files can be attached: {0}")]
    NotAnImage(String),

    #[error("image {name} is {size} bytes, above the {limit} byte limit")]
    ImageTooLarge {
        name: String,
        size: usize,
        limit: usize,
    },

    #[error("set a start and completion date for every task first (missing on: {})", format_ids(.0))]
    MissingDates(Vec<u64>),
}

fn format_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::TaskError;

    #[test]
    fn missing_dates_lists_every_id() {
        let err = TaskError::MissingDates(vec![2, 5]);
        assert_eq!(
            err.to_string(),
            "set a start and completion date for every task first (missing on: 2, 5)"
        );
    }
}
