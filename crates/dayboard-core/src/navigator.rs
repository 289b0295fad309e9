use chrono::NaiveDate;
use tracing::debug;

use crate::datetime::{add_days, format_display, parse_day_param};
use crate::filter::{self, FilterMode};
use crate::task::Task;

/// Cursor over the day being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateNavigator {
    reference: NaiveDate,
}

impl DateNavigator {
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference }
    }

    /// Reads the `date` navigation parameter. Anything that is not a real
    /// `YYYY-MM-DD` day silently falls back to `today`.
    pub fn from_param(param: Option<&str>, today: NaiveDate) -> Self {
        let reference = match param {
            Some(raw) => parse_day_param(raw).unwrap_or_else(|| {
                debug!(param = %raw, "ignoring unparseable day parameter");
                today
            }),
            None => today,
        };
        Self { reference }
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn forward(self) -> Self {
        Self::new(add_days(self.reference, 1))
    }

    pub fn back(self) -> Self {
        Self::new(add_days(self.reference, -1))
    }

    pub fn label(&self) -> String {
        format_display(self.reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    NextDay,
    PreviousDay,
    SetFilter(FilterMode),
    ToggleDetail(u64),
    CloseDetail,
    TrashEmptied,
}

/// State of the day-detail screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub navigator: DateNavigator,
    pub filter: FilterMode,
    /// At most one task has its notes panel expanded.
    pub open_detail: Option<u64>,
    pub today: NaiveDate,
}

impl DayView {
    pub fn new(navigator: DateNavigator, filter: FilterMode, today: NaiveDate) -> Self {
        Self {
            navigator,
            filter,
            open_detail: None,
            today,
        }
    }

    #[must_use]
    pub fn reduce(self, action: ViewAction) -> Self {
        match action {
            ViewAction::NextDay => Self {
                navigator: self.navigator.forward(),
                filter: FilterMode::All,
                open_detail: None,
                ..self
            },
            ViewAction::PreviousDay => Self {
                navigator: self.navigator.back(),
                filter: FilterMode::All,
                open_detail: None,
                ..self
            },
            ViewAction::SetFilter(filter) => Self {
                filter,
                open_detail: None,
                ..self
            },
            ViewAction::ToggleDetail(id) => Self {
                open_detail: if self.open_detail == Some(id) {
                    None
                } else {
                    Some(id)
                },
                ..self
            },
            ViewAction::CloseDetail | ViewAction::TrashEmptied => Self {
                open_detail: None,
                ..self
            },
        }
    }

    pub fn reference(&self) -> NaiveDate {
        self.navigator.reference()
    }

    pub fn header(&self) -> String {
        self.navigator.label()
    }

    pub fn visible<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        filter::visible(tasks, self.filter, self.reference(), self.today)
    }
}
