use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};

use crate::datastore::{self, Storage};
use crate::datetime::next_day;
use crate::error::TaskError;
use crate::images::ImageAttachment;
use crate::markdown::{Note, ends_in_open_fence, toggle_checklist_item};
use crate::task::{PROGRESS_DONE, Task, is_valid_progress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateEdit {
    Start(Option<NaiveDate>),
    Completion(Option<NaiveDate>),
    Both {
        start: Option<NaiveDate>,
        completion: Option<NaiveDate>,
    },
}

impl DateEdit {
    /// Rejects a `Both` edit whose completion precedes its start. Single
    /// edits depend on the task's other date and are checked on apply.
    pub fn validate(&self) -> Result<(), TaskError> {
        if let DateEdit::Both {
            start: Some(start),
            completion: Some(completion),
        } = *self
            && completion < start
        {
            return Err(TaskError::CompletionBeforeStart { start, completion });
        }
        Ok(())
    }
}

/// Every mutation a task accepts. Each variant carries its own validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    SetTitle(String),
    SetProgress(u8),
    SetCompleted(bool),
    SetDates(DateEdit),
    SetDeleted(bool),
    SetNotes(String),
    ToggleChecklistItem(String),
    AttachImage(ImageAttachment),
}

/// A correction the store made on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adjustment {
    CompletionMoved {
        from: NaiveDate,
        to: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub task: Task,
    pub adjustment: Option<Adjustment>,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub reject_duplicates: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reject_duplicates: true,
        }
    }
}

/// In-memory task list mirrored to storage after every successful change.
/// A failed write is logged and the in-memory state is kept.
#[derive(Debug)]
pub struct TaskStore<S: Storage> {
    storage: S,
    tasks: Vec<Task>,
    options: StoreOptions,
}

impl<S: Storage> TaskStore<S> {
    #[instrument(skip(storage, options))]
    pub fn open(storage: S, options: StoreOptions) -> anyhow::Result<Self> {
        let tasks = datastore::load_tasks(&storage)?;
        info!(count = tasks.len(), "task store ready");
        Ok(Self {
            storage,
            tasks,
            options,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn next_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    #[instrument(skip(self))]
    pub fn add(&mut self, title: &str) -> Result<Task, TaskError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TaskError::EmptyTitle);
        }
        self.check_duplicate(title, None)?;

        let task = Task::new(self.next_id(), title.to_string());
        self.tasks.push(task.clone());
        self.tasks.sort_by_key(|t| t.id);
        debug!(id = task.id, "task added");
        self.persist();
        Ok(task)
    }

    #[instrument(skip(self, command), fields(command = command_name(&command)))]
    pub fn update(&mut self, id: u64, command: TaskCommand) -> Result<UpdateOutcome, TaskError> {
        if self.get(id).is_none() {
            return Err(TaskError::NotFound(id));
        }
        if let TaskCommand::SetTitle(title) = &command {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(TaskError::EmptyTitle);
            }
            self.check_duplicate(trimmed, Some(id))?;
        }

        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;

        let mut updated = task.clone();
        let adjustment = apply(&mut updated, command)?;
        *task = updated.clone();

        if let Some(Adjustment::CompletionMoved { from, to }) = &adjustment {
            warn!(id, %from, %to, "completion date moved after start date");
        }
        self.persist();
        Ok(UpdateOutcome {
            task: updated,
            adjustment,
        })
    }

    /// Drops every trashed task. Returns how many were removed.
    #[instrument(skip(self))]
    pub fn purge_deleted(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.delete_flg);
        let removed = before - self.tasks.len();
        info!(removed, after = self.tasks.len(), "purged deleted tasks");
        if removed > 0 {
            self.persist();
        }
        removed
    }

    fn check_duplicate(&self, title: &str, except: Option<u64>) -> Result<(), TaskError> {
        if !self.options.reject_duplicates {
            return Ok(());
        }
        let clash = self
            .tasks
            .iter()
            .filter(|t| Some(t.id) != except)
            .any(|t| t.same_title(title));
        if clash {
            return Err(TaskError::DuplicateTitle(title.to_string()));
        }
        Ok(())
    }

    fn persist(&mut self) {
        if let Err(err) = datastore::save_tasks(&mut self.storage, &self.tasks) {
            let message = format!("{err:#}");
            error!(error = %message, count = self.tasks.len(), "failed to save tasks; in-memory state kept");
        }
    }
}

fn command_name(command: &TaskCommand) -> &'static str {
    match command {
        TaskCommand::SetTitle(_) => "set_title",
        TaskCommand::SetProgress(_) => "set_progress",
        TaskCommand::SetCompleted(_) => "set_completed",
        TaskCommand::SetDates(_) => "set_dates",
        TaskCommand::SetDeleted(_) => "set_deleted",
        TaskCommand::SetNotes(_) => "set_notes",
        TaskCommand::ToggleChecklistItem(_) => "toggle_checklist_item",
        TaskCommand::AttachImage(_) => "attach_image",
    }
}

/// Applies one command to a working copy. On error the copy is discarded.
fn apply(task: &mut Task, command: TaskCommand) -> Result<Option<Adjustment>, TaskError> {
    match command {
        TaskCommand::SetTitle(title) => {
            if task.title_locked() {
                return Err(TaskError::TitleLocked(task.id));
            }
            task.title = title.trim().to_string();
        }
        TaskCommand::SetProgress(rate) => {
            if !is_valid_progress(rate) {
                return Err(TaskError::InvalidProgress(rate));
            }
            if task.is_locked() {
                return Err(TaskError::Locked(task.id));
            }
            task.progress_rate = rate;
            task.completed_flg = rate == PROGRESS_DONE;
        }
        TaskCommand::SetCompleted(done) => {
            task.completed_flg = done;
            task.progress_rate = if done { PROGRESS_DONE } else { 0 };
        }
        TaskCommand::SetDates(edit) => {
            if task.is_locked() {
                return Err(TaskError::Locked(task.id));
            }
            return apply_dates(task, edit);
        }
        TaskCommand::SetDeleted(deleted) => task.delete_flg = deleted,
        TaskCommand::SetNotes(text) => {
            task.improvements = text;
            prune_images(task);
        }
        TaskCommand::ToggleChecklistItem(item) => {
            task.improvements = toggle_checklist_item(&task.improvements, &item).ok_or(
                TaskError::NoSuchChecklistItem {
                    id: task.id,
                    item: item.clone(),
                },
            )?;
        }
        TaskCommand::AttachImage(image) => {
            if !task.improvements.is_empty() && !task.improvements.ends_with('\n') {
                task.improvements.push('\n');
            }
            if ends_in_open_fence(&task.improvements) {
                task.improvements.push_str("```\n");
            }
            task.improvements.push_str(&image.markdown());
            task.improvements.push('\n');
            task.images.insert(image.token, image.data_url);
        }
    }
    Ok(None)
}

fn apply_dates(task: &mut Task, edit: DateEdit) -> Result<Option<Adjustment>, TaskError> {
    match edit {
        DateEdit::Start(start) => {
            task.start_date = start;
            if let (Some(start), Some(completion)) = (start, task.scheduled_completion_date)
                && start > completion
            {
                let moved = next_day(start);
                task.scheduled_completion_date = Some(moved);
                return Ok(Some(Adjustment::CompletionMoved {
                    from: completion,
                    to: moved,
                }));
            }
        }
        DateEdit::Completion(completion) => {
            if let (Some(start), Some(completion)) = (task.start_date, completion)
                && completion < start
            {
                return Err(TaskError::CompletionBeforeStart { start, completion });
            }
            task.scheduled_completion_date = completion;
        }
        DateEdit::Both { start, completion } => {
            edit.validate()?;
            task.start_date = start;
            task.scheduled_completion_date = completion;
        }
    }
    Ok(None)
}

/// Forget images the notes no longer reference.
fn prune_images(task: &mut Task) {
    if task.images.is_empty() {
        return;
    }
    let referenced = Note::parse(&task.improvements).image_tokens();
    task.images.retain(|token, _| referenced.contains(token));
}
