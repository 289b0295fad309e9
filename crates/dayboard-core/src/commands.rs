use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{self, DEFAULT_EVENT_COLOR, day_click};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::{self, Storage};
use crate::datetime::parse_day_expr;
use crate::error::TaskError;
use crate::filter::FilterMode;
use crate::images::{DEFAULT_MAX_BYTES, read_image};
use crate::markdown;
use crate::navigator::{DateNavigator, DayView, ViewAction};
use crate::render::Renderer;
use crate::store::{Adjustment, DateEdit, TaskCommand, TaskStore, UpdateOutcome};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "day", "list", "title", "progress", "done", "reopen", "schedule", "delete",
        "restore", "purge", "notes", "check", "attach", "show", "calendar", "export", "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs besides its arguments.
pub struct Session<'a, S: Storage, W: Write> {
    pub store: &'a mut TaskStore<S>,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub out: &'a mut W,
    pub today: NaiveDate,
}

#[instrument(skip(ctx, inv), fields(command = %inv.command))]
pub fn dispatch<S: Storage, W: Write>(
    ctx: &mut Session<'_, S, W>,
    inv: Invocation,
) -> anyhow::Result<()> {
    let args = inv.args.as_slice();
    debug!(args = ?args, "dispatching command");

    match inv.command.as_str() {
        "add" => cmd_add(ctx, args),
        "day" => cmd_day(ctx, args),
        "list" => cmd_list(ctx, args),
        "title" => cmd_title(ctx, args),
        "progress" => cmd_progress(ctx, args),
        "done" => cmd_set_completed(ctx, args, true),
        "reopen" => cmd_set_completed(ctx, args, false),
        "schedule" => cmd_schedule(ctx, args),
        "delete" => cmd_set_deleted(ctx, args, true),
        "restore" => cmd_set_deleted(ctx, args, false),
        "purge" => cmd_purge(ctx),
        "notes" => cmd_notes(ctx, args),
        "check" => cmd_check(ctx, args),
        "attach" => cmd_attach(ctx, args),
        "show" => cmd_show(ctx, args),
        "calendar" => cmd_calendar(ctx, args),
        "export" => cmd_export(ctx),
        "help" => cmd_help(ctx),
        "version" => {
            writeln!(ctx.out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    Start(Option<NaiveDate>),
    End(Option<NaiveDate>),
    Filter(FilterMode),
    Open(u64),
    Click(NaiveDate),
}

/// Splits `key:value` modifiers from free words. Words after `--` are
/// always free.
fn parse_words_and_mods(args: &[String], today: NaiveDate) -> anyhow::Result<(Vec<String>, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, today)? {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    Ok((words, mods))
}

fn parse_one_mod(tok: &str, today: NaiveDate) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "start" => Ok(Some(Mod::Start(parse_day_expr(value, today)?))),
        "end" | "completion" => Ok(Some(Mod::End(parse_day_expr(value, today)?))),
        "filter" => Ok(Some(Mod::Filter(value.parse()?))),
        "open" => {
            let id = value
                .parse::<u64>()
                .with_context(|| format!("open: expects a task id, got {value}"))?;
            Ok(Some(Mod::Open(id)))
        }
        "click" => {
            let day = parse_day_expr(value, today)?
                .ok_or_else(|| anyhow!("click: needs a date"))?;
            Ok(Some(Mod::Click(day)))
        }
        _ => Ok(None),
    }
}

/// Folds `start:`/`end:` modifiers into one date edit.
fn date_edit(mods: &[Mod]) -> Option<DateEdit> {
    let mut start = None;
    let mut end = None;
    for one_mod in mods {
        match one_mod {
            Mod::Start(day) => start = Some(*day),
            Mod::End(day) => end = Some(*day),
            _ => {}
        }
    }

    match (start, end) {
        (Some(start), Some(completion)) => Some(DateEdit::Both { start, completion }),
        (Some(start), None) => Some(DateEdit::Start(start)),
        (None, Some(completion)) => Some(DateEdit::Completion(completion)),
        (None, None) => None,
    }
}

fn parse_id(args: &[String], command: &str) -> anyhow::Result<u64> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("{command}: a task id is required"))?;
    raw.parse::<u64>()
        .with_context(|| format!("{command}: invalid task id {raw}"))
}

fn report_outcome<S: Storage, W: Write>(
    ctx: &mut Session<'_, S, W>,
    verb: &str,
    outcome: &UpdateOutcome,
) -> anyhow::Result<()> {
    writeln!(ctx.out, "{verb} task {}.", outcome.task.id)?;
    if let Some(Adjustment::CompletionMoved { from, to }) = &outcome.adjustment {
        ctx.renderer.notice(
            ctx.out,
            &format!(
                "Completion date moved from {from} to {to} so it stays after the start date."
            ),
        )?;
    }
    Ok(())
}

#[instrument(skip(ctx, args))]
fn cmd_add<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let filter = datastore::load_filter(ctx.store.storage());
    if !filter.allows_add() {
        return Err(anyhow!(
            "tasks cannot be added while showing {}; switch with `dayboard day filter:all`",
            filter.label()
        ));
    }

    let (words, mods) = parse_words_and_mods(args, ctx.today)?;
    let edit = date_edit(&mods);
    if let Some(edit) = &edit {
        edit.validate()?;
    }

    let task = ctx.store.add(&words.join(" "))?;
    writeln!(ctx.out, "Created task {}.", task.id)?;

    if let Some(edit) = edit {
        let outcome = ctx.store.update(task.id, TaskCommand::SetDates(edit))?;
        report_outcome(ctx, "Scheduled", &outcome)?;
    }
    Ok(())
}

/// The day view: optional date, then `next`/`prev` steps applied in order.
#[instrument(skip(ctx, args))]
fn cmd_day<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let (words, mods) = parse_words_and_mods(args, ctx.today)?;

    let mut words = words.iter().map(String::as_str).peekable();
    let param = match words.peek() {
        Some(first) if !is_step(first) => words.next(),
        _ => None,
    };

    let stored = datastore::load_filter(ctx.store.storage());
    let mut view = DayView::new(DateNavigator::from_param(param, ctx.today), stored, ctx.today);

    for word in words {
        let action = match word.to_ascii_lowercase().as_str() {
            "next" | "n" => ViewAction::NextDay,
            "prev" | "previous" | "p" => ViewAction::PreviousDay,
            other => {
                warn!(word = %other, "ignoring unrecognized day view word");
                continue;
            }
        };
        view = view.reduce(action);
    }

    for one_mod in &mods {
        match one_mod {
            Mod::Filter(mode) => view = view.reduce(ViewAction::SetFilter(*mode)),
            Mod::Open(id) => view = view.reduce(ViewAction::ToggleDetail(*id)),
            other => warn!(modifier = ?other, "modifier has no meaning in the day view"),
        }
    }

    show_day(ctx, view, stored)
}

fn is_step(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "next" | "n" | "prev" | "previous" | "p"
    )
}

fn show_day<S: Storage, W: Write>(
    ctx: &mut Session<'_, S, W>,
    view: DayView,
    stored: FilterMode,
) -> anyhow::Result<()> {
    if view.filter != stored {
        debug!(from = %stored, to = %view.filter, "saving filter");
        if let Err(err) = datastore::save_filter(ctx.store.storage_mut(), view.filter) {
            let message = format!("{err:#}");
            tracing::error!(error = %message, "failed to save filter state");
        }
    }
    ctx.renderer
        .print_day_view(ctx.out, &view, ctx.store.tasks())
}

#[instrument(skip(ctx, args))]
fn cmd_list<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let (_, mods) = parse_words_and_mods(args, ctx.today)?;
    let stored = datastore::load_filter(ctx.store.storage());
    let mut view = DayView::new(DateNavigator::new(ctx.today), stored, ctx.today);
    for one_mod in mods {
        if let Mod::Filter(mode) = one_mod {
            view = view.reduce(ViewAction::SetFilter(mode));
        }
    }
    show_day(ctx, view, stored)
}

#[instrument(skip(ctx, args))]
fn cmd_title<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "title")?;
    let outcome = ctx
        .store
        .update(id, TaskCommand::SetTitle(args[1..].join(" ")))?;
    report_outcome(ctx, "Renamed", &outcome)
}

#[instrument(skip(ctx, args))]
fn cmd_progress<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "progress")?;
    let raw = args
        .get(1)
        .ok_or_else(|| anyhow!("progress: a value between 0 and 100 is required"))?;
    let rate = raw
        .trim_end_matches('%')
        .parse::<u8>()
        .with_context(|| format!("progress: invalid value {raw}"))?;
    let outcome = ctx.store.update(id, TaskCommand::SetProgress(rate))?;
    report_outcome(ctx, "Updated", &outcome)
}

#[instrument(skip(ctx, args))]
fn cmd_set_completed<S: Storage, W: Write>(
    ctx: &mut Session<'_, S, W>,
    args: &[String],
    done: bool,
) -> anyhow::Result<()> {
    let id = parse_id(args, if done { "done" } else { "reopen" })?;
    let outcome = ctx.store.update(id, TaskCommand::SetCompleted(done))?;
    report_outcome(ctx, if done { "Completed" } else { "Reopened" }, &outcome)
}

#[instrument(skip(ctx, args))]
fn cmd_schedule<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "schedule")?;
    let (_, mods) = parse_words_and_mods(&args[1..], ctx.today)?;
    let edit = date_edit(&mods).ok_or_else(|| anyhow!("schedule: give start:DATE and/or end:DATE"))?;
    let outcome = ctx.store.update(id, TaskCommand::SetDates(edit))?;
    report_outcome(ctx, "Scheduled", &outcome)
}

#[instrument(skip(ctx, args))]
fn cmd_set_deleted<S: Storage, W: Write>(
    ctx: &mut Session<'_, S, W>,
    args: &[String],
    deleted: bool,
) -> anyhow::Result<()> {
    let id = parse_id(args, if deleted { "delete" } else { "restore" })?;
    let outcome = ctx.store.update(id, TaskCommand::SetDeleted(deleted))?;
    report_outcome(ctx, if deleted { "Trashed" } else { "Restored" }, &outcome)
}

#[instrument(skip(ctx))]
fn cmd_purge<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>) -> anyhow::Result<()> {
    let filter = datastore::load_filter(ctx.store.storage());
    if !filter.allows_purge() {
        return Err(anyhow!(
            "the trash can only be emptied from the trash view; run `dayboard day filter:delete` first"
        ));
    }
    let removed = ctx.store.purge_deleted();
    writeln!(ctx.out, "Purged {removed} task(s).")?;
    Ok(())
}

#[instrument(skip(ctx, args))]
fn cmd_notes<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "notes")?;
    let task = ctx
        .store
        .get(id)
        .cloned()
        .ok_or(TaskError::NotFound(id))?;

    match args.get(1).map(String::as_str) {
        None => ctx.renderer.print_notes(ctx.out, &task),
        Some("html") => {
            writeln!(ctx.out, "{}", markdown::render(&task.improvements, &task.images))?;
            Ok(())
        }
        Some("template") => {
            if !task.improvements.trim().is_empty() {
                return Err(anyhow!("notes: task {id} already has notes"));
            }
            let outcome = ctx
                .store
                .update(id, TaskCommand::SetNotes(ctx.cfg.notes_template()))?;
            report_outcome(ctx, "Templated notes on", &outcome)
        }
        Some("set") => {
            let outcome = ctx
                .store
                .update(id, TaskCommand::SetNotes(args[2..].join(" ")))?;
            report_outcome(ctx, "Updated notes on", &outcome)
        }
        Some("-") => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed reading notes from stdin")?;
            let outcome = ctx.store.update(id, TaskCommand::SetNotes(text))?;
            report_outcome(ctx, "Updated notes on", &outcome)
        }
        Some(other) => Err(anyhow!(
            "notes: unknown action {other} (expected html, template, set or -)"
        )),
    }
}

#[instrument(skip(ctx, args))]
fn cmd_check<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "check")?;
    let item = args
        .get(1)
        .ok_or_else(|| anyhow!("check: a checklist item id is required"))?;
    let outcome = ctx
        .store
        .update(id, TaskCommand::ToggleChecklistItem(item.clone()))?;
    report_outcome(ctx, "Toggled checklist on", &outcome)
}

#[instrument(skip(ctx, args))]
fn cmd_attach<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "attach")?;
    let path = args
        .get(1)
        .ok_or_else(|| anyhow!("attach: an image path is required"))?;
    if ctx.store.get(id).is_none() {
        return Err(TaskError::NotFound(id).into());
    }

    let max_bytes = ctx
        .cfg
        .get_usize("images.max_bytes")?
        .unwrap_or(DEFAULT_MAX_BYTES);
    let image = read_image(Path::new(path), max_bytes)?;
    let outcome = ctx.store.update(id, TaskCommand::AttachImage(image))?;
    report_outcome(ctx, "Attached image to", &outcome)
}

#[instrument(skip(ctx, args))]
fn cmd_show<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    let id = parse_id(args, "show")?;
    let task = ctx
        .store
        .get(id)
        .ok_or(TaskError::NotFound(id))?;
    ctx.renderer.print_task_info(ctx.out, task)
}

#[instrument(skip(ctx, args))]
fn cmd_calendar<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>, args: &[String]) -> anyhow::Result<()> {
    if ctx.cfg.get_bool("calendar.require_dates").unwrap_or(true) {
        calendar::ensure_schedulable(ctx.store.tasks())?;
    }

    let (words, mods) = parse_words_and_mods(args, ctx.today)?;

    if let Some(day) = mods.iter().find_map(|m| match m {
        Mod::Click(day) => Some(*day),
        _ => None,
    }) {
        let link = day_click(day);
        info!(path = %link.path(), "opening day from calendar");
        let stored = datastore::load_filter(ctx.store.storage());
        let view = DayView::new(link.open(ctx.today), stored, ctx.today);
        return show_day(ctx, view, stored);
    }

    let mut focus = ctx.today;
    let mut as_json = false;
    for word in &words {
        if word.eq_ignore_ascii_case("json") {
            as_json = true;
        } else {
            focus = parse_month(word)?;
        }
    }

    let color = ctx
        .cfg
        .get("calendar.color")
        .unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string());
    let all = calendar::events(ctx.store.tasks(), &color);
    let in_month = calendar::events_in_month(&all, focus.year(), focus.month());

    if as_json {
        writeln!(ctx.out, "{}", serde_json::to_string_pretty(&in_month)?)?;
        return Ok(());
    }

    ctx.renderer
        .print_month(ctx.out, focus, &in_month, ctx.today)?;
    if !in_month.is_empty() {
        writeln!(ctx.out)?;
        ctx.renderer.print_events(ctx.out, &in_month)?;
    }
    Ok(())
}

fn parse_month(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .with_context(|| format!("calendar: expected YYYY-MM, got {raw}"))
}

#[instrument(skip(ctx))]
fn cmd_export<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(ctx.store.tasks())?;
    writeln!(ctx.out, "{json}")?;
    Ok(())
}

fn cmd_help<S: Storage, W: Write>(ctx: &mut Session<'_, S, W>) -> anyhow::Result<()> {
    let filters = FilterMode::ALL_MODES
        .iter()
        .map(|mode| mode.as_str())
        .collect::<Vec<_>>()
        .join("|");
    writeln!(ctx.out, "Commands: {}", known_command_names().join(", "))?;
    writeln!(ctx.out, "Dates: YYYY-MM-DD, today, tomorrow, yesterday, none")?;
    writeln!(
        ctx.out,
        "Modifiers: start:DATE end:DATE filter:{filters} open:ID click:DATE"
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::{Mod, Session, date_edit, dispatch, expand_command_abbrev, known_command_names, parse_words_and_mods};
    use crate::cli::Invocation;
    use crate::config::Config;
    use crate::datastore::{self, MemoryStore};
    use crate::filter::FilterMode;
    use crate::render::Renderer;
    use crate::store::{DateEdit, StoreOptions, TaskStore};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn run(store: &mut TaskStore<MemoryStore>, cfg: &Config, words: &[&str]) -> anyhow::Result<String> {
        let renderer = Renderer::plain();
        let mut out = Vec::new();
        let inv = Invocation {
            command: words[0].to_string(),
            args: words[1..].iter().map(|w| w.to_string()).collect(),
        };
        let mut ctx = Session {
            store,
            cfg,
            renderer: &renderer,
            out: &mut out,
            today: day(2024, 7, 2),
        };
        dispatch(&mut ctx, inv)?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    fn fresh() -> TaskStore<MemoryStore> {
        TaskStore::open(MemoryStore::new(), StoreOptions::default()).expect("open")
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("pu", &known), Some("purge"));
        assert_eq!(expand_command_abbrev("re", &known), None);
        assert_eq!(expand_command_abbrev("day", &known), Some("day"));
    }

    #[test]
    fn modifiers_split_from_words() {
        let today = day(2024, 7, 2);
        let args: Vec<String> = ["buy", "milk", "start:today", "end:2024-07-05", "--", "x:y"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (words, mods) = parse_words_and_mods(&args, today).expect("parse");
        assert_eq!(words, vec!["buy", "milk", "x:y"]);
        assert_eq!(
            mods,
            vec![Mod::Start(Some(today)), Mod::End(Some(day(2024, 7, 5)))]
        );
        assert_eq!(
            date_edit(&mods),
            Some(DateEdit::Both {
                start: Some(today),
                completion: Some(day(2024, 7, 5))
            })
        );
        assert!(parse_words_and_mods(&["start:someday".to_string()], today).is_err());
    }

    #[test]
    fn add_schedule_and_adjust() {
        let cfg = Config::defaults();
        let mut store = fresh();
        let out = run(&mut store, &cfg, &["add", "write", "report", "start:2024-07-01", "end:2024-07-03"])
            .expect("add");
        assert!(out.starts_with("Created task 1.\n"));

        let out = run(&mut store, &cfg, &["schedule", "1", "start:2024-07-10"]).expect("schedule");
        assert!(out.contains("moved from 2024-07-03 to 2024-07-11"));
        let task = store.get(1).expect("task");
        assert_eq!(task.scheduled_completion_date, Some(day(2024, 7, 11)));

        assert!(run(&mut store, &cfg, &["schedule", "1", "end:2024-07-01"]).is_err());
        assert!(run(&mut store, &cfg, &["add", "  Write Report "]).is_err());
    }

    #[test]
    fn add_with_reversed_dates_creates_nothing() {
        let cfg = Config::defaults();
        let mut store = fresh();
        let err = run(&mut store, &cfg, &["add", "trip", "start:2024-07-05", "end:2024-07-01"])
            .expect_err("reversed dates");
        assert!(err.to_string().contains("must be on or after the start date"));
        assert!(store.tasks().is_empty());
        assert_eq!(store.storage().raw(datastore::TASKS_KEY), None);
    }

    #[test]
    fn filter_choice_is_remembered_and_gates_add_and_purge() {
        let cfg = Config::defaults();
        let mut store = fresh();
        run(&mut store, &cfg, &["add", "old"]).expect("add");
        run(&mut store, &cfg, &["delete", "1"]).expect("delete");
        assert!(run(&mut store, &cfg, &["purge"]).is_err());

        let out = run(&mut store, &cfg, &["day", "filter:delete"]).expect("day");
        assert!(out.contains("filter: Trash"));
        assert_eq!(datastore::load_filter(store.storage()), FilterMode::Delete);

        assert!(run(&mut store, &cfg, &["add", "new"]).is_err());
        let out = run(&mut store, &cfg, &["purge"]).expect("purge");
        assert_eq!(out, "Purged 1 task(s).\n");
        assert!(store.tasks().is_empty());

        run(&mut store, &cfg, &["day", "next"]).expect("step");
        assert_eq!(datastore::load_filter(store.storage()), FilterMode::All);
    }

    #[test]
    fn day_view_for_other_day_shows_tasks_starting_then() {
        let cfg = Config::defaults();
        let mut store = fresh();
        run(&mut store, &cfg, &["add", "first", "start:2024-07-01"]).expect("add");
        run(&mut store, &cfg, &["add", "second", "start:2024-07-03"]).expect("add");

        let out = run(&mut store, &cfg, &["day", "2024-07-02", "next"]).expect("day");
        assert!(out.starts_with("JULY 3, 2024\n"));
        assert!(out.contains("second"));
        assert!(!out.contains("first"));
    }

    #[test]
    fn calendar_requires_dates_unless_disabled() {
        let mut cfg = Config::defaults();
        let mut store = fresh();
        run(&mut store, &cfg, &["add", "undated"]).expect("add");
        let err = run(&mut store, &cfg, &["calendar"]).expect_err("missing dates");
        assert!(err.to_string().contains("missing on: 1"));

        cfg.apply_overrides(vec![("calendar.require_dates".to_string(), "off".to_string())]);
        let out = run(&mut store, &cfg, &["calendar", "2024-07", "json"]).expect("calendar");
        assert_eq!(out.trim(), "[]");
    }

    #[test]
    fn calendar_json_and_click() {
        let cfg = Config::defaults();
        let mut store = fresh();
        run(&mut store, &cfg, &["add", "trip", "start:2024-07-30", "end:2024-08-01"]).expect("add");

        let out = run(&mut store, &cfg, &["calendar", "2024-08", "json"]).expect("json");
        let json: serde_json::Value = serde_json::from_str(&out).expect("valid json");
        assert_eq!(json[0]["end"], "2024-08-02");
        assert_eq!(json[0]["allDay"], true);

        let out = run(&mut store, &cfg, &["calendar", "click:2024-07-30"]).expect("click");
        assert!(out.starts_with("JULY 30, 2024\n"));
        assert!(out.contains("trip"));
    }

    #[test]
    fn notes_template_set_and_check() {
        let cfg = Config::defaults();
        let mut store = fresh();
        run(&mut store, &cfg, &["add", "plan"]).expect("add");
        run(&mut store, &cfg, &["notes", "1", "template"]).expect("template");
        assert!(store.get(1).expect("task").improvements.starts_with("## Progress Status"));
        assert!(run(&mut store, &cfg, &["notes", "1", "template"]).is_err());

        run(&mut store, &cfg, &["notes", "1", "set", "- [ ] call bob"]).expect("set");
        run(&mut store, &cfg, &["check", "1", "call-bob"]).expect("check");
        assert_eq!(store.get(1).expect("task").improvements, "- [x] call bob");

        let out = run(&mut store, &cfg, &["notes", "1", "html"]).expect("html");
        assert!(out.contains("checked"));
    }

    #[test]
    fn progress_and_completion_stay_in_step() {
        let cfg = Config::defaults();
        let mut store = fresh();
        run(&mut store, &cfg, &["add", "x"]).expect("add");
        run(&mut store, &cfg, &["progress", "1", "100%"]).expect("progress");
        assert!(store.get(1).expect("task").completed_flg);
        assert!(run(&mut store, &cfg, &["progress", "1", "50"]).is_err());

        run(&mut store, &cfg, &["reopen", "1"]).expect("reopen");
        let task = store.get(1).expect("task");
        assert!(!task.completed_flg);
        assert_eq!(task.progress_rate, 0);
        assert!(run(&mut store, &cfg, &["progress", "1", "55"]).is_err());
    }
}
