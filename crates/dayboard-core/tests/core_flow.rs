use std::ffi::OsString;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use dayboard_core::datastore::{self, FileStore, Storage};
use dayboard_core::filter::{self, FilterMode};
use dayboard_core::store::{DateEdit, StoreOptions, TaskCommand, TaskStore};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn run_cli(data: &Path, words: &[&str]) -> anyhow::Result<()> {
    let mut args: Vec<OsString> = vec![
        "dayboard".into(),
        "--rcfile".into(),
        "/dev/null".into(),
        "--data".into(),
        data.as_os_str().to_os_string(),
    ];
    args.extend(words.iter().map(OsString::from));
    dayboard_core::run(args)
}

#[test]
fn file_store_round_trip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStore::open(temp.path()).expect("open datastore");
    let mut store = TaskStore::open(storage, StoreOptions::default()).expect("open store");

    let first = store.add("Write report").expect("add first");
    let second = store.add("Review notes").expect("add second");
    store
        .update(
            second.id,
            TaskCommand::SetDates(DateEdit::Both {
                start: Some(day(2024, 7, 2)),
                completion: Some(day(2024, 7, 4)),
            }),
        )
        .expect("schedule");
    store
        .update(first.id, TaskCommand::SetProgress(100))
        .expect("progress");

    let reopened = TaskStore::open(
        FileStore::open(temp.path()).expect("reopen datastore"),
        StoreOptions::default(),
    )
    .expect("reopen store");
    assert_eq!(reopened.tasks(), store.tasks());

    let visible: Vec<u64> = filter::visible(
        reopened.tasks(),
        FilterMode::All,
        day(2024, 7, 2),
        day(2024, 7, 9),
    )
    .iter()
    .map(|t| t.id)
    .collect();
    assert_eq!(visible, vec![second.id]);

    let completed: Vec<u64> = filter::visible(
        reopened.tasks(),
        FilterMode::Completed,
        day(2024, 7, 9),
        day(2024, 7, 9),
    )
    .iter()
    .map(|t| t.id)
    .collect();
    assert_eq!(completed, vec![first.id]);
}

#[test]
fn stored_json_uses_original_keys() {
    let temp = tempdir().expect("tempdir");
    let mut storage = FileStore::open(temp.path()).expect("open datastore");
    datastore::save_filter(&mut storage, FilterMode::Unchecked).expect("save filter");

    let mut store = TaskStore::open(storage, StoreOptions::default()).expect("open store");
    store.add("Plan week").expect("add");

    let raw = fs::read_to_string(temp.path().join("todos.json")).expect("todos file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json[0]["id"], 1);
    assert_eq!(json[0]["title"], "Plan week");
    assert_eq!(json[0]["start_date"], "");

    let filter_raw = store
        .storage()
        .load(datastore::FILTER_KEY)
        .expect("load")
        .expect("present");
    assert_eq!(filter_raw.trim(), "\"unchecked\"");
}

#[test]
fn cli_commands_persist_between_runs() {
    let temp = tempdir().expect("tempdir");
    let data = temp.path().join("data");

    run_cli(&data, &["add", "Ship", "release", "start:2024-07-01", "end:2024-07-03"])
        .expect("add");
    run_cli(&data, &["prog", "1", "40"]).expect("progress");
    run_cli(&data, &["notes", "1", "set", "- [ ] tag build"]).expect("notes");
    run_cli(&data, &["check", "1", "tag-build"]).expect("check");
    run_cli(&data, &["calendar", "2024-07", "json"]).expect("calendar");

    assert!(run_cli(&data, &["add", "ship release"]).is_err());
    assert!(run_cli(&data, &["schedule", "1", "end:2024-06-01"]).is_err());
    assert!(run_cli(&data, &["add", "trip", "start:2024-07-05", "end:2024-07-01"]).is_err());

    let store = TaskStore::open(
        FileStore::open(&data).expect("open datastore"),
        StoreOptions::default(),
    )
    .expect("open store");
    assert_eq!(store.tasks().len(), 1);
    let task = store.get(1).expect("task");
    assert_eq!(task.title, "Ship release");
    assert_eq!(task.progress_rate, 40);
    assert_eq!(task.improvements, "- [x] tag build");
    assert_eq!(task.scheduled_completion_date, Some(day(2024, 7, 3)));
}
