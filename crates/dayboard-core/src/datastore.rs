use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::filter::FilterMode;
use crate::task::Task;

/// Key holding the full task array.
pub const TASKS_KEY: &str = "todos";
/// Key holding the last selected filter.
pub const FILTER_KEY: &str = "filter_state";

/// Persistent key-value port. Values are JSON documents.
pub trait Storage {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per key inside the data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStore {
    #[tracing::instrument(skip(self))]
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), bytes = value.len(), "saving atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

/// In-memory storage for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail, to exercise write-failure paths.
    pub fn failing() -> Self {
        Self {
            entries: BTreeMap::new(),
            fail_saves: true,
        }
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.fail_saves = failing;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_saves {
            return Err(anyhow!("storage unavailable"));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[tracing::instrument(skip(storage))]
pub fn load_tasks<S: Storage + ?Sized>(storage: &S) -> anyhow::Result<Vec<Task>> {
    let Some(raw) = storage.load(TASKS_KEY)? else {
        return Ok(vec![]);
    };
    if raw.trim().is_empty() {
        return Ok(vec![]);
    }
    let mut tasks: Vec<Task> =
        serde_json::from_str(&raw).with_context(|| format!("failed parsing {TASKS_KEY}"))?;
    tasks.sort_by_key(|t| t.id);
    debug!(count = tasks.len(), "loaded tasks");
    Ok(tasks)
}

#[tracing::instrument(skip(storage, tasks), fields(count = tasks.len()))]
pub fn save_tasks<S: Storage + ?Sized>(storage: &mut S, tasks: &[Task]) -> anyhow::Result<()> {
    let serialized = serde_json::to_string(tasks)?;
    storage.save(TASKS_KEY, &serialized)
}

/// A missing or unreadable filter falls back to `all`.
#[tracing::instrument(skip(storage))]
pub fn load_filter<S: Storage + ?Sized>(storage: &S) -> FilterMode {
    let raw = match storage.load(FILTER_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return FilterMode::default(),
        Err(err) => {
            warn!(error = %err, "failed to read stored filter");
            return FilterMode::default();
        }
    };

    match serde_json::from_str::<FilterMode>(&raw) {
        Ok(mode) => mode,
        Err(err) => {
            warn!(error = %err, raw = %raw.trim(), "ignoring unreadable stored filter");
            FilterMode::default()
        }
    }
}

#[tracing::instrument(skip(storage))]
pub fn save_filter<S: Storage + ?Sized>(storage: &mut S, mode: FilterMode) -> anyhow::Result<()> {
    let serialized = serde_json::to_string(&mode)?;
    storage.save(FILTER_KEY, &serialized)
}
