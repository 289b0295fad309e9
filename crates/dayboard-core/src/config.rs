use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::calendar::DEFAULT_EVENT_COLOR;
use crate::images::DEFAULT_MAX_BYTES;

pub const RC_ENV_VAR: &str =
  "DAYBOARDRC";

const DEFAULT_NOTES_TEMPLATE: &str =
  "## Progress Status\n## Content\n## Background\n## Improvements";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Built-in defaults only, no rc
  /// file.
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (key, value) in [
      ("data.location", "~/.dayboard"),
      ("color", "on"),
      ("duplicates.reject", "on"),
      (
        "calendar.color",
        DEFAULT_EVENT_COLOR
      ),
      ("calendar.require_dates", "on")
    ] {
      cfg.map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    cfg.map.insert(
      "images.max_bytes".to_string(),
      DEFAULT_MAX_BYTES.to_string()
    );
    cfg.map.insert(
      "notes.template".to_string(),
      DEFAULT_NOTES_TEMPLATE.to_string()
    );

    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let rcfile =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rcfile {
      info!(rcfile = %path.display(), "loading rc file");
      cfg.load_file(
        &path,
        &mut Vec::new()
      )?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn get_usize(
    &self,
    key: &str
  ) -> anyhow::Result<Option<usize>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    raw
      .trim()
      .parse::<usize>()
      .map(Some)
      .map_err(|e| {
        anyhow!(
          "config {key} must be a \
           non-negative integer, got \
           {raw}: {e}"
        )
      })
  }

  /// Notes template with `\n` escapes
  /// expanded.
  pub fn notes_template(
    &self
  ) -> String {
    self
      .get("notes.template")
      .unwrap_or_default()
      .replace("\\n", "\n")
  }

  /// `chain` holds the files currently
  /// being read, outermost first.
  #[tracing::instrument(skip(
    self, chain
  ))]
  fn load_file(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical =
      fs::canonicalize(&path)
        .unwrap_or_else(|_| path.clone());
    if chain.contains(&canonical) {
      let trail = chain
        .iter()
        .chain(std::iter::once(&canonical))
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ");
      return Err(anyhow!(
        "include cycle: {trail}"
      ));
    }

    self
      .loaded_files
      .push(path.clone());
    chain.push(canonical);

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      // Trailing comments start at ` # `
      // so `#RRGGBB` values survive.
      if let Some((before, _)) =
        line.split_once(" # ")
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self.load_file(
            &include_path,
            chain
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    chain.pop();
    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    if path == Path::new("/dev/null") {
      return Ok(None);
    }
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    return Ok(None);
  };
  let candidate =
    home.join(".dayboardrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".dayboard"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::Config;

  #[test]
  fn rc_file_with_include_and_comments(
  ) {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "calendar.color = #FF8800\n"
    )
    .expect("write include");

    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# personal settings\n\
       duplicates.reject = off # allow repeats\n\
       include extra.rc\n\
       images.max_bytes = 1024\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(
      cfg.get_bool("duplicates.reject"),
      Some(false)
    );
    assert_eq!(
      cfg.get("calendar.color")
        .as_deref(),
      Some("#FF8800")
    );
    assert_eq!(
      cfg
        .get_usize("images.max_bytes")
        .expect("number"),
      Some(1024)
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn include_cycles_are_errors() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("main.rc");
    fs::write(&rc, "include main.rc\n")
      .expect("write rc");
    let err = Config::load(Some(&rc))
      .expect_err("self include");
    assert!(
      err
        .to_string()
        .contains("include cycle")
    );

    let other =
      temp.path().join("other.rc");
    fs::write(
      &rc,
      "color = off\ninclude other.rc\n"
    )
    .expect("write rc");
    fs::write(
      &other,
      "include main.rc\n"
    )
    .expect("write other");
    assert!(
      Config::load(Some(&rc)).is_err()
    );
  }

  #[test]
  fn same_file_may_be_included_twice()
  {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("shared.rc"),
      "calendar.color = #112233\n"
    )
    .expect("write shared");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "include shared.rc\ninclude shared.rc\n"
    )
    .expect("write rc");
    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 3);
  }

  #[test]
  fn dev_null_disables_rc_lookup() {
    let cfg = Config::load(Some(
      std::path::Path::new("/dev/null")
    ))
    .expect("load config");
    assert!(cfg.loaded_files.is_empty());
    assert_eq!(
      cfg.get_bool("calendar.require_dates"),
      Some(true)
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![(
      "rc.color".to_string(),
      "off".to_string()
    )]);
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
  }

  #[test]
  fn template_expands_escaped_newlines(
  ) {
    let mut cfg = Config::defaults();
    assert!(
      cfg
        .notes_template()
        .starts_with("## Progress Status\n## Content")
    );
    cfg.apply_overrides(vec![(
      "notes.template".to_string(),
      "# A\\n# B".to_string()
    )]);
    assert_eq!(
      cfg.notes_template(),
      "# A\n# B"
    );
  }

  #[test]
  fn bad_number_is_an_error() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![(
      "images.max_bytes".to_string(),
      "lots".to_string()
    )]);
    assert!(
      cfg
        .get_usize("images.max_bytes")
        .is_err()
    );
  }
}
