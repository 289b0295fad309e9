use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  Days,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "dayboard-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DAYBOARD_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DAYBOARD_TIME_CONFIG";

pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Configured IANA zone, or `None` to
/// follow the system clock.
pub fn project_timezone()
-> Option<&'static Tz> {
  static PROJECT_TZ: OnceLock<
    Option<Tz>
  > = OnceLock::new();
  PROJECT_TZ
    .get_or_init(
      resolve_project_timezone
    )
    .as_ref()
}

/// The real current day, as opposed to
/// the reference day being viewed.
#[must_use]
pub fn today() -> NaiveDate {
  match project_timezone() {
    | Some(tz) => {
      Utc::now()
        .with_timezone(tz)
        .date_naive()
    }
    | None => Local::now().date_naive()
  }
}

fn resolve_project_timezone()
-> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return Some(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Some(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  None
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Strict `YYYY-MM-DD` that names a real
/// calendar day. `2024-02-30` is `None`.
pub fn parse_day_param(
  raw: &str
) -> Option<NaiveDate> {
  let day_re = Regex::new(
    r"^(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})$"
  )
  .ok()?;
  let caps =
    day_re.captures(raw.trim())?;

  let year =
    caps.name("y")?.as_str().parse().ok()?;
  let month =
    caps.name("m")?.as_str().parse().ok()?;
  let day =
    caps.name("d")?.as_str().parse().ok()?;

  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

/// Parses a date typed on the command
/// line. `Ok(None)` means "unset".
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<Option<NaiveDate>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "" | "none" | "clear" => Ok(None),
    | "today" => Ok(Some(today)),
    | "tomorrow" => {
      Ok(Some(add_days(today, 1)))
    }
    | "yesterday" => {
      Ok(Some(add_days(today, -1)))
    }
    | _ => {
      parse_day_param(token)
        .map(Some)
        .ok_or_else(|| {
          anyhow!(
            "unrecognized date: \
             {token} (expected \
             YYYY-MM-DD)"
          )
        })
    }
  }
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  let shifted = if days >= 0 {
    date.checked_add_days(Days::new(
      days.unsigned_abs()
    ))
  } else {
    date.checked_sub_days(Days::new(
      days.unsigned_abs()
    ))
  };
  shifted.unwrap_or(date)
}

#[must_use]
pub fn next_day(
  date: NaiveDate
) -> NaiveDate {
  add_days(date, 1)
}

#[must_use]
pub fn format_day(
  date: NaiveDate
) -> String {
  date.format(DAY_FORMAT).to_string()
}

/// `JULY 2, 2024`
#[must_use]
pub fn format_display(
  date: NaiveDate
) -> String {
  date
    .format("%B %-d, %Y")
    .to_string()
    .to_uppercase()
}

/// Unset dates travel as `""`, the way
/// the stored task list has always
/// encoded them.
pub mod day_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::DAY_FORMAT;

  pub fn serialize<S>(
    day: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match day {
      | Some(value) => {
        serializer.serialize_str(
          &value
            .format(DAY_FORMAT)
            .to_string()
        )
      }
      | None => {
        serializer.serialize_str("")
      }
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<NaiveDate>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = Option::<String>::deserialize(
      deserializer
    )?;
    match raw.as_deref().map(str::trim) {
      | None | Some("") => Ok(None),
      | Some(text) => {
        NaiveDate::parse_from_str(
          text, DAY_FORMAT
        )
        .map(Some)
        .map_err(
          serde::de::Error::custom
        )
      }
    }
  }
}
