use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "sift-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "SIFT_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "SIFT_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Timezone used to read and print
/// local dates. Resolved once per
/// process.
pub fn display_timezone() -> &'static Tz
{
  static DISPLAY_TZ: OnceLock<Tz> =
    OnceLock::new();
  DISPLAY_TZ.get_or_init(
    resolve_display_timezone
  )
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(display_timezone())
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

/// Canonical storage form: RFC 3339,
/// millisecond precision, `Z` suffix.
#[must_use]
pub fn to_iso_string(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

/// Short human age such as `3d`, `5h`
/// or `12m`.
#[must_use]
pub fn format_age(
  then: DateTime<Utc>,
  now: DateTime<Utc>
) -> String {
  let age = now - then;
  if age.num_days() > 0 {
    format!("{}d", age.num_days())
  } else if age.num_hours() > 0 {
    format!("{}h", age.num_hours())
  } else {
    format!(
      "{}m",
      age.num_minutes().max(0)
    )
  }
}

fn resolve_display_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no display timezone configured; \
     using UTC"
  );
  chrono_tz::UTC
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
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured display timezone"
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

fn to_utc_from_local(
  local_naive: NaiveDateTime,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match display_timezone()
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      Ok(
        first
          .min(second)
          .with_timezone(&Utc)
      )
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in display timezone: \
         {context}"
      ))
    }
  }
}

/// Parses a notification time typed by
/// a user into an absolute UTC instant.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_when(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      let midnight = now
        .with_timezone(
          display_timezone()
        )
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| {
          anyhow!(
            "failed to construct \
             midnight for today"
          )
        })?;
      return to_utc_from_local(
        midnight, "today"
      );
    }
    | "tomorrow" => {
      let today =
        parse_when("today", now)?;
      return Ok(
        today + Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Some((hour, minute)) =
    parse_clock_time(token)
  {
    let local_now = now
      .with_timezone(
        display_timezone()
      );
    let mut day =
      local_now.date_naive();
    let candidate = day
      .and_hms_opt(hour, minute, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct clock \
           time candidate"
        )
      })?;
    if candidate
      <= local_now.naive_local()
    {
      day = day
        .checked_add_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "failed to advance to \
             next day"
          )
        })?;
    }
    let next = day
      .and_hms_opt(hour, minute, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct next \
           clock time candidate"
        )
      })?;
    return to_utc_from_local(
      next,
      "clock-time"
    );
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let duration = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("d") => Duration::days(num),
      | Some("h") => {
        Duration::hours(num)
      }
      | Some("m") => {
        Duration::minutes(num)
      }
      | other => {
        return Err(anyhow!(
          "unknown relative unit: \
           {other:?}"
        ));
      }
    };

    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");
    return Ok(if negative {
      now - duration
    } else {
      now + duration
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    let midnight = date
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct \
           midnight for date"
        )
      })?;
    return to_utc_from_local(
      midnight, "date"
    );
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return to_utc_from_local(
        ndt, fmt
      );
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow, clock times \
     (e.g. 3:30pm or 15:30), \
     +Nd/+Nh/+Nm, RFC3339, YYYY-MM-DD, \
     YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM"
  })
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .ok()?;
  let captures =
    clock_re.captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = match captures
    .name("ampm")
    .map(|m| {
      m.as_str().to_ascii_lowercase()
    }) {
    | None if raw_hour <= 23 => {
      raw_hour
    }
    | None => return None,
    | Some(_)
      if raw_hour == 0
        || raw_hour > 12 =>
    {
      return None;
    }
    | Some(ampm) if ampm == "am" => {
      raw_hour % 12
    }
    | Some(_) => raw_hour % 12 + 12
  };

  Some((hour, minute))
}

/// Serde adapter for the `createdAt`
/// field.
pub mod iso_timestamp {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::to_iso_string(*dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    DateTime::parse_from_rfc3339(&raw)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::{
    format_age,
    parse_clock_time,
    parse_when,
    to_iso_string
  };

  #[test]
  fn iso_string_uses_millis_and_z() {
    let dt = Utc
      .with_ymd_and_hms(
        2025, 1, 1, 10, 0, 0
      )
      .single()
      .expect("valid datetime");
    assert_eq!(
      to_iso_string(dt),
      "2025-01-01T10:00:00.000Z"
    );
  }

  #[test]
  fn parses_relative_offsets() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      parse_when("+2h", now)
        .expect("parse +2h"),
      now + Duration::hours(2)
    );
    assert_eq!(
      parse_when("-3d", now)
        .expect("parse -3d"),
      now - Duration::days(3)
    );
  }

  #[test]
  fn parses_rfc3339_verbatim() {
    let now = Utc::now();
    let parsed = parse_when(
      "2025-01-01T10:00:00Z",
      now
    )
    .expect("parse rfc3339");
    assert_eq!(
      to_iso_string(parsed),
      "2025-01-01T10:00:00.000Z"
    );
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_when(
        "next blue moon",
        Utc::now()
      )
      .is_err()
    );
  }

  #[test]
  fn clock_time_handles_meridiem() {
    assert_eq!(
      parse_clock_time("3:30pm"),
      Some((15, 30))
    );
    assert_eq!(
      parse_clock_time("12:05am"),
      Some((0, 5))
    );
    assert_eq!(
      parse_clock_time("12:00pm"),
      Some((12, 0))
    );
    assert_eq!(
      parse_clock_time("23:59"),
      Some((23, 59))
    );
    assert_eq!(
      parse_clock_time("24:00"),
      None
    );
  }

  #[test]
  fn age_picks_largest_unit() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    assert_eq!(
      format_age(
        now - Duration::days(8),
        now
      ),
      "8d"
    );
    assert_eq!(
      format_age(
        now - Duration::minutes(90),
        now
      ),
      "1h"
    );
    assert_eq!(
      format_age(now, now),
      "0m"
    );
  }
}
