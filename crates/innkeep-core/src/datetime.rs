use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "innkeep-time.toml";
const TIMEZONE_ENV_VAR: &str = "INNKEEP_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "INNKEEP_TIME_CONFIG";
const DEFAULT_PROPERTY_TIMEZONE: &str = "Europe/Lisbon";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The property's local timezone. Check-in/out days, "today" and the
/// calendar window are all reckoned in property-local time, not UTC.
pub fn property_timezone() -> &'static Tz {
    static PROPERTY_TZ: OnceLock<Tz> = OnceLock::new();
    PROPERTY_TZ.get_or_init(resolve_property_timezone)
}

/// The calendar day at the property for a UTC instant.
#[must_use]
pub fn to_property_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(property_timezone()).date_naive()
}

#[must_use]
pub fn format_stamp(dt: DateTime<Utc>) -> String {
    dt.with_timezone(property_timezone())
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn resolve_property_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    parse_timezone(DEFAULT_PROPERTY_TIMEZONE, "DEFAULT_PROPERTY_TIMEZONE").unwrap_or_else(|| {
        tracing::error!("failed to parse fallback timezone; using UTC");
        chrono_tz::UTC
    })
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading timezone config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing timezone config file"
            );
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(
            file = %path.display(),
            "timezone config had no timezone field"
        );
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured property timezone");
            Some(tz)
        }
        Err(err) => {
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

/// Parses a day expression into a property-local calendar day.
///
/// Stay dates are whole days, so everything here resolves to a
/// `NaiveDate`: `today`/`tomorrow`/`yesterday`, weekday names (next
/// occurrence), relative `+Nd`/`-Nd`, and literal `YYYY-MM-DD`.
#[tracing::instrument(skip(now))]
pub fn parse_day_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();
    let today = to_property_date(now);

    match lower.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return Ok(today + Duration::days(1)),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(target) = parse_weekday_name(&lower) {
        return Ok(next_weekday_date(today, target));
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)d$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;
    if let Some(caps) = rel_re.captures(token) {
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative day count")?;
        let delta = Duration::days(num);
        let sign = caps
            .name("sign")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative sign"))?;
        return Ok(if sign == "-" { today - delta } else { today + delta });
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(date);
    }

    Err(anyhow!("unrecognized day expression: {input}")).with_context(|| {
        "supported formats: today/tomorrow/yesterday, weekday names (e.g. friday), \
         +Nd/-Nd, YYYY-MM-DD"
    })
}

fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday_date(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_idx = from.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut delta = (7 + target_idx - from_idx) % 7;
    if delta == 0 {
        delta = 7;
    }
    from.checked_add_signed(Duration::days(delta)).unwrap_or(from)
}

/// Compact UTC timestamp wire format for audit fields (`entry`,
/// `modified`), shared by every entity record.
pub mod stamp_serde {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y%m%dT%H%M%SZ";

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, NaiveDateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt = Option::<String>::deserialize(deserializer)?;
            match opt {
                Some(raw) => NaiveDateTime::parse_from_str(&raw, super::FORMAT)
                    .map(|ndt| Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)))
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{parse_day_expr, to_property_date};

    #[test]
    fn parses_literal_date() {
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        let parsed = parse_day_expr("2023-11-15", now).expect("parse date");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2023, 11, 15).expect("date"));
    }

    #[test]
    fn parses_relative_days() {
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        let today = to_property_date(now);
        let plus = parse_day_expr("+3d", now).expect("parse +3d");
        let minus = parse_day_expr("-1d", now).expect("parse -1d");
        assert_eq!((plus - today).num_days(), 3);
        assert_eq!((today - minus).num_days(), 1);
    }

    #[test]
    fn weekday_name_resolves_to_next_occurrence() {
        let now = Utc
            .with_ymd_and_hms(2023, 11, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        let today = to_property_date(now);
        let parsed = parse_day_expr("friday", now).expect("parse weekday");
        assert!(parsed > today);
        assert!((parsed - today).num_days() <= 7);
        assert_eq!(parsed.format("%a").to_string(), "Fri");
    }

    #[test]
    fn rejects_garbage() {
        let now = Utc::now();
        assert!(parse_day_expr("not-a-day", now).is_err());
    }
}
