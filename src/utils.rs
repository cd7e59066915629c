use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, Utc};
use humantime::Duration as HumanDuration;

pub fn snapshot_suffix(name: &str) -> Result<&str> {
    match name.split_once('@') {
        Some((_dataset, suffix)) if !suffix.is_empty() => Ok(suffix),
        _ => bail!("Not a snapshot name: {}", name),
    }
}

pub fn split_filter_arg(arg: &str) -> Result<(&str, &str)> {
    arg.split_once('=')
        .ok_or_else(|| anyhow!("Invalid filter '{}': expected <property>=<value>", arg))
}

/// Resolve a `before`/`after` value to epoch seconds. Accepts an integer
/// timestamp or a duration such as `30d`, taken as that long before `now`.
pub fn parse_boundary(value: &str, now: DateTime<Utc>) -> Result<i64> {
    let value = value.trim();
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }
    let ago = value.parse::<HumanDuration>().with_context(|| {
        format!(
            "Invalid timestamp '{}': expected epoch seconds or a duration like 30d",
            value
        )
    })?;
    let cutoff = Duration::from_std(ago.into())
        .ok()
        .and_then(|ago| now.checked_sub_signed(ago))
        .ok_or_else(|| anyhow!("Timestamp '{}' is out of range", value))?;
    Ok(cutoff.timestamp())
}

pub fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
