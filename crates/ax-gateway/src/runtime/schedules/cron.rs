//! UTC-only 5-field cron evaluator (`min hour dom month dow`).

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use ax_domain::error::{Error, Result};

fn cron_field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value.is_multiple_of(n);
        }
        return false;
    }
    for part in field.split(',') {
        if let Some((start_s, end_s)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start_s.parse::<u32>(), end_s.parse::<u32>()) {
                if value >= start && value <= end {
                    return true;
                }
            }
        } else if let Ok(n) = part.parse::<u32>() {
            if value == n {
                return true;
            }
        }
    }
    false
}

fn fields(cron: &str) -> Option<[&str; 5]> {
    let parts: Vec<&str> = cron.split_whitespace().collect();
    if parts.len() != 5 {
        return None;
    }
    Some([parts[0], parts[1], parts[2], parts[3], parts[4]])
}

pub fn cron_matches(cron: &str, dt: &DateTime<Utc>) -> bool {
    let Some(f) = fields(cron) else { return false };
    cron_field_matches(f[0], dt.minute())
        && cron_field_matches(f[1], dt.hour())
        && cron_field_matches(f[2], dt.day())
        && cron_field_matches(f[3], dt.month())
        && cron_field_matches(f[4], dt.weekday().num_days_from_sunday())
}

/// First match at or after `after`, scanning minute by minute up to a year out.
pub fn cron_next(cron: &str, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    if fields(cron).is_none() {
        return None;
    }
    let mut candidate = after
        .with_second(0)
        .unwrap_or(*after)
        .with_nanosecond(0)
        .unwrap_or(*after)
        + Duration::minutes(1);
    let max_checks = 366 * 24 * 60;
    for _ in 0..max_checks {
        if cron_matches(cron, &candidate) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }
    None
}

pub fn validate_cron(cron: &str) -> Result<()> {
    let Some(f) = fields(cron) else {
        return Err(Error::Config(format!(
            "cron expression must have 5 space-separated fields, got: {cron}"
        )));
    };
    let bounds: [(&str, u32, u32); 5] = [
        ("minute", 0, 59),
        ("hour", 0, 23),
        ("day of month", 1, 31),
        ("month", 1, 12),
        ("day of week", 0, 6),
    ];
    for (field, (name, lo, hi)) in f.iter().zip(bounds.iter()) {
        validate_field(field, *name, *lo, *hi)?;
    }
    Ok(())
}

fn validate_field(field: &str, name: &str, lo: u32, hi: u32) -> Result<()> {
    if field == "*" {
        return Ok(());
    }
    if let Some(step) = field.strip_prefix("*/") {
        return step
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(|_| ())
            .ok_or_else(|| Error::Config(format!("invalid step in {name} field: {field}")));
    }
    for part in field.split(',') {
        let (start, end) = match part.split_once('-') {
            Some((s, e)) => (
                s.parse::<u32>()
                    .map_err(|_| Error::Config(format!("invalid {name} range start: {part}")))?,
                e.parse::<u32>()
                    .map_err(|_| Error::Config(format!("invalid {name} range end: {part}")))?,
            ),
            None => {
                let v = part
                    .parse::<u32>()
                    .map_err(|_| Error::Config(format!("invalid {name} value: {part}")))?;
                (v, v)
            }
        };
        if start > end || start < lo || end > hi {
            return Err(Error::Config(format!(
                "{name} field {part} out of range {lo}-{hi}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wildcard_matches_everything() {
        let now = Utc::now();
        assert!(cron_matches("* * * * *", &now));
    }

    #[test]
    fn step_field_matches_multiples() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap();
        assert!(cron_matches("*/5 * * * *", &dt));
        let dt2 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 11, 0).unwrap();
        assert!(!cron_matches("*/5 * * * *", &dt2));
    }

    #[test]
    fn next_occurrence_advances_past_after() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let next = cron_next("0 9 * * *", &dt).unwrap();
        assert!(next > dt);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn validate_rejects_bad_field_count() {
        assert!(validate_cron("* * *").is_err());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(validate_cron("70 * * * *").is_err());
    }

    #[test]
    fn validate_accepts_standard_expressions() {
        assert!(validate_cron("0 9 * * *").is_ok());
        assert!(validate_cron("*/15 * * * *").is_ok());
        assert!(validate_cron("0 9,17 * * 1-5").is_ok());
    }
}
