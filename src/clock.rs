//! Time source and timestamp helpers.
//!
//! Engines never call `Utc::now()` directly; they ask a [`Clock`], so tests can
//! pin "now" with a [`ManualClock`].

use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{Error, Result};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Round `t` to the nearest multiple of `granularity`, counted from the Unix
/// epoch. Halfway values round up. A zero granularity leaves `t` untouched.
pub fn round_to(t: DateTime<Utc>, granularity: std::time::Duration) -> DateTime<Utc> {
    let step = match i64::try_from(granularity.as_nanos()) {
        Ok(step) if step > 0 => step,
        _ => return t,
    };
    let Some(nanos) = t.timestamp_nanos_opt() else {
        return t;
    };

    let rem = nanos.rem_euclid(step);
    let rounded = if rem < step - rem {
        nanos - rem
    } else {
        nanos + (step - rem)
    };
    DateTime::from_timestamp_nanos(rounded)
}

/// Parse a signed offset such as `-15m`, `1h30m`, `90s` or `0`.
pub fn parse_offset(input: &str) -> Result<TimeDelta> {
    let s = input.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    if body == "0" {
        return Ok(TimeDelta::zero());
    }
    if body.is_empty() {
        return Err(Error::Validation(format!("empty offset: {input:?}")));
    }

    let mut total = TimeDelta::zero();
    let mut digits = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| Error::Validation(format!("bad offset {input:?}: missing number")))?;
        let part = match c {
            'h' => TimeDelta::try_hours(value),
            'm' => TimeDelta::try_minutes(value),
            's' => TimeDelta::try_seconds(value),
            other => {
                return Err(Error::Validation(format!(
                    "bad offset {input:?}: unknown unit '{other}'"
                )));
            }
        }
        .ok_or_else(|| Error::Validation(format!("offset out of range: {input:?}")))?;
        total += part;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(Error::Validation(format!(
            "bad offset {input:?}: trailing number without unit"
        )));
    }

    Ok(if negative { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    #[test]
    fn rounds_to_nearest_quarter_hour() {
        let q = Duration::from_secs(15 * 60);
        assert_eq!(round_to(at(9, 7, 0), q), at(9, 0, 0));
        assert_eq!(round_to(at(9, 8, 0), q), at(9, 15, 0));
        assert_eq!(round_to(at(9, 52, 31), q), at(10, 0, 0));
    }

    #[test]
    fn halfway_rounds_up() {
        assert_eq!(
            round_to(at(9, 7, 30), Duration::from_secs(15 * 60)),
            at(9, 15, 0)
        );
    }

    #[test]
    fn zero_granularity_is_identity() {
        assert_eq!(round_to(at(9, 7, 13), Duration::ZERO), at(9, 7, 13));
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_offset("0").unwrap(), TimeDelta::zero());
        assert_eq!(parse_offset("-15m").unwrap(), TimeDelta::minutes(-15));
        assert_eq!(parse_offset("1h30m").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_offset("+90s").unwrap(), TimeDelta::seconds(90));
    }

    #[test]
    fn rejects_malformed_offsets() {
        assert!(parse_offset("").is_err());
        assert!(parse_offset("15").is_err());
        assert!(parse_offset("3d").is_err());
        assert!(parse_offset("m").is_err());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(at(8, 0, 0));
        clock.advance(TimeDelta::minutes(5));
        assert_eq!(clock.now(), at(8, 5, 0));
        clock.set(at(12, 0, 0));
        assert_eq!(clock.now(), at(12, 0, 0));
    }
}
