//! Time directive parsing.
//!
//! A directive names a future instant either relative to now (`5`, `2m`,
//! `1h`, `5h30m`) or as a clock time (`1am`, `13:20`, `1:20am`, `18h30`,
//! `1830`, or an RFC 3339 timestamp). Resolution is a pure function of the
//! directive and the supplied `now`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{NetconfigError, Result};

const MAX_RELATIVE_MINUTES: i64 = 60 * 24 * 366;

fn relative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(?P<h>\d+)h)?(?:(?P<m>\d+)m?)?$").expect("valid regex"))
}

fn clock_24h_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<h>\d{1,2})[:h](?P<m>\d{2})$|^(?P<hh>\d{2})(?P<mm>\d{2})$")
            .expect("valid regex")
    })
}

fn clock_12h_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<h>\d{1,2})(?::(?P<m>\d{2}))?\s*(?P<half>am|pm)$").expect("valid regex")
    })
}

// ---------------------------------------------------------------------------
// TimeDirective
// ---------------------------------------------------------------------------

/// A parsed, not yet anchored, time directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeDirective {
    /// `now + duration`.
    Relative(Duration),
    /// Next occurrence of this wall-clock time at or after now.
    ClockTime { hour: u32, minute: u32 },
    /// A fixed instant; must not lie before now.
    Timestamp(DateTime<chrono::FixedOffset>),
}

impl TimeDirective {
    /// Parse with the relative grammar first, then the absolute one.
    pub fn parse(directive: &str) -> Result<Self> {
        Self::parse_relative(directive)
            .or_else(|_| Self::parse_absolute(directive))
            .map_err(|_| {
                NetconfigError::invalid_directive(
                    directive,
                    "expected a relative delay (5, 2m, 1h, 5h30m) or a clock time (1am, 13:20, 1:20am)",
                )
            })
    }

    /// Relative grammar: `<int>h`, `<int>m`, `<int>h<int>m`, or a bare integer
    /// meaning minutes.
    pub fn parse_relative(directive: &str) -> Result<Self> {
        let text = directive.trim().to_ascii_lowercase();
        let caps = relative_re()
            .captures(&text)
            .filter(|c| c.name("h").is_some() || c.name("m").is_some())
            .ok_or_else(|| {
                NetconfigError::invalid_directive(
                    directive,
                    "expected a relative delay such as 5, 2m, 1h or 5h30m",
                )
            })?;

        let component = |name: &str| -> Result<i64> {
            match caps.name(name) {
                Some(m) => m.as_str().parse::<i64>().map_err(|_| {
                    NetconfigError::invalid_directive(directive, "number out of range")
                }),
                None => Ok(0),
            }
        };
        let hours = component("h")?;
        let minutes = component("m")?;
        let total = hours
            .checked_mul(60)
            .and_then(|h| h.checked_add(minutes))
            .filter(|t| *t <= MAX_RELATIVE_MINUTES)
            .ok_or_else(|| NetconfigError::invalid_directive(directive, "delay too large"))?;

        Ok(Self::Relative(Duration::minutes(total)))
    }

    /// Absolute grammar: `13:20`, `18h30`, `1830`, `1am`, `1:20am`, `1:20 pm`,
    /// or an RFC 3339 timestamp.
    pub fn parse_absolute(directive: &str) -> Result<Self> {
        let text = directive.trim().to_ascii_lowercase();

        if let Some(caps) = clock_24h_re().captures(&text) {
            let hour = caps.name("h").or_else(|| caps.name("hh"));
            let minute = caps.name("m").or_else(|| caps.name("mm"));
            if let (Some(h), Some(m)) = (hour, minute) {
                let hour: u32 = h.as_str().parse().unwrap_or(u32::MAX);
                let minute: u32 = m.as_str().parse().unwrap_or(u32::MAX);
                if hour < 24 && minute < 60 {
                    return Ok(Self::ClockTime { hour, minute });
                }
                return Err(NetconfigError::invalid_directive(
                    directive,
                    "hour must be 0-23 and minute 0-59",
                ));
            }
        }

        if let Some(caps) = clock_12h_re().captures(&text) {
            let hour: u32 = caps["h"].parse().unwrap_or(u32::MAX);
            let minute: u32 = caps
                .name("m")
                .map(|m| m.as_str().parse().unwrap_or(u32::MAX))
                .unwrap_or(0);
            if !(1..=12).contains(&hour) || minute >= 60 {
                return Err(NetconfigError::invalid_directive(
                    directive,
                    "12-hour clock times need an hour of 1-12 and minute 0-59",
                ));
            }
            let hour = match (&caps["half"], hour) {
                ("am", 12) => 0,
                ("am", h) => h,
                ("pm", 12) => 12,
                (_, h) => h + 12,
            };
            return Ok(Self::ClockTime { hour, minute });
        }

        DateTime::parse_from_rfc3339(directive.trim())
            .map(Self::Timestamp)
            .map_err(|_| {
                NetconfigError::invalid_directive(
                    directive,
                    "expected a clock time such as 1am, 13:20, 1:20am or an RFC 3339 timestamp",
                )
            })
    }

    /// Anchor the directive at `now`.
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
        match self {
            Self::Relative(delay) => now
                .clone()
                .checked_add_signed(*delay)
                .ok_or_else(|| NetconfigError::invalid_directive(&format!("{delay}"), "overflow")),
            Self::ClockTime { hour, minute } => next_clock_time(now, *hour, *minute),
            Self::Timestamp(ts) => {
                let at = ts.with_timezone(&now.timezone());
                if at < *now {
                    return Err(NetconfigError::invalid_directive(
                        &ts.to_rfc3339(),
                        "timestamp lies in the past",
                    ));
                }
                Ok(at)
            }
        }
    }
}

fn next_clock_time<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Result<DateTime<Tz>> {
    let label = format!("{hour:02}:{minute:02}");
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| NetconfigError::invalid_directive(&label, "not a valid time of day"))?;
    let today = now.date_naive();
    let candidate = local_instant(now, today, time, &label)?;
    if candidate >= *now {
        return Ok(candidate);
    }
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| NetconfigError::invalid_directive(&label, "date overflow"))?;
    local_instant(now, tomorrow, time, &label)
}

fn local_instant<Tz: TimeZone>(
    now: &DateTime<Tz>,
    date: NaiveDate,
    time: NaiveTime,
    label: &str,
) -> Result<DateTime<Tz>> {
    now.timezone()
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| {
            NetconfigError::invalid_directive(label, "does not exist in the configured timezone")
        })
}

/// Parse `directive` with either grammar and anchor it at `now`.
pub fn parse<Tz: TimeZone>(directive: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    TimeDirective::parse(directive)?.resolve(now)
}

/// Parse `directive` with the relative grammar only.
pub fn parse_relative<Tz: TimeZone>(directive: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    TimeDirective::parse_relative(directive)?.resolve(now)
}

/// Parse `directive` with the absolute grammar only.
pub fn parse_absolute<Tz: TimeZone>(directive: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    TimeDirective::parse_absolute(directive)?.resolve(now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
