//! Rate-limit incident classification and the per-provider state machine.

use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The kind of rate-limit window a provider reported, inferred from
/// keywords in the error body.
///
/// Informational only — resume timing is always driven by
/// [`RateLimitInfo::reset_at`], never by `kind` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitKind {
    /// Resets at the next UTC midnight.
    Daily,
    /// Resets at the next Monday 00:00 UTC.
    Weekly,
    /// Resets at the first day of the next UTC month.
    Monthly,
    /// No kind keyword detected; window derived from `Retry-After` or the
    /// 1-minute default.
    Unknown,
}

/// A classified rate-limit incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// The inferred window kind.
    pub kind: RateLimitKind,
    /// The `Retry-After` duration, if the provider sent one. Only used to
    /// derive `reset_at` when no kind keyword was detected.
    pub retry_after: Option<Duration>,
    /// The wall-clock instant at which this window ends.
    pub reset_at: DateTime<Utc>,
    /// The raw provider message, if any (kept for diagnostics).
    pub message: Option<String>,
}

/// Default park window when neither a kind keyword nor a `Retry-After`
/// header is present.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Classify a rate-limit response into a [`RateLimitInfo`].
///
/// `retry_after` comes from a numeric `Retry-After` header (seconds).
/// `message` is the provider's error body, scanned case-insensitively for
/// `"daily"`, `"weekly"`, or `"monthly"`. A detected kind keyword always
/// wins over the header; the header is only consulted when no keyword
/// matches.
#[must_use]
pub fn classify(now: DateTime<Utc>, retry_after: Option<Duration>, message: Option<&str>) -> RateLimitInfo {
    let kind = message.map(detect_kind).unwrap_or(RateLimitKind::Unknown);

    let reset_at = match kind {
        RateLimitKind::Daily => next_utc_midnight(now),
        RateLimitKind::Weekly => next_monday_midnight(now),
        RateLimitKind::Monthly => next_month_start(now),
        RateLimitKind::Unknown => match retry_after {
            Some(d) => now + chrono::Duration::from_std(d).unwrap_or_default(),
            None => now + chrono::Duration::from_std(DEFAULT_WINDOW).unwrap_or_default(),
        },
    };

    RateLimitInfo {
        kind,
        retry_after,
        reset_at,
        message: message.map(str::to_string),
    }
}

fn detect_kind(message: &str) -> RateLimitKind {
    let lower = message.to_lowercase();
    if lower.contains("daily") {
        RateLimitKind::Daily
    } else if lower.contains("weekly") {
        RateLimitKind::Weekly
    } else if lower.contains("monthly") {
        RateLimitKind::Monthly
    } else {
        RateLimitKind::Unknown
    }
}

fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&tomorrow.and_hms_opt(0, 0, 0).expect("valid midnight"))
}

fn next_monday_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let days_until_monday = (7 - today.weekday().num_days_from_monday()) % 7;
    let days_until_monday = if days_until_monday == 0 { 7 } else { days_until_monday };
    let next_monday = today + chrono::Duration::days(i64::from(days_until_monday));
    Utc.from_utc_datetime(&next_monday.and_hms_opt(0, 0, 0).expect("valid midnight"))
}

fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    let first = chrono::NaiveDate::from_ymd_opt(year, month, 1).expect("valid first-of-month");
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).expect("valid midnight"))
}

/// The observable state of a provider's rate-limit gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Calls pass straight through to the provider.
    Open,
    /// Calls are parked until `resume_at`.
    Limited,
}

/// Per-provider rate-limit state machine.
///
/// `resume_at` only ever moves forward: recording an incident whose
/// `reset_at` is earlier than the current `resume_at` does not pull the
/// window in. The first successful call observed while `Limited`
/// transitions to `Open` and reports that the resume callback should fire
/// — exactly once per limited window.
#[derive(Debug, Default)]
pub struct RateLimitState {
    resume_at: Option<DateTime<Utc>>,
    fired_since_limited: bool,
}

impl RateLimitState {
    /// A fresh, `Open` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current observable state given the wall clock.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> GateState {
        match self.resume_at {
            Some(resume_at) if now < resume_at => GateState::Limited,
            _ => GateState::Open,
        }
    }

    /// The wall-clock instant calls will resume, if currently limited.
    #[must_use]
    pub fn resume_at(&self) -> Option<DateTime<Utc>> {
        self.resume_at
    }

    /// Record a newly observed incident. Returns the (possibly unchanged)
    /// `resume_at` after merging — always the max of what was already
    /// recorded and `info.reset_at`.
    pub fn record_incident(&mut self, info: &RateLimitInfo) -> DateTime<Utc> {
        let resume_at = match self.resume_at {
            Some(existing) => existing.max(info.reset_at),
            None => info.reset_at,
        };
        self.resume_at = Some(resume_at);
        self.fired_since_limited = false;
        resume_at
    }

    /// Record a successful response. If the state was `Limited`, this
    /// transitions to `Open` and returns `true` exactly once per limited
    /// window (subsequent calls while already `Open` return `false`).
    pub fn record_success(&mut self, _now: DateTime<Utc>) -> bool {
        let was_limited = self.resume_at.is_some();
        if was_limited && !self.fired_since_limited {
            self.fired_since_limited = true;
            self.resume_at = None;
            true
        } else {
            self.resume_at = None;
            false
        }
    }
}
