//! Calendar derivation for movement records.
//!
//! Movements carry a calendar `occurred_date` in a fixed business
//! timezone, plus derived `year`/`month`/`week` columns computed once at
//! insert. The week and year follow ISO-8601 week numbering (week 1 is
//! the week containing the year's first Thursday), so `year` is the ISO
//! week-year and can differ from the calendar year around January 1st.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

/// Derived calendar fields stored alongside a movement record.
/// These never drift from `occurred_date`; they exist for query
/// efficiency only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    /// ISO week-numbering year of `occurred_date`.
    pub year: i32,
    /// Calendar month (1-12) of `occurred_date`.
    pub month: i32,
    /// ISO week number (1-53) of `occurred_date`.
    pub week: i32,
}

/// Computes the derived fields for a movement date.
pub fn derive(occurred_date: NaiveDate) -> CalendarFields {
    let iso = occurred_date.iso_week();
    CalendarFields {
        year: iso.year(),
        month: occurred_date.month() as i32,
        week: iso.week() as i32,
    }
}

/// Resolves "today" as a calendar date in the fixed business timezone.
///
/// Stock-count sessions and work-day tracking are keyed by this date, not
/// by the server's UTC date; a warehouse at UTC+3 counting at 01:00 local
/// must land on its own calendar day.
pub fn business_today(offset_minutes: i32, now: DateTime<Utc>) -> NaiveDate {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    now.with_timezone(&offset).date_naive()
}
