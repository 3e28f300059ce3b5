//! Local calendar day being aggregated

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// One local day in the reporting timezone, plus the instant the run
/// considers "now" for that day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub tz: Tz,
    /// Reference instant: the run time shifted back by `days_back` days
    pub as_of: DateTime<Tz>,
    pub days_back: u32,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl DayWindow {
    /// The day `days_back` days before `now`, in `tz`
    pub fn days_back(now: DateTime<Utc>, tz: Tz, days_back: u32) -> Result<Self> {
        let as_of = now.with_timezone(&tz) - Duration::days(i64::from(days_back));
        let date = as_of.date_naive();
        let start = local_midnight(tz, date)?;
        let next = date
            .succ_opt()
            .ok_or_else(|| anyhow!("no day after {date}"))?;
        let end = local_midnight(tz, next)?;

        Ok(Self {
            date,
            tz,
            as_of,
            days_back,
            start,
            end,
        })
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// `[start_ms, end_ms)` contains `epoch_ms`
    pub fn contains_ms(&self, epoch_ms: i64) -> bool {
        (self.start_ms()..self.end_ms()).contains(&epoch_ms)
    }

    /// `2024-05-01`
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Collection holding every day of this month: `{month}{year}`, unpadded
    pub fn collection_name(&self) -> String {
        format!("{}{}", self.date.month(), self.date.year())
    }

    /// Document name for this day: `{day}{month}{year}`, unpadded
    pub fn document_name(&self) -> String {
        format!("{}{}", self.date.day(), self.collection_name())
    }
}

fn local_midnight(tz: Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid midnight for {date}"))?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| anyhow!("midnight of {date} does not exist in {tz}"))
}
