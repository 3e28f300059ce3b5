//! Per-day aggregation of unit statistics from every upstream

pub mod daily;
pub mod regions;
pub mod summaries;
pub mod window;

pub use daily::{DailyAggregator, PersistFailure, RunReport, SectionFailure, SectionSuccess, Source, Sources, YEMEKSEPETI_MAX_DAYS_BACK};
pub use regions::{Division, RegionsFile, Unit};
pub use summaries::{TrendyolOrderSummary, YemeksepetiOrderSummary};
pub use window::DayWindow;
