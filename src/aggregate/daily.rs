//! Daily aggregation of every unit across the upstream APIs
//!
//! Each upstream section of each unit is fetched on its own; a failing
//! section is reported and the previously stored section, if any, is kept.

use super::regions::{Division, RegionsFile, Unit};
use super::summaries::{OrderEffect, TrendyolOrderSummary, YemeksepetiOrderSummary};
use super::window::DayWindow;
use crate::api::ApiError;
use crate::api::constants::dodois;
use crate::clients::{DodoIsClient, TrendyolClient, YemeksepetiClient};
use crate::storage::DocumentStore;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// The order id listing only returns recent orders.
pub const YEMEKSEPETI_MAX_DAYS_BACK: u32 = 2;

/// Packages are listed by modification time, so the listing window is
/// widened on both sides before filtering by creation time.
const PACKAGE_WINDOW_PADDING_MS: i64 = 4 * 3600 * 1000;

/// `(endpoint, record key, response key, from param, to param)`
const DODOIS_STATISTICS: [(&str, &str, &str, &str, &str); 4] = [
    (dodois::SALES, "salesStatistics", "result", "from", "to"),
    (
        dodois::ORDERS_HANDOVER,
        "ordersHandoverStatistics",
        "ordersHandoverStatistics",
        "from",
        "to",
    ),
    (dodois::DELIVERY, "unitsStatistics", "unitsStatistics", "from", "to"),
    (dodois::CLIENTS, "clientStatistics", "clientStatistics", "fromDate", "toDate"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Dodois,
    Trendyol,
    Yemeksepeti,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Dodois => "dodois",
            Source::Trendyol => "trendyol",
            Source::Yemeksepeti => "yemeksepeti",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSuccess {
    pub unit: String,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionFailure {
    pub unit: String,
    pub source: Source,
    pub message: String,
}

/// A refresh succeeded but its rotated refresh token was not saved, so the
/// next run starts from a spent token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistFailure {
    pub source: Source,
    pub message: String,
}

/// Outcome of aggregating one day
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub date: String,
    pub successes: Vec<SectionSuccess>,
    pub failures: Vec<SectionFailure>,
    pub persist_failures: Vec<PersistFailure>,
}

impl RunReport {
    fn new(window: &DayWindow) -> Self {
        Self {
            date: window.date_string(),
            ..Default::default()
        }
    }

    fn success(&mut self, unit: &str, source: Source) {
        self.successes.push(SectionSuccess {
            unit: unit.to_string(),
            source,
        });
    }

    fn failure(&mut self, unit: &str, source: Source, message: impl Into<String>) {
        let message = message.into();
        warn!("{source} section of unit {unit} failed: {message}");
        self.failures.push(SectionFailure {
            unit: unit.to_string(),
            source,
            message,
        });
    }

    fn persist_failure(&mut self, source: Source, message: String) {
        warn!("{source} refresh token was not saved: {message}");
        self.persist_failures.push(PersistFailure { source, message });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.persist_failures.is_empty()
    }
}

/// Upstream clients available for a run; a missing client skips its section
#[derive(Clone, Default)]
pub struct Sources {
    pub dodois: Option<DodoIsClient>,
    /// Keyed by Trendyol supplier id
    pub trendyol: BTreeMap<String, TrendyolClient>,
    pub yemeksepeti: Option<YemeksepetiClient>,
}

pub struct DailyAggregator {
    regions: RegionsFile,
    sources: Sources,
}

impl DailyAggregator {
    pub fn new(regions: RegionsFile, sources: Sources) -> Self {
        Self { regions, sources }
    }

    pub fn regions(&self) -> &RegionsFile {
        &self.regions
    }

    /// Fetch, merge with the stored document and write back one day.
    pub async fn sync_day(&self, store: &dyn DocumentStore, window: &DayWindow) -> Result<RunReport> {
        let collection = window.collection_name();
        let name = window.document_name();

        let previous = store
            .find(&collection, &name)
            .await
            .with_context(|| format!("Failed to load document {collection}/{name}"))?;
        if previous.is_some() {
            debug!("Updating existing document {collection}/{name}");
        }

        let (data, report) = self.aggregate_day(window, previous.as_ref()).await;
        let document = json!({ "name": name, "data": Value::Object(data) });

        store
            .upsert(&collection, &name, &document)
            .await
            .with_context(|| format!("Failed to store document {collection}/{name}"))?;

        info!(
            "Stored {collection}/{name}: {} sections ok, {} failed",
            report.successes.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Records for every unit keyed by unit id. `previous` is the document
    /// stored by an earlier run for the same day.
    pub async fn aggregate_day(&self, window: &DayWindow, previous: Option<&Value>) -> (Map<String, Value>, RunReport) {
        let mut data = Map::new();
        let mut report = RunReport::new(window);
        let update_date = Utc::now().with_timezone(&window.tz).format("%Y-%m-%d %H:%M:%S").to_string();

        for (division, unit) in self.regions.units() {
            let unit_id = unit.dodois_unit_id.as_str();
            let stored = previous
                .and_then(|doc| doc.get("data"))
                .and_then(|units| units.get(unit_id));

            let mut record = Map::new();
            record.insert("name".into(), json!(unit.dodois_name));
            record.insert("date".into(), json!(window.date_string()));
            record.insert("unit".into(), json!(unit_id));
            record.insert("update_date".into(), json!(update_date));
            record.insert("region_name".into(), json!(division.region_name));
            record.insert("franchise".into(), json!(division.franchise));
            record.insert("trendyol_id".into(), json!(unit.trendyol_id));
            record.insert("yemeksepeti_id".into(), json!(unit.yemeksepeti_pos_id));

            if let Some(client) = &self.sources.dodois {
                let section = dodois_section(client, unit_id, window).await;
                settle(&mut record, &mut report, unit_id, Source::Dodois, section, stored);
            }

            if let Some(section) = self.trendyol_for_unit(division, unit, window).await {
                settle(&mut record, &mut report, unit_id, Source::Trendyol, section, stored);
            }

            if let Some(client) = &self.sources.yemeksepeti {
                if window.days_back > YEMEKSEPETI_MAX_DAYS_BACK {
                    debug!("Skipping yemeksepeti for {unit_id}: {} days back", window.days_back);
                } else if let Some(vendor) = &unit.yemeksepeti_pos_id {
                    let previous_orders = stored
                        .and_then(|record| record.get(Source::Yemeksepeti.as_str()))
                        .and_then(|section| section.get("orders"));
                    let section = yemeksepeti_section(client, vendor, window, previous_orders).await;
                    settle(&mut record, &mut report, unit_id, Source::Yemeksepeti, section, stored);
                }
            }

            debug!("Aggregated unit {unit_id} ({})", unit.dodois_name);
            data.insert(unit_id.to_string(), Value::Object(record));
        }

        let tokens = [
            (Source::Dodois, self.sources.dodois.as_ref().map(|c| c.tokens())),
            (Source::Yemeksepeti, self.sources.yemeksepeti.as_ref().map(|c| c.tokens())),
        ];
        for (source, manager) in tokens {
            if let Some(manager) = manager {
                if let Some(message) = manager.take_persist_failure().await {
                    report.persist_failure(source, message);
                }
            }
        }

        (data, report)
    }

    async fn trendyol_for_unit(
        &self,
        division: &Division,
        unit: &Unit,
        window: &DayWindow,
    ) -> Option<Result<Value, ApiError>> {
        let store_id = unit.trendyol_id.as_deref()?;
        let Some(supplier) = division.trendyol_supplier_id.as_deref() else {
            return Some(Err(ApiError::InvalidRequest(format!(
                "division {} has no Trendyol supplier id",
                division.region_name
            ))));
        };
        if self.sources.trendyol.is_empty() {
            return None;
        }
        let Some(client) = self.sources.trendyol.get(supplier) else {
            return Some(Err(ApiError::InvalidRequest(format!(
                "no Trendyol credentials for supplier {supplier}"
            ))));
        };
        Some(trendyol_section(client, store_id, window).await)
    }
}

/// Put a fetched section into the record, or carry the stored one forward.
fn settle(
    record: &mut Map<String, Value>,
    report: &mut RunReport,
    unit: &str,
    source: Source,
    section: Result<Value, ApiError>,
    stored: Option<&Value>,
) {
    match section {
        Ok(value) => {
            report.success(unit, source);
            record.insert(source.as_str().to_string(), value);
        }
        Err(err) => {
            report.failure(unit, source, err.to_string());
            if let Some(old) = stored.and_then(|r| r.get(source.as_str())) {
                record.insert(source.as_str().to_string(), old.clone());
            }
        }
    }
}

async fn dodois_section(client: &DodoIsClient, unit: &str, window: &DayWindow) -> Result<Value, ApiError> {
    let from = window.date_string();
    let to = (window.date + Duration::days(1)).format("%Y-%m-%d").to_string();
    let mut section = Map::new();

    for (endpoint, key, response_key, from_param, to_param) in DODOIS_STATISTICS {
        let response = client
            .statistics(endpoint, [(from_param, from.as_str()), (to_param, to.as_str()), ("units", unit)])
            .await?;
        if let Some(value) = response.get(response_key).filter(|v| is_truthy(v)) {
            section.insert(key.to_string(), value.clone());
        }
    }

    let week_ago = window.as_of - Duration::days(7);
    let response = client
        .statistics(
            dodois::SALES,
            [
                ("from", week_ago.format("%Y-%m-%d").to_string()),
                ("to", week_ago.format("%Y-%m-%dT%H:%M:%S").to_string()),
                ("units", unit.to_string()),
            ],
        )
        .await?;
    if let Some(value) = response.get("result").filter(|v| is_truthy(v)) {
        section.insert("salesStatisticsWeekAgo".into(), value.clone());
    }

    Ok(Value::Object(section))
}

async fn trendyol_section(client: &TrendyolClient, store_id: &str, window: &DayWindow) -> Result<Value, ApiError> {
    let (start, end) = (window.start_ms(), window.end_ms());
    let mut section = Map::new();

    let reviews = client.reviews(store_id, start, end).await?;
    if !reviews.is_empty() {
        section.insert("reviews".into(), Value::Array(reviews));
    }

    let claims = client.claims(store_id, start, end).await?;
    if !claims.is_empty() {
        section.insert("claims".into(), Value::Array(claims));
    }

    let packages = client
        .packages(store_id, start - PACKAGE_WINDOW_PADDING_MS, end + PACKAGE_WINDOW_PADDING_MS)
        .await?;
    let summary = TrendyolOrderSummary::from_packages(&packages, window);
    if summary.total_order > 0 {
        let orders = serde_json::to_value(&summary).map_err(|e| ApiError::Decode(e.to_string()))?;
        section.insert("orders".into(), orders);
    }

    Ok(Value::Object(section))
}

async fn yemeksepeti_section(
    client: &YemeksepetiClient,
    vendor: &str,
    window: &DayWindow,
    previous_orders: Option<&Value>,
) -> Result<Value, ApiError> {
    let ids = client.all_order_ids(vendor).await?;
    let mut summary = YemeksepetiOrderSummary::from_previous(previous_orders);
    let mut counted = 0usize;

    for id in &ids.orders {
        if summary.orders_id.contains(id) {
            continue;
        }
        let order = client.order(id).await?;
        match summary.apply(&order, window) {
            OrderEffect::Counted | OrderEffect::Cancelled => counted += 1,
            OrderEffect::Unusable => warn!("Ignoring unusable yemeksepeti order {id}"),
            OrderEffect::AlreadyCounted | OrderEffect::OtherDay => {}
        }
    }
    debug!("Vendor {vendor}: {} ids listed, {counted} new", ids.orders.len());

    let mut section = Map::new();
    if !summary.is_empty() {
        let orders = serde_json::to_value(&summary).map_err(|e| ApiError::Decode(e.to_string()))?;
        section.insert("orders".into(), orders);
    }
    Ok(Value::Object(section))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
