use chrono::{TimeZone, Utc};
use opsync::aggregate::{DailyAggregator, DayWindow, RegionsFile, Sources};
use opsync::storage::{DocumentStore, SqliteDocumentStore};
use serde_json::json;

#[tokio::test]
async fn test_sqlite_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("opsync.db").display());

    {
        let store = SqliteDocumentStore::connect(&url).await.unwrap();
        store
            .upsert("52024", "252024", &json!({"name": "252024", "data": {"u1": {"unit": "u1"}}}))
            .await
            .unwrap();
    }

    let store = SqliteDocumentStore::connect(&url).await.unwrap();
    let document = store.find("52024", "252024").await.unwrap().unwrap();
    assert_eq!(document["data"]["u1"]["unit"], "u1");
    assert_eq!(store.list("52024").await.unwrap(), vec!["252024"]);
}

#[tokio::test]
async fn test_sync_day_without_sources_writes_unit_records() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("opsync.db").display());
    let store = SqliteDocumentStore::connect(&url).await.unwrap();

    let regions = RegionsFile::parse(
        r#"{"divisions": [{"trendyol_supplier_id": null, "region_name": "Izmir", "franchise": "West",
            "units": [{"dodois_unit_id": "u9", "dodois_name": "Alsancak", "trendyol_id": null, "yemeksepeti_pos_id": null}]}]}"#,
    )
    .unwrap();
    let aggregator = DailyAggregator::new(regions, Sources::default());
    let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
    let window = DayWindow::days_back(now, "Europe/Istanbul".parse().unwrap(), 0).unwrap();

    let report = aggregator.sync_day(&store, &window).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.date, "2025-01-01");
    let document = store.find("12025", "112025").await.unwrap().unwrap();
    assert_eq!(document["name"], "112025");
    let record = &document["data"]["u9"];
    assert_eq!(record["name"], "Alsancak");
    assert_eq!(record["region_name"], "Izmir");
    assert_eq!(record["franchise"], "West");
    assert_eq!(record["trendyol_id"], json!(null));
    assert!(record.get("dodois").is_none());
}
