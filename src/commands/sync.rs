use super::AppContext;
use crate::aggregate::{DailyAggregator, DayWindow, RegionsFile, RunReport};
use crate::cli::commands::SyncCommands;
use crate::storage::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use log::{debug, info};
use std::path::Path;

pub async fn sync_command(context: &AppContext, args: SyncCommands) -> Result<()> {
    info!("Starting sync: days_back={}, range={}", args.days_back, args.range);

    let tz = context.settings.timezone()?;
    let regions = RegionsFile::load(&context.settings.regions_file)?;
    let aggregator = DailyAggregator::new(regions, context.sources());

    let store: Box<dyn DocumentStore> = if args.dry_run {
        Box::new(MemoryDocumentStore::default())
    } else {
        let url = context.settings.database_url(context.secrets.as_ref());
        ensure_database_dir(&url)?;
        Box::new(SqliteDocumentStore::connect(&url).await?)
    };

    let now = Utc::now();
    let mut failed = 0;
    let mut unsaved = 0;
    for days_back in args.days_back..args.days_back.saturating_add(args.range) {
        let window = DayWindow::days_back(now, tz, days_back)?;
        let report = aggregator.sync_day(store.as_ref(), &window).await?;
        print_report(&report);
        if args.dry_run {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        failed += report.failures.len();
        unsaved += report.persist_failures.len();
    }

    let snapshot = context.metrics.snapshot();
    for upstream in &snapshot.upstreams {
        println!(
            "  {}: {} calls, {} failed, {} retries, waited {:.1}s",
            upstream.upstream,
            upstream.calls,
            upstream.failures,
            upstream.total_retries(),
            upstream.total_wait.as_secs_f64()
        );
    }
    debug!("Metrics: {}", serde_json::to_string(&snapshot)?);

    if unsaved > 0 {
        bail!("A rotated refresh token was not saved; run `opsync auth` before the next sync");
    }
    if failed > 0 {
        bail!("{failed} section(s) failed; see the log for details");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.is_clean() {
        println!("✓ {}: {} sections updated", report.date, report.successes.len());
        return;
    }
    println!(
        "⚠ {}: {} sections updated, {} failed",
        report.date,
        report.successes.len(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  ✗ {} {}: {}", failure.unit, failure.source, failure.message);
    }
    for failure in &report.persist_failures {
        println!("  ✗ {} refresh token not saved: {}", failure.source, failure.message);
    }
}

/// Create the directory of a file-backed SQLite URL
fn ensure_database_dir(url: &str) -> Result<()> {
    let Some(path) = sqlite_file_path(url) else {
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }
    Ok(())
}

fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(Path::new(path))
}
