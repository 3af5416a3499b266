// src/pipeline/publish.rs

//! Publishing pipeline: parse cached catalogs and push every release the
//! record stores have not seen yet.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{ParsedCatalog, Platform};
use crate::services::catalog;
use crate::storage::{PublishReport, RecordStore};

/// Outcome of one publishing run.
#[derive(Debug, Default, Clone)]
pub struct PublishSummary {
    /// Identifiers already present in the stores before the run
    pub known: usize,
    /// Records parsed across all catalogs
    pub parsed: usize,
    /// Records selected for publishing
    pub selected: usize,
    pub report: PublishReport,
}

/// Union of the identifiers published in every store.
///
/// Any store failing to answer aborts the run.
pub async fn resolve_known(stores: &[Box<dyn RecordStore>]) -> Result<HashSet<String>> {
    let mut known = HashSet::new();
    for store in stores {
        let names = store.known_identifiers().await?;
        log::info!("{}: {} known identifiers", store.name(), names.len());
        known.extend(names);
    }
    Ok(known)
}

/// Keep the records whose identifier is not in `known`, in order.
///
/// Accepted identifiers are added to `known`, so a release listed by several
/// catalogs is selected once.
pub fn select_new(parsed: ParsedCatalog, known: &mut HashSet<String>) -> ParsedCatalog {
    let mut selected = ParsedCatalog::default();
    for record in parsed.into_records() {
        if known.insert(record.identifier.as_str().to_string()) {
            selected.push(record);
        } else {
            log::debug!("Skipping known {}", record.identifier);
        }
    }
    selected
}

/// Parse `paths` and publish the new records of each platform to its store.
///
/// Known-set and parsing failures abort before anything is pushed. Publish
/// failures are isolated per record and reported as [`AppError::Publish`]
/// once every store has been attempted.
pub async fn run_publish(
    stores: &[Box<dyn RecordStore>],
    paths: &[PathBuf],
    dry_run: bool,
) -> Result<PublishSummary> {
    let start_time = Utc::now();

    let mut known = resolve_known(stores).await?;
    let mut summary = PublishSummary {
        known: known.len(),
        ..PublishSummary::default()
    };

    let mut pending = ParsedCatalog::default();
    for path in paths {
        log::info!("Parsing {}", path.display());
        let parsed = catalog::parse_file(path).inspect_err(|e| {
            log::error!("{}: {}", path.display(), e);
        })?;
        summary.parsed += parsed.len();
        for record in select_new(parsed, &mut known).into_records() {
            pending.push(record);
        }
    }
    summary.selected = pending.len();
    log::info!(
        "{} new of {} parsed records ({} macOS, {} bridgeOS)",
        pending.len(),
        summary.parsed,
        pending.macos.len(),
        pending.bridgeos.len()
    );

    if dry_run {
        for record in pending.into_records() {
            log::info!("[dry-run] {} {}", record.platform, record.identifier);
        }
        return Ok(summary);
    }

    for platform in Platform::ALL {
        let records = pending.for_platform(platform);
        if records.is_empty() {
            continue;
        }
        let Some(store) = stores.iter().find(|s| s.platform() == platform) else {
            return Err(AppError::config(format!("no record store for {platform}")));
        };

        match store.publish(records).await {
            Ok(report) => summary.report.merge(report),
            Err(e) => {
                log::error!("{}: publishing aborted: {}", store.name(), e);
                let reason = e.to_string();
                summary.report.failed.extend(
                    records
                        .iter()
                        .map(|r| (r.identifier.clone(), reason.clone())),
                );
            }
        }
    }

    log::info!(
        "Published {} records in {}s, {} failed",
        summary.report.published.len(),
        (Utc::now() - start_time).num_seconds(),
        summary.report.failed.len()
    );

    if !summary.report.is_success() {
        return Err(AppError::Publish {
            failed: summary
                .report
                .failed
                .iter()
                .map(|(id, _)| id.to_string())
                .collect(),
        });
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::models::{Identifier, ReleaseRecord};

    const ID_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ID_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const ID_C: &str = "cccccccccccccccccccccccccccccccccc";
    const ID_D: &str = "dddddddddddddddddddddddddddddddddd";

    /// Record store backed by a set; identifiers in `reject` fail to publish.
    struct MemoryStore {
        platform: Platform,
        branches: Mutex<HashSet<String>>,
        reject: HashSet<String>,
        unreachable: bool,
    }

    impl MemoryStore {
        fn new(platform: Platform, known: &[&str]) -> Self {
            Self {
                platform,
                branches: Mutex::new(known.iter().map(|s| s.to_string()).collect()),
                reject: HashSet::new(),
                unreachable: false,
            }
        }

        fn branches(&self) -> HashSet<String> {
            self.branches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn name(&self) -> &str {
            self.platform.as_str()
        }

        async fn known_identifiers(&self) -> Result<HashSet<String>> {
            if self.unreachable {
                return Err(AppError::known_set(self.name(), "unreachable"));
            }
            Ok(self.branches())
        }

        async fn publish(&self, records: &[ReleaseRecord]) -> Result<PublishReport> {
            let mut report = PublishReport::default();
            let mut branches = self.branches.lock().unwrap();
            for record in records {
                let id = record.identifier.as_str();
                if self.reject.contains(id) || !branches.insert(id.to_string()) {
                    report.failed.push((record.identifier.clone(), "rejected".into()));
                } else {
                    report.published.push(record.identifier.clone());
                }
            }
            Ok(report)
        }
    }

    fn record(id: &str, platform: Platform) -> ReleaseRecord {
        ReleaseRecord {
            identifier: Identifier::parse(id).unwrap(),
            platform,
            version: None,
            post_date: "2021-03-01T18:00:00Z".into(),
            distribution_url: format!(
                "https://swdist.apple.com/content/downloads/11/22/x/{id}/a.dist"
            ),
            packages: serde_json::json!([]),
        }
    }

    fn parsed(ids: &[&str]) -> ParsedCatalog {
        let mut catalog = ParsedCatalog::default();
        for id in ids {
            catalog.push(record(id, Platform::MacOS));
        }
        catalog
    }

    fn product(id: &str) -> String {
        format!(
            r#"<key>{id}</key>
            <dict>
                <key>PostDate</key><date>2021-03-01T18:00:00Z</date>
                <key>Distributions</key>
                <dict><key>English</key><string>https://swdist.apple.com/content/downloads/11/22/x/{id}/a.English.dist</string></dict>
                <key>Packages</key><array></array>
                <key>ExtendedMetaInfo</key>
                <dict><key>ProductType</key><string>macOS</string><key>ProductVersion</key><string>11.2.2</string></dict>
            </dict>"#
        )
    }

    fn write_catalog(dir: &TempDir, name: &str, ids: &[&str]) -> PathBuf {
        let products: String = ids.iter().map(|id| product(id)).collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>CatalogVersion</key><integer>2</integer>
    <key>ApplePostURL</key><string>http://swpost.apple.com/</string>
    <key>IndexDate</key><date>2021-03-01T18:21:50Z</date>
    <key>Products</key>
    <dict>{products}</dict>
</dict>
</plist>"#
        );
        let path = dir.path().join(name);
        std::fs::write(&path, xml).unwrap();
        path
    }

    fn ids(catalog: &ParsedCatalog) -> Vec<String> {
        catalog
            .clone()
            .into_records()
            .map(|r| r.identifier.to_string())
            .collect()
    }

    #[test]
    fn test_select_new_skips_known() {
        let mut known: HashSet<String> = [ID_A, ID_B].iter().map(|s| s.to_string()).collect();
        let selected = select_new(parsed(&[ID_A, ID_B, ID_C]), &mut known);
        assert_eq!(ids(&selected), vec![ID_C.to_string()]);
        assert!(known.contains(ID_C));
    }

    #[test]
    fn test_select_new_deduplicates_within_run() {
        let mut known = HashSet::new();
        let first = select_new(parsed(&[ID_C, ID_D]), &mut known);
        let second = select_new(parsed(&[ID_D, ID_C]), &mut known);
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_run_publish_only_new_records_then_idempotent() {
        let tmp = TempDir::new().unwrap();
        let path = write_catalog(&tmp, "index.sucatalog", &[ID_A, ID_B, ID_C]);
        let stores: Vec<Box<dyn RecordStore>> = vec![
            Box::new(MemoryStore::new(Platform::MacOS, &["template", ID_A, ID_B])),
            Box::new(MemoryStore::new(Platform::BridgeOS, &["template"])),
        ];

        let summary = run_publish(&stores, &[path.clone()], false).await.unwrap();
        assert_eq!(summary.parsed, 3);
        assert_eq!(summary.selected, 1);
        assert_eq!(summary.report.published.len(), 1);
        assert_eq!(summary.report.published[0].as_str(), ID_C);

        let again = run_publish(&stores, &[path], false).await.unwrap();
        assert_eq!(again.selected, 0);
        assert!(again.report.published.is_empty());
    }

    #[tokio::test]
    async fn test_run_publish_same_release_in_two_catalogs() {
        let tmp = TempDir::new().unwrap();
        let first = write_catalog(&tmp, "a.sucatalog", &[ID_C]);
        let second = write_catalog(&tmp, "b.sucatalog", &[ID_C, ID_D]);
        let stores: Vec<Box<dyn RecordStore>> =
            vec![Box::new(MemoryStore::new(Platform::MacOS, &[]))];

        let summary = run_publish(&stores, &[first, second], false).await.unwrap();
        assert_eq!(summary.parsed, 3);
        assert_eq!(summary.report.published.len(), 2);
        assert!(summary.report.is_success());
    }

    #[tokio::test]
    async fn test_run_publish_dry_run_pushes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = write_catalog(&tmp, "index.sucatalog", &[ID_C]);
        let store = MemoryStore::new(Platform::MacOS, &[]);
        let stores: Vec<Box<dyn RecordStore>> = vec![Box::new(store)];

        let summary = run_publish(&stores, &[path], true).await.unwrap();
        assert_eq!(summary.selected, 1);
        assert!(summary.report.published.is_empty());
        assert!(stores[0].known_identifiers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_publish_reports_failures_after_attempting_all() {
        let tmp = TempDir::new().unwrap();
        let path = write_catalog(&tmp, "index.sucatalog", &[ID_C, ID_D]);
        let mut store = MemoryStore::new(Platform::MacOS, &[]);
        store.reject.insert(ID_C.to_string());
        let stores: Vec<Box<dyn RecordStore>> = vec![Box::new(store)];

        let err = run_publish(&stores, &[path], false).await.unwrap_err();
        match err {
            AppError::Publish { failed } => assert_eq!(failed, vec![ID_C.to_string()]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(stores[0].known_identifiers().await.unwrap().contains(ID_D));
    }

    #[tokio::test]
    async fn test_run_publish_aborts_when_known_set_unavailable() {
        let tmp = TempDir::new().unwrap();
        let path = write_catalog(&tmp, "index.sucatalog", &[ID_C]);
        let mut broken = MemoryStore::new(Platform::BridgeOS, &[]);
        broken.unreachable = true;
        let stores: Vec<Box<dyn RecordStore>> = vec![
            Box::new(MemoryStore::new(Platform::MacOS, &[])),
            Box::new(broken),
        ];

        let err = run_publish(&stores, &[path], false).await.unwrap_err();
        assert!(matches!(err, AppError::KnownSet { .. }));
        assert!(stores[0].known_identifiers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_publish_aborts_on_bad_catalog_before_pushing() {
        let tmp = TempDir::new().unwrap();
        let good = write_catalog(&tmp, "good.sucatalog", &[ID_C]);
        let bad = tmp.path().join("bad.sucatalog");
        std::fs::write(&bad, "not a plist").unwrap();
        let stores: Vec<Box<dyn RecordStore>> =
            vec![Box::new(MemoryStore::new(Platform::MacOS, &[]))];

        assert!(run_publish(&stores, &[good, bad], false).await.is_err());
        assert!(stores[0].known_identifiers().await.unwrap().is_empty());
    }
}
