//! On-disk artifacts of a harvest run.
//!
//! Each run may leave up to three files in the output directory:
//!
//! - `<prefix>_page_<stamp>[_<worker>].html`: the final snapshot
//! - `<prefix>_midpoint_<stamp>[_<worker>].html`: the optional 50% snapshot
//! - `<prefix>_products_<stamp>[_<worker>].json`: records plus run metadata
//!
//! `<stamp>` is local time down to the millisecond, `YYYYmmdd_HHMMSS_mmm`.
//!
//! Older files are pruned so that only the newest `keep_latest` of each kind
//! remain.

use std::{
    cmp::Reverse,
    path::{Path, PathBuf},
    time::SystemTime,
};

use {
    chrono::{DateTime, Local},
    serde::Serialize,
    shelfscan_config::OutputConfig,
    shelfscan_parser::{ProductRecord, Strategy},
    tracing::{debug, info, warn},
};

use crate::{
    error::{HarvestError, Result},
    report::{HarvestReport, HarvestStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Page,
    Midpoint,
    Products,
}

impl ArtifactKind {
    const ALL: [Self; 3] = [Self::Page, Self::Midpoint, Self::Products];

    fn tag(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Midpoint => "midpoint",
            Self::Products => "products",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Page | Self::Midpoint => "html",
            Self::Products => "json",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// An artifact found in the output directory.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub bytes: u64,
    pub modified: Option<SystemTime>,
}

/// Paths written by [`ArtifactStore::save`].
#[derive(Debug, Clone, Default)]
pub struct SavedArtifacts {
    pub snapshot: Option<PathBuf>,
    pub midpoint: Option<PathBuf>,
    pub products: Option<PathBuf>,
    pub pruned: usize,
}

#[derive(Serialize)]
struct ProductsFile<'a> {
    extraction_date: String,
    keyword: Option<&'a str>,
    source_url: &'a str,
    status: HarvestStatus,
    source: Option<Strategy>,
    total_products: usize,
    target_count: Option<usize>,
    coverage: Option<f64>,
    products: &'a [ProductRecord],
}

/// Writes, lists and prunes run artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    prefix: String,
    keep_latest: usize,
}

impl ArtifactStore {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            prefix: config.file_prefix.clone(),
            keep_latest: config.keep_latest,
        }
    }

    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a report's snapshots and records, then prune old files.
    pub fn save(&self, report: &HarvestReport, worker: Option<&str>) -> Result<SavedArtifacts> {
        self.save_at(report, worker, Local::now())
    }

    fn save_at(
        &self,
        report: &HarvestReport,
        worker: Option<&str>,
        now: DateTime<Local>,
    ) -> Result<SavedArtifacts> {
        std::fs::create_dir_all(&self.dir).map_err(|source| HarvestError::Artifact {
            path: self.dir.clone(),
            source,
        })?;

        let stamp = now.format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut saved = SavedArtifacts::default();

        if let Some(ref html) = report.snapshot {
            let path = self.path_for(ArtifactKind::Page, &stamp, worker);
            write(&path, html.as_bytes())?;
            saved.snapshot = Some(path);
        }
        if let Some(ref html) = report.midpoint_snapshot {
            let path = self.path_for(ArtifactKind::Midpoint, &stamp, worker);
            write(&path, html.as_bytes())?;
            saved.midpoint = Some(path);
        }

        // A failed run with nothing parsed leaves no products file behind.
        if report.status != HarvestStatus::Failed || !report.records.is_empty() {
            let doc = ProductsFile {
                extraction_date: now.to_rfc3339(),
                keyword: report.keyword.as_deref(),
                source_url: &report.url,
                status: report.status,
                source: report.source,
                total_products: report.records.len(),
                target_count: report.target_count,
                coverage: report.coverage,
                products: &report.records,
            };
            let path = self.path_for(ArtifactKind::Products, &stamp, worker);
            write(&path, &serde_json::to_vec_pretty(&doc)?)?;
            saved.products = Some(path);
        }

        saved.pruned = self.prune()?;
        info!(
            dir = %self.dir.display(),
            snapshot = ?saved.snapshot,
            products = ?saved.products,
            pruned = saved.pruned,
            "saved artifacts"
        );
        Ok(saved)
    }

    fn path_for(&self, kind: ArtifactKind, stamp: &str, worker: Option<&str>) -> PathBuf {
        let suffix = worker
            .map(sanitize_worker)
            .filter(|w| !w.is_empty())
            .map(|w| format!("_{w}"))
            .unwrap_or_default();
        self.dir.join(format!(
            "{}_{}_{stamp}{suffix}.{}",
            self.prefix,
            kind.tag(),
            kind.extension()
        ))
    }

    fn classify(&self, name: &str) -> Option<ArtifactKind> {
        let rest = name.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        ArtifactKind::ALL.into_iter().find(|kind| {
            rest.starts_with(&format!("{}_", kind.tag()))
                && rest.ends_with(&format!(".{}", kind.extension()))
        })
    }

    /// Artifacts in the output directory, newest first.
    pub fn list(&self) -> Result<Vec<ArtifactFile>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HarvestError::Artifact {
                    path: self.dir.clone(),
                    source,
                });
            },
        };

        let mut files: Vec<ArtifactFile> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let kind = self.classify(entry.file_name().to_str()?)?;
                let meta = entry.metadata().ok()?;
                meta.is_file().then(|| ArtifactFile {
                    kind,
                    path: entry.path(),
                    bytes: meta.len(),
                    modified: meta.modified().ok(),
                })
            })
            .collect();
        files.sort_by_key(|f| Reverse((f.modified, f.path.clone())));
        Ok(files)
    }

    /// Delete all but the newest `keep_latest` files of each kind. Returns the
    /// number of files removed.
    pub fn prune(&self) -> Result<usize> {
        if self.keep_latest == 0 {
            return Ok(0);
        }

        let files = self.list()?;
        let mut removed = 0;
        for kind in ArtifactKind::ALL {
            for stale in files
                .iter()
                .filter(|f| f.kind == kind)
                .skip(self.keep_latest)
            {
                match std::fs::remove_file(&stale.path) {
                    Ok(()) => {
                        debug!(path = %stale.path.display(), "pruned artifact");
                        removed += 1;
                    },
                    Err(e) => warn!(path = %stale.path.display(), error = %e, "failed to prune artifact"),
                }
            }
        }
        Ok(removed)
    }
}

fn write(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).map_err(|source| HarvestError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}

fn sanitize_worker(worker: &str) -> String {
    worker
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
