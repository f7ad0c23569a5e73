use chrono::{Datelike, Local, NaiveDate};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use super::data::{Category, Manifest};
use super::preferences::{Preferences, LAST_ASSETS_UPDATE_KEY};
use crate::config::{AssetsConfig, RefreshPolicy};
use crate::error::{AssetError, Result};
use crate::fetcher::RemoteFetcher;

/// Manifest compiled into the binary, used when nothing better is on disk
const DEFAULT_MANIFEST_JSON: &str = include_str!("../../assets/DefaultAssetsInfo.json");

/// Result of a manifest refresh. Failures are reported here instead of as an
/// `Err`: the previous manifest stays authoritative.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Remote manifest fetched, applied and persisted
    Updated(Manifest),
    /// Skipped by the daily gate
    UpToDate,
    /// Fetch or parse failed; the in-memory manifest is unchanged
    Failed(AssetError),
}

/// `year * 1000 + day_of_year`, e.g. 2026291 for 2026-10-18
pub fn date_stamp(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 1000 + i64::from(date.ordinal())
}

/// The manifest store owns the catalog of available bundles.
///
/// It starts from the locally persisted copy (or the embedded default) and is
/// replaced wholesale whenever a remote refresh succeeds.
pub struct ManifestStore {
    config: AssetsConfig,
    fetcher: Arc<dyn RemoteFetcher>,
    prefs: Arc<dyn Preferences>,
    manifest: RwLock<Manifest>,
}

impl ManifestStore {
    /// Create the store and load the local manifest
    pub fn open(config: AssetsConfig, fetcher: Arc<dyn RemoteFetcher>, prefs: Arc<dyn Preferences>) -> Self {
        let manifest = load_manifest(&config.manifest_path());
        Self {
            config,
            fetcher,
            prefs,
            manifest: RwLock::new(manifest),
        }
    }

    /// Snapshot of the current manifest
    pub fn manifest(&self) -> Manifest {
        self.manifest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn bundles(&self, category: Category) -> Vec<String> {
        self.manifest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bundles(category)
            .to_vec()
    }

    /// Date stamp of the last successful refresh, if any
    pub fn last_refresh(&self) -> Option<i64> {
        self.prefs.get_int(LAST_ASSETS_UPDATE_KEY)
    }

    /// Refresh from the origin, honouring the configured gate unless `force`
    pub async fn refresh(&self, force: bool) -> RefreshOutcome {
        self.refresh_on(Local::now().date_naive(), force).await
    }

    /// Refresh as if today were `today`
    pub async fn refresh_on(&self, today: NaiveDate, force: bool) -> RefreshOutcome {
        let stamp = date_stamp(today);

        if !force && self.config.refresh_policy == RefreshPolicy::Daily {
            if let Some(last) = self.last_refresh() {
                if stamp <= last {
                    tracing::debug!(last, "manifest already refreshed today");
                    return RefreshOutcome::UpToDate;
                }
            }
        }

        match self.fetch_remote().await {
            Ok((manifest, raw)) => {
                *self.manifest.write().unwrap_or_else(PoisonError::into_inner) = manifest.clone();

                let path = self.config.manifest_path();
                match tokio::fs::write(&path, &raw).await {
                    Ok(()) => {
                        if let Err(e) = self.prefs.set_int(LAST_ASSETS_UPDATE_KEY, stamp) {
                            tracing::warn!(error = %e, "failed to record manifest refresh date");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to persist manifest");
                    }
                }

                tracing::info!(
                    faces = manifest.card_face_bundles.len(),
                    backs = manifest.card_back_bundles.len(),
                    backgrounds = manifest.background_bundles.len(),
                    "manifest refreshed"
                );
                RefreshOutcome::Updated(manifest)
            }
            Err(e) => {
                tracing::warn!(error = %e, "manifest refresh failed, keeping current manifest");
                RefreshOutcome::Failed(e)
            }
        }
    }

    async fn fetch_remote(&self) -> Result<(Manifest, Vec<u8>)> {
        tokio::fs::create_dir_all(self.config.assets_dir()).await?;

        let body = self.fetcher.get(&self.config.manifest_url()).await?;
        let text = std::str::from_utf8(&body).map_err(|e| AssetError::ManifestParse(e.to_string()))?;
        let manifest = Manifest::from_json(text)?;

        Ok((manifest, body.to_vec()))
    }
}

impl std::fmt::Debug for ManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestStore")
            .field("manifest_path", &self.config.manifest_path())
            .field("manifest", &self.manifest())
            .finish()
    }
}

/// Read the persisted manifest, falling back to the embedded default.
/// Never fails: problems are logged and masked by the fallback.
pub fn load_manifest(path: &Path) -> Manifest {
    if path.exists() {
        match std::fs::read_to_string(path) {
            Ok(json) => match Manifest::from_json(&json) {
                Ok(manifest) => {
                    tracing::info!(path = %path.display(), "loaded cached manifest");
                    return manifest;
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cached manifest is corrupt"),
            },
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to read cached manifest"),
        }
    }

    default_manifest()
}

/// The embedded fallback manifest
pub fn default_manifest() -> Manifest {
    Manifest::from_json(DEFAULT_MANIFEST_JSON).unwrap_or_else(|e| {
        tracing::error!(error = %e, "embedded default manifest is invalid");
        Manifest::default()
    })
}
