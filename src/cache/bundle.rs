use bytes::Bytes;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use zip::ZipArchive;

use super::flight::FlightCache;
use crate::config::AssetsConfig;
use crate::error::{AssetError, Result};
use crate::fetcher::RemoteFetcher;
use crate::sprite::Sprite;

/// Upper bound on the buffer reserved up front for one archive entry. The
/// size in the entry header is not trusted beyond this.
const MAX_ENTRY_PREALLOC: u64 = 16 << 20;

fn entry_capacity(declared_size: u64) -> usize {
    declared_size.min(MAX_ENTRY_PREALLOC) as usize
}

/// A downloaded bundle: a zip archive of image files.
///
/// The archive is indexed when the bundle is created; images are only decoded
/// on request. Asset names are the entry file stems, so `faces/Hearts_12.png`
/// is the asset `Hearts_12`.
#[derive(Debug)]
pub struct Bundle {
    name: String,
    data: Bytes,
    /// (asset name, archive entry name), in archive order
    entries: Vec<(String, String)>,
}

impl Bundle {
    /// Index the archive in `data`
    pub fn from_archive(name: impl Into<String>, data: Bytes) -> Result<Self> {
        let name = name.into();
        let decode_error = |e: zip::result::ZipError| AssetError::Decode {
            bundle: name.clone(),
            message: e.to_string(),
        };

        let mut archive = ZipArchive::new(Cursor::new(data.clone())).map_err(decode_error)?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index(index).map_err(decode_error)?;
            if file.is_dir() {
                continue;
            }
            let entry = file.name().to_string();
            if let Some(stem) = Path::new(&entry).file_stem().and_then(|s| s.to_str()) {
                entries.push((stem.to_string(), entry.clone()));
            }
        }

        Ok(Self { name, data, entries })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the downloaded payload
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(asset, _)| asset.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a single named asset
    pub fn load_image(&self, asset: &str) -> Result<Sprite> {
        let entry = self
            .entries
            .iter()
            .find(|(name, _)| name == asset)
            .map(|(_, entry)| entry.as_str())
            .ok_or_else(|| AssetError::ResourceNotFound {
                bundle: self.name.clone(),
                asset: asset.to_string(),
            })?;

        let mut archive = self.archive()?;
        self.decode_entry(&mut archive, asset, entry)
    }

    /// Decode every asset in archive order
    pub fn load_all_images(&self) -> Result<Vec<Sprite>> {
        let mut archive = self.archive()?;
        self.entries
            .iter()
            .map(|(asset, entry)| self.decode_entry(&mut archive, asset, entry))
            .collect()
    }

    /// Decode the first asset of the archive
    pub fn load_first_image(&self) -> Result<Sprite> {
        let (asset, entry) = self.entries.first().ok_or_else(|| AssetError::ResourceNotFound {
            bundle: self.name.clone(),
            asset: "<first image>".to_string(),
        })?;

        let mut archive = self.archive()?;
        self.decode_entry(&mut archive, asset, entry)
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<Bytes>>> {
        ZipArchive::new(Cursor::new(self.data.clone())).map_err(|e| self.decode_error(e))
    }

    fn decode_entry(&self, archive: &mut ZipArchive<Cursor<Bytes>>, asset: &str, entry: &str) -> Result<Sprite> {
        let mut file = archive.by_name(entry).map_err(|e| self.decode_error(e))?;
        let mut buffer = Vec::with_capacity(entry_capacity(file.size()));
        file.read_to_end(&mut buffer)?;

        let image = image::load_from_memory(&buffer)
            .map_err(|e| self.decode_error(format!("{entry}: {e}")))?
            .to_rgba8();

        Ok(Sprite::new(asset, image))
    }

    fn decode_error(&self, message: impl ToString) -> AssetError {
        AssetError::Decode {
            bundle: self.name.clone(),
            message: message.to_string(),
        }
    }
}

/// Run CPU-bound bundle work off the async workers
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AssetError::Aborted(format!("decode task failed: {e}")))?
}

/// Downloaded bundles keyed by name, with de-duplicated fetches.
///
/// Bundles are shared as `Arc<Bundle>`: evicting one only drops the cache's
/// handle, so a caller still extracting from it keeps it alive.
pub struct BundleCache {
    config: AssetsConfig,
    fetcher: Arc<dyn RemoteFetcher>,
    bundles: FlightCache<Arc<Bundle>>,
}

impl BundleCache {
    pub fn new(config: AssetsConfig, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            config,
            fetcher,
            bundles: FlightCache::new("bundle"),
        }
    }

    /// Cached bundle, or a single shared download of it
    pub async fn fetch(&self, name: &str) -> Result<Arc<Bundle>> {
        let url = self.config.bundle_url(name);
        let fetcher = Arc::clone(&self.fetcher);
        let key = name.to_string();

        self.bundles
            .get_or_fetch(name, move || async move {
                tracing::info!(bundle = %key, %url, "downloading bundle");
                let data = fetcher.get(&url).await?;
                let bundle = blocking(move || Bundle::from_archive(key, data)).await?;
                tracing::info!(
                    bundle = %bundle.name(),
                    assets = bundle.len(),
                    bytes = bundle.size_bytes(),
                    "bundle loaded"
                );
                Ok::<_, AssetError>(Arc::new(bundle))
            })
            .await
    }

    /// Cached bundle without fetching
    pub fn get(&self, name: &str) -> Option<Arc<Bundle>> {
        self.bundles.get(name)
    }

    /// Drop the cached bundle. Returns false when it was not cached or is
    /// being downloaded right now.
    pub fn evict(&self, name: &str) -> bool {
        match self.bundles.remove(name) {
            Some(bundle) => {
                // Remaining holders keep the payload alive until they finish
                tracing::info!(bundle = name, other_holders = Arc::strong_count(&bundle) - 1, "bundle evicted");
                true
            }
            None => {
                tracing::debug!(bundle = name, in_flight = self.bundles.is_in_flight(name), "nothing to evict");
                false
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bundles.contains(name)
    }

    pub fn is_in_flight(&self, name: &str) -> bool {
        self.bundles.is_in_flight(name)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Names of the cached bundles, sorted
    pub fn names(&self) -> Vec<String> {
        self.bundles.keys()
    }
}
