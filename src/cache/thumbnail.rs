use std::sync::Arc;

use super::bundle::{blocking, Bundle};
use super::flight::FlightCache;
use crate::config::AssetsConfig;
use crate::error::Result;
use crate::fetcher::RemoteFetcher;
use crate::sprite::Sprite;

/// Which image of a thumbnail bundle is the preview.
/// Chosen by the call site, never guessed from the bundle content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ThumbnailShape {
    /// Decode everything, keep the first image
    #[default]
    FirstImage,
    /// Decode the single asset with this name
    Named(String),
}

/// Decoded preview images for the bundle pickers.
///
/// Entries are immutable once inserted and are never evicted: the catalog is a
/// small finite set, so growth is bounded by the manifest size.
pub struct ThumbnailCache {
    config: AssetsConfig,
    fetcher: Arc<dyn RemoteFetcher>,
    thumbnails: FlightCache<Sprite>,
}

impl ThumbnailCache {
    pub fn new(config: AssetsConfig, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            config,
            fetcher,
            thumbnails: FlightCache::new("thumbnail"),
        }
    }

    /// Bundle holding the preview for `bundle`: either the bundle itself, or
    /// its smaller sibling `<bundle><suffix>`
    pub fn thumbnail_bundle_name(&self, bundle: &str, use_separate_variant: bool) -> String {
        if use_separate_variant {
            format!("{bundle}{}", self.config.thumbnail_suffix)
        } else {
            bundle.to_string()
        }
    }

    /// Cache key of a thumbnail
    pub fn key(&self, bundle: &str, use_separate_variant: bool, shape: &ThumbnailShape) -> String {
        let name = self.thumbnail_bundle_name(bundle, use_separate_variant);
        match shape {
            ThumbnailShape::FirstImage => name,
            ThumbnailShape::Named(asset) => format!("{name}/{asset}"),
        }
    }

    /// Preview image for `bundle`, downloaded at most once per key
    pub async fn get(&self, bundle: &str, use_separate_variant: bool, shape: ThumbnailShape) -> Result<Sprite> {
        let key = self.key(bundle, use_separate_variant, &shape);
        let name = self.thumbnail_bundle_name(bundle, use_separate_variant);
        let url = self.config.bundle_url(&name);
        let fetcher = Arc::clone(&self.fetcher);

        self.thumbnails
            .get_or_fetch(&key, move || async move {
                tracing::info!(bundle = %name, %url, "downloading thumbnail");
                let data = fetcher.get(&url).await?;
                blocking(move || {
                    let bundle = Bundle::from_archive(name, data)?;
                    match shape {
                        ThumbnailShape::FirstImage => bundle.load_first_image(),
                        ThumbnailShape::Named(asset) => bundle.load_image(&asset),
                    }
                })
                .await
            })
            .await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.thumbnails.contains(key)
    }

    pub fn len(&self) -> usize {
        self.thumbnails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::test_support::{bundle_bytes, FakeFetcher};

    #[tokio::test]
    async fn test_separate_variant_fetches_thumb_bundle_once() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("deck2thumb", bundle_bytes(&["preview"]));
        let cache = ThumbnailCache::new(fetcher.config(), fetcher.clone());

        let first = cache.get("deck2", true, ThumbnailShape::FirstImage).await.unwrap();
        assert_eq!(fetcher.calls("deck2thumb"), 1);
        assert_eq!(fetcher.calls("deck2"), 0);
        assert!(cache.contains("deck2thumb"));

        let second = cache.get("deck2", true, ThumbnailShape::FirstImage).await.unwrap();
        assert_eq!(fetcher.calls("deck2thumb"), 1);
        assert!(first.same_image(&second));
        assert_eq!(second.name(), "preview");
    }

    #[tokio::test]
    async fn test_without_variant_uses_bundle_itself() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("back1", bundle_bytes(&["back"]));
        let cache = ThumbnailCache::new(fetcher.config(), fetcher.clone());

        let sprite = cache.get("back1", false, ThumbnailShape::FirstImage).await.unwrap();

        assert_eq!(sprite.name(), "back");
        assert_eq!(fetcher.calls("back1"), 1);
    }

    #[tokio::test]
    async fn test_named_shape_picks_asset() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("deck1thumb", bundle_bytes(&["Clubs_2", "Hearts_15"]));
        let cache = ThumbnailCache::new(fetcher.config(), fetcher.clone());

        let sprite = cache
            .get("deck1", true, ThumbnailShape::Named("Hearts_15".into()))
            .await
            .unwrap();
        assert_eq!(sprite.name(), "Hearts_15");
        assert!(cache.contains("deck1thumb/Hearts_15"));

        let missing = cache.get("deck1", true, ThumbnailShape::Named("Spades_3".into())).await;
        assert!(matches!(missing, Err(AssetError::ResourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_fetch() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("bg1thumb", bundle_bytes(&["bg"]));
        let cache = ThumbnailCache::new(fetcher.config(), fetcher.clone());

        let (a, b, c) = tokio::join!(
            cache.get("bg1", true, ThumbnailShape::FirstImage),
            cache.get("bg1", true, ThumbnailShape::FirstImage),
            cache.get("bg1", true, ThumbnailShape::FirstImage),
        );

        let a = a.unwrap();
        assert!(a.same_image(&b.unwrap()));
        assert!(a.same_image(&c.unwrap()));
        assert_eq!(fetcher.calls("bg1thumb"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_reaches_every_waiter_and_allows_retry() {
        let fetcher = FakeFetcher::new();
        let cache = ThumbnailCache::new(fetcher.config(), fetcher.clone());

        let (a, b, c) = tokio::join!(
            cache.get("x", true, ThumbnailShape::FirstImage),
            cache.get("x", true, ThumbnailShape::FirstImage),
            cache.get("x", true, ThumbnailShape::FirstImage),
        );

        let a = a.unwrap_err();
        assert!(matches!(a, AssetError::Http { status: 404, .. }));
        assert_eq!(b.unwrap_err(), a);
        assert_eq!(c.unwrap_err(), a);
        assert_eq!(fetcher.calls("xthumb"), 1);
        assert!(!cache.contains("xthumb"));

        fetcher.serve("xthumb", bundle_bytes(&["preview"]));
        let sprite = cache.get("x", true, ThumbnailShape::FirstImage).await.unwrap();
        assert_eq!(sprite.name(), "preview");
        assert_eq!(fetcher.calls("xthumb"), 2);
    }
}
