use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::{BundleCache, ThumbnailCache, ThumbnailShape};
use crate::config::AssetsConfig;
use crate::error::Result;
use crate::fetcher::{HttpFetcher, RemoteFetcher};
use crate::selectors::CategorySelectors;
use crate::sprite::{Sprite, SpriteSet};
use crate::state::data::{card_sprite_name, CardRank, CardSuit, Category};
use crate::state::manifest::{ManifestStore, RefreshOutcome};
use crate::state::preferences::{FilePreferences, Preferences, Selections};

/// Entry point for the presentation layer.
///
/// Construct one at startup and share it (usually as `Arc<AssetManager>`);
/// every instance owns its own caches.
pub struct AssetManager {
    config: AssetsConfig,
    prefs: Arc<dyn Preferences>,
    manifest: ManifestStore,
    bundles: Arc<BundleCache>,
    selectors: CategorySelectors,
    thumbnails: ThumbnailCache,
}

impl AssetManager {
    pub fn new(config: AssetsConfig, fetcher: Arc<dyn RemoteFetcher>, prefs: Arc<dyn Preferences>) -> Self {
        let manifest = ManifestStore::open(config.clone(), Arc::clone(&fetcher), Arc::clone(&prefs));
        let bundles = Arc::new(BundleCache::new(config.clone(), Arc::clone(&fetcher)));
        let selectors = CategorySelectors::new(Arc::clone(&bundles));
        let thumbnails = ThumbnailCache::new(config.clone(), fetcher);

        tracing::info!(origin = %config.origin, data_dir = %config.data_dir.display(), "asset manager ready");

        Self {
            config,
            prefs,
            manifest,
            bundles,
            selectors,
            thumbnails,
        }
    }

    /// Manager using HTTP and preferences stored next to the manifest
    pub fn open(config: AssetsConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?);
        let prefs = Arc::new(FilePreferences::open(config.preferences_path()));
        Ok(Self::new(config, fetcher, prefs))
    }

    pub fn config(&self) -> &AssetsConfig {
        &self.config
    }

    pub fn manifest(&self) -> &ManifestStore {
        &self.manifest
    }

    pub fn bundles(&self) -> &BundleCache {
        &self.bundles
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub fn preferences(&self) -> &Arc<dyn Preferences> {
        &self.prefs
    }

    // ========== Selection ==========

    pub async fn select(&self, category: Category, bundle: &str) -> Result<Arc<SpriteSet>> {
        self.selectors.set_active(category, bundle).await
    }

    pub async fn select_card_face_pack(&self, bundle: &str) -> Result<Arc<SpriteSet>> {
        self.select(Category::CardFaces, bundle).await
    }

    pub async fn select_card_back(&self, bundle: &str) -> Result<Arc<SpriteSet>> {
        self.select(Category::CardBack, bundle).await
    }

    pub async fn select_background(&self, bundle: &str) -> Result<Arc<SpriteSet>> {
        self.select(Category::Background, bundle).await
    }

    pub fn active_bundle(&self, category: Category) -> Option<String> {
        self.selectors.active_bundle(category)
    }

    /// Apply all three selections concurrently. Every category is attempted;
    /// the first failure (faces, back, background order) is returned.
    pub async fn apply_selections(&self, selections: &Selections) -> Result<()> {
        let apply = |category: Category| async move {
            match selections.get(category) {
                Some(bundle) => self.select(category, bundle).await.map(|_| ()),
                None => {
                    tracing::debug!(%category, "no selection to apply");
                    Ok(())
                }
            }
        };

        let (faces, back, background) = tokio::join!(
            apply(Category::CardFaces),
            apply(Category::CardBack),
            apply(Category::Background),
        );
        faces.and(back).and(background)
    }

    /// Re-read the selections from preferences and apply them
    pub async fn apply_preferences(&self) -> Result<()> {
        let selections = Selections::from_preferences(self.prefs.as_ref(), &self.manifest.manifest());
        self.apply_selections(&selections).await
    }

    /// Apply preferences every time the settings owner signals a change.
    /// The task ends when the sender side is dropped.
    pub fn spawn_settings_listener(self: &Arc<Self>, mut changes: mpsc::Receiver<()>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while changes.recv().await.is_some() {
                tracing::info!("settings changed, reloading selections");
                if let Err(e) = manager.apply_preferences().await {
                    tracing::warn!(error = %e, "failed to apply changed settings");
                }
            }
            tracing::debug!("settings listener stopped");
        })
    }

    // ========== Lookups ==========

    pub fn card_sprite(&self, suit: CardSuit, rank: CardRank) -> Result<Sprite> {
        self.selectors.sprite(Category::CardFaces, &card_sprite_name(suit, rank))
    }

    pub fn card_back_sprite(&self) -> Result<Sprite> {
        self.selectors.primary_sprite(Category::CardBack)
    }

    pub fn background_sprite(&self) -> Result<Sprite> {
        self.selectors.primary_sprite(Category::Background)
    }

    /// Deck cards the active face pack has no sprite for
    pub fn missing_card_sprites(&self) -> Result<Vec<String>> {
        let set = self.selectors.sprite_set(Category::CardFaces)?;
        Ok(CardSuit::ALL
            .iter()
            .flat_map(|&suit| CardRank::ALL.iter().map(move |&rank| card_sprite_name(suit, rank)))
            .filter(|name| !set.contains(name))
            .collect())
    }

    // ========== Thumbnails ==========

    pub async fn thumbnail(&self, bundle: &str, use_separate_variant: bool) -> Result<Sprite> {
        self.thumbnails
            .get(bundle, use_separate_variant, ThumbnailShape::FirstImage)
            .await
    }

    pub async fn thumbnail_with(&self, bundle: &str, use_separate_variant: bool, shape: ThumbnailShape) -> Result<Sprite> {
        self.thumbnails.get(bundle, use_separate_variant, shape).await
    }

    // ========== Manifest ==========

    /// Refresh subject to the configured gate
    pub async fn refresh_manifest(&self) -> RefreshOutcome {
        self.manifest.refresh(false).await
    }

    /// Refresh regardless of the gate
    pub async fn refresh_manifest_now(&self) -> RefreshOutcome {
        self.manifest.refresh(true).await
    }
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("origin", &self.config.origin)
            .field("cached_bundles", &self.bundles.names())
            .field("thumbnails", &self.thumbnails.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::state::preferences::MemoryPreferences;
    use crate::test_support::{bundle_bytes, FakeFetcher};

    fn full_deck() -> Vec<String> {
        CardSuit::ALL
            .iter()
            .flat_map(|&suit| CardRank::ALL.iter().map(move |&rank| card_sprite_name(suit, rank)))
            .collect()
    }

    fn manager(fetcher: &Arc<FakeFetcher>) -> (tempfile::TempDir, AssetManager) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fetcher.config();
        config.data_dir = dir.path().to_path_buf();
        let manager = AssetManager::new(config, fetcher.clone(), Arc::new(MemoryPreferences::new()));
        (dir, manager)
    }

    #[tokio::test]
    async fn test_lookups_fail_before_selection() {
        let fetcher = FakeFetcher::new();
        let (_dir, manager) = manager(&fetcher);

        assert_eq!(
            manager.card_sprite(CardSuit::Hearts, CardRank::Ace).unwrap_err(),
            AssetError::NotLoaded(Category::CardFaces)
        );
        assert_eq!(manager.card_back_sprite().unwrap_err(), AssetError::NotLoaded(Category::CardBack));
        assert_eq!(manager.background_sprite().unwrap_err(), AssetError::NotLoaded(Category::Background));
    }

    #[tokio::test]
    async fn test_card_sprite_lookup_by_suit_and_rank() {
        let fetcher = FakeFetcher::new();
        let deck = full_deck();
        fetcher.serve("deck1", bundle_bytes(&deck.iter().map(String::as_str).collect::<Vec<_>>()));
        let (_dir, manager) = manager(&fetcher);

        manager.select_card_face_pack("deck1").await.unwrap();

        assert_eq!(manager.card_sprite(CardSuit::Diamonds, CardRank::Jack).unwrap().name(), "Diamonds_12");
        assert!(manager.missing_card_sprites().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_pack_reports_missing_cards() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("tiny", bundle_bytes(&["Hearts_2", "Hearts_3"]));
        let (_dir, manager) = manager(&fetcher);

        manager.select_card_face_pack("tiny").await.unwrap();

        assert_eq!(manager.missing_card_sprites().unwrap().len(), 50);
        assert!(matches!(
            manager.card_sprite(CardSuit::Spades, CardRank::King),
            Err(AssetError::ResourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_preferences_selects_every_category() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("deck1", bundle_bytes(&["Hearts_2"]));
        fetcher.serve("back7", bundle_bytes(&["back"]));
        fetcher.serve("background1", bundle_bytes(&["table"]));
        let (_dir, manager) = manager(&fetcher);
        manager.preferences().set_string("CardBack", "back7").unwrap();

        manager.apply_preferences().await.unwrap();

        // Faces default to deck1, background to the first manifest entry
        assert_eq!(manager.active_bundle(Category::CardFaces).as_deref(), Some("deck1"));
        assert_eq!(manager.card_back_sprite().unwrap().name(), "back");
        assert_eq!(manager.background_sprite().unwrap().name(), "table");
    }

    #[tokio::test]
    async fn test_apply_selections_reports_failure_but_applies_the_rest() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("back1", bundle_bytes(&["back"]));
        let (_dir, manager) = manager(&fetcher);
        let selections = Selections {
            card_faces: Some("missing".into()),
            card_back: Some("back1".into()),
            background: None,
        };

        let err = manager.apply_selections(&selections).await.unwrap_err();

        assert!(err.is_network());
        assert_eq!(manager.active_bundle(Category::CardBack).as_deref(), Some("back1"));
    }

    #[tokio::test]
    async fn test_settings_listener_reacts_to_changes() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("deck1", bundle_bytes(&["Hearts_2"]));
        fetcher.serve("deck2", bundle_bytes(&["Hearts_2"]));
        fetcher.serve("back1", bundle_bytes(&["back"]));
        fetcher.serve("background1", bundle_bytes(&["table"]));
        let (_dir, manager) = manager(&fetcher);
        let manager = Arc::new(manager);

        let (tx, rx) = mpsc::channel(4);
        let listener = manager.spawn_settings_listener(rx);

        tx.send(()).await.unwrap();
        manager.preferences().set_string("CardFaces", "deck2").unwrap();
        tx.send(()).await.unwrap();
        drop(tx);
        listener.await.unwrap();

        assert_eq!(manager.active_bundle(Category::CardFaces).as_deref(), Some("deck2"));
        assert!(!manager.bundles().contains("deck1"));
    }

    #[tokio::test]
    async fn test_thumbnail_scenario() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("deck2thumb", bundle_bytes(&["preview"]));
        let (_dir, manager) = manager(&fetcher);

        let first = manager.thumbnail("deck2", true).await.unwrap();
        let second = manager.thumbnail("deck2", true).await.unwrap();

        assert_eq!(fetcher.calls("deck2thumb"), 1);
        assert!(first.same_image(&second));
        assert!(manager.thumbnails().contains("deck2thumb"));
    }

    #[tokio::test]
    async fn test_thumbnail_with_named_asset() {
        let fetcher = FakeFetcher::new();
        fetcher.serve("deck1thumb", bundle_bytes(&["Clubs_2", "Spades_15"]));
        let (_dir, manager) = manager(&fetcher);

        let sprite = manager
            .thumbnail_with("deck1", true, ThumbnailShape::Named("Spades_15".into()))
            .await
            .unwrap();

        assert_eq!(sprite.name(), "Spades_15");
        assert!(manager.thumbnails().contains("deck1thumb/Spades_15"));
        assert!(!manager.thumbnails().contains("deck1thumb"));
    }
}
