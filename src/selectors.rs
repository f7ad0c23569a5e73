//! Category selectors: the active bundle per visual category.
//!
//! Each category holds at most one active bundle and the sprites extracted
//! from it. Switching a category swaps both at once and then evicts the
//! previous bundle, unless another category still has it selected. Bundles
//! are not assumed to belong to a single category.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::bundle::{blocking, Bundle, BundleCache};
use crate::error::{AssetError, Result};
use crate::sprite::{Sprite, SpriteSet};
use crate::state::data::Category;

#[derive(Debug, Clone)]
struct ActiveSelection {
    bundle: String,
    sprites: Arc<SpriteSet>,
}

#[derive(Default)]
struct SelectorState {
    active: HashMap<Category, ActiveSelection>,
    /// Bundles a category is fetching or extracting but has not committed yet
    pending: HashMap<Category, String>,
}

impl SelectorState {
    /// Whether any category has `bundle` active or is about to
    fn references(&self, bundle: &str) -> bool {
        self.active.values().any(|selection| selection.bundle == bundle)
            || self.pending.values().any(|pending| pending == bundle)
    }
}

/// Clears a category's pending entry when `set_active` ends. If the
/// selection never committed, the bundle is released unless some category
/// still references it.
struct PendingSelection<'a> {
    selectors: &'a CategorySelectors,
    category: Category,
    bundle: &'a str,
    committed: bool,
}

impl Drop for PendingSelection<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        let mut state = self.selectors.state();
        state.pending.remove(&self.category);
        if !state.references(self.bundle) && self.selectors.bundles.evict(self.bundle) {
            tracing::debug!(category = %self.category, bundle = self.bundle, "released bundle of failed selection");
        }
    }
}

pub struct CategorySelectors {
    bundles: Arc<BundleCache>,
    /// Serializes selection changes within a category
    turns: [AsyncMutex<()>; 3],
    state: Mutex<SelectorState>,
}

impl CategorySelectors {
    pub fn new(bundles: Arc<BundleCache>) -> Self {
        Self {
            bundles,
            turns: [AsyncMutex::new(()), AsyncMutex::new(()), AsyncMutex::new(())],
            state: Mutex::new(SelectorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `bundle` the active selection for `category`.
    ///
    /// Re-selecting the active bundle returns the sprites already extracted
    /// without touching the network. On failure the current selection stays
    /// and the bundle that failed to load is not kept in the cache.
    ///
    /// Eviction decisions are made under the state lock, so a bundle another
    /// category is still loading is never dropped from the cache.
    pub async fn set_active(&self, category: Category, bundle: &str) -> Result<Arc<SpriteSet>> {
        let _turn = self.turns[category as usize].lock().await;

        {
            let mut state = self.state();
            if let Some(current) = state.active.get(&category) {
                if current.bundle == bundle {
                    tracing::debug!(%category, bundle, "already active");
                    return Ok(Arc::clone(&current.sprites));
                }
            }
            state.pending.insert(category, bundle.to_string());
        }
        let mut pending = PendingSelection {
            selectors: self,
            category,
            bundle,
            committed: false,
        };

        let loaded = self.bundles.fetch(bundle).await?;
        let sprites = Arc::new(extract(category, loaded).await?);

        {
            let mut state = self.state();
            state.pending.remove(&category);
            pending.committed = true;

            let previous = state.active.insert(
                category,
                ActiveSelection {
                    bundle: bundle.to_string(),
                    sprites: Arc::clone(&sprites),
                },
            );
            if let Some(previous) = previous {
                if state.references(&previous.bundle) {
                    tracing::debug!(%category, bundle = %previous.bundle, "previous bundle still selected elsewhere");
                } else {
                    self.bundles.evict(&previous.bundle);
                }
            }
        }

        tracing::info!(%category, bundle, sprites = sprites.len(), "selection active");
        Ok(sprites)
    }

    /// Identifier of the active bundle for `category`
    pub fn active_bundle(&self, category: Category) -> Option<String> {
        self.state().active.get(&category).map(|selection| selection.bundle.clone())
    }

    /// All sprites of the active selection
    pub fn sprite_set(&self, category: Category) -> Result<Arc<SpriteSet>> {
        self.state()
            .active
            .get(&category)
            .map(|selection| Arc::clone(&selection.sprites))
            .ok_or(AssetError::NotLoaded(category))
    }

    /// Sprite called `name` in the active selection
    pub fn sprite(&self, category: Category, name: &str) -> Result<Sprite> {
        self.sprite_set(category)?.get(name).cloned()
    }

    /// First sprite of the active selection
    pub fn primary_sprite(&self, category: Category) -> Result<Sprite> {
        self.sprite_set(category)?.primary().cloned()
    }
}

/// Face packs expose every image by name; backs and backgrounds only their
/// first image.
async fn extract(category: Category, bundle: Arc<Bundle>) -> Result<SpriteSet> {
    blocking(move || {
        let sprites = if category.extracts_all_images() {
            bundle.load_all_images()?
        } else {
            vec![bundle.load_first_image()?]
        };
        Ok(SpriteSet::new(bundle.name(), sprites))
    })
    .await
}
