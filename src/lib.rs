//! Remote card asset bundles: manifest, caching and de-duplicated fetches.
//!
//! The crate downloads named bundles (card face packs, card backs,
//! backgrounds and their thumbnails) from a remote origin, keeps them in
//! memory and hands decoded sprites to the presentation layer. Concurrent
//! requests for the same bundle share a single download.
//!
//! Build one [`AssetManager`] at startup and pass it to the consumers.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod manager;
pub mod selectors;
pub mod sprite;
pub mod state;

#[cfg(test)]
mod test_support;

pub use cache::{Bundle, BundleCache, ThumbnailCache, ThumbnailShape};
pub use config::{AssetsConfig, RefreshPolicy};
pub use error::{AssetError, Result};
pub use fetcher::{HttpFetcher, RemoteFetcher};
pub use manager::AssetManager;
pub use sprite::{Sprite, SpriteSet};
pub use state::data::{CardRank, CardSuit, Category, Manifest};
pub use state::manifest::{ManifestStore, RefreshOutcome};
pub use state::preferences::{FilePreferences, MemoryPreferences, Preferences, Selections};
