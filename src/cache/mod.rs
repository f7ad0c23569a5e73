/// Asset caches
///
/// This module handles:
/// - De-duplicating concurrent fetches of the same key (flight.rs)
/// - Downloaded bundles with explicit eviction (bundle.rs)
/// - Decoded thumbnails kept for the process lifetime (thumbnail.rs)

pub mod bundle;
pub mod flight;
pub mod thumbnail;

pub use bundle::{Bundle, BundleCache};
pub use thumbnail::{ThumbnailCache, ThumbnailShape};
