//! Runtime configuration: remote origin, local storage location and the
//! manifest refresh gate.

use serde::Deserialize;
use std::path::PathBuf;

/// Default remote origin for the manifest and bundles
pub const DEFAULT_ORIGIN: &str = "https://pulni.com/war";

/// Suffix appended to a bundle name to address its preview bundle
pub const DEFAULT_THUMBNAIL_SUFFIX: &str = "thumb";

const MANIFEST_REMOTE_NAME: &str = "AssetsInfo.json";
const MANIFEST_LOCAL_NAME: &str = "info.json";

/// How often the manifest may be refreshed from the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Every refresh request goes to the network
    #[default]
    Always,
    /// At most one refresh per calendar day, unless forced
    Daily,
}

impl RefreshPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "always" => Some(RefreshPolicy::Always),
            "daily" => Some(RefreshPolicy::Daily),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Base URL; the manifest and bundles live directly under it
    pub origin: String,
    /// Application-private data directory
    pub data_dir: PathBuf,
    pub thumbnail_suffix: String,
    pub refresh_policy: RefreshPolicy,
    /// Timeout for a single HTTP request
    pub request_timeout_secs: u64,
}

impl Default for AssetsConfig {
    /// Data lives in the user's data directory:
    /// - Linux: ~/.local/share/card-assets
    /// - macOS: ~/Library/Application Support/card-assets
    /// - Windows: %APPDATA%\card-assets
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("card-assets");

        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            data_dir,
            thumbnail_suffix: DEFAULT_THUMBNAIL_SUFFIX.to_string(),
            refresh_policy: RefreshPolicy::default(),
            request_timeout_secs: 30,
        }
    }
}

impl AssetsConfig {
    /// Defaults overlaid with `CARD_ASSETS_ORIGIN`, `CARD_ASSETS_DIR` and
    /// `CARD_ASSETS_REFRESH`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origin) = std::env::var("CARD_ASSETS_ORIGIN") {
            config.origin = origin;
        }
        if let Ok(dir) = std::env::var("CARD_ASSETS_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(policy) = std::env::var("CARD_ASSETS_REFRESH") {
            match RefreshPolicy::parse(&policy) {
                Some(policy) => config.refresh_policy = policy,
                None => tracing::warn!(value = %policy, "ignoring unknown CARD_ASSETS_REFRESH"),
            }
        }

        config
    }

    /// Config rooted at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Directory holding the persisted manifest
    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("Assets")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.assets_dir().join(MANIFEST_LOCAL_NAME)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn manifest_url(&self) -> String {
        self.bundle_url(MANIFEST_REMOTE_NAME)
    }

    pub fn bundle_url(&self, name: &str) -> String {
        format!("{}/{}", self.origin.trim_end_matches('/'), name)
    }
}
