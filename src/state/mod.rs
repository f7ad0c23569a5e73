/// State management module
///
/// This module handles the non-cache application state:
/// - Shared data structures (data.rs)
/// - The bundle manifest and its refresh policy (manifest.rs)
/// - User preferences the selections are read from (preferences.rs)

pub mod data;
pub mod manifest;
pub mod preferences;
