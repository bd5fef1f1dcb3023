//! # Configuration Module
//!
//! Data directory setup and the runtime knobs of a recommendation run.
//!
//! ## Data Storage
//!
//! The track cache written after every catalog fetch lives in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/cadence/tracks.csv`
//! - macOS: `~/Library/Application Support/cadence/tracks.csv`
//! - Windows: `%APPDATA%\cadence\tracks.csv`
//!
//! Credentials are not stored here. They are read from the command line or
//! environment and handed to the catalog and language-model clients.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Returns the Cadence data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the platform data directory cannot be determined or the
/// `cadence` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let cadence_dir = data_dir.join("cadence");
    fs::create_dir_all(&cadence_dir).with_context(|| {
        format!(
            "Failed to create Cadence data directory at {}. Please check file permissions.",
            cadence_dir.display()
        )
    })?;

    Ok(cadence_dir)
}

/// Path of the cached track table from the last catalog fetch.
///
/// ```no_run
/// let cache = cadence::config::get_cache_path()?;
/// println!("Track cache: {}", cache.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_cache_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("tracks.csv"))
}

/// Knobs for a recommendation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Where fetched tracks are cached and read back from.
    pub cache_path: PathBuf,
    /// Upper bound of the cluster-count scan.
    pub max_clusters: usize,
    /// Recommendations to sample.
    pub num_songs: usize,
    /// Tracks fetched per genre.
    pub per_genre_cap: usize,
    /// Search page size.
    pub page_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::with_cache_path(get_cache_path().unwrap_or_else(|_| PathBuf::from("tracks.csv")))
    }
}

impl RuntimeConfig {
    /// Defaults with the platform cache path.
    pub fn new() -> Result<Self> {
        Ok(Self::with_cache_path(get_cache_path()?))
    }

    /// Defaults with an explicit cache path.
    #[must_use]
    pub fn with_cache_path(cache_path: PathBuf) -> Self {
        Self {
            cache_path,
            max_clusters: 7,
            num_songs: 5,
            per_genre_cap: 900,
            page_size: 50,
        }
    }
}
