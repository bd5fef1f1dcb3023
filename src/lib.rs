//! Song recommendations from audio-feature clustering.
//!
//! Core modules:
//! - [`features`] - Column selection and standard scaling
//! - [`clustering`] - K-means and the cluster-count scan
//! - [`recommend`] - Sampling from the input song's group
//! - [`recommender`] - The end-to-end pipeline
//!
//! ### Supporting Modules
//!
//! - [`track`] - Track and audio-feature types
//! - [`table`] - CSV-backed track tables
//! - [`catalog`] - Spotify Web API client
//! - [`enrich`] - Language-model commentary
//! - [`config`] - Data directory and runtime settings
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use cadence::catalog::{CatalogConfig, SpotifyClient};
//! use cadence::config::RuntimeConfig;
//! use cadence::recommender::{RecommendRequest, Recommender, TrackSource};
//!
//! let spotify = SpotifyClient::connect(&CatalogConfig::new("client-id", "client-secret"))?;
//! let config = RuntimeConfig::new()?;
//!
//! let mut request = RecommendRequest::new("One More Time", &config);
//! request.source = TrackSource::Fetch;
//!
//! let recommendation = Recommender::new(&spotify, config).recommend(&request)?;
//! for song in &recommendation.payload.recommendations {
//!     println!("{song}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Clustering a Table Directly
//!
//! ```no_run
//! use cadence::clustering::KMeans;
//! use cadence::features::FeatureTransformer;
//! use cadence::table::TrackTable;
//!
//! let table = TrackTable::read_csv(std::path::Path::new("tracks.csv"))?;
//! let matrix = FeatureTransformer::default().transform(&table)?;
//! let k = KMeans::default().find_optimal_k(&matrix, 7.min(matrix.n_rows()))?;
//! let labels = KMeans::default().cluster(&matrix, k)?;
//! println!("{} tracks in {k} groups", labels.len());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible functions return `anyhow::Result`. Common failures:
//!
//! - Missing feature columns or non-numeric cells in a track table
//! - A cluster count outside `1..=rows`
//! - An input song whose group is smaller than the requested count
//! - Catalog or language-model HTTP errors

pub mod catalog;
pub mod cli;
pub mod clustering;
pub mod completion;
pub mod config;
pub mod enrich;
pub mod features;
pub mod recommend;
pub mod recommender;
pub mod table;
pub mod track;
