//! # Recommendation Pipeline
//!
//! Runs one recommendation request end to end:
//!
//! 1. resolve the input song in the catalog
//! 2. obtain candidate tracks (live genre fetch, a CSV file, or the cache)
//! 3. scale features and cluster, choosing `k` by scan unless given
//! 4. sample tracks from the input song's group
//! 5. optionally ask the language model for commentary
//!
//! Every request recomputes everything; nothing carries over between runs.

use crate::catalog::{self, Catalog};
use crate::clustering::KMeans;
use crate::config::RuntimeConfig;
use crate::enrich::Enricher;
use crate::features::FeatureTransformer;
use crate::recommend::{select_similar, RecommendationPayload};
use crate::table::{LabeledTable, TrackTable};
use crate::track::Track;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use rand::Rng;
use std::path::PathBuf;

/// Where candidate tracks come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Search the input song's genres and refresh the cache.
    Fetch,
    /// Read a CSV table from this path.
    File(PathBuf),
    /// Read the cache left by the last fetch.
    Cache,
}

/// Parameters of one recommendation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendRequest {
    pub song: String,
    pub source: TrackSource,
    pub num_songs: usize,
    pub max_clusters: usize,
    /// Fixed cluster count; scans `1..=max_clusters` when `None`.
    pub clusters: Option<usize>,
}

impl RecommendRequest {
    /// Request for `song` with counts taken from `config`, reading the cache.
    #[must_use]
    pub fn new(song: impl Into<String>, config: &RuntimeConfig) -> Self {
        Self {
            song: song.into(),
            source: TrackSource::Cache,
            num_songs: config.num_songs,
            max_clusters: config.max_clusters,
            clusters: None,
        }
    }
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub input: Track,
    pub payload: RecommendationPayload,
    /// Language-model reply, when an enricher was configured.
    pub commentary: Option<String>,
    /// Cluster count used.
    pub k: usize,
}

/// Clusters a table with a fixed or scanned `k`.
///
/// Returns the labeled table and the `k` used. The scan is capped at the
/// row count.
pub fn cluster_table(
    table: TrackTable,
    clusters: Option<usize>,
    max_clusters: usize,
    engine: &KMeans,
    transformer: &FeatureTransformer,
) -> Result<(LabeledTable, usize)> {
    let matrix = transformer.transform(&table)?;

    let k = match clusters {
        Some(k) => k,
        None => {
            let max_k = max_clusters.min(matrix.n_rows());
            let k = engine
                .find_optimal_k(&matrix, max_k)
                .context("Failed to choose a cluster count")?;
            info!("Chose {k} clusters from a scan up to {max_k}");
            k
        }
    };

    let labels = engine
        .cluster(&matrix, k)
        .with_context(|| format!("Failed to cluster {} tracks into {k} groups", table.len()))?;
    Ok((LabeledTable::new(table, labels)?, k))
}

/// Ties a catalog, an optional enricher and the clustering stages together.
pub struct Recommender<'a> {
    catalog: &'a dyn Catalog,
    enricher: Option<&'a dyn Enricher>,
    config: RuntimeConfig,
    engine: KMeans,
    transformer: FeatureTransformer,
}

impl<'a> Recommender<'a> {
    #[must_use]
    pub fn new(catalog: &'a dyn Catalog, config: RuntimeConfig) -> Self {
        Self {
            catalog,
            enricher: None,
            config,
            engine: KMeans::default(),
            transformer: FeatureTransformer::default(),
        }
    }

    /// Adds language-model commentary to every recommendation.
    #[must_use]
    pub fn with_enricher(mut self, enricher: &'a dyn Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Runs a request with the thread-local random generator.
    pub fn recommend(&self, request: &RecommendRequest) -> Result<Recommendation> {
        self.recommend_with_rng(request, &mut rand::thread_rng())
    }

    /// Runs a request, sampling with `rng`.
    ///
    /// # Errors
    ///
    /// Fails if the song cannot be resolved, no candidate tracks are
    /// available, clustering fails, the input's group is too small, or the
    /// enricher fails.
    pub fn recommend_with_rng<R: Rng + ?Sized>(
        &self,
        request: &RecommendRequest,
        rng: &mut R,
    ) -> Result<Recommendation> {
        validate_input(&request.song)?;

        let (input, summary) = catalog::resolve_track(self.catalog, &request.song)?;

        let mut table = match &request.source {
            TrackSource::Fetch => self.fetch_tracks(&summary)?,
            TrackSource::File(path) => TrackTable::read_csv(path)?,
            TrackSource::Cache => TrackTable::read_csv(&self.config.cache_path).with_context(|| {
                format!(
                    "No usable track cache at {}. Run with --fetch first or pass --data.",
                    self.config.cache_path.display()
                )
            })?,
        };

        if table.row_of_id(&input.id).is_none() {
            warn!("'{}' is not among the candidate tracks, adding it", input.display_name());
            table.push_track(&input);
        }

        let (labeled, k) = cluster_table(
            table,
            request.clusters,
            request.max_clusters,
            &self.engine,
            &self.transformer,
        )?;

        let picks = select_similar(&labeled, &input.id, request.num_songs, rng)?;
        let input_name = format!("{} - {}", input.primary_artist(), input.name);
        let payload = RecommendationPayload::from_rows(input_name, &labeled, &picks);

        let commentary = match self.enricher {
            Some(enricher) => Some(
                enricher
                    .enrich(&payload)
                    .context("Failed to get recommendation commentary")?,
            ),
            None => None,
        };

        Ok(Recommendation {
            input,
            payload,
            commentary,
            k,
        })
    }

    /// Fetches tracks from the genres of the song's primary artist and
    /// writes them to the cache.
    pub fn fetch_tracks(&self, summary: &catalog::TrackSummary) -> Result<TrackTable> {
        let genres = catalog::genres_for(self.catalog, summary)?;
        if genres.is_empty() {
            bail!(
                "The catalog lists no genres for the artist of '{}'. Pass --data with a track table instead.",
                summary.name
            );
        }
        info!("Fetching tracks for genres: {}", genres.join(", "));

        let tracks = catalog::tracks_by_genres(
            self.catalog,
            &genres,
            self.config.page_size,
            self.config.per_genre_cap,
        )?;
        let table = TrackTable::from_tracks(&tracks);
        table.write_csv(&self.config.cache_path)?;
        info!(
            "Cached {} tracks at {}",
            table.len(),
            self.config.cache_path.display()
        );
        Ok(table)
    }

    /// Resolves a song by name and refreshes the cache from its genres.
    pub fn refresh_cache(&self, song: &str) -> Result<TrackTable> {
        validate_input(song)?;
        let (_, summary) = catalog::resolve_track(self.catalog, song)?;
        self.fetch_tracks(&summary)
    }
}

fn validate_input(song: &str) -> Result<()> {
    if song.trim().is_empty() {
        bail!("Song name cannot be empty");
    }
    Ok(())
}
