//! # Cadence
//!
//! Recommends songs similar to a given one by clustering tracks on their
//! audio features and sampling from the input song's group.
//!
//! ## Usage
//!
//! ```bash
//! # Fill the track cache from a song's genres
//! cadence fetch "One More Time"
//!
//! # Recommend from the cache, with commentary
//! cadence recommend "One More Time"
//!
//! # Inspect clustering of a table
//! cadence optimal-k --data tracks.csv
//! cadence cluster --data tracks.csv --clusters 4
//! ```

use anyhow::{anyhow, Context, Result};
use cadence::catalog::{CatalogConfig, SpotifyClient};
use cadence::cli::{self, CatalogArgs, ClusterArgs, EnrichArgs};
use cadence::clustering::{optimal_k_from_curve, KMeans};
use cadence::completion;
use cadence::config::RuntimeConfig;
use cadence::enrich::{EnrichConfig, OpenAiClient};
use cadence::features::FeatureTransformer;
use cadence::recommender::{cluster_table, RecommendRequest, Recommender, TrackSource};
use cadence::table::TrackTable;
use clap::{CommandFactory, Parser};
use log::info;
use std::path::PathBuf;

fn connect_catalog(args: &CatalogArgs) -> Result<SpotifyClient> {
    SpotifyClient::connect(&CatalogConfig::new(&args.client_id, &args.client_secret))
        .context("Failed to connect to the Spotify Web API. Check SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET.")
}

fn connect_enricher(args: EnrichArgs) -> Result<Option<OpenAiClient>> {
    if args.no_enrich {
        return Ok(None);
    }
    let api_key = args
        .openai_key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| anyhow!("Set OPENAI_APIKEY or pass --no-enrich"))?;

    let mut config = EnrichConfig::new(api_key);
    config.model = args.model;
    Ok(Some(OpenAiClient::new(config)?))
}

/// Reads `data` if given, otherwise the track cache.
fn load_table(data: Option<PathBuf>, config: &RuntimeConfig) -> Result<TrackTable> {
    let path = data.unwrap_or_else(|| config.cache_path.clone());
    info!("Reading tracks from {}", path.display());
    TrackTable::read_csv(&path)
}

/// Main entry point for Cadence.
///
/// Logging is controlled via `RUST_LOG`, e.g. `RUST_LOG=cadence=debug`.
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Recommend {
            song,
            fetch,
            num_songs,
            cluster,
            catalog,
            enrich,
        } => {
            let config = RuntimeConfig::new()?;
            let spotify = connect_catalog(&catalog)?;
            let enricher = connect_enricher(enrich)?;

            let mut request = RecommendRequest::new(song, &config);
            request.num_songs = num_songs;
            request.max_clusters = usize::from(cluster.max_clusters);
            request.clusters = cluster.clusters.map(usize::from);
            request.source = match (fetch, cluster.data) {
                (true, _) => TrackSource::Fetch,
                (false, Some(path)) => TrackSource::File(path),
                (false, None) => TrackSource::Cache,
            };

            let mut recommender = Recommender::new(&spotify, config);
            if let Some(enricher) = &enricher {
                recommender = recommender.with_enricher(enricher);
            }

            info!("Recommending {} songs similar to: {}", request.num_songs, request.song);
            let recommendation = recommender.recommend(&request)?;
            info!("Used {} clusters", recommendation.k);

            println!(
                "{}",
                serde_json::to_string_pretty(&recommendation.payload)
                    .context("Failed to render recommendations")?
            );
            if let Some(commentary) = recommendation.commentary {
                println!();
                println!("{commentary}");
            }
        }
        cli::Command::Fetch {
            song,
            per_genre,
            catalog,
        } => {
            let mut config = RuntimeConfig::new()?;
            config.per_genre_cap = per_genre;
            let spotify = connect_catalog(&catalog)?;

            info!("Fetching tracks related to: {song}");
            let table = Recommender::new(&spotify, config.clone()).refresh_cache(&song)?;
            println!(
                "Cached {} tracks at {}",
                table.len(),
                config.cache_path.display()
            );
        }
        cli::Command::Cluster {
            cluster: ClusterArgs {
                data,
                max_clusters,
                clusters,
            },
        } => {
            let config = RuntimeConfig::new()?;
            let table = load_table(data, &config)?;

            let (labeled, k) = cluster_table(
                table,
                clusters.map(usize::from),
                usize::from(max_clusters),
                &KMeans::default(),
                &FeatureTransformer::default(),
            )?;
            info!("Clustered {} tracks into {k} groups", labeled.table.len());

            for (row, label) in labeled.labels.iter().enumerate() {
                println!("{label}\t{}", labeled.table.display_name(row));
            }
        }
        cli::Command::OptimalK { data, max_clusters } => {
            let config = RuntimeConfig::new()?;
            let table = load_table(data, &config)?;
            let matrix = FeatureTransformer::default().transform(&table)?;

            let max_k = usize::from(max_clusters).min(matrix.n_rows());
            let curve = KMeans::default().distortion_curve(&matrix, max_k)?;

            for (i, distortion) in curve.iter().enumerate() {
                println!("k={}\t{distortion:.4}", i + 1);
            }
            println!("optimal k: {}", optimal_k_from_curve(&curve));
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
        cli::Command::CompleteSongs => {
            completion::print_song_completions()?;
        }
    }

    Ok(())
}
