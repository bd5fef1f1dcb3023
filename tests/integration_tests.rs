//! # Integration Tests for Cadence
//!
//! End-to-end tests from a user perspective: CSV tables on disk, the full
//! recommendation pipeline against an in-memory catalog, and the CLI.

use anyhow::Result;
use cadence::catalog::{ArtistRef, Catalog, FeatureSet, TrackSummary};
use cadence::enrich::Enricher;
use cadence::recommend::RecommendationPayload;
use std::cell::RefCell;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Track `i` of the two-group fixture: rows 0-5 sit at `0 + jitter` in
/// every feature, rows 6-11 at `10 + jitter`.
fn fixture_track(i: usize, jitter: f64) -> (TrackSummary, FeatureSet) {
    let base = if i < 6 { 0.0 } else { 10.0 };
    let value = base + jitter * (i % 6) as f64;
    let id = format!("track{i}");

    let summary = TrackSummary {
        id: id.clone(),
        name: format!("Song {i}"),
        artists: vec![ArtistRef {
            id: Some(format!("artist{}", i / 6)),
            name: format!("Artist {}", i / 6),
        }],
        popularity: value,
        duration_ms: value,
    };
    let features = FeatureSet {
        id,
        valence: value,
        acousticness: value,
        danceability: value,
        duration_ms: Some(value),
        energy: value,
        instrumentalness: value,
        key: value,
        liveness: value,
        loudness: value,
        speechiness: value,
        tempo: value,
    };
    (summary, features)
}

/// Catalog serving a fixed list of tracks under one genre.
struct FixtureCatalog {
    tracks: Vec<(TrackSummary, FeatureSet)>,
    genres: Vec<String>,
}

impl FixtureCatalog {
    fn new(jitter: f64) -> Self {
        Self {
            tracks: (0..12).map(|i| fixture_track(i, jitter)).collect(),
            genres: vec!["french house".to_string()],
        }
    }
}

impl Catalog for FixtureCatalog {
    fn search_track(&self, query: &str) -> Result<Option<TrackSummary>> {
        Ok(self
            .tracks
            .iter()
            .find(|(summary, _)| summary.name == query)
            .map(|(summary, _)| summary.clone()))
    }

    fn artist_genres(&self, _artist_id: &str) -> Result<Vec<String>> {
        Ok(self.genres.clone())
    }

    fn search_genre_page(
        &self,
        _genre: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TrackSummary>> {
        Ok(self
            .tracks
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<FeatureSet>>> {
        Ok(ids
            .iter()
            .map(|id| {
                self.tracks
                    .iter()
                    .find(|(_, features)| &features.id == id)
                    .map(|(_, features)| features.clone())
            })
            .collect())
    }
}

/// Enricher that remembers what it was asked about.
#[derive(Default)]
struct RecordingEnricher {
    seen: RefCell<Vec<RecommendationPayload>>,
}

impl Enricher for RecordingEnricher {
    fn enrich(&self, payload: &RecommendationPayload) -> Result<String> {
        self.seen.borrow_mut().push(payload.clone());
        Ok(format!("{} picks for {}", payload.recommendations.len(), payload.input_song))
    }
}

/// Writes the fixture tracks (optionally skipping one row) as a CSV table.
fn write_fixture_csv(path: &Path, jitter: f64, skip: Option<usize>) -> Result<()> {
    use cadence::table::TrackTable;

    let tracks: Vec<_> = (0..12)
        .filter(|i| Some(*i) != skip)
        .map(|i| {
            let (summary, features) = fixture_track(i, jitter);
            summary.with_features(&features)
        })
        .collect();
    TrackTable::from_tracks(&tracks).write_csv(path)
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = Command::new("cargo")
            .args(["run", "--", "--help"])
            .output()
            .expect("Failed to run help command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("cadence"));
        assert!(stdout.contains("recommend"));
        assert!(stdout.contains("fetch"));
        assert!(stdout.contains("cluster"));
        assert!(stdout.contains("optimal-k"));
        assert!(!stdout.contains("complete-songs"));
    }

    #[test]
    fn test_cli_version_flag() {
        let output = Command::new("cargo")
            .args(["run", "--", "--version"])
            .output()
            .expect("Failed to run version command");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("cadence"));
        assert!(stdout.contains("0.3.0"));
    }

    #[test]
    fn test_completion_generation() {
        let output = Command::new("cargo")
            .args(["run", "--", "completion", "bash"])
            .output()
            .expect("Failed to run completion command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_cadence"));
        assert!(stdout.contains("complete"));
    }

    #[test]
    fn test_cluster_command_prints_every_track() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("tracks.csv");
        write_fixture_csv(&csv_path, 0.01, None)?;

        let output = Command::new("cargo")
            .args(["run", "--", "cluster", "--clusters", "2", "--data"])
            .arg(&csv_path)
            .output()
            .expect("Failed to run cluster command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 12);
        assert!(lines[0].ends_with("\tArtist 0 - Song 0"));

        let label = |line: &str| line.split('\t').next().map(str::to_string);
        assert!(lines[..6].iter().all(|&l| label(l) == label(lines[0])));
        assert!(lines[6..].iter().all(|&l| label(l) == label(lines[6])));
        assert_ne!(label(lines[0]), label(lines[6]));
        Ok(())
    }

    #[test]
    fn test_optimal_k_command() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("tracks.csv");
        write_fixture_csv(&csv_path, 0.0, None)?;

        let output = Command::new("cargo")
            .args(["run", "--", "optimal-k", "--max-clusters", "5", "--data"])
            .arg(&csv_path)
            .output()
            .expect("Failed to run optimal-k command");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.lines().filter(|l| l.starts_with("k=")).count(), 5);
        assert!(stdout.contains("optimal k: 2"));
        Ok(())
    }
}

#[cfg(test)]
mod table_integration_tests {
    use super::*;
    use cadence::features::FeatureTransformer;
    use cadence::table::TrackTable;
    use cadence::track::FEATURE_COLUMNS;

    #[test]
    fn test_csv_written_and_read_back() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("nested").join("tracks.csv");
        write_fixture_csv(&csv_path, 0.01, None)?;

        let table = TrackTable::read_csv(&csv_path)?;
        assert_eq!(table.len(), 12);
        assert_eq!(table.display_name(7), "Artist 1 - Song 7");
        assert_eq!(table.row_of_id("track3"), Some(3));
        for column in FEATURE_COLUMNS {
            assert!(table.column_index(column).is_some(), "Missing {column}");
        }

        let tempo = table.numeric_column("tempo")?;
        assert!((tempo[7] - 10.01).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_table_with_extra_columns_still_transforms() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("tracks.csv");
        write_fixture_csv(&csv_path, 0.01, None)?;

        let mut table = TrackTable::read_csv(&csv_path)?;
        let mut headers = table.headers().to_vec();
        headers.push("mode".to_string());
        let rows = (0..table.len())
            .map(|row| {
                let mut cells: Vec<String> = table
                    .headers()
                    .iter()
                    .map(|h| table.text(row, h).unwrap_or_default().to_string())
                    .collect();
                cells.push("1".to_string());
                cells
            })
            .collect();
        table = TrackTable::new(headers, rows)?;

        let matrix = FeatureTransformer::default().transform(&table)?;
        assert_eq!(matrix.n_rows(), 12);
        assert_eq!(matrix.n_cols(), FEATURE_COLUMNS.len());
        Ok(())
    }
}

#[cfg(test)]
mod pipeline_integration_tests {
    use super::*;
    use cadence::clustering::KMeans;
    use cadence::config::RuntimeConfig;
    use cadence::features::FeatureTransformer;
    use cadence::recommender::{cluster_table, RecommendRequest, Recommender, TrackSource};
    use cadence::table::TrackTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config_in(temp_dir: &TempDir) -> RuntimeConfig {
        RuntimeConfig::with_cache_path(temp_dir.path().join("cache").join("tracks.csv"))
    }

    fn song_number(display: &str) -> usize {
        display
            .rsplit(' ')
            .next()
            .and_then(|n| n.parse().ok())
            .expect("Display name ends with a song number")
    }

    #[test]
    fn test_two_groups_are_recovered() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("tracks.csv");
        write_fixture_csv(&csv_path, 0.01, None)?;

        let (labeled, k) = cluster_table(
            TrackTable::read_csv(&csv_path)?,
            Some(2),
            7,
            &KMeans::default(),
            &FeatureTransformer::default(),
        )?;

        assert_eq!(k, 2);
        assert!(labeled.labels[..6].iter().all(|&l| l == labeled.labels[0]));
        assert!(labeled.labels[6..].iter().all(|&l| l == labeled.labels[6]));
        assert_ne!(labeled.labels[0], labeled.labels[6]);
        Ok(())
    }

    #[test]
    fn test_recommend_with_live_fetch() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = config_in(&temp_dir);
        let catalog = FixtureCatalog::new(0.01);
        let enricher = RecordingEnricher::default();

        let mut request = RecommendRequest::new("Song 1", &config);
        request.source = TrackSource::Fetch;
        request.clusters = Some(2);
        request.num_songs = 3;

        let recommender = Recommender::new(&catalog, config.clone()).with_enricher(&enricher);
        let mut rng = StdRng::seed_from_u64(7);
        let recommendation = recommender.recommend_with_rng(&request, &mut rng)?;

        assert!(config.cache_path.exists(), "Fetch writes the cache");
        assert_eq!(TrackTable::read_csv(&config.cache_path)?.len(), 12);

        assert_eq!(recommendation.k, 2);
        assert_eq!(recommendation.payload.input_song, "Artist 0 - Song 1");
        assert_eq!(recommendation.payload.recommendations.len(), 3);
        for name in &recommendation.payload.recommendations {
            let n = song_number(name);
            assert!(n < 6, "{name} is outside the input song's group");
            assert_ne!(n, 1, "Input song must not be recommended");
        }

        assert_eq!(
            recommendation.commentary.as_deref(),
            Some("3 picks for Artist 0 - Song 1")
        );
        assert_eq!(enricher.seen.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn test_track_shared_by_two_genres_is_not_recommended_to_itself() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = config_in(&temp_dir);
        let mut catalog = FixtureCatalog::new(0.01);
        catalog.genres = vec!["house".to_string(), "french house".to_string()];

        let mut request = RecommendRequest::new("Song 1", &config);
        request.source = TrackSource::Fetch;
        request.clusters = Some(2);
        request.num_songs = 5;

        let recommender = Recommender::new(&catalog, config.clone());
        for seed in 0..50 {
            let recommendation =
                recommender.recommend_with_rng(&request, &mut StdRng::seed_from_u64(seed))?;

            let mut picked: Vec<usize> = recommendation
                .payload
                .recommendations
                .iter()
                .map(|name| song_number(name))
                .collect();
            picked.sort_unstable();
            assert_eq!(picked, vec![0, 2, 3, 4, 5], "seed {seed}");
        }

        assert_eq!(TrackTable::read_csv(&config.cache_path)?.len(), 12);
        Ok(())
    }

    #[test]
    fn test_recommend_from_cache_scans_k() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = config_in(&temp_dir);
        write_fixture_csv(&config.cache_path, 0.0, None)?;
        let catalog = FixtureCatalog::new(0.0);

        let mut request = RecommendRequest::new("Song 8", &config);
        request.num_songs = 5;

        let recommendation = Recommender::new(&catalog, config)
            .recommend_with_rng(&request, &mut StdRng::seed_from_u64(1))?;

        // Two distinct points: every k >= 2 has zero distortion, the earliest wins.
        assert_eq!(recommendation.k, 2);
        assert!(recommendation.commentary.is_none());

        let mut picked: Vec<usize> = recommendation
            .payload
            .recommendations
            .iter()
            .map(|name| song_number(name))
            .collect();
        picked.sort_unstable();
        assert_eq!(picked, vec![6, 7, 9, 10, 11]);
        Ok(())
    }

    #[test]
    fn test_input_missing_from_table_is_added() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let csv_path = temp_dir.path().join("without_input.csv");
        write_fixture_csv(&csv_path, 0.01, Some(4))?;
        let config = config_in(&temp_dir);
        let catalog = FixtureCatalog::new(0.01);

        let mut request = RecommendRequest::new("Song 4", &config);
        request.source = TrackSource::File(csv_path);
        request.clusters = Some(2);
        request.num_songs = 5;

        let recommendation = Recommender::new(&catalog, config)
            .recommend_with_rng(&request, &mut StdRng::seed_from_u64(3))?;

        let mut picked: Vec<usize> = recommendation
            .payload
            .recommendations
            .iter()
            .map(|name| song_number(name))
            .collect();
        picked.sort_unstable();
        assert_eq!(picked, vec![0, 1, 2, 3, 5]);
        Ok(())
    }

    #[test]
    fn test_missing_cache_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let catalog = FixtureCatalog::new(0.01);
        let request = RecommendRequest::new("Song 1", &config);

        let err = Recommender::new(&catalog, config)
            .recommend(&request)
            .unwrap_err();
        assert!(format!("{err:#}").contains("--fetch"));
    }

    #[test]
    fn test_group_too_small_for_request() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = config_in(&temp_dir);
        write_fixture_csv(&config.cache_path, 0.01, None)?;
        let catalog = FixtureCatalog::new(0.01);

        let mut request = RecommendRequest::new("Song 2", &config);
        request.clusters = Some(2);
        request.num_songs = 6;

        let err = Recommender::new(&catalog, config)
            .recommend(&request)
            .unwrap_err();
        assert!(err.to_string().contains("only 5 other"));
        Ok(())
    }

    #[test]
    fn test_unknown_song_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let catalog = FixtureCatalog::new(0.01);
        let request = RecommendRequest::new("Nowhere Song", &config);

        let err = Recommender::new(&catalog, config)
            .recommend(&request)
            .unwrap_err();
        assert!(err.to_string().contains("Nowhere Song"));
    }

    #[test]
    fn test_no_genres_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let mut catalog = FixtureCatalog::new(0.01);
        catalog.genres.clear();

        let err = Recommender::new(&catalog, config.clone())
            .refresh_cache("Song 1")
            .unwrap_err();
        assert!(err.to_string().contains("no genres"));
        assert!(!config.cache_path.exists());
    }
}
