//! # Catalog Module
//!
//! Track search, artist genres and audio features from the Spotify Web API.
//!
//! Authentication uses the client-credentials flow. Credentials come in
//! through [`CatalogConfig`]; the client keeps no global state and calls
//! are plain blocking round-trips with no retries.
//!
//! The [`Catalog`] trait is the seam the recommender depends on, so the
//! pipeline can run against an in-memory catalog in tests.

use crate::track::{AudioFeatures, Track};
use anyhow::{bail, Context, Result};
use base64::Engine;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Largest page the search endpoint serves.
pub const MAX_PAGE_SIZE: usize = 50;
/// Largest id batch the audio-features endpoint accepts.
const FEATURE_BATCH: usize = 100;

/// Credentials and endpoints for [`SpotifyClient`].
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub token_url: String,
    pub timeout: Duration,
}

impl CatalogConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_base: SPOTIFY_API_BASE.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Artist credit on a track.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: String,
}

/// Track metadata as returned by search, before audio features are attached.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub duration_ms: f64,
}

impl TrackSummary {
    /// Full track record from this summary and its audio features.
    #[must_use]
    pub fn with_features(&self, features: &FeatureSet) -> Track {
        Track {
            id: self.id.clone(),
            name: self.name.clone(),
            artists: self.artists.iter().map(|a| a.name.clone()).collect(),
            features: AudioFeatures {
                valence: features.valence,
                acousticness: features.acousticness,
                danceability: features.danceability,
                duration_ms: features.duration_ms.unwrap_or(self.duration_ms),
                energy: features.energy,
                instrumentalness: features.instrumentalness,
                key: features.key,
                liveness: features.liveness,
                loudness: features.loudness,
                popularity: self.popularity,
                speechiness: features.speechiness,
                tempo: features.tempo,
            },
        }
    }
}

/// One entry of the audio-features endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureSet {
    pub id: String,
    pub valence: f64,
    pub acousticness: f64,
    pub danceability: f64,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    pub energy: f64,
    pub instrumentalness: f64,
    pub key: f64,
    pub liveness: f64,
    pub loudness: f64,
    pub speechiness: f64,
    pub tempo: f64,
}

/// Read-only view of a music catalog.
pub trait Catalog {
    /// Best match for a track title, if any.
    fn search_track(&self, query: &str) -> Result<Option<TrackSummary>>;

    /// Genres attached to an artist.
    fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>>;

    /// One page of tracks tagged with `genre`.
    fn search_genre_page(&self, genre: &str, limit: usize, offset: usize)
        -> Result<Vec<TrackSummary>>;

    /// Audio features for each id, `None` where the catalog has none.
    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<FeatureSet>>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Option<TrackSummary>>,
}

#[derive(Deserialize)]
struct ArtistResponse {
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<FeatureSet>>,
}

/// Blocking Spotify Web API client.
pub struct SpotifyClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl SpotifyClient {
    /// Builds the HTTP client and exchanges credentials for an access token.
    ///
    /// # Errors
    ///
    /// Fails if credentials are empty or the token request is rejected.
    pub fn connect(config: &CatalogConfig) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            bail!("Spotify client id and secret are required (SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET)");
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", config.client_id, config.client_secret));
        let response = client
            .post(&config.token_url)
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .context("Spotify token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("Spotify token request failed with status {status}: {body}");
        }
        let token: TokenResponse = response.json().context("Malformed Spotify token response")?;
        info!("Authenticated with Spotify");

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: token.access_token,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{path_and_query}", self.api_base);
        debug!("GET {url}");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .with_context(|| format!("Spotify request failed: {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("Spotify API error {status} for {url}: {body}");
        }
        response
            .json()
            .with_context(|| format!("Malformed Spotify response from {url}"))
    }

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<TrackSummary>> {
        let response: SearchResponse = self.get_json(&format!(
            "/search?q={}&type=track&limit={limit}&offset={offset}",
            urlencoding::encode(query)
        ))?;
        Ok(response.tracks.items.into_iter().flatten().collect())
    }
}

impl Catalog for SpotifyClient {
    fn search_track(&self, query: &str) -> Result<Option<TrackSummary>> {
        Ok(self
            .search(&format!("track:{query}"), 1, 0)?
            .into_iter()
            .next())
    }

    fn artist_genres(&self, artist_id: &str) -> Result<Vec<String>> {
        let artist: ArtistResponse =
            self.get_json(&format!("/artists/{}", urlencoding::encode(artist_id)))?;
        Ok(artist.genres)
    }

    fn search_genre_page(
        &self,
        genre: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TrackSummary>> {
        self.search(&format!("genre:\"{genre}\""), limit.min(MAX_PAGE_SIZE), offset)
    }

    fn audio_features(&self, ids: &[String]) -> Result<Vec<Option<FeatureSet>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: AudioFeaturesResponse = self.get_json(&format!(
            "/audio-features?ids={}",
            urlencoding::encode(&ids.join(","))
        ))?;
        Ok(response.audio_features)
    }
}

/// Looks a song up by title and returns it with its audio features.
///
/// # Errors
///
/// Fails if nothing matches or the catalog has no features for the match.
pub fn resolve_track(catalog: &dyn Catalog, name: &str) -> Result<(Track, TrackSummary)> {
    let summary = catalog
        .search_track(name)?
        .with_context(|| format!("No track found in catalog for '{name}'"))?;

    let track = attach_features(catalog, vec![summary.clone()])?
        .into_iter()
        .next()
        .with_context(|| format!("Catalog has no audio features for '{}'", summary.name))?;

    info!("Resolved '{name}' to {} ({})", track.display_name(), track.id);
    Ok((track, summary))
}

/// Genres of a track's primary artist.
pub fn genres_for(catalog: &dyn Catalog, summary: &TrackSummary) -> Result<Vec<String>> {
    let Some(artist_id) = summary.artists.first().and_then(|a| a.id.as_deref()) else {
        warn!("Track '{}' has no artist id, no genres to search", summary.name);
        return Ok(Vec::new());
    };
    catalog.artist_genres(artist_id)
}

/// Pages through tracks tagged with `genre` until `cap` tracks are
/// collected or the catalog returns a short page.
pub fn tracks_by_genre(
    catalog: &dyn Catalog,
    genre: &str,
    page_size: usize,
    cap: usize,
) -> Result<Vec<Track>> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let mut tracks = Vec::new();
    let mut offset = 0;

    while tracks.len() < cap {
        let page = catalog
            .search_genre_page(genre, page_size, offset)
            .with_context(|| format!("Failed to search genre '{genre}' at offset {offset}"))?;
        let short_page = page.len() < page_size;

        tracks.extend(attach_features(catalog, page)?);
        if short_page {
            break;
        }
        offset += page_size;
    }

    tracks.truncate(cap);
    debug!("Fetched {} tracks for genre '{genre}'", tracks.len());
    Ok(tracks)
}

/// [`tracks_by_genre`] for each genre, concatenated in order. A track
/// listed under several genres is kept once, at its first position.
pub fn tracks_by_genres(
    catalog: &dyn Catalog,
    genres: &[String],
    page_size: usize,
    cap: usize,
) -> Result<Vec<Track>> {
    let mut seen = HashSet::new();
    let mut tracks = Vec::new();
    for genre in genres {
        for track in tracks_by_genre(catalog, genre, page_size, cap)? {
            if seen.insert(track.id.clone()) {
                tracks.push(track);
            }
        }
    }
    info!("Fetched {} tracks across {} genres", tracks.len(), genres.len());
    Ok(tracks)
}

/// Fetches audio features for `summaries` in batches and pairs them up.
/// Tracks without features are dropped.
fn attach_features(catalog: &dyn Catalog, summaries: Vec<TrackSummary>) -> Result<Vec<Track>> {
    let mut tracks = Vec::with_capacity(summaries.len());

    for batch in summaries.chunks(FEATURE_BATCH) {
        let ids: Vec<String> = batch.iter().map(|s| s.id.clone()).collect();
        let features = catalog
            .audio_features(&ids)
            .context("Failed to fetch audio features")?;

        for (summary, feature_set) in batch.iter().zip(features) {
            match feature_set {
                Some(feature_set) => tracks.push(summary.with_features(&feature_set)),
                None => warn!("No audio features for '{}' ({})", summary.name, summary.id),
            }
        }
    }

    Ok(tracks)
}
