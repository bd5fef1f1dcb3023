//! Track records and the audio attributes clustering works on.

use serde::{Deserialize, Serialize};

/// Attribute columns used for clustering, in the order they appear in a
/// feature matrix.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "valence",
    "acousticness",
    "danceability",
    "duration_ms",
    "energy",
    "instrumentalness",
    "key",
    "liveness",
    "loudness",
    "popularity",
    "speechiness",
    "tempo",
];

/// Numeric audio attributes of one track, as reported by the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub valence: f64,
    pub acousticness: f64,
    pub danceability: f64,
    pub duration_ms: f64,
    pub energy: f64,
    pub instrumentalness: f64,
    /// Pitch class, `-1` when the catalog could not detect one.
    pub key: f64,
    pub liveness: f64,
    pub loudness: f64,
    /// Catalog popularity, 0 to 100.
    pub popularity: f64,
    pub speechiness: f64,
    pub tempo: f64,
}

impl AudioFeatures {
    /// Attribute values in [`FEATURE_COLUMNS`] order.
    #[must_use]
    pub const fn values(&self) -> [f64; 12] {
        [
            self.valence,
            self.acousticness,
            self.danceability,
            self.duration_ms,
            self.energy,
            self.instrumentalness,
            self.key,
            self.liveness,
            self.loudness,
            self.popularity,
            self.speechiness,
            self.tempo,
        ]
    }

    /// Value of a single attribute by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|&name| name == column)
            .map(|idx| self.values()[idx])
    }

    /// Inverse of [`AudioFeatures::values`].
    #[must_use]
    pub const fn from_values(values: [f64; 12]) -> Self {
        Self {
            valence: values[0],
            acousticness: values[1],
            danceability: values[2],
            duration_ms: values[3],
            energy: values[4],
            instrumentalness: values[5],
            key: values[6],
            liveness: values[7],
            loudness: values[8],
            popularity: values[9],
            speechiness: values[10],
            tempo: values[11],
        }
    }
}

/// One song from the catalog: identifier, display metadata and audio
/// attributes. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog identifier.
    pub id: String,
    pub name: String,
    /// Credited artists, primary artist first.
    pub artists: Vec<String>,
    pub features: AudioFeatures,
}

impl Track {
    /// First credited artist, or an empty string for uncredited tracks.
    #[must_use]
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or("", String::as_str)
    }

    /// `"Artist A, Artist B - Title"`, the form handed to the language model.
    #[must_use]
    pub fn display_name(&self) -> String {
        display_name(&self.artists, &self.name)
    }
}

/// Joins artists and a title the way recommendations are presented.
#[must_use]
pub fn display_name(artists: &[String], name: &str) -> String {
    if artists.is_empty() {
        return name.to_string();
    }
    format!("{} - {}", artists.join(", "), name)
}
