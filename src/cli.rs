//! # Command-Line Interface Module
//!
//! Command-line definitions for Cadence using Clap derive macros.
//!
//! ## Commands
//!
//! - `recommend`: Recommend songs similar to a given song
//! - `fetch`: Refresh the track cache from a song's genres
//! - `cluster`: Print the group of every track in a table
//! - `optimal-k`: Print the distortion curve and the chosen cluster count
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! cadence fetch "One More Time"
//! cadence recommend "One More Time" --num-songs 3
//! cadence cluster --data tracks.csv --clusters 4
//! ```
//!
//! Catalog credentials are read from `SPOTIFY_CLIENT_ID` and
//! `SPOTIFY_CLIENT_SECRET`, the language-model key from `OPENAI_APIKEY`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence: song recommendations from audio-feature clustering")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Music catalog credentials.
#[derive(clap::Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Spotify application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub client_id: String,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}

/// Language-model settings.
#[derive(clap::Args, Debug, Clone)]
pub struct EnrichArgs {
    /// OpenAI API key, required unless --no-enrich is given
    #[arg(long, env = "OPENAI_APIKEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    /// Chat model used for commentary
    #[arg(long, env = "OPENAI_MODEL", default_value = crate::enrich::DEFAULT_MODEL)]
    pub model: String,

    /// Skip the language-model commentary
    #[arg(long)]
    pub no_enrich: bool,
}

/// Where the track table comes from and how it is clustered.
#[derive(clap::Args, Debug, Clone)]
pub struct ClusterArgs {
    /// CSV track table to use instead of the cache
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    /// Upper bound of the cluster-count scan
    #[arg(long, default_value = "7", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_clusters: u16,

    /// Use exactly this many clusters instead of scanning
    #[arg(long, conflicts_with = "max_clusters", value_parser = clap::value_parser!(u16).range(1..))]
    pub clusters: Option<u16>,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Recommend songs similar to a given song
    ///
    /// Resolves the song in the catalog, clusters the candidate tracks by
    /// audio features and samples from the song's group. Candidates come
    /// from the cache unless --fetch or --data is given.
    Recommend {
        /// Song title to search for
        #[arg(value_hint = clap::ValueHint::Other)]
        song: String,

        /// Fetch fresh candidates from the song's genres first
        #[arg(long, conflicts_with = "data")]
        fetch: bool,

        /// Number of songs to recommend
        #[arg(short, long, default_value = "5")]
        num_songs: usize,

        #[command(flatten)]
        cluster: ClusterArgs,

        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        enrich: EnrichArgs,
    },

    /// Fetch tracks from a song's genres into the cache
    ///
    /// Looks up the genres of the song's primary artist and collects up to
    /// --per-genre tracks from each.
    Fetch {
        /// Song title to search for
        #[arg(value_hint = clap::ValueHint::Other)]
        song: String,

        /// Tracks to collect per genre
        #[arg(long, default_value = "900")]
        per_genre: usize,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Print the group of every track in a table
    Cluster {
        #[command(flatten)]
        cluster: ClusterArgs,
    },

    /// Print the distortion for each cluster count and the chosen one
    OptimalK {
        /// CSV track table to use instead of the cache
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        data: Option<PathBuf>,

        /// Upper bound of the cluster-count scan
        #[arg(long, default_value = "7", value_parser = clap::value_parser!(u16).range(1..))]
        max_clusters: u16,
    },

    /// Generate shell completions
    ///
    /// Usage: cadence completion bash > ~/.local/share/bash-completion/completions/cadence
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List cached song names for completion (hidden command)
    #[command(hide = true)]
    CompleteSongs,
}
