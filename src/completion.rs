//! # Shell Completion Module
//!
//! Completion scripts for the supported shells, plus song names from the
//! track cache for completing `recommend` and `fetch` arguments.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! cadence completion bash > ~/.local/share/bash-completion/completions/cadence
//!
//! # Generate zsh completions
//! cadence completion zsh > ~/.config/zsh/completions/_cadence
//! ```

use crate::cli::Shell;
use crate::config;
use crate::table::TrackTable;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use log::debug;
use std::io;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: &Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Song titles in `table`, sorted and deduplicated. Titles are what the
/// catalog search matches on.
pub fn song_completions(table: &TrackTable) -> Vec<String> {
    let mut completions = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let title = table.text(row, "name").unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        completions.push(title.to_string());
    }

    completions.sort();
    completions.dedup();
    completions
}

/// Song names from the track cache. Empty when there is no usable cache.
pub fn get_song_completions() -> Result<Vec<String>> {
    let cache_path = match config::get_cache_path() {
        Ok(path) => path,
        Err(_) => return Ok(Vec::new()),
    };

    if !cache_path.exists() {
        return Ok(Vec::new());
    }

    match TrackTable::read_csv(&cache_path) {
        Ok(table) => Ok(song_completions(&table)),
        Err(e) => {
            debug!("Ignoring unreadable track cache: {e:#}");
            Ok(Vec::new())
        }
    }
}

/// Print song names, quoting those with whitespace
pub fn print_song_completions() -> Result<()> {
    for completion in get_song_completions()? {
        if completion.contains(char::is_whitespace) {
            println!("\"{}\"", completion.replace('"', "\\\""));
        } else {
            println!("{completion}");
        }
    }
    Ok(())
}
