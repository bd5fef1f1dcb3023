//! # Track Table Module
//!
//! In-memory table of tracks addressed by column name, and its flat-file
//! form: the comma-delimited cache written after every catalog fetch.
//!
//! ## File Format
//!
//! ```text
//! id,name,artists,valence,acousticness,...,tempo
//! 4uLU6hMCjMI75M1A2tKUQC,Never Gonna Give You Up,['Rick Astley'],0.91,...
//! ```
//!
//! Files exported from other tools may carry extra columns (an unnamed
//! index column is common); they are kept and ignored by clustering.

use crate::track::{display_name, Track, FEATURE_COLUMNS};
use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Header used when a table is built from fetched tracks.
#[must_use]
pub fn default_headers() -> Vec<String> {
    ["id", "name", "artists"]
        .into_iter()
        .chain(FEATURE_COLUMNS)
        .map(str::to_string)
        .collect()
}

/// Rectangular table of string cells with a named header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TrackTable {
    /// Builds a table, checking every row against the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            bail!(
                "Row {idx} has {} cells, header has {} columns",
                row.len(),
                headers.len()
            );
        }
        Ok(Self { headers, rows })
    }

    /// Table with the default header and one row per track.
    #[must_use]
    pub fn from_tracks(tracks: &[Track]) -> Self {
        let mut table = Self {
            headers: default_headers(),
            rows: Vec::with_capacity(tracks.len()),
        };
        for track in tracks {
            table.push_track(track);
        }
        table
    }

    /// Loads a table from a CSV file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open track table at {}", path.display()))?;
        let table = Self::from_reader(file)
            .with_context(|| format!("Failed to parse track table at {}", path.display()))?;
        debug!("Loaded {} tracks from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parses CSV from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .context("Missing header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let rows = reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect::<Vec<String>>())
                    .map_err(anyhow::Error::from)
            })
            .collect::<Result<Vec<Vec<String>>>>()?;

        Self::new(headers, rows)
    }

    /// Writes the table as CSV, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create track table at {}", path.display()))?;
        self.to_writer(file)?;
        debug!("Wrote {} tracks to {}", self.len(), path.display());
        Ok(())
    }

    /// Serializes the table as CSV into any writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell contents by row index and column name.
    #[must_use]
    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Parses a whole column as numbers.
    ///
    /// # Errors
    ///
    /// Fails if the column does not exist or any cell is not a finite number.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| anyhow!("Required column '{name}' is missing from track table"))?;

        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| -> Result<f64> {
                let cell = cells[idx].trim();
                let value = cell.parse::<f64>().with_context(|| {
                    format!("Column '{name}', row {row}: '{cell}' is not a number")
                })?;
                if !value.is_finite() {
                    bail!("Column '{name}', row {row}: '{cell}' is not a finite number");
                }
                Ok(value)
            })
            .collect()
    }

    /// Row index of the track with the given catalog id.
    #[must_use]
    pub fn row_of_id(&self, id: &str) -> Option<usize> {
        let idx = self.column_index("id")?;
        self.rows.iter().position(|r| r[idx] == id)
    }

    /// Appends a track, filling cells by column name. Columns the track
    /// does not know about are left empty.
    pub fn push_track(&mut self, track: &Track) {
        let row = self
            .headers
            .iter()
            .map(|header| match header.as_str() {
                "id" => track.id.clone(),
                "name" => track.name.clone(),
                "artists" => format_artists(&track.artists),
                other => track
                    .features
                    .get(other)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            })
            .collect();
        self.rows.push(row);
    }

    /// Artists of a row, parsed from the `artists` column.
    #[must_use]
    pub fn artists(&self, row: usize) -> Vec<String> {
        self.text(row, "artists").map(parse_artists).unwrap_or_default()
    }

    /// `"Artist A, Artist B - Title"` for a row.
    #[must_use]
    pub fn display_name(&self, row: usize) -> String {
        let name = self.text(row, "name").unwrap_or_default();
        display_name(&self.artists(row), name)
    }
}

/// A table annotated with one group label per row. Labels are only
/// comparable within the clustering run that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    pub table: TrackTable,
    pub labels: Vec<usize>,
}

impl LabeledTable {
    pub fn new(table: TrackTable, labels: Vec<usize>) -> Result<Self> {
        if table.len() != labels.len() {
            bail!(
                "Got {} labels for a table of {} tracks",
                labels.len(),
                table.len()
            );
        }
        Ok(Self { table, labels })
    }
}

/// Renders artists as a bracketed list: `['A', "Guns N' Roses"]`.
#[must_use]
pub fn format_artists(artists: &[String]) -> String {
    let items: Vec<String> = artists
        .iter()
        .map(|artist| {
            let quote = if artist.contains('\'') { '"' } else { '\'' };
            let mut item = String::with_capacity(artist.len() + 2);
            item.push(quote);
            for c in artist.chars() {
                if c == quote || c == '\\' {
                    item.push('\\');
                }
                item.push(c);
            }
            item.push(quote);
            item
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Parses either a bracketed list written by [`format_artists`] or a
/// plain `;`-separated list.
#[must_use]
pub fn parse_artists(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    let Some(body) = cell.strip_prefix('[').and_then(|c| c.strip_suffix(']')) else {
        return cell
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    };

    let mut artists = Vec::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\'' && c != '"' {
            continue;
        }
        let mut item = String::new();
        let mut escaped = false;
        for next in chars.by_ref() {
            if escaped {
                item.push(next);
                escaped = false;
            } else if next == '\\' {
                escaped = true;
            } else if next == c {
                break;
            } else {
                item.push(next);
            }
        }
        artists.push(item);
    }

    if artists.is_empty() {
        // Unquoted list: [A, B]
        artists = body
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    artists
}
