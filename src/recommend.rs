//! Picking recommendations from the input song's group.

use crate::table::LabeledTable;
use anyhow::{anyhow, bail, Result};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What gets handed to the language model: the input song and the picks,
/// each as `"Artist - Title"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationPayload {
    #[serde(rename = "Input_song")]
    pub input_song: String,
    #[serde(rename = "Recommendations")]
    pub recommendations: Vec<String>,
}

impl RecommendationPayload {
    /// Payload for `rows` of `labeled`, presented after `input_song`.
    #[must_use]
    pub fn from_rows(input_song: String, labeled: &LabeledTable, rows: &[usize]) -> Self {
        Self {
            input_song,
            recommendations: rows
                .iter()
                .map(|&row| labeled.table.display_name(row))
                .collect(),
        }
    }
}

/// Samples `count` rows uniformly at random from the group of the track
/// with catalog id `input_id`. Rows carrying the input's id are never
/// returned, and a track listed twice is returned at most once.
///
/// # Errors
///
/// Fails if no row carries `input_id`, or if the group has fewer than
/// `count` other members.
pub fn select_similar<R>(
    labeled: &LabeledTable,
    input_id: &str,
    count: usize,
    rng: &mut R,
) -> Result<Vec<usize>>
where
    R: Rng + ?Sized,
{
    let input_row = labeled
        .table
        .row_of_id(input_id)
        .ok_or_else(|| anyhow!("Input track '{input_id}' is not in the clustered table"))?;
    let group = labeled.labels[input_row];

    // One row per track id, never the input's.
    let mut seen = HashSet::new();
    let candidates: Vec<usize> = labeled
        .labels
        .iter()
        .enumerate()
        .filter(|&(_, &label)| label == group)
        .map(|(row, _)| row)
        .filter(|&row| {
            let id = labeled.table.text(row, "id").unwrap_or_default();
            id != input_id && seen.insert(id)
        })
        .collect();

    if candidates.len() < count {
        bail!(
            "Group {group} holds only {} other tracks, {count} requested. \
             Try fewer songs or fewer clusters.",
            candidates.len()
        );
    }

    let picks: Vec<usize> = candidates.choose_multiple(rng, count).copied().collect();
    debug!(
        "Picked rows {picks:?} from group {group} ({} candidates)",
        candidates.len()
    );
    Ok(picks)
}
