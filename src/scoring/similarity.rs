//! Edit distance and similarity percentages.

use schemars::JsonSchema;

use super::normalize::normalize;
use crate::{errors::BenchError, prelude::*};

/// How closely a candidate matches a reference transcript.
#[derive(Clone, Copy, Debug, JsonSchema, PartialEq, Serialize)]
pub struct Similarity {
    /// Levenshtein distance between the normalized texts.
    pub distance: usize,

    /// Length of the normalized reference, in characters.
    pub reference_length: usize,

    /// `100 - distance * 100 / reference_length`. This is not clamped, so a
    /// long, wrong candidate can score below zero.
    pub similarity: f64,
}

/// Compute the Levenshtein distance between two character sequences.
///
/// Uses the full `(a.len() + 1) × (b.len() + 1)` grid, with unit costs for
/// insertion, deletion and substitution.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    let rows = a.len() + 1;
    let cols = b.len() + 1;
    let mut grid = vec![0usize; rows * cols];

    for i in 0..rows {
        grid[i * cols] = i;
    }
    for j in 0..cols {
        grid[j] = j;
    }

    for i in 1..rows {
        for j in 1..cols {
            let substitution_cost = usize::from(a[i - 1] != b[j - 1]);
            let deletion = grid[(i - 1) * cols + j] + 1;
            let insertion = grid[i * cols + (j - 1)] + 1;
            let substitution = grid[(i - 1) * cols + (j - 1)] + substitution_cost;
            grid[i * cols + j] = deletion.min(insertion).min(substitution);
        }
    }
    grid[rows * cols - 1]
}

/// Score `candidate` against `reference`.
///
/// Both texts are normalized first. Fails with [`BenchError::InvalidInput`] if
/// the normalized reference is empty, since there is nothing to measure the
/// distance against.
pub fn similarity(reference: &str, candidate: &str) -> Result<Similarity, BenchError> {
    let reference = normalize(reference).chars().collect::<Vec<_>>();
    let candidate = normalize(candidate).chars().collect::<Vec<_>>();
    if reference.is_empty() {
        return Err(BenchError::InvalidInput);
    }

    let distance = levenshtein(&reference, &candidate);
    let reference_length = reference.len();
    Ok(Similarity {
        distance,
        reference_length,
        similarity: 100.0 - distance as f64 * 100.0 / reference_length as f64,
    })
}
