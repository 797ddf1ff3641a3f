use anyhow::Result;
use tracing::debug;

use crate::error::ProcessingError;

/// Similarity between two ward names, 0 (nothing shared) to 100 (identical).
pub trait SimilarityStrategy {
    fn score(&self, a: &str, b: &str) -> u32;
}

/// Indel similarity: `100 * 2 * LCS / (len(a) + len(b))`, rounded.
/// Two names sharing most of their letters in order score high even when
/// spelled differently ("Chimwemwe" / "Chimwenwe").
#[derive(Debug, Clone, Copy, Default)]
pub struct IndelRatio;

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

impl SimilarityStrategy for IndelRatio {
    fn score(&self, a: &str, b: &str) -> u32 {
        let a = a.chars().collect::<Vec<_>>();
        let b = b.chars().collect::<Vec<_>>();
        let total = a.len() + b.len();
        if a.is_empty() || b.is_empty() { return 0 }
        (200.0 * lcs_len(&a, &b) as f64 / total as f64).round() as u32
    }
}

/// Lowercase with all whitespace removed.
pub fn normalize_ward_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// Pick the listing ward value that best corresponds to directory `target`.
///
/// The first candidate containing the normalized target wins outright.
/// Otherwise the highest positive score wins, earlier candidates winning ties.
pub fn best_match<'a, S: SimilarityStrategy + ?Sized>(target: &str, candidates: &'a [String], strategy: &S) -> Result<&'a str> {
    let wanted = normalize_ward_name(target);

    let mut best: Option<(&str, u32)> = None;
    for candidate in candidates {
        let normalized = normalize_ward_name(candidate);
        if normalized.contains(&wanted) {
            debug!("[ward] {target:?} matched {candidate:?} by containment");
            return Ok(candidate.as_str())
        }
        let score = strategy.score(&wanted, &normalized);
        if score > 0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate.as_str(), score));
        }
    }

    match best {
        Some((candidate, score)) => {
            debug!("[ward] {target:?} matched {candidate:?} with score {score}");
            Ok(candidate)
        }
        None => Err(ProcessingError::WardMatch {
            ward: target.to_string(),
            candidates: candidates.to_vec(),
        }.into()),
    }
}
