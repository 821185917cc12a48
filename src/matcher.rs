// 🎯 Matcher - single best knowledge-base entry for a canonical query
// Ratcliff/Obershelp similarity over whole strings, first occurrence wins ties.

use crate::db::KnowledgeEntry;
use crate::normalizer::canonicalize;

/// Lowest accepted similarity
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

// ============================================================================
// MATCH OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Best entry scored at or above the threshold
    Found { entry: KnowledgeEntry, score: f64 },

    /// Best score was below the threshold
    NoMatch { best_score: f64 },

    /// Nothing to match against
    KnowledgeBaseEmpty,
}

impl MatchOutcome {
    pub fn entry(&self) -> Option<&KnowledgeEntry> {
        match self {
            MatchOutcome::Found { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            MatchOutcome::Found { score, .. } => *score,
            MatchOutcome::NoMatch { best_score } => *best_score,
            MatchOutcome::KnowledgeBaseEmpty => 0.0,
        }
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Longest common block within a[alo..ahi] x b[blo..bhi] as (i, j, size).
/// Ties resolve to the smallest i, then the smallest j.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    // prev[k] = length of the common suffix ending at a[i-1], b[blo + k - 1]
    let mut prev = vec![0usize; bhi - blo + 1];
    let mut cur = vec![0usize; bhi - blo + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo + 1;
            if a[i] == b[j] {
                cur[k] = prev[k - 1] + 1;
                if cur[k] > best.2 {
                    best = (i + 1 - cur[k], j + 1 - cur[k], cur[k]);
                }
            } else {
                cur[k] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

/// Total size of the matching blocks between `a` and `b`
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }

        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }

        total += size;
        pending.push((alo, i, blo, j));
        pending.push((i + size, ahi, j + size, bhi));
    }

    total
}

/// Similarity in [0, 1]: 2·M / (|a| + |b|).
/// Two empty strings are identical (1.0); one empty string scores 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Matcher { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best entry for an already-canonical query
    pub fn match_query(&self, query: &str, entries: &[KnowledgeEntry]) -> MatchOutcome {
        if entries.is_empty() {
            return MatchOutcome::KnowledgeBaseEmpty;
        }

        let mut best: Option<(&KnowledgeEntry, f64)> = None;

        for entry in entries {
            let score = similarity(query, &canonicalize(&entry.question));
            // strict comparison keeps the first of equally scored entries
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((entry, score));
            }
        }

        match best {
            Some((entry, score)) if score >= self.threshold => MatchOutcome::Found {
                entry: entry.clone(),
                score,
            },
            Some((_, score)) => MatchOutcome::NoMatch { best_score: score },
            None => MatchOutcome::KnowledgeBaseEmpty,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}
