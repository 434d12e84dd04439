//! Text similarity for output deduplication
//!
//! Three rungs: exact match after normalization, containment ratio when one
//! text is a substring of the other, otherwise Jaccard over whitespace
//! tokens. Symmetric and reflexive by construction.

use std::collections::HashSet;

/// Similarity of two texts in [0, 1].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    if a.contains(&b) || b.contains(&a) {
        let (shorter, longer) = if a.chars().count() <= b.chars().count() {
            (&a, &b)
        } else {
            (&b, &a)
        };
        return shorter.chars().count() as f64 / longer.chars().count() as f64;
    }

    jaccard(&a, &b)
}

/// Highest similarity of `candidate` against any of `outputs`.
#[must_use]
pub fn max_similarity<'a, I>(candidate: &str, outputs: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    outputs
        .into_iter()
        .map(|o| similarity(candidate, o))
        .fold(0.0, f64::max)
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &str, b: &str) -> f64 {
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}
