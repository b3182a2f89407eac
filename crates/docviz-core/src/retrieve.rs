//! Keyword-overlap retrieval over document chunks.
//!
//! Scores every chunk by the fraction of unique query words it contains
//! (case-insensitive substring match) and returns the best `k`. There is
//! no index: the corpus is one session's uploads, scanned per query.
//!
//! # Scoring
//!
//! ```text
//! score = |{ w ∈ query_words : w ⊆ lower(chunk) }| / |query_words|
//! ```
//!
//! Chunks with no matching word are discarded, so every returned score
//! lies in `(0, 1]`. Ties keep corpus order (documents in upload order,
//! chunks in segment order).

use crate::models::{Document, RetrievalResult};

/// Default number of results returned by [`retrieve`].
pub const DEFAULT_RESULT_CAP: usize = 5;

/// Rank the chunks of `documents` against `query` and return at most `k`.
///
/// Never fails: an empty query, an empty corpus, or `k == 0` all yield
/// an empty vector.
pub fn retrieve(query: &str, documents: &[Document], k: usize) -> Vec<RetrievalResult> {
    let words = query_words(query);
    if words.is_empty() || k == 0 {
        return Vec::new();
    }
    let total = words.len() as f64;

    let mut results: Vec<RetrievalResult> = documents
        .iter()
        .flat_map(|doc| doc.chunks.iter().map(move |chunk| (doc, chunk)))
        .filter_map(|(doc, chunk)| {
            let text_lower = chunk.text.to_lowercase();
            let matches = words
                .iter()
                .filter(|w| text_lower.contains(w.as_str()))
                .count();
            if matches == 0 {
                return None;
            }
            Some(RetrievalResult {
                chunk: chunk.clone(),
                document_name: doc.name.clone(),
                score: matches as f64 / total,
            })
        })
        .collect();

    // `sort_by` is stable, which keeps corpus order among equal scores.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(k);
    results
}

/// Lower-case, whitespace-split, de-duplicated query words in first-seen order.
fn query_words(query: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for w in query.to_lowercase().split_whitespace() {
        if !words.iter().any(|seen| seen == w) {
            words.push(w.to_string());
        }
    }
    words
}
