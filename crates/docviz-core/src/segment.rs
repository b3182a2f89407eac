//! Overlapping text segmenter.
//!
//! Splits extracted document text into chunks of roughly `chunk_size`
//! characters, preferring natural boundaries over fixed offsets and
//! repeating `overlap` characters across each seam so that retrieval
//! keeps context that straddles a cut.
//!
//! # Algorithm
//!
//! 1. Take the window `[start, start + chunk_size)`.
//! 2. If the window ends before the text does, look backward inside it
//!    for the rightmost paragraph break (`"\n\n"`). Cut there if it lies
//!    past the window midpoint.
//! 3. Otherwise look for the rightmost sentence terminator (`". "`,
//!    `"? "`, `"! "`) past the midpoint and cut just after the
//!    punctuation.
//! 4. Otherwise cut at the hard `chunk_size` boundary.
//! 5. Trim the slice, drop it if empty, and continue from `end - overlap`.
//!
//! Positions are counted in characters, not bytes, so multi-byte text
//! is never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use docviz_core::segment::segment;
//!
//! let chunks = segment("Alpha beta gamma. Delta epsilon zeta! Eta theta iota?", 30, 5);
//! assert_eq!(chunks[0], "Alpha beta gamma.");
//! ```

/// Default target chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters repeated across a chunk seam.
pub const DEFAULT_OVERLAP: usize = 200;

const PARAGRAPH_BREAK: &str = "\n\n";
const SENTENCE_TERMINATORS: [&str; 3] = [". ", "? ", "! "];

/// Split `text` into ordered, non-empty, overlapping chunks.
///
/// Returns an empty vector for empty text or a zero `chunk_size`. An
/// `overlap` that is not smaller than `chunk_size` is clamped to
/// `chunk_size - 1`.
///
/// # Guarantees
///
/// - Every returned chunk is non-empty and at most `chunk_size` characters.
/// - Consecutive windows always advance, so segmentation terminates.
/// - Every character of `text` falls inside at least one window.
pub fn segment(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every char, plus the end of the text as a sentinel.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let text_len = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text_len {
        let end = if start + chunk_size < text_len {
            find_cut(text, &offsets, start, chunk_size)
        } else {
            text_len
        };

        let piece = text[offsets[start]..offsets[end]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        start = if end < text_len {
            let next = end.saturating_sub(overlap);
            // A natural cut close to the midpoint combined with a large
            // overlap could step backward; never revisit a window start.
            if next > start {
                next
            } else {
                end
            }
        } else {
            text_len
        };
    }

    chunks
}

/// Pick the end (exclusive, in chars) of the window starting at `start`.
fn find_cut(text: &str, offsets: &[usize], start: usize, chunk_size: usize) -> usize {
    let end = start + chunk_size;
    let midpoint = start + chunk_size / 2;
    let window_start = offsets[start];
    let window = &text[window_start..offsets[end]];

    if let Some(pos) = window.rfind(PARAGRAPH_BREAK) {
        let at = char_position(offsets, window_start + pos);
        if at > midpoint {
            return at;
        }
    }

    let sentence = SENTENCE_TERMINATORS
        .iter()
        .filter_map(|t| window.rfind(t))
        .max();
    if let Some(pos) = sentence {
        let at = char_position(offsets, window_start + pos);
        if at > midpoint {
            // Keep the punctuation, leave the trailing space for the next chunk.
            return at + 1;
        }
    }

    end
}

/// Map a byte offset that starts a char back to its char position.
fn char_position(offsets: &[usize], byte: usize) -> usize {
    offsets.binary_search(&byte).unwrap_or_else(|i| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(segment("", 1000, 200).is_empty());
    }

    #[test]
    fn test_whitespace_only_text() {
        assert!(segment("   \n\n   \n", 1000, 200).is_empty());
    }

    #[test]
    fn test_zero_chunk_size() {
        assert!(segment("some text", 0, 0).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = segment("  Hello, world!  ", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_cuts_at_paragraph_breaks() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";
        let chunks = segment(text, 30, 5);
        assert_eq!(
            chunks,
            vec![
                "First paragraph here.",
                "here.\n\nSecond paragraph here.",
                "ere.\n\nThird paragraph here.",
            ]
        );
    }

    #[test]
    fn test_paragraph_break_preferred_over_hard_cut() {
        let text = "Para one.\n\nPara two is longer and contains more detail about the topic at hand.\n\nPara three.";
        let chunks = segment(text, 80, 5);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with("topic at hand."));
        assert!(chunks[1].ends_with("Para three."));
    }

    #[test]
    fn test_paragraph_break_before_midpoint_ignored() {
        // The only paragraph break sits at char 9, before the midpoint of a
        // 20-char window, so the first cut is a hard one.
        let text = "Para one.\n\nPara two is longer and contains more detail about the topic at hand.\n\nPara three.";
        let chunks = segment(text, 20, 5);
        assert_eq!(chunks[0], "Para one.\n\nPara two");
        assert_eq!(chunks.len(), 6);
    }

    #[test]
    fn test_cuts_after_sentence_terminators() {
        let text = "Alpha beta gamma. Delta epsilon zeta! Eta theta iota? Kappa lambda mu.";
        let chunks = segment(text, 30, 5);
        assert_eq!(
            chunks,
            vec![
                "Alpha beta gamma.",
                "amma. Delta epsilon zeta!",
                "zeta! Eta theta iota?",
                "iota? Kappa lambda mu.",
            ]
        );
    }

    #[test]
    fn test_hard_boundary_without_breaks() {
        let text = "abcdefghij".repeat(5);
        let chunks = segment(&text, 20, 5);
        assert_eq!(
            chunks,
            vec![
                "abcdefghijabcdefghij",
                "fghijabcdefghijabcde",
                "abcdefghijabcdefghij",
            ]
        );
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "naïve café résumé. ".repeat(4);
        let chunks = segment(&text, 25, 5);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "naïve café résumé.");
        assert_eq!(chunks[1], "sumé. naïve café résumé.");
    }

    #[test]
    fn test_overlap_clamped_and_terminates() {
        let text = "One two. Three four. Five six. Seven eight. Nine ten.".repeat(10);
        let chunks = segment(&text, 12, 50);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(!c.is_empty());
            assert!(c.chars().count() <= 12);
        }
    }

    #[test]
    fn test_large_overlap_with_natural_breaks_terminates() {
        let text = "Short one. Another short one. Yet another. ".repeat(20);
        let chunks = segment(&text, 20, 19);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < text.len());
    }

    #[test]
    fn test_chunks_cover_all_text() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} talks about item {}.", i, i * 7))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = segment(&text, 100, 20);
        for word in text.split_whitespace() {
            assert!(
                chunks.iter().any(|c| c.contains(word)),
                "word {:?} missing from every chunk",
                word
            );
        }
        for c in &chunks {
            assert!(c.chars().count() <= 100);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha.\n\nBeta. Gamma!\n\nDelta? Epsilon.".repeat(8);
        assert_eq!(segment(&text, 40, 10), segment(&text, 40, 10));
    }
}
