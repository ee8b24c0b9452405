//! Hierarchical splitting over a separator list.
//!
//! Pieces keep their trailing separator, so merged chunks are exact substrings of the input
//! and nothing is lost at a boundary (a `". "` split keeps the period with its sentence).

use std::collections::VecDeque;

pub(super) fn chunk(text: &str, size: usize, overlap: usize, separators: &[String]) -> Vec<String> {
    split(text, size, overlap, separators)
        .into_iter()
        .map(|chunk| chunk.trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn split(text: &str, size: usize, overlap: usize, separators: &[String]) -> Vec<String> {
    let Some((separator, remaining)) = separators.split_first() else {
        return vec![text.to_string()];
    };

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(idx, ch)| &text[idx..idx + ch.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator.as_str()).collect()
    };

    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut window_size = 0;

    for piece in pieces {
        let piece_size = piece.chars().count();
        if window_size + piece_size > size && !window.is_empty() {
            emit(&window, size, overlap, remaining, &mut chunks);
            // Keep a tail no longer than `overlap` that still leaves room for this piece.
            while window_size > overlap || (window_size > 0 && window_size + piece_size > size) {
                let Some((_, dropped)) = window.pop_front() else {
                    break;
                };
                window_size -= dropped;
            }
        }
        window.push_back((piece, piece_size));
        window_size += piece_size;
    }

    if !window.is_empty() {
        emit(&window, size, overlap, remaining, &mut chunks);
    }
    chunks
}

fn emit(
    window: &VecDeque<(&str, usize)>,
    size: usize,
    overlap: usize,
    remaining: &[String],
    chunks: &mut Vec<String>,
) {
    let merged: String = window.iter().map(|(piece, _)| *piece).collect();
    let merged_size: usize = window.iter().map(|(_, len)| len).sum();
    if merged_size > size && !remaining.is_empty() {
        chunks.extend(split(&merged, size, overlap, remaining));
    } else {
        chunks.push(merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::DEFAULT_SEPARATORS;
    use crate::chunking::tests::covers;

    fn separators() -> Vec<String> {
        DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = chunk(text, 30, 0, &separators());
        assert_eq!(
            chunks,
            vec!["First paragraph here.", "Second paragraph here.", "Third one."]
        );
    }

    #[test]
    fn oversized_paragraph_falls_through_to_sentences() {
        let text = "Alpha beta. Gamma delta. Epsilon zeta.\n\nShort.";
        let chunks = chunk(text, 15, 0, &separators());
        assert_eq!(chunks, vec!["Alpha beta.", "Gamma delta.", "Epsilon zeta.", "Short."]);
    }

    #[test]
    fn unbroken_text_splits_into_characters() {
        let text = "x".repeat(25);
        let chunks = chunk(&text, 10, 0, &separators());
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn overlap_repeats_trailing_words() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunk(text, 20, 8, &separators());
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert!(covers(text, &chunks));
        assert_eq!(chunks[0], "one two three four");
        assert!(chunks[1].starts_with("four"));
    }
}
