//! Fixed-size sliding window with sentence snapping.

/// Sentence terminators tried in priority order. The first pattern with any match in the
/// search window wins, and its last occurrence sets the boundary.
const TERMINATORS: [[char; 2]; 6] = [
    ['.', ' '],
    ['.', '\n'],
    ['!', ' '],
    ['!', '\n'],
    ['?', ' '],
    ['?', '\n'],
];

/// Characters past the raw window edge that a sentence end may be found in.
const LOOKAHEAD: usize = 50;

pub(super) fn chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + size).min(len);
        if end < len
            && let Some(boundary) = sentence_boundary(&chars, end, size)
        {
            end = boundary;
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= len {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Position just past the last sentence terminator in the final 20% of the window plus the
/// lookahead, if any.
fn sentence_boundary(chars: &[char], end: usize, size: usize) -> Option<usize> {
    let search_start = end - size / 5;
    let search_end = (end + LOOKAHEAD).min(chars.len());
    let window = &chars[search_start..search_end];

    TERMINATORS.iter().find_map(|pattern| {
        window
            .windows(2)
            .rposition(|pair| pair == pattern)
            .map(|offset| search_start + offset + 2)
    })
}
