//! Sentence-packing strategy.

pub(super) fn chunk(text: &str, max: usize, min: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0;

    for sentence in split_sentences(text) {
        let sentence_size = sentence.chars().count();
        if current_size + sentence_size > max && !current.is_empty() {
            let candidate = current.join(" ");
            // Below the minimum the sentence joins the open chunk even though it overflows.
            if candidate.chars().count() >= min {
                chunks.push(candidate);
                current.clear();
                current_size = 0;
            }
        }
        current.push(sentence);
        current_size += sentence_size;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Split after `.`, `!` or `?` when whitespace and then an ASCII capital follow. Sentences are
/// trimmed and blank ones dropped.
pub(super) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut sentence_start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let sentence_end = idx + ch.len_utf8();
        let mut gap_end = sentence_end;
        while let Some(&(next_idx, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            gap_end = next_idx + next.len_utf8();
            chars.next();
        }
        let capital_follows = chars
            .peek()
            .is_some_and(|(_, next)| next.is_ascii_uppercase());
        if gap_end > sentence_end && capital_follows {
            sentences.push(&text[sentence_start..sentence_end]);
            sentence_start = gap_end;
        }
    }
    sentences.push(&text[sentence_start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect()
}
