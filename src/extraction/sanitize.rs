//! Text normalization applied to every extractor's output.

/// Normalize extracted text before chunking.
///
/// - drops control characters except `\n` and `\t` (so `\r\n` becomes `\n`)
/// - collapses runs of spaces and tabs into one space
/// - trims every line
/// - collapses three or more consecutive newlines into exactly two
/// - trims the result
pub fn sanitize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|ch| !ch.is_control() || *ch == '\n' || *ch == '\t')
        .collect();

    let mut output = String::with_capacity(cleaned.len());
    let mut blank_run = 0usize;
    for line in cleaned.split('\n') {
        let line = collapse_horizontal_whitespace(line);
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        output.push_str(&line);
        output.push('\n');
    }

    output.trim().to_string()
}

fn collapse_horizontal_whitespace(line: &str) -> String {
    let mut collapsed = String::with_capacity(line.len());
    let mut in_gap = false;
    for ch in line.trim_matches([' ', '\t']).chars() {
        if ch == ' ' || ch == '\t' {
            if !in_gap {
                collapsed.push(' ');
                in_gap = true;
            }
        } else {
            collapsed.push(ch);
            in_gap = false;
        }
    }
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::sanitize_text;

    #[test]
    fn strips_control_characters_but_keeps_newlines_and_tabs_as_spacing() {
        let input = "Min\u{0}ing\u{7}\tpolicy\r\nsecond\u{1b} line";
        assert_eq!(sanitize_text(input), "Mining policy\nsecond line");
    }

    #[test]
    fn collapses_horizontal_whitespace_and_trims_lines() {
        let input = "   one  \t two   \n\t three\t";
        assert_eq!(sanitize_text(input), "one two\nthree");
    }

    #[test]
    fn collapses_blank_line_runs_to_one_paragraph_break() {
        let input = "first\n\n\n\n\nsecond\n \n\t\n  \nthird";
        assert_eq!(sanitize_text(input), "first\n\nsecond\n\nthird");
    }

    #[test]
    fn whitespace_only_input_becomes_empty() {
        assert_eq!(sanitize_text(" \n\t\r\n "), "");
    }
}
