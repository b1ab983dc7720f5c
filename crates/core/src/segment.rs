//! Split decoded text into trimmed, non-blank logical lines.

/// Segment `text` on `\n`, `\r\n` and lone `\r`. Lines are trimmed (Unicode
/// whitespace, including U+3000, and stray BOMs); blank lines are dropped.
///
/// With `drop_last`, the raw segment after the final line break is
/// discarded: when a chunk ends mid-file that segment may be a paragraph
/// truncated at the byte boundary, and it is re-read with the next chunk.
pub fn segment(text: &str, drop_last: bool) -> Vec<String> {
    let body = if drop_last {
        match text.rfind(['\n', '\r']) {
            Some(pos) => &text[..pos],
            None => "",
        }
    } else {
        text
    };

    body.split(['\n', '\r'])
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}
