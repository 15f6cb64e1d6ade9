//! Whitespace normalization for text pulled out of a DOM

/// Joins text fragments into a single line.
///
/// Each fragment has its inner whitespace collapsed and is trimmed; fragments
/// that end up empty are dropped; the rest are separated by one space.
pub fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for fragment in fragments {
        let segment = normalize_whitespace_in_segment(fragment);
        if segment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&segment);
    }
    out
}

/// Normalizes whitespace within a single line or paragraph
pub fn normalize_whitespace_in_segment(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join(" ")
}
