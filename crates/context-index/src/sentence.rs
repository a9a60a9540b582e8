use once_cell::sync::Lazy;
use regex::Regex;

/// Abbreviations that must not be treated as sentence-final periods.
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "vs.", "etc.", "e.g.", "i.e.", "St.",
];

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(.*?[.!?])(\s+|$)").unwrap());
static PAGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[Page \d+\]$").unwrap());

/// Segments `text` into sentence-sized units. Lines that look tabular
/// (contain a tab) or are page markers are treated as implicit sentence
/// boundaries in their own right, per spec §4.6 step 1.
pub fn segment(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        if line.contains('\t') || PAGE_MARKER.is_match(line.trim()) || looks_like_heading(line) {
            sentences.push(line.to_string());
            continue;
        }
        sentences.extend(segment_prose(line));
    }
    sentences
}

fn looks_like_heading(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("# Sheet:")
}

fn segment_prose(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        match SENTENCE_BOUNDARY.find(trimmed) {
            Some(m) => {
                let candidate = m.as_str().trim_end();
                if ends_with_abbreviation(candidate) && !is_end_of_input(trimmed, m.end()) {
                    // Merge with the following segment rather than splitting here.
                    let consumed = m.end();
                    let (head, tail) = trimmed.split_at(consumed);
                    match SENTENCE_BOUNDARY.find(tail) {
                        Some(next) => {
                            let merged = format!("{head}{}", &tail[..next.end()]);
                            out.push(merged.trim().to_string());
                            rest = &tail[next.end()..];
                        }
                        None => {
                            out.push(format!("{head}{tail}").trim().to_string());
                            break;
                        }
                    }
                } else {
                    out.push(candidate.to_string());
                    rest = &trimmed[m.end()..];
                }
            }
            None => {
                out.push(trimmed.trim().to_string());
                break;
            }
        }
    }
    out
}

fn ends_with_abbreviation(candidate: &str) -> bool {
    ABBREVIATIONS
        .iter()
        .any(|abbr| candidate.ends_with(*abbr))
}

fn is_end_of_input(full: &str, pos: usize) -> bool {
    pos >= full.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_sentences() {
        let out = segment("Hello world. This is a test.");
        assert_eq!(out, vec!["Hello world.", "This is a test."]);
    }

    #[test]
    fn does_not_split_on_abbreviation() {
        let out = segment("Dr. Smith arrived. He was late.");
        assert_eq!(out, vec!["Dr. Smith arrived.", "He was late."]);
    }

    #[test]
    fn treats_tabular_lines_as_own_sentence() {
        let out = segment("a\tb\tc\nSome prose here.");
        assert_eq!(out, vec!["a\tb\tc", "Some prose here."]);
    }

    #[test]
    fn treats_page_markers_as_boundaries() {
        let out = segment("[Page 1]\nBody text.");
        assert_eq!(out, vec!["[Page 1]", "Body text."]);
    }
}
