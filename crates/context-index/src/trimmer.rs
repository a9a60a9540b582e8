use regex::Regex;

/// Configuration for boilerplate detection (spec §4.5, §9: "OK to be
/// conservative").
#[derive(Debug, Clone)]
pub struct TrimmerConfig {
    /// Lines matching any of these are always removed.
    pub boilerplate_patterns: Vec<Regex>,
    /// A line that is *not* matched by a pattern is still removed if it
    /// recurs at least this many times adjacent to a page marker.
    pub min_page_occurrences: usize,
}

impl Default for TrimmerConfig {
    fn default() -> Self {
        TrimmerConfig {
            boilerplate_patterns: vec![
                Regex::new(r"^\s*Page\s+\d+\s+of\s+\d+\s*$").unwrap(),
                Regex::new(r"^\s*https?://\S+\s*$").unwrap(),
            ],
            min_page_occurrences: 3,
        }
    }
}

static PAGE_MARKER: once_cell::sync::Lazy<Regex> =
    once_cell::sync::Lazy::new(|| Regex::new(r"^\[Page \d+\]$").unwrap());

/// Collapses whitespace, removes boilerplate lines, and drops duplicate
/// adjacent paragraphs. `trim(trim(x)) == trim(x)` for all `x` (property 7).
pub fn trim(text: &str, config: &TrimmerConfig) -> String {
    let collapsed = collapse_whitespace(text);
    let without_boilerplate = remove_boilerplate(&collapsed, config);
    drop_duplicate_paragraphs(&without_boilerplate)
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            let mut last_was_space = false;
            for ch in line.chars() {
                if ch == ' ' || ch == '\t' {
                    if !last_was_space {
                        out.push(' ');
                    }
                    last_was_space = true;
                } else {
                    out.push(ch);
                    last_was_space = false;
                }
            }
            out.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_boilerplate(text: &str, config: &TrimmerConfig) -> String {
    let lines: Vec<&str> = text.lines().collect();

    let mut frequency: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for &line in &lines {
        if !line.trim().is_empty() {
            *frequency.entry(line).or_insert(0) += 1;
        }
    }

    let is_near_page_marker = |i: usize| -> bool {
        let before = i.checked_sub(1).map(|j| lines[j]);
        let after = lines.get(i + 1).copied();
        before.map(|l| PAGE_MARKER.is_match(l)).unwrap_or(false)
            || after.map(|l| PAGE_MARKER.is_match(l)).unwrap_or(false)
            || PAGE_MARKER.is_match(lines[i])
    };

    let mut kept = Vec::with_capacity(lines.len());
    for (i, &line) in lines.iter().enumerate() {
        if config.boilerplate_patterns.iter().any(|p| p.is_match(line)) {
            continue;
        }
        let recurring = frequency.get(line).copied().unwrap_or(0) >= config.min_page_occurrences;
        if recurring && is_near_page_marker(i) && !PAGE_MARKER.is_match(line) {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn drop_duplicate_paragraphs(text: &str) -> String {
    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut out: Vec<&str> = Vec::with_capacity(paragraphs.len());
    for p in paragraphs {
        if out.last().map(|prev| *prev == p).unwrap_or(false) {
            continue;
        }
        out.push(p);
    }
    out.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_on_boilerplate_and_whitespace() {
        let config = TrimmerConfig::default();
        let text = "Intro paragraph.\n\n[Page 1]\nPage 1 of 12\nBody one.\n\n[Page 2]\nPage 1 of 12\nBody two.\n\n[Page 3]\nPage 1 of 12\nBody three.";
        let once = trim(text, &config);
        let twice = trim(&once, &config);
        assert_eq!(once, twice);
        assert!(!once.contains("Page 1 of 12"));
    }

    #[test]
    fn collapses_runs_of_spaces() {
        let config = TrimmerConfig::default();
        let out = trim("a    b\t\tc", &config);
        assert_eq!(out, "a b c");
    }

    #[test]
    fn drops_duplicate_adjacent_paragraphs() {
        let config = TrimmerConfig::default();
        let out = trim("same text\n\nsame text\n\ndifferent text", &config);
        assert_eq!(out, "same text\n\ndifferent text");
    }

    #[test]
    fn preserves_unique_short_lines() {
        let config = TrimmerConfig::default();
        let out = trim("a unique short line", &config);
        assert_eq!(out, "a unique short line");
    }
}
