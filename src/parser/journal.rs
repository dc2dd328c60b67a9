use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::normalizer::collapse_whitespace;
use crate::config::VenueConfig;

pub const UNKNOWN_JOURNAL: &str = "Unknown Journal";

static JOURNAL_OF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(journal\s+of\s+[\p{L}&,\- ]+)").unwrap());

const MAX_JOURNAL_CHARS: usize = 120;

/// 识别期刊名：首部文本 → "Journal of …" → 文件名 → `Unknown Journal`，结果不会为空
pub fn extract_journal(lines: &[&str], scan_lines: usize, filename: &str, venues: &VenueConfig) -> String {
    let head = &lines[..scan_lines.min(lines.len())];

    for line in head {
        let lower = line.to_lowercase();
        if let Some(rule) = venues
            .venues
            .iter()
            .find(|rule| !rule.pattern.is_empty() && lower.contains(&rule.pattern.to_lowercase()))
        {
            debug!("期刊名来自首部文本: {}", rule.name);
            return rule.name.clone();
        }
    }

    for line in head {
        if let Some(caps) = JOURNAL_OF_RE.captures(line) {
            let name = collapse_whitespace(caps[1].trim_end_matches([',', '-', ' ']));
            if name.split_whitespace().count() >= 3 && name.chars().count() <= MAX_JOURNAL_CHARS {
                debug!("期刊名来自 Journal of 行: {}", name);
                return name;
            }
        }
    }

    if let Some(hint) = venues
        .filename_hints
        .iter()
        .find(|hint| !hint.contains.is_empty() && filename.contains(&hint.contains))
    {
        debug!("期刊名来自文件名: {}", hint.name);
        return hint.name.clone();
    }

    UNKNOWN_JOURNAL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_table_matches_case_insensitively() {
        let venues = VenueConfig::default();
        let lines = vec!["RESEARCH ARTICLE", "Scientific REPORTS | (2021) 11:1234"];
        assert_eq!(extract_journal(&lines, 10, "paper.pdf", &venues), "Scientific Reports");
    }

    #[test]
    fn journal_of_line_is_used_when_no_venue_matches() {
        let venues = VenueConfig::default();
        let lines = vec!["Journal of Theoretical Biology 512 (2021) 110560"];
        assert_eq!(
            extract_journal(&lines, 10, "paper.pdf", &venues),
            "Journal of Theoretical Biology"
        );
    }

    #[test]
    fn only_the_first_lines_are_scanned() {
        let venues = VenueConfig::default();
        let mut lines = vec!["filler line"; 10];
        lines.push("PLOS ONE");
        assert_eq!(extract_journal(&lines, 10, "paper.pdf", &venues), UNKNOWN_JOURNAL);
    }

    #[test]
    fn filename_hint_then_unknown() {
        let venues = VenueConfig::default();
        let lines = vec!["Nothing recognisable here"];
        assert_eq!(
            extract_journal(&lines, 10, "10.3934_mbe.2021123.pdf", &venues),
            "Mathematical Biosciences and Engineering"
        );
        assert_eq!(extract_journal(&lines, 10, "journal.pone.0249262.pdf", &venues), "PLOS ONE");
        assert_eq!(extract_journal(&lines, 10, "misc.pdf", &venues), UNKNOWN_JOURNAL);
    }
}
