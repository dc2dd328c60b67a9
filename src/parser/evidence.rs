use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::normalizer::collapse_whitespace;

const MAX_QUANTITATIVE_CHARS: usize = 1000;
const MAX_STATISTICAL_FINDINGS: usize = 20;
const MAX_TABLE_RESULTS: usize = 15;
const MAX_TABLE_FRAGMENT_CHARS: usize = 100;

/// 辅助证据：只作为生成摘要时的参考，不参与任何字段判定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub quantitative_results: String,
    pub statistical_findings: Vec<String>,
    pub table_results: Vec<String>,
    pub doi: Option<String>,
}

/// 结果类章节：(标题, 结束标题)
const RESULT_SECTIONS: &[(&str, &[&str])] = &[
    ("results", &["discussion", "conclusion", "limitations", "references"]),
    ("findings", &["discussion", "conclusion", "limitations"]),
    ("conclusions?", &["acknowledg", "references", "funding"]),
    ("discussion", &["conclusion", "limitations", "references"]),
];

static SECTION_RES: Lazy<Vec<(Regex, &'static [&'static str])>> = Lazy::new(|| {
    RESULT_SECTIONS
        .iter()
        .map(|(heading, stops)| {
            let pattern = format!(r"(?i)^\s*(?:\d+(?:\.\d+)*\.?\s*)?{}\s*:?\s*$", heading);
            (Regex::new(&pattern).unwrap(), *stops)
        })
        .collect()
});

// 小数点不算句末
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:[^.!?]|\.\d)+[.!?]").unwrap());

static QUANTITATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:\.\d+)?%?|\bp\s*[<>=]\s*\d+|\bCI\b|\bOR\b|\bRR\b|\bR[₀0]\b").unwrap()
});

static DOI_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\bdoi:\s*(\S+)").unwrap(),
        Regex::new(r"(?i)https?://(?:dx\.)?doi\.org/(\S+)").unwrap(),
        Regex::new(r"\b10\.\d{4,}/\S+").unwrap(),
    ]
});

pub struct EvidenceExtractor {
    statistical_patterns: Vec<(Regex, &'static str)>,
    table_patterns: Vec<(Regex, &'static str)>,
}

impl EvidenceExtractor {
    pub fn new() -> Self {
        let statistical_patterns = vec![
            (Regex::new(r"(\d+(?:\.\d+)?%)").unwrap(), "percentage"),
            (Regex::new(r"(?i)\b(p\s*[<>=]\s*\d+(?:\.\d+)?)").unwrap(), "p_value"),
            (Regex::new(r"(?i)(95%\s*CI[:\s]*\d+(?:\.\d+)?[-–]\d+(?:\.\d+)?)").unwrap(), "confidence_interval"),
            (Regex::new(r"(?i)\b(R[₀0]\s*[=:]\s*\d+(?:\.\d+)?)").unwrap(), "reproduction_number"),
            (Regex::new(r"\b((?:OR|RR)\s*[=:]\s*\d+(?:\.\d+)?)").unwrap(), "odds_or_risk_ratio"),
            (
                Regex::new(r"(?i)(\d+(?:\.\d+)?%?\s*(?:reduction|decrease|increase|improvement))").unwrap(),
                "change",
            ),
            (Regex::new(r"(?i)(\d+(?:\.\d+)?[-–]fold)").unwrap(), "fold_change"),
            (Regex::new(r"(?i)\b(n\s*=\s*\d+)").unwrap(), "sample_size"),
        ];

        let table_patterns = vec![
            (
                Regex::new(r"(?i)\btable\s+\d+[^.]*?(?:\d+(?:\.\d+)?%|\bp\s*[<>=])").unwrap(),
                "table_reference",
            ),
            (Regex::new(r"\d+(?:\.\d+)?\s+\(\s*\d+(?:\.\d+)?%?\s*\)").unwrap(), "count_with_share"),
            (Regex::new(r"\(\s*\d+(?:\.\d+)?%?[^)]*\)").unwrap(), "numeric_parenthetical"),
        ];

        Self {
            statistical_patterns,
            table_patterns,
        }
    }

    pub fn extract(&self, full_text: &str) -> Evidence {
        let lines: Vec<&str> = full_text.lines().collect();
        let evidence = Evidence {
            quantitative_results: quantitative_results(&lines),
            statistical_findings: self.statistical_findings(full_text),
            table_results: self.table_results(full_text),
            doi: extract_doi(&lines, full_text),
        };
        info!(
            "辅助证据: 结果句 {} 字符, 统计量 {} 个, 表格片段 {} 个, DOI {}",
            evidence.quantitative_results.chars().count(),
            evidence.statistical_findings.len(),
            evidence.table_results.len(),
            evidence.doi.as_deref().unwrap_or("无")
        );
        evidence
    }

    /// 百分比、p值、置信区间、R0、OR/RR、变化幅度、倍数、样本量
    pub fn statistical_findings(&self, full_text: &str) -> Vec<String> {
        let mut findings = Vec::new();
        let mut seen = HashSet::new();

        for (pattern, kind) in &self.statistical_patterns {
            for caps in pattern.captures_iter(full_text) {
                let raw = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let value = collapse_whitespace(raw);
                if seen.insert(value.clone()) {
                    debug!("统计量 [{}]: {}", kind, value);
                    findings.push(value);
                }
            }
        }

        findings.truncate(MAX_STATISTICAL_FINDINGS);
        findings
    }

    /// 表格引用、`n (x%)` 单元格、含数字的括号
    pub fn table_results(&self, full_text: &str) -> Vec<String> {
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for (pattern, kind) in &self.table_patterns {
            for mat in pattern.find_iter(full_text) {
                let raw = mat.as_str();
                if raw.chars().count() >= MAX_TABLE_FRAGMENT_CHARS {
                    continue;
                }
                let fragment = collapse_whitespace(raw);
                if seen.insert(fragment.clone()) {
                    debug!("表格片段 [{}]: {}", kind, fragment);
                    results.push(fragment);
                }
            }
        }

        results.truncate(MAX_TABLE_RESULTS);
        results
    }
}

impl Default for EvidenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn section_body(lines: &[&str], heading: &Regex, stops: &[&str]) -> Option<String> {
    let start = lines.iter().position(|l| heading.is_match(l))?;
    let body: Vec<&str> = lines[start + 1..]
        .iter()
        .take_while(|l| {
            let lower = l.trim().to_lowercase();
            let lower = lower.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ');
            !stops.iter().any(|s| lower.starts_with(s))
        })
        .copied()
        .collect();
    Some(body.join(" "))
}

/// 结果、发现、结论、讨论章节中含数字或统计术语的句子
pub fn quantitative_results(lines: &[&str]) -> String {
    let mut sentences: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for (heading, stops) in SECTION_RES.iter() {
        let Some(body) = section_body(lines, heading, stops) else {
            continue;
        };
        for mat in SENTENCE_RE.find_iter(&body) {
            let sentence = collapse_whitespace(mat.as_str());
            if QUANTITATIVE_RE.is_match(&sentence) && seen.insert(sentence.clone()) {
                sentences.push(sentence);
            }
        }
    }

    let joined = sentences.join(" ");
    joined.chars().take(MAX_QUANTITATIVE_CHARS).collect()
}

fn clean_doi(raw: &str) -> Option<String> {
    let doi = raw.trim_end_matches(['.', ',', ';', ':', ')', ']', '}', '>', '"', '\'']);
    if doi.starts_with("10.") && doi.contains('/') {
        Some(doi.to_string())
    } else {
        None
    }
}

fn find_doi(text: &str) -> Option<String> {
    DOI_RES.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
            clean_doi(raw)
        })
    })
}

/// 先看提到 doi 的行，再搜全文；返回 `https://doi.org/<doi>`
pub fn extract_doi(lines: &[&str], full_text: &str) -> Option<String> {
    let from_lines = lines
        .iter()
        .filter(|l| l.to_lowercase().contains("doi"))
        .find_map(|l| find_doi(l));

    from_lines
        .or_else(|| find_doi(full_text))
        .map(|doi| format!("https://doi.org/{}", doi))
}
