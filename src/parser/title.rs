use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::normalizer::normalize_title;

/// 标题候选
#[derive(Debug, Clone)]
pub struct TitleCandidate {
    pub text: String,
    pub score: i32,
    pub position: usize,
}

const MIN_TITLE_CHARS: usize = 10;
const PAIR_SCAN_LINES: usize = 25;
const MARKER_SCAN_LINES: usize = 20;

static SKIP_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^doi:", r"^issn", r"^volume", r"^number", r"^page", r"^pp\.", r"^published",
        r"^received", r"^accepted", r"^available online", r"^contents lists", r"^sciencedirect",
        r"^https?://", r"^www\.", r"^©", r"^\d{4}", r"^\|", r"^research article",
        r"^original article", r"^article", r"^abstract", r"^keywords", r"^introduction",
        r"^methods", r"^author", r"^corresponding", r"^email", r"^affiliation", r"^department",
        r"^university", r"^college", r"^school", r"received.*accepted", r"accepted.*published",
        r"^\d{1,2}\s+\w+\s+\d{4}", r"contents.*available", r"science.*direct",
        r"mathematics.*computers",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

static CAPITALIZED_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z][a-z]").unwrap());

const PUBLISHER_NAMES: &[&str] = &[
    "mathematics and computers in simulation",
    "scientific reports",
    "human vaccines",
    "immunotherapeutics",
    "plos one",
    "chaos, solitons",
    "mathematical biosciences",
    "aimspress",
    "elsevier",
    "springer",
    "wiley",
    "nature",
    "science",
];

const METADATA_WORDS: &[&str] = &[
    "journal", "volume", "number", "page", "doi", "issn", "published", "received", "accepted",
    "available", "contents", "sciencedirect", "aims", "springer", "elsevier", "wiley",
];

const SECTION_MARKERS: &[&str] = &["research article", "original article", "article"];

const ACADEMIC_WORDS: &[&str] = &[
    "effect", "impact", "analysis", "study", "model", "evaluation", "assessment",
    "investigation", "research", "application", "method", "approach", "development",
    "implementation", "optimization", "control",
];

const DOMAIN_TERMS: &[&str] = &[
    "covid", "virus", "vaccination", "disease", "transmission", "mathematical", "statistical",
    "clinical", "epidemiological",
];

/// 标题打分
///
/// 越靠前分越高；长度、大写、学术词汇和领域词加分；像元数据或数字过多扣分。
pub fn score_title_candidate(text: &str, position: usize) -> i32 {
    let lower = text.to_lowercase();
    let len = text.chars().count();
    let mut score = (50 - 2 * position as i32).max(0);

    if (50..=150).contains(&len) {
        score += 20;
    }
    if (30..=200).contains(&len) {
        score += 10;
    }
    if text.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false) {
        score += 10;
    }
    if CAPITALIZED_WORD_RE.is_match(text) {
        score += 5;
    }

    score += 3 * ACADEMIC_WORDS.iter().filter(|w| lower.contains(*w)).count() as i32;
    score += 5 * DOMAIN_TERMS.iter().filter(|t| lower.contains(*t)).count() as i32;

    if ["journal", "volume", "doi", "issn"].iter().any(|w| lower.contains(w)) {
        score -= 30;
    }

    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    if digits as f64 > len as f64 * 0.3 {
        score -= 20;
    }

    score
}

/// 单行候选的过滤条件
fn is_title_like(line: &str) -> bool {
    let len = line.chars().count();
    if !(25..=300).contains(&len) {
        return false;
    }
    if SKIP_RES.iter().any(|re| re.is_match(line)) {
        return false;
    }

    let lower = line.to_lowercase();
    if PUBLISHER_NAMES.iter().any(|n| lower.contains(n)) {
        return false;
    }
    if METADATA_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }

    let letters = line.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if (letters as f64) < len as f64 * 0.6 {
        return false;
    }

    CAPITALIZED_WORD_RE.is_match(line)
        && line.split_whitespace().count() >= 4
        && !line.ends_with('.')
}

/// 按三种策略生成全部候选（生成顺序即平分时的优先顺序）
pub fn title_candidates(lines: &[&str], scan_lines: usize) -> Vec<TitleCandidate> {
    let mut candidates = Vec::new();

    // 1. 单行
    for (i, line) in lines.iter().take(scan_lines).enumerate() {
        if is_title_like(line) {
            candidates.push(TitleCandidate {
                text: line.to_string(),
                score: score_title_candidate(line, i),
                position: i,
            });
        }
    }

    // 2. 相邻两行拼接
    for i in 0..PAIR_SCAN_LINES.min(lines.len().saturating_sub(1)) {
        let (first, second) = (lines[i], lines[i + 1]);
        if first.chars().count() > 20
            && second.chars().count() > 20
            && !first.to_lowercase().contains("journal")
            && !second.to_lowercase().contains("journal")
        {
            let combined = format!("{} {}", first, second);
            let len = combined.chars().count();
            if len > 30 && len < 250 {
                let score = score_title_candidate(&combined, i) + 10;
                candidates.push(TitleCandidate { text: combined, score, position: i });
            }
        }
    }

    // 3. 文章类型标记之后的几行
    for i in 0..MARKER_SCAN_LINES.min(lines.len()) {
        let lower = lines[i].to_lowercase();
        if !SECTION_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }
        for (j, candidate) in lines.iter().enumerate().take((i + 5).min(lines.len())).skip(i + 1) {
            let len = candidate.chars().count();
            if len > 30 && len < 250 {
                candidates.push(TitleCandidate {
                    text: candidate.to_string(),
                    score: score_title_candidate(candidate, j) + 5,
                    position: j,
                });
            }
        }
    }

    candidates
}

/// 选出最高分候选并规范化；没有合格结果时返回文件名主干
pub fn extract_title(lines: &[&str], scan_lines: usize, filename_stem: &str) -> String {
    let candidates = title_candidates(lines, scan_lines);

    let mut best: Option<&TitleCandidate> = None;
    for candidate in &candidates {
        if best.map(|b| candidate.score > b.score).unwrap_or(true) {
            best = Some(candidate);
        }
    }

    if let Some(best) = best {
        debug!("标题候选 {} 个，最佳得分 {} (第 {} 行)", candidates.len(), best.score, best.position);
        let title = normalize_title(&best.text);
        if title.chars().count() >= MIN_TITLE_CHARS {
            return title;
        }
        debug!("规范化后的标题过短: {:?}", title);
    }

    filename_stem.to_string()
}
