use tracing::debug;

use super::normalizer::normalize_body;

const STOP_HEADINGS: &[&str] = &["keywords", "key words", "introduction", "background", "1."];
const WINDOW_STOP_WORDS: &[&str] = &["introduction", "keywords", "1.", "method"];
const WINDOW_LINES: usize = 20;

/// 摘要长度限制（字符数，两端都不含）
#[derive(Debug, Clone, Copy)]
pub struct AbstractBounds {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl AbstractBounds {
    fn accepts(&self, text: &str) -> bool {
        let len = text.chars().count();
        len > self.min_chars && len < self.max_chars
    }
}

fn is_stop_heading(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    STOP_HEADINGS.iter().any(|h| lower.starts_with(h))
}

/// 行首的标题词，返回标题之后同一行剩下的内容
fn strip_heading<'a>(line: &'a str, heading: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    let head = trimmed.get(..heading.len())?;
    if !head.eq_ignore_ascii_case(heading) {
        return None;
    }
    let rest = &trimmed[heading.len()..];
    // 标题词后必须是分隔符或行尾，避免匹配到 "Abstracts"/"Summarywise"
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c == ':' || c == '.' || c.is_whitespace() || c == '—' || c == '-' => {
            Some(rest.trim_start_matches([':', '.', '—', '-']).trim())
        }
        Some(_) => None,
    }
}

/// 从标题行开始收集，直到下一个章节标题
fn capture_section(lines: &[&str], heading: &str, inline: bool) -> Option<String> {
    for (i, line) in lines.iter().enumerate() {
        let Some(rest) = strip_heading(line, heading) else {
            continue;
        };
        if inline == rest.is_empty() {
            continue;
        }

        let mut body = String::from(rest);
        for next in &lines[i + 1..] {
            if is_stop_heading(next) {
                break;
            }
            body.push('\n');
            body.push_str(next);
        }
        return Some(body);
    }
    None
}

/// 行窗口兜底：第一个含 "abstract" 的行之后最多20行
fn window_after_mention(lines: &[&str]) -> String {
    let Some(start) = lines.iter().position(|l| l.to_lowercase().contains("abstract")) else {
        return String::new();
    };

    let mut collected: Vec<&str> = Vec::new();
    for line in lines.iter().skip(start + 1).take(WINDOW_LINES) {
        let lower = line.to_lowercase();
        if WINDOW_STOP_WORDS.iter().any(|w| lower.contains(w)) {
            break;
        }
        collected.push(line);
    }
    normalize_body(&collected.join("\n"))
}

/// 提取摘要
///
/// 依次尝试：独立成行的 Abstract 标题、行内 "Abstract:"、Summary 标题；
/// 结果须在长度区间内。都不合格时退回行窗口，仍为空则返回 `None`。
pub fn extract_abstract(text: &str, bounds: AbstractBounds) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();

    let attempts = [("abstract", false), ("abstract", true), ("summary", false)];
    for (heading, inline) in attempts {
        if let Some(raw) = capture_section(&lines, heading, inline) {
            let candidate = normalize_body(&raw);
            if bounds.accepts(&candidate) {
                debug!("摘要来自 {} 标题 ({} 字符)", heading, candidate.chars().count());
                return Some(candidate);
            }
            debug!("{} 段落长度不合格: {} 字符", heading, candidate.chars().count());
        }
    }

    let window = window_after_mention(&lines);
    if window.is_empty() {
        None
    } else {
        debug!("摘要来自行窗口 ({} 字符)", window.chars().count());
        Some(window)
    }
}
