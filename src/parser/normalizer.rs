//! PDF文本清洗
//!
//! 某些排版方式导出的文本会把每个字母用空格隔开（`e s t i m a t i n g`），
//! 或把相邻单词粘在一起（`effectof`）；翻译结果里偶尔出现 U+FFFD 占位符。
//! 这里的函数全部是纯函数，任何输入都不会 panic，最差情况原样返回。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::storage::models::Language;

const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// 领域内反复出现、被拆成单字母的词。宁可继续补充，也不追求覆盖所有单词。
const SPACED_TERMS: &[&str] = &[
    "contents", "lists", "available", "science", "direct", "mathematics",
    "computers", "simulation", "estimating", "basic", "reproductive",
    "varicella", "korea", "incorporating", "social", "contact", "patterns",
    "seroprevalence", "effectiveness", "effect", "control", "measures",
    "transmission", "mathematical", "model", "tertiary", "hospital",
    "assessment", "intervention", "strategies", "prediction", "universal",
    "rotavirus", "vaccination", "impact", "incidence", "herpes", "zoster",
    "using", "changing", "population", "demographics",
];

/// 粘连词修复：(模式, 规范写法)
const CONCATENATION_REPAIRS: &[(&str, &str)] = &[
    ("effectof", "effect of"),
    ("modelof", "model of"),
    ("impactof", "impact of"),
    ("analysisof", "analysis of"),
    ("studyof", "study of"),
    ("transmissionin", "transmission in"),
    ("vaccinationon", "vaccination on"),
    ("measureson", "measures on"),
    ("controlmeasures", "control measures"),
    ("hospitaland", "hospital and"),
    ("tertiaryhospital", "tertiary hospital"),
    ("southkorea", "South Korea"),
    ("varicellaand", "varicella and"),
    ("zosterincidence", "zoster incidence"),
    ("mathematicalmodel", "mathematical model"),
];

/// 韩文翻译中已知的损坏片段
const KOREAN_REPAIRS: &[(&str, &str)] = &[
    (r"조건\x{FFFD}+", "조건을"),
    (r"유지\x{FFFD}+는", "유지하는"),
    (r"상급종합병원\x{FFFD}+", "상급종합병원을"),
    (r"데이터를 \x{FFFD}+용하여", "데이터를 사용하여"),
    (r"종\x{FFFD}+-바이러스", "종양-바이러스"),
];

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SPACED_TERM_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    SPACED_TERMS
        .iter()
        .map(|term| {
            let letters: Vec<String> = term.chars().map(|c| c.to_string()).collect();
            let pattern = format!(r"(?i)\b{}\b", letters.join(r"\s+"));
            (Regex::new(&pattern).unwrap(), *term)
        })
        .collect()
});

static CONCATENATION_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    CONCATENATION_REPAIRS
        .iter()
        .map(|(pattern, fixed)| {
            (Regex::new(&format!(r"(?i)\b{}\b", pattern)).unwrap(), *fixed)
        })
        .collect()
});

static KOREAN_REPAIR_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    KOREAN_REPAIRS
        .iter()
        .map(|(pattern, fixed)| (Regex::new(pattern).unwrap(), *fixed))
        .collect()
});

static TRAILING_PIPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\|\s*$").unwrap());
static TRAILING_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d{4}\)\s*$").unwrap());
static TRAILING_PERIOD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\.\s*$").unwrap());
static SCIENCEDIRECT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^contents\s+lists\s+available\s+at\s+science\s*direct\s*").unwrap()
});
static HYPHEN_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Ll})-[ \t]*\r?\n\s*(\p{Ll})").unwrap());

static PREAMBLE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*(?:enhanced\s+|improved\s+)?(?:korean|french|english)\s+translation\s*:\s*",
        r"^\s*다음은[^\n]*?(?:번역|개선)[^\n]*?(?:입니다|이다)\s*[.:：]?\s*",
        r"(?i)^\s*voici\s+[^\n]*?:\s*",
        r"(?i)^\s*traduction\s+fran[cç]aise\s*:\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// 内部空白折叠为单个空格并去掉首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

/// 展开PDF中常见的排版连字
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// 把连续的单字符 token 合并为一个词
///
/// `"e s t i m a t i n g"` → `"estimating"`。长度为1的孤立 token（如 "a"）保持不变。
pub fn collapse_single_char_runs(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut fixed: Vec<String> = Vec::with_capacity(tokens.len());

    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].chars().count() != 1 {
            fixed.push(tokens[i].to_string());
            i += 1;
            continue;
        }

        let mut j = i;
        let mut combined = String::new();
        while j < tokens.len() && tokens[j].chars().count() == 1 {
            combined.push_str(tokens[j]);
            j += 1;
        }
        fixed.push(combined);
        i = j;
    }

    fixed.join(" ")
}

/// 应用已知短语修复表（被拆开的领域术语、粘连词）
pub fn repair_known_phrases(text: &str) -> String {
    let mut out = text.to_string();
    for (re, term) in SPACED_TERM_RES.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *term).into_owned();
        }
    }
    out = collapse_single_char_runs(&out);
    for (re, fixed) in CONCATENATION_RES.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *fixed).into_owned();
        }
    }
    out
}

fn drop_repeated_words(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for token in text.split(' ') {
        if let Some(prev) = kept.last() {
            let is_word = token.chars().all(char::is_alphabetic) && !token.is_empty();
            if is_word && prev.eq_ignore_ascii_case(token) {
                continue;
            }
        }
        kept.push(token);
    }
    kept.join(" ")
}

fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 标题清洗：空白、连字、拆字修复、尾部噪声、重复词、首字母大写
pub fn normalize_title(raw: &str) -> String {
    let mut title = collapse_whitespace(&expand_ligatures(raw));
    title = repair_known_phrases(&title);

    title = SCIENCEDIRECT_PREFIX_RE.replace(&title, "").into_owned();
    title = TRAILING_PIPE_RE.replace(&title, "").into_owned();
    title = TRAILING_YEAR_RE.replace(&title, "").into_owned();
    title = TRAILING_PERIOD_RE.replace(&title, "").into_owned();

    title = drop_repeated_words(&collapse_whitespace(&title));
    capitalize_first(&title)
}

/// 正文清洗：连字、换行断词、空白
pub fn normalize_body(raw: &str) -> String {
    let text = expand_ligatures(raw);
    let text = HYPHEN_BREAK_RE.replace_all(&text, "$1$2");
    collapse_whitespace(&text)
}

/// 文本中是否残留 U+FFFD
pub fn has_replacement_corruption(text: &str) -> bool {
    text.contains(REPLACEMENT_CHAR)
}

/// 修复韩文中已知的 U+FFFD 损坏片段；其他语言原样返回
pub fn repair_cjk(text: &str, lang: Language) -> String {
    if lang != Language::Ko || !has_replacement_corruption(text) {
        return text.to_string();
    }
    let mut out = text.to_string();
    for (re, fixed) in KOREAN_REPAIR_RES.iter() {
        out = re.replace_all(&out, *fixed).into_owned();
    }
    out
}

/// 去掉生成服务常加的开场白（"Korean translation:"、"다음은 ... 번역한 결과입니다" 等）
pub fn strip_translation_preamble(text: &str, lang: Language) -> String {
    let mut out = text.trim().to_string();
    if lang == Language::En {
        return out;
    }
    for _ in 0..3 {
        let before = out.len();
        for re in PREAMBLE_RES.iter() {
            out = re.replace(&out, "").trim().to_string();
        }
        if out.len() == before {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_fully_spaced_word() {
        assert_eq!(collapse_single_char_runs("e s t i m a t i n g"), "estimating");
    }

    #[test]
    fn multi_char_title_passes_through() {
        let title = "Impact of vaccination on a changing population";
        assert_eq!(collapse_single_char_runs(title), title);
        assert_eq!(normalize_title(title), title);
    }

    #[test]
    fn collapses_runs_between_normal_words() {
        assert_eq!(
            collapse_single_char_runs("Modeling  v a r i c e l l a in Korea"),
            "Modeling varicella in Korea"
        );
    }

    #[test]
    fn spaced_terms_keep_word_boundaries() {
        let fixed = repair_known_phrases("e s t i m a t i n g t h e b a s i c r e p r o d u c t i v e number");
        assert_eq!(fixed, "estimating the basic reproductive number");
    }

    #[test]
    fn concatenation_repairs_apply() {
        assert_eq!(
            normalize_title("The effectof control measures in SouthKorea"),
            "The effect of control measures in South Korea"
        );
    }

    #[test]
    fn title_noise_is_trimmed() {
        assert_eq!(
            normalize_title("optimal control of oncolytic virus therapy (2023) |"),
            "Optimal control of oncolytic virus therapy"
        );
        assert_eq!(normalize_title("A model model of measles."), "A model of measles");
    }

    #[test]
    fn ligatures_and_hyphen_breaks_are_joined() {
        assert_eq!(
            normalize_body("The eﬀect of detec-\ntion   on ﬁnal size"),
            "The effect of detection on final size"
        );
    }

    #[test]
    fn korean_replacement_fragments_are_repaired() {
        let corrupted = "조건\u{FFFD}\u{FFFD}\u{FFFD} 유지\u{FFFD}\u{FFFD}는 종\u{FFFD}-바이러스";
        assert!(has_replacement_corruption(corrupted));
        let fixed = repair_cjk(corrupted, Language::Ko);
        assert_eq!(fixed, "조건을 유지하는 종양-바이러스");
        assert!(!has_replacement_corruption(&fixed));
    }

    #[test]
    fn non_korean_text_is_left_alone() {
        let text = "r\u{FFFD}sum\u{FFFD}";
        assert_eq!(repair_cjk(text, Language::Fr), text);
    }

    #[test]
    fn translation_preambles_are_removed() {
        assert_eq!(
            strip_translation_preamble("Korean translation:\n집단면역을 분석했다.", Language::Ko),
            "집단면역을 분석했다."
        );
        assert_eq!(
            strip_translation_preamble("다음은 개선된 한국어 번역문입니다:\n결과를 보였다.", Language::Ko),
            "결과를 보였다."
        );
        assert_eq!(
            strip_translation_preamble("Traduction française : Nous avons montré.", Language::Fr),
            "Nous avons montré."
        );
    }

    #[test]
    fn empty_input_is_safe() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_body("   "), "");
        assert_eq!(collapse_single_char_runs(""), "");
    }
}
