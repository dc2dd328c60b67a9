use crate::parser::ExtractedDocument;
use crate::storage::models::{Language, PublicationRecord};

use super::client::CompletionRequest;

const ABSTRACT_SYSTEM: &str = "You are a factual academic abstract writer.";
const KOREAN_SYSTEM: &str = "You are a Korean academic writing specialist focused on quality improvement.";
const FRENCH_SYSTEM: &str = "You are a French academic editor.";
const METADATA_SYSTEM: &str = "You extract bibliographic metadata and answer with JSON only.";

const HEAD_CHARS: usize = 2000;
const TAIL_CHARS: usize = 1000;
const CORRECTION_CHARS: usize = 500;

fn head(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(max_chars)).collect()
}

/// 由PDF提取结果生成英文摘要
pub fn abstract_from_document(doc: &ExtractedDocument) -> CompletionRequest {
    let evidence = &doc.evidence;
    let findings = if evidence.statistical_findings.is_empty() {
        "None found".to_string()
    } else {
        evidence.statistical_findings.join(", ")
    };
    let tables = if evidence.table_results.is_empty() {
        "None found".to_string()
    } else {
        evidence.table_results.join("; ")
    };
    let correction = doc
        .correction_text
        .as_deref()
        .map(|c| format!("\nPublished correction (takes precedence where it conflicts):\n\"{}\"\n", head(c, CORRECTION_CHARS)))
        .unwrap_or_default();

    let prompt = format!(
        "Write an abstract of 90-120 words for the paper below.\n\n\
         Title: \"{title}\"\n\
         Original abstract: \"{original}\"\n\
         Quantitative results: \"{quantitative}\"\n\
         Statistical findings: {findings}\n\
         Table results: {tables}\n\
         {correction}\n\
         Context:\n\"{context}\"\n\n\
         Lead with the methodological novelty or the least obvious finding, group related numbers \
         instead of listing them, do not repeat the title, and finish with the practical significance. \
         Return only the abstract text.",
        title = doc.title,
        original = doc.abstract_text.as_deref().unwrap_or(""),
        quantitative = if evidence.quantitative_results.is_empty() {
            "None found"
        } else {
            evidence.quantitative_results.as_str()
        },
        findings = findings,
        tables = tables,
        correction = correction,
        context = head(&doc.context, 1500),
    );

    CompletionRequest {
        system: Some(ABSTRACT_SYSTEM.to_string()),
        prompt,
        max_tokens: 250,
        temperature: 0.3,
    }
}

/// 只有标题（和可能已有的英文摘要）时生成英文摘要
pub fn abstract_from_record(record: &PublicationRecord) -> CompletionRequest {
    let current = record.english_summary().unwrap_or("");
    let prompt = format!(
        "Write a concise academic abstract (75-100 words) for the paper titled \"{title}\" \
         published in {journal}.\n\
         Current abstract, may be empty or incomplete: \"{current}\"\n\n\
         State what was studied, how, and what was found. Be direct, avoid hype, and do not invent \
         numbers that are not in the current abstract. Return only the abstract text.",
        title = record.title,
        journal = record.journal,
        current = current,
    );

    CompletionRequest {
        system: Some(ABSTRACT_SYSTEM.to_string()),
        prompt,
        max_tokens: 250,
        temperature: 0.5,
    }
}

/// 英文摘要译为目标语言
pub fn translate(abstract_en: &str, target: Language) -> CompletionRequest {
    let rules = match target {
        Language::Ko => {
            "- Keep COVID-19, SEIR, R0 and proper names in English\n\
             - basic reproductive number → 기본재생산지수, herd immunity → 집단면역, optimal control → 최적제어\n\
             - Use the plain written style (~했다, ~한다, ~이다), not ~합니다\n"
        }
        Language::Fr => {
            "- Keep COVID-19, SEIR, R0 and proper names in English\n\
             - basic reproductive number → nombre de reproduction de base, herd immunity → immunité collective\n\
             - Use natural French academic style and proper mathematical terminology\n"
        }
        Language::En => "",
    };

    let prompt = format!(
        "Translate this academic abstract to {language}.\n\n\
         <source_text>\n{text}\n</source_text>\n\n\
         Rules:\n{rules}\
         - Keep every number exactly as written\n\
         - Translate the complete text, do not cut it off\n\
         - No introduction or label before the translation; return only the translated abstract",
        language = target.english_name(),
        text = abstract_en,
        rules = rules,
    );

    CompletionRequest {
        system: None,
        prompt,
        max_tokens: 600,
        temperature: 0.3,
    }
}

/// 韩文修复：去掉 U+FFFD 残片和开场白，改善翻译腔
pub fn repair_korean(korean: &str) -> CompletionRequest {
    let prompt = format!(
        "Fix broken characters and improve this Korean academic text.\n\n\
         <source_text>\n{text}\n</source_text>\n\n\
         - Every U+FFFD (�) must be replaced with the correct Korean syllables, for example \
         조건� → 조건을, 유지�는 → 유지하는, 데이터를 �용하여 → 데이터를 사용하여\n\
         - Remove introductions such as \"다음은 ... 번역한 결과입니다\" or \"Korean translation:\"\n\
         - Use the plain written style (~했다, ~한다, ~이다) and natural academic wording\n\
         - Keep all numbers exactly as written\n\
         Return only the corrected Korean text.",
        text = korean,
    );

    CompletionRequest {
        system: Some(KOREAN_SYSTEM.to_string()),
        prompt,
        max_tokens: 600,
        temperature: 0.3,
    }
}

/// 法文润色：去掉 "Voici la traduction…" 之类的开场白
pub fn polish_french(french: &str) -> CompletionRequest {
    let prompt = format!(
        "Clean up this French academic abstract.\n\n\
         <source_text>\n{text}\n</source_text>\n\n\
         - Remove any introduction or header such as \"Voici la traduction française\" or \"Traduction française :\"\n\
         - Keep numbers and percentages exactly as written\n\
         - Fix grammar and flow without changing the meaning\n\
         Return only the French abstract.",
        text = french,
    );

    CompletionRequest {
        system: Some(FRENCH_SYSTEM.to_string()),
        prompt,
        max_tokens: 600,
        temperature: 0.3,
    }
}

/// 让生成服务复核标题、期刊、日期，要求返回 JSON
pub fn refine_metadata(doc: &ExtractedDocument, date_lines: &[String]) -> CompletionRequest {
    let prompt = format!(
        "Extract the correct title, journal name and publication date of this paper.\n\n\
         First page:\n\"{first_page}\"\n\n\
         Date-related lines found in the document:\n{date_lines}\n\n\
         End of the document:\n\"{last_part}\"\n\n\
         Current guesses: title \"{title}\", journal \"{journal}\", date \"{date}\".\n\n\
         Fix spacing problems in the title and give the full journal name. For the date use this \
         priority: published online > available online > published > accepted. Never invent a \
         date; answer with \"YYYY-MM-DD\", \"YYYY-MM\" or \"YYYY\" depending on what is printed.\n\
         Answer with JSON only: {{\"title\": \"...\", \"journal\": \"...\", \"publicationDate\": \"...\"}}",
        first_page = head(&doc.full_text, HEAD_CHARS),
        date_lines = if date_lines.is_empty() {
            "(none)".to_string()
        } else {
            date_lines.join("\n")
        },
        last_part = tail(&doc.full_text, TAIL_CHARS),
        title = doc.title,
        journal = doc.journal,
        date = doc.date.value,
    );

    CompletionRequest {
        system: Some(METADATA_SYSTEM.to_string()),
        prompt,
        max_tokens: 300,
        temperature: 0.0,
    }
}
