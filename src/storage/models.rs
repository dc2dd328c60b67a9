use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 摘要语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Ko,
    Fr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Ko, Language::Fr];

    pub fn english_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ko => "Korean",
            Language::Fr => "French",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ko: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fr: Option<String>,
}

impl Summary {
    pub fn get(&self, lang: Language) -> Option<&str> {
        match lang {
            Language::En => self.en.as_deref(),
            Language::Ko => self.ko.as_deref(),
            Language::Fr => self.fr.as_deref(),
        }
    }

    /// 三种语言均非空
    pub fn is_complete(&self) -> bool {
        Language::ALL
            .iter()
            .all(|lang| self.get(*lang).map(|s| !s.trim().is_empty()).unwrap_or(false))
    }
}

/// 日期的三语展示文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedDate {
    pub en: String,
    pub ko: String,
    pub fr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Llm,
    Fallback,
}

/// 目录中的一条论文记录
///
/// 字段顺序即序列化顺序；未识别的键原样保留在 `extra` 中（按键名排序输出），
/// 这样引用数爬虫等外部协作者写入的字段不会在重写目录时丢失。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub date: String,
    pub title: String,
    pub journal: String,
    pub link: String,
    #[serde(default)]
    pub citations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_date: Option<FormattedDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_source: Option<SummarySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations_updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PublicationRecord {
    pub fn new(title: &str, journal: &str, date: &str, link: &str) -> Self {
        Self {
            date: date.to_string(),
            title: title.to_string(),
            journal: journal.to_string(),
            link: link.to_string(),
            citations: 0,
            summary: None,
            thumbnail: None,
            fetched_at: None,
            enhanced_at: None,
            pdf_file: None,
            formatted_date: None,
            summary_source: None,
            citations_updated_at: None,
            extra: Map::new(),
        }
    }

    /// 日志里用来指代这条记录
    pub fn label(&self) -> &str {
        self.pdf_file.as_deref().unwrap_or(&self.title)
    }

    pub fn english_summary(&self) -> Option<&str> {
        self.summary.as_ref().and_then(|s| s.en.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let raw = r#"{
            "date": "2021-07",
            "title": "Optimal control of measles",
            "journal": "PLOS ONE",
            "link": "https://doi.org/10.1371/journal.pone.0249262",
            "citations": 12,
            "summary": {"en": "We found..."},
            "pdf_file": "journal.pone.0249262.pdf",
            "custom_badge": "featured"
        }"#;
        let record: PublicationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.citations, 12);
        assert_eq!(record.extra.get("custom_badge"), Some(&Value::from("featured")));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["custom_badge"], "featured");
        assert!(json.get("enhanced_at").is_none());
    }

    #[test]
    fn missing_citations_default_to_zero() {
        let raw = r#"{"date": "2020", "title": "T", "journal": "J", "link": "./publications/t.pdf"}"#;
        let record: PublicationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.citations, 0);
        assert!(record.summary.is_none());
    }

    #[test]
    fn summary_completeness_requires_all_languages() {
        let mut summary = Summary {
            en: Some("abstract".into()),
            ko: Some("초록".into()),
            fr: None,
        };
        assert!(!summary.is_complete());
        summary.fr = Some("  ".into());
        assert!(!summary.is_complete());
        summary.fr = Some("résumé".into());
        assert!(summary.is_complete());
    }
}
