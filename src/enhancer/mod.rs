pub mod client;
pub mod fallback;
pub mod prompts;

pub use client::{CompletionRequest, LlmClient, TextGenerator};

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::parser::date::{self, YearRange};
use crate::parser::normalizer::{has_replacement_corruption, repair_cjk, strip_translation_preamble};
use crate::parser::ExtractedDocument;
use crate::storage::models::{Language, PublicationRecord, Summary, SummarySource};
use crate::storage::DuplicateGuard;
use crate::utils::{preview, FolioError, FolioResult};

const DATE_CONTEXT_LINES: usize = 15;

/// 一次增强的结果
#[derive(Debug, Clone)]
pub struct Enhancement {
    pub summary: Summary,
    pub source: SummarySource,
}

/// 生成服务复核后的元数据，字段为空表示不采纳
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetadataRefinement {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default, rename = "publicationDate")]
    pub publication_date: Option<String>,
}

/// 摘要增强
///
/// 英文摘要 → 韩文翻译与修复 → 法文翻译与润色。每一步失败都有兜底，
/// 只有对已增强记录的重复调用会作为错误返回。
pub struct Enhancer {
    generator: Option<Box<dyn TextGenerator>>,
    config: LlmConfig,
    last_call: Option<Instant>,
}

impl Enhancer {
    pub fn new(generator: Option<Box<dyn TextGenerator>>, config: LlmConfig) -> Self {
        Self {
            generator,
            config,
            last_call: None,
        }
    }

    /// 按配置探测服务商；没有可用服务时所有记录走模板摘要
    pub fn from_config(config: &LlmConfig) -> FolioResult<Self> {
        let generator = LlmClient::from_config(config)?.map(|c| Box::new(c) as Box<dyn TextGenerator>);
        Ok(Self::new(generator, config.clone()))
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    pub fn refine_enabled(&self) -> bool {
        self.config.refine_metadata && self.is_available()
    }

    /// 两次外部调用之间至少间隔 cooldown_ms
    async fn cooldown(&self) {
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < cooldown {
                tokio::time::sleep(cooldown - elapsed).await;
            }
        }
    }

    async fn generate(&mut self, request: &CompletionRequest) -> FolioResult<String> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| FolioError::LlmError("没有可用的文本生成服务".to_string()))?;
        self.cooldown().await;
        debug!("调用 {}: max_tokens={}", generator.name(), request.max_tokens);
        let result = generator.complete(request).await;
        self.last_call = Some(Instant::now());
        result.map(|text| text.trim().to_string())
    }

    /// 生成三语摘要
    pub async fn enhance(
        &mut self,
        record: &PublicationRecord,
        document: Option<&ExtractedDocument>,
    ) -> FolioResult<Enhancement> {
        DuplicateGuard::assert_not_enhanced(record)?;

        if !self.is_available() {
            return Ok(Self::fallback(record));
        }

        let request = match document {
            Some(doc) => prompts::abstract_from_document(doc),
            None => prompts::abstract_from_record(record),
        };
        let english = match self.generate(&request).await {
            Ok(text) => text.trim_matches('"').trim().to_string(),
            Err(e) => {
                warn!("英文摘要生成失败 {}: {}，使用模板摘要", record.label(), e);
                return Ok(Self::fallback(record));
            }
        };
        if english.is_empty() {
            warn!("英文摘要为空 {}，使用模板摘要", record.label());
            return Ok(Self::fallback(record));
        }
        debug!("英文摘要: {}", preview(&english, 80));

        let korean = match self.korean(&english).await {
            Ok(text) => text,
            Err(e) => {
                warn!("韩文翻译失败 {}: {}", record.label(), e);
                fallback::labelled_copy(&english, Language::Ko)
            }
        };
        let french = match self.french(&english).await {
            Ok(text) => text,
            Err(e) => {
                warn!("法文翻译失败 {}: {}", record.label(), e);
                fallback::labelled_copy(&english, Language::Fr)
            }
        };

        Ok(Enhancement {
            summary: Summary {
                en: Some(english),
                ko: Some(korean),
                fr: Some(french),
            },
            source: SummarySource::Llm,
        })
    }

    /// 增强并写回记录：summary、summary_source、enhanced_at
    pub async fn enhance_record(
        &mut self,
        record: &mut PublicationRecord,
        document: Option<&ExtractedDocument>,
    ) -> FolioResult<SummarySource> {
        let enhancement = self.enhance(record, document).await?;
        record.summary = Some(enhancement.summary);
        record.summary_source = Some(enhancement.source);
        record.enhanced_at = Some(chrono::Utc::now().to_rfc3339());
        info!("✅ 增强完成: {} ({:?})", record.label(), enhancement.source);
        Ok(enhancement.source)
    }

    /// 已有英文摘要时保留原文，只有没有英文时才用模板
    fn fallback(record: &PublicationRecord) -> Enhancement {
        let summary = match record.english_summary().map(str::trim) {
            Some(en) if !en.is_empty() => fallback::summary_from_english(en),
            _ => fallback::fallback_summary(&record.title),
        };
        Enhancement {
            summary,
            source: SummarySource::Fallback,
        }
    }

    async fn korean(&mut self, english: &str) -> FolioResult<String> {
        let raw = self.generate(&prompts::translate(english, Language::Ko)).await?;
        let mut korean = strip_translation_preamble(&raw, Language::Ko);

        for pass in 0..self.config.korean_repair_passes {
            match self.generate(&prompts::repair_korean(&korean)).await {
                Ok(text) => {
                    let repaired = strip_translation_preamble(&text, Language::Ko);
                    if !repaired.is_empty() {
                        korean = repaired;
                    }
                }
                Err(e) => {
                    warn!("韩文修复第 {} 轮失败: {}", pass + 1, e);
                    break;
                }
            }
        }

        let korean = repair_cjk(&korean, Language::Ko);
        if korean.is_empty() {
            return Err(FolioError::LlmError("韩文翻译为空".to_string()));
        }
        if has_replacement_corruption(&korean) {
            return Err(FolioError::LlmError("韩文译文仍含损坏字符".to_string()));
        }
        Ok(korean)
    }

    async fn french(&mut self, english: &str) -> FolioResult<String> {
        let raw = self.generate(&prompts::translate(english, Language::Fr)).await?;
        let mut french = strip_translation_preamble(&raw, Language::Fr);

        for pass in 0..self.config.french_polish_passes {
            match self.generate(&prompts::polish_french(&french)).await {
                Ok(text) => {
                    let polished = strip_translation_preamble(&text, Language::Fr);
                    if !polished.is_empty() {
                        french = polished;
                    }
                }
                Err(e) => {
                    warn!("法文润色第 {} 轮失败: {}", pass + 1, e);
                    break;
                }
            }
        }

        if french.is_empty() {
            return Err(FolioError::LlmError("法文翻译为空".to_string()));
        }
        Ok(french)
    }

    /// 让生成服务复核标题、期刊、日期；任何失败都返回 `None`
    pub async fn refine_metadata(
        &mut self,
        doc: &ExtractedDocument,
        range: YearRange,
    ) -> Option<MetadataRefinement> {
        let date_lines = date::date_context_lines(&doc.full_text, DATE_CONTEXT_LINES);
        let request = prompts::refine_metadata(doc, &date_lines);
        let response = match self.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("元数据复核失败: {}", e);
                return None;
            }
        };
        parse_refinement(&response, range)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
}

/// 解析返回的 JSON（允许外面包着代码块或说明文字）；日期必须能规范化
pub fn parse_refinement(response: &str, range: YearRange) -> Option<MetadataRefinement> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    let parsed: MetadataRefinement = match serde_json::from_str(&response[start..=end]) {
        Ok(v) => v,
        Err(e) => {
            warn!("元数据复核结果不是合法 JSON: {}", e);
            return None;
        }
    };

    Some(MetadataRefinement {
        title: non_empty(parsed.title),
        journal: non_empty(parsed.journal),
        publication_date: non_empty(parsed.publication_date)
            .and_then(|d| date::normalize_date_value(&d, range)),
    })
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::*;
    use super::*;

    fn record() -> PublicationRecord {
        PublicationRecord::new("Optimal control of measles", "PLOS ONE", "2021", "https://example.org")
    }

    #[tokio::test]
    async fn full_enhancement_uses_every_pass() {
        let (generator, calls) = ScriptedGenerator::new();
        let mut enhancer = Enhancer::new(Some(Box::new(generator)), test_llm_config());

        let mut rec = record();
        let source = enhancer.enhance_record(&mut rec, None).await.unwrap();

        assert_eq!(source, SummarySource::Llm);
        // 英文 1 + 韩文 1+2 + 法文 1+1
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        let summary = rec.summary.as_ref().unwrap();
        assert_eq!(summary.en.as_deref(), Some("We built a model."));
        assert_eq!(summary.ko.as_deref(), Some("모델을 구축했다."));
        assert_eq!(summary.fr.as_deref(), Some("Nous avons construit un modèle."));
        assert!(rec.enhanced_at.is_some());
        assert!(DuplicateGuard::is_already_enhanced(&rec));
    }

    #[tokio::test]
    async fn already_enhanced_record_is_rejected_without_calls() {
        let (generator, calls) = ScriptedGenerator::new();
        let mut enhancer = Enhancer::new(Some(Box::new(generator)), test_llm_config());

        let mut rec = record();
        rec.summary = Some(fallback::summary_from_english("Done."));
        rec.enhanced_at = Some("2024-01-01T00:00:00Z".to_string());

        let err = enhancer.enhance(&rec, None).await.unwrap_err();
        assert!(matches!(err, FolioError::AlreadyEnhanced(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn english_failure_falls_back_to_template() {
        let (mut generator, calls) = ScriptedGenerator::new();
        generator.fail_english = true;
        let mut enhancer = Enhancer::new(Some(Box::new(generator)), test_llm_config());

        let mut rec = record();
        let source = enhancer.enhance_record(&mut rec, None).await.unwrap();

        assert_eq!(source, SummarySource::Fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rec.summary_source, Some(SummarySource::Fallback));
        assert!(rec.enhanced_at.is_some());
        let en = rec.english_summary().unwrap();
        assert!(en.contains("control theory"));
    }

    #[tokio::test]
    async fn corrupted_korean_uses_labelled_copy() {
        let (mut generator, _calls) = ScriptedGenerator::new();
        generator.korean = "알 수 없는 \u{FFFD}\u{FFFD} 결과".to_string();
        let mut enhancer = Enhancer::new(Some(Box::new(generator)), test_llm_config());

        let outcome = enhancer.enhance(&record(), None).await.unwrap();
        assert_eq!(outcome.source, SummarySource::Llm);
        assert_eq!(outcome.summary.ko.as_deref(), Some("[한국어] We built a model."));
        assert_eq!(outcome.summary.fr.as_deref(), Some("Nous avons construit un modèle."));
    }

    #[tokio::test]
    async fn no_provider_means_fallback() {
        let mut enhancer = Enhancer::new(None, test_llm_config());
        assert!(!enhancer.is_available());
        let outcome = enhancer.enhance(&record(), None).await.unwrap();
        assert_eq!(outcome.source, SummarySource::Fallback);
        assert!(outcome.summary.is_complete());
    }

    #[tokio::test]
    async fn cooldown_spaces_out_calls() {
        let (generator, _calls) = ScriptedGenerator::new();
        let mut config = test_llm_config();
        config.cooldown_ms = 30;
        config.korean_repair_passes = 0;
        config.french_polish_passes = 0;
        let mut enhancer = Enhancer::new(Some(Box::new(generator)), config);

        let started = Instant::now();
        enhancer.enhance(&record(), None).await.unwrap();
        // 三次调用之间有两次等待
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn refinement_parsing_accepts_fenced_json() {
        let range = YearRange { min: 1950, max: 2030 };
        let response = "Here you go:\n```json\n{\"title\": \" Better title \", \"journal\": \"\", \"publicationDate\": \"July 2021\"}\n```";
        let refined = parse_refinement(response, range).unwrap();
        assert_eq!(refined.title.as_deref(), Some("Better title"));
        assert_eq!(refined.journal, None);
        assert_eq!(refined.publication_date.as_deref(), Some("2021-07"));

        let bad_date = "{\"title\": \"T\", \"publicationDate\": \"sometime\"}";
        assert_eq!(parse_refinement(bad_date, range).unwrap().publication_date, None);
        assert!(parse_refinement("no json here", range).is_none());
    }
}
