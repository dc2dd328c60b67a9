//! 批处理流程
//!
//! 每个PDF依次经过：发现 → 去重 → 提取 → (可选)元数据复核 → 增强。
//! 整批处理完成后只写一次目录文件；中途出现致命错误时目录保持上次保存的状态。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::PathsConfig;
use crate::enhancer::Enhancer;
use crate::parser::date::{self, YearRange};
use crate::parser::{DateSource, ExtractedDocument, FieldExtractor, PublicationDate, TextLoader};
use crate::storage::models::{PublicationRecord, SummarySource};
use crate::storage::{CatalogStore, DuplicateGuard};

/// 一次运行的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub discovered: usize,
    pub new_records: usize,
    pub skipped: usize,
    pub failed: usize,
    pub enhanced: usize,
    pub fallback: usize,
}

impl RunStats {
    fn count_source(&mut self, source: SummarySource) {
        match source {
            SummarySource::Llm => self.enhanced += 1,
            SummarySource::Fallback => self.fallback += 1,
        }
    }

    pub fn log_summary(&self) {
        info!("📊 处理结果:");
        info!("  发现PDF: {}", self.discovered);
        info!("  新增记录: {}", self.new_records);
        info!("  已存在跳过: {}", self.skipped);
        info!("  读取失败: {}", self.failed);
        info!("  生成摘要: {}", self.enhanced);
        info!("  模板摘要: {}", self.fallback);
    }
}

/// 目录概况，`status` 命令使用
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CatalogStatus {
    pub total: usize,
    pub from_pdf: usize,
    pub enhanced: usize,
    pub pending: usize,
    pub fallback: usize,
    pub placeholder_dates: usize,
    pub citations: u64,
}

impl CatalogStatus {
    pub fn of(records: &[PublicationRecord], placeholder_date: &str) -> Self {
        let mut status = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            if record.pdf_file.is_some() {
                status.from_pdf += 1;
            }
            if DuplicateGuard::is_already_enhanced(record) {
                status.enhanced += 1;
            } else {
                status.pending += 1;
            }
            if record.summary_source == Some(SummarySource::Fallback) {
                status.fallback += 1;
            }
            if record.date == placeholder_date {
                status.placeholder_dates += 1;
            }
            status.citations += record.citations;
        }
        status
    }
}

/// 批量导入的一项，例如外部抓取结果
#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem {
    pub title: String,
    pub journal: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub citations: Option<u64>,
}

pub struct PipelineDriver<L: TextLoader> {
    loader: L,
    extractor: FieldExtractor,
    enhancer: Enhancer,
    store: CatalogStore,
    paths: PathsConfig,
}

impl<L: TextLoader> PipelineDriver<L> {
    pub fn new(loader: L, extractor: FieldExtractor, enhancer: Enhancer, paths: PathsConfig) -> Self {
        let store = CatalogStore::new(&paths.catalog_path);
        Self {
            loader,
            extractor,
            enhancer,
            store,
            paths,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// 出版物目录下的PDF（不区分大小写），排除勘误文件，按文件名排序
    pub async fn discover(&self) -> Result<Vec<String>> {
        let dir = Path::new(&self.paths.publications_dir);
        if !dir.exists() {
            warn!("出版物目录不存在: {}", dir.display());
            return Ok(Vec::new());
        }

        let marker = &self.extractor.config().correction_marker;
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("无法读取目录 {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_pdf = Path::new(&name)
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if !is_pdf {
                continue;
            }
            if !marker.is_empty() && name.contains(marker.as_str()) {
                debug!("勘误文件不单独入库: {}", name);
                continue;
            }
            files.push(name);
        }
        files.sort();
        Ok(files)
    }

    fn pdf_path(&self, filename: &str) -> PathBuf {
        Path::new(&self.paths.publications_dir).join(filename)
    }

    fn correction_text(&self, filename: &str) -> Option<String> {
        let correction = self.extractor.venues().correction_for(filename)?;
        let path = self.pdf_path(correction);
        if !path.exists() {
            debug!("勘误文件不存在: {}", path.display());
            return None;
        }
        match self.loader.load_text(&path) {
            Ok(text) => {
                info!("📎 附带勘误: {}", correction);
                Some(text)
            }
            Err(e) => {
                warn!("勘误文件读取失败 {}: {}", correction, e);
                None
            }
        }
    }

    /// 提取并增强所有新PDF
    pub async fn run(&mut self) -> Result<RunStats> {
        let catalog = self.store.load()?;
        let files = self.discover().await?;
        let mut stats = RunStats {
            discovered: files.len(),
            ..RunStats::default()
        };
        info!("发现 {} 个PDF，目录已有 {} 条记录", files.len(), catalog.len());

        let mut fresh: Vec<PublicationRecord> = Vec::new();
        for filename in &files {
            if DuplicateGuard::is_already_extracted(filename, &catalog)
                || DuplicateGuard::is_already_extracted(filename, &fresh)
            {
                debug!("已提取，跳过: {}", filename);
                stats.skipped += 1;
                continue;
            }

            info!("📄 处理: {}", filename);
            let text = match self.loader.load_text(&self.pdf_path(filename)) {
                Ok(text) => text,
                Err(e) => {
                    warn!("❌ 无法读取 {}: {}", filename, e);
                    stats.failed += 1;
                    continue;
                }
            };
            let correction = self.correction_text(filename);
            let mut doc = self.extractor.extract(&text, filename, correction);

            if self.enhancer.refine_enabled() {
                self.refine(&mut doc).await;
            }

            if DuplicateGuard::title_already_exists(&doc.title, &doc.journal, &catalog)
                || DuplicateGuard::title_already_exists(&doc.title, &doc.journal, &fresh)
            {
                warn!("⚠️ 标题与期刊和已有记录相同，仍按文件名入库: {}", filename);
            }

            let mut record = self.build_record(&doc, filename);
            let source = self.enhancer.enhance_record(&mut record, Some(&doc)).await?;
            stats.count_source(source);
            fresh.push(record);
        }

        stats.new_records = fresh.len();
        if fresh.is_empty() {
            info!("没有新的PDF需要处理");
            return Ok(stats);
        }

        let merged = CatalogStore::merge(catalog, fresh);
        self.store.save(&merged)?;
        info!("💾 目录已保存: {} 条记录", merged.len());
        Ok(stats)
    }

    async fn refine(&mut self, doc: &mut ExtractedDocument) {
        let range = YearRange::from_config(self.extractor.config());
        let Some(refined) = self.enhancer.refine_metadata(doc, range).await else {
            return;
        };
        if let Some(title) = refined.title {
            debug!("复核标题: {:?} → {:?}", doc.title, title);
            doc.title = title;
        }
        if let Some(journal) = refined.journal {
            doc.journal = journal;
        }
        if let Some(value) = refined.publication_date {
            doc.date = PublicationDate {
                value,
                source: DateSource::Refined,
            };
        }
    }

    fn build_record(&self, doc: &ExtractedDocument, filename: &str) -> PublicationRecord {
        let prefix = self.paths.link_prefix.trim_end_matches('/');
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let link = doc
            .evidence
            .doi
            .clone()
            .unwrap_or_else(|| format!("{}/{}", prefix, filename));

        let mut record = PublicationRecord::new(&doc.title, &doc.journal, &doc.date.value, &link);
        record.thumbnail = Some(format!("{}/{}.{}", prefix, stem, self.paths.thumbnail_extension));
        record.fetched_at = Some(chrono::Utc::now().to_rfc3339());
        record.pdf_file = Some(filename.to_string());
        if !doc.date.is_placeholder() {
            record.formatted_date = date::format_display_date(&doc.date.value);
        }
        record
    }

    /// 为目录中尚未增强的记录补全摘要
    pub async fn enhance_catalog(&mut self) -> Result<RunStats> {
        let mut records = self.store.load()?;
        let mut stats = RunStats::default();

        for record in records.iter_mut() {
            if DuplicateGuard::is_already_enhanced(record) {
                stats.skipped += 1;
                continue;
            }
            info!("✨ 增强: {}", record.label());
            let source = self.enhancer.enhance_record(record, None).await?;
            stats.count_source(source);
        }

        if stats.enhanced + stats.fallback > 0 {
            self.store.save(&records)?;
            info!("💾 目录已保存: {} 条记录", records.len());
        } else {
            info!("所有记录均已增强");
        }
        Ok(stats)
    }

    /// 导入外部条目；标题+期刊已存在的跳过，其余作为未增强记录追加
    pub async fn import(&self, items: Vec<ImportItem>) -> Result<RunStats> {
        let catalog = self.store.load()?;
        let placeholder = &self.extractor.config().placeholder_date;
        let range = YearRange::from_config(self.extractor.config());
        let mut stats = RunStats {
            discovered: items.len(),
            ..RunStats::default()
        };

        let mut fresh: Vec<PublicationRecord> = Vec::new();
        for item in items {
            let title = item.title.trim();
            if title.is_empty() {
                stats.failed += 1;
                continue;
            }
            if DuplicateGuard::title_already_exists(title, &item.journal, &catalog)
                || DuplicateGuard::title_already_exists(title, &item.journal, &fresh)
            {
                debug!("已存在，跳过: {}", title);
                stats.skipped += 1;
                continue;
            }

            let parsed_date = item
                .date
                .as_deref()
                .and_then(|d| date::normalize_date_value(d, range));
            let date_value = parsed_date.clone().unwrap_or_else(|| placeholder.clone());
            let mut record = PublicationRecord::new(
                title,
                item.journal.trim(),
                &date_value,
                item.link.as_deref().unwrap_or(""),
            );
            record.citations = item.citations.unwrap_or(0);
            record.fetched_at = Some(chrono::Utc::now().to_rfc3339());
            if parsed_date.is_some() {
                record.formatted_date = date::format_display_date(&date_value);
            }
            fresh.push(record);
        }

        stats.new_records = fresh.len();
        if !fresh.is_empty() {
            let merged = CatalogStore::merge(catalog, fresh);
            self.store.save(&merged)?;
            info!("💾 导入完成，目录共 {} 条记录", merged.len());
        }
        Ok(stats)
    }
}
