use once_cell::sync::Lazy;
use regex::Regex;

use crate::storage::models::PublicationRecord;
use crate::utils::{FolioError, FolioResult};

static PUNCT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// 去重检查：保证每个源文件至多提取一次、每条记录至多增强一次
pub struct DuplicateGuard;

impl DuplicateGuard {
    /// 目录中是否已有 `pdf_file` 完全相同的记录（不做任何规范化）
    pub fn is_already_extracted(filename: &str, catalog: &[PublicationRecord]) -> bool {
        catalog
            .iter()
            .any(|record| record.pdf_file.as_deref() == Some(filename))
    }

    /// en/ko/fr 三种摘要与 enhanced_at 均非空
    pub fn is_already_enhanced(record: &PublicationRecord) -> bool {
        let summary_complete = record
            .summary
            .as_ref()
            .map(|s| s.is_complete())
            .unwrap_or(false);
        let stamped = record
            .enhanced_at
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        summary_complete && stamped
    }

    /// 标题+期刊规范化后完全相同即视为已存在；用于没有文件名的来源
    pub fn title_already_exists(
        title: &str,
        journal: &str,
        catalog: &[PublicationRecord],
    ) -> bool {
        let key = (normalize_key(title), normalize_key(journal));
        catalog
            .iter()
            .any(|record| (normalize_key(&record.title), normalize_key(&record.journal)) == key)
    }

    /// 调用外部生成服务之前的最后一道检查。已增强的记录再次进入增强流程属于
    /// 程序或数据错误，返回 `AlreadyEnhanced`，由调用方终止整个运行。
    pub fn assert_not_enhanced(record: &PublicationRecord) -> FolioResult<()> {
        if Self::is_already_enhanced(record) {
            return Err(FolioError::AlreadyEnhanced(record.label().to_string()));
        }
        Ok(())
    }
}

/// 小写、去标点、折叠空白
pub fn normalize_key(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = PUNCT_RE.replace_all(lower.trim(), "");
    WS_RE.replace_all(&stripped, " ").trim().to_string()
}
