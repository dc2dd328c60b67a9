use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::utils::{FolioError, FolioResult};

/// 读取一个文档的全文
///
/// 管道只依赖这个接口，测试里可以直接喂文本而不需要真实的PDF。
pub trait TextLoader {
    fn load_text(&self, path: &Path) -> FolioResult<String>;
}

pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// 提取完整文本：优先 pdf-extract，失败或结果为空时按页用 lopdf 再试一次
    pub fn extract_full_text(&self, pdf_path: &Path) -> FolioResult<String> {
        info!("提取PDF完整文本: {}", pdf_path.display());

        if !pdf_path.exists() {
            return Err(pdf_error(pdf_path, "文件不存在"));
        }

        // pdf-extract 遇到畸形文件可能直接 panic
        let primary = match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(pdf_path))) {
            Ok(Ok(text)) if !text.trim().is_empty() => return Ok(finish(pdf_path, text)),
            Ok(Ok(_)) => "pdf-extract 未返回任何文本".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => "pdf-extract panic".to_string(),
        };
        warn!("pdf-extract 失败 ({}): {}，改用 lopdf", pdf_path.display(), primary);

        let text = Self::extract_with_lopdf(pdf_path)
            .map_err(|fallback| pdf_error(pdf_path, &format!("{}; lopdf: {}", primary, fallback)))?;
        Ok(finish(pdf_path, text))
    }

    fn extract_with_lopdf(pdf_path: &Path) -> Result<String, String> {
        let doc = lopdf::Document::load(pdf_path).map_err(|e| e.to_string())?;

        let mut text = String::new();
        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => debug!("第 {} 页无法提取文本: {}", page_num, e),
            }
        }

        if text.trim().is_empty() {
            return Err("没有可提取的文本".to_string());
        }
        Ok(text)
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLoader for PdfParser {
    fn load_text(&self, path: &Path) -> FolioResult<String> {
        self.extract_full_text(path)
    }
}

fn finish(pdf_path: &Path, text: String) -> String {
    info!("提取文本长度: {} 字符 ({})", text.chars().count(), pdf_path.display());
    text
}

fn pdf_error(pdf_path: &Path, message: &str) -> FolioError {
    FolioError::PdfError {
        path: pdf_path.display().to_string(),
        message: message.to_string(),
    }
}
