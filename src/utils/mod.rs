pub mod logger;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("网络请求错误: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("PDF处理错误 {path}: {message}")]
    PdfError { path: String, message: String },

    #[error("LLM API错误: {0}")]
    LlmError(String),

    #[error("目录写入失败 {path}: {source}")]
    CatalogWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 对已完成增强的记录再次调用外部生成服务
    #[error("记录已完成增强，拒绝重复处理: {0}")]
    AlreadyEnhanced(String),
}

pub type FolioResult<T> = Result<T, FolioError>;

/// 按字符截断，用于日志预览
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}
