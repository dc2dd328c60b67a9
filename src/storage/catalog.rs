use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::storage::models::PublicationRecord;
use crate::utils::{FolioError, FolioResult};

/// 出版物目录的JSON文件存储
///
/// 整个文件就是一个记录数组，每次运行读一次、写一次。
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在返回空目录；内容损坏时另存一份 `.corrupt` 再返回空目录
    pub fn load(&self) -> Result<Vec<PublicationRecord>> {
        if !self.path.exists() {
            info!("目录文件不存在，从空目录开始: {}", self.path.display());
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path)
            .with_context(|| format!("读取目录文件失败: {}", self.path.display()))?;

        // 非 UTF-8 内容同样按格式错误处理
        match serde_json::from_slice::<Vec<PublicationRecord>>(&bytes) {
            Ok(records) => {
                info!("已加载 {} 条记录: {}", records.len(), self.path.display());
                Ok(records)
            }
            Err(e) => {
                error!("目录文件格式错误 ({}): {}", self.path.display(), e);
                let backup = self.corrupt_path();
                match fs::copy(&self.path, &backup) {
                    Ok(_) => warn!("已备份损坏的目录文件到 {}", backup.display()),
                    Err(copy_err) => warn!("备份损坏的目录文件失败: {}", copy_err),
                }
                Ok(Vec::new())
            }
        }
    }

    /// 先写同目录临时文件再重命名，中途失败不会留下半个目录文件
    pub fn save(&self, records: &[PublicationRecord]) -> FolioResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
            }
        }

        let mut content = serde_json::to_string_pretty(records)?;
        content.push('\n');

        let tmp = self.tmp_path();
        fs::write(&tmp, content).map_err(|source| self.write_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            self.write_error(source)
        })?;

        info!("目录已保存: {} 条记录 → {}", records.len(), self.path.display());
        Ok(())
    }

    /// 已有记录在前且保持原样，新记录按顺序追加
    pub fn merge(
        existing: Vec<PublicationRecord>,
        new_records: Vec<PublicationRecord>,
    ) -> Vec<PublicationRecord> {
        let mut merged = existing;
        merged.extend(new_records);
        merged
    }

    fn write_error(&self, source: std::io::Error) -> FolioError {
        FolioError::CatalogWrite {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn sibling_with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn corrupt_path(&self) -> PathBuf {
        self.sibling_with_suffix(".corrupt")
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling_with_suffix(".tmp")
    }
}
