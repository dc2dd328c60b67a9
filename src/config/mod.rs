pub mod venues;

use anyhow::{Context, Result};
use chrono::Datelike;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub use venues::VenueConfig;

pub const SETTINGS_PATH: &str = "config/settings.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub extraction: ExtractionConfig,
    pub llm: LlmConfig,
    pub scholar: ScholarConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub publications_dir: String,
    pub catalog_path: String,
    /// 记录中 link / thumbnail 使用的相对前缀
    pub link_prefix: String,
    pub thumbnail_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// 日期年份有效区间（含两端）
    pub min_year: i32,
    pub max_year: i32,
    /// 找不到任何日期时写入的占位值，调用方须视为“日期未知”
    pub placeholder_date: String,
    pub title_scan_lines: usize,
    pub journal_scan_lines: usize,
    pub abstract_min_chars: usize,
    pub abstract_max_chars: usize,
    /// 文件名包含该标记的PDF视为勘误文件，不单独入库
    pub correction_marker: String,
    /// 传给生成服务的正文上下文长度
    pub context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// auto | anthropic | openai | groq | none
    pub provider: String,
    /// 留空时从 ANTHROPIC_API_KEY / OPENAI_API_KEY / GROQ_API_KEY 读取
    pub api_key: String,
    /// 留空时使用各服务的默认地址与模型
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// 两次外部调用之间的固定间隔
    pub cooldown_ms: u64,
    pub refine_metadata: bool,
    pub korean_repair_passes: u32,
    pub french_polish_passes: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    pub scholar_id: String,
    /// 也可只填个人主页链接，从中解析 user= 参数
    pub profile_url: String,
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// 默认值 → config/settings.toml → PUBFOLIO__* 环境变量
    pub fn load() -> Result<Self> {
        Self::load_from(SETTINGS_PATH)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default()).context("默认配置序列化失败")?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("PUBFOLIO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("读取配置失败: {}", path))?;

        let config: AppConfig = settings.try_deserialize().context("配置格式错误")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.extraction.min_year > self.extraction.max_year {
            anyhow::bail!(
                "extraction.min_year ({}) 大于 extraction.max_year ({})",
                self.extraction.min_year,
                self.extraction.max_year
            );
        }
        if self.extraction.abstract_min_chars >= self.extraction.abstract_max_chars {
            anyhow::bail!("extraction.abstract_min_chars 必须小于 abstract_max_chars");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                publications_dir: "publications".to_string(),
                catalog_path: "data/publications.json".to_string(),
                link_prefix: "./publications".to_string(),
                thumbnail_extension: "png".to_string(),
            },
            extraction: ExtractionConfig::default(),
            llm: LlmConfig {
                provider: "auto".to_string(),
                api_key: String::new(),
                api_url: String::new(),
                model: String::new(),
                timeout_secs: 60,
                max_retries: 3,
                cooldown_ms: 2000,
                refine_metadata: true,
                korean_repair_passes: 2,
                french_polish_passes: 1,
            },
            scholar: ScholarConfig {
                scholar_id: String::new(),
                profile_url: String::new(),
                base_url: "https://scholar.google.com".to_string(),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
                timeout_secs: 30,
            },
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_year: 1950,
            max_year: chrono::Local::now().year() + 1,
            placeholder_date: "2024-01-01".to_string(),
            title_scan_lines: 30,
            journal_scan_lines: 10,
            abstract_min_chars: 100,
            abstract_max_chars: 2000,
            correction_marker: "_correction".to_string(),
            context_chars: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.paths.catalog_path, "data/publications.json");
        assert_eq!(config.llm.provider, "auto");
        assert_eq!(config.extraction.placeholder_date, "2024-01-01");
    }

    #[test]
    fn settings_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut config = AppConfig::default();
        config.extraction.min_year = 2020;
        config.extraction.max_year = 2024;
        config.llm.cooldown_ms = 0;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.extraction.min_year, 2020);
        assert_eq!(loaded.extraction.max_year, 2024);
        assert_eq!(loaded.llm.cooldown_ms, 0);
    }

    #[test]
    fn inverted_year_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut config = AppConfig::default();
        config.extraction.min_year = 2025;
        config.extraction.max_year = 2020;
        config.save(path.to_str().unwrap()).unwrap();

        assert!(AppConfig::load_from(path.to_str().unwrap()).is_err());
    }
}
