mod config;
mod crawler;
mod enhancer;
mod parser;
mod pipeline;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{AppConfig, VenueConfig, SETTINGS_PATH};
use crate::config::venues::VENUES_PATH;
use crate::crawler::scholar::{self, ScholarCrawler};
use crate::enhancer::Enhancer;
use crate::parser::{FieldExtractor, PdfParser};
use crate::pipeline::{CatalogStatus, ImportItem, PipelineDriver};
use crate::storage::CatalogStore;
use crate::utils::logger;

#[derive(Parser)]
#[command(name = "pubfolio")]
#[command(about = "论文PDF元数据提取与多语言摘要生成", long_about = None)]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成默认配置文件和目录
    Init,
    /// 提取新PDF并生成摘要
    Extract,
    /// 为目录中尚未增强的记录生成摘要
    Enhance,
    /// 从JSON数组导入记录
    Import {
        /// JSON文件路径
        file: String,
    },
    /// 从 Google Scholar 更新引用数
    Citations,
    /// 查看目录概况
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);
    info!("pubfolio 启动");

    match cli.command {
        Commands::Init => init_command().await?,
        Commands::Extract => extract_command().await?,
        Commands::Enhance => enhance_command().await?,
        Commands::Import { file } => import_command(&file).await?,
        Commands::Citations => citations_command().await?,
        Commands::Status => status_command()?,
    }

    Ok(())
}

async fn init_command() -> Result<()> {
    info!("初始化...");

    let app_config = AppConfig::default();
    tokio::fs::create_dir_all("config").await?;
    tokio::fs::create_dir_all(&app_config.paths.publications_dir).await?;
    if let Some(parent) = std::path::Path::new(&app_config.paths.catalog_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if std::path::Path::new(SETTINGS_PATH).exists() {
        info!("配置文件已存在，保持不变: {}", SETTINGS_PATH);
    } else {
        app_config.save(SETTINGS_PATH)?;
        info!("已生成配置文件: {}", SETTINGS_PATH);
    }

    if std::path::Path::new(VENUES_PATH).exists() {
        info!("期刊配置已存在，保持不变: {}", VENUES_PATH);
    } else {
        let venue_toml = toml::to_string_pretty(&VenueConfig::default())?;
        tokio::fs::write(VENUES_PATH, venue_toml).await?;
        info!("已生成期刊配置: {}", VENUES_PATH);
    }

    info!("✅ 初始化完成！");
    info!("下一步:");
    info!("  1. 把论文PDF放入 {}/", app_config.paths.publications_dir);
    info!("  2. 在 .env 中设置 ANTHROPIC_API_KEY / OPENAI_API_KEY / GROQ_API_KEY（可选）");
    info!("  3. 运行 'pubfolio extract'");

    Ok(())
}

fn build_driver(app_config: &AppConfig) -> Result<PipelineDriver<PdfParser>> {
    let venues = VenueConfig::load().context("读取期刊配置失败")?;
    let enhancer = Enhancer::from_config(&app_config.llm)?;
    if !enhancer.is_available() {
        warn!("⚠️ 未配置文本生成服务，所有摘要将使用模板");
    }
    let extractor = FieldExtractor::new(app_config.extraction.clone(), venues);
    Ok(PipelineDriver::new(
        PdfParser::new(),
        extractor,
        enhancer,
        app_config.paths.clone(),
    ))
}

async fn extract_command() -> Result<()> {
    let app_config = AppConfig::load()?;
    let mut driver = build_driver(&app_config)?;

    let stats = driver.run().await?;
    stats.log_summary();
    Ok(())
}

async fn enhance_command() -> Result<()> {
    let app_config = AppConfig::load()?;
    let mut driver = build_driver(&app_config)?;

    let stats = driver.enhance_catalog().await?;
    info!(
        "增强完成: 生成 {} 条，模板 {} 条，已完成 {} 条",
        stats.enhanced, stats.fallback, stats.skipped
    );
    Ok(())
}

async fn import_command(file: &str) -> Result<()> {
    let app_config = AppConfig::load()?;
    let driver = build_driver(&app_config)?;

    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("无法读取导入文件 {}", file))?;
    let items: Vec<ImportItem> =
        serde_json::from_str(&content).with_context(|| format!("导入文件格式错误 {}", file))?;

    let stats = driver.import(items).await?;
    info!(
        "导入完成: 新增 {} 条，已存在 {} 条，无效 {} 条",
        stats.new_records, stats.skipped, stats.failed
    );
    Ok(())
}

async fn citations_command() -> Result<()> {
    let app_config = AppConfig::load()?;
    let scholar_config = &app_config.scholar;

    let scholar_id = if !scholar_config.scholar_id.trim().is_empty() {
        scholar_config.scholar_id.trim().to_string()
    } else if let Some(id) = scholar::scholar_id_from_url(&scholar_config.profile_url) {
        id
    } else {
        anyhow::bail!("未配置 scholar.scholar_id 或 scholar.profile_url");
    };

    let store = CatalogStore::new(&app_config.paths.catalog_path);
    let mut records = store.load()?;
    if records.is_empty() {
        info!("目录为空，无需更新引用数");
        return Ok(());
    }

    let crawler = ScholarCrawler::new(scholar_config)?;
    let html = match crawler.fetch_profile(&scholar_id).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Scholar 主页抓取失败，保留现有引用数: {}", e);
            return Ok(());
        }
    };
    let entries = scholar::parse_profile(&html);
    if entries.is_empty() {
        warn!("没有解析到论文，保留现有引用数");
        return Ok(());
    }

    info!("Scholar 主页共 {} 篇论文", entries.len());
    let changed = scholar::update_citations(&mut records, &entries);
    store.save(&records)?;

    let total: u64 = records.iter().map(|r| r.citations).sum();
    info!("🎉 引用数更新完成: {} 条有变化，总引用 {}", changed, total);
    Ok(())
}

fn status_command() -> Result<()> {
    let app_config = AppConfig::load()?;
    let store = CatalogStore::new(&app_config.paths.catalog_path);
    let records = store.load()?;
    let status = CatalogStatus::of(&records, &app_config.extraction.placeholder_date);

    info!("📚 目录: {}", store.path().display());
    info!("  记录总数: {}", status.total);
    info!("  来自PDF: {}", status.from_pdf);
    info!("  已增强: {}（其中模板 {}）", status.enhanced, status.fallback);
    info!("  待增强: {}", status.pending);
    info!("  日期未知: {}", status.placeholder_dates);
    info!("  总引用数: {}", status.citations);
    Ok(())
}
