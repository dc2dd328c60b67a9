use anyhow::{bail, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ScholarConfig;
use crate::storage::models::PublicationRecord;

static USER_PARAM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]user=([^&#]+)").unwrap());
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr.gsc_a_tr").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.gsc_a_at").unwrap());
static CITATION_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.gsc_a_ac").unwrap());

const PAGE_SIZE: u32 = 100;

/// 个人主页上的一行论文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScholarEntry {
    pub title: String,
    pub citations: u64,
}

pub struct ScholarCrawler {
    client: Client,
    base_url: String,
}

impl ScholarCrawler {
    pub fn new(config: &ScholarConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 抓取个人主页的第一页（最多 100 篇）；非 2xx 视为失败
    pub async fn fetch_profile(&self, scholar_id: &str) -> Result<String> {
        let url = format!(
            "{}/citations?user={}&hl=en&cstart=0&pagesize={}",
            self.base_url, scholar_id, PAGE_SIZE
        );
        info!("正在抓取 Scholar 主页: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Scholar 返回 {}", status);
            bail!("Scholar 主页请求失败: {}", status);
        }

        let html = response.text().await?;
        info!("Scholar 响应 {} 字节", html.len());
        Ok(html)
    }
}

/// 解析论文列表；引用数为空的行记为 0
pub fn parse_profile(html: &str) -> Vec<ScholarEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    for row in document.select(&ROW_SELECTOR) {
        let title = match row.select(&TITLE_SELECTOR).next() {
            Some(a) => a.text().collect::<String>().trim().to_string(),
            None => continue,
        };
        if title.is_empty() {
            continue;
        }
        let citations = row
            .select(&CITATION_SELECTOR)
            .next()
            .and_then(|a| a.text().collect::<String>().trim().parse::<u64>().ok())
            .unwrap_or(0);
        entries.push(ScholarEntry { title, citations });
    }

    if entries.is_empty() {
        warn!("Scholar 页面中没有解析到论文，页面结构可能已变化");
    }
    entries
}

/// 从主页链接中取 `user=` 参数
pub fn scholar_id_from_url(url: &str) -> Option<String> {
    USER_PARAM_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn title_key(title: &str) -> String {
    let lower = title.to_lowercase();
    let spaced = NON_WORD_RE.replace_all(&lower, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

// 包含匹配时较短一方至少需要的词数或字符数
const MIN_CONTAINED_WORDS: usize = 5;
const MIN_CONTAINED_CHARS: usize = 30;

fn long_enough(key: &str) -> bool {
    key.split(' ').count() >= MIN_CONTAINED_WORDS || key.chars().count() >= MIN_CONTAINED_CHARS
}

/// 标题模糊匹配：规范化后相等、互相包含（较短一方足够长），或前五个词相同
pub fn titles_match(local: &str, scholar: &str) -> bool {
    let a = title_key(local);
    let b = title_key(scholar);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if long_enough(shorter) && longer.contains(shorter.as_str()) {
        return true;
    }
    let first_five = |s: &str| s.split(' ').take(5).collect::<Vec<_>>().join(" ");
    first_five(&a) == first_five(&b)
}

/// 用第一条匹配的主页条目更新引用数，返回数值发生变化的记录数
pub fn update_citations(records: &mut [PublicationRecord], entries: &[ScholarEntry]) -> usize {
    let now = Utc::now().to_rfc3339();
    let mut changed = 0;

    for record in records.iter_mut() {
        match entries.iter().find(|e| titles_match(&record.title, &e.title)) {
            Some(entry) => {
                if record.citations != entry.citations {
                    info!(
                        "📈 {}: {} → {}",
                        crate::utils::preview(&record.title, 60),
                        record.citations,
                        entry.citations
                    );
                    changed += 1;
                }
                record.citations = entry.citations;
                record.citations_updated_at = Some(now.clone());
            }
            None => debug!("Scholar 中没有匹配: {}", crate::utils::preview(&record.title, 60)),
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const PROFILE: &str = r#"
        <html><body><table><tbody id="gsc_a_b">
          <tr class="gsc_a_tr">
            <td class="gsc_a_t"><a href="/x" class="gsc_a_at">Impact of vaccination on varicella transmission in South Korea</a></td>
            <td class="gsc_a_c"><a href="/c" class="gsc_a_ac gs_ibl">42</a></td>
          </tr>
          <tr class="gsc_a_tr">
            <td class="gsc_a_t"><a href="/y" class="gsc_a_at">Optimal control of measles outbreaks</a></td>
            <td class="gsc_a_c"><a href="/c" class="gsc_a_ac gs_ibl"></a></td>
          </tr>
        </tbody></table></body></html>
    "#;

    fn config(base_url: &str) -> ScholarConfig {
        ScholarConfig {
            scholar_id: String::new(),
            profile_url: String::new(),
            base_url: base_url.to_string(),
            user_agent: "pubfolio-test".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn parses_rows_and_empty_counts() {
        let entries = parse_profile(PROFILE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].citations, 42);
        assert_eq!(entries[1].title, "Optimal control of measles outbreaks");
        assert_eq!(entries[1].citations, 0);
    }

    #[test]
    fn id_from_profile_url() {
        assert_eq!(
            scholar_id_from_url("https://scholar.google.com/citations?user=AbC123xyz&hl=en").as_deref(),
            Some("AbC123xyz")
        );
        assert_eq!(scholar_id_from_url("https://scholar.google.com/citations"), None);
    }

    #[test]
    fn fuzzy_title_matching() {
        assert!(titles_match("Optimal Control of Measles!", "optimal control of measles"));
        assert!(titles_match("Optimal control of measles outbreaks in Korea", "Optimal control of measles outbreaks"));
        assert!(titles_match(
            "Estimating the basic reproductive number of COVID-19 in Korea",
            "Estimating the basic reproductive number: using contact data"
        ));
        assert!(!titles_match("Rotavirus vaccination impact", "Herpes zoster incidence"));
        assert!(!titles_match("", "anything"));
    }

    #[test]
    fn short_rows_do_not_match_by_containment() {
        assert!(!titles_match("Correction to: Optimal control of measles outbreaks", "Correction"));
        assert!(!titles_match("Erratum", "Erratum on varicella vaccination impact in Korea"));
        assert!(titles_match("Erratum", "erratum"));
    }

    #[test]
    fn punctuated_titles_build_keys() {
        assert_eq!(title_key("COVID-19: A Review!"), "covid 19 a review");
    }

    #[test]
    fn updates_only_matched_records() {
        let mut records = vec![
            PublicationRecord::new("Impact of vaccination on varicella transmission in South Korea", "PLOS ONE", "2021", "a"),
            PublicationRecord::new("Unrelated paper about tides", "Nature", "2020", "b"),
        ];
        records[1].citations = 7;

        let changed = update_citations(&mut records, &parse_profile(PROFILE));
        assert_eq!(changed, 1);
        assert_eq!(records[0].citations, 42);
        assert!(records[0].citations_updated_at.is_some());
        assert_eq!(records[1].citations, 7);
        assert!(records[1].citations_updated_at.is_none());
    }

    #[tokio::test]
    async fn fetches_profile_page() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/citations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user".into(), "AbC123".into()),
                Matcher::UrlEncoded("pagesize".into(), "100".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(PROFILE)
            .create_async()
            .await;

        let crawler = ScholarCrawler::new(&config(&server.url())).unwrap();
        let html = crawler.fetch_profile("AbC123").await.unwrap();
        assert_eq!(parse_profile(&html).len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/citations")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let crawler = ScholarCrawler::new(&config(&server.url())).unwrap();
        assert!(crawler.fetch_profile("missing").await.is_err());
    }
}
