//! 出版日期识别
//!
//! 全文按关键词分级搜索（published online > available online > published >
//! accepted > received），同一级别内第一个能解析且年份合法的日期胜出。
//! 都找不到时依次退回到首部的普通日期、文件名中的年份、占位日期。

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::storage::models::FormattedDate;

/// 日期值的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    PublishedOnline,
    AvailableOnline,
    Published,
    Accepted,
    Received,
    /// 首部文本中的普通日期
    Header,
    Filename,
    /// 由生成服务复核后给出
    Refined,
    /// 没有找到任何日期
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationDate {
    pub value: String,
    pub source: DateSource,
}

impl PublicationDate {
    pub fn is_placeholder(&self) -> bool {
        self.source == DateSource::Placeholder
    }
}

/// 合法年份区间（含两端）
#[derive(Debug, Clone, Copy)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            min: config.min_year,
            max: config.max_year,
        }
    }

    fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

/// 解析出的日期，精度取决于原文给出了多少信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateParts {
    Day(i32, u32, u32),
    Month(i32, u32),
    Year(i32),
}

impl DateParts {
    /// 日历校验：日期非法退化为月，月份非法退化为年
    fn validated(year: i32, month: Option<u32>, day: Option<u32>) -> Self {
        match (month, day) {
            (Some(m), Some(d)) if NaiveDate::from_ymd_opt(year, m, d).is_some() => {
                DateParts::Day(year, m, d)
            }
            (Some(m), _) if (1..=12).contains(&m) => DateParts::Month(year, m),
            _ => DateParts::Year(year),
        }
    }

    fn year(&self) -> i32 {
        match *self {
            DateParts::Day(y, _, _) | DateParts::Month(y, _) | DateParts::Year(y) => y,
        }
    }

    fn render(&self) -> String {
        match *self {
            DateParts::Day(y, m, d) => format!("{:04}-{:02}-{:02}", y, m, d),
            DateParts::Month(y, m) => format!("{:04}-{:02}", y, m),
            DateParts::Year(y) => format!("{:04}", y),
        }
    }
}

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

#[derive(Debug, Clone, Copy)]
enum Shape {
    YearMonthDay,
    DayMonthNameYear,
    MonthNameDayYear,
    MonthNameYear,
    DayMonthYear,
    YearOnly,
}

/// 片段语法，按从具体到宽泛的顺序尝试
static GRAMMAR: Lazy<Vec<(Shape, String)>> = Lazy::new(|| {
    vec![
        (Shape::YearMonthDay, r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b".to_string()),
        (Shape::DayMonthNameYear, format!(r"(\d{{1,2}})(?:st|nd|rd|th)?[\s\-]+{}[\s,\-]+(\d{{4}})\b", MONTH)),
        (Shape::MonthNameDayYear, format!(r"\b{}\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b", MONTH)),
        (Shape::MonthNameYear, format!(r"\b{}[\s,]+(\d{{4}})\b", MONTH)),
        (Shape::DayMonthYear, r"(\d{1,2})[/.](\d{1,2})[/.](\d{4})\b".to_string()),
        (Shape::YearOnly, r"\b(\d{4})\b".to_string()),
    ]
});

/// 片段开头的日期（允许前导的 "on"）
static ANCHORED_GRAMMAR: Lazy<Vec<(Shape, Regex)>> = Lazy::new(|| {
    GRAMMAR
        .iter()
        .map(|(shape, p)| (*shape, Regex::new(&format!(r"(?i)^\s*(?:on\s+)?{}", p)).unwrap()))
        .collect()
});

/// 一行中任意位置的日期
static FREE_GRAMMAR: Lazy<Vec<(Shape, Regex)>> = Lazy::new(|| {
    GRAMMAR
        .iter()
        .map(|(shape, p)| (*shape, Regex::new(&format!("(?i){}", p)).unwrap()))
        .collect()
});

static TIERS: Lazy<Vec<(DateSource, Regex)>> = Lazy::new(|| {
    [
        (DateSource::PublishedOnline, r"(?i)\bpublished\s+online\b[:\s]*"),
        (DateSource::AvailableOnline, r"(?i)\bavailable\s+online\b[:\s]*"),
        (DateSource::Published, r"(?i)\bpublished\b(?:\s+on)?[:\s]*"),
        (DateSource::Accepted, r"(?i)\baccepted\b(?:\s+on)?[:\s]*"),
        (DateSource::Received, r"(?i)\breceived\b(?:\s+on)?[:\s]*"),
    ]
    .into_iter()
    .map(|(source, p)| (source, Regex::new(p).unwrap()))
    .collect()
});

static FILENAME_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])((?:19|20)\d{2})(?:[^0-9]|$)").unwrap());

const FRAGMENT_CHARS: usize = 40;
const HEADER_LINES: usize = 20;

fn month_number(name: &str) -> Option<u32> {
    let key: String = name.to_lowercase().chars().take(3).collect();
    let month = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn parts_from_captures(shape: Shape, caps: &regex::Captures) -> Option<DateParts> {
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());

    let parts = match shape {
        Shape::YearMonthDay => DateParts::validated(year(1)?, num(2), num(3)),
        Shape::DayMonthNameYear => {
            DateParts::validated(year(3)?, month_number(caps.get(2)?.as_str()), num(1))
        }
        Shape::MonthNameDayYear => {
            DateParts::validated(year(3)?, month_number(caps.get(1)?.as_str()), num(2))
        }
        Shape::MonthNameYear => {
            DateParts::validated(year(2)?, month_number(caps.get(1)?.as_str()), None)
        }
        Shape::DayMonthYear => DateParts::validated(year(3)?, num(2), num(1)),
        Shape::YearOnly => DateParts::Year(year(1)?),
    };
    Some(parts)
}

/// 解析片段开头的日期；年份不在区间内视为解析失败
fn parse_fragment(fragment: &str, range: YearRange) -> Option<DateParts> {
    ANCHORED_GRAMMAR.iter().find_map(|(shape, re)| {
        let caps = re.captures(fragment)?;
        parts_from_captures(*shape, &caps).filter(|p| range.contains(p.year()))
    })
}

/// 在一行的任意位置寻找合法日期
fn find_in_line(line: &str, range: YearRange) -> Option<DateParts> {
    FREE_GRAMMAR.iter().find_map(|(shape, re)| {
        re.captures_iter(line)
            .filter_map(|caps| parts_from_captures(*shape, &caps))
            .find(|p| range.contains(p.year()))
    })
}

/// 把任意写法的日期规范为 `YYYY-MM-DD` / `YYYY-MM` / `YYYY`
pub fn normalize_date_value(text: &str, range: YearRange) -> Option<String> {
    parse_fragment(text.trim(), range).map(|p| p.render())
}

fn fragment_after(text: &str, start: usize) -> &str {
    let rest = &text[start..];
    let end = rest
        .char_indices()
        .nth(FRAGMENT_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    &rest[..end]
}

/// 按关键词级别搜索全文
pub fn find_tiered_date(text: &str, range: YearRange) -> Option<PublicationDate> {
    for (source, re) in TIERS.iter() {
        for m in re.find_iter(text) {
            let fragment = fragment_after(text, m.end());
            if let Some(parts) = parse_fragment(fragment, range) {
                debug!("日期 {} 来自 {:?}: {:?}", parts.render(), source, m.as_str().trim());
                return Some(PublicationDate {
                    value: parts.render(),
                    source: *source,
                });
            }
        }
    }
    None
}

/// 识别出版日期，永远返回一个值
pub fn extract_publication_date(
    text: &str,
    filename: &str,
    config: &ExtractionConfig,
) -> PublicationDate {
    let range = YearRange::from_config(config);

    if let Some(date) = find_tiered_date(text, range) {
        return date;
    }

    let header = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(HEADER_LINES)
        .find_map(|line| find_in_line(line, range));
    if let Some(parts) = header {
        return PublicationDate {
            value: parts.render(),
            source: DateSource::Header,
        };
    }

    let from_filename = FILENAME_YEAR_RE
        .captures_iter(filename)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .find(|y| range.contains(*y));
    if let Some(year) = from_filename {
        return PublicationDate {
            value: format!("{:04}", year),
            source: DateSource::Filename,
        };
    }

    debug!("未找到出版日期，使用占位值 {}", config.placeholder_date);
    PublicationDate {
        value: config.placeholder_date.clone(),
        source: DateSource::Placeholder,
    }
}

static DATE_CONTEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:published|available\s+online|received|accepted|publication\s+date|copyright)\b").unwrap()
});

/// 含出版信息关键词和年份的行，供人工或外部服务复核日期
pub fn date_context_lines(text: &str, max_lines: usize) -> Vec<String> {
    let year_re = &FREE_GRAMMAR[FREE_GRAMMAR.len() - 1].1;
    text.lines()
        .map(str::trim)
        .filter(|l| DATE_CONTEXT_RE.is_match(l) && year_re.is_match(l))
        .map(|l| crate::utils::preview(l, 200))
        .take(max_lines)
        .collect()
}

const EN_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const FR_MONTHS: [&str; 12] = [
    "Janvier", "Février", "Mars", "Avril", "Mai", "Juin", "Juillet", "Août", "Septembre",
    "Octobre", "Novembre", "Décembre",
];

/// 三语展示文本：`July 15, 2021` / `2021.07.15` / `15 Juillet 2021`
pub fn format_display_date(date: &str) -> Option<FormattedDate> {
    let mut parts = date.trim().split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: Option<u32> = match parts.next() {
        Some(m) => Some(m.parse().ok()?),
        None => None,
    };
    let day: Option<u32> = match parts.next() {
        Some(d) => Some(d.parse().ok()?),
        None => None,
    };

    let formatted = match DateParts::validated(year, month, day) {
        DateParts::Day(y, m, d) => {
            let idx = (m - 1) as usize;
            FormattedDate {
                en: format!("{} {}, {}", EN_MONTHS[idx], d, y),
                ko: format!("{}.{:02}.{:02}", y, m, d),
                fr: format!("{} {} {}", d, FR_MONTHS[idx], y),
            }
        }
        DateParts::Month(y, m) => {
            let idx = (m - 1) as usize;
            FormattedDate {
                en: format!("{} {}", EN_MONTHS[idx], y),
                ko: format!("{}.{:02}", y, m),
                fr: format!("{} {}", FR_MONTHS[idx], y),
            }
        }
        DateParts::Year(y) => FormattedDate {
            en: y.to_string(),
            ko: y.to_string(),
            fr: y.to_string(),
        },
    };
    Some(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExtractionConfig {
        ExtractionConfig {
            min_year: 1950,
            max_year: 2030,
            ..ExtractionConfig::default()
        }
    }

    fn extract(text: &str) -> PublicationDate {
        extract_publication_date(text, "paper.pdf", &config())
    }

    #[test]
    fn published_online_iso_date_keeps_day_precision() {
        let date = extract("Received: 2021-01-02\nPublished online: 2021-07-15\n");
        assert_eq!(date.value, "2021-07-15");
        assert_eq!(date.source, DateSource::PublishedOnline);
    }

    #[test]
    fn published_online_outranks_accepted_regardless_of_order() {
        let date = extract("Accepted 3 March 2021; Published online 15 July 2021");
        assert_eq!(date.value, "2021-07-15");
    }

    #[test]
    fn month_name_formats_are_understood() {
        assert_eq!(extract("Published: July 15, 2021").value, "2021-07-15");
        assert_eq!(extract("Available online March 2020").value, "2020-03");
        assert_eq!(extract("Accepted 01/02/2019").value, "2019-02-01");
        assert_eq!(extract("Received 4th Sept. 2018").value, "2018-09-04");
    }

    #[test]
    fn invalid_day_degrades_to_month() {
        assert_eq!(extract("Published online: 2021-02-30").value, "2021-02");
    }

    #[test]
    fn out_of_range_year_falls_through_to_next_match() {
        let date = extract("Published online: 1492-10-12. Accepted: 2020-05-01");
        assert_eq!(date.value, "2020-05-01");
        assert_eq!(date.source, DateSource::Accepted);
    }

    #[test]
    fn bare_year_in_header() {
        let date = extract("Some article\nVolume 7, 2021\n");
        assert_eq!(date.value, "2021");
        assert_eq!(date.source, DateSource::Header);
    }

    #[test]
    fn filename_year_then_placeholder() {
        let cfg = config();
        let date = extract_publication_date("no dates here", "varicella_2019_final.pdf", &cfg);
        assert_eq!(date.value, "2019");
        assert_eq!(date.source, DateSource::Filename);

        let none = extract_publication_date("no dates here", "journal.pone.0249262.pdf", &cfg);
        assert!(none.is_placeholder());
        assert_eq!(none.value, "2024-01-01");
    }

    #[test]
    fn normalizes_refined_values() {
        let range = YearRange { min: 1950, max: 2030 };
        assert_eq!(normalize_date_value("2021-07-15", range).as_deref(), Some("2021-07-15"));
        assert_eq!(normalize_date_value("15 July 2021", range).as_deref(), Some("2021-07-15"));
        assert_eq!(normalize_date_value("2021", range).as_deref(), Some("2021"));
        assert_eq!(normalize_date_value("unknown", range), None);
        assert_eq!(normalize_date_value("1800", range), None);
    }

    #[test]
    fn date_context_keeps_keyword_lines_with_years() {
        let text = "Title\nReceived: 2 January 2021; Accepted: 3 March 2021\nPublished online soon\n© Copyright 2021 Doe";
        let lines = date_context_lines(text, 10);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Received"));
        assert!(lines[1].contains("Copyright 2021"));
    }

    #[test]
    fn display_strings_follow_precision() {
        let full = format_display_date("2021-07-15").unwrap();
        assert_eq!(full.en, "July 15, 2021");
        assert_eq!(full.ko, "2021.07.15");
        assert_eq!(full.fr, "15 Juillet 2021");

        let month = format_display_date("2021-08").unwrap();
        assert_eq!(month.fr, "Août 2021");
        assert_eq!(format_display_date("2021").unwrap().ko, "2021");
        assert!(format_display_date("n/a").is_none());
    }
}
