use crate::storage::models::{Language, Summary};

/// 模板摘要所用的研究领域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchDomain {
    Epidemiology,
    ControlTheory,
    MathematicalBiology,
    General,
}

pub fn detect_domain(title: &str) -> ResearchDomain {
    let lower = title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["covid", "epidemi", "transmission", "vaccination"]) {
        ResearchDomain::Epidemiology
    } else if has(&["control", "optimal", "optimization"]) {
        ResearchDomain::ControlTheory
    } else if has(&["mathematical", "model"]) {
        ResearchDomain::MathematicalBiology
    } else {
        ResearchDomain::General
    }
}

/// 按标题领域选择的英文模板摘要
pub fn template_abstract(title: &str) -> String {
    let subject = title.trim().to_lowercase();
    match detect_domain(title) {
        ResearchDomain::Epidemiology => format!(
            "This study presents research on {}. The work involves mathematical modeling and analysis of \
             epidemiological patterns, contributing to our understanding of disease transmission and control strategies.",
            subject
        ),
        ResearchDomain::ControlTheory => format!(
            "This paper investigates {}, applying control theory principles and mathematical optimization \
             techniques to analyze system dynamics and develop effective intervention strategies.",
            subject
        ),
        ResearchDomain::MathematicalBiology => format!(
            "This research examines {} using mathematical modeling approaches. The study contributes to the \
             field of mathematical biology through theoretical analysis and computational methods.",
            subject
        ),
        ResearchDomain::General => format!(
            "This study focuses on {}, employing analytical methods and mathematical approaches to advance \
             understanding in this research area.",
            subject
        ),
    }
}

/// 翻译失败时的占位译文：`[한국어] …` / `[Français] …`
pub fn labelled_copy(abstract_en: &str, lang: Language) -> String {
    match lang {
        Language::En => abstract_en.to_string(),
        Language::Ko => format!("[한국어] {}", abstract_en),
        Language::Fr => format!("[Français] {}", abstract_en),
    }
}

/// 三种语言都由同一段英文派生
pub fn summary_from_english(abstract_en: &str) -> Summary {
    Summary {
        en: Some(abstract_en.to_string()),
        ko: Some(labelled_copy(abstract_en, Language::Ko)),
        fr: Some(labelled_copy(abstract_en, Language::Fr)),
    }
}

/// 完全兜底：模板英文摘要加占位译文
pub fn fallback_summary(title: &str) -> Summary {
    summary_from_english(&template_abstract(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_detection_order() {
        assert_eq!(
            detect_domain("Optimal vaccination strategies for COVID-19"),
            ResearchDomain::Epidemiology
        );
        assert_eq!(detect_domain("Optimal control of a pendulum"), ResearchDomain::ControlTheory);
        assert_eq!(detect_domain("A mathematical model of tumour growth"), ResearchDomain::MathematicalBiology);
        assert_eq!(detect_domain("Notes on bibliometrics"), ResearchDomain::General);
    }

    #[test]
    fn fallback_summary_is_complete() {
        let summary = fallback_summary("Impact of COVID-19 on hospital visits");
        assert!(summary.is_complete());
        let en = summary.en.as_deref().unwrap();
        assert!(en.starts_with("This study presents research on impact of covid-19 on hospital visits."));
        assert_eq!(summary.ko.as_deref().unwrap(), format!("[한국어] {}", en));
        assert_eq!(summary.fr.as_deref().unwrap(), format!("[Français] {}", en));
    }
}
