//! Report Validator
//!
//! **Question**: Is this analysis report structurally complete, evidenced,
//! measured in tone and attributed to its data sources?
//!
//! The report is scanned as a two-level heading structure: `## ` lines
//! delimit sections, `### ` lines delimit theses inside the thesis-status
//! section. No general markdown parsing is needed.

use std::collections::BTreeSet;

use super::patterns::{
    contains_kr_disclaimer, contains_number, contains_source_tag, mentions_kr_instrument,
    ACTION_DIRECTIVES_SECTION, COUNTER_KEYWORDS, COUNTER_MARKER, EVIDENCE_TAG,
    FORBIDDEN_EXPRESSIONS, H3_SPLIT, HIGH_CONFIDENCE, MIN_HIGH_CONFIDENCE_CATEGORIES,
    REQUIRED_SECTIONS, THESIS_SECTION,
};
use crate::synthesizer::Synthesizer;
use crate::types::Verdict;
use crate::violation::Violation;

/// A Level-2 section of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text without the `## ` prefix
    pub name: String,

    /// 1-based line of the heading
    pub start_line: usize,

    /// Every line after the heading up to the next Level-2 heading
    pub body: String,
}

/// Sections in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    sections: Vec<Section>,
}

impl Sections {
    /// Look up a section by exact name.
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// First section whose name contains `fragment`.
    pub fn find_containing(&self, fragment: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name.contains(fragment))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// A repeated heading keeps its first position and takes the later body.
    fn insert(&mut self, section: Section) {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }
}

/// Split a markdown document on Level-2 headings.
pub fn extract_sections(content: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current: Option<(String, usize)> = None;
    let mut body: Vec<&str> = Vec::new();

    for (idx, line) in content.split('\n').enumerate() {
        if let Some(heading) = line.strip_prefix("## ") {
            if let Some((name, start_line)) = current.take() {
                sections.insert(Section {
                    name,
                    start_line,
                    body: body.join("\n"),
                });
            }
            current = Some((heading.trim().to_string(), idx + 1));
            body.clear();
        } else if current.is_some() {
            body.push(line);
        }
    }

    if let Some((name, start_line)) = current {
        sections.insert(Section {
            name,
            start_line,
            body: body.join("\n"),
        });
    }

    sections
}

/// One `### ` block: the heading text and the block including it.
struct ThesisBlock<'a> {
    name: &'a str,
    text: &'a str,
}

/// Split text into Level-3 blocks; text before the first heading is dropped.
fn thesis_blocks(text: &str) -> Vec<ThesisBlock<'_>> {
    H3_SPLIT
        .split(text)
        .skip(1)
        .map(|block| {
            let first_line = block.split('\n').next().unwrap_or("").trim();
            ThesisBlock {
                name: first_line.trim_end_matches(':'),
                text: block,
            }
        })
        .collect()
}

/// Each required section must match some section name.
pub fn validate_required_sections(sections: &Sections) -> Vec<Violation> {
    REQUIRED_SECTIONS
        .iter()
        .filter(|required| !sections.names().any(|name| name.contains(*required)))
        .map(|required| {
            Violation::new(
                "required_sections",
                format!("Missing required section: {}", required),
            )
        })
        .collect()
}

/// Each thesis in the status section must carry counter-arguments.
pub fn validate_thesis_counterarguments(sections: &Sections) -> Vec<Violation> {
    let Some(section) = sections.find_containing(THESIS_SECTION) else {
        return Vec::new();
    };

    let mut errors = Vec::new();
    for block in thesis_blocks(&section.body) {
        match COUNTER_MARKER.find(block.text) {
            Some(marker) => {
                let rest = &block.text[marker.end()..];
                let content = match rest.find("\n##") {
                    Some(end) => &rest[..end],
                    None => rest,
                };
                if content.trim().is_empty() {
                    errors.push(Violation::new(
                        "thesis_counterarguments",
                        format!("{}: empty counter-argument section", block.name),
                    ));
                }
            }
            None => {
                if !COUNTER_KEYWORDS.iter().any(|kw| block.text.contains(kw)) {
                    errors.push(Violation::new(
                        "thesis_counterarguments",
                        format!("{}: missing counter-argument section", block.name),
                    ));
                }
            }
        }
    }
    errors
}

/// High-confidence theses need evidence from at least two categories.
pub fn validate_high_confidence_evidence(content: &str) -> Vec<Violation> {
    let mut errors = Vec::new();
    for block in thesis_blocks(content) {
        if !HIGH_CONFIDENCE.is_match(block.text) {
            continue;
        }

        let categories: BTreeSet<&str> = EVIDENCE_TAG
            .captures_iter(block.text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        if categories.len() < MIN_HIGH_CONFIDENCE_CATEGORIES {
            errors.push(Violation::new(
                "high_confidence_evidence",
                format!(
                    "{}: High confidence requires {}+ evidence categories, found {}",
                    block.name,
                    MIN_HIGH_CONFIDENCE_CATEGORIES,
                    categories.len()
                ),
            ));
        }
    }
    errors
}

/// Every occurrence of an overconfident phrase is reported with its line.
pub fn validate_forbidden_expressions(content: &str) -> Vec<Violation> {
    let mut errors = Vec::new();
    for (idx, line) in content.split('\n').enumerate() {
        for expr in FORBIDDEN_EXPRESSIONS {
            for _ in line.matches(expr) {
                errors.push(Violation::at_line(
                    "forbidden_expression",
                    format!("Forbidden expression '{}' found", expr),
                    idx + 1,
                ));
            }
        }
    }
    errors
}

/// Prose lines with numbers must name where the numbers came from.
///
/// Table rows, headings and blockquotes are exempt.
pub fn validate_source_tags(content: &str) -> Vec<Violation> {
    content
        .split('\n')
        .enumerate()
        .filter_map(|(idx, line)| {
            let stripped = line.trim();
            let exempt = stripped.is_empty()
                || stripped.contains('|')
                || stripped.starts_with('#')
                || stripped.starts_with('>');
            if exempt || !contains_number(stripped) || contains_source_tag(stripped) {
                return None;
            }
            Some(Violation::at_line(
                "source_tag",
                "Number without source tag",
                idx + 1,
            ))
        })
        .collect()
}

/// Korean-market mentions require a price-data limitation disclaimer.
pub fn validate_kr_data_warning(content: &str) -> Vec<Violation> {
    if !mentions_kr_instrument(content) || contains_kr_disclaimer(content) {
        return Vec::new();
    }
    vec![Violation::new(
        "kr_data_warning",
        "KR stock mentioned but missing adj_close data limitation warning",
    )]
}

/// With holdings present, the report must tell the operator what to do.
pub fn validate_action_directives(sections: &Sections, has_holdings: bool) -> Vec<Violation> {
    if !has_holdings || sections.find_containing(ACTION_DIRECTIVES_SECTION).is_some() {
        return Vec::new();
    }
    vec![Violation::new(
        "action_directives_required",
        format!(
            "Missing required section: {} (required when holdings exist)",
            ACTION_DIRECTIVES_SECTION
        ),
    )]
}

/// Validate a markdown analysis report.
pub fn validate_report(content: &str, has_holdings: bool) -> Verdict {
    let sections = extract_sections(content);
    tracing::debug!(sections = sections.len(), has_holdings, "Report sections extracted");

    let mut errors = Vec::new();
    errors.extend(validate_required_sections(&sections));
    errors.extend(validate_thesis_counterarguments(&sections));
    errors.extend(validate_high_confidence_evidence(content));
    errors.extend(validate_forbidden_expressions(content));
    errors.extend(validate_source_tags(content));
    errors.extend(validate_kr_data_warning(content));
    errors.extend(validate_action_directives(&sections, has_holdings));

    Synthesizer::new().synthesize_errors("report", errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_REPORT: &str = "\
# 포트폴리오 분석 리포트

## 요약

포트폴리오 현재 가치는 5,200,000원입니다 [summary]. AI 반도체 논제는 지속 상승 모멘텀을 보이고 있으나, 빅테크 실적 둔화 리스크가 존재합니다.

## 논제별 현황

### 논제 1: AI 반도체 인프라 확장

**신뢰도**: High

**찬성 근거**:
- NVDA 20일 이평선 상향 돌파 [추세]
- 거래량 전일 대비 150% 증가 [모멘텀] [psql]
- 업계 전문가 긍정 전망 발표 [외부]

**반론/리스크**:
공급 과잉 우려가 대두되고 있으며, 중국 수출 규제 강화 가능성이 있습니다.

### 논제 2: 한국 시장 저평가

**신뢰도**: Medium

**찬성 근거**:
- 069500(KODEX 200) 52주 대비 저점 근접 [추세] [summary]

**반론/리스크**:
환율 변동성 증가로 외국인 자금 유출 우려. 수정주가(adj_close) 미반영으로 기술 지표 과대평가 가능성 있음.

## 배분 제안

| 종목 | 배분 | 역할 |
|------|------|------|
| QQQ | 2,000,000원 | core |
| NVDA | 1,300,000원 | satellite |

QQQ 비중을 40%로 유지합니다 [user].

## 리스크 요인

- 금리 인상 지속 시 밸류에이션 부담
- 지정학적 리스크 확대 가능성
";

    #[test]
    fn test_extracts_level_two_sections() {
        let sections = extract_sections(VALID_REPORT);
        let names: Vec<&str> = sections.names().collect();

        assert_eq!(names, vec!["요약", "논제별 현황", "배분 제안", "리스크 요인"]);
        assert_eq!(sections.get("요약").unwrap().start_line, 3);
        assert!(sections.get("논제별 현황").unwrap().body.contains("### 논제 2"));
    }

    #[test]
    fn test_empty_document_has_no_sections() {
        assert!(extract_sections("").is_empty());
    }

    #[test]
    fn test_repeated_heading_keeps_position_and_takes_later_body() {
        let sections = extract_sections("## A\nfirst\n## B\nb\n## A\nsecond\n");
        let names: Vec<&str> = sections.names().collect();

        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(sections.get("A").unwrap().body, "second\n");
        assert_eq!(sections.get("A").unwrap().start_line, 5);
    }

    #[test]
    fn test_valid_report_passes() {
        let verdict = validate_report(VALID_REPORT, false);
        assert!(verdict.is_pass(), "unexpected errors: {:?}", verdict.errors);
    }

    #[test]
    fn test_missing_required_section() {
        let report = "## 요약\n\n분석 결과 [summary]\n\n## 논제별 현황\n\n현황 내용\n\n## 배분 제안\n\n제안 내용\n";
        let errors = validate_required_sections(&extract_sections(report));

        assert_eq!(errors.len(), 1);
        assert!(errors[0].detail.contains("리스크 요인"));
    }

    #[test]
    fn test_section_names_match_by_substring() {
        let report = "## 1. 요약\n## 논제별 현황 (2월)\n## 배분 제안\n## 주요 리스크 요인\n";
        assert!(validate_required_sections(&extract_sections(report)).is_empty());
    }

    #[test]
    fn test_empty_counterargument_is_flagged() {
        let report = "\
## 논제별 현황

### 논제 1: AI 반도체

**찬성 근거**:
- 강세 지속 [추세]

**반론/리스크**:

### 논제 2: 한국 시장

**찬성 근거**:
- 저평가 [추세]

**반론/리스크**:
환율 변동성 증가
";
        let errors = validate_thesis_counterarguments(&extract_sections(report));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "논제 1: AI 반도체: empty counter-argument section");
    }

    #[test]
    fn test_missing_counterargument_is_flagged() {
        let report = "\
## 논제별 현황

### 논제 1: AI 반도체

**찬성 근거**:
- 강세 지속 [추세]
";
        let errors = validate_thesis_counterarguments(&extract_sections(report));

        assert_eq!(errors.len(), 1);
        assert!(errors[0].detail.ends_with("missing counter-argument section"));
    }

    #[test]
    fn test_risk_keyword_counts_as_counterargument() {
        let report = "## 논제별 현황\n\n### 논제 1\n\n금리 위험이 남아 있음\n";
        assert!(validate_thesis_counterarguments(&extract_sections(report)).is_empty());
    }

    #[test]
    fn test_high_confidence_needs_two_categories() {
        let report = "\
### 논제 1: AI

**신뢰도**: High

- 상승 [추세]
- 돌파 [추세]

### 논제 2: 방어

**신뢰도**: Low

- 하락 [추세]
";
        let errors = validate_high_confidence_evidence(report);

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].detail,
            "논제 1: AI: High confidence requires 2+ evidence categories, found 1"
        );
    }

    #[test]
    fn test_korean_high_label_is_recognized() {
        let report = "### 논제\n\n신뢰도: 높음\n\n- 근거 없음\n";
        assert_eq!(validate_high_confidence_evidence(report).len(), 1);
    }

    #[test]
    fn test_forbidden_expressions_report_every_occurrence() {
        let report = "첫 줄\nNVDA는 확실히 오르고 반드시 100% 수익, 확실히.\n";
        let errors = validate_forbidden_expressions(report);

        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| e.line == Some(2)));
        assert_eq!(errors[0].detail, "Forbidden expression '확실히' found");
        assert_eq!(errors[1].detail, "Forbidden expression '확실히' found");
    }

    #[test]
    fn test_source_tags() {
        let report = "\
수익률 12% 달성
| QQQ | 2,000,000원 |
# 5,000,000원 목표
> 인용 3,000원
평가금액 900,000원 [holdings]
매출 +78% 성장 [research]
";
        let errors = validate_source_tags(report);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, Some(1));
        assert_eq!(errors[0].rule, "source_tag");
    }

    #[test]
    fn test_kr_mention_without_disclaimer_fails_once() {
        let report = VALID_REPORT.replace("수정주가(adj_close) 미반영으로 기술 지표 과대평가 가능성 있음.", "");
        let verdict = validate_report(&report, false);

        assert!(verdict.is_fail());
        assert_eq!(verdict.error_rules(), vec!["kr_data_warning"]);
    }

    #[test]
    fn test_action_directives_only_checked_with_holdings() {
        let sections = extract_sections(VALID_REPORT);
        assert!(validate_action_directives(&sections, false).is_empty());

        let errors = validate_action_directives(&sections, true);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, "action_directives_required");
        assert!(errors[0].detail.contains("행동 지시"));

        let with_section = format!(
            "{}\n## 행동 지시\n\n| 종목 | 행동 | 금액 |\n|------|------|------|\n| NVDA | 매수 | 200,000원 |\n",
            VALID_REPORT
        );
        assert!(validate_action_directives(&extract_sections(&with_section), true).is_empty());
        assert!(validate_report(&with_section, true).is_pass());
    }

    #[test]
    fn test_collects_errors_from_several_rules() {
        let report = "\
## 요약

NVDA는 확실히 5,200,000원까지 상승합니다.

## 논제별 현황

### 논제 1: AI 반도체

**찬성 근거**:
- 강세 [추세]
";
        let verdict = validate_report(report, false);
        let rules = verdict.error_rules();

        assert!(verdict.is_fail());
        assert!(rules.contains(&"required_sections"));
        assert!(rules.contains(&"thesis_counterarguments"));
        assert!(rules.contains(&"forbidden_expression"));
        assert!(rules.contains(&"source_tag"));
    }

    #[test]
    fn test_report_validation_is_idempotent() {
        let first = validate_report(VALID_REPORT, true);
        let second = validate_report(VALID_REPORT, true);
        assert_eq!(first, second);
    }
}
