use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:not ok|open issue|ok|partial|passed|pass|warning|fail(?:ed)?)\b|[✅⚠❌]")
        .expect("status pattern")
});
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern"));
static QUESTION_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d+[.)]\s*|(?:qa/qc\s+)?question\s*\d*\s*[:：.]?\s*)").expect("question pattern")
});
static LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(source basis|source|reviewer notes|notes|remarks|comment)\s*[:：]\s*(.+)")
        .expect("label pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Partial,
    NotOk,
}

impl CheckStatus {
    /// First status word or symbol in `text`.
    pub fn find(text: &str) -> Option<Self> {
        let m = STATUS.find(text)?;
        Some(match m.as_str().to_lowercase().as_str() {
            "ok" | "pass" | "passed" | "✅" => Self::Ok,
            "partial" | "warning" | "⚠" => Self::Partial,
            _ => Self::NotOk,
        })
    }

    pub fn score(self) -> f64 {
        match self {
            Self::Ok => 1.0,
            Self::Partial => 0.5,
            Self::NotOk => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Partial => "Partial",
            Self::NotOk => "Not OK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn find(text: &str) -> Option<Self> {
        let t = text.to_lowercase();
        if t.contains("high") {
            Some(Self::High)
        } else if t.contains("med") {
            Some(Self::Medium)
        } else if t.contains("low") {
            Some(Self::Low)
        } else {
            None
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            Self::High => 3.0,
            Self::Medium => 2.0,
            Self::Low => 0.5,
        }
    }
}

/// One row of a `| Check Point | Status | Remarks | Score | Source Basis |` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRow {
    pub check_point: String,
    pub status: CheckStatus,
    pub remarks: String,
    pub score: Option<f64>,
    pub source_basis: String,
    pub risk: Option<RiskLevel>,
}

/// One numbered review question with whatever status, source and notes follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRow {
    pub number: usize,
    pub question: String,
    pub status: CheckStatus,
    pub source: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub checks: Vec<CheckRow>,
    pub questions: Vec<QuestionRow>,
    /// OK = 1, Partial = 0.5, Not OK = 0, as a percentage of table rows.
    pub status_score: Option<f64>,
    /// Status scores weighted High 3, Medium 2, Low 0.5 (rows without a risk count as Low).
    pub risk_weighted_score: Option<f64>,
}

impl Findings {
    pub fn from_response(text: &str) -> Self {
        let checks = parse_check_table(text);
        let questions = if checks.is_empty() {
            parse_questions(text)
        } else {
            Vec::new()
        };
        Self {
            status_score: status_score(&checks),
            risk_weighted_score: risk_weighted_score(&checks),
            checks,
            questions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.questions.is_empty()
    }
}

fn cells(line: &str) -> Vec<&str> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(str::trim).collect()
}

fn is_separator(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

struct Columns {
    check_point: usize,
    status: usize,
    remarks: Option<usize>,
    score: Option<usize>,
    source: Option<usize>,
    risk: Option<usize>,
}

impl Columns {
    fn from_header(header: &[&str]) -> Option<Self> {
        let find = |needle: &str| {
            header
                .iter()
                .position(|h| h.to_lowercase().contains(needle))
        };
        Some(Self {
            check_point: find("check point")?,
            status: find("status")?,
            remarks: find("remark"),
            score: find("score"),
            source: find("source"),
            risk: find("risk"),
        })
    }
}

/// Rows of the first markdown table whose header names a check point and a status.
pub fn parse_check_table(text: &str) -> Vec<CheckRow> {
    let mut rows = Vec::new();
    let mut columns: Option<Columns> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if columns.is_none() {
            if trimmed.contains('|') {
                columns = Columns::from_header(&cells(trimmed));
            }
            continue;
        }
        let Some(cols) = &columns else { continue };
        if is_separator(trimmed) {
            continue;
        }
        if !trimmed.starts_with('|') {
            if rows.is_empty() {
                continue;
            }
            break;
        }

        let row = cells(trimmed);
        let cell = |i: Option<usize>| i.and_then(|i| row.get(i)).copied().unwrap_or_default();
        let check_point = cell(Some(cols.check_point));
        if check_point.is_empty() {
            continue;
        }
        rows.push(CheckRow {
            check_point: check_point.to_string(),
            status: CheckStatus::find(cell(Some(cols.status))).unwrap_or(CheckStatus::NotOk),
            remarks: cell(cols.remarks).to_string(),
            score: NUMBER
                .find(cell(cols.score))
                .and_then(|m| m.as_str().parse().ok()),
            source_basis: cell(cols.source).to_string(),
            risk: RiskLevel::find(cell(cols.risk)),
        });
    }
    rows
}

/// Numbered, `Question:` or `?`-terminated lines, each with the status, source
/// and notes found in the next few lines. Questions without a status stay open
/// (Not OK).
pub fn parse_questions(text: &str) -> Vec<QuestionRow> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut rows = Vec::new();

    for (i, &line) in lines.iter().enumerate() {
        let question = match QUESTION_LEAD.find(line) {
            Some(lead) => line[lead.end()..].trim(),
            None if line.ends_with('?') => line,
            None => continue,
        };
        if question.is_empty() {
            continue;
        }

        let follow: Vec<&str> = lines[i + 1..]
            .iter()
            .take(4)
            .take_while(|l| !QUESTION_LEAD.is_match(l) && !l.ends_with('?'))
            .copied()
            .collect();

        let mut source = String::new();
        let mut notes = String::new();
        for l in &follow {
            if let Some(caps) = LABELLED.captures(l) {
                let value = caps[2].trim().to_string();
                match caps[1].to_lowercase().as_str() {
                    "source" | "source basis" if source.is_empty() => source = value,
                    "reviewer notes" | "notes" | "remarks" | "comment" if notes.is_empty() => {
                        notes = value
                    }
                    _ => {}
                }
            }
        }
        if source.is_empty() {
            source = source_from_symbol(&follow.join(" ")).to_string();
        }

        rows.push(QuestionRow {
            number: rows.len() + 1,
            question: question.to_string(),
            status: follow
                .iter()
                .find_map(|l| CheckStatus::find(l))
                .unwrap_or(CheckStatus::NotOk),
            source,
            notes,
        });
    }
    rows
}

fn source_from_symbol(text: &str) -> &'static str {
    if text.contains('📎') {
        "Input Document"
    } else if text.contains('💊') {
        "Good Engineering Practice"
    } else if text.contains('🔧') {
        "Engineering Logic"
    } else {
        "Not Available"
    }
}

pub fn status_score(rows: &[CheckRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let total: f64 = rows.iter().map(|r| r.status.score()).sum();
    Some(round2(total / rows.len() as f64 * 100.0))
}

pub fn risk_weighted_score(rows: &[CheckRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let (weighted, total) = rows.iter().fold((0.0, 0.0), |(acc, total), r| {
        let w = r.risk.unwrap_or(RiskLevel::Low).weight();
        (acc + r.status.score() * w, total + w)
    });
    Some(round2(weighted / total * 100.0))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ok_wins_over_ok() {
        assert_eq!(CheckStatus::find("Not OK - missing"), Some(CheckStatus::NotOk));
        assert_eq!(CheckStatus::find("✅"), Some(CheckStatus::Ok));
        assert_eq!(CheckStatus::find("⚠️ check"), Some(CheckStatus::Partial));
        assert_eq!(CheckStatus::find("bookkeeping"), None);
    }

    #[test]
    fn separator_lines() {
        assert!(is_separator("|---|:---:|"));
        assert!(!is_separator("| a | b |"));
    }
}
