use crate::findings::Findings;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percent pattern"));
static FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)").expect("fraction pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreCategory {
    Excellent,
    ApprovedMinor,
    NeedsRevision,
    Rejected,
    Unscored,
}

impl ScoreCategory {
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            None => Self::Unscored,
            Some(s) if s >= 95.0 => Self::Excellent,
            Some(s) if s >= 80.0 => Self::ApprovedMinor,
            Some(s) if s >= 70.0 => Self::NeedsRevision,
            Some(_) => Self::Rejected,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Approved – Excellent",
            Self::ApprovedMinor => "Approved with Minor Comments",
            Self::NeedsRevision => "Needs Revision",
            Self::Rejected => "Rejected",
            Self::Unscored => "Unscored",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Excellent => "No or minor comments",
            Self::ApprovedMinor => "Acceptable, no re-issue needed",
            Self::NeedsRevision => "Rework and re-review required",
            Self::Rejected => "Major issues, rework essential",
            Self::Unscored => "No score found, review manually",
        }
    }
}

/// A model response with its overall score and any check rows it tabulates.
/// A response without a score is `Unscored`, never zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedResult {
    pub raw_text: String,
    pub score: Option<f64>,
    pub category: ScoreCategory,
    pub findings: Findings,
}

impl ParsedResult {
    pub fn from_response(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let score = parse_score(&raw_text);
        Self {
            category: ScoreCategory::from_score(score),
            score,
            findings: Findings::from_response(&raw_text),
            raw_text,
        }
    }
}

/// First percentage in range, else the first fraction scaled to a percentage.
pub fn parse_score(text: &str) -> Option<f64> {
    let percent = PERCENT
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .find(|v| (0.0..=100.0).contains(v));
    if percent.is_some() {
        return percent;
    }

    FRACTION.captures_iter(text).find_map(|caps| {
        let num = caps[1].parse::<f64>().ok()?;
        let den = caps[2].parse::<f64>().ok()?;
        if den <= 0.0 {
            return None;
        }
        Some(num * 100.0 / den).filter(|v| (0.0..=100.0).contains(v))
    })
}

/// Weighted combination of per-check scores, rounded to 2 decimals. `None`
/// when any check is unscored. Missing weights share the remainder equally.
pub fn combined_score(scores: &[Option<f64>], weights: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let values: Option<Vec<f64>> = scores.iter().copied().collect();
    let values = values?;

    let given: f64 = weights.iter().take(values.len()).sum();
    let missing = values.len().saturating_sub(weights.len());
    let fill = if missing > 0 {
        ((1.0 - given).max(0.0)) / missing as f64
    } else {
        0.0
    };
    let w: Vec<f64> = (0..values.len())
        .map(|i| weights.get(i).copied().unwrap_or(fill))
        .collect();
    let total: f64 = w.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let combined = values.iter().zip(&w).map(|(v, w)| v * w).sum::<f64>() / total;
    Some((combined * 100.0).round() / 100.0)
}

pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{s}%"),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_thresholds() {
        assert_eq!(ScoreCategory::from_score(Some(95.0)), ScoreCategory::Excellent);
        assert_eq!(ScoreCategory::from_score(Some(94.5)), ScoreCategory::ApprovedMinor);
        assert_eq!(ScoreCategory::from_score(Some(79.9)), ScoreCategory::NeedsRevision);
        assert_eq!(ScoreCategory::from_score(Some(69.99)), ScoreCategory::Rejected);
        assert_eq!(ScoreCategory::from_score(None), ScoreCategory::Unscored);
    }

    #[test]
    fn out_of_range_percent_skipped() {
        assert_eq!(parse_score("grew 150% but scored 72%"), Some(72.0));
    }

    #[test]
    fn zero_denominator_ignored() {
        assert_eq!(parse_score("ratio 3/0 then 9/10"), Some(90.0));
    }
}
