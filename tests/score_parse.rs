use doc_qc::score::{combined_score, format_score, parse_score, ParsedResult, ScoreCategory};

#[test]
fn percentage_first() {
    assert_eq!(parse_score("Overall Score: 87.5%"), Some(87.5));
    assert_eq!(parse_score("Score 90 % (see 3/4 items)"), Some(90.0));
}

#[test]
fn fraction_scaled_to_percent() {
    assert_eq!(parse_score("42/50"), Some(84.0));
    assert_eq!(parse_score("Compliance: 7 / 8 criteria"), Some(87.5));
}

#[test]
fn no_score_is_none() {
    assert_eq!(parse_score("no numeric content"), None);
    assert_eq!(parse_score(""), None);
}

#[test]
fn unscored_is_not_rejected() {
    let parsed = ParsedResult::from_response("The document could not be assessed.");
    assert_eq!(parsed.score, None);
    assert_eq!(parsed.category, ScoreCategory::Unscored);

    let parsed = ParsedResult::from_response("Final score: 0%");
    assert_eq!(parsed.score, Some(0.0));
    assert_eq!(parsed.category, ScoreCategory::Rejected);
}

#[test]
fn categories_from_responses() {
    let parsed = ParsedResult::from_response("**Overall Score: 96%**\nApproved.");
    assert_eq!(parsed.category, ScoreCategory::Excellent);
    assert_eq!(parsed.category.label(), "Approved – Excellent");
    assert_eq!(parsed.category.action(), "No or minor comments");
    assert_eq!(ScoreCategory::Rejected.action(), "Major issues, rework essential");
    assert_eq!(
        ParsedResult::from_response("Score: 84/100").category,
        ScoreCategory::ApprovedMinor
    );
    assert_eq!(
        ParsedResult::from_response("Score: 72%").category,
        ScoreCategory::NeedsRevision
    );
}

#[test]
fn combined_score_weights() {
    assert_eq!(combined_score(&[Some(80.0), Some(91.0)], &[0.5, 0.5]), Some(85.5));
    assert_eq!(combined_score(&[Some(80.0), Some(90.0)], &[]), Some(85.0));
    assert_eq!(combined_score(&[Some(70.0), Some(100.0)], &[0.75, 0.25]), Some(77.5));
    assert_eq!(combined_score(&[Some(80.0), None], &[0.5, 0.5]), None);
    assert_eq!(combined_score(&[], &[]), None);
    assert_eq!(combined_score(&[Some(33.333), Some(66.667)], &[0.3, 0.7]), Some(56.67));
}

#[test]
fn formatting() {
    assert_eq!(format_score(Some(87.5)), "87.5%");
    assert_eq!(format_score(Some(84.0)), "84%");
    assert_eq!(format_score(None), "N/A");
}
