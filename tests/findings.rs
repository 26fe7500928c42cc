use doc_qc::{
    findings::{
        parse_check_table, parse_questions, risk_weighted_score, status_score, CheckRow, CheckStatus,
        Findings, RiskLevel,
    },
    score::ParsedResult,
};

const DRAWING_REVIEW: &str = "\
Drawing review for P&ID 100-PR-001 Rev C.

| Check Point | Status | Remarks | Score | Source Basis |
|-------------|--------|---------|-------|--------------|
| Title block | ✅ OK | Complete | 1 | 📎 Input Document |
| Revision history | Partial | Rev B entry missing date | 0.5 | 🔧 Engineering Logic |
| Legend/symbols | Not OK | Valve symbols not in legend | 0 | 💊 Good Engineering Practice |
| Tagging & numbering | Pass | | 1 | 📎 Input Document |

Overall Score: 62.5%
";

fn row(status: CheckStatus, risk: Option<RiskLevel>) -> CheckRow {
    CheckRow {
        check_point: "Scale & units".to_string(),
        status,
        remarks: String::new(),
        score: None,
        source_basis: String::new(),
        risk,
    }
}

#[test]
fn check_table_rows_are_structured() {
    let rows = parse_check_table(DRAWING_REVIEW);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].check_point, "Title block");
    assert_eq!(rows[0].status, CheckStatus::Ok);
    assert_eq!(rows[1].status, CheckStatus::Partial);
    assert_eq!(rows[1].remarks, "Rev B entry missing date");
    assert_eq!(rows[1].score, Some(0.5));
    assert_eq!(rows[2].status, CheckStatus::NotOk);
    assert_eq!(rows[2].source_basis, "💊 Good Engineering Practice");
    assert_eq!(rows[3].status, CheckStatus::Ok);
    assert_eq!(rows[3].remarks, "");
}

#[test]
fn columns_follow_the_header() {
    let text = "\
| # | Check Point | Risk | Status |
|---|---|---|---|
| 1 | Dimensions verified | High | Not OK |
| 2 | Orientation consistency | low | OK |
";
    let rows = parse_check_table(text);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].check_point, "Dimensions verified");
    assert_eq!(rows[0].risk, Some(RiskLevel::High));
    assert_eq!(rows[0].status, CheckStatus::NotOk);
    assert_eq!(rows[1].risk, Some(RiskLevel::Low));
    assert_eq!(rows[1].score, None);
}

#[test]
fn tables_without_check_points_are_ignored() {
    assert!(parse_check_table("| Item | Qty |\n|---|---|\n| Bolt | 4 |").is_empty());
}

#[test]
fn status_score_counts_partial_as_half() {
    let rows = parse_check_table(DRAWING_REVIEW);
    assert_eq!(status_score(&rows), Some(62.5));
    assert_eq!(status_score(&[]), None);
}

#[test]
fn risk_weighting() {
    let rows = [
        row(CheckStatus::Ok, Some(RiskLevel::High)),
        row(CheckStatus::NotOk, Some(RiskLevel::Medium)),
        row(CheckStatus::Partial, None),
    ];
    // (1*3 + 0*2 + 0.5*0.5) / (3 + 2 + 0.5)
    assert_eq!(risk_weighted_score(&rows), Some(59.09));
    assert_eq!(risk_weighted_score(&[]), None);
}

#[test]
fn review_questions_pick_up_following_details() {
    let text = "\
QA/QC review questions:
1. Is the design pressure consistent with the line list?
Status: ✅ OK
Source: Line list rev 4
Notes: Matches 16 barg
2. Are relief valve set points shown?
⚠️ Partial, PSV-101 only 🔧
3. Has the hazardous area classification been referenced?
";
    let qs = parse_questions(text);
    assert_eq!(qs.len(), 3);
    assert_eq!(qs[0].number, 1);
    assert_eq!(qs[0].question, "Is the design pressure consistent with the line list?");
    assert_eq!(qs[0].status, CheckStatus::Ok);
    assert_eq!(qs[0].source, "Line list rev 4");
    assert_eq!(qs[0].notes, "Matches 16 barg");
    assert_eq!(qs[1].status, CheckStatus::Partial);
    assert_eq!(qs[1].source, "Engineering Logic");
    assert_eq!(qs[2].status, CheckStatus::NotOk);
    assert_eq!(qs[2].source, "Not Available");
}

#[test]
fn parsed_result_carries_findings() {
    let parsed = ParsedResult::from_response(DRAWING_REVIEW);
    assert_eq!(parsed.score, Some(62.5));
    assert_eq!(parsed.findings.checks.len(), 4);
    assert_eq!(parsed.findings.status_score, Some(62.5));
    assert_eq!(parsed.findings.risk_weighted_score, Some(62.5));
    assert!(parsed.findings.questions.is_empty());

    let plain = Findings::from_response("Overall Score: 88%");
    assert!(plain.is_empty());
    assert_eq!(plain.status_score, None);
}
