mod common;

use covgate::diff::parse_diff;
use covgate::gate::{Rate, ThresholdGate, Verdict};
use covgate::matcher::match_report;
use covgate::model::CoverageReport;
use covgate::parsers::gcovr_json;

fn report(json: &str) -> CoverageReport {
    CoverageReport::from_data(gcovr_json::parse(json.as_bytes()).unwrap(), None)
}

fn run(diff_text: &str, json: &str, threshold: f64) -> Verdict {
    let changed = parse_diff(diff_text).files;
    let matches = match_report(&changed, &report(json));
    ThresholdGate::new(threshold)
        .unwrap()
        .evaluate_aggregate(matches)
}

/// +10,3 with hits 1, 0, 1 clears a 50% bar.
#[test]
fn mostly_covered_change_passes() {
    let diff_text = common::single_hunk_diff("x.cc", 10, 3);
    let json = common::summary_json("x.cc", &[(10, 1), (11, 0), (12, 1)]);

    let verdict = run(&diff_text, &json, 50.0);
    let Rate::Percent(pct) = verdict.rate else {
        panic!("expected a rate, got {:?}", verdict.rate);
    };
    assert!((pct - 200.0 / 3.0).abs() < 1e-9);
    assert!(verdict.passed);
    assert!(verdict.shortfalls.is_empty());
}

/// +10,3 with hits 0, 0, 1 falls short and names the missed lines.
#[test]
fn mostly_uncovered_change_fails() {
    let diff_text = common::single_hunk_diff("x.cc", 10, 3);
    let json = common::summary_json("x.cc", &[(10, 0), (11, 0), (12, 1)]);

    let verdict = run(&diff_text, &json, 50.0);
    assert!(!verdict.passed);
    assert_eq!(verdict.shortfalls.len(), 1);
    assert_eq!(verdict.shortfalls[0].path, "x.cc");
    assert_eq!(verdict.shortfalls[0].uncovered_lines, vec![10, 11]);
}

/// A changed file the report does not know has nothing to cover.
#[test]
fn change_outside_report_has_no_line_to_cover() {
    let diff_text = common::single_hunk_diff("docs/notes.cc", 1, 5);
    let json = common::summary_json("x.cc", &[(1, 0)]);

    let verdict = run(&diff_text, &json, 100.0);
    assert_eq!(verdict.rate, Rate::NoLineToCover);
    assert!(verdict.passed);
}

/// Changed lines that the report does not instrument are ignored.
#[test]
fn uninstrumented_changed_lines_have_no_line_to_cover() {
    let diff_text = common::single_hunk_diff("x.cc", 20, 2);
    let json = common::summary_json("x.cc", &[(10, 0), (11, 0)]);

    let verdict = run(&diff_text, &json, 100.0);
    assert_eq!(verdict.rate, Rate::NoLineToCover);
    assert!(verdict.passed);
}

#[test]
fn header_only_diff_passes() {
    let json = common::summary_json("x.cc", &[(1, 0)]);
    let verdict = run("diff --git a/x.cc b/x.cc\n", &json, 80.0);
    assert_eq!(verdict.rate, Rate::NoLineToCover);
    assert!(verdict.passed);
}

#[test]
fn threshold_boundary_is_inclusive() {
    let diff_text = common::single_hunk_diff("x.cc", 1, 4);
    let json = common::summary_json("x.cc", &[(1, 1), (2, 1), (3, 0), (4, 0)]);

    assert!(run(&diff_text, &json, 50.0).passed);
    assert!(!run(&diff_text, &json, 50.5).passed);
}

#[test]
fn evaluation_is_idempotent() {
    let diff_text = common::single_hunk_diff("x.cc", 10, 3);
    let json = common::summary_json("x.cc", &[(10, 0), (11, 0), (12, 1)]);

    assert_eq!(run(&diff_text, &json, 50.0), run(&diff_text, &json, 50.0));
}

#[test]
fn report_file_order_does_not_matter() {
    let diff_text = format!(
        "{}{}",
        common::single_hunk_diff("a.cc", 1, 2),
        common::single_hunk_diff("b.cc", 5, 2)
    );
    let forward = r#"{"files": [
        {"file": "a.cc", "lines": [{"line_number": 1, "count": 1}, {"line_number": 2, "count": 0}]},
        {"file": "b.cc", "lines": [{"line_number": 5, "count": 0}, {"line_number": 6, "count": 2}]}
    ]}"#;
    let backward = r#"{"files": [
        {"file": "b.cc", "lines": [{"line_number": 6, "count": 2}, {"line_number": 5, "count": 0}]},
        {"file": "a.cc", "lines": [{"line_number": 2, "count": 0}, {"line_number": 1, "count": 1}]}
    ]}"#;

    let a = run(&diff_text, forward, 80.0);
    let b = run(&diff_text, backward, 80.0);
    assert_eq!(a, b);
    assert_eq!(a.rate, Rate::Percent(50.0));
}
