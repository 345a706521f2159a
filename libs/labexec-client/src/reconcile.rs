/// Result Reconciliation - Language-Agnostic Verdict Logic
///
/// **Core Responsibility:**
/// Compare captured outputs against the expected outputs of the submitted
/// request and derive per-test and aggregate verdicts.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP or polling
/// - Pure function: (request, execution result) → reconciled result
/// - Output order mirrors the request's test case order; ids are never
///   dropped, duplicated, or reordered
///
/// **Comparison Rules:**
/// - No expected output (or only whitespace) → passed, capture only
/// - Otherwise both sides are trimmed and the test passes when the actual
///   output equals the expected output OR contains it
/// - Case sensitive, no float tolerance
///
/// **Aggregate Rules:**
/// - status: `success` iff every test passed, `error` otherwise
/// - total duration: sum of per-test durations

use crate::error::{ExecutorError, Result};
use labexec_common::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, TestCase, TestCaseResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Normalize output string for comparison
fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Contains-or-equals comparison on trimmed output
pub fn output_matches(actual: &str, expected: Option<&str>) -> bool {
    let expected = normalize_output(expected.unwrap_or(""));
    if expected.is_empty() {
        return true;
    }

    let actual = normalize_output(actual);
    actual == expected || actual.contains(expected)
}

/// Recompute one test's verdict against its definition in the request
pub fn evaluate_test(test_case: &TestCase, raw: &TestCaseResult) -> TestCaseResult {
    let passed = output_matches(&raw.stdout, test_case.expected_output.as_deref());

    TestCaseResult {
        id: test_case.id,
        passed,
        input: test_case.input.clone(),
        expected: test_case.expected_output.clone(),
        ..raw.clone()
    }
}

/// Rebuild `result` in request order with locally computed verdicts
///
/// The result set must cover exactly the request's test case ids; anything
/// else means the service and client disagree on the job and is reported as
/// `InvalidResponse`.
pub fn reconcile(request: &ExecutionRequest, result: &ExecutionResult) -> Result<ExecutionResult> {
    let mut by_id: HashMap<u32, &TestCaseResult> = HashMap::with_capacity(result.results.len());
    for raw in &result.results {
        if by_id.insert(raw.id, raw).is_some() {
            return Err(ExecutorError::invalid_response(format!(
                "duplicate result for test case {}",
                raw.id
            )));
        }
    }

    let mut results = Vec::with_capacity(request.test_cases.len());
    for test_case in &request.test_cases {
        let raw = by_id.remove(&test_case.id).ok_or_else(|| {
            ExecutorError::invalid_response(format!("missing result for test case {}", test_case.id))
        })?;

        let reconciled = evaluate_test(test_case, raw);
        debug!(
            test_id = reconciled.id,
            passed = reconciled.passed,
            ok = reconciled.ok,
            timed_out = reconciled.timed_out,
            duration_ms = reconciled.duration_ms,
            "Test reconciled"
        );
        results.push(reconciled);
    }

    if let Some(extra) = by_id.keys().min() {
        return Err(ExecutorError::invalid_response(format!(
            "result for unknown test case {}",
            extra
        )));
    }

    Ok(aggregate(result, results))
}

fn aggregate(raw: &ExecutionResult, results: Vec<TestCaseResult>) -> ExecutionResult {
    let all_passed = results.iter().all(|r| r.passed);
    let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();

    ExecutionResult {
        compiled: raw.compiled,
        language: raw.language.clone(),
        status: Some(if all_passed {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Error
        }),
        message: raw.message.clone(),
        results,
        total_duration_ms,
    }
}

/// Submission verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// Marks awarded for a reconciled result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub tests_passed: usize,
    pub total_tests: usize,
    pub score: u32,
    pub max_score: u32,
    pub verdict: Verdict,
}

/// score = round(passed / max(total, 1) * marks); accepted iff all passed
pub fn grade(result: &ExecutionResult, marks: u32) -> Grade {
    let tests_passed = result.passed_count();
    let total_tests = result.results.len();
    let ratio = tests_passed as f64 / total_tests.max(1) as f64;
    let score = (ratio * marks as f64).round() as u32;

    Grade {
        tests_passed,
        total_tests,
        score,
        max_score: marks,
        verdict: if tests_passed == total_tests {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        },
    }
}
