//! This module implements the output contract: it parses the single result line printed by a
//! harness program and compares the reported result against the expected output of a test case.
//!

use serde_json::{Map, Number, Value};

use sandbox::ExecutionResult;

use crate::{ExpectedOutput, FailureKind, TestCase, TestCaseResult};

/// A parsed result line.
#[derive(Clone, Debug, PartialEq)]
pub enum ContractLine {
    /// The entry point returned. The result is `None` when the harness omitted it, e.g. for a
    /// JavaScript entry point returning `undefined`.
    Success(Option<Value>),

    /// The entry point raised an error, described by the given message.
    Failure(String),
}

/// Parse the result line out of the stdout of a harness program. The result line is the last
/// non-empty line; anything the candidate printed before it is ignored.
pub fn parse_contract_line(stdout: &str) -> Result<ContractLine, String> {
    let line = match stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
        Some(line) => line,
        None => return Err(String::from("program produced no output")),
    };

    let mut object = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return Err(format!("result line is not a JSON object: {}", line)),
        Err(e) => return Err(format!("result line is not valid JSON: {}", e)),
    };

    match object.get("success") {
        Some(Value::Bool(true)) => Ok(ContractLine::Success(object.remove("result"))),
        Some(Value::Bool(false)) => Ok(ContractLine::Failure(failure_message(&mut object))),
        Some(_) => Err(String::from("\"success\" field of the result line is not a boolean")),
        None => Err(String::from("result line has no \"success\" field")),
    }
}

fn failure_message(object: &mut Map<String, Value>) -> String {
    match object.remove("error") {
        Some(Value::String(message)) => message,
        Some(Value::Null) | None => String::from("entry point raised an error"),
        Some(other) => other.to_string(),
    }
}

/// Compare `actual` against `expected`, returning a description of the first difference found.
/// Numbers that are both integers compare exactly; every other pair of numbers compares with the
/// relative tolerance `tolerance`.
pub fn first_difference(expected: &Value, actual: &Value, tolerance: f64) -> Option<String> {
    difference_at("$", expected, actual, tolerance)
}

fn difference_at(path: &str, expected: &Value, actual: &Value, tolerance: f64) -> Option<String> {
    match (expected, actual) {
        (Value::Number(e), Value::Number(a)) => {
            if numbers_equal(e, a, tolerance) {
                None
            } else {
                Some(format!("{}: expected {}, found {}", path, e, a))
            }
        },
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return Some(format!("{}: expected {} elements, found {}", path, e.len(), a.len()));
            }
            e.iter().zip(a.iter())
                .enumerate()
                .find_map(|(i, (e, a))| difference_at(&format!("{}[{}]", path, i), e, a, tolerance))
        },
        (Value::Object(e), Value::Object(a)) => {
            if let Some(key) = e.keys().find(|k| !a.contains_key(*k)) {
                return Some(format!("{}: missing key \"{}\"", path, key));
            }
            if let Some(key) = a.keys().find(|k| !e.contains_key(*k)) {
                return Some(format!("{}: unexpected key \"{}\"", path, key));
            }
            e.iter().find_map(|(key, e)| {
                difference_at(&format!("{}.{}", path, key), e, &a[key], tolerance)
            })
        },
        (e, a) if e == a => None,
        (e, a) => Some(format!("{}: expected {}, found {}", path, e, a)),
    }
}

fn numbers_equal(expected: &Number, actual: &Number, tolerance: f64) -> bool {
    let integral = |n: &Number| n.is_i64() || n.is_u64();
    if integral(expected) && integral(actual) {
        return expected == actual;
    }

    match (expected.as_f64(), actual.as_f64()) {
        (Some(e), Some(a)) => {
            let scale = 1f64.max(e.abs()).max(a.abs());
            (e - a).abs() <= tolerance * scale
        },
        _ => false,
    }
}

/// Turn the outcome of a harness run into the verdict of the given test case.
/// `default_tolerance` applies unless the test case carries its own tolerance.
pub fn evaluate(execution: &ExecutionResult, test_case: &TestCase, default_tolerance: f64)
    -> TestCaseResult {
    let mut result = judge(execution, test_case, default_tolerance);
    result.elapsed_ms = execution.elapsed_ms;
    result
}

fn judge(execution: &ExecutionResult, test_case: &TestCase, default_tolerance: f64)
    -> TestCaseResult {
    if !execution.success {
        let kind = if execution.timed_out {
            FailureKind::TimedOut
        } else if execution.cancelled {
            FailureKind::Cancelled
        } else {
            FailureKind::RunFailed
        };
        let reason = execution.failure_reason()
            .unwrap_or_else(|| String::from("program failed"));
        return TestCaseResult::failed(test_case, kind, reason);
    }

    let line = match parse_contract_line(&execution.stdout) {
        Ok(line) => line,
        Err(message) => {
            let mut result = TestCaseResult::failed(test_case, FailureKind::MalformedOutput,
                message);
            result.raw_output = Some(execution.stdout.clone());
            return result;
        },
    };

    let actual = match line {
        ContractLine::Success(actual) => actual,
        ContractLine::Failure(message) => {
            return TestCaseResult::failed(test_case, FailureKind::CandidateRuntimeError, message);
        },
    };

    let mismatch = match (&test_case.expected_output, &actual) {
        (ExpectedOutput::AnyNonNull, Some(Value::Null)) | (ExpectedOutput::AnyNonNull, None) =>
            Some(String::from("expected a non-null result, found none")),
        (ExpectedOutput::AnyNonNull, Some(_)) => None,
        (ExpectedOutput::Value(expected), actual) => {
            let tolerance = test_case.tolerance.unwrap_or(default_tolerance);
            first_difference(expected, actual.as_ref().unwrap_or(&Value::Null), tolerance)
        },
    };

    match (mismatch, actual) {
        (None, Some(actual)) => TestCaseResult::passed(test_case, actual, 0),
        (None, None) => TestCaseResult::passed(test_case, Value::Null, 0),
        (Some(message), actual) => {
            let mut result = TestCaseResult::failed(test_case, FailureKind::OutputMismatch,
                message);
            result.actual_output = actual;
            result
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use sandbox::ProcessExitStatus;

    const TOL: f64 = 1e-9;

    fn exited(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            success: true,
            stdout: stdout.to_owned(),
            stderr: String::new(),
            exit_code: Some(0),
            elapsed_ms: 17,
            timed_out: false,
            cancelled: false,
            output_truncated: false,
            exit_status: ProcessExitStatus::Normal(0),
            error: None,
        }
    }

    fn case(expected: Value) -> TestCase {
        TestCase::new("tc", json!(null), expected)
    }

    #[test]
    fn last_non_empty_line_is_the_result_line() {
        let stdout = "debug output\n{\"success\":true,\"result\":[1]}\n\n  \n";
        assert_eq!(Ok(ContractLine::Success(Some(json!([1])))), parse_contract_line(stdout));
    }

    #[test]
    fn malformed_result_lines() {
        assert!(parse_contract_line("").is_err());
        assert!(parse_contract_line("42\n").is_err());
        assert!(parse_contract_line("{\"result\":1}").is_err());
        assert!(parse_contract_line("{\"success\":\"yes\"}").is_err());
        assert!(parse_contract_line("{\"success\":true,\"result\":1}\ntrailing").is_err());
    }

    #[test]
    fn failure_line_carries_the_error() {
        assert_eq!(Ok(ContractLine::Failure(String::from("boom"))),
            parse_contract_line("{\"success\":false,\"error\":\"boom\"}"));
        assert_eq!(Ok(ContractLine::Failure(String::from("entry point raised an error"))),
            parse_contract_line("{\"success\":false}"));
    }

    #[test]
    fn arrays_are_order_sensitive() {
        assert!(first_difference(&json!([1, 2, 3]), &json!([3, 2, 1]), TOL).is_some());
        assert!(first_difference(&json!([1, 2]), &json!([1, 2, 3]), TOL).is_some());
        assert!(first_difference(&json!([1, [2, 3]]), &json!([1, [2, 3]]), TOL).is_none());
    }

    #[test]
    fn objects_ignore_key_order() {
        assert!(first_difference(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1}), TOL).is_none());
        assert_eq!(Some(String::from("$: missing key \"b\"")),
            first_difference(&json!({"a": 1, "b": 2}), &json!({"a": 1}), TOL));
        assert_eq!(Some(String::from("$: unexpected key \"c\"")),
            first_difference(&json!({"a": 1}), &json!({"a": 1, "c": 3}), TOL));
    }

    #[test]
    fn difference_reports_the_path() {
        assert_eq!(Some(String::from("$.a[1]: expected 2, found 5")),
            first_difference(&json!({"a": [1, 2]}), &json!({"a": [1, 5]}), TOL));
    }

    #[test]
    fn numbers_follow_the_epsilon_policy() {
        assert!(first_difference(&json!(0.3), &json!(0.1 + 0.2), TOL).is_none());
        assert!(first_difference(&json!(2), &json!(2.0), TOL).is_none());
        assert!(first_difference(&json!(1e20), &json!(1.0000000000001e20), TOL).is_none());
        assert!(first_difference(&json!(0.3), &json!(0.1 + 0.2), 0.0).is_some());
        assert!(first_difference(&json!(9007199254740993u64), &json!(9007199254740992u64), TOL)
            .is_some());
        assert!(first_difference(&json!(1), &json!("1"), TOL).is_some());
    }

    #[test]
    fn failed_run_is_classified() {
        let mut execution = exited("");
        execution.success = false;
        execution.timed_out = true;
        execution.exit_status = ProcessExitStatus::RealTimeLimitExceeded;
        execution.error = Some(String::from("real time limit exceeded"));

        let result = evaluate(&execution, &case(json!(1)), TOL);
        assert_eq!(Some(FailureKind::TimedOut), result.failure);
        assert_eq!(17, result.elapsed_ms);

        let mut execution = exited("{\"success\":true,\"result\":1}");
        execution.success = false;
        execution.exit_code = Some(3);
        execution.exit_status = ProcessExitStatus::Normal(3);
        execution.stderr = String::from("Traceback\n");

        let result = evaluate(&execution, &case(json!(1)), TOL);
        assert_eq!(Some(FailureKind::RunFailed), result.failure);
        assert_eq!(Some(String::from("Traceback")), result.error);
    }

    #[test]
    fn malformed_output_keeps_raw_stdout() {
        let result = evaluate(&exited("hello\n"), &case(json!(1)), TOL);

        assert!(!result.passed);
        assert_eq!(Some(FailureKind::MalformedOutput), result.failure);
        assert_eq!(Some(String::from("hello\n")), result.raw_output);
        assert_eq!(17, result.elapsed_ms);
    }

    #[test]
    fn candidate_error_is_reported() {
        let result = evaluate(&exited("{\"success\":false,\"error\":\"ValueError: x\"}"),
            &case(json!(1)), TOL);

        assert_eq!(Some(FailureKind::CandidateRuntimeError), result.failure);
        assert_eq!(Some(String::from("ValueError: x")), result.error);
    }

    #[test]
    fn matching_result_passes() {
        let result = evaluate(&exited("{\"success\":true,\"result\":42}"), &case(json!(42)), TOL);

        assert!(result.passed);
        assert_eq!(None, result.failure);
        assert_eq!(Some(json!(42)), result.actual_output);
        assert_eq!(17, result.elapsed_ms);
    }

    #[test]
    fn mismatching_result_keeps_the_actual_output() {
        let result = evaluate(&exited("{\"success\":true,\"result\":41}"), &case(json!(42)), TOL);

        assert_eq!(Some(FailureKind::OutputMismatch), result.failure);
        assert_eq!(Some(json!(41)), result.actual_output);
    }

    #[test]
    fn sentinel_accepts_any_non_null_result() {
        for value in &[json!(0), json!(false), json!(""), json!([]), json!({"k": null})] {
            let stdout = format!("{{\"success\":true,\"result\":{}}}", value);
            assert!(evaluate(&exited(&stdout), &case(json!(true)), TOL).passed, "{}", value);
        }

        let null = evaluate(&exited("{\"success\":true,\"result\":null}"), &case(json!(true)), TOL);
        assert_eq!(Some(FailureKind::OutputMismatch), null.failure);

        let absent = evaluate(&exited("{\"success\":true}"), &case(json!(true)), TOL);
        assert_eq!(Some(FailureKind::OutputMismatch), absent.failure);
    }

    #[test]
    fn absent_result_compares_as_null() {
        let result = evaluate(&exited("{\"success\":true}"), &case(json!(null)), TOL);
        assert!(result.passed);
    }

    #[test]
    fn test_case_tolerance_overrides_default() {
        let mut tc = case(json!(1.0));
        tc.tolerance = Some(0.1);

        assert!(evaluate(&exited("{\"success\":true,\"result\":1.05}"), &tc, TOL).passed);
        assert!(!evaluate(&exited("{\"success\":true,\"result\":1.05}"), &case(json!(1.0)), TOL)
            .passed);
    }
}
