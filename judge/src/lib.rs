//! This crate implements the execution engine of the benchmark judge. Given a candidate solution,
//! a target language and a set of test cases, the engine materializes a harness program for every
//! test case, compiles and runs it through the `sandbox` crate and turns the harness output into a
//! verdict.
//!

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
extern crate sandbox;
extern crate serde;
extern crate serde_json;
extern crate serde_yaml;
extern crate tempfile;

pub mod config;
pub mod engine;
pub mod harness;
pub mod languages;

use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer, Deserialize, Deserializer};
use serde_json::Value;

pub use config::EngineConfig;
pub use engine::{JudgeEngine, ExecutionOptions};
pub use languages::{Language, LanguageProfile};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Sandbox(::sandbox::Error, ::sandbox::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
        Yaml(::serde_yaml::Error);
    }

    errors {
        UnsupportedLanguage(name: String) {
            description("unsupported language")
            display("unsupported language: \"{}\"", name)
        }

        InvalidConfigFile {
            description("invalid config file")
        }
    }
}


/// Expected output of a test case.
///
/// The JSON literal `true` is a sentinel meaning "any result that is present and not null is
/// acceptable". Every other JSON value is compared structurally against the candidate's result.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpectedOutput {
    /// Any present, non-null result passes.
    AnyNonNull,

    /// The result must be structurally equal to the given value.
    Value(Value),
}

impl ExpectedOutput {
    /// Get the JSON value this expected output was deserialized from.
    pub fn to_value(&self) -> Value {
        match self {
            ExpectedOutput::AnyNonNull => Value::Bool(true),
            ExpectedOutput::Value(v) => v.clone(),
        }
    }
}

impl From<Value> for ExpectedOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(true) => ExpectedOutput::AnyNonNull,
            v => ExpectedOutput::Value(v),
        }
    }
}

impl Default for ExpectedOutput {
    fn default() -> Self {
        ExpectedOutput::Value(Value::Null)
    }
}

impl Serialize for ExpectedOutput {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where S: Serializer {
        match self {
            ExpectedOutput::AnyNonNull => serializer.serialize_bool(true),
            ExpectedOutput::Value(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ExpectedOutput {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
        where D: Deserializer<'de> {
        Value::deserialize(deserializer).map(ExpectedOutput::from)
    }
}

/// A test case of a challenge, as provided by the challenge repository.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Identifier of the test case.
    pub id: String,

    /// Human readable name of the test case.
    #[serde(default)]
    pub name: String,

    /// Input passed to the candidate's entry point.
    #[serde(default)]
    pub input: Value,

    /// Expected result of the candidate's entry point.
    #[serde(default)]
    pub expected_output: ExpectedOutput,

    /// Is this test case hidden from the candidate?
    #[serde(default)]
    pub is_hidden: bool,

    /// Points awarded for passing this test case.
    #[serde(default)]
    pub points: f64,

    /// Real time limit of this test case in milliseconds, overriding challenge and engine
    /// defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Relative tolerance for comparing non-integral numbers, overriding the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl TestCase {
    /// Create a new `TestCase` instance with the given id, input and expected output. Every other
    /// field takes its default value.
    pub fn new<T>(id: T, input: Value, expected_output: Value) -> Self
        where T: Into<String> {
        TestCase {
            id: id.into(),
            name: String::new(),
            input,
            expected_output: ExpectedOutput::from(expected_output),
            is_hidden: false,
            points: 0.0,
            timeout: None,
            tolerance: None,
        }
    }
}

/// Challenge level defaults applied to every test case of a submission.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeLimits {
    /// Default real time limit of test cases, in milliseconds.
    #[serde(default)]
    pub time_limit: Option<u64>,

    /// Memory limit of the candidate program, in bytes.
    #[serde(default)]
    pub memory_limit: Option<u64>,
}

/// Kind of failure of a test case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The requested language is not supported.
    UnsupportedLanguage,

    /// The compiler rejected the harness program, or could not be run.
    CompileFailed,

    /// The program exited abnormally without reporting a result.
    RunFailed,

    /// The program was killed because it exceeded its real time limit.
    TimedOut,

    /// The program's output does not follow the result line contract.
    MalformedOutput,

    /// The candidate's entry point raised an error, reported by the harness.
    CandidateRuntimeError,

    /// The candidate's result does not match the expected output.
    OutputMismatch,

    /// The execution was cancelled.
    Cancelled,

    /// The engine itself failed, e.g. the scratch directory is not writable.
    Internal,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(match self {
            FailureKind::UnsupportedLanguage => "unsupported language",
            FailureKind::CompileFailed => "compile failed",
            FailureKind::RunFailed => "run failed",
            FailureKind::TimedOut => "timed out",
            FailureKind::MalformedOutput => "malformed output",
            FailureKind::CandidateRuntimeError => "candidate runtime error",
            FailureKind::OutputMismatch => "output mismatch",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal error",
        }, f)
    }
}

/// Verdict of one test case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// Identifier of the test case.
    pub test_case_id: String,

    /// Did the candidate pass the test case?
    pub passed: bool,

    /// The result reported by the harness, if any.
    pub actual_output: Option<Value>,

    /// The expected output of the test case.
    pub expected_output: ExpectedOutput,

    /// Description of the failure, if the test case did not pass.
    pub error: Option<String>,

    /// Kind of the failure, if the test case did not pass.
    pub failure: Option<FailureKind>,

    /// Real time spent in the run phase, in milliseconds.
    pub elapsed_ms: u64,

    /// Real time spent in the compile phase, in milliseconds, for compiled languages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_elapsed_ms: Option<u64>,

    /// Raw stdout of the program, kept when it could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl TestCaseResult {
    /// Create a `TestCaseResult` describing a passed test case.
    pub fn passed(test_case: &TestCase, actual_output: Value, elapsed_ms: u64) -> Self {
        TestCaseResult {
            test_case_id: test_case.id.clone(),
            passed: true,
            actual_output: Some(actual_output),
            expected_output: test_case.expected_output.clone(),
            error: None,
            failure: None,
            elapsed_ms,
            compile_elapsed_ms: None,
            raw_output: None,
        }
    }

    /// Create a `TestCaseResult` describing a failed test case.
    pub fn failed<T>(test_case: &TestCase, kind: FailureKind, error: T) -> Self
        where T: Into<String> {
        TestCaseResult {
            test_case_id: test_case.id.clone(),
            passed: false,
            actual_output: None,
            expected_output: test_case.expected_output.clone(),
            error: Some(error.into()),
            failure: Some(kind),
            elapsed_ms: 0,
            compile_elapsed_ms: None,
            raw_output: None,
        }
    }
}
