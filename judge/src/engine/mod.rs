//! This module implements the very core logic of the judge, or the engine's logic. The judge
//! engine executes a candidate solution against test cases and produces one `TestCaseResult` per
//! test case, in the order the test cases were given.
//!

mod artifact;
mod contract;
mod pipeline;

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sandbox::{CancellationToken, ContainerRunner, MemorySize, NativeRunner, Runner};

use crate::{ChallengeLimits, EngineConfig, FailureKind, Result, TestCase, TestCaseResult};
use crate::harness;
use crate::languages::{self, Language, LanguageProfile};
use artifact::ExecutionArtifact;
use pipeline::{Pipeline, PipelineOutcome};

pub use contract::{parse_contract_line, first_difference, ContractLine};

/// Per-submission options of an execution.
#[derive(Clone, Debug, Default)]
pub struct ExecutionOptions {
    /// Challenge level defaults applied to every test case.
    pub limits: ChallengeLimits,

    /// Token that interrupts the execution. In-flight programs are killed and pending test cases
    /// resolve to `Cancelled` results.
    pub cancellation: CancellationToken,
}

/// A judge engine instance.
pub struct JudgeEngine {
    /// Configuration of the judge engine.
    config: EngineConfig,

    /// Runner of compile phases, and of run phases outside of sandbox mode.
    native: NativeRunner,

    /// Runners of run phases in sandbox mode, per language.
    containers: HashMap<Language, ContainerRunner>,
}

// This implementation block implements creation logic of `JudgeEngine`.
impl JudgeEngine {
    /// Create a new `JudgeEngine` object with the default configuration.
    pub fn new() -> Self {
        JudgeEngine::with_config(EngineConfig::default())
    }

    /// Create a new `JudgeEngine` object using the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let native = NativeRunner {
            use_native_rlimit: config.native_rlimits,
            output_limit: config.output_limit_bytes,
        };

        let mut containers = HashMap::new();
        if config.use_sandbox {
            for &language in Language::ALL.iter() {
                let mut runner = ContainerRunner::new(
                    config.container.runtime.clone(), config.container.image(language));
                runner.limits = config.container.limits(config.memory_limit_bytes);
                runner.startup_allowance =
                    Duration::from_millis(config.container.startup_allowance_ms);
                runner.output_limit = config.output_limit_bytes;
                containers.insert(language, runner);
            }
        }

        JudgeEngine {
            config,
            native,
            containers,
        }
    }

    /// Get the configuration of this judge engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for JudgeEngine {
    fn default() -> Self {
        JudgeEngine::new()
    }
}

// This implementation block implements the public execution interface of `JudgeEngine`.
impl JudgeEngine {
    /// Execute the candidate against a single test case.
    pub fn execute_test_case(&self, code: &str, language: &str, test_case: &TestCase)
        -> TestCaseResult {
        let mut results = self.execute_with_tests(code, language, std::slice::from_ref(test_case));
        match results.pop() {
            Some(result) => result,
            None => TestCaseResult::failed(test_case, FailureKind::Internal,
                "test case was not executed"),
        }
    }

    /// Execute the candidate against every given test case with default options.
    pub fn execute_with_tests(&self, code: &str, language: &str, test_cases: &[TestCase])
        -> Vec<TestCaseResult> {
        self.execute_with_options(code, language, test_cases, &ExecutionOptions::default())
    }

    /// Execute the candidate against every given test case. Failures of any kind are reported in
    /// the returned results, which are in the same order as `test_cases`.
    pub fn execute_with_options(&self, code: &str, language: &str, test_cases: &[TestCase],
        options: &ExecutionOptions) -> Vec<TestCaseResult> {
        let profile = match languages::profile_for(language) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Rejecting submission: {}", e);
                let message = e.to_string();
                return test_cases.iter()
                    .map(|tc| TestCaseResult::failed(tc, FailureKind::UnsupportedLanguage,
                        message.clone()))
                    .collect();
            },
        };

        let workers = std::cmp::min(self.config.workers(), test_cases.len());
        info!("Executing {} test cases of a {} submission with {} workers",
            test_cases.len(), profile.language(), workers);

        if workers <= 1 {
            test_cases.iter()
                .map(|tc| self.execute_guarded(profile, code, tc, options))
                .collect()
        } else {
            self.execute_concurrently(workers, profile, code, test_cases, options)
        }
    }
}

// This implementation block implements the execution of individual test cases.
impl JudgeEngine {
    /// Execute test cases on a pool of `workers` scoped threads. Each thread claims the next
    /// unclaimed test case until none remain.
    fn execute_concurrently(&self, workers: usize, profile: &'static dyn LanguageProfile,
        code: &str, test_cases: &[TestCase], options: &ExecutionOptions) -> Vec<TestCaseResult> {
        let next = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<TestCaseResult>>> = test_cases.iter()
            .map(|_| Mutex::new(None))
            .collect();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let test_case = match test_cases.get(index) {
                        Some(tc) => tc,
                        None => break,
                    };
                    let result = self.execute_guarded(profile, code, test_case, options);
                    *slots[index].lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
                });
            }
        });

        slots.into_iter()
            .zip(test_cases.iter())
            .map(|(slot, tc)| {
                slot.into_inner()
                    .unwrap_or_else(|e| e.into_inner())
                    .unwrap_or_else(|| TestCaseResult::failed(tc, FailureKind::Internal,
                        "test case was not executed"))
            })
            .collect()
    }

    /// Execute one test case, converting engine errors and panics into `Internal` results.
    fn execute_guarded(&self, profile: &'static dyn LanguageProfile, code: &str,
        test_case: &TestCase, options: &ExecutionOptions) -> TestCaseResult {
        if options.cancellation.is_cancelled() {
            return TestCaseResult::failed(test_case, FailureKind::Cancelled,
                "execution cancelled");
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute_one(profile, code, test_case, options)
        }));
        match outcome {
            Ok(Ok(result)) => {
                debug!("Test case {}: {}", test_case.id, match result.failure {
                    Some(kind) => kind.to_string(),
                    None => String::from("passed"),
                });
                result
            },
            Ok(Err(e)) => {
                error!("Failed to execute test case {}: {}", test_case.id, e);
                TestCaseResult::failed(test_case, FailureKind::Internal, e.to_string())
            },
            Err(payload) => {
                let message = panic_message(&*payload);
                error!("Panic while executing test case {}: {}", test_case.id, message);
                TestCaseResult::failed(test_case, FailureKind::Internal,
                    format!("engine panicked: {}", message))
            },
        }
    }

    fn execute_one(&self, profile: &'static dyn LanguageProfile, code: &str,
        test_case: &TestCase, options: &ExecutionOptions) -> Result<TestCaseResult> {
        let harness = harness::materialize(profile, code, &test_case.input)?;
        let artifact = ExecutionArtifact::create(&self.config.scratch_dir(), &harness)?;

        let timeout = self.effective_timeout(test_case, &options.limits);
        let pipeline = Pipeline {
            profile,
            compiler: &self.native,
            runner: self.runner_for(profile.language()),
            compile_timeout: self.compile_timeout(timeout),
            timeout,
            memory_limit: Some(self.effective_memory_limit(&options.limits)),
            cancellation: &options.cancellation,
        };
        let outcome = pipeline.execute(&artifact);
        artifact.close();

        let result = match outcome {
            PipelineOutcome::CompileFailed { diagnostics, compile_elapsed_ms } => {
                let mut result = TestCaseResult::failed(test_case, FailureKind::CompileFailed,
                    diagnostics);
                result.compile_elapsed_ms = Some(compile_elapsed_ms);
                result
            },
            PipelineOutcome::Cancelled { compile_elapsed_ms } => {
                let mut result = TestCaseResult::failed(test_case, FailureKind::Cancelled,
                    "execution cancelled");
                result.compile_elapsed_ms = compile_elapsed_ms;
                result
            },
            PipelineOutcome::Ran { compile_elapsed_ms, execution } => {
                let tolerance = self.config.float_tolerance;
                let mut result = contract::evaluate(&execution, test_case, tolerance);
                result.compile_elapsed_ms = compile_elapsed_ms;
                result
            },
        };
        Ok(result)
    }

    /// Get the runner of run phases of the given language.
    fn runner_for(&self, language: Language) -> &dyn Runner {
        match self.containers.get(&language) {
            Some(runner) => runner as &dyn Runner,
            None => &self.native,
        }
    }

    /// Get the real time limit of the given test case. The test case's own limit takes precedence
    /// over the challenge's, which takes precedence over the engine's.
    fn effective_timeout(&self, test_case: &TestCase, limits: &ChallengeLimits) -> Duration {
        let ms = test_case.timeout
            .or(limits.time_limit)
            .unwrap_or(self.config.timeout_ms);
        Duration::from_millis(ms)
    }

    /// Get the real time limit of a compile phase. Compilation is never held to a run limit
    /// tighter than the engine's default.
    fn compile_timeout(&self, run_timeout: Duration) -> Duration {
        std::cmp::max(self.config.timeout(), run_timeout)
    }

    fn effective_memory_limit(&self, limits: &ChallengeLimits) -> MemorySize {
        MemorySize::Bytes(limits.memory_limit.unwrap_or(self.config.memory_limit_bytes))
    }
}

/// Extract the message of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        String::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn cases(n: usize) -> Vec<TestCase> {
        (0..n).map(|i| TestCase::new(format!("tc-{}", i), json!(i), json!(i))).collect()
    }

    #[test]
    fn unsupported_language_fails_every_case() {
        let engine = JudgeEngine::new();
        let results = engine.execute_with_tests("print(1)", "cobol", &cases(3));

        assert_eq!(3, results.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(format!("tc-{}", i), result.test_case_id);
            assert!(!result.passed);
            assert_eq!(Some(FailureKind::UnsupportedLanguage), result.failure);
            assert!(result.error.as_ref().unwrap().contains("cobol"));
        }
    }

    #[test]
    fn cancelled_submission_runs_nothing() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.scratch_dir = Some(scratch.path().to_owned());
        config.max_workers = 4;
        let engine = JudgeEngine::with_config(config);

        let options = ExecutionOptions::default();
        options.cancellation.cancel();
        let results = engine.execute_with_options("def main(x): return x", "python", &cases(6),
            &options);

        assert_eq!(6, results.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(format!("tc-{}", i), result.test_case_id);
            assert_eq!(Some(FailureKind::Cancelled), result.failure);
        }
        assert_eq!(0, std::fs::read_dir(scratch.path()).unwrap().count());
    }

    #[test]
    fn unusable_scratch_directory_is_an_internal_failure() {
        let scratch = tempfile::NamedTempFile::new().unwrap();
        let mut config = EngineConfig::default();
        config.scratch_dir = Some(scratch.path().to_owned());
        let engine = JudgeEngine::with_config(config);

        let result = engine.execute_test_case("def main(x): return x", "python",
            &TestCase::new("a", json!(1), json!(1)));

        assert_eq!("a", result.test_case_id);
        assert_eq!(Some(FailureKind::Internal), result.failure);
    }

    #[test]
    fn timeout_precedence() {
        let engine = JudgeEngine::new();
        let mut tc = TestCase::new("a", json!(1), json!(1));
        let mut limits = ChallengeLimits::default();

        assert_eq!(Duration::from_millis(5000), engine.effective_timeout(&tc, &limits));
        limits.time_limit = Some(2000);
        assert_eq!(Duration::from_millis(2000), engine.effective_timeout(&tc, &limits));
        tc.timeout = Some(700);
        assert_eq!(Duration::from_millis(700), engine.effective_timeout(&tc, &limits));
    }

    #[test]
    fn short_time_limits_do_not_shorten_compilation() {
        let engine = JudgeEngine::new();
        let mut limits = ChallengeLimits::default();
        limits.time_limit = Some(500);
        let tc = TestCase::new("a", json!(1), json!(1));

        let run_timeout = engine.effective_timeout(&tc, &limits);
        assert_eq!(Duration::from_millis(500), run_timeout);
        assert_eq!(Duration::from_millis(5000), engine.compile_timeout(run_timeout));
        assert_eq!(Duration::from_millis(9000),
            engine.compile_timeout(Duration::from_millis(9000)));
    }

    #[test]
    fn memory_limit_precedence() {
        let engine = JudgeEngine::new();
        let mut limits = ChallengeLimits::default();

        assert_eq!(256 * 1024 * 1024, engine.effective_memory_limit(&limits).bytes());
        limits.memory_limit = Some(1024);
        assert_eq!(1024, engine.effective_memory_limit(&limits).bytes());
    }

    #[test]
    fn sandbox_mode_routes_run_phases_to_containers() {
        let mut config = EngineConfig::default();
        config.use_sandbox = true;
        config.container.runtime = String::from("podman");
        config.container.startup_allowance_ms = 500;
        let engine = JudgeEngine::with_config(config);

        assert_eq!(Language::ALL.len(), engine.containers.len());
        let runner = &engine.containers[&Language::Python];
        assert_eq!("podman", runner.runtime);
        assert_eq!(Duration::from_millis(500), runner.startup_allowance);
        assert!(JudgeEngine::new().containers.is_empty());
    }

    #[test]
    fn panic_messages() {
        assert_eq!("boom", panic_message(&"boom"));
        assert_eq!("bang", panic_message(&String::from("bang")));
        assert_eq!("unknown panic", panic_message(&42));
    }
}
