//! This module implements the compile/run pipeline that drives one materialized harness program
//! through its optional compile phase and its run phase.
//!

use std::fmt::{Display, Formatter};
use std::time::Duration;

use sandbox::{CancellationToken, ExecutionResult, MemorySize, RunRequest, Runner};

use crate::languages::LanguageProfile;
use super::artifact::ExecutionArtifact;

/// State of a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Preparing,
    Compiling,
    Running,
    Done,
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(match self {
            PipelineState::Preparing => "preparing",
            PipelineState::Compiling => "compiling",
            PipelineState::Running => "running",
            PipelineState::Done => "done",
        }, f)
    }
}

/// Outcome of a pipeline.
#[derive(Clone, Debug)]
pub enum PipelineOutcome {
    /// The compile phase failed; the run phase never started.
    CompileFailed {
        diagnostics: String,
        compile_elapsed_ms: u64,
    },

    /// Cancellation was observed before a phase started.
    Cancelled {
        compile_elapsed_ms: Option<u64>,
    },

    /// The run phase finished, in whatever way.
    Ran {
        compile_elapsed_ms: Option<u64>,
        execution: ExecutionResult,
    },
}

/// Drives the phases of one execution.
pub struct Pipeline<'a> {
    /// Profile of the harness program's language.
    pub profile: &'static dyn LanguageProfile,

    /// Runner of the compile phase.
    pub compiler: &'a dyn Runner,

    /// Runner of the run phase.
    pub runner: &'a dyn Runner,

    /// Real time budget of the compile phase.
    pub compile_timeout: Duration,

    /// Real time budget of the run phase.
    pub timeout: Duration,

    /// Memory ceiling of the run phase.
    pub memory_limit: Option<MemorySize>,

    /// Token that interrupts the pipeline.
    pub cancellation: &'a CancellationToken,
}

impl<'a> Pipeline<'a> {
    fn transition(&self, state: &mut PipelineState, next: PipelineState) {
        trace!("Pipeline for {} {} -> {}", self.profile.language(), state, next);
        *state = next;
    }

    /// Execute the harness program held by the given artifact.
    pub fn execute(&self, artifact: &ExecutionArtifact) -> PipelineOutcome {
        let mut state = PipelineState::Preparing;

        let mut compile_elapsed_ms = None;
        let executable = match self.profile.compile(artifact.source_file(),
            self.profile.output_file()) {
            Some(argv) => {
                if self.cancellation.is_cancelled() {
                    self.transition(&mut state, PipelineState::Done);
                    return PipelineOutcome::Cancelled { compile_elapsed_ms };
                }

                self.transition(&mut state, PipelineState::Compiling);
                let compilation = self.compile(artifact, &argv);
                compile_elapsed_ms = Some(compilation.elapsed_ms);

                if compilation.cancelled {
                    self.transition(&mut state, PipelineState::Done);
                    return PipelineOutcome::Cancelled { compile_elapsed_ms };
                }
                if !compilation.success {
                    self.transition(&mut state, PipelineState::Done);
                    return PipelineOutcome::CompileFailed {
                        diagnostics: self.diagnostics(&compilation),
                        compile_elapsed_ms: compilation.elapsed_ms,
                    };
                }

                self.profile.output_file()
            },
            None => artifact.source_file(),
        };

        if self.cancellation.is_cancelled() {
            self.transition(&mut state, PipelineState::Done);
            return PipelineOutcome::Cancelled { compile_elapsed_ms };
        }

        self.transition(&mut state, PipelineState::Running);
        let argv = self.profile.run(executable);
        trace!("Run command line: {:?}", argv);
        let execution = self.runner.run(&RunRequest {
            argv: &argv,
            working_dir: artifact.dir(),
            timeout: self.timeout,
            memory_limit: self.memory_limit,
            cancellation: self.cancellation,
        });
        debug!("Run phase of {} {}: {}ms", self.profile.language(), execution.exit_status,
            execution.elapsed_ms);

        self.transition(&mut state, PipelineState::Done);
        PipelineOutcome::Ran { compile_elapsed_ms, execution }
    }

    fn compile(&self, artifact: &ExecutionArtifact, argv: &[String]) -> ExecutionResult {
        trace!("Compile command line: {:?}", argv);
        let compilation = self.compiler.run(&RunRequest {
            argv,
            working_dir: artifact.dir(),
            timeout: self.compile_timeout,
            memory_limit: None,
            cancellation: self.cancellation,
        });
        debug!("Compile phase of {} {}: {}ms", self.profile.language(), compilation.exit_status,
            compilation.elapsed_ms);
        compilation
    }

    /// Extract the diagnostics of a failed compilation.
    fn diagnostics(&self, compilation: &ExecutionResult) -> String {
        if compilation.timed_out {
            return format!("compilation timed out after {} ms",
                self.compile_timeout.as_millis());
        }

        // Some compilers write their diagnostics to stdout.
        for stream in &[&compilation.stderr, &compilation.stdout] {
            let text = stream.trim();
            if !text.is_empty() {
                return text.to_owned();
            }
        }

        compilation.failure_reason()
            .unwrap_or_else(|| String::from("compilation failed"))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use sandbox::ProcessExitStatus;

    use crate::harness::Harness;
    use crate::languages::Language;

    /// Runner that records command lines and answers with canned results.
    struct ScriptedRunner {
        calls: Mutex<Vec<Vec<String>>>,
        timeouts: Mutex<Vec<Duration>>,
        result: ExecutionResult,
    }

    impl ScriptedRunner {
        fn new(result: ExecutionResult) -> Self {
            ScriptedRunner {
                calls: Mutex::new(Vec::new()),
                timeouts: Mutex::new(Vec::new()),
                result,
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        fn timeouts(&self) -> Vec<Duration> {
            self.timeouts.lock().unwrap().clone()
        }
    }

    impl Runner for ScriptedRunner {
        fn run(&self, request: &RunRequest<'_>) -> ExecutionResult {
            assert!(request.working_dir.is_dir());
            self.calls.lock().unwrap().push(request.argv.to_vec());
            self.timeouts.lock().unwrap().push(request.timeout);
            self.result.clone()
        }
    }

    fn exited(code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            success: code == 0,
            stdout: stdout.to_owned(),
            stderr: stderr.to_owned(),
            exit_code: Some(code),
            elapsed_ms: 5,
            timed_out: false,
            cancelled: false,
            output_truncated: false,
            exit_status: ProcessExitStatus::Normal(code),
            error: None,
        }
    }

    fn artifact(scratch: &std::path::Path, language: Language) -> ExecutionArtifact {
        let harness = Harness {
            file_name: language.profile().source_file(),
            text: String::new(),
        };
        ExecutionArtifact::create(scratch, &harness).unwrap()
    }

    fn pipeline<'a>(language: Language, compiler: &'a dyn Runner, runner: &'a dyn Runner,
        cancellation: &'a CancellationToken) -> Pipeline<'a> {
        Pipeline {
            profile: language.profile(),
            compiler,
            runner,
            compile_timeout: Duration::from_millis(1500),
            timeout: Duration::from_millis(200),
            memory_limit: None,
            cancellation,
        }
    }

    #[test]
    fn interpreted_language_skips_compilation() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::Python);
        let compiler = ScriptedRunner::new(exited(0, "", ""));
        let runner = ScriptedRunner::new(exited(0, "{\"success\":true}", ""));
        let token = CancellationToken::new();

        let outcome = pipeline(Language::Python, &compiler, &runner, &token).execute(&artifact);

        match outcome {
            PipelineOutcome::Ran { compile_elapsed_ms, execution } => {
                assert_eq!(None, compile_elapsed_ms);
                assert!(execution.success);
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(compiler.calls().is_empty());
        assert_eq!(vec![vec![String::from("python3"), String::from("-B"),
            String::from("main.py")]], runner.calls());
    }

    #[test]
    fn compiled_language_runs_the_compiler_output() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::Go);
        let compiler = ScriptedRunner::new(exited(0, "", ""));
        let runner = ScriptedRunner::new(exited(0, "", ""));
        let token = CancellationToken::new();

        let outcome = pipeline(Language::Go, &compiler, &runner, &token).execute(&artifact);

        match outcome {
            PipelineOutcome::Ran { compile_elapsed_ms, .. } => assert_eq!(Some(5), compile_elapsed_ms),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(1, compiler.calls().len());
        assert_eq!(vec![vec![String::from("./main")]], runner.calls());
    }

    #[test]
    fn phases_get_their_own_timeouts() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::Java);
        let compiler = ScriptedRunner::new(exited(0, "", ""));
        let runner = ScriptedRunner::new(exited(0, "", ""));
        let token = CancellationToken::new();

        pipeline(Language::Java, &compiler, &runner, &token).execute(&artifact);

        assert_eq!(vec![Duration::from_millis(1500)], compiler.timeouts());
        assert_eq!(vec![Duration::from_millis(200)], runner.timeouts());
    }

    #[test]
    fn compile_failure_short_circuits() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::Cpp);
        let compiler = ScriptedRunner::new(exited(1, "", "main.cpp:1: error: expected ';'\n"));
        let runner = ScriptedRunner::new(exited(0, "", ""));
        let token = CancellationToken::new();

        let outcome = pipeline(Language::Cpp, &compiler, &runner, &token).execute(&artifact);

        match outcome {
            PipelineOutcome::CompileFailed { diagnostics, compile_elapsed_ms } => {
                assert_eq!("main.cpp:1: error: expected ';'", diagnostics);
                assert_eq!(5, compile_elapsed_ms);
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn diagnostics_fall_back_to_stdout() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::CSharp);
        let compiler = ScriptedRunner::new(exited(1, "main.cs(3,1): error CS1525\n", ""));
        let runner = ScriptedRunner::new(exited(0, "", ""));
        let token = CancellationToken::new();

        match pipeline(Language::CSharp, &compiler, &runner, &token).execute(&artifact) {
            PipelineOutcome::CompileFailed { diagnostics, .. } =>
                assert_eq!("main.cs(3,1): error CS1525", diagnostics),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn compile_timeout_is_a_compile_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::Rust);
        let mut timed_out = exited(0, "", "");
        timed_out.success = false;
        timed_out.timed_out = true;
        timed_out.exit_code = None;
        timed_out.exit_status = ProcessExitStatus::RealTimeLimitExceeded;
        let compiler = ScriptedRunner::new(timed_out);
        let runner = ScriptedRunner::new(exited(0, "", ""));
        let token = CancellationToken::new();

        match pipeline(Language::Rust, &compiler, &runner, &token).execute(&artifact) {
            PipelineOutcome::CompileFailed { diagnostics, .. } =>
                assert_eq!("compilation timed out after 1500 ms", diagnostics),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn cancelled_pipeline_runs_nothing() {
        let scratch = tempfile::tempdir().unwrap();
        let artifact = artifact(scratch.path(), Language::Java);
        let compiler = ScriptedRunner::new(exited(0, "", ""));
        let runner = ScriptedRunner::new(exited(0, "", ""));
        let token = CancellationToken::new();
        token.cancel();

        match pipeline(Language::Java, &compiler, &runner, &token).execute(&artifact) {
            PipelineOutcome::Cancelled { compile_elapsed_ms } => assert_eq!(None, compile_elapsed_ms),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(compiler.calls().is_empty());
        assert!(runner.calls().is_empty());
    }
}
