//! This crate implements the process runner used by the judge. The runner is responsible for
//! executing compilers and candidate programs in a monitored environment and for reporting what
//! happened to them.
//!
//! The runner implements:
//!
//! * Normal process operations: create, start, monitor and kill a process together with every
//! descendant it spawned;
//!
//! * Resource limits: a real time limit enforced by the monitor loop, and optional native memory
//! and CPU time limits applied through `rlimit`;
//!
//! * Output capture: stdout and stderr of child processes are collected independently and capped
//! at a configurable size;
//!
//! * Cancellation: an in-flight process can be interrupted through a `CancellationToken`;
//!
//! * Container execution: the `container` module re-routes a command line through a container
//! runtime while keeping the same `ExecutionResult` contract.
//!

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
extern crate libc;
extern crate nix;

#[cfg(feature = "serde")]
extern crate serde;

pub mod container;
mod daemon;
mod io;
mod misc;
mod rlimits;

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use std::os::unix::process::CommandExt;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use io::OutputCollector;

pub use container::{ContainerRunner, ContainerLimits};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    foreign_links {
        Io(::std::io::Error);
        Nix(::nix::Error);
    }

    errors {
        EmptyCommandLine {
            description("empty command line")
        }

        InvalidProcessArgument(arg: String) {
            description("invalid argument to subprocess")
            display("invalid argument to subprocess: {:?}", arg)
        }

        InvalidEnvironmentVariable(name: String) {
            description("invalid environment variable to subprocess")
            display("invalid environment variable to subprocess: {:?}", name)
        }
    }
}


/// Measurement of the size of a block of memory.
#[derive(Clone, Copy, Debug, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemorySize {
    /// Measurement in bytes.
    Bytes(u64),

    /// Measurement in kilobytes.
    KiloBytes(u64),

    /// Measurement in megabytes.
    MegaBytes(u64),

    /// Measurement in gigabytes.
    GigaBytes(u64),
}

impl MemorySize {
    /// Convert the current measurement to memory size in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            MemorySize::Bytes(s) => *s,
            MemorySize::KiloBytes(s) => s * 1024,
            MemorySize::MegaBytes(s) => s * 1024 * 1024,
            MemorySize::GigaBytes(s) => s * 1024 * 1024 * 1024,
        }
    }
}

impl PartialEq for MemorySize {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for MemorySize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemorySize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes().cmp(&other.bytes())
    }
}

impl From<u64> for MemorySize {
    fn from(value: u64) -> MemorySize {
        MemorySize::Bytes(value)
    }
}

impl Display for MemorySize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySize::Bytes(s) => write!(f, "{} B", s),
            MemorySize::KiloBytes(s) => write!(f, "{} KB", s),
            MemorySize::MegaBytes(s) => write!(f, "{} MB", s),
            MemorySize::GigaBytes(s) => write!(f, "{} GB", s),
        }
    }
}

/// Specify limits on time and memory resources.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProcessResourceLimits {
    /// Limit on real (wall clock) time available for the child process. `None` if no constraint
    /// is set. This limit is enforced by the monitor loop and always applies.
    pub real_time_limit: Option<Duration>,

    /// Limit on CPU time available for the child process. Only applied when native rlimits are
    /// enabled on the `ProcessBuilder`.
    pub cpu_time_limit: Option<Duration>,

    /// Limit on the address space of the child process. Only applied when native rlimits are
    /// enabled on the `ProcessBuilder`.
    pub memory_limit: Option<MemorySize>,
}

/// A cloneable flag used to interrupt in-flight processes.
///
/// All clones share the same underlying flag: cancelling any of them cancels all of them. Once a
/// token has been cancelled it stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new `CancellationToken` that has not been cancelled.
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }
}

/// Type for the exit codes of processes.
pub type ProcessExitCode = i32;

/// Exit status of a monitored process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProcessExitStatus {
    /// The process exited normally.
    Normal(ProcessExitCode),

    /// The process was killed by the delivery of a signal it did not handle.
    KilledBySignal(i32),

    /// The process was killed by the monitor because it exceeded its real time limit.
    RealTimeLimitExceeded,

    /// The process was killed by the monitor because cancellation was requested.
    Cancelled,

    /// The process could not be launched at all.
    LaunchFailed,
}

impl ProcessExitStatus {
    /// Get the exit code of the process, if it exited normally.
    pub fn exit_code(&self) -> Option<ProcessExitCode> {
        match self {
            ProcessExitStatus::Normal(code) => Some(*code),
            _ => None
        }
    }
}

impl Display for ProcessExitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessExitStatus::Normal(code) => write!(f, "exited with code {}", code),
            ProcessExitStatus::KilledBySignal(sig) => write!(f, "killed by signal {}", sig),
            ProcessExitStatus::RealTimeLimitExceeded => f.write_str("real time limit exceeded"),
            ProcessExitStatus::Cancelled => f.write_str("cancelled"),
            ProcessExitStatus::LaunchFailed => f.write_str("failed to launch"),
        }
    }
}

/// The consolidated outcome of one process run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExecutionResult {
    /// `true` if and only if the process exited normally with code 0.
    pub success: bool,

    /// Everything the process wrote to stdout, lossily decoded as UTF-8.
    pub stdout: String,

    /// Everything the process wrote to stderr, lossily decoded as UTF-8.
    pub stderr: String,

    /// Exit code of the process, if it exited normally.
    pub exit_code: Option<ProcessExitCode>,

    /// Elapsed real time in milliseconds, from spawn to exit or forced-kill completion.
    pub elapsed_ms: u64,

    /// Was the process killed because it exceeded its real time limit?
    pub timed_out: bool,

    /// Was the process killed because cancellation was requested?
    pub cancelled: bool,

    /// Was any of the output streams cut at the output limit?
    pub output_truncated: bool,

    /// How the process terminated.
    pub exit_status: ProcessExitStatus,

    /// Description of a failure that happened outside of the process itself, e.g. a launch
    /// failure or a real time limit violation.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Create an `ExecutionResult` describing a process that never started.
    pub fn launch_failure<T>(message: T) -> Self
        where T: Into<String> {
        ExecutionResult {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            elapsed_ms: 0,
            timed_out: false,
            cancelled: false,
            output_truncated: false,
            exit_status: ProcessExitStatus::LaunchFailed,
            error: Some(message.into()),
        }
    }

    /// Create an `ExecutionResult` describing a process that was never started because
    /// cancellation had already been requested.
    pub fn cancelled_before_start() -> Self {
        ExecutionResult {
            cancelled: true,
            exit_status: ProcessExitStatus::Cancelled,
            error: Some(String::from("execution cancelled before start")),
            ..ExecutionResult::launch_failure("")
        }
    }

    /// Get a one-line description of why this run failed, preferring the runner's own error,
    /// then the process's stderr, then its exit status. Returns `None` for successful runs.
    pub fn failure_reason(&self) -> Option<String> {
        if self.success {
            return None;
        }

        if let Some(ref error) = self.error {
            return Some(error.clone());
        }

        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return Some(stderr.to_owned());
        }

        Some(format!("process {}", self.exit_status))
    }
}

/// Provide mechanism to build a monitored child process.
pub struct ProcessBuilder {
    /// Path to (or name of) the executable file.
    file: String,

    /// Arguments passed to the child process, excluding the executable itself.
    args: Vec<String>,

    /// Environment variables added to the inherited environment of the child process.
    envs: Vec<(String, String)>,

    /// Working directory of the child process.
    pub working_dir: Option<PathBuf>,

    /// Limits to be applied to the new child process.
    pub limits: ProcessResourceLimits,

    /// Whether to apply `cpu_time_limit` and `memory_limit` through the native rlimit mechanism.
    /// The real time limit is always enforced by the monitor loop.
    pub use_native_rlimit: bool,

    /// Maximum number of bytes kept from each of stdout and stderr. The rest is drained and
    /// discarded.
    pub output_limit: usize,

    /// Token observed by the monitor loop.
    pub cancellation: CancellationToken,
}

/// Default number of bytes kept from each output stream of a child process.
pub const DEFAULT_OUTPUT_LIMIT: usize = 8 * 1024 * 1024;

impl ProcessBuilder {
    /// Create a new `ProcessBuilder` instance, given the executable file's path or name. Names
    /// without a path separator are looked up in `PATH`.
    pub fn new<T>(file: T) -> ProcessBuilder
        where T: Into<String> {
        ProcessBuilder {
            file: file.into(),
            args: Vec::new(),
            envs: Vec::new(),
            working_dir: None,
            limits: ProcessResourceLimits::default(),
            use_native_rlimit: false,
            output_limit: DEFAULT_OUTPUT_LIMIT,
            cancellation: CancellationToken::new(),
        }
    }

    /// Create a new `ProcessBuilder` from a full command line whose first element is the
    /// executable. Returns `Err` if the command line is empty or contains invalid arguments.
    pub fn from_command_line<S>(argv: &[S]) -> Result<ProcessBuilder>
        where S: AsRef<str> {
        let (file, args) = match argv.split_first() {
            Some(parts) => parts,
            None => bail!(ErrorKind::EmptyCommandLine)
        };
        if !misc::is_valid_c_string(file.as_ref()) {
            bail!(ErrorKind::InvalidProcessArgument(file.as_ref().to_owned()));
        }

        let mut builder = ProcessBuilder::new(file.as_ref());
        for arg in args {
            builder.add_arg(arg.as_ref())?;
        }

        Ok(builder)
    }

    /// Get the executable of the child process.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Get the arguments passed to the child process.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Add an argument to the child process. If the given argument is not a valid C-style string,
    /// then returns `Err(e)` where the error kind of `e` is `ErrorKind::InvalidProcessArgument`.
    pub fn add_arg<T>(&mut self, arg: T) -> Result<()>
        where T: Into<String> {
        let arg = arg.into();
        if misc::is_valid_c_string(&arg) {
            self.args.push(arg);
            Ok(())
        } else {
            debug!("Invalid process argument: {:?}", arg);
            bail!(ErrorKind::InvalidProcessArgument(arg));
        }
    }

    /// Add an environment variable to the child process.
    pub fn add_env<T1, T2>(&mut self, name: T1, value: T2) -> Result<()>
        where T1: Into<String>, T2: Into<String> {
        let name = name.into();
        let value = value.into();

        if name.is_empty() || name.contains('=') || !misc::is_valid_c_string(&name) {
            debug!("Invalid environment variable name: {:?}", name);
            bail!(ErrorKind::InvalidEnvironmentVariable(name));
        }
        if !misc::is_valid_c_string(&value) {
            debug!("Invalid value for environment variable {:?}: not a valid C string.", name);
            bail!(ErrorKind::InvalidEnvironmentVariable(name));
        }

        self.envs.push((name, value));
        Ok(())
    }

    /// Build the `std::process::Command` described by this builder.
    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.file);
        command.args(&self.args)
            .envs(self.envs.iter().map(|(name, value)| (name, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A fresh process group lets the monitor kill every descendant at once.
            .process_group(0);

        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        if self.use_native_rlimit {
            let limits = self.limits;
            // `rlimits::apply` only calls `setrlimit`, which is async-signal-safe.
            unsafe {
                command.pre_exec(move || rlimits::apply(&limits));
            }
        }

        command
    }

    /// Start the process.
    pub fn start(self) -> Result<Process> {
        trace!("Starting process: {} {:?} in {:?}", self.file, self.args, self.working_dir);

        let mut command = self.build_command();
        let started = Instant::now();
        let mut child = command.spawn()
            .chain_err(|| format!("failed to launch \"{}\"", self.file))?;

        let stdout = child.stdout.take()
            .map(|pipe| OutputCollector::start(pipe, self.output_limit));
        let stderr = child.stderr.take()
            .map(|pipe| OutputCollector::start(pipe, self.output_limit));

        Ok(Process {
            child,
            started,
            limits: self.limits,
            cancellation: self.cancellation,
            stdout,
            stderr,
        })
    }

    /// Start the process and wait for it to terminate. Every failure, including launch failures,
    /// is reported inside the returned `ExecutionResult`.
    pub fn run(self) -> ExecutionResult {
        if self.cancellation.is_cancelled() {
            return ExecutionResult::cancelled_before_start();
        }

        let outcome = self.start()
            .and_then(|process| process.wait_for_exit());
        match outcome {
            Ok(result) => result,
            Err(e) => {
                debug!("Process run failed: {}", e);
                ExecutionResult::launch_failure(error_chain_message(&e))
            }
        }
    }
}

/// Render an error together with all of its causes on a single line.
fn error_chain_message(e: &Error) -> String {
    e.iter()
        .map(|cause| cause.to_string())
        .collect::<Vec<String>>()
        .join(": ")
}

/// Type for representing process IDs.
pub type ProcessId = u32;

/// How long the output collectors may keep draining after the process terminated.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A handle to a running child process.
pub struct Process {
    /// The child process.
    child: Child,

    /// The instant immediately before the process was spawned.
    started: Instant,

    /// Limits enforced by the monitor loop.
    limits: ProcessResourceLimits,

    /// Token observed by the monitor loop.
    cancellation: CancellationToken,

    /// Collector of the child's stdout.
    stdout: Option<OutputCollector>,

    /// Collector of the child's stderr.
    stderr: Option<OutputCollector>,
}

impl Process {
    /// Get the ID of the child process.
    pub fn pid(&self) -> ProcessId {
        self.child.id()
    }

    /// Wait for the child process to exit, be killed for exceeding its real time limit, or be
    /// killed because cancellation was requested, whichever happens first.
    pub fn wait_for_exit(mut self) -> Result<ExecutionResult> {
        let (exit_status, elapsed) = daemon::monitor(
            &mut self.child, self.started, &self.limits, &self.cancellation)?;
        trace!("Process {} terminated: {} after {:?}", self.child.id(), exit_status, elapsed);

        let stdout = self.stdout.take()
            .map(|c| c.finish(OUTPUT_DRAIN_GRACE))
            .unwrap_or_default();
        let stderr = self.stderr.take()
            .map(|c| c.finish(OUTPUT_DRAIN_GRACE))
            .unwrap_or_default();

        let timed_out = exit_status == ProcessExitStatus::RealTimeLimitExceeded;
        let cancelled = exit_status == ProcessExitStatus::Cancelled;
        let error = if timed_out {
            let limit = self.limits.real_time_limit.unwrap_or_default();
            Some(format!("execution timed out after {} ms", misc::millis(limit)))
        } else if cancelled {
            Some(String::from("execution cancelled"))
        } else {
            None
        };

        Ok(ExecutionResult {
            success: exit_status == ProcessExitStatus::Normal(0),
            stdout: stdout.text(),
            stderr: stderr.text(),
            exit_code: exit_status.exit_code(),
            elapsed_ms: misc::millis(elapsed),
            timed_out,
            cancelled,
            output_truncated: stdout.truncated || stderr.truncated,
            exit_status,
            error,
        })
    }
}

/// Everything a `Runner` needs to execute one command line.
#[derive(Clone, Copy, Debug)]
pub struct RunRequest<'a> {
    /// The command line; the first element is the executable.
    pub argv: &'a [String],

    /// Working directory of the process.
    pub working_dir: &'a Path,

    /// Real time budget of the process.
    pub timeout: Duration,

    /// Memory ceiling, honoured by runners that can enforce one.
    pub memory_limit: Option<MemorySize>,

    /// Token that interrupts the run.
    pub cancellation: &'a CancellationToken,
}

/// Provide a trait for strategies that execute a command line and report an `ExecutionResult`.
/// Implementors never panic or return errors for failures of the executed program; every outcome
/// is described by the returned value.
pub trait Runner: Send + Sync {
    /// Execute the given request.
    fn run(&self, request: &RunRequest<'_>) -> ExecutionResult;
}

/// Runner that executes command lines directly on the host.
#[derive(Clone, Debug)]
pub struct NativeRunner {
    /// Whether to apply the memory limit of run requests through `RLIMIT_AS`, together with a CPU
    /// time backstop derived from the timeout.
    pub use_native_rlimit: bool,

    /// Maximum number of bytes kept from each output stream.
    pub output_limit: usize,
}

impl NativeRunner {
    /// Create a new `NativeRunner` without native rlimits.
    pub fn new() -> Self {
        NativeRunner {
            use_native_rlimit: false,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Create the `ProcessBuilder` that executes the given request.
    fn builder(&self, request: &RunRequest<'_>) -> Result<ProcessBuilder> {
        let mut builder = ProcessBuilder::from_command_line(request.argv)?;
        builder.working_dir = Some(request.working_dir.to_owned());
        builder.limits.real_time_limit = Some(request.timeout);
        builder.output_limit = self.output_limit;
        builder.cancellation = request.cancellation.clone();

        if self.use_native_rlimit {
            builder.use_native_rlimit = true;
            builder.limits.memory_limit = request.memory_limit;
            // The CPU limit only catches runaway processes the monitor somehow missed.
            builder.limits.cpu_time_limit = Some(request.timeout + Duration::from_secs(1));
        }

        Ok(builder)
    }
}

impl Default for NativeRunner {
    fn default() -> Self {
        NativeRunner::new()
    }
}

impl Runner for NativeRunner {
    fn run(&self, request: &RunRequest<'_>) -> ExecutionResult {
        match self.builder(request) {
            Ok(builder) => builder.run(),
            Err(e) => {
                error!("Refusing to run malformed command line {:?}: {}", request.argv, e);
                ExecutionResult::launch_failure(error_chain_message(&e))
            }
        }
    }
}

/// Run the given command line in `working_dir` with a real time budget of `timeout`. This is a
/// convenience wrapper around `NativeRunner` without cancellation.
pub fn run(argv: &[String], timeout: Duration, working_dir: &Path) -> ExecutionResult {
    let cancellation = CancellationToken::new();
    NativeRunner::new().run(&RunRequest {
        argv,
        working_dir,
        timeout,
        memory_limit: None,
        cancellation: &cancellation,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn sh(script: &str) -> Vec<String> {
        argv(&["sh", "-c", script])
    }

    #[test]
    fn test_memory_size_to_bytes() {
        assert_eq!(2, MemorySize::Bytes(2).bytes());
        assert_eq!(2 * 1024, MemorySize::KiloBytes(2).bytes());
        assert_eq!(2 * 1024 * 1024, MemorySize::MegaBytes(2).bytes());
        assert_eq!(2 * 1024 * 1024 * 1024, MemorySize::GigaBytes(2).bytes());
        assert_eq!(MemorySize::KiloBytes(1), MemorySize::Bytes(1024));
    }

    #[test]
    fn captures_stdout_and_stderr_independently() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&sh("echo out; echo err 1>&2"), Duration::from_secs(10), dir.path());

        assert!(result.success);
        assert_eq!(Some(0), result.exit_code);
        assert_eq!("out\n", result.stdout);
        assert_eq!("err\n", result.stderr);
        assert!(!result.timed_out);
        assert!(result.error.is_none());
    }

    #[test]
    fn runs_in_the_given_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let result = run(&argv(&["cat", "marker.txt"]), Duration::from_secs(10), dir.path());

        assert!(result.success);
        assert_eq!("here", result.stdout);
    }

    #[test]
    fn non_zero_exit_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&sh("exit 3"), Duration::from_secs(10), dir.path());

        assert!(!result.success);
        assert_eq!(Some(3), result.exit_code);
        assert_eq!(ProcessExitStatus::Normal(3), result.exit_status);
        assert!(!result.timed_out);
        assert_eq!(Some(String::from("process exited with code 3")), result.failure_reason());
    }

    #[test]
    fn timeout_kills_the_whole_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let result = run(&sh("sleep 30 & sleep 30; wait"), timeout, dir.path());

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(None, result.exit_code);
        assert_eq!(ProcessExitStatus::RealTimeLimitExceeded, result.exit_status);
        assert!(result.elapsed_ms >= 300);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[test]
    fn missing_executable_is_a_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&argv(&["definitely-not-a-real-binary-4f1c"]), Duration::from_secs(1),
            dir.path());

        assert!(!result.success);
        assert_eq!(ProcessExitStatus::LaunchFailed, result.exit_status);
        assert!(result.error.unwrap().contains("definitely-not-a-real-binary-4f1c"));
    }

    #[test]
    fn empty_command_line_is_a_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&[], Duration::from_secs(1), dir.path());

        assert!(!result.success);
        assert_eq!(ProcessExitStatus::LaunchFailed, result.exit_status);
        assert!(result.error.unwrap().contains("empty command line"));
    }

    #[test]
    fn nul_in_argument_is_rejected() {
        assert!(ProcessBuilder::from_command_line(&["echo", "a\0b"]).is_err());
        assert!(ProcessBuilder::new("env").add_env("A=B", "c").is_err());
        assert!(ProcessBuilder::new("env").add_env("A", "b=c").is_ok());
    }

    #[test]
    fn environment_variables_are_passed() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ProcessBuilder::from_command_line(&sh("printf %s \"$BENCH_VALUE\""))
            .unwrap();
        builder.add_env("BENCH_VALUE", "42").unwrap();
        builder.working_dir = Some(dir.path().to_owned());
        builder.limits.real_time_limit = Some(Duration::from_secs(10));

        let result = builder.run();
        assert!(result.success);
        assert_eq!("42", result.stdout);
    }

    #[test]
    fn output_beyond_the_limit_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = ProcessBuilder::from_command_line(
            &sh("head -c 100000 /dev/zero | tr '\\0' 'a'")).unwrap();
        builder.working_dir = Some(dir.path().to_owned());
        builder.limits.real_time_limit = Some(Duration::from_secs(10));
        builder.output_limit = 1000;

        let result = builder.run();
        assert!(result.success);
        assert!(result.output_truncated);
        assert_eq!(1000, result.stdout.len());
    }

    #[test]
    fn cancellation_interrupts_a_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        let started = Instant::now();
        let result = NativeRunner::new().run(&RunRequest {
            argv: &sh("sleep 30"),
            working_dir: dir.path(),
            timeout: Duration::from_secs(30),
            memory_limit: None,
            cancellation: &token,
        });
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!result.success);
        assert!(result.cancelled);
        assert!(!result.timed_out);
        assert_eq!(ProcessExitStatus::Cancelled, result.exit_status);
    }

    #[test]
    fn cancelled_token_prevents_launch() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = NativeRunner::new().run(&RunRequest {
            argv: &argv(&["true"]),
            working_dir: dir.path(),
            timeout: Duration::from_secs(1),
            memory_limit: None,
            cancellation: &token,
        });

        assert!(result.cancelled);
        assert_eq!(0, result.elapsed_ms);
    }

    #[test]
    fn killed_by_signal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(&sh("kill -9 $$"), Duration::from_secs(10), dir.path());

        assert!(!result.success);
        assert_eq!(ProcessExitStatus::KilledBySignal(9), result.exit_status);
        assert!(!result.timed_out);
    }

    #[test]
    fn native_memory_limit_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let runner = NativeRunner {
            use_native_rlimit: true,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        };

        let result = runner.run(&RunRequest {
            argv: &sh("grep 'Max address space' /proc/self/limits"),
            working_dir: dir.path(),
            timeout: Duration::from_secs(10),
            memory_limit: Some(MemorySize::MegaBytes(512)),
            cancellation: &token,
        });

        assert!(result.success);
        assert!(result.stdout.contains(&(512u64 * 1024 * 1024).to_string()));
    }
}
