//! This module implements a `Runner` that executes command lines inside a disposable container.
//!
//! The per-execution directory is bind-mounted read-only at `/workspace` and becomes the working
//! directory of the containerized process, so command lines built with relative paths run
//! unchanged. The container has no network, a read-only root file system, a small writable
//! `/tmp`, and caps on memory, CPU and process count.
//!

use std::path::Path;
use std::time::Duration;

use super::{
    CancellationToken,
    ExecutionResult,
    MemorySize,
    ProcessBuilder,
    Result,
    Runner,
    RunRequest,
    DEFAULT_OUTPUT_LIMIT,
};

/// Mount point of the execution directory inside the container.
pub const CONTAINER_WORKDIR: &str = "/workspace";

/// How long the best-effort container removal may take.
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resource caps applied to every container.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerLimits {
    /// Memory ceiling used when the run request does not carry one. Swap is capped at the same
    /// value, which disables it.
    pub memory: MemorySize,

    /// Number of CPUs the container may use.
    pub cpus: f64,

    /// Maximum number of processes inside the container.
    pub pids_limit: u32,

    /// Size of the writable `/tmp` file system.
    pub tmpfs_size: MemorySize,
}

impl Default for ContainerLimits {
    fn default() -> Self {
        ContainerLimits {
            memory: MemorySize::MegaBytes(256),
            cpus: 1.0,
            pids_limit: 64,
            tmpfs_size: MemorySize::MegaBytes(64),
        }
    }
}

/// Runner that re-routes command lines through a container runtime such as `docker` or `podman`.
#[derive(Clone, Debug)]
pub struct ContainerRunner {
    /// Name or path of the container runtime executable.
    pub runtime: String,

    /// Image the command lines are executed in.
    pub image: String,

    /// Resource caps of the container.
    pub limits: ContainerLimits,

    /// Extra real time granted on top of the request's timeout to cover container startup.
    pub startup_allowance: Duration,

    /// Maximum number of bytes kept from each output stream.
    pub output_limit: usize,
}

impl ContainerRunner {
    /// Create a new `ContainerRunner` instance with default limits.
    pub fn new<T1, T2>(runtime: T1, image: T2) -> Self
        where T1: Into<String>, T2: Into<String> {
        ContainerRunner {
            runtime: runtime.into(),
            image: image.into(),
            limits: ContainerLimits::default(),
            startup_allowance: Duration::from_secs(2),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Get the name given to the container executing in the given directory. Execution
    /// directories are unique, and so are the names derived from them.
    pub fn container_name(working_dir: &Path) -> String {
        let dir = working_dir.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sanitized: String = dir.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
            .collect();
        format!("bench-{}", sanitized)
    }

    /// Build the full runtime command line that executes the given request.
    pub fn command_line(&self, request: &RunRequest<'_>) -> Vec<String> {
        let memory = request.memory_limit.unwrap_or(self.limits.memory).bytes().to_string();
        let mut argv: Vec<String> = vec![
            self.runtime.clone(),
            "run".into(),
            "--rm".into(),
            "--name".into(), ContainerRunner::container_name(request.working_dir),
            "--network".into(), "none".into(),
            "--memory".into(), memory.clone(),
            "--memory-swap".into(), memory,
            "--cpus".into(), self.limits.cpus.to_string(),
            "--pids-limit".into(), self.limits.pids_limit.to_string(),
            "--read-only".into(),
            "--tmpfs".into(),
            format!("/tmp:rw,noexec,nosuid,size={}", self.limits.tmpfs_size.bytes()),
            "--security-opt".into(), "no-new-privileges".into(),
            "--volume".into(),
            format!("{}:{}:ro", request.working_dir.display(), CONTAINER_WORKDIR),
            "--workdir".into(), CONTAINER_WORKDIR.into(),
            self.image.clone(),
        ];
        argv.extend(request.argv.iter().cloned());
        argv
    }

    /// Create the `ProcessBuilder` that launches the container for the given request.
    fn builder(&self, request: &RunRequest<'_>) -> Result<ProcessBuilder> {
        let mut builder = ProcessBuilder::from_command_line(&self.command_line(request))?;
        builder.working_dir = Some(request.working_dir.to_owned());
        builder.limits.real_time_limit = Some(request.timeout + self.startup_allowance);
        builder.output_limit = self.output_limit;
        builder.cancellation = request.cancellation.clone();
        Ok(builder)
    }

    /// Force-remove the named container. Killing the runtime client does not necessarily stop the
    /// container it started.
    fn remove_container(&self, name: &str) {
        let argv = vec![self.runtime.clone(), "rm".into(), "-f".into(), name.to_owned()];
        let mut builder = match ProcessBuilder::from_command_line(&argv) {
            Ok(builder) => builder,
            Err(e) => {
                warn!("Cannot build container removal command: {}", e);
                return;
            }
        };
        builder.limits.real_time_limit = Some(REMOVE_TIMEOUT);
        builder.cancellation = CancellationToken::new();

        let result = builder.run();
        if !result.success {
            warn!("Failed to remove container {}: {}", name,
                result.failure_reason().unwrap_or_default());
        }
    }
}

impl Runner for ContainerRunner {
    fn run(&self, request: &RunRequest<'_>) -> ExecutionResult {
        if request.argv.is_empty() {
            return ExecutionResult::launch_failure("empty command line");
        }

        let builder = match self.builder(request) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Refusing to run malformed command line {:?}: {}", request.argv, e);
                return ExecutionResult::launch_failure(e.to_string());
            }
        };

        debug!("Running {:?} in container image {}", request.argv, self.image);
        let result = builder.run();
        if result.timed_out || result.cancelled {
            self.remove_container(&ContainerRunner::container_name(request.working_dir));
        }

        result
    }
}
