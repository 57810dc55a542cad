//! This module maintains configurations of the judge engine.
//!

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};

use sandbox::{ContainerLimits, MemorySize};

use crate::{Error, ErrorKind, ResultExt, Result};
use crate::languages::Language;

/// Maximum number of worker threads of the engine.
pub const MAX_WORKERS: usize = 16;

/// Provide judge engine related configurations. Every field is optional in configuration files.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default real time limit of compile and run phases, in milliseconds.
    pub timeout_ms: u64,

    /// Default memory limit of candidate programs, in bytes.
    pub memory_limit_bytes: u64,

    /// The directory under which per-execution directories are created. The system's temporary
    /// directory is used if not set.
    pub scratch_dir: Option<PathBuf>,

    /// Whether to execute the run phase inside a container.
    pub use_sandbox: bool,

    /// Maximum number of test cases executed concurrently.
    pub max_workers: usize,

    /// Default relative tolerance used when comparing non-integral numbers.
    pub float_tolerance: f64,

    /// Maximum number of bytes kept from each output stream of a process.
    pub output_limit_bytes: usize,

    /// Whether to apply the memory limit to natively executed programs through `RLIMIT_AS`.
    pub native_rlimits: bool,

    /// Container related configurations.
    pub container: ContainerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timeout_ms: 5000,
            memory_limit_bytes: 256 * 1024 * 1024,
            scratch_dir: None,
            use_sandbox: false,
            max_workers: 1,
            float_tolerance: 1e-9,
            output_limit_bytes: 8 * 1024 * 1024,
            native_rlimits: false,
            container: ContainerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the given YAML file.
    pub fn from_file<T>(config_file: T) -> Result<Self>
        where T: AsRef<Path> {
        info!("Loading engine configuration from file: {}", config_file.as_ref().display());

        let content = std::fs::read_to_string(config_file)
            .chain_err(|| Error::from(ErrorKind::InvalidConfigFile))?;
        EngineConfig::from_yaml(&content)
            .chain_err(|| Error::from(ErrorKind::InvalidConfigFile))
    }

    /// Load configuration from the given YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Get the default real time limit.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the directory under which per-execution directories are created.
    pub fn scratch_dir(&self) -> PathBuf {
        match self.scratch_dir {
            Some(ref dir) => dir.clone(),
            None => std::env::temp_dir(),
        }
    }

    /// Get the effective number of worker threads, clamped into `1..=MAX_WORKERS`.
    pub fn workers(&self) -> usize {
        if self.max_workers > MAX_WORKERS {
            warn!("max_workers = {} exceeds the limit; using {} workers", self.max_workers,
                MAX_WORKERS);
            MAX_WORKERS
        } else {
            std::cmp::max(self.max_workers, 1)
        }
    }
}

/// Provide container related configurations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Name or path of the container runtime executable, e.g. `docker` or `podman`.
    pub runtime: String,

    /// Container image per language name. Missing languages fall back to the built-in defaults.
    pub images: HashMap<String, String>,

    /// Number of CPUs available to each container.
    pub cpus: f64,

    /// Maximum number of processes inside each container.
    pub pids_limit: u32,

    /// Size of the writable `/tmp` mount of each container, in bytes.
    pub tmpfs_size_bytes: u64,

    /// Real time granted on top of the run phase's timeout for container startup and teardown, in
    /// milliseconds.
    pub startup_allowance_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            runtime: String::from("docker"),
            images: HashMap::new(),
            cpus: 1.0,
            pids_limit: 64,
            tmpfs_size_bytes: 64 * 1024 * 1024,
            startup_allowance_ms: 2000,
        }
    }
}

impl ContainerConfig {
    /// Get the image that runs programs written in the given language.
    pub fn image(&self, language: Language) -> String {
        match self.images.get(language.name()) {
            Some(image) => image.clone(),
            None => String::from(default_image(language)),
        }
    }

    /// Get the container limits described by this configuration. `memory_limit_bytes` is the
    /// fallback memory ceiling.
    pub fn limits(&self, memory_limit_bytes: u64) -> ContainerLimits {
        ContainerLimits {
            memory: MemorySize::Bytes(memory_limit_bytes),
            cpus: self.cpus,
            pids_limit: self.pids_limit,
            tmpfs_size: MemorySize::Bytes(self.tmpfs_size_bytes),
        }
    }
}

/// Get the built-in container image of the given language. Compiled languages only need a runtime
/// for the artifacts compiled on the host.
fn default_image(language: Language) -> &'static str {
    match language {
        Language::Python => "python:3.12-slim",
        Language::JavaScript => "node:20-slim",
        Language::TypeScript => "bench-runtime/ts-node:20",
        Language::Go => "debian:bookworm-slim",
        Language::Rust => "debian:bookworm-slim",
        Language::Cpp => "gcc:13",
        Language::Java => "eclipse-temurin:21-jre",
        Language::CSharp => "mono:6",
    }
}
