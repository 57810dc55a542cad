//! This module provide Rust friendly bindings to the native `rlimit` mechanism.
//!

use super::ProcessResourceLimits;

/// Represent a resource.
#[derive(Clone, Copy, Debug)]
pub enum Resource {
    /// Maximum size of the process's virtual memory (address space). This variant corresponds to
    /// the `RLIMIT_AS` native constant.
    AddressSpace,

    /// Limit, in seconds, on the amount of CPU time that the process can consume. This variant
    /// corresponds to the `RLIMIT_CPU` native constant.
    CPUTime,
}

/// Specify the soft limit and the hard limit for some resource.
#[derive(Clone, Copy, Debug)]
pub struct ResourceLimit {
    /// The soft limit of the resource.
    pub soft_limit: u64,

    /// The hard limit of the resource.
    pub hard_limit: u64
}

impl ResourceLimit {
    /// Convert the `ResourceLimit` structure into native representation.
    fn as_native(&self) -> libc::rlimit {
        libc::rlimit {
            rlim_cur: self.soft_limit as libc::rlim_t,
            rlim_max: self.hard_limit as libc::rlim_t
        }
    }
}

/// Set resource limit for the calling process, using the native `rlimit` mechanism.
pub fn setrlimit(resource: Resource, limit: &ResourceLimit) -> std::io::Result<()> {
    let native = limit.as_native();
    let ret = unsafe {
        match resource {
            Resource::AddressSpace => libc::setrlimit(libc::RLIMIT_AS, &native),
            Resource::CPUTime => libc::setrlimit(libc::RLIMIT_CPU, &native),
        }
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Set resource limit for the calling process. The soft limit and the hard limit are both set to
/// the given `limit` value.
pub fn setrlimit_hard(resource: Resource, limit: u64) -> std::io::Result<()> {
    setrlimit(resource, &ResourceLimit {
        soft_limit: limit,
        hard_limit: limit
    })
}

/// Apply the native part of the given limits to the calling process. This function runs in the
/// forked child right before `exec`, so it must not allocate or take locks.
pub fn apply(limits: &ProcessResourceLimits) -> std::io::Result<()> {
    if let Some(memory) = limits.memory_limit {
        setrlimit_hard(Resource::AddressSpace, memory.bytes())?;
    }
    if let Some(cpu) = limits.cpu_time_limit {
        // Round up; a zero CPU limit kills the process on its first tick.
        let secs = cpu.as_secs() + if cpu.subsec_nanos() > 0 { 1 } else { 0 };
        setrlimit_hard(Resource::CPUTime, secs)?;
    }

    Ok(())
}
