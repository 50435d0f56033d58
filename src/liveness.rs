//! Liveness probing for children the kernel may have auto-reaped
//!
//! When the calling process sets SIGCHLD to ignore, the kernel reaps
//! children on its own and `waitpid` stops seeing them. The controller then
//! needs a different way to answer "is this pid still around"; that
//! capability lives behind [`LivenessProbe`] so platforms without a /proc
//! filesystem can plug in another probe.

use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Best-effort "does this process still exist" check, consulted only on
/// the auto-reap fallback path of the non-blocking exit check.
pub trait LivenessProbe {
    fn is_alive(&self, pid: Pid) -> bool;
}

/// Probes for the existence of `/proc/<pid>`.
///
/// Inherent race: a pid can be reused by an unrelated process between the
/// child's exit and this check. Ruling that out would need state this layer
/// does not keep, so absence of the entry is simply read as "exited".
#[derive(Debug, Default)]
pub struct ProcLiveness;

impl LivenessProbe for ProcLiveness {
    fn is_alive(&self, pid: Pid) -> bool {
        Path::new(&format!("/proc/{}", pid)).exists()
    }
}

/// Signal-0 probe for platforms without a per-pid /proc entry.
///
/// EPERM still means the process exists, just owned by someone else.
#[derive(Debug, Default)]
pub struct SignalLiveness;

impl LivenessProbe for SignalLiveness {
    fn is_alive(&self, pid: Pid) -> bool {
        match kill(pid, None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

/// True when the calling process has SIGCHLD set to SIG_IGN, in which case
/// children are auto-reaped and `waitpid` cannot observe them.
pub(crate) fn sigchld_ignored() -> bool {
    let mut current = std::mem::MaybeUninit::<libc::sigaction>::zeroed();
    // null new-action pointer: query only, nothing is installed
    let rc = unsafe { libc::sigaction(libc::SIGCHLD, std::ptr::null(), current.as_mut_ptr()) };
    if rc != 0 {
        return false;
    }
    let current = unsafe { current.assume_init() };
    current.sa_sigaction == libc::SIG_IGN
}
