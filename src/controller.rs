//! Process controller: fork/exec orchestration and lifecycle operations
//!
//! The fork-then-diverge control flow is split into two named halves:
//! [`spawn_with_pipes`] does the parent-side bookkeeping, and
//! `child_entry` (execution layer) is the child-side procedure that never
//! returns. [`spawn`] wraps both behind pipe allocation.

use std::os::unix::io::RawFd;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::errors::{ProcessError, Result};
use crate::execution::child::{self, ChildPayload};
use crate::liveness::{sigchld_ignored, LivenessProbe, ProcLiveness};
use crate::pipe::{close_fd, PipePair, FD_INVALID};
use crate::startup::{ProcessStartup, Redirect};

/// Sentinel returned by [`ProcessHandle::wait`] for wait failures other
/// than "already reaped" or an interrupted call.
pub const WAIT_FAILED: i32 = -1;

/// Parent-side handle to a spawned child.
///
/// The pid is valid from the moment fork returns in the parent and is never
/// reused by this crate for a different OS process. Dropping the handle
/// does not reap the child: a caller that never waits on a terminated
/// child leaves a zombie until the owning process exits.
#[derive(Debug)]
pub struct ProcessHandle {
    /// Child process identifier.
    pub pid: Pid,
    /// Thread identifier; process creation on POSIX never yields one.
    pub tid: Option<i32>,
    /// Write end of the child's stdin pipe, [`FD_INVALID`] when that stream
    /// was caller-redirected.
    pub stdin: RawFd,
    /// Read end of the child's stdout pipe, [`FD_INVALID`] when
    /// caller-redirected.
    pub stdout: RawFd,
    /// Read end of the child's stderr pipe, [`FD_INVALID`] when
    /// caller-redirected or when outputs are merged.
    pub stderr: RawFd,
}

fn redirect_or_pipe(redirect: &Redirect) -> Result<PipePair> {
    if redirect.is_redirected() {
        Ok(PipePair::from_redirect(redirect.target()))
    } else {
        PipePair::create()
    }
}

/// Spawn a child process described by `startup`.
///
/// Allocates the internal pipes for every stream the caller did not
/// redirect (none for stderr when outputs are merged), forks, and hands the
/// parent a [`ProcessHandle`]. On failure, exactly the pipes this call
/// created are closed; a caller-provided redirect target is never touched.
pub fn spawn(startup: &ProcessStartup) -> Result<ProcessHandle> {
    let mut pstdin = redirect_or_pipe(&startup.stdin)?;

    let mut pstdout = match redirect_or_pipe(&startup.stdout) {
        Ok(pair) => pair,
        Err(err) => {
            if !startup.stdin.is_redirected() {
                pstdin.close();
            }
            return Err(err);
        }
    };

    // with merged outputs the stderr pipe never exists
    let mut pstderr = if startup.merge_outputs {
        PipePair::invalid()
    } else {
        match redirect_or_pipe(&startup.stderr) {
            Ok(pair) => pair,
            Err(err) => {
                if !startup.stdin.is_redirected() {
                    pstdin.close();
                }
                if !startup.stdout.is_redirected() {
                    pstdout.close();
                }
                return Err(err);
            }
        }
    };

    match spawn_with_pipes(startup, &mut pstdin, &mut pstdout, &mut pstderr) {
        Ok(handle) => Ok(handle),
        Err(err) => {
            warn!("spawn failed, rolling back pipe allocation: {}", err);
            if !startup.stdin.is_redirected() {
                pstdin.close();
            }
            if !startup.stdout.is_redirected() {
                pstdout.close();
            }
            if !startup.merge_outputs && !startup.stderr.is_redirected() {
                pstderr.close();
            }
            Err(err)
        }
    }
}

/// Fork and launch with caller-supplied pipe pairs.
///
/// Fork failure leaves no partial state: no pipe end has been closed and
/// the caller cleans up. In the parent branch the unused pipe ends are
/// closed (the mirror image of the child's closes) and the handle keeps
/// stdin-write, stdout-read, and, unless merged or redirected,
/// stderr-read.
pub fn spawn_with_pipes(
    startup: &ProcessStartup,
    pstdin: &mut PipePair,
    pstdout: &mut PipePair,
    pstderr: &mut PipePair,
) -> Result<ProcessHandle> {
    // materialized before fork: the snapshot the child execs is frozen here
    let payload = ChildPayload::from_startup(startup)?;

    match unsafe { fork() } {
        Err(err) => Err(ProcessError::Syscall(format!(
            "unable to fork subprocess: {}",
            err
        ))),
        Ok(ForkResult::Child) => child::child_entry(startup, &payload, pstdin, pstdout, pstderr),
        Ok(ForkResult::Parent { child }) => {
            if !startup.stdin.is_redirected() {
                pstdin.close_read();
            }
            if !startup.stdout.is_redirected() {
                pstdout.close_write();
            }
            if startup.merge_outputs {
                // stderr shares the stdout pipe; nothing extra to close
            } else if !startup.stderr.is_redirected() {
                pstderr.close_write();
            }

            debug!("spawned {} as pid {}", payload.program, child);

            Ok(ProcessHandle {
                pid: child,
                // fork does not create a thread handle
                tid: None,
                stdin: if startup.stdin.is_redirected() {
                    FD_INVALID
                } else {
                    pstdin.write_end()
                },
                stdout: if startup.stdout.is_redirected() {
                    FD_INVALID
                } else {
                    pstdout.read_end()
                },
                stderr: if startup.merge_outputs || startup.stderr.is_redirected() {
                    FD_INVALID
                } else {
                    pstderr.read_end()
                },
            })
        }
    }
}

impl ProcessHandle {
    /// Block until the child changes state and decode its status.
    ///
    /// Normal exit yields the exit code; termination by signal yields
    /// `128 + signal`, the shell convention that lets callers tell the two
    /// apart in one integer space. A child already reaped elsewhere counts
    /// as exited with 0. Other wait failures yield [`WAIT_FAILED`].
    pub fn wait(&self) -> i32 {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return code,
                Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
                Ok(_) => continue,
                Err(Errno::ECHILD) => return 0,
                Err(Errno::EINTR) => continue,
                Err(_) => return WAIT_FAILED,
            }
        }
    }

    /// Send SIGTERM, or SIGKILL when `force` is set.
    ///
    /// Fire-and-forget: this does not wait for the process to die. Callers
    /// needing synchronous confirmation follow with [`wait`](Self::wait).
    pub fn terminate(&self, force: bool) -> Result<()> {
        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };
        debug!("sending {} to pid {}", signal, self.pid);
        kill(self.pid, signal)
            .map_err(|e| ProcessError::Syscall(format!("kill failed: {}", e)))
    }

    /// Non-blocking exit check with the default `/proc` liveness probe.
    pub fn has_exited(&self) -> Result<bool> {
        self.has_exited_with_probe(&ProcLiveness)
    }

    /// Non-blocking exit check.
    ///
    /// `Ok(true)` once the child has changed state, `Ok(false)` while it
    /// exists unchanged. When `waitpid` reports no such child, the answer
    /// depends on the SIGCHLD disposition: with SIGCHLD ignored the kernel
    /// auto-reaps children and the probe decides (pid-reuse race
    /// documented on [`ProcLiveness`]); otherwise the child was simply
    /// reaped faster than we could check, which means it exited.
    pub fn has_exited_with_probe(&self, probe: &dyn LivenessProbe) -> Result<bool> {
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(false),
            Ok(_) => Ok(true),
            Err(Errno::ECHILD) => {
                if sigchld_ignored() {
                    Ok(!probe.is_alive(self.pid))
                } else {
                    Ok(true)
                }
            }
            Err(err) => Err(ProcessError::Syscall(format!("waitpid failed: {}", err))),
        }
    }

    /// Close every live descriptor held by this handle.
    ///
    /// Slots are invalidated as they close, so the handle never closes the
    /// same descriptor twice.
    pub fn close(&mut self) {
        close_fd(&mut self.stdin);
        close_fd(&mut self.stdout);
        close_fd(&mut self.stderr);
    }

    /// Take ownership of the stdin-write descriptor, leaving
    /// [`FD_INVALID`] behind.
    pub fn take_stdin(&mut self) -> RawFd {
        std::mem::replace(&mut self.stdin, FD_INVALID)
    }

    /// Take ownership of the stdout-read descriptor.
    pub fn take_stdout(&mut self) -> RawFd {
        std::mem::replace(&mut self.stdout, FD_INVALID)
    }

    /// Take ownership of the stderr-read descriptor.
    pub fn take_stderr(&mut self) -> RawFd {
        std::mem::replace(&mut self.stderr, FD_INVALID)
    }
}
