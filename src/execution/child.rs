//! Child-side bootstrap between fork and exec
//!
//! Everything here runs in the forked child. The child's memory is a fork
//! copy of the parent, so nothing may unwind back into the parent's call
//! stack: every failure path ends in `_exit`, and the only structured
//! signal left to the parent is the exit status.

use std::ffi::CString;

use nix::unistd::{chdir, dup2};

use crate::errors::{ProcessError, Result};
use crate::execution::{descriptors, exec};
use crate::pipe::PipePair;
use crate::startup::ProcessStartup;

/// C-string materialization of a startup snapshot.
///
/// Built in the parent before fork: the argv and `NAME=VALUE` environment
/// vectors are frozen at that point, so later mutation of the startup has
/// no effect on the launched process. Environment entries are serialized
/// sorted by key so the same map always yields the same envp.
#[derive(Debug)]
pub(crate) struct ChildPayload {
    pub(crate) program: String,
    pub(crate) argv: Vec<CString>,
    pub(crate) envp: Vec<CString>,
    pub(crate) cwd: CString,
}

impl ChildPayload {
    pub(crate) fn from_startup(startup: &ProcessStartup) -> Result<Self> {
        if startup.cmdline.is_empty() {
            return Err(ProcessError::InvalidConfig("empty command line".to_string()));
        }

        let argv = startup
            .cmdline
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ProcessError::InvalidConfig("argument contains NUL byte".to_string()))?;

        let mut keys: Vec<&String> = startup.env.keys().collect();
        keys.sort();
        let envp = keys
            .into_iter()
            .map(|key| CString::new(format!("{}={}", key, startup.env[key])))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| {
                ProcessError::InvalidConfig("environment entry contains NUL byte".to_string())
            })?;

        let cwd = CString::new(startup.cwd.as_str()).map_err(|_| {
            ProcessError::InvalidConfig("working directory contains NUL byte".to_string())
        })?;

        Ok(Self {
            program: startup.cmdline[0].clone(),
            argv,
            envp,
            cwd,
        })
    }
}

/// Abort the child; its exit status is the only channel left.
fn fail(msg: &str) -> ! {
    eprintln!("{}", msg);
    unsafe { libc::_exit(1) }
}

/// Entry point of the forked child: rebind the standard streams onto the
/// pipe ends, sanitize the descriptor table, change directory, exec.
///
/// Never returns. An exec failure exits with status 1 rather than letting
/// control fall back through the fork-copied stack.
pub(crate) fn child_entry(
    startup: &ProcessStartup,
    payload: &ChildPayload,
    stdin: &mut PipePair,
    stdout: &mut PipePair,
    stderr: &mut PipePair,
) -> ! {
    // drop the parent's ends first, so EOF can propagate once the parent
    // closes its side
    if !startup.stdin.is_redirected() {
        stdin.close_write();
    }
    if !startup.stdout.is_redirected() {
        stdout.close_read();
    }

    if dup2(stdin.read_end(), libc::STDIN_FILENO).is_err() {
        fail("unable to bind stdin");
    }
    if dup2(stdout.write_end(), libc::STDOUT_FILENO).is_err() {
        fail("unable to bind stdout");
    }

    // stderr either joins the stdout pipe or gets its own
    if startup.merge_outputs {
        if dup2(stdout.write_end(), libc::STDERR_FILENO).is_err() {
            fail("unable to merge stderr into stdout");
        }
    } else {
        if !startup.stderr.is_redirected() {
            stderr.close_read();
        }
        if dup2(stderr.write_end(), libc::STDERR_FILENO).is_err() {
            fail("unable to bind stderr");
        }
    }

    // the duplicates on 0/1/2 keep the pipes alive; the originals must go,
    // or they survive exec and the parent never sees EOF
    stdin.close_read();
    stdout.close_write();
    stderr.close_write();

    if !descriptors::close_inherited_descriptors() {
        descriptors::close_descriptors_brute_force();
    }

    if chdir(payload.cwd.as_c_str()).is_err() {
        fail("unable to change working directory");
    }

    let _ = exec::execvpe(&payload.program, &payload.argv, Some(&payload.envp));

    // exec only returns on failure
    unsafe { libc::_exit(1) }
}
