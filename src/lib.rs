//! subproc: POSIX child-process control
//!
//! Spawns an external program with redirected standard streams, controls
//! its environment and working directory, and manages its lifecycle with
//! shell-compatible semantics, built from raw fork/exec/wait primitives.
//!
//! # Modules
//!
//! - **startup**: process startup configuration (command line, env, cwd,
//!   per-stream redirection, output merging)
//! - **pipe**: descriptor helpers and pipe pairs
//! - **execution**: the child-side path between fork and exec (descriptor
//!   reaping, `PATH` resolution, `execvpe`-equivalent, bootstrap)
//! - **controller**: spawn and the parent-side process handle
//! - **liveness**: exit detection when SIGCHLD is ignored
//!
//! # Example
//!
//! ```ignore
//! use subproc::{spawn, ProcessStartup};
//!
//! let startup = ProcessStartup::new("echo").arg("hello").inherit_env();
//! let mut handle = spawn(&startup)?;
//! let status = handle.wait();
//! handle.close();
//! println!("exit status: {}", status);
//! ```

pub mod controller;
pub mod errors;
pub mod execution;
pub mod liveness;
pub mod pipe;
pub mod startup;

pub use controller::{spawn, spawn_with_pipes, ProcessHandle, WAIT_FAILED};
pub use errors::{ProcessError, Result};
pub use execution::descriptors::{close_descriptors_brute_force, close_inherited_descriptors};
pub use execution::exec::{execvpe, execvpe_with_path};
pub use execution::path::{effective_path, DEFAULT_PATH};
pub use liveness::{LivenessProbe, ProcLiveness, SignalLiveness};
pub use pipe::{PipePair, FD_INVALID};
pub use startup::{ProcessStartup, Redirect};
