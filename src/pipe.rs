//! Descriptor utilities: invalid-fd sentinel, close-once closing, pipe pairs

use std::os::fd::IntoRawFd;
use std::os::unix::io::RawFd;

use crate::errors::{ProcessError, Result};

/// Sentinel for a descriptor slot that holds nothing.
pub const FD_INVALID: RawFd = -1;

/// Index of the read end in a pipe pair.
pub const PIPE_READ: usize = 0;
/// Index of the write end in a pipe pair.
pub const PIPE_WRITE: usize = 1;

/// Close a descriptor slot exactly once.
///
/// The slot is set to [`FD_INVALID`] after closing, so a second call on the
/// same slot is a no-op. Close failures are swallowed: the descriptor number
/// is dead either way, and cleanup must not abort process setup.
pub fn close_fd(fd: &mut RawFd) {
    if *fd == FD_INVALID {
        return;
    }
    let _ = nix::unistd::close(*fd);
    *fd = FD_INVALID;
}

/// A pipe as a two-slot descriptor array: index 0 reads, index 1 writes.
///
/// Both prospective sides of a fork see the same pair; each side closes the
/// end it does not use. A caller-redirected stream is modelled as a pair
/// whose both slots alias the caller's target descriptor, so the same
/// dup2-then-close choreography applies without a special case.
///
/// There is no `Drop` impl: which end is closed where and when is the whole
/// point of the fork choreography, so closing stays explicit.
#[derive(Debug)]
pub struct PipePair {
    fds: [RawFd; 2],
}

impl PipePair {
    /// Allocate a fresh OS pipe.
    pub fn create() -> Result<Self> {
        let (read, write) = nix::unistd::pipe()
            .map_err(|e| ProcessError::Syscall(format!("pipe failed: {}", e)))?;
        Ok(Self {
            fds: [read.into_raw_fd(), write.into_raw_fd()],
        })
    }

    /// Pair aliasing a caller-provided redirect target on both ends.
    pub fn from_redirect(target: RawFd) -> Self {
        Self {
            fds: [target, target],
        }
    }

    /// Pair holding nothing; closing it is a no-op.
    pub fn invalid() -> Self {
        Self {
            fds: [FD_INVALID, FD_INVALID],
        }
    }

    pub fn read_end(&self) -> RawFd {
        self.fds[PIPE_READ]
    }

    pub fn write_end(&self) -> RawFd {
        self.fds[PIPE_WRITE]
    }

    pub fn close_read(&mut self) {
        close_fd(&mut self.fds[PIPE_READ]);
    }

    pub fn close_write(&mut self) {
        close_fd(&mut self.fds[PIPE_WRITE]);
    }

    /// Close both ends.
    pub fn close(&mut self) {
        self.close_read();
        self.close_write();
    }
}
