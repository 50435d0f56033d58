//! Descriptor table cleanup for the forked child
//!
//! A forked child inherits the parent's whole descriptor table. Anything
//! left open survives exec: pipes held by sibling processes stop delivering
//! EOF and private descriptors leak into the new program. Everything above
//! the standard streams gets closed before exec.

use std::os::unix::io::{AsRawFd, RawFd};

use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use nix::unistd::close;

/// First slot above the standard streams; descriptors above it are ours to
/// reap.
const FAIL_FILENO: RawFd = libc::STDERR_FILENO + 1;

#[cfg(target_os = "macos")]
const FD_DIR: &str = "/dev/fd";
#[cfg(not(target_os = "macos"))]
const FD_DIR: &str = "/proc/self/fd";

fn numeric_fd(name: &std::ffi::CStr) -> Option<RawFd> {
    name.to_str().ok()?.parse().ok()
}

/// Close every open descriptor above the reserved range by scanning the
/// per-process descriptor directory.
///
/// The slot just above stderr (`FAIL_FILENO`, fd 3) is never touched: it
/// stays reserved for failure reporting, so a descriptor sitting there
/// survives the reap. Everything from `FAIL_FILENO + 1` up is closed.
///
/// Returns false when the directory cannot be opened; callers must then
/// fall back to [`close_descriptors_brute_force`]. Safe to invoke more than
/// once: closing an already-closed number is not an error here.
pub fn close_inherited_descriptors() -> bool {
    let from_fd = FAIL_FILENO + 1;

    // opendir may itself sit on a descriptor, allocated at the lowest free
    // slot like open(2). Close two slots explicitly so the directory handle
    // can land below the range the scan tears down.
    let _ = close(from_fd);
    let _ = close(from_fd + 1);

    let mut dir = match Dir::open(FD_DIR, OFlag::O_RDONLY | OFlag::O_DIRECTORY, Mode::empty()) {
        Ok(dir) => dir,
        Err(_) => return false,
    };

    // never close the handle the enumeration itself runs on
    let dir_fd = dir.as_raw_fd();

    for entry in dir.iter() {
        let Ok(entry) = entry else { continue };
        let Some(fd) = numeric_fd(entry.file_name()) else {
            continue;
        };
        if fd >= from_fd + 2 && fd != dir_fd {
            let _ = close(fd);
        }
    }

    // the directory handle closes on drop
    true
}

/// Brute-force fallback: try every descriptor number up to the OS limit.
///
/// EBADF is the expected common case and is ignored; other close failures
/// are tolerated too, since failing to close one stray descriptor is less
/// harmful than failing to launch the program at all.
pub fn close_descriptors_brute_force() {
    let limit = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    let limit = if limit < 0 { 1024 } else { limit as RawFd };

    for fd in (FAIL_FILENO + 1)..limit {
        let _ = close(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, ForkResult};
    use std::fs::File;
    use std::os::fd::IntoRawFd;

    fn fd_is_open(fd: RawFd) -> bool {
        unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
    }

    /// Run `child` in a forked process and return its exit code; the child
    /// reports failure through its exit status since the reaper tears down
    /// the test harness descriptors.
    fn run_in_child(child: impl FnOnce() -> i32) -> i32 {
        match unsafe { fork() }.expect("fork failed") {
            ForkResult::Child => {
                let code = child();
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => match waitpid(child, None).expect("waitpid failed") {
                WaitStatus::Exited(_, code) => code,
                other => panic!("unexpected wait status: {:?}", other),
            },
        }
    }

    #[test]
    fn reaper_closes_strays_above_reserved_slot() {
        let code = run_in_child(|| {
            // enough strays that at least three land above the reserved
            // slot, wherever the lowest free numbers happen to be
            let strays: Vec<RawFd> = (0..4)
                .map(|_| File::open("/dev/null").unwrap().into_raw_fd())
                .collect();

            if !close_inherited_descriptors() {
                close_descriptors_brute_force();
            }

            for fd in strays {
                if fd >= FAIL_FILENO + 1 && fd_is_open(fd) {
                    return 2;
                }
                // the reserved slot itself is never touched
                if fd == FAIL_FILENO && !fd_is_open(fd) {
                    return 3;
                }
            }
            0
        });
        assert_eq!(code, 0);
    }

    #[test]
    fn reaper_is_idempotent() {
        let code = run_in_child(|| {
            if !close_inherited_descriptors() {
                close_descriptors_brute_force();
            }
            // a second pass over an already-clean table must still succeed
            if !close_inherited_descriptors() {
                close_descriptors_brute_force();
            }
            0
        });
        assert_eq!(code, 0);
    }

    #[test]
    fn brute_force_tolerates_closed_numbers() {
        let code = run_in_child(|| {
            close_descriptors_brute_force();
            close_descriptors_brute_force();
            0
        });
        assert_eq!(code, 0);
    }

    #[test]
    fn standard_streams_survive_the_reaper() {
        let code = run_in_child(|| {
            if !close_inherited_descriptors() {
                close_descriptors_brute_force();
            }
            for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                if !fd_is_open(fd) {
                    return 3;
                }
            }
            0
        });
        assert_eq!(code, 0);
    }
}
