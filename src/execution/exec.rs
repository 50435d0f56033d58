//! `execvpe`-equivalent built from raw `execve`
//!
//! Three layers, mirroring the GNU extension: explicit-path exec, a
//! `PATH`-searching exec with shell-convention error reporting, and a
//! fallback that runs shebang-less scripts through the default shell.
//!
//! A successful exec never returns; every function here "returns" only the
//! failure errno.

use std::ffi::{CStr, CString};

use nix::errno::Errno;
use nix::unistd::{execve, execvp};

use crate::execution::path::effective_path;

const DEFAULT_SHELL: &str = "/bin/sh";

/// Lookup failures that let the search move on to the next directory.
/// EACCES also continues, but stickily: it must win over a later not-found.
fn continues_search(err: Errno) -> bool {
    matches!(
        err,
        Errno::ENOENT
            | Errno::ENOTDIR
            | Errno::ELOOP
            | Errno::ESTALE
            | Errno::ENODEV
            | Errno::ETIMEDOUT
    )
}

/// Exec `path`, treating an ENOEXEC rejection as a script without a `#!`
/// line and retrying through the default shell with a freshly built
/// argument vector (`sh <script> <args...>`).
///
/// If the shell itself cannot be invoked, the caller sees the original
/// ENOEXEC failure, not the shell's.
fn exec_or_shell(path: &CStr, argv: &[CString], env: &[CString]) -> Errno {
    let err = match execve(path, argv, env) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    if err != Errno::ENOEXEC {
        return err;
    }

    let shell = match CString::new(DEFAULT_SHELL) {
        Ok(shell) => shell,
        Err(_) => return err,
    };
    let mut shell_argv = Vec::with_capacity(argv.len() + 1);
    shell_argv.push(shell.clone());
    shell_argv.push(path.to_owned());
    shell_argv.extend(argv.iter().skip(1).cloned());

    let _ = execve(&shell, &shell_argv, env);
    err
}

/// Execute `file` with an explicit argument vector and environment,
/// searching `PATH` when the name has no `/`, like the GNU `execvpe`
/// extension. Returns only on failure.
///
/// With `env` of `None` there is no private environment to install and the
/// OS's own `PATH`-searching exec does the work.
pub fn execvpe(file: &str, argv: &[CString], env: Option<&[CString]>) -> Errno {
    execvpe_with_path(file, argv, env, std::env::var("PATH").ok().as_deref())
}

/// Same as [`execvpe`] but with the `PATH` value injected instead of read
/// from the process environment, for deterministic tests. `None` means
/// unset and falls back to the OS default list.
pub fn execvpe_with_path(
    file: &str,
    argv: &[CString],
    env: Option<&[CString]>,
    path: Option<&str>,
) -> Errno {
    let env = match env {
        Some(env) => env,
        None => {
            let program = match CString::new(file) {
                Ok(program) => program,
                Err(_) => return Errno::ENOENT,
            };
            return match execvp(&program, argv) {
                Ok(never) => match never {},
                Err(err) => err,
            };
        }
    };

    if file.is_empty() {
        return Errno::ENOENT;
    }

    // a name with a separator is an explicit path; PATH is never consulted
    if file.contains('/') {
        let program = match CString::new(file) {
            Ok(program) => program,
            Err(_) => return Errno::ENOENT,
        };
        return exec_or_shell(&program, argv, env);
    }

    let mut saw_eacces = false;
    let mut last = Errno::ENOENT;

    for dir in effective_path(path) {
        let candidate = if dir.ends_with('/') {
            format!("{}{}", dir, file)
        } else {
            format!("{}/{}", dir, file)
        };
        if candidate.len() + 1 > libc::PATH_MAX as usize {
            last = Errno::ENAMETOOLONG;
            continue;
        }
        let candidate = match CString::new(candidate) {
            Ok(candidate) => candidate,
            Err(_) => {
                last = Errno::ENOENT;
                continue;
            }
        };

        let err = exec_or_shell(&candidate, argv, env);
        if err == Errno::EACCES {
            saw_eacces = true;
            last = err;
            continue;
        }
        if continues_search(err) {
            last = err;
            continue;
        }
        return err;
    }

    // shell convention: a permission failure is not masked by a later
    // not-found in another directory
    if saw_eacces {
        Errno::EACCES
    } else {
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn argv(program: &str) -> Vec<CString> {
        vec![CString::new(program).unwrap()]
    }

    fn env() -> Vec<CString> {
        vec![CString::new("TEST=1").unwrap()]
    }

    #[test]
    fn empty_name_is_enoent() {
        let err = execvpe_with_path("", &argv(""), Some(&env()), Some("/bin"));
        assert_eq!(err, Errno::ENOENT);
    }

    #[test]
    fn explicit_path_failure_skips_search() {
        // a missing explicit path fails once, without consulting PATH
        let err = execvpe_with_path(
            "/nonexistent/program",
            &argv("/nonexistent/program"),
            Some(&env()),
            Some("/bin:/usr/bin"),
        );
        assert_eq!(err, Errno::ENOENT);
    }

    #[test]
    fn exhausted_search_reports_not_found() {
        let err = execvpe_with_path(
            "subproc-missing-program",
            &argv("subproc-missing-program"),
            Some(&env()),
            Some("/nonexistent-dir:/also-missing"),
        );
        assert_eq!(err, Errno::ENOENT);
    }

    #[test]
    fn oversized_candidates_report_name_too_long() {
        let long_name = "x".repeat(libc::PATH_MAX as usize);
        let err = execvpe_with_path(&long_name, &argv("x"), Some(&env()), Some("/bin"));
        assert_eq!(err, Errno::ENAMETOOLONG);
    }

    #[test]
    fn permission_denied_is_sticky_across_later_directories() {
        let dir = tempfile::tempdir().unwrap();
        let victim = dir.path().join("victim");
        {
            let mut file = std::fs::File::create(&victim).unwrap();
            file.write_all(b"echo should never run\n").unwrap();
        }
        let mut perms = std::fs::metadata(&victim).unwrap().permissions();
        perms.set_mode(0o644); // exists but not executable
        std::fs::set_permissions(&victim, perms).unwrap();

        let path = format!("{}:/nonexistent-dir", dir.path().display());
        let err = execvpe_with_path("victim", &argv("victim"), Some(&env()), Some(&path));
        assert_eq!(err, Errno::EACCES);
    }

    #[test]
    fn search_honors_directory_order() {
        // both directories miss; the last recorded error is the trailing
        // directory's ENOENT, not something from an earlier component
        let dir = tempfile::tempdir().unwrap();
        let path = format!("/nonexistent-dir:{}", dir.path().display());
        let err = execvpe_with_path("victim", &argv("victim"), Some(&env()), Some(&path));
        assert_eq!(err, Errno::ENOENT);
    }
}
