//! Process startup configuration

use std::collections::HashMap;
use std::os::unix::io::RawFd;

use crate::pipe::FD_INVALID;

/// Where one standard stream of the child should go.
///
/// The default means "let the spawner manage an internal pipe"; a redirect
/// target means the caller owns the descriptor (and will close its end) and
/// no internal pipe is created for that stream.
#[derive(Debug, Clone, Copy)]
pub struct Redirect {
    target: RawFd,
}

impl Default for Redirect {
    fn default() -> Self {
        Self { target: FD_INVALID }
    }
}

impl Redirect {
    /// No redirect target: the spawner creates a pipe for this stream.
    pub fn none() -> Self {
        Self::default()
    }

    /// Redirect this stream onto a caller-owned descriptor.
    pub fn to_fd(target: RawFd) -> Self {
        Self { target }
    }

    pub fn is_redirected(&self) -> bool {
        self.target != FD_INVALID
    }

    pub fn target(&self) -> RawFd {
        self.target
    }
}

/// Startup description for one child process.
///
/// The command line and environment are snapshotted at fork time; mutating
/// a `ProcessStartup` after [`spawn`](crate::controller::spawn) has no
/// effect on the already-launched process.
#[derive(Debug, Clone)]
pub struct ProcessStartup {
    /// Command line; the first element is the program name or path.
    pub cmdline: Vec<String>,
    /// Environment the child starts with, serialized to `NAME=VALUE`.
    pub env: HashMap<String, String>,
    /// Working directory of the child.
    pub cwd: String,
    /// Standard input redirection.
    pub stdin: Redirect,
    /// Standard output redirection.
    pub stdout: Redirect,
    /// Standard error redirection.
    pub stderr: Redirect,
    /// Send the child's stderr into the stdout stream.
    pub merge_outputs: bool,
}

impl ProcessStartup {
    /// Start describing a child running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            cmdline: vec![program.into()],
            env: HashMap::new(),
            cwd: ".".to_string(),
            stdin: Redirect::none(),
            stdout: Redirect::none(),
            stderr: Redirect::none(),
            merge_outputs: false,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.cmdline.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmdline.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Snapshot the parent's current environment into the map.
    ///
    /// Variables already set explicitly keep their explicit value. The
    /// snapshot is taken now, not at fork time.
    pub fn inherit_env(mut self) -> Self {
        for (key, value) in std::env::vars() {
            self.env.entry(key).or_insert(value);
        }
        self
    }

    /// Set the child's working directory.
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Redirect the child's stdin onto a caller-owned descriptor.
    pub fn redirect_stdin(mut self, target: RawFd) -> Self {
        self.stdin = Redirect::to_fd(target);
        self
    }

    /// Redirect the child's stdout onto a caller-owned descriptor.
    pub fn redirect_stdout(mut self, target: RawFd) -> Self {
        self.stdout = Redirect::to_fd(target);
        self
    }

    /// Redirect the child's stderr onto a caller-owned descriptor.
    pub fn redirect_stderr(mut self, target: RawFd) -> Self {
        self.stderr = Redirect::to_fd(target);
        self
    }

    /// Merge the child's stderr into its stdout stream.
    pub fn merge_outputs(mut self, merge: bool) -> Self {
        self.merge_outputs = merge;
        self
    }

    /// Program name or path, the first command-line element. `None` when
    /// the command line has been emptied out from under the startup.
    pub fn program(&self) -> Option<&str> {
        self.cmdline.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_startup_has_program_as_argv0() {
        let startup = ProcessStartup::new("/bin/echo");
        assert_eq!(startup.cmdline, vec!["/bin/echo"]);
        assert_eq!(startup.program(), Some("/bin/echo"));
        assert_eq!(startup.cwd, ".");
        assert!(!startup.merge_outputs);
        assert!(!startup.stdin.is_redirected());
    }

    #[test]
    fn builder_collects_args_and_env() {
        let startup = ProcessStartup::new("echo")
            .arg("hello")
            .args(["a", "b"])
            .env("KEY", "value")
            .cwd("/tmp")
            .merge_outputs(true);

        assert_eq!(startup.cmdline, vec!["echo", "hello", "a", "b"]);
        assert_eq!(startup.env.get("KEY").map(String::as_str), Some("value"));
        assert_eq!(startup.cwd, "/tmp");
        assert!(startup.merge_outputs);
    }

    #[test]
    fn redirects_record_targets() {
        let startup = ProcessStartup::new("cat")
            .redirect_stdin(3)
            .redirect_stdout(4)
            .redirect_stderr(5);

        assert!(startup.stdin.is_redirected());
        assert_eq!(startup.stdin.target(), 3);
        assert_eq!(startup.stdout.target(), 4);
        assert_eq!(startup.stderr.target(), 5);
    }

    #[test]
    fn inherit_env_keeps_explicit_overrides() {
        std::env::set_var("SUBPROC_STARTUP_TEST", "parent");
        let startup = ProcessStartup::new("env")
            .env("SUBPROC_STARTUP_TEST", "override")
            .inherit_env();

        assert_eq!(
            startup.env.get("SUBPROC_STARTUP_TEST").map(String::as_str),
            Some("override")
        );
        // something from the parent environment made it in
        assert!(startup.env.len() > 1);
        std::env::remove_var("SUBPROC_STARTUP_TEST");
    }

    #[test]
    fn program_is_none_on_emptied_cmdline() {
        let mut startup = ProcessStartup::new("prog");
        startup.cmdline.clear();
        assert_eq!(startup.program(), None);
    }

    #[test]
    fn startup_clone_is_independent() {
        let original = ProcessStartup::new("echo").arg("one");
        let mut cloned = original.clone();
        cloned.cmdline.push("two".to_string());

        assert_eq!(original.cmdline.len(), 2);
        assert_eq!(cloned.cmdline.len(), 3);
    }
}
