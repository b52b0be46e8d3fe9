//! Child-process primitives shared by the launchers.
//!
//! A child is started with [`fork_process`], which hands the caller either a
//! [`ChildHandle`] (in the interpreter) or a [`ChildContext`] (in the new child). The
//! context can only be turned into an `execvp` call, so the child never falls back
//! into interpreter code. The handle has to be consumed by [`ChildHandle::wait`] or
//! [`ChildHandle::terminate`]; dropping it unreaped kills and reaps the child.
//!
//! Whether image replacement succeeded is reported through a close-on-exec status
//! pipe: a successful `execvp` closes it silently, a failed one writes the errno
//! before the child exits.

use crate::SHELL_NAME;
use crate::command::{ArgVec, ExitCode};
use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, fork, pipe};
use std::ffi::{CString, c_char};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use thiserror::Error;

/// Failures of the process plumbing itself. None of them ends the interpreter.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("pipe failed: {}", .errno.desc())]
    Pipe { errno: Errno },
    #[error("fork failed for {command}: {}", .errno.desc())]
    Fork { command: String, errno: Errno },
    #[error("waitpid failed for pid {pid}: {}", .errno.desc())]
    Wait { pid: Pid, errno: Errno },
    #[error("signal failed: {}", .errno.desc())]
    Signal { errno: Errno },
    #[error("{arg:?}: argument contains a NUL byte")]
    NulByte { arg: String },
}

/// How a child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The program ran and exited with this status.
    Exited(ExitCode),
    /// The program was killed by a signal.
    Signaled(Signal),
    /// The child never became the program (not found, not executable, setup failed).
    LaunchFailed(Errno),
}

impl ExitOutcome {
    /// Shell-style status: 128+N for signal N, 127 for a missing program, 126 for
    /// any other launch failure.
    pub fn code(&self) -> ExitCode {
        match *self {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::Signaled(sig) => 128 + sig as i32,
            ExitOutcome::LaunchFailed(Errno::ENOENT) => 127,
            ExitOutcome::LaunchFailed(_) => 126,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exited with status {code}"),
            ExitOutcome::Signaled(sig) => write!(f, "terminated by {}", sig.as_str()),
            ExitOutcome::LaunchFailed(errno) => write!(f, "launch failed: {}", errno.desc()),
        }
    }
}

/// Ignore the interactive interrupt (SIGINT) in the interpreter process.
///
/// Children restore the default disposition before `execvp`, so Ctrl-C stops the
/// foreground command and leaves the interpreter running.
pub fn ignore_interrupts() -> Result<(), LaunchError> {
    // SAFETY: SIG_IGN installs no handler code.
    unsafe { signal::signal(Signal::SIGINT, SigHandler::SigIgn) }
        .map(drop)
        .map_err(|errno| LaunchError::Signal { errno })
}

/// Undo the interpreter's ignored signals in a child: SIGINT ignored above, and
/// SIGPIPE ignored by the Rust runtime at startup.
fn restore_default_signals() -> Result<(), Errno> {
    for sig in [Signal::SIGINT, Signal::SIGPIPE] {
        // SAFETY: SIG_DFL installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigDfl) }?;
    }
    Ok(())
}

/// A pipe whose both ends are closed on `execvp`.
///
/// `dup2` clears the flag on the copy, so an end that is installed as stdin or
/// stdout survives image replacement while stray copies do not.
pub(crate) fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), LaunchError> {
    let (read, write) = pipe().map_err(|errno| LaunchError::Pipe { errno })?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|errno| LaunchError::Pipe { errno })?;
    }
    Ok((read, write))
}

/// An argument vector converted for `execvp` ahead of `fork`.
///
/// `pointers` is NUL-terminated and points into `argv`, whose heap buffers do
/// not move when the struct does.
pub(crate) struct ExecArgs {
    argv: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl ExecArgs {
    pub(crate) fn new(args: &ArgVec) -> Result<Self, LaunchError> {
        let argv = args
            .as_slice()
            .iter()
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|_| LaunchError::NulByte { arg: arg.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut pointers: Vec<*const c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
        pointers.push(std::ptr::null());
        Ok(Self { argv, pointers })
    }

    fn program(&self) -> &CString {
        &self.argv[0]
    }

    pub(crate) fn name(&self) -> &str {
        self.program().to_str().unwrap_or("<non-utf8>")
    }
}

/// Standard-stream setup a child performs before `execvp`.
pub(crate) enum Wiring {
    /// Keep the interpreter's stdin and stdout.
    Inherit,
    /// Make this descriptor the child's stdout.
    StdoutTo(OwnedFd),
    /// Make this descriptor the child's stdin.
    StdinFrom(OwnedFd),
}

impl Wiring {
    fn install(self) -> Result<(), Errno> {
        match self {
            Wiring::Inherit => Ok(()),
            Wiring::StdoutTo(fd) => redirect(fd, libc::STDOUT_FILENO),
            Wiring::StdinFrom(fd) => redirect(fd, libc::STDIN_FILENO),
        }
    }
}

fn redirect(fd: OwnedFd, target: RawFd) -> Result<(), Errno> {
    if fd.as_raw_fd() == target {
        // already in place, only the close-on-exec flag has to go
        fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
        let _ = fd.into_raw_fd();
    } else {
        dup2(fd.as_raw_fd(), target)?;
        drop(fd);
    }
    Ok(())
}

/// Result of [`fork_process`], seen from each side of the fork.
pub(crate) enum Forked<'a> {
    Parent(ChildHandle),
    Child(ChildContext<'a>),
}

/// Start a child process that will run `program`.
///
/// In the child the caller must immediately call [`ChildContext::exec`].
pub(crate) fn fork_process(program: &ExecArgs) -> Result<Forked<'_>, LaunchError> {
    let (status_read, status_write) = cloexec_pipe()?;

    // SAFETY: between fork and execvp the child only closes descriptors, resets
    // signal dispositions, calls dup2 and writes to raw descriptors before `_exit`.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            drop(status_write);
            debug!("started {} as pid {child}", program.name());
            Ok(Forked::Parent(ChildHandle::new(child, status_read)))
        }
        Ok(ForkResult::Child) => {
            drop(status_read);
            Ok(Forked::Child(ChildContext {
                program,
                status: status_write,
            }))
        }
        Err(errno) => Err(LaunchError::Fork {
            command: program.name().to_string(),
            errno,
        }),
    }
}

/// The child's side of a fork. Only [`exec`](ChildContext::exec) can be done with it.
pub(crate) struct ChildContext<'a> {
    program: &'a ExecArgs,
    status: OwnedFd,
}

impl ChildContext<'_> {
    /// Install `wiring` and replace the process image. Never returns.
    ///
    /// On failure the reason goes to stderr and to the status pipe, then the child
    /// exits with [`ExitOutcome::code`] of the failure.
    pub(crate) fn exec(self, wiring: Wiring) -> ! {
        let errno = match prepare(wiring) {
            Ok(()) => {
                // SAFETY: both arrays are NUL-terminated and outlive the call.
                unsafe {
                    libc::execvp(
                        self.program.program().as_ptr(),
                        self.program.pointers.as_ptr(),
                    )
                };
                let errno = Errno::last();
                write_stderr(&[
                    SHELL_NAME.as_bytes(),
                    b": ",
                    self.program.program().as_bytes(),
                    b": ",
                    errno.desc().as_bytes(),
                    b"\n",
                ]);
                errno
            }
            Err((operation, errno)) => {
                write_stderr(&[
                    SHELL_NAME.as_bytes(),
                    b": ",
                    operation.as_bytes(),
                    b" failed: ",
                    errno.desc().as_bytes(),
                    b"\n",
                ]);
                errno
            }
        };

        let report = (errno as i32).to_ne_bytes();
        // SAFETY: raw write(2) on a descriptor this process owns, then _exit(2)
        // so no destructor or atexit handler of the interpreter runs here.
        unsafe {
            libc::write(self.status.as_raw_fd(), report.as_ptr().cast(), report.len());
            libc::_exit(ExitOutcome::LaunchFailed(errno).code())
        }
    }
}

fn prepare(wiring: Wiring) -> Result<(), (&'static str, Errno)> {
    restore_default_signals().map_err(|errno| ("signal", errno))?;
    wiring.install().map_err(|errno| ("dup2", errno))
}

fn write_stderr(parts: &[&[u8]]) {
    for part in parts {
        // SAFETY: the buffer is valid for `part.len()` bytes.
        unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len()) };
    }
}

/// A started child that has not been reaped yet.
///
/// Consume it with [`wait`](ChildHandle::wait) or [`terminate`](ChildHandle::terminate).
/// A handle dropped without either kills the child with SIGKILL and reaps it, so an
/// early return can never leave a zombie behind.
#[must_use = "a started child must be reaped with `wait` or `terminate`"]
#[derive(Debug)]
pub struct ChildHandle {
    pid: Pid,
    launch_status: Option<File>,
    reaped: bool,
}

impl ChildHandle {
    fn new(pid: Pid, launch_status: OwnedFd) -> Self {
        Self {
            pid,
            launch_status: Some(File::from(launch_status)),
            reaped: false,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Block until the child has exited or been killed, and reap it.
    ///
    /// Stop notifications are skipped; the wait resumes until the child terminates.
    pub fn wait(mut self) -> Result<ExitOutcome, LaunchError> {
        self.reaped = true;
        let launch_error = self.launch_status.take().and_then(read_launch_status);
        let mut outcome = wait_for_termination(self.pid)?;
        if let Some(errno) = launch_error {
            outcome = ExitOutcome::LaunchFailed(errno);
        }
        debug!("reaped pid {}: {outcome}", self.pid);
        Ok(outcome)
    }

    /// Send SIGTERM, then reap the child.
    pub fn terminate(self) -> Result<ExitOutcome, LaunchError> {
        match signal::kill(self.pid, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(errno) => warn!("kill({}, SIGTERM) failed: {}", self.pid, errno.desc()),
        }
        self.wait()
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        warn!("pid {} dropped without being reaped, killing it", self.pid);
        let _ = signal::kill(self.pid, Signal::SIGKILL);
        if let Err(err) = wait_for_termination(self.pid) {
            warn!("{err}");
        }
    }
}

fn read_launch_status(mut status: File) -> Option<Errno> {
    let mut report = [0u8; 4];
    match status.read_exact(&mut report) {
        Ok(()) => Some(Errno::from_raw(i32::from_ne_bytes(report))),
        Err(_) => None,
    }
}

fn wait_for_termination(pid: Pid) -> Result<ExitOutcome, LaunchError> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitOutcome::Exited(code)),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ExitOutcome::Signaled(sig)),
            Ok(status) => trace!("pid {pid} changed state: {status:?}"),
            Err(Errno::EINTR) => {}
            Err(errno) => return Err(LaunchError::Wait { pid, errno }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::lock_process;

    fn start(tokens: &[&str]) -> ChildHandle {
        let argv = ArgVec::new(tokens.iter().map(|s| s.to_string()).collect()).unwrap();
        let program = ExecArgs::new(&argv).unwrap();
        match fork_process(&program).unwrap() {
            Forked::Child(child) => child.exec(Wiring::Inherit),
            Forked::Parent(handle) => handle,
        }
    }

    fn assert_reaped(pid: Pid) {
        assert_eq!(
            waitpid(pid, Some(WaitPidFlag::WNOHANG)),
            Err(Errno::ECHILD),
            "pid {pid} is still in the process table"
        );
    }

    #[test]
    fn test_exit_status_is_collected() {
        let _lock = lock_process();

        let child = start(&["true"]);
        let pid = child.pid();
        assert_eq!(child.wait().unwrap(), ExitOutcome::Exited(0));
        assert_reaped(pid);

        let child = start(&["sh", "-c", "exit 3"]);
        assert_eq!(child.wait().unwrap(), ExitOutcome::Exited(3));
    }

    #[test]
    fn test_missing_program_is_a_launch_failure() {
        let _lock = lock_process();

        let child = start(&["tinysh-test-no-such-program"]);
        let pid = child.pid();
        let outcome = child.wait().unwrap();
        assert_eq!(outcome, ExitOutcome::LaunchFailed(Errno::ENOENT));
        assert_eq!(outcome.code(), 127);
        assert_reaped(pid);
    }

    #[test]
    fn test_signal_termination_is_reported() {
        let _lock = lock_process();

        let child = start(&["sh", "-c", "kill -TERM $$"]);
        assert_eq!(child.wait().unwrap(), ExitOutcome::Signaled(Signal::SIGTERM));
    }

    #[test]
    fn test_stopped_child_is_waited_through() {
        let _lock = lock_process();

        let child = start(&["sh", "-c", "(sleep 1; kill -CONT $$) & kill -STOP $$; exit 7"]);
        let pid = child.pid();
        assert_eq!(child.wait().unwrap(), ExitOutcome::Exited(7));
        assert_reaped(pid);
    }

    #[test]
    fn test_terminate_kills_and_reaps() {
        let _lock = lock_process();

        let child = start(&["sleep", "30"]);
        let pid = child.pid();
        assert_eq!(
            child.terminate().unwrap(),
            ExitOutcome::Signaled(Signal::SIGTERM)
        );
        assert_reaped(pid);
    }

    #[test]
    fn test_dropped_handle_does_not_leave_a_zombie() {
        let _lock = lock_process();

        let child = start(&["sleep", "30"]);
        let pid = child.pid();
        drop(child);
        assert_reaped(pid);
    }

    #[test]
    fn test_nul_byte_is_rejected_before_fork() {
        let argv = ArgVec::new(vec!["echo".to_string(), "a\0b".to_string()]).unwrap();
        assert!(matches!(
            ExecArgs::new(&argv),
            Err(LaunchError::NulByte { .. })
        ));
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(ExitOutcome::Exited(0).code(), 0);
        assert!(ExitOutcome::Exited(0).success());
        assert!(!ExitOutcome::Exited(2).success());
        assert_eq!(ExitOutcome::Signaled(Signal::SIGINT).code(), 130);
        assert_eq!(ExitOutcome::LaunchFailed(Errno::EACCES).code(), 126);
        assert_eq!(
            ExitOutcome::Exited(2).to_string(),
            "exited with status 2".to_string()
        );
    }
}
