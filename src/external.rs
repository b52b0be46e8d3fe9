//! Running a single external program.

use crate::command::ArgVec;
use crate::process::{ExecArgs, ExitOutcome, Forked, LaunchError, Wiring, fork_process};

/// Run `argv` as an external program and wait for it.
///
/// The program is looked up through `PATH` by `execvp`; the name is passed through
/// unmodified. The child inherits the interpreter's standard streams and the default
/// SIGINT disposition. When this returns `Ok`, the child has been reaped.
///
/// A program that cannot be started still yields `Ok` with
/// [`ExitOutcome::LaunchFailed`]; the child has already reported why on stderr.
pub fn launch(argv: &ArgVec) -> Result<ExitOutcome, LaunchError> {
    let program = ExecArgs::new(argv)?;
    let child = match fork_process(&program)? {
        Forked::Child(child) => child.exec(Wiring::Inherit),
        Forked::Parent(child) => child,
    };
    child.wait()
}
