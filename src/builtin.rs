use crate::SHELL_NAME;
use crate::command::{ArgVec, Flow};
use crate::env::Environment;
use log::debug;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Built-in commands known to the interpreter at compile time.
///
/// Built-ins run inside the interpreter process because they change its own state:
/// `cd` its working directory, `exit` its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Cd,
    Exit,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 2] = [BuiltinKind::Cd, BuiltinKind::Exit];

    /// Canonical name of the command, e.g. "cd" or "exit".
    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Cd => "cd",
            BuiltinKind::Exit => "exit",
        }
    }
}

/// Where a simple command is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Builtin(BuiltinKind),
    External,
}

/// Decide whether `argv` names a built-in.
///
/// Matching is exact string equality on token 0. Pipeline stages never go through
/// here, so `cd` or `exit` inside a pipeline are run as external programs.
pub fn classify(argv: &ArgVec) -> CommandKind {
    BuiltinKind::ALL
        .into_iter()
        .find(|kind| kind.name() == argv.name())
        .map_or(CommandKind::External, CommandKind::Builtin)
}

#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("cd: requires an argument if HOME is not set")]
    HomeNotSet,
    #[error("cd: {}: {source}", .path.display())]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("built-in command '{0}' not implemented")]
    NotImplemented(String),
}

/// Run a built-in in the interpreter process.
///
/// Failures are written to `diagnostics` and never end the interpreter; only
/// `exit` returns [`Flow::Terminate`], whatever arguments follow it.
pub fn execute(argv: &ArgVec, env: &mut Environment, diagnostics: &mut dyn Write) -> Flow {
    let result = match classify(argv) {
        CommandKind::Builtin(BuiltinKind::Exit) => return Flow::Terminate,
        CommandKind::Builtin(BuiltinKind::Cd) => {
            change_dir(argv.args().first().map(String::as_str), env)
        }
        CommandKind::External => Err(BuiltinError::NotImplemented(argv.name().to_string())),
    };
    if let Err(err) = result {
        let _ = writeln!(diagnostics, "{SHELL_NAME}: {err}");
    }
    Flow::Continue
}

/// Change the interpreter's working directory to `target`, or to `HOME` when
/// `target` is `None`.
///
/// Relative paths resolve against the current working directory. On failure the
/// working directory is left unchanged.
pub fn change_dir(target: Option<&str>, env: &mut Environment) -> Result<(), BuiltinError> {
    let target = match target {
        Some(path) => PathBuf::from(path),
        None => env.home_dir().ok_or(BuiltinError::HomeNotSet)?,
    };

    env::set_current_dir(&target).map_err(|source| BuiltinError::ChangeDir {
        path: target.clone(),
        source,
    })?;
    env.current_dir = env::current_dir().unwrap_or(target);
    debug!("working directory is now {}", env.current_dir.display());
    Ok(())
}
