//! A minimal interactive command interpreter.
//!
//! The crate reads a line, splits it into an argument vector and runs it either as a
//! built-in action inside the interpreter process (`cd`, `exit`) or as an external
//! program in a child process. Two programs can be joined by a single `|`, in which
//! case the first one's standard output feeds the second one's standard input.
//!
//! The main entry point is [`Interpreter`]. The process plumbing lives in
//! [`external`] (one child) and [`pipeline`] (two children and a channel), both built
//! on the reap-exactly-once [`process::ChildHandle`].
//!
//! Only Unix targets are supported: the launchers use `fork`, `execvp`, `pipe` and
//! `dup2` directly.

pub mod builtin;
pub mod command;
pub mod env;
pub mod external;
pub mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod process;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

/// Prefix of every diagnostic the interpreter writes to standard error.
pub const SHELL_NAME: &str = "tinysh";
