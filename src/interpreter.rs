use crate::SHELL_NAME;
use crate::builtin::{self, CommandKind};
use crate::command::{ArgVec, Flow, PipelineRequest, Request};
use crate::env::Environment;
use crate::external;
use crate::io_adapters::{EditorSource, LineSource, ReadOutcome};
use crate::lexer;
use crate::parser;
use crate::pipeline;
use log::debug;
use std::fmt::Display;
use std::io::Write;

/// A minimal shell-like interpreter that runs built-in and external commands.
///
/// Each call to [`execute_line`](Interpreter::execute_line) is one dispatch cycle:
/// tokenize, parse, run, and release the argument vectors. The interpreter blocks
/// until every child it started has been reaped. Failures are written to the
/// diagnostics stream (stderr by default) and never stop the interpreter; only the
/// `exit` built-in does.
///
/// Example
/// ```
/// use tinysh::Interpreter;
/// use tinysh::command::Flow;
///
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.execute_line("true"), Flow::Continue);
/// assert_eq!(sh.execute_line("exit now"), Flow::Terminate);
/// ```
pub struct Interpreter {
    env: Environment,
    diagnostics: Box<dyn Write>,
}

impl Interpreter {
    /// Create an interpreter reporting to stderr.
    pub fn new(env: Environment) -> Self {
        Self::with_diagnostics(env, Box::new(std::io::stderr()))
    }

    /// Create an interpreter that writes its own error reports to `diagnostics`.
    ///
    /// Children keep writing to the process's real stderr.
    pub fn with_diagnostics(env: Environment, diagnostics: Box<dyn Write>) -> Self {
        Self { env, diagnostics }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run one dispatch cycle for a raw input line.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        let tokens = match lexer::split_into_tokens(line) {
            Ok(tokens) => tokens,
            Err(err) => return self.report(err),
        };
        match parser::construct_request(tokens) {
            Ok(request) => self.execute(request),
            Err(err) => self.report(err),
        }
    }

    /// Run an already parsed request.
    ///
    /// The request is owned by this call and released when it returns, whichever
    /// way the dispatch went.
    pub fn execute(&mut self, request: Request) -> Flow {
        match request {
            Request::Empty => Flow::Continue,
            Request::Simple(argv) => self.execute_simple(argv),
            Request::Pipeline(request) => self.execute_pipeline(request),
        }
    }

    fn execute_simple(&mut self, argv: ArgVec) -> Flow {
        match builtin::classify(&argv) {
            CommandKind::Builtin(_) => {
                builtin::execute(&argv, &mut self.env, &mut *self.diagnostics)
            }
            CommandKind::External => match external::launch(&argv) {
                Ok(outcome) => {
                    debug!("{}: {outcome}", argv.name());
                    Flow::Continue
                }
                Err(err) => self.report(err),
            },
        }
    }

    fn execute_pipeline(&mut self, request: PipelineRequest) -> Flow {
        match pipeline::launch(&request) {
            Ok(outcome) => {
                debug!(
                    "{} | {}: {} / {}",
                    request.first().name(),
                    request.second().name(),
                    outcome.first,
                    outcome.second
                );
                Flow::Continue
            }
            Err(err) => self.report(err),
        }
    }

    /// Write a failure to the diagnostics stream; the loop always goes on.
    fn report(&mut self, err: impl Display) -> Flow {
        let _ = writeln!(self.diagnostics, "{SHELL_NAME}: {err}");
        Flow::Continue
    }

    /// Read and run lines from `source` until end of input or `exit`.
    ///
    /// An interrupted read discards the partial line and prompts again.
    pub fn run(&mut self, source: &mut dyn LineSource, prompt: &str) -> anyhow::Result<()> {
        loop {
            match source.read_line(prompt)? {
                ReadOutcome::Line(line) => {
                    if self.execute_line(&line) == Flow::Terminate {
                        break;
                    }
                }
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => break,
            }
        }
        Ok(())
    }

    /// Interactive Read-Eval-Print Loop on the terminal.
    pub fn repl(&mut self, prompt: &str) -> anyhow::Result<()> {
        let mut editor = EditorSource::new()?;
        self.run(&mut editor, prompt)
    }
}

impl Default for Interpreter {
    /// Create an interpreter over the current process environment, reporting to stderr.
    fn default() -> Self {
        Self::new(Environment::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::{MemWriter, ScriptSource};
    use crate::test_support::lock_process;
    use std::cell::RefCell;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn interpreter() -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
        let (writer, handle) = MemWriter::with_handle();
        (
            Interpreter::with_diagnostics(Environment::empty(), Box::new(writer)),
            handle,
        )
    }

    fn text(handle: &Rc<RefCell<Vec<u8>>>) -> String {
        String::from_utf8(handle.borrow().clone()).unwrap()
    }

    fn scratch_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tinysh_interp_{}_{}", std::process::id(), tag))
    }

    /// Source that replays canned outcomes, for paths a script file cannot produce.
    struct Replay(Vec<ReadOutcome>);

    impl LineSource for Replay {
        fn read_line(&mut self, _prompt: &str) -> anyhow::Result<ReadOutcome> {
            if self.0.is_empty() {
                Ok(ReadOutcome::Eof)
            } else {
                Ok(self.0.remove(0))
            }
        }
    }

    #[test]
    fn test_blank_line_does_nothing() {
        let (mut sh, diagnostics) = interpreter();
        assert_eq!(sh.execute_line(""), Flow::Continue);
        assert_eq!(sh.execute_line("   \t "), Flow::Continue);
        assert_eq!(text(&diagnostics), "");
    }

    #[test]
    fn test_exit_with_trailing_arguments_terminates() {
        let (mut sh, diagnostics) = interpreter();
        assert_eq!(sh.execute_line("exit"), Flow::Terminate);
        assert_eq!(sh.execute_line("  exit 1 2 3"), Flow::Terminate);
        assert_eq!(text(&diagnostics), "");
    }

    #[test]
    fn test_external_command_failure_does_not_stop_the_loop() {
        let _lock = lock_process();
        let (mut sh, diagnostics) = interpreter();

        assert_eq!(sh.execute_line("false"), Flow::Continue);
        assert_eq!(sh.execute_line("tinysh-test-no-such-program"), Flow::Continue);
        // the child reports its own launch failure on the real stderr
        assert_eq!(text(&diagnostics), "");
    }

    #[test]
    fn test_cd_changes_the_interpreter_directory() {
        let _lock = lock_process();
        let before = std::env::current_dir().unwrap();
        let target = fs::canonicalize(std::env::temp_dir()).unwrap();
        let (mut sh, diagnostics) = interpreter();

        sh.execute_line(&format!("cd {}", target.display()));
        let after = std::env::current_dir().unwrap();
        std::env::set_current_dir(&before).unwrap();

        assert_eq!(after, target);
        assert_eq!(sh.env().current_dir, target);
        assert_eq!(text(&diagnostics), "");
    }

    #[test]
    fn test_cd_to_missing_directory_reports() {
        let _lock = lock_process();
        let before = std::env::current_dir().unwrap();
        let (mut sh, diagnostics) = interpreter();

        assert_eq!(sh.execute_line("cd /no/such/dir/tinysh"), Flow::Continue);
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert!(text(&diagnostics).starts_with("tinysh: cd: /no/such/dir/tinysh: "));
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        let (mut sh, diagnostics) = interpreter();

        assert_eq!(sh.execute_line("ls |"), Flow::Continue);
        assert_eq!(sh.execute_line("ls | sort | uniq"), Flow::Continue);
        let too_many = vec!["a"; lexer::MAX_ARGS + 1].join(" ");
        assert_eq!(sh.execute_line(&too_many), Flow::Continue);

        assert_eq!(
            text(&diagnostics),
            "tinysh: invalid command usage with pipe\n\
             tinysh: pipelines with more than two stages are not supported\n\
             tinysh: too many arguments (limit 64)\n"
        );
    }

    #[test]
    fn test_pipeline_line_connects_stages() {
        let _lock = lock_process();
        let out = scratch_file("tee");
        let (mut sh, diagnostics) = interpreter();

        let flow = sh.execute_line(&format!("echo through the pipe | tee {}", out.display()));
        assert_eq!(flow, Flow::Continue);
        assert_eq!(fs::read_to_string(&out).unwrap(), "through the pipe\n");
        assert_eq!(text(&diagnostics), "");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_run_stops_at_exit() {
        let _lock = lock_process();
        let marker = scratch_file("never");
        let _ = fs::remove_file(&marker);
        let (mut sh, _diagnostics) = interpreter();

        let script = format!("\ntrue\nexit\ntouch {}\n", marker.display());
        let mut source = ScriptSource::new(Cursor::new(script));
        sh.run(&mut source, "> ").unwrap();

        assert!(!marker.exists(), "lines after exit must not run");
    }

    #[test]
    fn test_run_stops_at_eof_and_survives_interrupts() {
        let _lock = lock_process();
        let marker = scratch_file("after_interrupt");
        let _ = fs::remove_file(&marker);
        let (mut sh, _diagnostics) = interpreter();

        let mut source = Replay(vec![
            ReadOutcome::Interrupted,
            ReadOutcome::Line(format!("touch {}", marker.display())),
        ]);
        sh.run(&mut source, "> ").unwrap();

        assert!(marker.exists());
        let _ = fs::remove_file(marker);
    }
}
