use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// One command invocation: the command name followed by its positional arguments.
///
/// An `ArgVec` is never empty, so the launchers can rely on `argv[0]` existing.
/// The vector owns its tokens; dropping it at the end of a dispatch cycle releases
/// them, whichever path the cycle took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgVec {
    tokens: Vec<String>,
}

impl ArgVec {
    /// Wrap `tokens`, or return `None` when there is no command name.
    pub fn new(tokens: Vec<String>) -> Option<Self> {
        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    /// Token 0, the command name.
    pub fn name(&self) -> &str {
        &self.tokens[0]
    }

    /// Positional arguments after the command name.
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    /// The full vector, command name included.
    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ArgVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Two commands joined by one pipe separator.
///
/// Both stages are non-empty; the separator itself belongs to neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    first: ArgVec,
    second: ArgVec,
}

impl PipelineRequest {
    /// Build a request from the tokens on each side of the separator.
    ///
    /// Returns `None` when either side is empty, so a malformed pipeline never
    /// reaches the launcher.
    pub fn new(first: Vec<String>, second: Vec<String>) -> Option<Self> {
        Some(Self {
            first: ArgVec::new(first)?,
            second: ArgVec::new(second)?,
        })
    }

    /// The producer stage, whose standard output feeds the channel.
    pub fn first(&self) -> &ArgVec {
        &self.first
    }

    /// The consumer stage, whose standard input drains the channel.
    pub fn second(&self) -> &ArgVec {
        &self.second
    }
}

/// What the parser hands to the interpreter for one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Blank line: nothing to do.
    Empty,
    /// A single command, built-in or external.
    Simple(ArgVec),
    /// Two external programs joined by a pipe.
    Pipeline(PipelineRequest),
}

/// Signal returned by every dispatch to the read-eval loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Leave the loop; only the `exit` built-in produces this.
    Terminate,
}
