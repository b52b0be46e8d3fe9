//! A module implementing lexical analysis (tokenization) for the interpreter's input lines.
//!
//! Tokens are separated by spaces, tabs and newlines. There is no quoting and no
//! expansion: every maximal run of other characters is one token, so `|` is only a
//! separator when it stands alone.

use thiserror::Error;

/// Upper bound on the number of tokens accepted from one line.
pub const MAX_ARGS: usize = 64;

const TOKEN_DELIMITERS: [char; 3] = [' ', '\t', '\n'];

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// The line holds more than [`MAX_ARGS`] tokens.
    #[error("too many arguments (limit {limit})")]
    TooManyArguments { limit: usize },
}

/// Split `line` into owned tokens.
///
/// Returns an empty vector for a blank line, and [`LexingError::TooManyArguments`]
/// when the line has more than [`MAX_ARGS`] tokens.
pub fn split_into_tokens(line: &str) -> Result<Vec<String>, LexingError> {
    let mut tokens = Vec::new();
    for token in line.split(TOKEN_DELIMITERS).filter(|t| !t.is_empty()) {
        if tokens.len() == MAX_ARGS {
            return Err(LexingError::TooManyArguments { limit: MAX_ARGS });
        }
        tokens.push(token.to_string());
    }
    log::trace!("tokens = {tokens:?}");
    Ok(tokens)
}
