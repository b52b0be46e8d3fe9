use crate::command::{ArgVec, PipelineRequest, Request};
use thiserror::Error;

/// The standalone token that joins two commands.
pub const PIPE_SEPARATOR: &str = "|";

/// Errors that can occur while turning tokens into a [`Request`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// One side of the separator is empty (`| wc`, `ls |`, or a lone `|`).
    #[error("invalid command usage with pipe")]
    EmptyPipelineStage,
    /// More than one separator; only two-stage pipelines exist.
    #[error("pipelines with more than two stages are not supported")]
    TooManyStages,
}

/// Build a [`Request`] from the tokens of one line.
///
/// No tokens gives [`Request::Empty`]. One separator splits the tokens into the two
/// stages of a [`PipelineRequest`]; the separator is dropped. A second separator is
/// rejected rather than folded into the second stage.
pub fn construct_request(mut tokens: Vec<String>) -> Result<Request, ParsingError> {
    let mut separators = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| *t == PIPE_SEPARATOR)
        .map(|(i, _)| i);

    let request = match (separators.next(), separators.next()) {
        (None, _) => match ArgVec::new(tokens) {
            Some(argv) => Request::Simple(argv),
            None => Request::Empty,
        },
        (Some(at), None) => {
            let second = tokens.split_off(at + 1);
            tokens.truncate(at);
            let pipeline =
                PipelineRequest::new(tokens, second).ok_or(ParsingError::EmptyPipelineStage)?;
            Request::Pipeline(pipeline)
        }
        (Some(_), Some(_)) => return Err(ParsingError::TooManyStages),
    };

    log::trace!("request = {request:?}");
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn parse(line: &str) -> Result<Request, ParsingError> {
        construct_request(split_into_tokens(line).unwrap())
    }

    fn argv(tokens: &[&str]) -> ArgVec {
        ArgVec::new(tokens.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_blank_line_is_empty_request() {
        assert_eq!(parse("   ").unwrap(), Request::Empty);
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(
            parse("cd /tmp").unwrap(),
            Request::Simple(argv(&["cd", "/tmp"]))
        );
    }

    #[test]
    fn test_two_stage_pipeline_drops_separator() {
        match parse("ls -l | wc -l").unwrap() {
            Request::Pipeline(p) => {
                assert_eq!(p.first(), &argv(&["ls", "-l"]));
                assert_eq!(p.second(), &argv(&["wc", "-l"]));
            }
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_stage_is_rejected() {
        assert_eq!(parse("| wc"), Err(ParsingError::EmptyPipelineStage));
        assert_eq!(parse("ls |"), Err(ParsingError::EmptyPipelineStage));
        assert_eq!(parse("|"), Err(ParsingError::EmptyPipelineStage));
    }

    #[test]
    fn test_second_separator_is_rejected() {
        assert_eq!(parse("ls | sort | uniq"), Err(ParsingError::TooManyStages));
        assert_eq!(parse("ls | |"), Err(ParsingError::TooManyStages));
    }

    #[test]
    fn test_builtin_names_are_not_special_in_pipelines() {
        match parse("cd /tmp | cat").unwrap() {
            Request::Pipeline(p) => assert_eq!(p.first().name(), "cd"),
            other => panic!("expected pipeline, got {:?}", other),
        }
    }
}
