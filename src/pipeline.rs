//! Two external programs joined by one pipe.
//!
//! The only rule that matters for correctness here: every process closes the pipe
//! ends it does not use. If anyone other than the producer keeps the write end open,
//! the consumer never sees end-of-input. [`Channel`] turns that rule into ownership:
//! each role consumes the channel and gets back only its own end.

use crate::command::PipelineRequest;
use crate::process::{
    ExecArgs, ExitOutcome, Forked, LaunchError, Wiring, cloexec_pipe, fork_process,
};
use log::{debug, warn};
use std::os::fd::OwnedFd;

/// The two ends of one unidirectional pipe, owned by the orchestrating process
/// until each child takes its role.
#[derive(Debug)]
pub struct Channel {
    read: OwnedFd,
    write: OwnedFd,
}

impl Channel {
    pub fn open() -> Result<Self, LaunchError> {
        let (read, write) = cloexec_pipe()?;
        Ok(Self { read, write })
    }

    /// Producer role: drop the read end, keep the write end for stdout.
    pub(crate) fn into_producer(self) -> Wiring {
        let Channel { read, write } = self;
        drop(read);
        Wiring::StdoutTo(write)
    }

    /// Consumer role: drop the write end, keep the read end for stdin.
    pub(crate) fn into_consumer(self) -> Wiring {
        let Channel { read, write } = self;
        drop(write);
        Wiring::StdinFrom(read)
    }

    /// Orchestrator role after both children exist: hold neither end.
    pub fn close(self) {}
}

/// Exit outcomes of both stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub first: ExitOutcome,
    pub second: ExitOutcome,
}

/// Run both stages of `request` concurrently, the first stage's stdout feeding the
/// second stage's stdin, and wait for both.
///
/// If the second child cannot be created, the first one is terminated and reaped
/// before the error is returned. Pipe creation failure aborts before any child
/// exists.
pub fn launch(request: &PipelineRequest) -> Result<PipelineOutcome, LaunchError> {
    launch_with(request, fork_process)
}

fn launch_with<F>(request: &PipelineRequest, mut fork: F) -> Result<PipelineOutcome, LaunchError>
where
    F: for<'a> FnMut(&'a ExecArgs) -> Result<Forked<'a>, LaunchError>,
{
    let first = ExecArgs::new(request.first())?;
    let second = ExecArgs::new(request.second())?;
    let channel = Channel::open()?;

    let producer = match fork(&first)? {
        Forked::Child(child) => child.exec(channel.into_producer()),
        Forked::Parent(handle) => handle,
    };

    let consumer = match fork(&second) {
        Ok(Forked::Child(child)) => child.exec(channel.into_consumer()),
        Ok(Forked::Parent(handle)) => handle,
        Err(err) => {
            match producer.terminate() {
                Ok(outcome) => debug!("first stage {}: {outcome}", first.name()),
                Err(wait_err) => warn!("{wait_err}"),
            }
            channel.close();
            return Err(err);
        }
    };

    channel.close();

    let first_outcome = producer.wait();
    let second_outcome = consumer.wait();
    Ok(PipelineOutcome {
        first: first_outcome?,
        second: second_outcome?,
    })
}
