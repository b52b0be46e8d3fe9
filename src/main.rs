use anyhow::{Context, Result};
use argh::FromArgs;
use env_logger::Env;
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use tinysh::Interpreter;
use tinysh::io_adapters::ScriptSource;
use tinysh::process;

#[derive(FromArgs)]
/// A minimal interactive command interpreter.
/// Runs built-ins (cd, exit), external programs and two-stage pipelines.
struct Cli {
    #[argh(option, default = "String::from(\"> \")")]
    /// prompt shown before each line in interactive mode.
    prompt: String,

    #[argh(switch, short = 'v')]
    /// log process creation and reaping to stderr.
    verbose: bool,

    #[argh(positional)]
    /// read commands from this file instead of the terminal.
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    process::ignore_interrupts().context("cannot ignore SIGINT")?;

    let mut sh = Interpreter::default();
    match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open script {}", path.display()))?;
            sh.run(&mut ScriptSource::new(BufReader::new(file)), "")?;
        }
        None => sh.repl(&cli.prompt)?,
    }

    say_goodbye(&mut io::stdout());
    Ok(())
}

/// Print the parting line. A closed stdout is not an error worth a failing status.
fn say_goodbye(out: &mut impl Write) {
    if let Err(err) = writeln!(out, "Exiting simple shell...").and_then(|()| out.flush()) {
        debug!("cannot print goodbye: {err}");
    }
}
