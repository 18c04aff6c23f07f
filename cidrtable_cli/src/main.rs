use anyhow::{anyhow, Result};
use cidrtable_core::{command::exit_code, Command, Error, TableSet};
use clap::Parser;
use log::{debug, error};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

/// Manage cidrtable lookup tables.
///
/// Runs one `table ...` command given on the command line, or one command
/// per line from FILE (or stdin when neither is given).
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Opts {
    /// Read commands from this file
    #[clap(short = 'f', long)]
    file: Option<String>,

    /// Don't print command output
    #[clap(short, long)]
    quiet: bool,

    /// Keep going after a failed command
    #[clap(short = 'k', long)]
    keep_going: bool,

    /// A single command, e.g. `table 0 add 10.0.0.0/8 100`
    command: Vec<String>,
}

fn run_line(set: &TableSet, line: &str) -> Result<String, Error> {
    let cmd = Command::parse(line)?;
    debug!("running {cmd:?}");
    cmd.execute(set)
}

fn script_lines(opts: &Opts) -> Result<Vec<String>> {
    if !opts.command.is_empty() {
        return Ok(vec![opts.command.join(" ")]);
    }
    match &opts.file {
        Some(path) => {
            let contents = fs::read_to_string(path).map_err(|e| anyhow!("read {path}: {e}"))?;
            Ok(contents.lines().map(str::to_owned).collect())
        }
        None => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| anyhow!("read stdin: {e}")),
    }
}

/// Run every non-blank, non-comment line; returns the exit status of the
/// last failed command (0 when all succeeded). Output errors abort.
fn run_script(set: &TableSet, lines: &[String], opts: &Opts, out: &mut impl Write) -> Result<u8> {
    let mut status = 0;
    for (n, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match run_line(set, line) {
            Ok(text) if !opts.quiet => out
                .write_all(text.as_bytes())
                .map_err(|e| anyhow!("write stdout: {e}"))?,
            Ok(_) => {}
            Err(e) => {
                error!("line {}: {line}: {e}", n + 1);
                status = exit_code(&e) as u8;
                if !opts.keep_going {
                    break;
                }
            }
        }
    }
    out.flush().map_err(|e| anyhow!("write stdout: {e}"))?;
    Ok(status)
}

fn main() -> Result<ExitCode> {
    let opts = Opts::parse();
    cidrtable_core::ensure_logging();

    let lines = script_lines(&opts)?;
    let set = cidrtable_core::init();
    let result = run_script(&set, &lines, &opts, &mut io::stdout().lock());
    drop(set);
    cidrtable_core::teardown();
    Ok(ExitCode::from(result?))
}
