mod args;
mod history;

use std::io::Write as _;
use std::process::ExitCode;

use anyhow::{Context, Result};
use beanstalk_cli::client::Connection;
use beanstalk_cli::commands::{Confirm, Flow, Shell};
use beanstalk_cli::session::Session;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, warn, Level};

use crate::args::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging goes to stderr so it cannot mix with command output.
    if args.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_writer(std::io::stderr)
            .init();
    }

    let shell = match connect(&args).await {
        Ok(shell) => shell,
        Err(error) => {
            error!(%error, "failed to connect");
            eprintln!("{error:#}");
            // Distinct from runtime failures: no command was ever accepted.
            return ExitCode::from(2);
        },
    };

    if let Err(error) = run(args, shell).await {
        error!(%error, "encountered runtime error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn connect(args: &Args) -> Result<Shell<Connection>> {
    let conn = Connection::connect(&args.host, args.port)
        .await
        .with_context(|| {
            format!("connecting to {}:{}", args.host, args.port)
        })?;

    let session = Session::open(conn, &args.host, args.port)
        .await
        .context("syncing session state")?;

    Ok(Shell::new(session))
}

async fn run(args: Args, mut shell: Shell<Connection>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // One-shot mode: join the trailing arguments into a single line, run
    // exactly one dispatch step, and skip prompt and history entirely.
    if !args.command.is_empty() {
        let line = args.command.join(" ");
        shell
            .dispatch(&line, &mut StdinConfirm { lines: &mut lines })
            .await;
        return Ok(());
    }

    loop {
        print!("{}> ", shell.session.render_prompt());
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            // End-of-input closes down the same way exit does.
            None => {
                println!();
                shell.session.close().await;
                break;
            },
        };

        shell.record(&line);

        match shell
            .dispatch(&line, &mut StdinConfirm { lines: &mut lines })
            .await
        {
            Flow::Continue => {},
            Flow::Quit => break,
        }
    }

    if let Some(path) = history::history_path() {
        // Best-effort: an unwritable home directory shouldn't take the
        // session's exit down with it.
        if let Err(error) = history::append(&path, shell.history()).await {
            warn!(%error, path = %path.display(), "could not save history");
        }
    }

    Ok(())
}

/// Confirmation prompts read their answer from the same stdin the shell
/// reads commands from.
struct StdinConfirm<'a> {
    lines: &'a mut Lines<BufReader<Stdin>>,
}

impl Confirm for StdinConfirm<'_> {
    async fn ask(&mut self, question: &str) -> std::io::Result<String> {
        print!("{question} ");
        std::io::stdout().flush()?;

        Ok(self.lines.next_line().await?.unwrap_or_default())
    }
}
