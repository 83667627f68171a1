// Entrypoint for the `fb` binary.
// - Keeps `main` small: parse arguments, set up logging and Ctrl-C
//   handling, then hand over to `ui::run`.
// - Failed operations exit with status 1, interrupted ones with 130.

use clap::Parser;
use crossterm::style::Stylize;
use fb_client::{api::CancelFlag, cli::Cli, ui, FbError};
use std::io::IsTerminal;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // First Ctrl-C stops the running request; a second one exits right away.
    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_flag.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("\nReceived signal, aborting!");
        handler_flag.cancel();
    })?;

    match ui::run(&cli, cancel) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(FbError::Interrupted) => Ok(ExitCode::from(130)),
        Err(e) => {
            report(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report(err: &FbError) {
    let label = format!("error[{}]:", err.kind());
    if std::io::stderr().is_terminal() {
        eprintln!("{} {}", label.as_str().red().bold(), err);
    } else {
        eprintln!("{} {}", label, err);
    }
    if let FbError::ApikeyNotFound { .. } = err {
        eprintln!("Please run fb -a to create one");
    }
}
