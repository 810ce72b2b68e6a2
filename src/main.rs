mod cli;
mod commands;
mod config;
mod progress;
mod ui;

use anyhow::Result;
use bundlekit::Settings;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub settings: Settings,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.global.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "bundler", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        verbose: cli.global.verbose,
        settings: config::settings(&cli.global)?,
    };
    log::debug!("{:?}", ctx.settings);

    match cli.command {
        Command::Install { source } => commands::install::run(&ctx, &source),
        Command::Uninstall { bundle, version } => {
            commands::uninstall::run(&ctx, &bundle, version.as_deref())
        }
        Command::Activate { bundle, version } => commands::activate::run(&ctx, &bundle, &version),
        Command::Deactivate { bundle } => commands::deactivate::run(&ctx, &bundle),
        Command::List(args) => commands::list::run(&ctx, args.bundle.as_deref(), args.json),
        Command::Status { bundle } => commands::status::run(&ctx, &bundle),
        Command::Completions { .. } => Ok(()),
    }
}

/// Print the error chain and, for store errors, what to do about it.
fn report(e: &anyhow::Error) {
    ui::error(&e.to_string());
    for cause in e.chain().skip(1) {
        ui::dim(&format!("caused by: {cause}"));
    }
    if let Some(err) = e.chain().find_map(|c| c.downcast_ref::<bundlekit::Error>()) {
        let category = err.category();
        ui::dim(&format!("{}: {}", category, category.advice()));
    }
}
