use anyhow::Context;
use clap::Parser;
use dp::cli::Cli;
use dp::error::USAGE;
use dp::supervisor::Supervisor;
use std::io::IsTerminal;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("dp: {:#}", e);
            if e.downcast_ref::<dp::Error>().is_some_and(dp::Error::is_usage) {
                eprintln!("{}", USAGE);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<u8> {
    let config = cli.run_config()?;
    let pipeline = cli.pipeline()?;

    let mut supervisor = Supervisor::new(config.clone());
    let outcome = supervisor
        .run(&pipeline)
        .context("failed to run pipeline")?;

    if config.report {
        let summary = serde_json::to_string(&outcome).context("failed to encode report")?;
        eprintln!("{}", summary);
    }
    if !outcome.all_succeeded() {
        tracing::info!(children = ?outcome.children, "at least one child failed");
    }
    Ok(outcome.exit_code(config.exit_policy))
}
