//! `probe-rs`: CLI entry point for the workflow engine.

mod cli;
mod dag_ascii;
mod shutdown;
mod telemetry;

use clap::Parser;
use wfe_core::Config;
use wfe_driver::RunOptions;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.help {
        Cli::print_help_and_exit();
    }

    let config = Config::load().unwrap_or_else(|_| Config {
        log: Default::default(),
        defaults: Default::default(),
        plugins: Default::default(),
    });
    telemetry::init(&config.log.level, cli.verbose);

    if let Some(Command::PluginServe { name }) = &cli.command {
        eprintln!("probe-rs: no built-in plugin named {name:?} (plugin registry is empty by default)");
        std::process::exit(1);
    }

    if cli.paths.is_empty() {
        eprintln!("probe-rs: at least one workflow path is required");
        std::process::exit(1);
    }

    let exit_code = tokio::select! {
        code = run(&cli) => code,
        () = shutdown::wait_for_interrupt() => 130,
    };
    std::process::exit(exit_code);
}

async fn run(cli: &Cli) -> i32 {
    let doc = match wfe_driver::load_workflow(&cli.paths) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("probe-rs: {e}");
            return 1;
        }
    };

    if cli.dag_ascii {
        return match dag_ascii::render(&doc) {
            Ok(text) => {
                print!("{text}");
                0
            }
            Err(e) => {
                eprintln!("probe-rs: {e}");
                1
            }
        };
    }

    let opts = RunOptions { verbose: cli.verbose, include_rt: cli.rt };
    match wfe_driver::run(doc, opts).await {
        Ok(summary) => {
            print!("{}", summary.report);
            summary.exit_code
        }
        Err(e) => {
            eprintln!("probe-rs: {e}");
            1
        }
    }
}
