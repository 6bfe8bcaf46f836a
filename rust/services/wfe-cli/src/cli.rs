//! Flag contract. `-h`/`--help` deliberately exits 1 rather than clap's
//! default 0, so help is parsed by hand instead of left to clap's built-in
//! action; `--version` keeps clap's default (exit 0).

use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "probe-rs",
    version,
    about = "YAML-driven workflow execution engine",
    disable_help_flag = true
)]
pub struct Cli {
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,

    /// Per-step request/response logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Include response times in the report.
    #[arg(long)]
    pub rt: bool,

    /// Emit a topological job/dependency listing and exit.
    #[arg(long = "dag-ascii")]
    pub dag_ascii: bool,

    /// One or more workflow paths, comma-separated.
    #[arg(value_delimiter = ',')]
    pub paths: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Internal: the engine re-executes itself as a plugin's entry point.
    #[command(name = "__plugin-serve", hide = true)]
    PluginServe { name: String },
}

impl Cli {
    pub fn print_help_and_exit() -> ! {
        Cli::command().print_long_help().ok();
        println!();
        std::process::exit(1);
    }
}
