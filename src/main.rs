use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pifab::config::PublishMode;

mod commands;
mod output;
mod tty;

use commands::{config, plan, run, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pifab")]
#[command(version = VERSION)]
#[command(about = "Build, install and test a native Python package on a remote Raspberry Pi")]
struct Cli {
    /// Config file (default: ./pifab.json, then ~/.config/pifab/pifab.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Target host alias, overriding the configured one
    #[arg(long, global = true, value_name = "ALIAS")]
    host: Option<String>,

    /// Whether publish uploads to the package index
    #[arg(long, global = true, value_enum)]
    publish_mode: Option<PublishMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run stages in order, with their dependencies
    Run(run::RunArgs),
    /// Show the resolved stage plan without running it
    Plan(plan::PlanArgs),
    /// List stages, aliases and dependencies
    Stages,
    /// Inspect the effective configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        config: cli.config,
        host: cli.host,
        publish_mode: cli.publish_mode,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
