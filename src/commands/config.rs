use clap::{Args, Subcommand};
use serde::Serialize;

use pifab::config::PipelineConfig;
use pifab::paths;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration, overrides applied
    Show,
    /// Print the file the configuration is loaded from
    Path,
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum ConfigOutput {
    #[serde(rename = "config.show")]
    Show {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        config: PipelineConfig,
    },
    #[serde(rename = "config.path")]
    Path {
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        searched: Vec<String>,
    },
}

pub fn run(args: ConfigArgs, global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    let loaded = global.load_config()?;
    let source = loaded.source.map(|p| p.display().to_string());

    match args.command {
        ConfigCommand::Show => Ok((
            ConfigOutput::Show {
                source,
                config: loaded.config,
            },
            0,
        )),
        ConfigCommand::Path => {
            let mut searched = Vec::new();
            if let Some(explicit) = &global.config {
                searched.push(explicit.display().to_string());
            }
            searched.push(paths::project_config()?.display().to_string());
            searched.push(paths::global_config()?.display().to_string());

            Ok((ConfigOutput::Path { source, searched }, 0))
        }
    }
}
