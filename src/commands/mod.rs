use std::path::PathBuf;

use pifab::config::{LoadedConfig, PublishMode};

pub type CmdResult<T> = pifab::Result<(T, i32)>;

pub mod config;
pub mod plan;
pub mod run;
pub mod stages;

/// Flags shared by every subcommand.
pub(crate) struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub publish_mode: Option<PublishMode>,
}

impl GlobalArgs {
    /// Load the config file and apply command-line overrides.
    pub fn load_config(&self) -> pifab::Result<LoadedConfig> {
        let loaded = pifab::config::load(self.config.as_deref())?;
        let effective = loaded
            .config
            .with_host(self.host.as_deref())
            .with_publish_mode(self.publish_mode);
        effective.validate()?;

        Ok(LoadedConfig {
            config: effective,
            source: loaded.source,
        })
    }
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (pifab::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Stages => crate::output::map_cmd_result_to_json(stages::run_json()),
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
