use clap::Args;
use serde::Serialize;

use pifab::plan::{self, PlannedStage};
use pifab::stage::parse_stages;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct PlanArgs {
    /// Stages to resolve, in order (names or aliases)
    #[arg(required = true, value_name = "STAGE")]
    pub stages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub host: String,
    pub workspace: String,
    pub stages: Vec<PlannedStage>,
}

pub fn run(args: PlanArgs, global: &GlobalArgs) -> CmdResult<PlanOutput> {
    let requested = parse_stages(&args.stages)?;
    let loaded = global.load_config()?;
    let resolved = plan::resolve(&requested)?;

    Ok((
        PlanOutput {
            host: loaded.config.host.alias.clone(),
            workspace: loaded.config.workspace(),
            stages: resolved.stages,
        },
        0,
    ))
}
