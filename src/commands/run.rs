use clap::Args;

use pifab::executor::SystemShell;
use pifab::pipeline::{Pipeline, RunReport};
use pifab::ssh::SshClient;
use pifab::stage::parse_stages;

use super::{CmdResult, GlobalArgs};
use crate::tty::StdinConfirmation;

#[derive(Args)]
pub struct RunArgs {
    /// Stages to run, in order (names or aliases)
    #[arg(required = true, value_name = "STAGE")]
    pub stages: Vec<String>,
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<RunReport> {
    let stages = parse_stages(&args.stages)?;
    let loaded = global.load_config()?;

    let remote = SshClient::from_host(&loaded.config.host)?;
    let pipeline = Pipeline::new(&loaded.config, &remote, &SystemShell, &StdinConfirmation);

    let report = pipeline.run(&stages)?;
    Ok((report, 0))
}
