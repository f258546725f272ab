//! Runs a resolved stage plan against one target host.

use chrono::Utc;
use serde::Serialize;
use std::time::Instant;

use crate::build;
use crate::config::{PipelineConfig, PublishMode};
use crate::confirm::ConfirmationProvider;
use crate::error::{Error, Result};
use crate::executor::{LocalShell, RemoteSession, RemoteShell};
use crate::plan::{self, PlanReason, PlannedStage, RunPlan};
use crate::publish;
use crate::stage::Stage;
use crate::suite;
use crate::workspace;

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub reason: PlanReason,
    /// Remote commands and uploads the stage issued.
    pub commands: usize,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub host: String,
    pub workspace: String,
    pub publish_mode: PublishMode,
    pub started_at: String,
    pub finished_at: String,
    pub plan: Vec<PlannedStage>,
    pub stages: Vec<StageReport>,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    session: RemoteSession<'a>,
    local: &'a dyn LocalShell,
    confirm: &'a dyn ConfirmationProvider,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        remote: &'a dyn RemoteShell,
        local: &'a dyn LocalShell,
        confirm: &'a dyn ConfirmationProvider,
    ) -> Self {
        Self {
            config,
            session: RemoteSession::new(remote),
            local,
            confirm,
        }
    }

    /// Resolve `requested` and run it. The whole plan is resolved before the
    /// first stage starts.
    pub fn run(&self, requested: &[Stage]) -> Result<RunReport> {
        let plan = plan::resolve(requested)?;
        self.run_plan(&plan)
    }

    /// Run stages strictly in order; the first failure stops the run.
    pub fn run_plan(&self, plan: &RunPlan) -> Result<RunReport> {
        let started_at = Utc::now().to_rfc3339();
        let mut stages = Vec::with_capacity(plan.stages.len());

        for planned in &plan.stages {
            log_status!("stage", "{}", planned.stage);
            let issued_before = self.session.issued();
            let started = Instant::now();

            let data = self.run_stage(planned.stage).map_err(|err| {
                let completed: Vec<&str> = stages
                    .iter()
                    .map(|s: &StageReport| s.stage.name())
                    .collect();
                let hint = if completed.is_empty() {
                    format!("Stopped at stage '{}'", planned.stage)
                } else {
                    format!(
                        "Stopped at stage '{}' after: {}",
                        planned.stage,
                        completed.join(", ")
                    )
                };
                err.with_hint(hint)
            })?;

            stages.push(StageReport {
                stage: planned.stage,
                reason: planned.reason,
                commands: self.session.issued() - issued_before,
                duration_ms: started.elapsed().as_millis(),
                data,
            });
        }

        Ok(RunReport {
            host: self.session.host().to_string(),
            workspace: self.config.workspace(),
            publish_mode: self.config.publish.mode,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            plan: plan.stages.clone(),
            stages,
        })
    }

    fn run_stage(&self, stage: Stage) -> Result<Option<serde_json::Value>> {
        let session = &self.session;
        let config = self.config;

        match stage {
            Stage::Clean => to_data(&workspace::clean(session, config)?),
            Stage::Upload => to_data(&workspace::upload(session, self.local, config)?),
            Stage::UploadDistribution => {
                to_data(&publish::upload_distribution(session, self.local, config)?)
            }
            Stage::BuildGpio | Stage::BuildPwm => {
                let module = config.module(stage.module_name().unwrap_or_default())?;
                to_data(&build::build_module(session, config, module)?)
            }
            Stage::Build => {
                // Modules without a stage of their own build here.
                let mut built = Vec::new();
                for module in config
                    .modules
                    .iter()
                    .filter(|m| !has_own_build_stage(&m.name))
                {
                    built.extend(build::build_module(session, config, module)?);
                }
                if built.is_empty() {
                    Ok(None)
                } else {
                    to_data(&built)
                }
            }
            Stage::Test => to_data(&suite::test(session, config)?),
            Stage::TestAltInterpreter => to_data(&suite::test_alt_interpreter(session, config)?),
            Stage::TestPwm => {
                let module = config.module(stage.module_name().unwrap_or_default())?;
                to_data(&suite::self_test(session, config, module)?)
            }
            Stage::Publish => to_data(&publish::publish(session, self.local, self.confirm, config)?),
        }
    }
}

fn has_own_build_stage(module: &str) -> bool {
    [Stage::BuildGpio, Stage::BuildPwm]
        .iter()
        .any(|stage| stage.module_name() == Some(module))
}

fn to_data<T: Serialize>(value: &T) -> Result<Option<serde_json::Value>> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| Error::internal_json(e.to_string(), Some("stage report".to_string())))
}
