use serde::Serialize;

use pifab::stage::Stage;

use super::CmdResult;

#[derive(Debug, Serialize)]
pub struct StageInfo {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<&'static str>,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<Stage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalidates: Vec<Stage>,
}

pub fn run_json() -> CmdResult<Vec<StageInfo>> {
    let stages = Stage::ALL
        .iter()
        .map(|stage| StageInfo {
            name: stage.name(),
            aliases: stage.aliases().to_vec(),
            description: stage.description(),
            needs: stage.needs().to_vec(),
            invalidates: stage.invalidates().to_vec(),
        })
        .collect();

    Ok((stages, 0))
}
