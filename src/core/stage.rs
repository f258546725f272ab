use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clean,
    Upload,
    UploadDistribution,
    BuildGpio,
    BuildPwm,
    Build,
    Test,
    TestAltInterpreter,
    TestPwm,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 10] = [
        Stage::Clean,
        Stage::Upload,
        Stage::UploadDistribution,
        Stage::BuildGpio,
        Stage::BuildPwm,
        Stage::Build,
        Stage::Test,
        Stage::TestAltInterpreter,
        Stage::TestPwm,
        Stage::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Upload => "upload",
            Stage::UploadDistribution => "upload_distribution",
            Stage::BuildGpio => "build_gpio",
            Stage::BuildPwm => "build_pwm",
            Stage::Build => "build",
            Stage::Test => "test",
            Stage::TestAltInterpreter => "test_alt_interpreter",
            Stage::TestPwm => "test_pwm",
            Stage::Publish => "publish",
        }
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Stage::UploadDistribution => &["upload_dist"],
            Stage::TestAltInterpreter => &["test3"],
            Stage::Publish => &["upload_to_pypi"],
            _ => &[],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Clean => "Remove the remote workspace",
            Stage::Upload => "Pack the source tree, ship it and extract it into the remote workspace",
            Stage::UploadDistribution => "Build a source distribution and copy it to the staging directory",
            Stage::BuildGpio => "Build the GPIO module for every interpreter and check it imports",
            Stage::BuildPwm => "Build the PWM module for every interpreter and check it imports",
            Stage::Build => "Build all modules",
            Stage::Test => "Run the test suite under the primary interpreter",
            Stage::TestAltInterpreter => "Run the test suite under the alternate interpreter",
            Stage::TestPwm => "Rebuild the PWM demo and run it on the device",
            Stage::Publish => "Build and upload the distribution and eggs (asks for confirmation)",
        }
    }

    /// Stages whose effects this stage needs, in the order they run.
    pub fn needs(&self) -> &'static [Stage] {
        match self {
            Stage::Build => &[Stage::BuildGpio, Stage::BuildPwm],
            Stage::TestPwm => &[Stage::Upload],
            _ => &[],
        }
    }

    /// Stages whose results this stage destroys or makes stale.
    pub fn invalidates(&self) -> &'static [Stage] {
        match self {
            Stage::Clean => &[Stage::Upload, Stage::BuildGpio, Stage::BuildPwm, Stage::Build],
            Stage::Upload => &[Stage::BuildGpio, Stage::BuildPwm, Stage::Build],
            _ => &[],
        }
    }

    /// Module a single-module stage operates on.
    pub fn module_name(&self) -> Option<&'static str> {
        match self {
            Stage::BuildGpio => Some("gpio"),
            Stage::BuildPwm | Stage::TestPwm => Some("pwm"),
            _ => None,
        }
    }

    pub fn names() -> Vec<String> {
        Stage::ALL.iter().map(|s| s.name().to_string()).collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.name() == wanted || stage.aliases().contains(&wanted))
            .ok_or_else(|| Error::unknown_stage(wanted, Stage::names()))
    }
}

pub fn parse_stages<S: AsRef<str>>(names: &[S]) -> Result<Vec<Stage>> {
    if names.is_empty() {
        return Err(Error::validation_invalid_argument(
            "stages",
            "At least one stage is required",
            None,
            Some(Stage::names()),
        ));
    }
    names.iter().map(|n| n.as_ref().parse()).collect()
}
