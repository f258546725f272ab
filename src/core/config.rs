use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;
use crate::stage::Stage;
use crate::utils::base_path::join_remote_path;

/// Root configuration structure for pifab.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub local: LocalLayout,

    #[serde(default)]
    pub remote: RemoteLayout,

    /// Build interpreters, oldest first. The first entry is the primary one.
    #[serde(default = "default_interpreters")]
    pub interpreters: Vec<Interpreter>,

    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleSpec>,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            host: HostConfig::default(),
            local: LocalLayout::default(),
            remote: RemoteLayout::default(),
            interpreters: default_interpreters(),
            modules: default_modules(),
            test: TestConfig::default(),
            publish: PublishConfig::default(),
            use_sudo: default_use_sudo(),
        }
    }
}

/// Target device. `alias` may be an ~/.ssh/config host alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_host_alias")]
    pub alias: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            alias: default_host_alias(),
            user: None,
            port: default_ssh_port(),
            identity_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLayout {
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Source tree directory, relative to the project root.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,

    /// Distribution output directory, relative to the project root.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,

    #[serde(default = "default_setup_command")]
    pub setup_command: String,
}

impl Default for LocalLayout {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            source_dir: default_source_dir(),
            archive_path: default_archive_path(),
            dist_dir: default_dist_dir(),
            setup_command: default_setup_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLayout {
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,

    /// Scripts copied from the extracted tree to the workspace root.
    #[serde(default = "default_helper_scripts")]
    pub helper_scripts: Vec<String>,
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            helper_scripts: default_helper_scripts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
    pub version: String,
    pub executable: String,
}

impl Interpreter {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            executable: format!("python{}", version),
        }
    }

    /// Version with the separator removed: `2.7` -> `27`.
    pub fn stamp(&self) -> String {
        self.version.replace('.', "")
    }

    fn parsed_version(&self) -> Option<(u32, u32)> {
        let (major, minor) = self.version.split_once('.')?;
        Some((major.parse().ok()?, minor.parse().ok()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,

    /// Build subdirectory, relative to the workspace.
    pub build_dir: String,

    /// Compiled module filename inside the build subdirectory.
    pub artifact: String,

    /// Where the compiler leaves its raw output, when not at `artifact`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_output: Option<String>,

    /// Make target; `{version}` is replaced with the interpreter version.
    pub make_target: String,

    /// Library directory, relative to the workspace.
    pub install_dir: String,

    pub import_name: String,

    pub version_attr: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_test: Option<SelfTest>,
}

impl ModuleSpec {
    pub fn make_target_for(&self, interpreter: &Interpreter) -> String {
        self.make_target.replace("{version}", &interpreter.version)
    }

    /// `_GPIO.so` + 2.7 -> `_GPIO27.so`
    pub fn stamped_artifact(&self, interpreter: &Interpreter) -> String {
        match self.artifact.split_once('.') {
            Some((stem, ext)) => format!("{}{}.{}", stem, interpreter.stamp(), ext),
            None => format!("{}{}", self.artifact, interpreter.stamp()),
        }
    }

    pub fn smoke_test_snippet(&self) -> String {
        format!(
            "import {name}; print({name}.{attr})",
            name = self.import_name,
            attr = self.version_attr
        )
    }
}

/// On-device demo run after a quick rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfTest {
    pub make_target: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default = "default_test_runner")]
    pub runner: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            runner: default_test_runner(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PublishMode {
    #[default]
    DryRun,
    Upload,
}

impl PublishMode {
    /// Extra setup.py command appended in upload mode.
    pub fn setup_suffix(&self) -> Option<&'static str> {
        match self {
            PublishMode::DryRun => None,
            PublishMode::Upload => Some("upload"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::DryRun => "dry-run",
            PublishMode::Upload => "upload",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub mode: PublishMode,

    #[serde(default = "default_egg_interpreters")]
    pub egg_interpreters: Vec<Interpreter>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::default(),
            egg_interpreters: default_egg_interpreters(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_host_alias() -> String {
    "raspberry_dev_local".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_source_dir() -> String {
    "source".to_string()
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("/tmp/rpio.tar.gz")
}

fn default_dist_dir() -> String {
    "dist".to_string()
}

fn default_setup_command() -> String {
    "python setup.py".to_string()
}

fn default_staging_dir() -> String {
    "/tmp".to_string()
}

fn default_helper_scripts() -> Vec<String> {
    vec!["scripts/rpio".to_string(), "scripts/rpio-curses".to_string()]
}

fn default_interpreters() -> Vec<Interpreter> {
    vec![Interpreter::new("2.7"), Interpreter::new("3.2")]
}

fn default_egg_interpreters() -> Vec<Interpreter> {
    vec![
        Interpreter::new("2.6"),
        Interpreter::new("2.7"),
        Interpreter::new("3.2"),
    ]
}

fn default_modules() -> Vec<ModuleSpec> {
    vec![
        ModuleSpec {
            name: "gpio".to_string(),
            build_dir: "c_gpio".to_string(),
            artifact: "_GPIO.so".to_string(),
            build_output: Some("build/_GPIO.so".to_string()),
            make_target: "gpio{version}".to_string(),
            install_dir: "RPIO".to_string(),
            import_name: "_GPIO".to_string(),
            version_attr: "VERSION_GPIO".to_string(),
            self_test: None,
        },
        ModuleSpec {
            name: "pwm".to_string(),
            build_dir: "c_pwm".to_string(),
            artifact: "_PWM.so".to_string(),
            build_output: None,
            make_target: "py{version}".to_string(),
            install_dir: "RPIO/PWM".to_string(),
            import_name: "_PWM".to_string(),
            version_attr: "VERSION".to_string(),
            self_test: Some(SelfTest {
                make_target: "dirty".to_string(),
                command: "./pwm".to_string(),
            }),
        },
    ]
}

fn default_test_runner() -> String {
    "run_tests.py".to_string()
}

fn default_use_sudo() -> bool {
    true
}

// =============================================================================
// Accessors and validation
// =============================================================================

impl PipelineConfig {
    /// Remote workspace: where the uploaded source tree is extracted.
    pub fn workspace(&self) -> String {
        join_remote_path(&self.remote.staging_dir, &self.local.source_dir)
    }

    pub fn source_path(&self) -> PathBuf {
        self.local.project_root.join(&self.local.source_dir)
    }

    pub fn dist_path(&self) -> PathBuf {
        self.local.project_root.join(&self.local.dist_dir)
    }

    pub fn module(&self, name: &str) -> Result<&ModuleSpec> {
        self.modules.iter().find(|m| m.name == name).ok_or_else(|| {
            Error::config_invalid_value(
                "modules",
                Some(name.to_string()),
                format!("No module named '{}' is configured", name),
            )
        })
    }

    pub fn primary_interpreter(&self) -> Result<&Interpreter> {
        self.interpreters.first().ok_or_else(|| {
            Error::config_invalid_value("interpreters", None, "At least one interpreter is required")
        })
    }

    pub fn alternate_interpreter(&self) -> Result<&Interpreter> {
        self.interpreters.get(1).ok_or_else(|| {
            Error::config_invalid_value(
                "interpreters",
                None,
                "An alternate interpreter requires a second entry",
            )
        })
    }

    pub fn with_host(mut self, alias: Option<&str>) -> Self {
        if let Some(alias) = alias.filter(|a| !a.trim().is_empty()) {
            self.host.alias = alias.trim().to_string();
        }
        self
    }

    pub fn with_publish_mode(mut self, mode: Option<PublishMode>) -> Self {
        if let Some(mode) = mode {
            self.publish.mode = mode;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.alias.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "host.alias",
                None,
                "Host alias cannot be empty",
            ));
        }

        if !self.remote.staging_dir.starts_with('/') {
            return Err(Error::config_invalid_value(
                "remote.staging_dir",
                Some(self.remote.staging_dir.clone()),
                "Staging directory must be an absolute path",
            ));
        }

        let source_dir = self.local.source_dir.trim();
        if source_dir.is_empty() || source_dir.contains('/') {
            return Err(Error::config_invalid_value(
                "local.source_dir",
                Some(self.local.source_dir.clone()),
                "Source directory must be a single directory name",
            ));
        }

        validate_interpreters("interpreters", &self.interpreters)?;
        validate_interpreters("publish.egg_interpreters", &self.publish.egg_interpreters)?;

        let mut seen = std::collections::HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(Error::config_invalid_value(
                    "modules",
                    Some(module.name.clone()),
                    "Duplicate module name",
                ));
            }
        }

        for stage in Stage::ALL {
            if let Some(name) = stage.module_name() {
                if !seen.contains(name) {
                    return Err(Error::config_invalid_value(
                        "modules",
                        Some(name.to_string()),
                        format!("Stage '{}' needs a module named '{}'", stage, name),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn validate_interpreters(key: &str, interpreters: &[Interpreter]) -> Result<()> {
    if interpreters.is_empty() {
        return Err(Error::config_invalid_value(
            key,
            None,
            "At least one interpreter is required",
        ));
    }

    let mut previous: Option<(u32, u32)> = None;
    for interpreter in interpreters {
        let Some(parsed) = interpreter.parsed_version() else {
            return Err(Error::config_invalid_value(
                key,
                Some(interpreter.version.clone()),
                "Interpreter version must be major.minor",
            ));
        };
        if previous.is_some_and(|p| p >= parsed) {
            return Err(Error::config_invalid_value(
                key,
                Some(interpreter.version.clone()),
                "Interpreters must be listed oldest first without duplicates",
            ));
        }
        previous = Some(parsed);
    }

    Ok(())
}

// =============================================================================
// Loading functions
// =============================================================================

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: PipelineConfig,
    /// File the config came from; `None` means built-in defaults.
    pub source: Option<PathBuf>,
}

/// Load configuration.
///
/// Lookup order: explicit path, ./pifab.json, ~/.config/pifab/pifab.json,
/// built-in defaults. An explicit path must exist; any file that exists must
/// parse and validate.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::config_invalid_value(
                "config",
                Some(path.display().to_string()),
                "Config file does not exist",
            ));
        }
        return Ok(LoadedConfig {
            config: load_from_file(path)?,
            source: Some(path.to_path_buf()),
        });
    }

    for candidate in [paths::project_config()?, paths::global_config()?] {
        if candidate.exists() {
            log_status!("config", "Using {}", candidate.display());
            return Ok(LoadedConfig {
                config: load_from_file(&candidate)?,
                source: Some(candidate),
            });
        }
    }

    Ok(LoadedConfig {
        config: PipelineConfig::default(),
        source: None,
    })
}

pub fn load_from_file(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    let config: PipelineConfig = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_device_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.host.alias, "raspberry_dev_local");
        assert_eq!(config.workspace(), "/tmp/source");
        assert_eq!(config.local.archive_path, PathBuf::from("/tmp/rpio.tar.gz"));
        assert_eq!(config.publish.mode, PublishMode::DryRun);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stamped_artifact_embeds_version_without_separator() {
        let config = PipelineConfig::default();
        let gpio = config.module("gpio").unwrap();
        assert_eq!(gpio.stamped_artifact(&Interpreter::new("2.7")), "_GPIO27.so");
        assert_eq!(gpio.stamped_artifact(&Interpreter::new("3.2")), "_GPIO32.so");
        assert_eq!(gpio.make_target_for(&Interpreter::new("3.2")), "gpio3.2");
    }

    #[test]
    fn smoke_test_snippet_imports_and_prints_version() {
        let config = PipelineConfig::default();
        let pwm = config.module("pwm").unwrap();
        assert_eq!(pwm.smoke_test_snippet(), "import _PWM; print(_PWM.VERSION)");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"host": {{"alias": "pi4"}}, "publish": {{"mode": "upload"}}}}"#).unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.host.alias, "pi4");
        assert_eq!(config.publish.mode, PublishMode::Upload);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.publish.egg_interpreters.len(), 3);
    }

    #[test]
    fn invalid_json_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");
    }

    #[test]
    fn interpreters_must_be_oldest_first() {
        let mut config = PipelineConfig::default();
        config.interpreters = vec![Interpreter::new("3.2"), Interpreter::new("2.7")];
        let err = config.validate().unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn interpreter_version_must_be_major_minor() {
        let mut config = PipelineConfig::default();
        config.interpreters = vec![Interpreter::new("3")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn host_override_replaces_alias() {
        let config = PipelineConfig::default().with_host(Some("pi-zero"));
        assert_eq!(config.host.alias, "pi-zero");

        let config = PipelineConfig::default().with_host(Some("  "));
        assert_eq!(config.host.alias, "raspberry_dev_local");
    }

    #[test]
    fn explicit_missing_path_is_error() {
        assert!(load(Some(Path::new("/nonexistent/pifab.json"))).is_err());
    }

    #[test]
    fn stage_modules_must_be_configured() {
        let mut config = PipelineConfig::default();
        config.modules.retain(|m| m.name != "pwm");
        let err = config.validate().unwrap_err();
        assert_eq!(err.details["value"], "pwm");
    }

    #[test]
    fn alternate_interpreter_requires_two_entries() {
        let mut config = PipelineConfig::default();
        config.interpreters.truncate(1);
        assert!(config.alternate_interpreter().is_err());
        assert_eq!(config.primary_interpreter().unwrap().version, "2.7");
    }
}
