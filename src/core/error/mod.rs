use serde::{Deserialize, Serialize};
use serde_json::Value;

mod codes;

pub use codes::{all_codes, parse_code};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    SshIdentityFileNotFound,

    RemoteCommandFailed,
    LocalCommandFailed,

    TransferFailed,
    PackagingFailed,

    WorkspaceNotFound,
    BuildSmokeTestFailed,

    PublishConfirmationDeclined,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::LocalCommandFailed => "local.command_failed",

            ErrorCode::TransferFailed => "transfer.failed",
            ErrorCode::PackagingFailed => "packaging.failed",

            ErrorCode::WorkspaceNotFound => "workspace.not_found",
            ErrorCode::BuildSmokeTestFailed => "build.smoke_test_failed",

            ErrorCode::PublishConfirmationDeclined => "publish.confirmation_declined",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub target: TargetDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFailedDetails {
    pub source: String,
    pub destination: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingFailedDetails {
    pub path: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceNotFoundDetails {
    pub workspace: String,
    pub host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeTestFailedDetails {
    pub module: String,
    pub interpreter: String,
    pub command: String,
    pub stdout: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub host: String,
    pub identity_file: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn unknown_stage(name: impl Into<String>, known: Vec<String>) -> Self {
        let name = name.into();
        Self::validation_invalid_argument(
            "stage",
            format!("Unknown stage '{}'", name),
            Some(name),
            Some(known),
        )
        .with_hint("Run 'pifab stages' to list available stages")
    }

    pub fn ssh_identity_file_not_found(
        host: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        let details = to_details(SshIdentityFileNotFoundDetails {
            host: host.into(),
            identity_file: identity_file.into(),
        });

        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            details,
        )
    }

    pub fn remote_command_failed(details: CommandFailedDetails) -> Self {
        let message = format!(
            "Remote command failed (exit {}): {}",
            details.exit_code, details.command
        );
        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn local_command_failed(details: CommandFailedDetails) -> Self {
        let message = format!(
            "Local command failed (exit {}): {}",
            details.exit_code, details.command
        );
        Self::new(ErrorCode::LocalCommandFailed, message, to_details(details))
    }

    pub fn transfer_failed(
        source: impl Into<String>,
        destination: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(TransferFailedDetails {
            source: source.into(),
            destination: destination.into(),
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::TransferFailed,
            format!("Transfer failed: {}", problem),
            details,
        )
    }

    pub fn packaging_failed(path: impl Into<String>, problem: impl Into<String>) -> Self {
        let problem = problem.into();
        let details = to_details(PackagingFailedDetails {
            path: path.into(),
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::PackagingFailed,
            format!("Packaging failed: {}", problem),
            details,
        )
    }

    pub fn workspace_not_found(workspace: impl Into<String>, host: impl Into<String>) -> Self {
        let workspace = workspace.into();
        let details = to_details(WorkspaceNotFoundDetails {
            workspace: workspace.clone(),
            host: host.into(),
        });

        Self::new(
            ErrorCode::WorkspaceNotFound,
            format!("Remote workspace not found: {}", workspace),
            details,
        )
        .with_hint("Run 'pifab run upload' first, or include 'upload' before build/test stages")
    }

    pub fn build_smoke_test_failed(details: SmokeTestFailedDetails) -> Self {
        let message = format!(
            "Import check for '{}' under Python {} printed no version",
            details.module, details.interpreter
        );
        Self::new(ErrorCode::BuildSmokeTestFailed, message, to_details(details))
    }

    pub fn confirmation_declined(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        Self::new(
            ErrorCode::PublishConfirmationDeclined,
            format!("Aborted: '{}' was not confirmed, nothing was done", stage),
            serde_json::json!({ "stage": stage }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// True for the graceful publish abort, which is not a failure.
    pub fn is_declined(&self) -> bool {
        self.code == ErrorCode::PublishConfirmationDeclined
    }
}
