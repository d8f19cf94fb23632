//! Error types for the scripting bridge

use crate::instance::InstanceId;
use crate::role::ScriptRole;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the scripting bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Caller passed a null/empty name or an undefined role
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No script matched the requested name
    #[error("Script '{name}' of role {role} could not be found")]
    ScriptNotFound {
        name: String,
        role: ScriptRole,
    },

    /// Explicit type is not known to the registry
    #[error("Failed to locate type '{0}'")]
    TypeNotFound(String),

    /// Loadable unit could not be loaded
    #[error("Failed to load unit '{path}': {message}")]
    LoadFailure {
        path: PathBuf,
        message: String,
    },

    /// Unit was built against a different bridge API
    #[error("Version mismatch in '{path}': unit API {unit_version}, expected {expected_version}")]
    VersionMismatch {
        path: PathBuf,
        unit_version: u32,
        expected_version: u32,
    },

    /// Type constructor failed or is missing
    #[error("Failed to create instance of '{type_name}': {message}")]
    InstantiationFailed {
        type_name: String,
        message: String,
    },

    /// A compiler plugin could not be created or failed to compile
    #[error("Compiler '{compiler}' failed: {message}")]
    CompilerFailed {
        compiler: String,
        message: String,
    },

    /// An instance hook failed
    #[error("{hook} hook of '{type_name}' (instance {instance}) failed: {message}")]
    HookFailed {
        type_name: String,
        instance: InstanceId,
        hook: &'static str,
        message: String,
    },

    /// File watcher could not be set up
    #[error("Hot-reload failed: {0}")]
    HotReload(String),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a load failure
    pub fn load_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        BridgeError::LoadFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an instantiation failure
    pub fn instantiation_failed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::InstantiationFailed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a compiler failure
    pub fn compiler_failed(compiler: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::CompilerFailed {
            compiler: compiler.into(),
            message: message.into(),
        }
    }

    /// Whether this error means a unit was malformed and should be skipped
    pub fn is_load_failure(&self) -> bool {
        matches!(self, BridgeError::LoadFailure { .. } | BridgeError::VersionMismatch { .. })
    }

    /// Whether this error is a recoverable lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::ScriptNotFound { .. } | BridgeError::TypeNotFound(_))
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(e: toml::de::Error) -> Self {
        BridgeError::Config(e.to_string())
    }
}
