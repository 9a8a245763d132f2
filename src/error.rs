//! Error types.
//!
//! Detection never surfaces these as faults: [`AudioPlugin::check_support`](crate::AudioPlugin::check_support)
//! folds them into a boolean and keeps the [`UnsupportedReason`] around for diagnostics.

use thiserror::Error;

use crate::host::GraphMethod;

/// A failure reported by the host environment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The context does not expose this entry point.
    #[error("host does not expose `{0}`")]
    Unsupported(GraphMethod),
    /// A script-level exception thrown by the host.
    #[error("host raised an exception: {0}")]
    Script(String),
    /// The host refused to build or wire a node.
    #[error("graph operation failed: {0}")]
    Graph(String),
    /// A synchronous request threw before producing a response.
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Why detection decided the environment cannot host the plugin.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnsupportedReason {
    #[error("page served from a local file and synchronous requests are unusable")]
    LocalRequestsUnavailable,
    #[error("environment exposes no codec-support query")]
    NoCodecQuery,
    #[error("no audio context constructor is available")]
    NoContextConstructor,
    #[error("signal chain could not be wired: {0}")]
    SignalChain(String),
}

/// Errors raised while building or using the shared graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("no shared audio context has been created")]
    NoContext,
    #[error("a shared audio context is already installed")]
    ContextAlreadyInstalled,
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors raised by the plugin facade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PluginError {
    /// Support detection has not succeeded yet.
    #[error("plugin is not initialized; call check_support first")]
    NotReady,
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl From<HostError> for PluginError {
    fn from(err: HostError) -> Self {
        PluginError::Graph(GraphError::Host(err))
    }
}
