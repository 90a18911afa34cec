use iu::{ModuleId, PayloadType};
use runtime::{ModuleFailure, RuntimeError};
use thiserror::Error;
use transport::TransportError;

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Rejected change to the network's graph. Always returned synchronously.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WiringError {
    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("a module named `{0}` already exists")]
    DuplicateModule(ModuleId),

    #[error("`{consumer}` already has an input named `{input}`")]
    DuplicateInput { consumer: ModuleId, input: String },

    #[error("`{0}` cannot subscribe to itself")]
    SelfLoop(ModuleId),

    /// No output type of the producer is accepted by the consumer.
    #[error("`{producer}` emits {produces:?} but `{consumer}` accepts {accepts:?}")]
    IncompatibleTypes {
        producer: ModuleId,
        consumer: ModuleId,
        produces: Vec<PayloadType>,
        accepts: Vec<PayloadType>,
    },

    #[error("the network is running; topology is fixed")]
    AlreadyRunning,

    #[error("the network has finished")]
    Finished,

    /// A caller-built channel does not ring the consumer's doorbell.
    #[error("edge into `{consumer}` input `{input}` does not ring the consumer's doorbell")]
    DetachedEdge { consumer: ModuleId, input: String },

    #[error("invalid edge: {0}")]
    InvalidEdge(#[from] TransportError),

    #[error("no constructor for module kind `{0}`")]
    UnknownKind(String),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Wiring(#[from] WiringError),

    /// A module's `setup` failed; every module set up before it was torn
    /// down again.
    #[error("setup failed: {0}")]
    Setup(ModuleFailure),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// First failure under the fatal failure policy.
    #[error("network stopped by fatal failure: {0}")]
    Fatal(ModuleFailure),

    /// A module constructor rejected its options.
    #[error("module `{module}`: {source}")]
    Topology {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}
