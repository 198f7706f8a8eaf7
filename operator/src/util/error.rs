use thiserror::Error;

/// Error kinds surfaced by the reconciler. See spec §7 for the
/// propagation contract: sub-reconcilers stop at the first error they
/// encounter; the top-level reconcile does likewise.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes reported error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    Parse(#[from] chrono::ParseError),

    #[error("duration out of range: {0}")]
    DurationOutOfRange(#[from] chrono::OutOfRangeError),

    #[error("invalid resource quantity or duration: {0}")]
    ParseDuration(#[from] parse_duration::parse::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] hub_common::s3::ObjectStoreError),

    #[error("broker error: {0}")]
    Broker(#[from] hub_common::broker::BrokerError),

    #[error("rpc to gimulator failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("failed to connect to gimulator: {0}")]
    RpcTransport(#[from] tonic::transport::Error),

    #[error("invalid gimulator endpoint uri: {0}")]
    InvalidUri(#[from] tonic::codegen::http::uri::InvalidUri),

    /// A cluster API call failed for reasons expected to clear on retry.
    #[error("transient cluster error: {0}")]
    TransientCluster(String),

    /// A referenced Setting, rules document, or shared PVC does not exist.
    #[error("required configuration is missing: {0}")]
    ConfigMissing(String),

    /// A structural invariant (e.g. ambiguous Volume, malformed quantity)
    /// was violated and cannot be auto-resolved.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The reporter could not deliver a terminal outcome; the Room is not
    /// deleted and the next tick retries.
    #[error("failed to deliver report: {0}")]
    ReportDelivery(String),

    /// Unrecoverable at boot; the process exits non-zero.
    #[error("fatal startup error: {0}")]
    Fatal(String),

    #[error("{0}")]
    UserInput(String),
}
