use thiserror::Error;

/// Error kinds an adapter or the bundler can raise for a single input.
///
/// These are always contained by the driver: a failure here skips the
/// offending file (or cluster) and is tallied into the run summary, it never
/// aborts the pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input in {source}: {reason}")]
    InvalidInput { source: String, reason: String },

    #[error("failed to parse {source}: {reason}")]
    ParseFailed { source: String, reason: String },

    #[error("inconsistent sampling interval in {source}: {reason}")]
    InconsistentSampling { source: String, reason: String },

    #[error("adapter timed out waiting on {collaborator} after {timeout_secs}s")]
    AdapterTimeout {
        collaborator: String,
        timeout_secs: u64,
    },

    #[error("bundle for canonical patient {canonical_id} has no Patient resource")]
    BundleMissingPatient { canonical_id: String },

    #[error("unknown resource type {resource_type} encountered while bundling")]
    UnknownResourceType { resource_type: String },
}

impl IngestError {
    /// Short, stable tag used to group errors in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidInput { .. } => "InvalidInput",
            IngestError::ParseFailed { .. } => "ParseFailed",
            IngestError::InconsistentSampling { .. } => "InconsistentSampling",
            IngestError::AdapterTimeout { .. } => "AdapterTimeout",
            IngestError::BundleMissingPatient { .. } => "BundleMissingPatient",
            IngestError::UnknownResourceType { .. } => "UnknownResourceType",
        }
    }
}
