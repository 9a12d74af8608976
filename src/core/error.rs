use crate::core::accept::RejectReason;

#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("{name}: {reason}")]
    RejectedInput { name: String, reason: RejectReason },

    #[error("no queued file at index {index} (queue has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// The transform could not be initialised; the batch never started.
    #[error("batch setup failed: {0}")]
    BatchSetup(String),

    #[error("need at least {required} files, have {actual}")]
    NotEnoughInputs { required: usize, actual: usize },
}
