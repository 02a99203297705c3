use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistrictError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Error identified during district calculation: {0}")]
    FailureInCalculation(#[from] DistrictCoreError),
    #[error("Error writing outputs: {0}")]
    FailureWritingOutput(OutputError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct DistrictCoreError {
    error: anyhow::Error,
}

impl DistrictCoreError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct OutputError {
    error: anyhow::Error,
}

impl OutputError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}
