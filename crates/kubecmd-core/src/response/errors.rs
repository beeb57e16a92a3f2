use thiserror::Error;

/// A round asked to be rehandled without saying when.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("command response {command} needs to be rehandled but carries no delay")]
pub struct ContractViolation {
    pub command: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),

    #[error("delay pool is closed")]
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("dispatcher is closed")]
    Closed,

    #[error(transparent)]
    Pool(#[from] PoolError),
}
