#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration value or input parameter is out of range.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Inputs that can only be inconsistent through a programming error,
    /// e.g. templates of different views handed to one aggregation.
    #[error("Contract violation: {0}")]
    ContractViolation(String),
}
