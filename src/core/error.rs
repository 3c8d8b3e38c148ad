#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    /// A parameter is missing, not numeric, or outside its valid range.
    #[error("invalid parameter `{field}`: {message}")]
    Validation { field: &'static str, message: String },

    /// The run finished but produced figures that cannot be reported.
    #[error("simulation produced an invalid result: {0}")]
    Computation(String),
}

impl SimulationError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SimulationError::Validation {
            field,
            message: message.into(),
        }
    }
}
